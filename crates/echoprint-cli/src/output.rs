//! JSON output formatting

use echoprint_core::MatchResult;
use serde::Serialize;

/// Print any serializable value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}

/// Print per-query match lists as a JSON array, in request order
pub fn print_json_results(results: &[Vec<MatchResult>], pretty: bool) {
    let failed = results
        .iter()
        .filter(|group| group.iter().any(|m| m.error.is_some()))
        .count();
    let best = results
        .iter()
        .filter(|group| group.iter().any(|m| m.best))
        .count();

    log::info!(
        "{} queries: {} with a best match, {} failed",
        results.len(),
        best,
        failed
    );

    print_json(results, pretty);
}
