//! Codegen payload codec
//!
//! A codegen `code` string is URL-safe base64 wrapped around a zlib stream.
//! The inflated text is a run of zero-padded 5-digit hex values: every time
//! offset first, then every hash code, paired by index.

use base64::{engine::general_purpose, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::io::{Read, Write as _};
use std::time::Instant;
use thiserror::Error;

/// Hex digits per packed value (20 bits)
pub const HEX_DIGITS_PER_VALUE: usize = 5;

/// Largest value a 5-digit group can carry
pub const MAX_VALUE: u32 = 0xF_FFFF;

/// Errors raised while turning a codegen payload into codes and times
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64 in codegen payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("corrupt zlib stream in codegen payload: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("inflated payload length {0} is not a multiple of 5")]
    Length(usize),

    #[error("invalid hex group {group:?} at offset {offset}")]
    Hex { offset: usize, group: String },

    #[error("odd number of packed values ({0}), times and codes cannot be paired")]
    Unpaired(usize),
}

/// Base64-decode and inflate a codegen payload into its hex text.
pub fn inflate(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let start = Instant::now();

    // codegen emits the URL-safe alphabet; line breaks are tolerated like
    // other base64 consumers of these payloads do
    let fixed: String = payload
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let compressed = general_purpose::STANDARD.decode(fixed.as_bytes())?;

    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut inflated)?;

    log::debug!(
        "inflate: {} compressed bytes -> {} bytes in {:?}",
        compressed.len(),
        inflated.len(),
        start.elapsed()
    );
    Ok(inflated)
}

/// Split inflated hex text into `(codes, times)`.
///
/// The first half of the groups are times, the second half codes.
pub fn unpack(hex: &[u8]) -> Result<(Vec<u32>, Vec<u32>), DecodeError> {
    let start = Instant::now();

    if hex.len() % HEX_DIGITS_PER_VALUE != 0 {
        return Err(DecodeError::Length(hex.len()));
    }
    let count = hex.len() / HEX_DIGITS_PER_VALUE;
    if count % 2 != 0 {
        return Err(DecodeError::Unpaired(count));
    }

    let mut times = hex
        .chunks_exact(HEX_DIGITS_PER_VALUE)
        .enumerate()
        .map(|(i, group)| {
            parse_group(group).ok_or_else(|| DecodeError::Hex {
                offset: i * HEX_DIGITS_PER_VALUE,
                group: String::from_utf8_lossy(group).into_owned(),
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;
    let codes = times.split_off(count / 2);

    log::debug!("unpack: {} code/time pairs in {:?}", codes.len(), start.elapsed());
    Ok((codes, times))
}

/// Decode a codegen payload into `(codes, times)`.
pub fn decode(payload: &str) -> Result<(Vec<u32>, Vec<u32>), DecodeError> {
    let inflated = inflate(payload)?;
    unpack(&inflated)
}

/// Inverse of [`decode`]: pack, deflate and URL-safe encode codes and times.
pub fn encode(codes: &[u32], times: &[u32]) -> anyhow::Result<String> {
    anyhow::ensure!(
        codes.len() == times.len(),
        "codes ({}) and times ({}) differ in length",
        codes.len(),
        times.len()
    );

    let mut hex = String::with_capacity((codes.len() + times.len()) * HEX_DIGITS_PER_VALUE);
    for &value in times.iter().chain(codes) {
        anyhow::ensure!(value <= MAX_VALUE, "value {:#x} does not fit in 20 bits", value);
        write!(hex, "{:05x}", value)?;
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(hex.as_bytes())?;
    let compressed = encoder.finish()?;

    Ok(general_purpose::STANDARD
        .encode(compressed)
        .replace('+', "-")
        .replace('/', "_"))
}

fn parse_group(group: &[u8]) -> Option<u32> {
    group
        .iter()
        .try_fold(0u32, |acc, &b| (b as char).to_digit(16).map(|d| (acc << 4) | d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Compress arbitrary text the way codegen does
    fn pack(text: &str) -> String {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        general_purpose::STANDARD
            .encode(encoder.finish().unwrap())
            .replace('+', "-")
            .replace('/', "_")
    }

    #[test]
    fn test_decode_codegen_fixture() {
        // "0000100002abcdefffff" deflated by a stock zlib
        let (codes, times) = decode("eJwzMDAwMARiA6PEpOSU1DQQAAAysgXR").unwrap();
        assert_eq!(times, vec![1, 2]);
        assert_eq!(codes, vec![0xabcde, 0xfffff]);
    }

    #[test]
    fn test_round_trip() {
        let times: Vec<u32> = (0..300).map(|i| i * 7).collect();
        let codes: Vec<u32> = (0..300).map(|i| (i * 104_729) % (MAX_VALUE + 1)).collect();

        let payload = encode(&codes, &times).unwrap();
        assert!(!payload.contains('+') && !payload.contains('/'));

        let (decoded_codes, decoded_times) = decode(&payload).unwrap();
        assert_eq!(decoded_codes, codes);
        assert_eq!(decoded_times, times);
    }

    #[test]
    fn test_upper_case_hex_accepted() {
        let (codes, times) = decode(&pack("0000AFFFFF")).unwrap();
        assert_eq!(times, vec![0xa]);
        assert_eq!(codes, vec![0xfffff]);
    }

    #[test]
    fn test_empty_payload_decodes_to_nothing() {
        let (codes, times) = decode(&pack("")).unwrap();
        assert!(codes.is_empty());
        assert!(times.is_empty());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(decode("@@@not base64@@@"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_corrupt_stream() {
        let payload = general_purpose::STANDARD.encode(b"definitely not zlib");
        assert!(matches!(decode(&payload), Err(DecodeError::Inflate(_))));
    }

    #[test]
    fn test_length_not_multiple_of_five() {
        assert!(matches!(decode(&pack("000010000")), Err(DecodeError::Length(9))));
    }

    #[test]
    fn test_invalid_hex_group() {
        match decode(&pack("00001+0002")) {
            Err(DecodeError::Hex { offset, group }) => {
                assert_eq!(offset, 5);
                assert_eq!(group, "+0002");
            }
            other => panic!("expected hex error, got {:?}", other),
        }
    }

    #[test]
    fn test_unpaired_values() {
        assert!(matches!(decode(&pack("000010000200003")), Err(DecodeError::Unpaired(3))));
    }

    #[test]
    fn test_encode_rejects_wide_values() {
        assert!(encode(&[MAX_VALUE + 1], &[0]).is_err());
        assert!(encode(&[1, 2], &[0]).is_err());
    }
}
