//! Tuning parameters for the matcher
//!
//! Defaults reproduce the behaviour of the production echoprint matcher;
//! every value can be overridden from the `[matching]` section of the TOML
//! configuration file.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Quality;

/// Matcher configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Histogram scoring and result ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Time tolerance in ticks; timestamps are rounded down to a multiple of it
    #[serde(default = "default_slop")]
    pub slop: u32,
    /// Store relevance floor passed to every candidate lookup
    #[serde(default = "default_min_db_score_percent")]
    pub min_db_score_percent: f32,
    /// Relative margin the top result needs over the runner-up to be "best"
    #[serde(default = "default_best_match_diff")]
    pub best_match_diff: f32,
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            slop: default_slop(),
            min_db_score_percent: default_min_db_score_percent(),
            best_match_diff: default_best_match_diff(),
            max_confidence: default_max_confidence(),
        }
    }
}

fn default_slop() -> u32 {
    2
}
fn default_min_db_score_percent() -> f32 {
    30.0
}
fn default_best_match_diff() -> f32 {
    0.25
}
fn default_max_confidence() -> f32 {
    100.0
}

/// Bitrate thresholds (kbps) of the quality tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_high_bitrate")]
    pub high_bitrate: f64,
    #[serde(default = "default_medium_bitrate")]
    pub medium_bitrate: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            high_bitrate: default_high_bitrate(),
            medium_bitrate: default_medium_bitrate(),
        }
    }
}

fn default_high_bitrate() -> f64 {
    256.0
}
fn default_medium_bitrate() -> f64 {
    128.0
}

/// Search depth and acceptance threshold of one quality tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Maximum number of candidates requested from the store
    pub search_depth: usize,
    /// Minimum confidence (percent) for a candidate to be reported
    pub min_confidence: f32,
}

/// Per-tier policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_high_tier")]
    pub high: TierPolicy,
    #[serde(default = "default_medium_tier")]
    pub medium: TierPolicy,
    #[serde(default = "default_low_tier")]
    pub low: TierPolicy,
}

impl TierConfig {
    pub fn policy(&self, quality: Quality) -> &TierPolicy {
        match quality {
            Quality::High => &self.high,
            Quality::Medium => &self.medium,
            Quality::Low => &self.low,
        }
    }
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            high: default_high_tier(),
            medium: default_medium_tier(),
            low: default_low_tier(),
        }
    }
}

fn default_high_tier() -> TierPolicy {
    TierPolicy {
        search_depth: 200,
        min_confidence: 70.0,
    }
}
fn default_medium_tier() -> TierPolicy {
    TierPolicy {
        search_depth: 350,
        min_confidence: 55.0,
    }
}
fn default_low_tier() -> TierPolicy {
    TierPolicy {
        search_depth: 500,
        min_confidence: 35.0,
    }
}

/// How a fingerprint is cut down to the comparison window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStrategy {
    /// Keep the prefix up to the first time past the boundary
    Truncate,
    /// Keep every element strictly below the boundary
    Filter,
}

impl Default for WindowStrategy {
    fn default() -> Self {
        WindowStrategy::Truncate
    }
}

/// Query window anchored at the first timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Time ticks in 60 seconds of audio (60 * 1000 / 23.2)
    #[serde(default = "default_ticks_per_minute")]
    pub ticks_per_minute: u32,
    /// Window length in minutes
    #[serde(default = "default_window_minutes")]
    pub minutes: u32,
    #[serde(default)]
    pub strategy: WindowStrategy,
}

impl WindowConfig {
    /// Window length in ticks
    pub fn span(&self) -> u32 {
        self.ticks_per_minute.saturating_mul(self.minutes)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            ticks_per_minute: default_ticks_per_minute(),
            minutes: default_window_minutes(),
            strategy: WindowStrategy::default(),
        }
    }
}

fn default_ticks_per_minute() -> u32 {
    2586
}
fn default_window_minutes() -> u32 {
    3
}

/// Batch worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Queries matched at once; 0 uses one worker per CPU
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl BatchConfig {
    pub fn workers(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    16
}

impl MatcherConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scoring.slop == 0 {
            anyhow::bail!("scoring.slop must be > 0");
        }
        if !(0.0..=1.0).contains(&self.scoring.best_match_diff) {
            anyhow::bail!("scoring.best_match_diff must be within [0, 1]");
        }
        if self.quality.medium_bitrate > self.quality.high_bitrate {
            anyhow::bail!("quality.medium_bitrate must be <= quality.high_bitrate");
        }
        for (name, tier) in [
            ("high", &self.tiers.high),
            ("medium", &self.tiers.medium),
            ("low", &self.tiers.low),
        ] {
            if tier.search_depth == 0 {
                anyhow::bail!("tiers.{}.search_depth must be > 0", name);
            }
        }
        if self.window.minutes == 0 || self.window.ticks_per_minute == 0 {
            anyhow::bail!("window.minutes and window.ticks_per_minute must be > 0");
        }
        Ok(())
    }
}
