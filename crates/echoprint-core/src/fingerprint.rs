//! Decoded fingerprints, quality tiers and query windowing

use echoprint_fp::{CodegenFp, DecodeError, Metadata};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{QualityConfig, WindowConfig, WindowStrategy};

/// Decoded codegen fingerprint
///
/// `codes[i]` was observed at `times[i]`; both vectors always have the same
/// length and `times` is ascending as emitted by codegen.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    codes: Vec<u32>,
    times: Vec<u32>,
    pub meta: Metadata,
    clamped: bool,
}

impl Fingerprint {
    /// Build from already paired codes and times
    pub fn new(codes: Vec<u32>, times: Vec<u32>, meta: Metadata) -> anyhow::Result<Self> {
        anyhow::ensure!(
            codes.len() == times.len(),
            "codes ({}) and times ({}) differ in length",
            codes.len(),
            times.len()
        );
        Ok(Self {
            codes,
            times,
            meta,
            clamped: false,
        })
    }

    /// Decode a codegen payload
    pub fn from_codegen(codegen: &CodegenFp) -> Result<Self, DecodeError> {
        let (codes, times) = codegen.decode()?;
        Ok(Self {
            codes,
            times,
            meta: codegen.metadata.clone(),
            clamped: false,
        })
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn times(&self) -> &[u32] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn is_clamped(&self) -> bool {
        self.clamped
    }

    /// Quality tier derived from the source bitrate
    pub fn quality(&self, config: &QualityConfig) -> Quality {
        Quality::from_bitrate(self.meta.bitrate, config)
    }

    /// Copy of this fingerprint limited to the query window
    ///
    /// The window starts at the first timestamp. Already clamped
    /// fingerprints are returned unchanged.
    pub fn clamped(&self, window: &WindowConfig) -> Fingerprint {
        if self.clamped {
            return self.clone();
        }

        let (codes, times) = match self.times.first() {
            None => (Vec::new(), Vec::new()),
            Some(&first) => {
                let boundary = first.saturating_add(window.span());
                match window.strategy {
                    WindowStrategy::Truncate => {
                        let end = self
                            .times
                            .iter()
                            .position(|&t| t > boundary)
                            .unwrap_or(self.times.len());
                        (self.codes[..end].to_vec(), self.times[..end].to_vec())
                    }
                    WindowStrategy::Filter => self
                        .codes
                        .iter()
                        .zip(&self.times)
                        .filter(|&(_, &t)| t < boundary)
                        .map(|(&c, &t)| (c, t))
                        .unzip(),
                }
            }
        };

        log::debug!(
            "clamped fingerprint {}: {} codes before, {} after",
            self.meta.track_id,
            self.codes.len(),
            codes.len()
        );

        Fingerprint {
            codes,
            times,
            meta: self.meta.clone(),
            clamped: true,
        }
    }
}

/// Coarse reliability of a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn from_bitrate(bitrate: f64, config: &QualityConfig) -> Self {
        // unknown bitrate is assumed good; offline tools and tests omit it
        if bitrate == 0.0 {
            return Quality::High;
        }
        if bitrate >= config.high_bitrate {
            Quality::High
        } else if bitrate >= config.medium_bitrate {
            Quality::Medium
        } else {
            Quality::Low
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        };
        f.write_str(name)
    }
}
