//! Configuration module for faucet-rs
//!
//! A [`PipeConfig`] names a pipe and fixes its tick rate, either directly as an
//! interval in milliseconds or as a number of ticks per minute. Configs load
//! from TOML (`.toml` files) or JSON (anything else).
//!
//! # Example
//!
//! ```toml
//! name = "uploads"
//! ticks_per_minute = 120
//! ```
//!
//! ```ignore
//! use faucet_rs::{Context, Pipe, PipeConfig};
//!
//! let config = PipeConfig::load("pipe.toml")?;
//! let pipe = Pipe::<String>::from_config(&config);
//! pipe.start_with_config(&Context::background(), &config)?;
//! ```

use crate::error::{FaucetError, Result};
use crate::pipe::DEFAULT_PIPE_NAME;
use crate::rate::rate_per_minute;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default tick rate when a config specifies neither an interval nor a rate
pub const DEFAULT_TICKS_PER_MINUTE: u32 = 60;

/// Configuration for a single pipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Name used in log spans
    pub name: String,

    /// Explicit tick interval in milliseconds; takes precedence over
    /// `ticks_per_minute`
    pub interval_ms: Option<u64>,

    /// Desired ticks per minute
    pub ticks_per_minute: Option<u32>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPE_NAME.to_string(),
            interval_ms: None,
            ticks_per_minute: Some(DEFAULT_TICKS_PER_MINUTE),
        }
    }
}

impl PipeConfig {
    /// Config with the given name and rate.
    pub fn with_rate(name: impl Into<String>, ticks_per_minute: u32) -> Self {
        Self {
            name: name.into(),
            interval_ms: None,
            ticks_per_minute: Some(ticks_per_minute),
        }
    }

    /// Resolve the tick interval.
    ///
    /// `interval_ms` wins over `ticks_per_minute`. A zero result, or neither
    /// being set, is a configuration error.
    pub fn interval(&self) -> Result<Duration> {
        let interval = match (self.interval_ms, self.ticks_per_minute) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Some(count)) => rate_per_minute(count),
            (None, None) => {
                return Err(FaucetError::Config(format!(
                    "pipe '{}' has neither interval_ms nor ticks_per_minute",
                    self.name
                )))
            }
        };

        if interval.is_zero() {
            return Err(FaucetError::Config(format!(
                "pipe '{}' resolves to a zero tick interval",
                self.name
            )));
        }

        Ok(interval)
    }

    /// Load a config file, as TOML if the extension is `.toml`, JSON otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FaucetError::Config(format!("Failed to read pipe config {:?}: {}", path, e))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            toml::from_str(&content).map_err(|e| {
                FaucetError::Config(format!("Failed to parse pipe config {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                FaucetError::Config(format!("Failed to parse pipe config {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, falling back to defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load pipe config, using defaults: {}", e);
            Self::default()
        })
    }
}
