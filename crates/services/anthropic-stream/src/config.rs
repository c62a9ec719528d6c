use serde::Deserialize;

use crate::error::StreamError;

/// Default upper bound on the size of a single SSE record (16 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;
/// Environment variable enabling strict mode
pub const ENV_STRICT: &str = "ANTHROPIC_STREAM_STRICT";
/// Environment variable overriding the record size limit
pub const ENV_MAX_RECORD_BYTES: &str = "ANTHROPIC_STREAM_MAX_RECORD_BYTES";

/// Decoder configuration
///
/// Strict mode turns structural errors (deltas for unopened blocks, invalid
/// tool arguments) into hard failures. It is meant for development and tests;
/// the default skips the offending event so a partially broken stream still
/// yields a usable message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    strict: bool,
    max_record_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Helper to read and normalize an env var (trim + filter empty).
fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, StreamError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StreamError::Config(format!(
            "{name} must be a boolean, got {raw:?}"
        ))),
    }
}

impl StreamConfig {
    /// Creates a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the process environment
    ///
    /// - `ANTHROPIC_STREAM_STRICT` (`1|true|yes|on` or `0|false|no|off`)
    /// - `ANTHROPIC_STREAM_MAX_RECORD_BYTES` (positive integer)
    pub fn from_env() -> Result<Self, StreamError> {
        Self::from_lookup(env_trimmed)
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Values are trimmed and empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StreamError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();
        if let Some(raw) = get(ENV_STRICT) {
            cfg.strict = parse_flag(ENV_STRICT, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_RECORD_BYTES) {
            cfg.max_record_bytes = raw.parse().map_err(|e| {
                StreamError::Config(format!("{ENV_MAX_RECORD_BYTES}: {e} ({raw:?})"))
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Enables or disables strict mode
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the maximum size of a single SSE record
    #[must_use]
    pub const fn with_max_record_bytes(mut self, limit: usize) -> Self {
        self.max_record_bytes = limit;
        self
    }

    /// Whether structural errors abort ingestion
    #[must_use]
    pub const fn strict(&self) -> bool {
        self.strict
    }

    /// Maximum size of a single SSE record in bytes
    #[must_use]
    pub const fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Checks that the configured values are usable.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.max_record_bytes == 0 {
            return Err(StreamError::Config(
                "max_record_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
