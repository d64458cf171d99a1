//! Loader configuration.
//!
//! [`LoaderConfig`] carries what the bootstrap collaborator decides for the core:
//! the abort deadline, the request-wrapping capability flag, diagnostic flags and
//! an opaque feature set.

use crate::error::{HookwireError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Default delay before buffered data is abandoned, in milliseconds.
pub const DEFAULT_ABORT_AFTER_MS: u64 = 30_000;

/// Flag enabling logs of errors thrown by wrapped functions.
pub const FLAG_DEV: &str = "dev";

/// Flag enabling logs of the core's own contained faults.
pub const FLAG_INTERNAL: &str = "internal";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Delay after start before `abort` is attempted
    pub abort_after_ms: u64,
    /// Whether the host request implementation can be wrapped safely
    pub xhr_wrappable: bool,
    /// Diagnostic flags, see [`FLAG_DEV`] and [`FLAG_INTERNAL`]
    pub flags: BTreeSet<String>,
    /// Feature names, not interpreted by the core
    pub features: BTreeSet<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            abort_after_ms: DEFAULT_ABORT_AFTER_MS,
            xhr_wrappable: true,
            flags: BTreeSet::new(),
            features: BTreeSet::new(),
        }
    }
}

impl LoaderConfig {
    /// Build a configuration from the environment.
    ///
    /// Loads a `.env` file if present, then reads `HOOKWIRE_ABORT_AFTER_MS`,
    /// `HOOKWIRE_XHR_WRAPPABLE` and `HOOKWIRE_FLAGS` (comma-separated). Unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HookwireError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("HOOKWIRE_ABORT_AFTER_MS") {
            config.abort_after_ms = raw.trim().parse().map_err(|_| {
                HookwireError::ConfigError(format!("HOOKWIRE_ABORT_AFTER_MS is not a number: {}", raw))
            })?;
        }

        if let Some(raw) = lookup("HOOKWIRE_XHR_WRAPPABLE") {
            config.xhr_wrappable = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(HookwireError::ConfigError(format!(
                        "HOOKWIRE_XHR_WRAPPABLE is not a boolean: {}",
                        other
                    )))
                }
            };
        }

        if let Some(raw) = lookup("HOOKWIRE_FLAGS") {
            config.flags = raw
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    pub fn abort_after(&self) -> Duration {
        Duration::from_millis(self.abort_after_ms)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn with_abort_after(mut self, delay: Duration) -> Self {
        self.abort_after_ms = delay.as_millis() as u64;
        self
    }
}
