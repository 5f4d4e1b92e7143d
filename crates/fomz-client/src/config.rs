//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts with zero
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use fomz_shared::constants::{ANALYTICS_CACHE_TTL_SECS, AUTOSAVE_DELAY_MS};
use fomz_store::{LocalConfig, SqliteMedium};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the on-disk local store.
    /// Env: `FOMZ_DATA_DIR`
    /// Default: the platform data directory, or `./fomz-data`.
    pub data_dir: PathBuf,

    /// Quiet period before a dirty builder session is autosaved.
    /// Env: `FOMZ_AUTOSAVE_MS`
    /// Default: `1500`
    pub autosave_delay: Duration,

    /// Local store tunables.
    /// Env: `FOMZ_LOCAL_QUOTA_KB` (default `5120`),
    /// `FOMZ_NEAR_LIMIT_PERCENT` (default `80`),
    /// `FOMZ_ANALYTICS_TTL_SECS` (default `300`).
    pub local: LocalConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: SqliteMedium::default_data_dir()
                .unwrap_or_else(|_| PathBuf::from("./fomz-data")),
            autosave_delay: Duration::from_millis(AUTOSAVE_DELAY_MS),
            local: LocalConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("FOMZ_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(val) = lookup("FOMZ_AUTOSAVE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.autosave_delay = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid FOMZ_AUTOSAVE_MS, using default"),
            }
        }

        if let Some(val) = lookup("FOMZ_LOCAL_QUOTA_KB") {
            match val.parse::<u64>() {
                Ok(kb) if kb > 0 => config.local.quota_kb = kb,
                _ => tracing::warn!(value = %val, "Invalid FOMZ_LOCAL_QUOTA_KB, using default"),
            }
        }

        if let Some(val) = lookup("FOMZ_NEAR_LIMIT_PERCENT") {
            match val.parse::<f64>() {
                Ok(pct) if (0.0..=100.0).contains(&pct) => config.local.near_limit_percent = pct,
                _ => tracing::warn!(value = %val, "Invalid FOMZ_NEAR_LIMIT_PERCENT, using default"),
            }
        }

        if let Some(val) = lookup("FOMZ_ANALYTICS_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(secs) if secs >= 0 => {
                    config.local.analytics_ttl = chrono::Duration::seconds(secs)
                }
                _ => {
                    tracing::warn!(
                        value = %val,
                        default = ANALYTICS_CACHE_TTL_SECS,
                        "Invalid FOMZ_ANALYTICS_TTL_SECS, using default"
                    )
                }
            }
        }

        config
    }

    /// Byte capacity enforced by the on-disk medium.
    pub fn local_capacity_bytes(&self) -> u64 {
        self.local.quota_kb * 1024
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.autosave_delay, Duration::from_millis(1500));
        assert_eq!(config.local.quota_kb, 5120);
        assert_eq!(config.local_capacity_bytes(), 5120 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("FOMZ_DATA_DIR", "/tmp/fomz"),
            ("FOMZ_AUTOSAVE_MS", "250"),
            ("FOMZ_LOCAL_QUOTA_KB", "64"),
            ("FOMZ_ANALYTICS_TTL_SECS", "10"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/fomz"));
        assert_eq!(config.autosave_delay, Duration::from_millis(250));
        assert_eq!(config.local.quota_kb, 64);
        assert_eq!(config.local.analytics_ttl, chrono::Duration::seconds(10));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("FOMZ_AUTOSAVE_MS", "soon"),
            ("FOMZ_NEAR_LIMIT_PERCENT", "140"),
        ]));
        assert_eq!(config.autosave_delay, Duration::from_millis(1500));
        assert_eq!(config.local.near_limit_percent, 80.0);
    }
}
