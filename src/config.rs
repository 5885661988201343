//! Configuration loading and validation (§6.4).

use crate::error::{ConfigError, Result};
use anyhow::Context as _;
use std::path::{Path, PathBuf};

/// Bridge core configuration, loaded from the environment (and, if present,
/// a TOML file at the instance directory).
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the encrypted store's secrets vault and secure
    /// files, plus the daemon's pid file, socket, and logs.
    pub data_dir: PathBuf,

    /// Gate driver registration on `enabled_platforms`.
    pub enable_platform_whitelist: bool,

    /// Platform ids permitted to register when the whitelist is enabled.
    pub enabled_platforms: Vec<String>,

    /// Permit the parallel fan-out strategy (still subject to host support).
    pub enable_multi: bool,

    /// Message Cache bound (§4.5); default 10,000 per the spec.
    pub cache_limit: usize,
}

impl Config {
    /// Load configuration from environment and config files.
    pub fn load() -> Result<Self> {
        let data_dir = Self::default_data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

        let enabled_platforms = std::env::var("BEACONBRIDGE_ENABLED_PLATFORMS")
            .ok()
            .map(|value| value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let enable_platform_whitelist = env_bool("BEACONBRIDGE_ENABLE_PLATFORM_WHITELIST", false);
        if enable_platform_whitelist && enabled_platforms.is_empty() {
            return Err(ConfigError::Invalid(
                "enable_platform_whitelist is set but BEACONBRIDGE_ENABLED_PLATFORMS lists no platforms".into(),
            )
            .into());
        }

        let enable_multi = env_bool("BEACONBRIDGE_ENABLE_MULTI", true);
        let cache_limit = std::env::var("BEACONBRIDGE_CACHE_LIMIT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(10_000);

        Ok(Self {
            data_dir,
            enable_platform_whitelist,
            enabled_platforms,
            enable_multi,
            cache_limit,
        })
    }

    /// Load from a specific instance directory, overriding the default.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::load()?;
        config.data_dir = path.to_path_buf();
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create data directory: {}", config.data_dir.display()))?;
        Ok(config)
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("beaconbridge"))
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// Alias used by the daemon, which only cares about the instance
    /// directory (pid file, socket, logs), not the rest of the config.
    pub fn default_instance_dir() -> PathBuf {
        Self::default_data_dir()
    }

    pub fn secrets_vault_path(&self) -> PathBuf {
        self.data_dir.join(".secrets.json")
    }

    pub fn secure_files_dir(&self) -> PathBuf {
        self.data_dir.join("data")
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_data_dir_is_stable_within_a_process() {
        assert_eq!(Config::default_data_dir(), Config::default_data_dir());
    }

    #[test]
    fn env_bool_parses_common_truthy_forms() {
        // SAFETY: test runs single-threaded with respect to this var; no
        // other test reads or writes BEACONBRIDGE_TEST_FLAG.
        unsafe { std::env::set_var("BEACONBRIDGE_TEST_FLAG", "Yes") };
        assert!(env_bool("BEACONBRIDGE_TEST_FLAG", false));
        unsafe { std::env::remove_var("BEACONBRIDGE_TEST_FLAG") };
        assert!(!env_bool("BEACONBRIDGE_TEST_FLAG", false));
    }
}
