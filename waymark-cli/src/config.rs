//! Small TOML configuration file for the CLI binary: index naming, lock
//! timeouts, and the installed-by identity recorded alongside migration
//! runs. None of this is read by `waymark-core` itself (§6/§1) — it exists
//! purely to spare an embedding application from repeating boilerplate.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use waymark_core::{LockTimeouts, Result, WaymarkError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaymarkCliConfig {
    /// Name of the index hosting migration state records.
    pub index_name: String,
    /// Identity recorded against every migration attempt (operator/process name).
    pub installed_by: String,
    pub lock: LockConfig,
}

impl Default for WaymarkCliConfig {
    fn default() -> Self {
        WaymarkCliConfig {
            index_name: "migrations".to_string(),
            installed_by: "waymark-cli".to_string(),
            lock: LockConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub acquire_timeout_secs: u64,
    pub lease_timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        let defaults = LockTimeouts::run_defaults();
        LockConfig {
            acquire_timeout_secs: defaults.acquire.as_secs(),
            lease_timeout_secs: defaults.lease.as_secs(),
        }
    }
}

impl LockConfig {
    pub fn to_timeouts(&self) -> LockTimeouts {
        LockTimeouts {
            acquire: Duration::from_secs(self.acquire_timeout_secs),
            lease: Duration::from_secs(self.lease_timeout_secs),
        }
    }
}

impl WaymarkCliConfig {
    /// Load from an explicit path, falling back to defaults when no path is
    /// given and `waymark.toml` is not present in the working directory.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let resolved = match path {
            Some(p) => Some(p.to_string()),
            None if Path::new("waymark.toml").exists() => Some("waymark.toml".to_string()),
            None => None,
        };

        match resolved {
            Some(p) => {
                let text = std::fs::read_to_string(&p).map_err(|e| {
                    WaymarkError::Configuration(format!("failed to read '{p}': {e}"))
                })?;
                toml::from_str(&text)
                    .map_err(|e| WaymarkError::Configuration(format!("invalid config '{p}': {e}")))
            }
            None => Ok(WaymarkCliConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_run_lock_defaults() {
        let config = WaymarkCliConfig::default();
        assert_eq!(config.index_name, "migrations");
        let timeouts = config.lock.to_timeouts();
        assert_eq!(timeouts.acquire, LockTimeouts::run_defaults().acquire);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: WaymarkCliConfig = toml::from_str("index_name = \"custom_migrations\"\n").unwrap();
        assert_eq!(config.index_name, "custom_migrations");
        assert_eq!(config.installed_by, "waymark-cli");
    }
}
