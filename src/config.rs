use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const CONFIG_PATH: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ip,
    Manual,
    None,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub provider: ProviderKind,
    pub manual_lat: f64, // Used when provider = "manual"
    pub manual_lon: f64,
    pub lookup_ip: Option<String>, // Address to geolocate; unset means our own
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_age_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ip,
            manual_lat: -22.9068,
            manual_lon: -43.1729,
            lookup_ip: None,
            high_accuracy: false,
            timeout_ms: 5_000,
            max_age_secs: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Fixture,
    Http,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub backend: BackendKind,
    pub base_url: String,
    pub fixture_path: String,
    pub journal_path: String, // SQLite file recording mocked submissions
    pub request_timeout_secs: u64,
    pub simulated_latency_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Fixture,
            base_url: "http://localhost:8080/api".to_string(),
            fixture_path: "data/places.json".to_string(),
            journal_path: "cigfinder_journal.db".to_string(),
            request_timeout_secs: 10,
            simulated_latency_ms: 300,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    pub default_lat: f64, // Map center when there is nothing else to fit
    pub default_lon: f64,
    pub toast_duration_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 50,
            default_lat: -22.9068,
            default_lon: -43.1729,
            toast_duration_ms: 3_000,
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory.
    /// If it doesn't exist, creates a default one.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match Self::read(path) {
                Ok(config) => return config,
                Err(e) => {
                    warn!("{}. Using defaults.", e);
                    return Config::default();
                }
            }
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        if let Err(e) = default_config.save_to(path) {
            warn!("Could not write default {}: {}", path.display(), e);
        }

        info!("Loaded default configuration.");
        default_config
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::read(&path).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[location]\nprovider = \"manual\"\nmanual_lat = 1.5\n\n[api]\nbackend = \"http\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.location.provider, ProviderKind::Manual);
        assert_eq!(config.location.manual_lat, 1.5);
        assert_eq!(config.location.timeout_ms, 5_000);
        assert_eq!(config.api.backend, BackendKind::Http);
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[location\nprovider = ").unwrap();

        assert!(matches!(Config::read(&path), Err(ConfigError::Parse { .. })));
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
