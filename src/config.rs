use crate::error::{PredictionFormError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_CONFIG_PATH: &str = "prediction_form.toml";
const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 120_000;

/// Main configuration structure loaded from prediction_form.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub stub: StubConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
    /// Where the values came from, for logging once tracing is up
    #[serde(skip)]
    pub source: ConfigSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The config file did not exist
    Defaults(PathBuf),
}

impl Default for ConfigSource {
    fn default() -> Self {
        ConfigSource::Defaults(PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

/// Where the prediction service lives and how long to wait for it
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Stub prediction service settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StubConfig {
    pub bind: SocketAddr,
    pub prediction: f64,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            prediction: 1.0,
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    /// PREDICT_LOG_FILE; the only log sink the TUI uses
    pub log_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "prediction_form=info".to_string(),
            log_file: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("PREDICT_LOG")
            && !level.trim().is_empty()
        {
            config.log_level = level;
        }
        if let Ok(path) = std::env::var("PREDICT_LOG_FILE")
            && !path.trim().is_empty()
        {
            config.log_file = Some(PathBuf::from(path));
        }
        config
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses PREDICTION_FORM_CONFIG or defaults to "prediction_form.toml".
    pub fn load() -> Result<Self> {
        // 1) PREDICT_ENV_FILE if set, 2) ./.env
        if let Ok(env_path) = std::env::var("PREDICT_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path = std::env::var("PREDICTION_FORM_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::from_file_or_default(Path::new(&config_path))?;

        config.apply_env_overrides()?;
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file; a missing file yields defaults, any other I/O error fails
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut config = Self::from_toml_str(&content)?;
                config.source = ConfigSource::File(path.to_path_buf());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self {
                source: ConfigSource::Defaults(path.to_path_buf()),
                ..Self::default()
            }),
            Err(e) => Err(PredictionFormError::Config {
                message: format!("Failed to read {}: {e}", path.display()),
            }),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Env-first overrides for everything in the TOML file
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PREDICT_API_URL") {
            tracing::debug!("PREDICT_API_URL env override applied");
            self.api.base_url = url;
        }
        if let Ok(raw) = std::env::var("PREDICT_TIMEOUT_MS") {
            self.api.timeout_ms = raw.parse().map_err(|_| PredictionFormError::Config {
                message: format!("PREDICT_TIMEOUT_MS must be an integer, got '{raw}'"),
            })?;
        }
        if let Ok(raw) = std::env::var("PREDICT_STUB_BIND") {
            self.stub.bind = raw.parse().map_err(|_| PredictionFormError::Config {
                message: format!("PREDICT_STUB_BIND must be host:port, got '{raw}'"),
            })?;
        }
        if let Ok(raw) = std::env::var("PREDICT_STUB_VALUE") {
            self.stub.prediction = raw.parse().map_err(|_| PredictionFormError::Config {
                message: format!("PREDICT_STUB_VALUE must be a number, got '{raw}'"),
            })?;
        }
        Ok(())
    }

    /// Validate the configuration, clamping what can be clamped
    pub fn validate(&mut self) -> Result<()> {
        let url = self.api.base_url.trim().trim_end_matches('/');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(PredictionFormError::Config {
                message: format!(
                    "API base URL '{}' must start with http:// or https://",
                    self.api.base_url
                ),
            });
        }
        self.api.base_url = url.to_string();

        let clamped = self.api.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        if clamped != self.api.timeout_ms {
            tracing::warn!(
                "timeout_ms {} out of range, clamping to {}",
                self.api.timeout_ms,
                clamped
            );
            self.api.timeout_ms = clamped;
        }

        if !self.stub.prediction.is_finite() {
            return Err(PredictionFormError::Config {
                message: "stub prediction must be a finite number".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("[api]\nbase_url = \"http://api:9000\"\n").unwrap();
        assert_eq!(config.api.base_url, "http://api:9000");
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.stub.bind.port(), 8000);
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let mut config = Config::default();
        config.api.base_url = "ftp://example".to_string();
        assert!(matches!(
            config.validate(),
            Err(PredictionFormError::Config { .. })
        ));
    }

    #[test]
    fn test_validate_trims_trailing_slash_and_clamps_timeout() {
        let mut config = Config::default();
        config.api.base_url = "http://localhost:8000/".to_string();
        config.api.timeout_ms = 5;
        config.validate().unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout_ms, MIN_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("prediction_form_missing_config.toml");
        let config = Config::from_file_or_default(&path).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.source, ConfigSource::Defaults(path));
    }

    #[test]
    fn test_unreadable_config_path_is_an_error() {
        // a directory exists but cannot be read as a file
        let err = Config::from_file_or_default(&std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, PredictionFormError::Config { .. }));
    }

    #[test]
    fn test_existing_config_file_is_recorded_as_source() {
        let path = std::env::temp_dir().join("prediction_form_present_config.toml");
        std::fs::write(&path, "[stub]\nprediction = 42.0\n").unwrap();
        let config = Config::from_file_or_default(&path).unwrap();
        assert_eq!(config.stub.prediction, 42.0);
        assert_eq!(config.source, ConfigSource::File(path.clone()));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_env_override_for_api_url() {
        unsafe {
            std::env::set_var("PREDICT_API_URL", "http://override:1234");
        }
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.api.base_url, "http://override:1234");
        unsafe {
            std::env::remove_var("PREDICT_API_URL");
        }
    }
}
