//! Bootstrap configuration for the gateway
//!
//! Settings are resolved in this priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: the gateway logs a warning and
//! starts with defaults. A config file that exists but cannot be parsed is
//! a configuration error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "AGRI_CONFIG";
/// Environment variable overriding the bind address
pub const HOST_ENV_VAR: &str = "AGRI_HOST";
/// Environment variable overriding the HTTP port
pub const PORT_ENV_VAR: &str = "AGRI_PORT";
/// Environment variable overriding the model directory
pub const MODEL_DIR_ENV_VAR: &str = "AGRI_MODEL_DIR";

/// Directory name used under the platform config directory
const APP_DIR_NAME: &str = "agri-gateway";

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup. The gateway must restart to pick up changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TomlConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body size (image uploads)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Model artifact locations and input geometry
    #[serde(default)]
    pub models: ModelsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
///
/// Artifact paths are resolved against `model_dir` unless absolute.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Plant disease CNN (ONNX)
    #[serde(default = "default_disease_classifier")]
    pub disease_classifier: PathBuf,

    /// Crop recommendation classifier (ONNX)
    #[serde(default = "default_crop_classifier")]
    pub crop_classifier: PathBuf,

    /// Yield regressor (ONNX)
    #[serde(default = "default_yield_regressor")]
    pub yield_regressor: PathBuf,

    /// Image height the disease classifier was trained on
    #[serde(default = "default_image_side")]
    pub image_height: usize,

    /// Image width the disease classifier was trained on
    #[serde(default = "default_image_side")]
    pub image_width: usize,

    /// Number of features the crop classifier expects
    #[serde(default = "default_crop_feature_count")]
    pub crop_feature_count: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Command-line overrides, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_disease_classifier() -> PathBuf {
    PathBuf::from("disease.onnx")
}

fn default_crop_classifier() -> PathBuf {
    PathBuf::from("crop.onnx")
}

fn default_yield_regressor() -> PathBuf {
    PathBuf::from("yield.onnx")
}

fn default_image_side() -> usize {
    256
}

fn default_crop_feature_count() -> usize {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            models: ModelsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            disease_classifier: default_disease_classifier(),
            crop_classifier: default_crop_classifier(),
            yield_regressor: default_yield_regressor(),
            image_height: default_image_side(),
            image_width: default_image_side(),
            crop_feature_count: default_crop_feature_count(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl ModelsConfig {
    /// Resolve an artifact path against `model_dir`
    pub fn resolve(&self, artifact: &Path) -> PathBuf {
        if artifact.is_absolute() {
            artifact.to_path_buf()
        } else {
            self.model_dir.join(artifact)
        }
    }

    pub fn disease_classifier_path(&self) -> PathBuf {
        self.resolve(&self.disease_classifier)
    }

    pub fn crop_classifier_path(&self) -> PathBuf {
        self.resolve(&self.crop_classifier)
    }

    pub fn yield_regressor_path(&self) -> PathBuf {
        self.resolve(&self.yield_regressor)
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply `AGRI_HOST`, `AGRI_PORT` and `AGRI_MODEL_DIR`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var(HOST_ENV_VAR) {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }

        if let Ok(port) = std::env::var(PORT_ENV_VAR) {
            self.port = port.trim().parse().map_err(|e| {
                Error::Config(format!("{} must be a port number, got '{}': {}", PORT_ENV_VAR, port, e))
            })?;
        }

        if let Ok(dir) = std::env::var(MODEL_DIR_ENV_VAR) {
            if !dir.trim().is_empty() {
                self.models.model_dir = PathBuf::from(dir);
            }
        }

        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = &overrides.model_dir {
            self.models.model_dir = dir.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Reject settings the gateway cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.models.image_height == 0 || self.models.image_width == 0 {
            return Err(Error::InvalidInput(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.models.image_width, self.models.image_height
            )));
        }
        if self.models.crop_feature_count == 0 {
            return Err(Error::InvalidInput(
                "crop_feature_count must be non-zero".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::InvalidInput(
                "max_upload_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string for binding the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Locate the config file
///
/// Priority: command-line argument, then `AGRI_CONFIG`, then the user
/// config directory, then `/etc/agri-gateway/config.toml` on Linux.
/// Returns `None` when no candidate exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load configuration from an optional TOML file
///
/// `None` or a missing file yields compiled defaults.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
