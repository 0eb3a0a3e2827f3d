//! Configuration management for the classifier service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `CATDOG__MODEL__PATH`
pub const ENV_PREFIX: &str = "CATDOG";

/// Interpolation used when resizing uploads to the model input size
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest neighbour, the default of the loader the model was trained with
    #[default]
    Nearest,
    Bilinear,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub preprocess: PreprocessConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ONNX model file
    pub path: String,
    /// Name reported in logs and on `/health`
    pub name: String,
    /// Number of intra-op threads for ONNX inference
    pub onnx_threads: usize,
    /// Scores at or above this value are labelled "dog"
    pub threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/cat_dog_model.onnx".to_string(),
            name: "cat_dog".to_string(),
            onnx_threads: 1,
            threshold: 0.5,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub width: u32,
    pub height: u32,
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            filter: ResizeFilter::Nearest,
        }
    }
}

/// Scratch storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploads are written to before decoding
    pub uploads_dir: String,
    /// Keep scratch files after the request finishes
    pub retain_uploads: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "uploads".to_string(),
            retain_uploads: true,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// `CATDOG__SECTION__KEY` overrides `section.key`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

impl AppConfig {
    /// Load configuration from the default file (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path. A missing file falls back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.model.threshold) {
            anyhow::bail!(
                "model.threshold must be within [0, 1], got {}",
                self.model.threshold
            );
        }
        if self.preprocess.width == 0 || self.preprocess.height == 0 {
            anyhow::bail!(
                "preprocess dimensions must be non-zero, got {}x{}",
                self.preprocess.width,
                self.preprocess.height
            );
        }
        if self.model.onnx_threads == 0 {
            anyhow::bail!("model.onnx_threads must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.threshold, 0.5);
        assert_eq!(config.preprocess.width, 64);
        assert_eq!(config.preprocess.height, 64);
        assert_eq!(config.preprocess.filter, ResizeFilter::Nearest);
        assert_eq!(config.storage.uploads_dir, "uploads");
        assert!(config.storage.retain_uploads);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[model]
path = "/opt/models/pets.onnx"
threshold = 0.6

[preprocess]
filter = "bilinear"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.model.path, "/opt/models/pets.onnx");
        assert_eq!(config.model.threshold, 0.6);
        assert_eq!(config.preprocess.filter, ResizeFilter::Bilinear);
        // untouched sections keep their defaults
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.uploads_dir, "uploads");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.model.path, "models/cat_dog_model.onnx");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[model]
path = "/from/file.onnx"
threshold = 0.7
"#
        )
        .unwrap();

        let vars: config::Map<String, String> = [
            ("CATDOG__MODEL__PATH", "/x/pets.onnx"),
            ("CATDOG__SERVER__PORT", "9001"),
            ("CATDOG__STORAGE__RETAIN_UPLOADS", "false"),
            ("UNRELATED__MODEL__PATH", "/ignored.onnx"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = AppConfig::load_with_env(file.path(), environment().source(Some(vars))).unwrap();
        assert_eq!(config.model.path, "/x/pets.onnx");
        assert_eq!(config.server.port, 9001);
        assert!(!config.storage.retain_uploads);
        // keys without an override still come from the file
        assert_eq!(config.model.threshold, 0.7);
    }

    #[test]
    fn test_invalid_environment_value_rejected() {
        let vars: config::Map<String, String> =
            [("CATDOG__SERVER__PORT".to_string(), "not-a-port".to_string())]
                .into_iter()
                .collect();

        let result = AppConfig::load_with_env("does/not/exist.toml", environment().source(Some(vars)));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.model.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut config = AppConfig::default();
        config.preprocess.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_filter_mapping() {
        assert_eq!(FilterType::from(ResizeFilter::Bilinear), FilterType::Triangle);
        assert_eq!(FilterType::from(ResizeFilter::Nearest), FilterType::Nearest);
    }
}
