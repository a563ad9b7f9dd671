use phytoscan_shared::{AdviceMode, PlantNameSource};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::analysis::pipeline::PipelineOptions;

pub const CONFIG_PATH_ENV: &str = "PHYTOSCAN_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Pre-built UI to serve at `/`, if any.
    pub frontend_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Per HTTP attempt.
    pub timeout_secs: u64,
    /// Per pipeline stage, retries included.
    pub stage_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub plant_name_source: PlantNameSource,
    pub advice_mode: AdviceMode,
    pub max_image_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            frontend_dir: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 20,
            stage_timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            plant_name_source: PlantNameSource::User,
            advice_mode: AdviceMode::Prevention,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

impl AppConfig {
    /// Defaults, then the YAML file named by `PHYTOSCAN_CONFIG`, then
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path, source })?;
                Self::from_yaml_str(&contents)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("PORT") {
            self.server.port = parse("PORT", &v)?;
        }
        if let Some(v) = lookup("FRONTEND_DIR") {
            self.server.frontend_dir = Some(v);
        }
        if let Some(v) = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")) {
            self.model.api_key = Some(v);
        }
        if let Some(v) = lookup("GEMINI_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = lookup("MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = parse("MODEL_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MODEL_STAGE_TIMEOUT_SECS") {
            self.model.stage_timeout_secs = parse("MODEL_STAGE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MODEL_MAX_RETRIES") {
            self.model.max_retries = parse("MODEL_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("PLANT_NAME_SOURCE") {
            self.analysis.plant_name_source = parse("PLANT_NAME_SOURCE", &v)?;
        }
        if let Some(v) = lookup("ADVICE_MODE") {
            self.analysis.advice_mode = parse("ADVICE_MODE", &v)?;
        }
        if let Some(v) = lookup("MAX_IMAGE_BYTES") {
            self.analysis.max_image_bytes = parse("MAX_IMAGE_BYTES", &v)?;
        }
        self.validate()
    }

    /// Zero timeouts would fail every request before it reaches the model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("MODEL_TIMEOUT_SECS", self.model.timeout_secs),
            ("MODEL_STAGE_TIMEOUT_SECS", self.model.stage_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.server.port)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            plant_name_source: self.analysis.plant_name_source,
            advice_mode: self.analysis.advice_mode,
            max_image_bytes: self.analysis.max_image_bytes,
            stage_timeout: self.model.stage_timeout(),
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.model.timeout(), Duration::from_secs(20));
        assert_eq!(config.model.max_retries, 2);
        assert_eq!(config.analysis.plant_name_source, PlantNameSource::User);
        assert_eq!(config.analysis.advice_mode, AdviceMode::Prevention);
        assert_eq!(config.bind_address(), "0.0.0.0:8081");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
model:
  model: gemini-2.5-pro
  max_retries: 0
analysis:
  plant_name_source: model
  advice_mode: treatment
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.model.model, "gemini-2.5-pro");
        assert_eq!(config.model.max_retries, 0);
        assert_eq!(config.model.timeout_secs, 20);
        assert_eq!(config.analysis.plant_name_source, PlantNameSource::Model);
        assert_eq!(config.analysis.advice_mode, AdviceMode::Treatment);
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::from_yaml_str("server:\n  port: 9000\n").unwrap();
        config
            .apply_overrides(env(&[
                ("PORT", "9100"),
                ("GOOGLE_API_KEY", "g-key"),
                ("ADVICE_MODE", "Treatment"),
                ("MODEL_TIMEOUT_SECS", "15"),
                ("FRONTEND_DIR", ""),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.model.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.analysis.advice_mode, AdviceMode::Treatment);
        assert_eq!(config.model.timeout_secs, 15);
        assert_eq!(config.server.frontend_dir, None);
    }

    #[test]
    fn gemini_key_takes_precedence() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[("GEMINI_API_KEY", "primary"), ("GOOGLE_API_KEY", "fallback")]))
            .unwrap();
        assert_eq!(config.model.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("PLANT_NAME_SOURCE", "camera")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for PLANT_NAME_SOURCE: camera");

        let err = config.apply_overrides(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("MODEL_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for MODEL_TIMEOUT_SECS: 0");

        let mut config = AppConfig::from_yaml_str("model:\n  stage_timeout_secs: 0\n").unwrap();
        let err = config.apply_overrides(env(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "MODEL_STAGE_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("secret".into());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("secret"));
    }
}
