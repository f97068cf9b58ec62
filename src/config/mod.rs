//! Configuration management for runfuse
//!
//! Defaults for fusion, reranking and output come from a TOML file, can be
//! overridden per profile and per environment variable, and are validated
//! before use. Command line flags override the loaded values.

use crate::error::{Result, RunfuseError};
use crate::fusion::{FusionMethod, MergeOptions, DEFAULT_DEPTH, DEFAULT_RRF_K};
use crate::rerank::{TieBreakPolicy, DEFAULT_EPSILON, DEFAULT_PERTURBATION_STEP};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Fusion method names accepted in config files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethodName {
    Rrf,
    Average,
    Interpolation,
}

impl std::str::FromStr for FusionMethodName {
    type Err = RunfuseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rrf" => Ok(Self::Rrf),
            "average" => Ok(Self::Average),
            "interpolation" => Ok(Self::Interpolation),
            other => Err(RunfuseError::InvalidParameter(format!(
                "unknown fusion method '{}'",
                other
            ))),
        }
    }
}

/// Run merging defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub method: FusionMethodName,
    pub rrf_k: f64,
    pub depth: usize,
    pub max_docs: usize,
    pub alpha: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            method: FusionMethodName::Rrf,
            rrf_k: DEFAULT_RRF_K,
            depth: DEFAULT_DEPTH,
            max_docs: DEFAULT_DEPTH,
            alpha: 0.5,
        }
    }
}

impl FusionConfig {
    pub fn fusion_method(&self) -> FusionMethod {
        match self.method {
            FusionMethodName::Rrf => FusionMethod::Rrf { k: self.rrf_k },
            FusionMethodName::Average => FusionMethod::Average,
            FusionMethodName::Interpolation => FusionMethod::Interpolation { alpha: self.alpha },
        }
    }

    /// Merge options with uniform weights
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            method: self.fusion_method(),
            weights: None,
            depth: self.depth,
            max_docs: Some(self.max_docs),
        }
    }
}

/// Tie-break reranking defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub epsilon: f64,
    pub perturbation_step: f64,
    /// Regex with one capture group extracting the numeric key from a document id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pattern: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            perturbation_step: DEFAULT_PERTURBATION_STEP,
            key_pattern: None,
        }
    }
}

impl RerankConfig {
    pub fn policy(&self) -> Result<TieBreakPolicy> {
        TieBreakPolicy::new(self.epsilon, self.perturbation_step)
    }
}

/// Run file output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub run_tag: String,
    /// Fixed number of score decimals; shortest exact form when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_tag: "runfuse".to_string(),
            precision: None,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<FusionMethodName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf_k: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_docs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perturbation_step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RunfuseError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RunfuseError::io(e, format!("Failed to read config file: {:?}", path))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            RunfuseError::io(e, format!("Failed to write config file: {:?}", path))
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| RunfuseError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(method) = overrides.method {
            self.fusion.method = method;
        }
        if let Some(k) = overrides.rrf_k {
            self.fusion.rrf_k = k;
        }
        if let Some(depth) = overrides.depth {
            self.fusion.depth = depth;
        }
        if let Some(max_docs) = overrides.max_docs {
            self.fusion.max_docs = max_docs;
        }
        if let Some(alpha) = overrides.alpha {
            self.fusion.alpha = alpha;
        }
        if let Some(epsilon) = overrides.epsilon {
            self.rerank.epsilon = epsilon;
        }
        if let Some(step) = overrides.perturbation_step {
            self.rerank.perturbation_step = step;
        }
        if let Some(pattern) = overrides.key_pattern {
            self.rerank.key_pattern = Some(pattern);
        }
        if let Some(tag) = overrides.run_tag {
            self.output.run_tag = tag;
        }
        if let Some(precision) = overrides.precision {
            self.output.precision = Some(precision);
        }

        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: RUNFUSE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("RUNFUSE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(path: &str, value: &str, what: &str) -> Result<T> {
            value.parse().map_err(|_| RunfuseError::InvalidConfigValue {
                path: path.to_string(),
                message: format!("Cannot parse '{}' as {}", value, what),
            })
        }

        match path {
            "FUSION__METHOD" => self.fusion.method = value.parse()?,
            "FUSION__RRF_K" => self.fusion.rrf_k = parse(path, value, "number")?,
            "FUSION__DEPTH" => self.fusion.depth = parse(path, value, "integer")?,
            "FUSION__MAX_DOCS" => self.fusion.max_docs = parse(path, value, "integer")?,
            "FUSION__ALPHA" => self.fusion.alpha = parse(path, value, "number")?,
            "RERANK__EPSILON" => self.rerank.epsilon = parse(path, value, "number")?,
            "RERANK__PERTURBATION_STEP" => {
                self.rerank.perturbation_step = parse(path, value, "number")?
            }
            "RERANK__KEY_PATTERN" => self.rerank.key_pattern = Some(value.to_string()),
            "OUTPUT__RUN_TAG" => self.output.run_tag = value.to_string(),
            "OUTPUT__PRECISION" => self.output.precision = Some(parse(path, value, "integer")?),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            RunfuseError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("runfuse").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            fusion: FusionConfig::default(),
            rerank: RerankConfig::default(),
            output: OutputConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
        assert_eq!(config.fusion.rrf_k, 60.0);
        assert_eq!(config.rerank.epsilon, 0.001);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [_meta]
            schema_version = "1.0.0"

            [fusion]
            rrf_k = 20.0
            "#,
        )
        .unwrap();

        assert_eq!(config.fusion.rrf_k, 20.0);
        assert_eq!(config.fusion.depth, 1000);
        assert_eq!(config.output.run_tag, "runfuse");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vars(&[
            ("RUNFUSE_FUSION__RRF_K", "10"),
            ("RUNFUSE_FUSION__METHOD", "average"),
            ("RUNFUSE_OUTPUT__RUN_TAG", "combo"),
            ("RUNFUSE_FUSION__DEPTH", "not-a-number"),
            ("OTHER_VAR", "ignored"),
        ]));

        assert_eq!(config.fusion.rrf_k, 10.0);
        assert_eq!(config.fusion.method, FusionMethodName::Average);
        assert_eq!(config.output.run_tag, "combo");
        assert_eq!(config.fusion.depth, 1000);
    }

    #[test]
    fn test_profile_overrides() {
        let mut config = Config::default();
        config.profiles.insert(
            "shallow".to_string(),
            ProfileOverrides {
                depth: Some(100),
                run_tag: Some("shallow".to_string()),
                ..ProfileOverrides::default()
            },
        );

        config.apply_profile("shallow").unwrap();
        assert_eq!(config.fusion.depth, 100);
        assert_eq!(config.output.run_tag, "shallow");

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_profile_overrides_every_section() {
        let mut config = Config::default();
        config.profiles.insert(
            "tweets".to_string(),
            ProfileOverrides {
                alpha: Some(0.8),
                epsilon: Some(0.01),
                perturbation_step: Some(0.0001),
                key_pattern: Some(r"^tweet-(\d+)$".to_string()),
                precision: Some(6),
                ..ProfileOverrides::default()
            },
        );

        config.apply_profile("tweets").unwrap();
        assert_eq!(config.fusion.alpha, 0.8);
        assert_eq!(config.rerank.epsilon, 0.01);
        assert_eq!(config.rerank.perturbation_step, 0.0001);
        assert_eq!(config.rerank.key_pattern.as_deref(), Some(r"^tweet-(\d+)$"));
        assert_eq!(config.output.precision, Some(6));
        assert_eq!(config.fusion.depth, 1000);
        ConfigValidator::validate(&config).unwrap();
    }

    #[test]
    fn test_merge_options_from_config() {
        let config = FusionConfig {
            method: FusionMethodName::Interpolation,
            alpha: 0.3,
            ..FusionConfig::default()
        };

        let options = config.merge_options();
        assert_eq!(options.method, FusionMethod::Interpolation { alpha: 0.3 });
        assert_eq!(options.max_docs, Some(1000));
    }
}
