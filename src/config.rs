//! Configuration management for compatibility analysis
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-compat.toml)
//! - Environment variables (SCHEMA_COMPAT__*)
//!
//! ## Example config file (schema-compat.toml):
//! ```toml
//! [analysis]
//! strictness = "standard"
//! include_upgrade_guidance = true
//! include_detailed_diff = false
//! categories = ["types", "endpoints", "authentication", "errors"]
//! ignore_paths = ["types.Internal"]
//!
//! [verdict]
//! lenient_incompatible_above = 5
//! standard_incompatible_above = 10
//!
//! [impact]
//! languages = ["typescript", "python", "go"]
//!
//! [limits]
//! max_schema_elements = 50000
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::compatibility::AnalysisCategory;
use crate::verdict::{Strictness, VerdictPolicy};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Defaults applied to requests built by the CLI
    #[serde(default)]
    pub analysis: AnalysisDefaults,

    /// Verdict thresholds
    #[serde(default)]
    pub verdict: VerdictPolicy,

    /// Impact reporting
    #[serde(default)]
    pub impact: ImpactConfig,

    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Default request options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDefaults {
    #[serde(default)]
    pub strictness: Strictness,

    #[serde(default = "default_true")]
    pub include_upgrade_guidance: bool,

    #[serde(default)]
    pub include_detailed_diff: bool,

    /// Categories to analyze; empty means all
    #[serde(default)]
    pub categories: Vec<AnalysisCategory>,

    #[serde(default)]
    pub ignore_paths: Vec<String>,
}

/// Impact reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// SDK languages listed on breaking and non-breaking changes
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

/// Resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Types + endpoints + auth schemes + error codes allowed per schema
    #[serde(default = "default_max_schema_elements")]
    pub max_schema_elements: usize,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    ["typescript", "python", "go", "java", "rust"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_schema_elements() -> usize {
    50_000
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            strictness: Strictness::Standard,
            include_upgrade_guidance: true,
            include_detailed_diff: false,
            categories: Vec::new(),
            ignore_paths: Vec::new(),
        }
    }
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_schema_elements: default_max_schema_elements(),
        }
    }
}

impl CompatConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, optionally adding a required file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-compat.toml",
            ".schema-compat.toml",
            "config/schema-compat.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-compat") {
            let xdg_config = config_dir.config_dir().join("schema-compat.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_COMPAT__VERDICT__STANDARD_INCOMPATIBLE_ABOVE=20
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_COMPAT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = self
            .to_toml()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompatConfig::default();
        assert_eq!(config.analysis.strictness, Strictness::Standard);
        assert!(config.analysis.include_upgrade_guidance);
        assert_eq!(config.verdict.lenient_incompatible_above, 5);
        assert_eq!(config.verdict.standard_incompatible_above, 10);
        assert_eq!(config.impact.languages.len(), 5);
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = CompatConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[verdict]"));
        assert!(toml_str.contains("standard_incompatible_above = 10"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[analysis]\nstrictness = \"lenient\"\ncategories = [\"types\"]\n\n[verdict]\nlenient_incompatible_above = 2\n",
        )
        .unwrap();

        let config = CompatConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.analysis.strictness, Strictness::Lenient);
        assert_eq!(config.analysis.categories, vec![AnalysisCategory::Types]);
        assert_eq!(config.verdict.lenient_incompatible_above, 2);
        assert_eq!(config.verdict.standard_incompatible_above, 10);
        assert_eq!(config.limits.max_schema_elements, 50_000);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = CompatConfig::default();
        config.limits.max_schema_elements = 42;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = CompatConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.limits.max_schema_elements, 42);
    }
}
