//! Configuration management for the model build
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-model.toml)
//! - Environment variables (SCHEMA_MODEL__*)
//!
//! ## Example config file (schema-model.toml):
//! ```toml
//! [sources]
//! registry_dir = "./registry-schemas"
//! legacy_spec = "./legacy/specification.json"
//!
//! [build]
//! attribute_pointer = "/readOnlyProperties"
//! standard_rules = true
//! stateful_resources = ["AWS::S3::Bucket", "AWS::RDS::DBInstance"]
//!
//! [build.regions]
//! us-east-1 = ["AWS::S3::Bucket"]
//!
//! [output]
//! snapshot = "model.json"
//! report_dir = "reports"
//! pretty = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::build::{BuildOptions, DEFAULT_ATTRIBUTE_POINTER};

/// Main configuration for a model build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Where the source documents live
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Pipeline settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
}

/// Source locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Directory of per-resource registry schemas (`*.json`)
    #[serde(default = "default_registry_dir")]
    pub registry_dir: PathBuf,

    /// Legacy resource specification
    #[serde(default)]
    pub legacy_spec: Option<PathBuf>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Pointer to the attribute list in each registry document
    #[serde(default = "default_attribute_pointer")]
    pub attribute_pointer: String,

    /// Install the standard canonicalization rules
    #[serde(default = "default_true")]
    pub standard_rules: bool,

    /// Resource types marked stateful after the build
    #[serde(default)]
    pub stateful_resources: Vec<String>,

    /// Region name to resource types available there
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<String>>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot file
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    /// Directory for per-audience build reports
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Pretty-print the snapshot
    #[serde(default)]
    pub pretty: bool,
}

// Default value functions
fn default_registry_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_attribute_pointer() -> String {
    DEFAULT_ATTRIBUTE_POINTER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            registry_dir: default_registry_dir(),
            legacy_spec: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            attribute_pointer: default_attribute_pointer(),
            standard_rules: true,
            stateful_resources: Vec::new(),
            regions: BTreeMap::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            report_dir: default_report_dir(),
            pretty: false,
        }
    }
}

impl ModelConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, with an explicit file taking priority over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["schema-model.toml", ".schema-model.toml", "config/schema-model.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-model") {
            let xdg_config = config_dir.config_dir().join("schema-model.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Load from environment variables (SCHEMA_MODEL__BUILD__PRETTY=...)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_MODEL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Builder settings derived from this configuration
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            attribute_pointer: self.build.attribute_pointer.clone(),
        }
    }

    /// Resolve a configured path against the current directory
    pub fn resolve_path(path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}
