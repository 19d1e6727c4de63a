//! Configuration for record tooling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (records.toml)
//! - Environment variables (RECORDS__*)
//!
//! ## Example config file (records.toml):
//! ```toml
//! [schema]
//! strict = false
//!
//! [output]
//! format = "compact"
//! include_errors = true
//!
//! [logging]
//! filter = "familiar_records=debug"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::SchemaOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Options applied to schemas compiled by the tooling
    #[serde(default)]
    pub schema: SchemaOptions,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,

    /// Report recorded errors next to each exported record
    #[serde(default = "default_true")]
    pub include_errors: bool,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            include_errors: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl RecordsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["records.toml", ".records.toml", "config/records.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "records") {
            let xdg_config = dirs.config_dir().join("records.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("RECORDS")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn schema_options(&self) -> SchemaOptions {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecordsConfig::default();
        assert!(config.schema.strict);
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert!(config.output.include_errors);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_serialize_config() {
        let config = RecordsConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[schema]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("strict = true"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[schema]\nstrict = false\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = RecordsConfig::load_from(path.to_str()).unwrap();
        assert!(!config.schema_options().strict);
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert!(config.output.include_errors);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = RecordsConfig::default();
        config.logging.filter = "debug".to_string();
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = RecordsConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.logging.filter, "debug");
    }
}
