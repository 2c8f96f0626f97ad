//! Configuration handling
//!
//! Manages the `modelset.toml` configuration file.
//!
//! ## Environment Variables
//!
//! The following environment variables override config file settings:
//!
//! - `MODELSET_DIALECT` - Target dialect (`sqlserver` or `mysql`)
//! - `MODELSET_DIALECT_VERSION` - Dialect version (`2008`, `2012`, `2016`, `5.7`, `8.0`)
//! - `MODELSET_LOG` - Log filter directive
//!
//! These can be set in a `.env` file next to the config file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::DataSetOptions;
use crate::error::{DataError, DataResult};
use crate::sql::Dialect;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "modelset.toml";

/// Environment variable names
pub const ENV_DIALECT: &str = "MODELSET_DIALECT";
pub const ENV_DIALECT_VERSION: &str = "MODELSET_DIALECT_VERSION";
pub const ENV_LOG: &str = "MODELSET_LOG";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dialect: DialectConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Target SQL dialect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_kind() -> String {
    "sqlserver".to_string()
}

fn default_version() -> String {
    "2016".to_string()
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            version: default_version(),
        }
    }
}

/// Synthetic row policies for DataSets built by the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub eof_row: bool,
    #[serde(default)]
    pub empty_row: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default)]
    pub filter: Option<String>,
}

impl std::str::FromStr for Config {
    type Err = DataError;

    fn from_str(content: &str) -> DataResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from a directory
    ///
    /// Loads any `.env` file in the directory first and applies environment
    /// overrides last. A missing config file yields the defaults.
    pub fn load(dir: &Path) -> DataResult<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            // A malformed .env only loses its overrides
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        debug!(dialect = %config.dialect()?, "Configuration loaded");
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps an environment variable
    /// name to its value. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(kind) = lookup(ENV_DIALECT) {
            self.dialect.kind = kind;
        }
        if let Some(version) = lookup(ENV_DIALECT_VERSION) {
            self.dialect.version = version;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.logging.filter = Some(filter);
        }
    }

    pub fn validate(&self) -> DataResult<()> {
        self.dialect()?;
        self.options().validate()
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> DataResult<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content =
            toml::to_string_pretty(self).map_err(|e| DataError::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn dialect(&self) -> DataResult<Dialect> {
        Dialect::parse(&self.dialect.kind, &self.dialect.version)
    }

    pub fn options(&self) -> DataSetOptions {
        DataSetOptions {
            eof_row: self.dataset.eof_row,
            empty_row: self.dataset.empty_row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{MySqlVersion, SqlServerVersion};

    #[test]
    fn test_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.dialect().unwrap(),
            Dialect::SqlServer(SqlServerVersion::V2016)
        );
        assert_eq!(config.options(), DataSetOptions::default());
    }

    #[test]
    fn test_sections() {
        let config: Config = r#"
            [dialect]
            kind = "mysql"
            version = "5.7"

            [dataset]
            eof_row = true

            [logging]
            filter = "modelset=debug"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.dialect().unwrap(), Dialect::MySql(MySqlVersion::V5_7));
        assert!(config.options().eof_row);
        assert_eq!(config.logging.filter.as_deref(), Some("modelset=debug"));
    }

    #[test]
    fn test_invalid_configs() {
        let both = "[dataset]\neof_row = true\nempty_row = true\n";
        assert!(matches!(both.parse::<Config>(), Err(DataError::Config(_))));
        let dialect = "[dialect]\nkind = \"oracle\"\n";
        assert!(matches!(dialect.parse::<Config>(), Err(DataError::Config(_))));
        assert!(matches!("[dialect".parse::<Config>(), Err(DataError::Toml(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            ENV_DIALECT => Some("mysql".to_string()),
            ENV_DIALECT_VERSION => Some("8.0".to_string()),
            ENV_LOG => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.dialect().unwrap(), Dialect::MySql(MySqlVersion::V8_0));
        assert_eq!(config.logging.filter, None);
    }
}
