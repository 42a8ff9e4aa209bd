use crate::constants;
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tunables for a single ETL run. Every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub table_name: String,
    pub join_key: String,
    pub categories_column: String,
    pub category_delimiter: char,
    pub binarize_columns: Vec<String>,
    pub drop_columns: Vec<String>,
    /// Require every row's category names to match the first row's
    pub strict_layout: bool,
    pub summary_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            table_name: constants::DEFAULT_TABLE_NAME.to_string(),
            join_key: constants::ID_COLUMN.to_string(),
            categories_column: constants::CATEGORIES_COLUMN.to_string(),
            category_delimiter: constants::CATEGORY_DELIMITER,
            binarize_columns: constants::default_binarize_columns(),
            drop_columns: constants::default_drop_columns(),
            strict_layout: true,
            summary_path: None,
            metrics_path: None,
        }
    }
}

impl EtlConfig {
    /// Resolve the config: defaults, then the TOML file named by `ETL_CONFIG`
    /// (or `etl.toml` if present), then environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var(constants::CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ if Path::new(constants::DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(constants::DEFAULT_CONFIG_FILE)?
            }
            _ => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: EtlConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(table) = std::env::var("ETL_TABLE_NAME") {
            if !table.trim().is_empty() {
                self.table_name = table.trim().to_string();
            }
        }
        if let Ok(strict) = std::env::var("ETL_STRICT_LAYOUT") {
            self.strict_layout = parse_bool(&strict).ok_or_else(|| {
                EtlError::Config(format!("ETL_STRICT_LAYOUT must be true or false, got '{}'", strict))
            })?;
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
