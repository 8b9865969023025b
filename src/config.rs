use crate::constants;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "etl_config.toml";

/// Everything a stage needs to know about where its inputs and outputs live
/// and which columns it works on. Passed explicitly into each stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EtlConfig {
    pub paths: PathsConfig,
    pub input: InputConfig,
    pub schema: SchemaConfig,
    pub cleaning: CleaningConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub cleaned_data: PathBuf,
    pub category_summary: PathBuf,
    pub analytics_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/raw/Sample - Superstore.csv"),
            cleaned_data: PathBuf::from("data/processed/superstore_cleaned.parquet"),
            category_summary: PathBuf::from("data/processed/category_sales_summary.csv"),
            analytics_dir: PathBuf::from("data/processed/analytics"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub encoding: Encoding,
    pub delimiter: char,
    /// Rows shown in the ingestion preview log line
    pub preview_rows: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Latin1,
            delimiter: ',',
            preview_rows: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    pub expected_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            expected_columns: constants::owned(&constants::EXPECTED_COLUMNS),
            date_columns: constants::owned(&constants::DATE_COLUMNS),
            numeric_columns: constants::owned(&constants::NUMERIC_COLUMNS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleaningConfig {
    pub zero_fill_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            zero_fill_columns: constants::owned(&constants::ZERO_FILL_COLUMNS),
            categorical_columns: constants::owned(&constants::CATEGORICAL_COLUMNS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay_secs: 300,
        }
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "etl.log".to_string(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                EtlError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!("Loaded configuration from {}", path.display());
            toml::from_str::<EtlConfig>(&content)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            EtlConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut PathBuf); 5] = [
            ("ETL_RAW_DATA", &mut self.paths.raw_data),
            ("ETL_CLEANED_DATA", &mut self.paths.cleaned_data),
            ("ETL_CATEGORY_SUMMARY", &mut self.paths.category_summary),
            ("ETL_ANALYTICS_DIR", &mut self.paths.analytics_dir),
            ("ETL_LOG_DIR", &mut self.logging.dir),
        ];
        for (var, slot) in overrides {
            if let Ok(v) = std::env::var(var) {
                if !v.trim().is_empty() {
                    debug!("{} overrides configured path", var);
                    *slot = PathBuf::from(v);
                }
            }
        }
    }

    /// Reject configurations the stages cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.schema.expected_columns.is_empty() {
            return Err(EtlError::Config(
                "schema.expected_columns must not be empty".to_string(),
            ));
        }
        if !self.input.delimiter.is_ascii() {
            return Err(EtlError::Config(format!(
                "input.delimiter '{}' must be a single ASCII character",
                self.input.delimiter
            )));
        }

        let designated = self
            .schema
            .date_columns
            .iter()
            .chain(&self.schema.numeric_columns)
            .chain(&self.cleaning.zero_fill_columns)
            .chain(&self.cleaning.categorical_columns);
        for column in designated {
            if !self.schema.expected_columns.contains(column) {
                return Err(EtlError::Config(format!(
                    "designated column '{}' is not in schema.expected_columns",
                    column
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_superstore_layout() {
        let config = EtlConfig::default();
        assert_eq!(config.schema.expected_columns.len(), 20);
        assert_eq!(config.schema.date_columns, vec!["Order Date", "Ship Date"]);
        assert_eq!(config.input.encoding, Encoding::Latin1);
        assert_eq!(config.schedule.retries, 2);
        assert_eq!(config.schedule.retry_delay(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etl_config.toml");
        fs::write(
            &path,
            r#"
[paths]
raw_data = "input/superstore.csv"

[schedule]
retries = 0
retry_delay_secs = 1
"#,
        )
        .unwrap();

        let config = EtlConfig::load(&path).unwrap();
        assert_eq!(config.paths.raw_data, PathBuf::from("input/superstore.csv"));
        assert_eq!(config.schedule.retries, 0);
        assert_eq!(config.schema, SchemaConfig::default());
        assert_eq!(config.cleaning, CleaningConfig::default());
    }

    #[test]
    fn rejects_designated_column_outside_schema() {
        let mut config = EtlConfig::default();
        config.schema.numeric_columns.push("Tax".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Tax"));
    }

    #[test]
    fn rejects_empty_expected_columns() {
        let mut config = EtlConfig::default();
        config.schema.expected_columns.clear();
        config.schema.date_columns.clear();
        config.schema.numeric_columns.clear();
        config.cleaning.zero_fill_columns.clear();
        config.cleaning.categorical_columns.clear();
        assert!(config.validate().is_err());
    }
}
