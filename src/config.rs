/// Explorer configuration
///
/// Everything the pipeline needs that is not a per-interaction parameter:
/// where the dataset lives, how to parse it, which columns are identifiers,
/// and the minimum group size for summaries.

use crate::error::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the dataset location.
pub const DATA_PATH_ENV: &str = "MAPSCOPE_DATA";

pub const DEFAULT_DATA_PATH: &str = "student_table_enriched.csv";
pub const DEFAULT_MIN_GROUP_SIZE: usize = 5;
/// Text stored in identifier columns when the source cell is empty.
pub const DEFAULT_MISSING_SENTINEL: &str = "nan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub data_path: PathBuf,
    pub delimiter: char,
    pub min_group_size: usize,
    pub missing_sentinel: String,
    /// Columns normalized to strings at load time
    pub identifier_columns: Vec<String>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            delimiter: ',',
            min_group_size: DEFAULT_MIN_GROUP_SIZE,
            missing_sentinel: DEFAULT_MISSING_SENTINEL.to_string(),
            identifier_columns: vec![
                "grade_2015".to_string(),
                "school_2015".to_string(),
                "mat_teacher_1".to_string(),
                "ela_teacher_1".to_string(),
            ],
        }
    }
}

impl ExplorerConfig {
    /// Defaults, with `data_path` taken from `MAPSCOPE_DATA` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(DATA_PATH_ENV) {
            if !path.trim().is_empty() {
                config.data_path = PathBuf::from(path);
            }
        }
        config
    }

    /// Read a JSON configuration file. Omitted fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: ExplorerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_group_size == 0 {
            return Err(ExplorerError::Config("min_group_size must be at least 1".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(ExplorerError::Config(format!(
                "delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        Ok(())
    }

    pub fn is_identifier(&self, column: &str) -> bool {
        self.identifier_columns.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ExplorerConfig::default();
        assert_eq!(config.min_group_size, 5);
        assert_eq!(config.missing_sentinel, "nan");
        assert!(config.is_identifier("mat_teacher_1"));
        assert!(!config.is_identifier("attendance_rate"));
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data_path": "scores.csv", "min_group_size": 3}}"#).unwrap();

        let config = ExplorerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.data_path, PathBuf::from("scores.csv"));
        assert_eq!(config.min_group_size, 3);
        assert_eq!(config.delimiter, ',');
    }

    #[test]
    fn test_from_json_file_rejects_zero_group_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_group_size": 0}}"#).unwrap();

        let err = ExplorerConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ExplorerError::Config(_)));
    }
}
