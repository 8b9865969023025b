use std::collections::HashSet;
use tracing::{error, info};

use crate::constants;
use crate::error::SchemaError;
use crate::observability::metrics;
use crate::types::RecordTable;

/// Gate that checks a loaded table carries every expected column.
///
/// Column order in the table is not significant, only presence. The check
/// never touches the table's rows.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    expected: Vec<String>,
}

impl SchemaValidator {
    pub fn new(expected: Vec<String>) -> Self {
        Self { expected }
    }

    /// Expected columns absent from the table, in expected-column order
    pub fn missing_columns(&self, table: &RecordTable) -> Vec<String> {
        let actual: HashSet<&str> = table.columns().iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        self.expected
            .iter()
            .filter(|c| !actual.contains(c.as_str()))
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }

    pub fn validate(&self, table: &RecordTable) -> Result<(), SchemaError> {
        let missing = self.missing_columns(table);
        if !missing.is_empty() {
            error!("Schema validation failed. Missing columns: {:?}", missing);
            metrics::ingest::schema_failure(missing.len());
            return Err(SchemaError { missing });
        }
        info!("Schema validation passed");
        Ok(())
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(constants::owned(&constants::EXPECTED_COLUMNS))
    }
}
