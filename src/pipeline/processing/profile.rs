use serde::Serialize;
use tracing::info;

use crate::types::RecordTable;

/// Shape, per-column null counts and a short preview of a loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: Vec<String>,
    pub null_counts: Vec<(String, usize)>,
    pub preview: Vec<Vec<String>>,
}

impl TableProfile {
    pub fn of(table: &RecordTable, preview_rows: usize) -> Self {
        let null_counts = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let nulls = table.column_values(idx).filter(|v| v.is_null()).count();
                (name.clone(), nulls)
            })
            .collect();

        let preview = table
            .rows()
            .iter()
            .take(preview_rows)
            .map(|row| row.iter().map(|v| v.render()).collect())
            .collect();

        Self {
            rows: table.len(),
            columns: table.columns().to_vec(),
            null_counts,
            preview,
        }
    }

    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|(_, n)| n).sum()
    }

    pub fn log(&self, label: &str) {
        info!("{} shape: ({}, {})", label, self.rows, self.columns.len());
        info!("{} columns: {}", label, self.columns.join(", "));
        let nulls: Vec<String> = self
            .null_counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(c, n)| format!("{}={}", c, n))
            .collect();
        if nulls.is_empty() {
            info!("{} has no missing values", label);
        } else {
            info!("{} missing values: {}", label, nulls.join(", "));
        }
        for (i, row) in self.preview.iter().enumerate() {
            info!("{} row {}: {}", label, i, row.join(" | "));
        }
    }
}
