use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::EtlConfig;
use crate::constants;
use crate::error::CleaningError;
use crate::observability::metrics;
use crate::pipeline::processing::coerce::{widen_mixed_numeric, CoercionReport, TypeCoercer};
use crate::types::{RecordTable, Value};

/// What the cleaner did to a table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub date_coercion: CoercionReport,
    /// Columns mixing integers and floats that were widened to floats
    pub widened_columns: Vec<String>,
    /// Exact duplicates removed right after date coercion
    pub duplicates_removed: usize,
    /// Rows that only became identical after null filling and text normalization
    pub late_duplicates_removed: usize,
    pub nulls_filled: Vec<(String, usize)>,
    /// Rows whose Profit Margin was forced to zero (zero sales or non-finite ratio)
    pub zero_margins: usize,
    pub rows_out: usize,
}

/// Turns a raw or partially typed Superstore table into the cleaned table.
pub struct Cleaner {
    date_coercer: TypeCoercer,
    date_columns: Vec<String>,
    zero_fill_columns: Vec<String>,
    categorical_columns: Vec<String>,
}

impl Cleaner {
    pub fn new(
        date_columns: Vec<String>,
        zero_fill_columns: Vec<String>,
        categorical_columns: Vec<String>,
    ) -> Self {
        Self {
            date_coercer: TypeCoercer::new(date_columns.clone(), Vec::new()),
            date_columns,
            zero_fill_columns,
            categorical_columns,
        }
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            config.schema.date_columns.clone(),
            config.cleaning.zero_fill_columns.clone(),
            config.cleaning.categorical_columns.clone(),
        )
    }

    /// Run the cleaning sequence. The input is consumed; on error nothing is
    /// returned, so a partially cleaned table can never escape.
    ///
    /// Steps, in order:
    /// 1. coerce the date columns (null on failure), then widen integers in
    ///    any column that also holds floats
    /// 2. drop exact duplicate rows
    /// 3. fill nulls in the zero-fill columns with 0
    /// 4. trim and title-case the categorical columns
    /// 5. derive Profit Margin = Profit / Sales, 0 when not finite
    ///
    /// A last duplicate pass runs after step 5 so the output rows are pairwise
    /// distinct even when steps 3 and 4 made two rows identical.
    pub fn clean(&self, mut table: RecordTable) -> Result<(RecordTable, CleaningReport), CleaningError> {
        self.check_columns(&table)?;
        info!("Starting data cleaning on {} rows", table.len());

        let mut report = CleaningReport {
            rows_in: table.len(),
            ..CleaningReport::default()
        };

        report.date_coercion = self.date_coercer.coerce_dates(&mut table);

        // Int and Float cells that are equal once stored must compare equal here too
        for idx in 0..table.columns().len() {
            if widen_mixed_numeric(&mut table, idx) {
                debug!("Widened integers to floats in '{}'", table.columns()[idx]);
                report.widened_columns.push(table.columns()[idx].clone());
            }
        }

        report.duplicates_removed = drop_duplicates(&mut table);
        debug!("Removed {} duplicate rows", report.duplicates_removed);

        for column in &self.zero_fill_columns {
            let filled = fill_nulls_with_zero(&mut table, column)?;
            metrics::clean::nulls_filled(column, filled);
            report.nulls_filled.push((column.clone(), filled));
        }

        for column in &self.categorical_columns {
            normalize_text_column(&mut table, column)?;
        }

        report.zero_margins = add_profit_margin(&mut table)?;

        report.late_duplicates_removed = drop_duplicates(&mut table);
        report.rows_out = table.len();

        metrics::clean::rows(report.rows_in, report.rows_out);
        metrics::clean::duplicates_removed(report.duplicates_removed + report.late_duplicates_removed);
        metrics::clean::zero_margins(report.zero_margins);
        info!(
            "Data cleaning completed: {} rows in, {} rows out ({} duplicates removed)",
            report.rows_in,
            report.rows_out,
            report.duplicates_removed + report.late_duplicates_removed
        );

        Ok((table, report))
    }

    fn check_columns(&self, table: &RecordTable) -> Result<(), CleaningError> {
        let required = self
            .date_columns
            .iter()
            .chain(&self.zero_fill_columns)
            .chain(&self.categorical_columns)
            .map(String::as_str)
            .chain([constants::SALES, constants::PROFIT]);
        for column in required {
            if !table.has_column(column) {
                return Err(CleaningError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::from_config(&EtlConfig::default())
    }
}

/// Remove rows equal in every column to an earlier row. Returns how many were removed.
pub fn drop_duplicates(table: &mut RecordTable) -> usize {
    let before = table.len();
    let mut seen = HashSet::with_capacity(before);
    table.retain_rows(|row| seen.insert(row.clone()));
    before - table.len()
}

fn column(table: &RecordTable, name: &str) -> Result<usize, CleaningError> {
    table
        .column_index(name)
        .ok_or_else(|| CleaningError::MissingColumn(name.to_string()))
}

fn fill_nulls_with_zero(table: &mut RecordTable, name: &str) -> Result<usize, CleaningError> {
    let idx = column(table, name)?;
    let zero = if table.column_values(idx).any(|v| matches!(v, Value::Float(_))) {
        Value::Float(0.0)
    } else {
        Value::Int(0)
    };
    let mut filled = 0;
    for row in table.rows_mut() {
        if row[idx].is_null() {
            row[idx] = zero.clone();
            filled += 1;
        }
    }
    Ok(filled)
}

fn normalize_text_column(table: &mut RecordTable, name: &str) -> Result<(), CleaningError> {
    let idx = column(table, name)?;
    for row in table.rows_mut() {
        if let Value::Text(s) = &row[idx] {
            row[idx] = Value::Text(title_case(s.trim()));
        }
    }
    Ok(())
}

/// Upper-case a letter that starts the string or follows a non-letter,
/// lower-case every other letter.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Profit / Sales, or 0 when the ratio is infinite or undefined.
pub fn profit_margin(profit: f64, sales: f64) -> f64 {
    let ratio = profit / sales;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

fn measure(value: &Value, column: &str, row: usize) -> Result<f64, CleaningError> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Int(_) | Value::Float(_) => Ok(value.as_f64().unwrap_or(f64::NAN)),
        other => Err(CleaningError::NonNumeric {
            column: column.to_string(),
            row,
            value: other.render(),
        }),
    }
}

fn add_profit_margin(table: &mut RecordTable) -> Result<usize, CleaningError> {
    let sales_idx = column(table, constants::SALES)?;
    let profit_idx = column(table, constants::PROFIT)?;

    let mut margins = Vec::with_capacity(table.len());
    let mut zeroed = 0;
    for (i, row) in table.rows().iter().enumerate() {
        let sales = measure(&row[sales_idx], constants::SALES, i)?;
        let profit = measure(&row[profit_idx], constants::PROFIT, i)?;
        let margin = profit_margin(profit, sales);
        if !(profit / sales).is_finite() {
            zeroed += 1;
        }
        margins.push(Value::Float(margin));
    }

    table
        .set_column(constants::PROFIT_MARGIN, margins)
        .map_err(|_| CleaningError::MissingColumn(constants::PROFIT_MARGIN.to_string()))?;
    Ok(zeroed)
}
