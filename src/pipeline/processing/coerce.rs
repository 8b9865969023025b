use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};
use serde::Serialize;
use tracing::{info, warn};

use crate::constants;
use crate::observability::metrics;
use crate::types::{RecordTable, Value};

const DATE_FORMATS: [&str; 4] = ["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y"];
const TIME_SUFFIXES: [&str; 3] = [" %H:%M:%S", " %H:%M", "T%H:%M:%S"];

/// Parse a date or date-time string. Date-only forms resolve to midnight.
/// Sub-second parts are cut to microseconds, the precision the cleaned table
/// is stored at.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    parse_timestamp_exact(raw).map(|ts| ts.trunc_subsecs(6))
}

fn parse_timestamp_exact(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for date_fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, date_fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
        for time_fmt in TIME_SUFFIXES {
            let fmt = format!("{}{}", date_fmt, time_fmt);
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, &fmt) {
                return Some(dt);
            }
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

/// Parse a numeric string. `NaN` is treated as missing.
pub fn parse_number(raw: &str) -> Option<Value> {
    let s = raw.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    match s.parse::<f64>() {
        Ok(f) if !f.is_nan() => Some(Value::Float(f)),
        _ => None,
    }
}

/// Best-effort conversion to a timestamp; anything unparseable becomes null.
pub fn coerce_date(value: &Value) -> Value {
    match value {
        Value::Timestamp(_) | Value::Null => value.clone(),
        Value::Text(s) => parse_timestamp(s).map_or(Value::Null, Value::Timestamp),
        Value::Int(_) | Value::Float(_) => Value::Null,
    }
}

/// Best-effort conversion to a number; anything unparseable becomes null.
pub fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Int(_) | Value::Null => value.clone(),
        Value::Float(f) if f.is_nan() => Value::Null,
        Value::Float(_) => value.clone(),
        Value::Text(s) => parse_number(s).unwrap_or(Value::Null),
        Value::Timestamp(_) => Value::Null,
    }
}

/// Give a column holding both integers and floats (and nothing but nulls
/// besides) a single numeric type by widening the integers. Returns whether
/// anything changed.
pub fn widen_mixed_numeric(table: &mut RecordTable, idx: usize) -> bool {
    let (mut int, mut float) = (false, false);
    for value in table.column_values(idx) {
        match value {
            Value::Null => {}
            Value::Int(_) => int = true,
            Value::Float(_) => float = true,
            Value::Text(_) | Value::Timestamp(_) => return false,
        }
    }
    if !(int && float) {
        return false;
    }
    for row in table.rows_mut() {
        if let Value::Int(i) = row[idx] {
            row[idx] = Value::Float(i as f64);
        }
    }
    true
}

/// Null counts for one designated column after coercion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCoercion {
    pub column: String,
    /// Nulls in the column after coercion, whether or not they were null before
    pub nulls: usize,
    /// Values that were present but could not be converted
    pub failures: usize,
}

/// Informational summary of a coercion pass. Never blocks the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub columns: Vec<ColumnCoercion>,
    /// Designated columns that were not present in the table
    pub skipped: Vec<String>,
}

impl CoercionReport {
    pub fn total_failures(&self) -> usize {
        self.columns.iter().map(|c| c.failures).sum()
    }

    pub fn for_column(&self, column: &str) -> Option<&ColumnCoercion> {
        self.columns.iter().find(|c| c.column == column)
    }
}

/// Upgrades designated columns from raw text to typed values in place.
///
/// Coercion is idempotent: typed values pass through unchanged, so a second
/// pass over the same table changes nothing and reports zero failures.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    date_columns: Vec<String>,
    numeric_columns: Vec<String>,
}

impl TypeCoercer {
    pub fn new(date_columns: Vec<String>, numeric_columns: Vec<String>) -> Self {
        Self {
            date_columns,
            numeric_columns,
        }
    }

    pub fn coerce(&self, table: &mut RecordTable) -> CoercionReport {
        let mut report = CoercionReport::default();
        self.coerce_dates_into(table, &mut report);
        self.coerce_numbers_into(table, &mut report);

        for c in &report.columns {
            metrics::ingest::coercion_nulls(&c.column, c.nulls);
            metrics::ingest::coercion_failures(&c.column, c.failures);
        }
        let counts: Vec<String> = report
            .columns
            .iter()
            .map(|c| format!("{}={} ({} invalid)", c.column, c.nulls, c.failures))
            .collect();
        info!("Null counts after coercion: {}", counts.join(", "));
        report
    }

    /// Only the date columns; used by the cleaner's first step.
    pub fn coerce_dates(&self, table: &mut RecordTable) -> CoercionReport {
        let mut report = CoercionReport::default();
        self.coerce_dates_into(table, &mut report);
        report
    }

    fn coerce_dates_into(&self, table: &mut RecordTable, report: &mut CoercionReport) {
        for column in &self.date_columns {
            let Some(idx) = table.column_index(column) else {
                warn!("Date column '{}' not present, skipping coercion", column);
                report.skipped.push(column.clone());
                continue;
            };
            let mut failures = 0;
            let mut nulls = 0;
            for row in table.rows_mut() {
                let coerced = coerce_date(&row[idx]);
                if coerced.is_null() {
                    nulls += 1;
                    if !row[idx].is_null() {
                        failures += 1;
                    }
                }
                row[idx] = coerced;
            }
            report.columns.push(ColumnCoercion {
                column: column.clone(),
                nulls,
                failures,
            });
        }
    }

    fn coerce_numbers_into(&self, table: &mut RecordTable, report: &mut CoercionReport) {
        for column in &self.numeric_columns {
            let Some(idx) = table.column_index(column) else {
                warn!("Numeric column '{}' not present, skipping coercion", column);
                report.skipped.push(column.clone());
                continue;
            };
            let mut failures = 0;
            let mut nulls = 0;
            for row in table.rows_mut() {
                let coerced = coerce_number(&row[idx]);
                if coerced.is_null() {
                    nulls += 1;
                    if !row[idx].is_null() {
                        failures += 1;
                    }
                }
                row[idx] = coerced;
            }
            widen_mixed_numeric(table, idx);
            report.columns.push(ColumnCoercion {
                column: column.clone(),
                nulls,
                failures,
            });
        }
    }
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(
            constants::owned(&constants::DATE_COLUMNS),
            constants::owned(&constants::NUMERIC_COLUMNS),
        )
    }
}
