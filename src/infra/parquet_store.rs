//! Parquet handoff for the cleaned table.
//!
//! Column types are chosen per column from the values it holds: timestamps map
//! to `Timestamp(Microsecond)`, integers to `Int64`, numbers with any float to
//! `Float64`, and anything mixed or textual to `Utf8`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Float64Builder, Int64Array, Int64Builder, StringArray,
    StringBuilder, TimestampMicrosecondArray, TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use crate::app::ports::CleanedTableStore;
use crate::error::{EtlError, Result};
use crate::infra::artifact::{record_artifact, write_atomically};
use crate::types::{ArtifactRecord, RecordTable, Row, Value};

pub struct ParquetTableStore {
    path: PathBuf,
}

impl ParquetTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CleanedTableStore for ParquetTableStore {
    fn write_cleaned(&self, table: &RecordTable) -> Result<ArtifactRecord> {
        write_parquet(&self.path, table)?;
        record_artifact(&self.path, table.len())
    }

    fn read_cleaned(&self) -> Result<RecordTable> {
        read_parquet(&self.path)
    }
}

fn column_type(table: &RecordTable, idx: usize) -> DataType {
    let (mut text, mut ts, mut int, mut float) = (false, false, false, false);
    for value in table.column_values(idx) {
        match value {
            Value::Null => {}
            Value::Text(_) => text = true,
            Value::Timestamp(_) => ts = true,
            Value::Int(_) => int = true,
            Value::Float(_) => float = true,
        }
    }
    let numeric = int || float;
    if text || (ts && numeric) || !(ts || numeric) {
        DataType::Utf8
    } else if ts {
        DataType::Timestamp(TimeUnit::Microsecond, None)
    } else if float {
        DataType::Float64
    } else {
        DataType::Int64
    }
}

fn build_array(table: &RecordTable, idx: usize, data_type: &DataType) -> ArrayRef {
    let values = table.column_values(idx);
    match data_type {
        DataType::Timestamp(_, _) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(table.len());
            for v in values {
                builder.append_option(v.as_timestamp().map(|ts| ts.and_utc().timestamp_micros()));
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(table.len());
            for v in values {
                builder.append_option(match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                });
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(table.len());
            for v in values {
                builder.append_option(v.as_f64());
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::new();
            for v in values {
                if v.is_null() {
                    builder.append_null();
                } else {
                    builder.append_value(v.render());
                }
            }
            Arc::new(builder.finish())
        }
    }
}

pub fn write_parquet(path: &Path, table: &RecordTable) -> Result<()> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());
    for (idx, name) in table.columns().iter().enumerate() {
        let data_type = column_type(table, idx);
        arrays.push(build_array(table, idx, &data_type));
        fields.push(Field::new(name, data_type, true));
    }
    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    write_atomically(path, |file| {
        let mut writer = ArrowWriter::try_new(file, schema, Some(properties))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })?;

    info!(
        "Saved cleaned table to {} ({} rows, {} columns)",
        path.display(),
        table.len(),
        table.columns().len()
    );
    Ok(())
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, column: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        EtlError::Artifact(format!(
            "column '{}' does not match its declared type {:?}",
            column,
            array.data_type()
        ))
    })
}

fn read_column(array: &ArrayRef, column: &str) -> Result<Vec<Value>> {
    let len = array.len();
    let mut out = Vec::with_capacity(len);
    match array.data_type() {
        DataType::Utf8 => {
            let a = downcast::<StringArray>(array, column)?;
            for i in 0..len {
                out.push(if a.is_null(i) { Value::Null } else { Value::Text(a.value(i).to_string()) });
            }
        }
        DataType::Int64 => {
            let a = downcast::<Int64Array>(array, column)?;
            for i in 0..len {
                out.push(if a.is_null(i) { Value::Null } else { Value::Int(a.value(i)) });
            }
        }
        DataType::Float64 => {
            let a = downcast::<Float64Array>(array, column)?;
            for i in 0..len {
                out.push(if a.is_null(i) { Value::Null } else { Value::Float(a.value(i)) });
            }
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let a = downcast::<TimestampMicrosecondArray>(array, column)?;
            for i in 0..len {
                let value = if a.is_null(i) {
                    Value::Null
                } else {
                    DateTime::from_timestamp_micros(a.value(i))
                        .map_or(Value::Null, |dt| Value::Timestamp(dt.naive_utc()))
                };
                out.push(value);
            }
        }
        other => {
            return Err(EtlError::Artifact(format!(
                "unsupported type {:?} for column '{}'",
                other, column
            )))
        }
    }
    Ok(out)
}

pub fn read_parquet(path: &Path) -> Result<RecordTable> {
    info!("Loading cleaned table from {}", path.display());
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut table = RecordTable::new(columns.clone());
    for batch in reader {
        let batch = batch?;
        let decoded = batch
            .columns()
            .iter()
            .zip(&columns)
            .map(|(array, name)| read_column(array, name))
            .collect::<Result<Vec<_>>>()?;

        for row_idx in 0..batch.num_rows() {
            let row: Row = decoded.iter().map(|col| col[row_idx].clone()).collect();
            table.push_row(row)?;
        }
        debug!("Decoded batch of {} rows", batch.num_rows());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn cleaned() -> RecordTable {
        let ts = NaiveDate::from_ymd_opt(2016, 11, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RecordTable::from_rows(
            vec![
                "Order Date".into(),
                "Region".into(),
                "Postal Code".into(),
                "Sales".into(),
                "Profit Margin".into(),
            ],
            vec![
                vec![Value::Timestamp(ts), "South".into(), Value::Int(42420), Value::Float(261.96), Value::Float(0.16)],
                vec![Value::Null, Value::Null, Value::Int(0), Value::Float(0.0), Value::Float(0.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn picks_arrow_types_from_values() {
        let table = cleaned();
        assert_eq!(column_type(&table, 0), DataType::Timestamp(TimeUnit::Microsecond, None));
        assert_eq!(column_type(&table, 1), DataType::Utf8);
        assert_eq!(column_type(&table, 2), DataType::Int64);
        assert_eq!(column_type(&table, 3), DataType::Float64);
    }

    #[test]
    fn round_trip_preserves_table() {
        let dir = tempdir().unwrap();
        let store = ParquetTableStore::new(dir.path().join("processed/cleaned.parquet"));
        let table = cleaned();

        let artifact = store.write_cleaned(&table).unwrap();
        assert_eq!(artifact.rows, 2);

        let back = store.read_cleaned().unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_parquet(&dir.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, EtlError::Io(_)));
    }
}
