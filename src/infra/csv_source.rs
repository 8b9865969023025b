use csv::{ByteRecord, ReaderBuilder};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::RawTableSource;
use crate::config::{Encoding, InputConfig};
use crate::error::{EtlError, Result};
use crate::types::{RecordTable, Row, Value};

/// Reads the raw Superstore extract from a delimited text file
pub struct CsvTableSource {
    path: PathBuf,
    input: InputConfig,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>, input: InputConfig) -> Self {
        Self {
            path: path.into(),
            input,
        }
    }
}

impl RawTableSource for CsvTableSource {
    fn read_raw(&self) -> Result<RecordTable> {
        read_csv_table(&self.path, &self.input)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn decode(bytes: &[u8], encoding: Encoding, line: u64) -> Result<String> {
    match encoding {
        // Every byte is a code point in Latin-1
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
            EtlError::Artifact(format!("invalid UTF-8 on line {}: {}", line, e))
        }),
    }
}

fn decode_record(record: &ByteRecord, encoding: Encoding) -> Result<Vec<String>> {
    let line = record.position().map_or(0, |p| p.line());
    record.iter().map(|field| decode(field, encoding, line)).collect()
}

/// Load a delimited file into a table, inferring a type for each cell.
pub fn read_csv_table(path: &Path, input: &InputConfig) -> Result<RecordTable> {
    info!("Reading raw data from {}", path.display());

    let mut reader = ReaderBuilder::new()
        .delimiter(input.delimiter as u8)
        .has_headers(true)
        .from_path(path)?;

    let mut columns = decode_record(reader.byte_headers()?, input.encoding)?;
    if let Some(first) = columns.first_mut() {
        if let Some(stripped) = first.strip_prefix('\u{feff}') {
            *first = stripped.to_string();
        }
    }

    let mut table = RecordTable::new(columns);
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let row: Row = decode_record(&record, input.encoding)?
            .iter()
            .map(|field| Value::infer(field))
            .collect();
        table.push_row(row)?;
    }

    info!("Raw data loaded: {} rows, {} columns", table.len(), table.columns().len());
    Ok(table)
}
