pub mod artifact;
pub mod csv_sink;
pub mod csv_source;
pub mod log_alert;
pub mod memory;
pub mod parquet_store;

pub use csv_sink::CsvAnalyticsSink;
pub use csv_source::CsvTableSource;
pub use log_alert::LogAlertAdapter;
pub use parquet_store::ParquetTableStore;
