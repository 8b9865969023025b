use csv::WriterBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::app::ports::AnalyticsSink;
use crate::constants;
use crate::constants::{
    AVG_PROFIT_MARGIN, CATEGORY, ORDER_MONTH, PRODUCT_NAME, REGION, SUB_CATEGORY, TOTAL_PROFIT,
    TOTAL_SALES,
};
use crate::error::Result;
use crate::infra::artifact::{record_artifact, write_atomically};
use crate::pipeline::processing::aggregate::{
    CategoryPerformanceRow, CategorySummaryRow, LossMakingProductRow, RegionalPerformanceRow,
    TrendRow,
};
use crate::types::ArtifactRecord;

const TREND_HEADERS: [&str; 3] = [ORDER_MONTH, TOTAL_SALES, TOTAL_PROFIT];
const CATEGORY_PERFORMANCE_HEADERS: [&str; 4] = [CATEGORY, SUB_CATEGORY, TOTAL_SALES, TOTAL_PROFIT];
const LOSS_MAKING_HEADERS: [&str; 2] = [PRODUCT_NAME, TOTAL_PROFIT];
const REGIONAL_HEADERS: [&str; 3] = [REGION, TOTAL_SALES, TOTAL_PROFIT];
const CATEGORY_SUMMARY_HEADERS: [&str; 4] = [CATEGORY, TOTAL_SALES, TOTAL_PROFIT, AVG_PROFIT_MARGIN];

/// Writes each summary as a CSV table with a header row and no index column.
pub struct CsvAnalyticsSink {
    analytics_dir: PathBuf,
    category_summary_path: PathBuf,
}

impl CsvAnalyticsSink {
    pub fn new(analytics_dir: impl Into<PathBuf>, category_summary_path: impl Into<PathBuf>) -> Self {
        Self {
            analytics_dir: analytics_dir.into(),
            category_summary_path: category_summary_path.into(),
        }
    }

    fn in_dir(&self, file: &str) -> PathBuf {
        self.analytics_dir.join(file)
    }
}

/// The header is written up front so an empty summary still yields a valid table.
pub fn write_csv_rows<R: Serialize>(path: &Path, headers: &[&str], rows: &[R]) -> Result<ArtifactRecord> {
    write_atomically(path, |file| {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;
    record_artifact(path, rows.len())
}

impl AnalyticsSink for CsvAnalyticsSink {
    fn write_trend(&self, rows: &[TrendRow]) -> Result<ArtifactRecord> {
        write_csv_rows(&self.in_dir(constants::TREND_FILE), &TREND_HEADERS, rows)
    }

    fn write_category_performance(&self, rows: &[CategoryPerformanceRow]) -> Result<ArtifactRecord> {
        write_csv_rows(
            &self.in_dir(constants::CATEGORY_PERFORMANCE_FILE),
            &CATEGORY_PERFORMANCE_HEADERS,
            rows,
        )
    }

    fn write_loss_making_products(&self, rows: &[LossMakingProductRow]) -> Result<ArtifactRecord> {
        write_csv_rows(&self.in_dir(constants::LOSS_MAKING_FILE), &LOSS_MAKING_HEADERS, rows)
    }

    fn write_regional_performance(&self, rows: &[RegionalPerformanceRow]) -> Result<ArtifactRecord> {
        write_csv_rows(
            &self.in_dir(constants::REGIONAL_PERFORMANCE_FILE),
            &REGIONAL_HEADERS,
            rows,
        )
    }

    fn write_category_summary(&self, rows: &[CategorySummaryRow]) -> Result<ArtifactRecord> {
        write_csv_rows(&self.category_summary_path, &CATEGORY_SUMMARY_HEADERS, rows)
    }
}
