//! In-memory adapters for exercising the use cases without touching disk.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::app::ports::{AlertPort, AnalyticsSink, CleanedTableStore, RawTableSource, TaskAlert};
use crate::error::{EtlError, Result};
use crate::infra::artifact::sha256_bytes;
use crate::pipeline::processing::aggregate::{
    CategoryPerformanceRow, CategorySummaryRow, LossMakingProductRow, RegionalPerformanceRow,
    TrendRow,
};
use crate::types::{ArtifactRecord, RecordTable};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn digest<T: Serialize + ?Sized>(name: &str, value: &T, rows: usize) -> Result<ArtifactRecord> {
    let bytes = serde_json::to_vec(value)?;
    Ok(ArtifactRecord {
        path: format!("memory://{}", name).into(),
        rows,
        sha256: sha256_bytes(&bytes),
    })
}

/// Serves a fixed raw table
pub struct InMemoryTableSource {
    table: RecordTable,
}

impl InMemoryTableSource {
    pub fn new(table: RecordTable) -> Self {
        Self { table }
    }
}

impl RawTableSource for InMemoryTableSource {
    fn read_raw(&self) -> Result<RecordTable> {
        Ok(self.table.clone())
    }

    fn describe(&self) -> String {
        "memory://raw".to_string()
    }
}

/// Holds the last cleaned table written. Clones share the same slot.
#[derive(Clone, Default)]
pub struct InMemoryTableStore {
    table: Arc<Mutex<Option<RecordTable>>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: RecordTable) -> Self {
        Self {
            table: Arc::new(Mutex::new(Some(table))),
        }
    }

    pub fn snapshot(&self) -> Option<RecordTable> {
        lock(&self.table).clone()
    }
}

impl CleanedTableStore for InMemoryTableStore {
    fn write_cleaned(&self, table: &RecordTable) -> Result<ArtifactRecord> {
        *lock(&self.table) = Some(table.clone());
        digest("cleaned", &table.rows(), table.len())
    }

    fn read_cleaned(&self) -> Result<RecordTable> {
        lock(&self.table)
            .clone()
            .ok_or_else(|| EtlError::Artifact("no cleaned table has been written".to_string()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct CapturedAnalytics {
    pub trend: Option<Vec<TrendRow>>,
    pub category_performance: Option<Vec<CategoryPerformanceRow>>,
    pub loss_making_products: Option<Vec<LossMakingProductRow>>,
    pub regional_performance: Option<Vec<RegionalPerformanceRow>>,
    pub category_summary: Option<Vec<CategorySummaryRow>>,
}

/// Captures every summary written to it. Clones share the same capture.
#[derive(Clone, Default)]
pub struct InMemoryAnalyticsSink {
    captured: Arc<Mutex<CapturedAnalytics>>,
}

impl InMemoryAnalyticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> CapturedAnalytics {
        lock(&self.captured).clone()
    }
}

impl AnalyticsSink for InMemoryAnalyticsSink {
    fn write_trend(&self, rows: &[TrendRow]) -> Result<ArtifactRecord> {
        lock(&self.captured).trend = Some(rows.to_vec());
        digest("sales_profit_trend", rows, rows.len())
    }

    fn write_category_performance(&self, rows: &[CategoryPerformanceRow]) -> Result<ArtifactRecord> {
        lock(&self.captured).category_performance = Some(rows.to_vec());
        digest("category_performance", rows, rows.len())
    }

    fn write_loss_making_products(&self, rows: &[LossMakingProductRow]) -> Result<ArtifactRecord> {
        lock(&self.captured).loss_making_products = Some(rows.to_vec());
        digest("loss_making_products", rows, rows.len())
    }

    fn write_regional_performance(&self, rows: &[RegionalPerformanceRow]) -> Result<ArtifactRecord> {
        lock(&self.captured).regional_performance = Some(rows.to_vec());
        digest("regional_performance", rows, rows.len())
    }

    fn write_category_summary(&self, rows: &[CategorySummaryRow]) -> Result<ArtifactRecord> {
        lock(&self.captured).category_summary = Some(rows.to_vec());
        digest("category_summary", rows, rows.len())
    }
}

/// Records alerts instead of sending them
#[derive(Clone, Default)]
pub struct RecordingAlertPort {
    alerts: Arc<Mutex<Vec<TaskAlert>>>,
}

impl RecordingAlertPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<TaskAlert> {
        lock(&self.alerts).clone()
    }
}

impl AlertPort for RecordingAlertPort {
    fn alert(&self, alert: &TaskAlert) {
        lock(&self.alerts).push(alert.clone());
    }
}
