use crate::error::Result;
use crate::pipeline::processing::aggregate::{
    CategoryPerformanceRow, CategorySummaryRow, LossMakingProductRow, RegionalPerformanceRow,
    TrendRow,
};
use crate::types::{ArtifactRecord, RecordTable};

/// Where the raw delimited input comes from
pub trait RawTableSource: Send + Sync {
    fn read_raw(&self) -> Result<RecordTable>;
    fn describe(&self) -> String;
}

/// Durable handoff of the cleaned table between silver and gold
pub trait CleanedTableStore: Send + Sync {
    fn write_cleaned(&self, table: &RecordTable) -> Result<ArtifactRecord>;
    fn read_cleaned(&self) -> Result<RecordTable>;
}

/// Output for the summary tables
pub trait AnalyticsSink: Send + Sync {
    fn write_trend(&self, rows: &[TrendRow]) -> Result<ArtifactRecord>;
    fn write_category_performance(&self, rows: &[CategoryPerformanceRow]) -> Result<ArtifactRecord>;
    fn write_loss_making_products(&self, rows: &[LossMakingProductRow]) -> Result<ArtifactRecord>;
    fn write_regional_performance(&self, rows: &[RegionalPerformanceRow]) -> Result<ArtifactRecord>;
    fn write_category_summary(&self, rows: &[CategorySummaryRow]) -> Result<ArtifactRecord>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAlert {
    pub run_id: String,
    pub task: String,
    pub attempts: u32,
    pub error: String,
}

/// Notified once per task that fails after exhausting its retries
pub trait AlertPort: Send + Sync {
    fn alert(&self, alert: &TaskAlert);
}
