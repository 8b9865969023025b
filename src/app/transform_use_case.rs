use tracing::info;

use crate::app::ingest_use_case::IngestUseCase;
use crate::app::ports::{AnalyticsSink, CleanedTableStore};
use crate::error::{AggregationFailures, Result};
use crate::pipeline::processing::aggregate;
use crate::pipeline::processing::clean::{Cleaner, CleaningReport};
use crate::types::ArtifactRecord;

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub cleaning: CleaningReport,
    pub cleaned: ArtifactRecord,
    pub category_summary: ArtifactRecord,
}

/// Silver stage: raw extract in, cleaned table and category summary out
pub struct TransformUseCase {
    ingest: IngestUseCase,
    cleaner: Cleaner,
    store: Box<dyn CleanedTableStore>,
    summary_sink: Box<dyn AnalyticsSink>,
}

impl TransformUseCase {
    pub fn new(
        ingest: IngestUseCase,
        cleaner: Cleaner,
        store: Box<dyn CleanedTableStore>,
        summary_sink: Box<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            ingest,
            cleaner,
            store,
            summary_sink,
        }
    }

    pub fn run(&self) -> Result<TransformOutcome> {
        let raw = self.ingest.load()?;
        let (cleaned, cleaning) = self.cleaner.clean(raw.table)?;

        // Nothing is written until both the table and its summary exist
        let summary = aggregate::category_summary(&cleaned).map_err(|e| AggregationFailures {
            failures: vec![e],
        })?;

        let cleaned_artifact = self.store.write_cleaned(&cleaned)?;
        let summary_artifact = self.summary_sink.write_category_summary(&summary.rows)?;
        info!(
            "Transformation complete: {} cleaned rows, {} categories",
            cleaned.len(),
            summary.rows.len()
        );

        Ok(TransformOutcome {
            cleaning,
            cleaned: cleaned_artifact,
            category_summary: summary_artifact,
        })
    }
}
