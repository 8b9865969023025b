//! The three units of work: bronze ingestion, silver transformation and gold
//! analytics. Each reads its input from disk and writes its output back, so
//! any of them can be re-run on its own.

use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::app::{AnalyticsUseCase, IngestUseCase, TransformUseCase};
use crate::config::EtlConfig;
use crate::constants;
use crate::error::Result;
use crate::infra::{CsvAnalyticsSink, CsvTableSource, ParquetTableStore};
use crate::observability::metrics;
use crate::pipeline::processing::clean::Cleaner;
use crate::types::ArtifactRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
    pub artifacts: Vec<ArtifactRecord>,
    pub notes: Vec<String>,
    pub duration_ms: u128,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            rows_in: 0,
            rows_out: 0,
            artifacts: Vec::new(),
            notes: Vec::new(),
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Bronze,
    Silver,
    Gold,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Bronze, Stage::Silver, Stage::Gold];

    pub fn task_name(&self) -> &'static str {
        match self {
            Stage::Bronze => constants::BRONZE_TASK,
            Stage::Silver => constants::SILVER_TASK,
            Stage::Gold => constants::GOLD_TASK,
        }
    }

    pub fn run(&self, config: &EtlConfig) -> Result<StageReport> {
        match self {
            Stage::Bronze => bronze_ingestion(config),
            Stage::Silver => silver_transformation(config),
            Stage::Gold => gold_analytics(config),
        }
    }
}

fn timed<F>(stage: &'static str, body: F) -> Result<StageReport>
where
    F: FnOnce(&mut StageReport) -> Result<()>,
{
    let start = Instant::now();
    let mut report = StageReport::new(stage);
    let result = body(&mut report);
    let elapsed = start.elapsed();
    match result {
        Ok(()) => {
            metrics::stage::completed(stage, elapsed.as_secs_f64());
            report.duration_ms = elapsed.as_millis();
            info!("Stage {} finished in {} ms", stage, report.duration_ms);
            Ok(report)
        }
        Err(e) => {
            metrics::stage::failed(stage, elapsed.as_secs_f64());
            error!("Stage {} failed: {}", stage, e);
            Err(e)
        }
    }
}

fn ingest_use_case(config: &EtlConfig) -> IngestUseCase {
    let source = CsvTableSource::new(&config.paths.raw_data, config.input.clone());
    IngestUseCase::from_config(Box::new(source), config)
}

/// Read the raw extract, validate its schema and report coercion results.
/// Writes nothing.
#[instrument(skip(config))]
pub fn bronze_ingestion(config: &EtlConfig) -> Result<StageReport> {
    timed(constants::BRONZE_TASK, |report| {
        let outcome = ingest_use_case(config).load()?;
        report.rows_in = outcome.profile.rows;
        report.rows_out = outcome.table.len();
        for c in &outcome.coercion.columns {
            report
                .notes
                .push(format!("{}: {} null ({} invalid)", c.column, c.nulls, c.failures));
        }
        info!("Data ingestion validation completed successfully");
        Ok(())
    })
}

/// Clean the raw extract and write the cleaned table plus the category summary.
#[instrument(skip(config))]
pub fn silver_transformation(config: &EtlConfig) -> Result<StageReport> {
    timed(constants::SILVER_TASK, |report| {
        let use_case = TransformUseCase::new(
            ingest_use_case(config),
            Cleaner::from_config(config),
            Box::new(ParquetTableStore::new(&config.paths.cleaned_data)),
            Box::new(CsvAnalyticsSink::new(
                &config.paths.analytics_dir,
                &config.paths.category_summary,
            )),
        );
        let outcome = use_case.run()?;
        report.rows_in = outcome.cleaning.rows_in;
        report.rows_out = outcome.cleaning.rows_out;
        report.notes.push(format!(
            "duplicates removed: {}",
            outcome.cleaning.duplicates_removed + outcome.cleaning.late_duplicates_removed
        ));
        report
            .notes
            .push(format!("zero profit margins: {}", outcome.cleaning.zero_margins));
        report.artifacts.push(outcome.cleaned);
        report.artifacts.push(outcome.category_summary);
        Ok(())
    })
}

/// Compute the four summaries from the cleaned table and write them as CSV.
#[instrument(skip(config))]
pub fn gold_analytics(config: &EtlConfig) -> Result<StageReport> {
    timed(constants::GOLD_TASK, |report| {
        let use_case = AnalyticsUseCase::new(
            Box::new(ParquetTableStore::new(&config.paths.cleaned_data)),
            Box::new(CsvAnalyticsSink::new(
                &config.paths.analytics_dir,
                &config.paths.category_summary,
            )),
        );
        let outcome = use_case.run()?;
        report.rows_in = outcome.rows_in;
        report.rows_out = outcome.artifacts.iter().map(|a| a.rows).sum();
        for (summary, dropped) in &outcome.dropped_rows {
            if *dropped > 0 {
                report
                    .notes
                    .push(format!("{}: {} rows with a null key dropped", summary, dropped));
            }
        }
        report.artifacts = outcome.artifacts;
        Ok(())
    })
}
