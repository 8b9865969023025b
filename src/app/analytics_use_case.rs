use tracing::{info, warn};

use crate::app::ports::{AnalyticsSink, CleanedTableStore};
use crate::error::Result;
use crate::pipeline::processing::aggregate::{self, Summary};
use crate::types::ArtifactRecord;

#[derive(Debug, Clone, Default)]
pub struct AnalyticsOutcome {
    pub rows_in: usize,
    pub artifacts: Vec<ArtifactRecord>,
    /// Rows left out of each summary for having a null grouping key
    pub dropped_rows: Vec<(&'static str, usize)>,
}

/// Gold stage: cleaned table in, the four summary tables out
pub struct AnalyticsUseCase {
    store: Box<dyn CleanedTableStore>,
    sink: Box<dyn AnalyticsSink>,
}

impl AnalyticsUseCase {
    pub fn new(store: Box<dyn CleanedTableStore>, sink: Box<dyn AnalyticsSink>) -> Self {
        Self { store, sink }
    }

    /// Every summary that computes is written, even if another fails. The
    /// failures are then returned together.
    pub fn run(&self) -> Result<AnalyticsOutcome> {
        let cleaned = self.store.read_cleaned()?;
        let analytics = aggregate::run_all(&cleaned);
        let mut outcome = AnalyticsOutcome {
            rows_in: cleaned.len(),
            ..AnalyticsOutcome::default()
        };

        fn keep<R>(
            outcome: &mut AnalyticsOutcome,
            name: &'static str,
            summary: &Summary<R>,
            written: Result<ArtifactRecord>,
        ) -> Result<()> {
            outcome.artifacts.push(written?);
            outcome.dropped_rows.push((name, summary.dropped_rows));
            Ok(())
        }

        if let Ok(s) = &analytics.trend {
            keep(&mut outcome, aggregate::SALES_PROFIT_TREND, s, self.sink.write_trend(&s.rows))?;
        }
        if let Ok(s) = &analytics.category_performance {
            let written = self.sink.write_category_performance(&s.rows);
            keep(&mut outcome, aggregate::CATEGORY_PERFORMANCE, s, written)?;
        }
        if let Ok(s) = &analytics.loss_making_products {
            let written = self.sink.write_loss_making_products(&s.rows);
            keep(&mut outcome, aggregate::LOSS_MAKING_PRODUCTS, s, written)?;
        }
        if let Ok(s) = &analytics.regional_performance {
            let written = self.sink.write_regional_performance(&s.rows);
            keep(&mut outcome, aggregate::REGIONAL_PERFORMANCE, s, written)?;
        }

        if let Err(failures) = analytics.check() {
            warn!(
                "{} of 4 summaries written before failing",
                outcome.artifacts.len()
            );
            return Err(failures.into());
        }

        info!("Analytics complete: {} tables written", outcome.artifacts.len());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AggregationError, EtlError};
    use crate::infra::memory::{InMemoryAnalyticsSink, InMemoryTableStore};
    use crate::types::{RecordTable, Value};

    fn cleaned(columns: &[&str]) -> RecordTable {
        let row = |region: &str, product: &str, sales: f64, profit: f64| -> Vec<Value> {
            columns
                .iter()
                .map(|c| match *c {
                    "Order Date" => Value::Timestamp(
                        chrono::NaiveDate::from_ymd_opt(2016, 11, 8)
                            .unwrap()
                            .and_hms_opt(0, 0, 0)
                            .unwrap(),
                    ),
                    "Region" | "Territory" => Value::Text(region.into()),
                    "Category" => Value::Text("Furniture".into()),
                    "Sub-Category" => Value::Text("Chairs".into()),
                    "Product Name" => Value::Text(product.into()),
                    "Sales" => Value::Float(sales),
                    "Profit" => Value::Float(profit),
                    _ => Value::Null,
                })
                .collect()
        };
        RecordTable::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            vec![
                row("West", "Hon Chair", 731.94, 219.58),
                row("South", "Bretford Table", 957.58, -383.03),
            ],
        )
        .unwrap()
    }

    #[test]
    fn writes_all_four_summaries() {
        let table = cleaned(&[
            "Order Date", "Region", "Category", "Sub-Category", "Product Name", "Sales", "Profit",
        ]);
        let sink = InMemoryAnalyticsSink::new();
        let uc = AnalyticsUseCase::new(
            Box::new(InMemoryTableStore::with_table(table)),
            Box::new(sink.clone()),
        );

        let outcome = uc.run().unwrap();
        assert_eq!(outcome.artifacts.len(), 4);
        assert!(outcome.dropped_rows.iter().all(|(_, n)| *n == 0));

        let captured = sink.captured();
        assert_eq!(captured.trend.unwrap().len(), 1);
        assert_eq!(captured.loss_making_products.unwrap()[0].product_name, "Bretford Table");
        assert_eq!(captured.regional_performance.unwrap()[0].region, "South");
    }

    #[test]
    fn failed_summary_does_not_stop_the_rest() {
        let table = cleaned(&[
            "Order Date", "Territory", "Category", "Sub-Category", "Product Name", "Sales", "Profit",
        ]);
        let sink = InMemoryAnalyticsSink::new();
        let uc = AnalyticsUseCase::new(
            Box::new(InMemoryTableStore::with_table(table)),
            Box::new(sink.clone()),
        );

        match uc.run() {
            Err(EtlError::Aggregation(failures)) => {
                assert_eq!(failures.failures.len(), 1);
                assert!(matches!(
                    &failures.failures[0],
                    AggregationError::MissingColumn { column, .. } if column == "Region"
                ));
            }
            other => panic!("expected aggregation failure, got {:?}", other.map(|o| o.artifacts.len())),
        }

        let captured = sink.captured();
        assert!(captured.trend.is_some());
        assert!(captured.category_performance.is_some());
        assert!(captured.loss_making_products.is_some());
        assert!(captured.regional_performance.is_none());
    }

    #[test]
    fn missing_cleaned_table_is_an_error() {
        let uc = AnalyticsUseCase::new(
            Box::new(InMemoryTableStore::new()),
            Box::new(InMemoryAnalyticsSink::new()),
        );
        assert!(matches!(uc.run(), Err(EtlError::Artifact(_))));
    }
}
