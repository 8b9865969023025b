//! Grouped summaries over the cleaned table.
//!
//! Every function here is read-only over its input and deterministic: groups
//! are created in order of first appearance and all sorts are stable, so the
//! same table always yields the same rows in the same order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{info, warn};

use crate::constants;
use crate::error::{AggregationError, AggregationFailures};
use crate::observability::metrics;
use crate::pipeline::processing::coerce::coerce_date;
use crate::types::{RecordTable, Row, Value};

pub const SALES_PROFIT_TREND: &str = "sales_profit_trend";
pub const CATEGORY_PERFORMANCE: &str = "category_performance";
pub const LOSS_MAKING_PRODUCTS: &str = "loss_making_products";
pub const REGIONAL_PERFORMANCE: &str = "regional_performance";
pub const CATEGORY_SUMMARY: &str = "category_summary";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
    #[serde(rename = "Order Month")]
    pub order_month: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: f64,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPerformanceRow {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sub-Category")]
    pub sub_category: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: f64,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossMakingProductRow {
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalPerformanceRow {
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: f64,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummaryRow {
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: f64,
    #[serde(rename = "Total_Profit")]
    pub total_profit: f64,
    #[serde(rename = "Avg_Profit_Margin")]
    pub avg_profit_margin: f64,
}

/// Rows of one summary plus how many input rows had a null grouping key and
/// were left out.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary<R> {
    pub rows: Vec<R>,
    pub dropped_rows: usize,
}

struct Accumulator {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

struct Grouped<K> {
    groups: Vec<(K, Accumulator)>,
    dropped: usize,
}

fn require(table: &RecordTable, summary: &str, column: &str) -> Result<usize, AggregationError> {
    table
        .column_index(column)
        .ok_or_else(|| AggregationError::MissingColumn {
            summary: summary.to_string(),
            column: column.to_string(),
        })
}

fn measure(value: &Value, summary: &str, column: &str, row: usize) -> Result<Option<f64>, AggregationError> {
    match value {
        Value::Null => Ok(None),
        Value::Int(_) | Value::Float(_) => Ok(value.as_f64()),
        other => Err(AggregationError::NonNumeric {
            summary: summary.to_string(),
            column: column.to_string(),
            row,
            value: other.render(),
        }),
    }
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.render()),
    }
}

/// Group rows by `key_of`, summing the measure columns. Rows for which
/// `key_of` returns `None` are counted as dropped; null measures are skipped.
fn accumulate<K, F>(
    table: &RecordTable,
    summary: &str,
    measures: &[&str],
    mut key_of: F,
) -> Result<Grouped<K>, AggregationError>
where
    K: Eq + Hash + Clone,
    F: FnMut(&Row) -> Option<K>,
{
    let idxs = measures
        .iter()
        .map(|m| require(table, summary, m))
        .collect::<Result<Vec<_>, _>>()?;

    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Accumulator)> = Vec::new();
    let mut dropped = 0;

    for (i, row) in table.rows().iter().enumerate() {
        let Some(key) = key_of(row) else {
            dropped += 1;
            continue;
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((
                key,
                Accumulator {
                    sums: vec![0.0; idxs.len()],
                    counts: vec![0; idxs.len()],
                },
            ));
            groups.len() - 1
        });
        let acc = &mut groups[slot].1;
        for (m, (&idx, name)) in idxs.iter().zip(measures).enumerate() {
            if let Some(v) = measure(&row[idx], summary, name, i)? {
                acc.sums[m] += v;
                acc.counts[m] += 1;
            }
        }
    }

    Ok(Grouped { groups, dropped })
}

fn finish<R>(summary: &'static str, rows: Vec<R>, dropped_rows: usize) -> Summary<R> {
    if dropped_rows > 0 {
        warn!("{}: dropped {} rows with a null grouping key", summary, dropped_rows);
    }
    metrics::aggregate::summary_built(summary, rows.len(), dropped_rows);
    Summary { rows, dropped_rows }
}

/// Monthly Sales and Profit totals keyed by `YYYY-MM` of the Order Date,
/// ascending. Rows without a usable Order Date are dropped and counted.
pub fn sales_profit_trend(table: &RecordTable) -> Result<Summary<TrendRow>, AggregationError> {
    let date_idx = require(table, SALES_PROFIT_TREND, constants::ORDER_DATE)?;
    let grouped = accumulate(
        table,
        SALES_PROFIT_TREND,
        &[constants::SALES, constants::PROFIT],
        |row| match coerce_date(&row[date_idx]) {
            Value::Timestamp(ts) => Some(ts.format("%Y-%m").to_string()),
            _ => None,
        },
    )?;

    let mut rows: Vec<TrendRow> = grouped
        .groups
        .into_iter()
        .map(|(month, acc)| TrendRow {
            order_month: month,
            total_sales: acc.sums[0],
            total_profit: acc.sums[1],
        })
        .collect();
    rows.sort_by(|a, b| a.order_month.cmp(&b.order_month));

    Ok(finish(SALES_PROFIT_TREND, rows, grouped.dropped))
}

/// Totals per (Category, Sub-Category), highest Total_Sales first.
pub fn category_performance(
    table: &RecordTable,
) -> Result<Summary<CategoryPerformanceRow>, AggregationError> {
    let cat_idx = require(table, CATEGORY_PERFORMANCE, constants::CATEGORY)?;
    let sub_idx = require(table, CATEGORY_PERFORMANCE, constants::SUB_CATEGORY)?;
    let grouped = accumulate(
        table,
        CATEGORY_PERFORMANCE,
        &[constants::SALES, constants::PROFIT],
        |row| Some((key_text(&row[cat_idx])?, key_text(&row[sub_idx])?)),
    )?;

    let mut rows: Vec<CategoryPerformanceRow> = grouped
        .groups
        .into_iter()
        .map(|((category, sub_category), acc)| CategoryPerformanceRow {
            category,
            sub_category,
            total_sales: acc.sums[0],
            total_profit: acc.sums[1],
        })
        .collect();
    rows.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));

    Ok(finish(CATEGORY_PERFORMANCE, rows, grouped.dropped))
}

/// Products whose summed Profit is strictly negative, most negative first.
pub fn loss_making_products(
    table: &RecordTable,
) -> Result<Summary<LossMakingProductRow>, AggregationError> {
    let name_idx = require(table, LOSS_MAKING_PRODUCTS, constants::PRODUCT_NAME)?;
    let grouped = accumulate(
        table,
        LOSS_MAKING_PRODUCTS,
        &[constants::PROFIT],
        |row| key_text(&row[name_idx]),
    )?;

    let mut rows: Vec<LossMakingProductRow> = grouped
        .groups
        .into_iter()
        .map(|(product_name, acc)| LossMakingProductRow {
            product_name,
            total_profit: acc.sums[0],
        })
        .filter(|r| r.total_profit < 0.0)
        .collect();
    rows.sort_by(|a, b| a.total_profit.total_cmp(&b.total_profit));

    Ok(finish(LOSS_MAKING_PRODUCTS, rows, grouped.dropped))
}

/// Totals per Region, highest Total_Sales first.
pub fn regional_performance(
    table: &RecordTable,
) -> Result<Summary<RegionalPerformanceRow>, AggregationError> {
    let region_idx = require(table, REGIONAL_PERFORMANCE, constants::REGION)?;
    let grouped = accumulate(
        table,
        REGIONAL_PERFORMANCE,
        &[constants::SALES, constants::PROFIT],
        |row| key_text(&row[region_idx]),
    )?;

    let mut rows: Vec<RegionalPerformanceRow> = grouped
        .groups
        .into_iter()
        .map(|(region, acc)| RegionalPerformanceRow {
            region,
            total_sales: acc.sums[0],
            total_profit: acc.sums[1],
        })
        .collect();
    rows.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));

    Ok(finish(REGIONAL_PERFORMANCE, rows, grouped.dropped))
}

/// Category-level summary over rows with positive Sales, ordered by Category.
/// Avg_Profit_Margin is the mean of the non-null Profit Margin values.
pub fn category_summary(
    table: &RecordTable,
) -> Result<Summary<CategorySummaryRow>, AggregationError> {
    let cat_idx = require(table, CATEGORY_SUMMARY, constants::CATEGORY)?;
    let sales_idx = require(table, CATEGORY_SUMMARY, constants::SALES)?;

    for (i, row) in table.rows().iter().enumerate() {
        measure(&row[sales_idx], CATEGORY_SUMMARY, constants::SALES, i)?;
    }
    // Non-positive sales are filtered out, not counted as dropped
    let mut filtered = table.clone();
    filtered.retain_rows(|row| row[sales_idx].as_f64().is_some_and(|s| s > 0.0));

    let grouped = accumulate(
        &filtered,
        CATEGORY_SUMMARY,
        &[constants::SALES, constants::PROFIT, constants::PROFIT_MARGIN],
        |row| key_text(&row[cat_idx]),
    )?;

    let mut rows: Vec<CategorySummaryRow> = grouped
        .groups
        .into_iter()
        .map(|(category, acc)| CategorySummaryRow {
            category,
            total_sales: acc.sums[0],
            total_profit: acc.sums[1],
            avg_profit_margin: if acc.counts[2] == 0 {
                0.0
            } else {
                acc.sums[2] / acc.counts[2] as f64
            },
        })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(&b.category));

    Ok(finish(CATEGORY_SUMMARY, rows, grouped.dropped))
}

/// The four gold-stage summaries, each computed independently so one failure
/// does not prevent the others.
#[derive(Debug)]
pub struct Analytics {
    pub trend: Result<Summary<TrendRow>, AggregationError>,
    pub category_performance: Result<Summary<CategoryPerformanceRow>, AggregationError>,
    pub loss_making_products: Result<Summary<LossMakingProductRow>, AggregationError>,
    pub regional_performance: Result<Summary<RegionalPerformanceRow>, AggregationError>,
}

impl Analytics {
    pub fn failures(&self) -> Vec<AggregationError> {
        [
            self.trend.as_ref().err(),
            self.category_performance.as_ref().err(),
            self.loss_making_products.as_ref().err(),
            self.regional_performance.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    /// `Ok` when every summary succeeded, otherwise every failure at once
    pub fn check(&self) -> Result<(), AggregationFailures> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregationFailures { failures })
        }
    }
}

pub fn run_all(table: &RecordTable) -> Analytics {
    info!("Running analytics over {} cleaned rows", table.len());
    let analytics = Analytics {
        trend: sales_profit_trend(table),
        category_performance: category_performance(table),
        loss_making_products: loss_making_products(table),
        regional_performance: regional_performance(table),
    };
    for failure in analytics.failures() {
        let summary = match &failure {
            AggregationError::MissingColumn { summary, .. }
            | AggregationError::NonNumeric { summary, .. } => summary,
        };
        warn!("Aggregation failed: {}", failure);
        metrics::aggregate::summary_failed(summary);
    }
    analytics
}
