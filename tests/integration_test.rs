use anyhow::Result;
use std::path::Path;
use tempfile::tempdir;

use superstore_etl::config::{EtlConfig, PathsConfig};
use superstore_etl::infra::memory::RecordingAlertPort;
use superstore_etl::infra::parquet_store::read_parquet;
use superstore_etl::pipeline::processing::aggregate::{CategoryPerformanceRow, LossMakingProductRow, TrendRow};
use superstore_etl::pipeline::tasks::{bronze_ingestion, gold_analytics, silver_transformation};
use superstore_etl::pipeline::{Scheduler, TaskState};
use superstore_etl::types::Value;

const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";

const ROWS: [&str; 7] = [
    "1,CA-2016-152156,11/8/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,FUR-BO-10001798,Furniture,Bookcases,Bush Somerset Collection Bookcase,261.96,2,0,41.9136",
    "2,CA-2016-152156,11/8/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,FUR-CH-10000454,Furniture,Chairs,\"Hon Deluxe Fabric Upholstered Stacking Chairs, Rounded Back\",731.94,3,0,219.582",
    "3,CA-2016-138688,6/12/2016,6/16/2016,Second Class,DV-13045,Darrin Van Huff,Corporate,United States,Los Angeles,California,90036,West,OFF-LA-10000240,Office Supplies,Labels,Self-Adhesive Address Labels for Typewriters by Universal,14.62,2,0,6.8714",
    "4,US-2015-108966,10/11/2015,10/18/2015,Standard Class,SO-20335,Sean O'Donnell,Consumer,United States,Fort Lauderdale,Florida,33311,south ,FUR-TA-10000577,furniture,tables,Bretford CR4500 Series Slim Rectangular Table,957.5775,5,0.45,-383.031",
    "5,US-2015-108966,10/11/2015,10/18/2015,Standard Class,SO-20335,Sean O'Donnell,Consumer,United States,Fort Lauderdale,Florida,33311,South,OFF-ST-10000760,Office Supplies,Storage,Eldon Fold 'N Roll Cart System,22.368,2,0.2,2.5164",
    "6,CA-2014-115812,not a date,6/14/2014,Standard Class,BH-11710,Brosina Hoffman,Consumer,United States,Los Angeles,California,,West,TEC-PH-10002275,Technology,Phones,Mitel 5320 IP Phone VoIP phone,907.152,6,0.2,90.7152",
    "7,CA-2017-100006,9/7/2017,9/13/2017,Standard Class,DK-13375,Dennis Kane,Consumer,United States,New York City,New York,10024,East,TEC-PH-10002075,Technology,Phones,AT&T EL51110 DECT,0,3,0,-5.5",
];

/// Writes the sample extract as Latin-1, including one non-ASCII customer name.
fn write_raw(path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(HEADER.as_bytes());
    bytes.push(b'\n');
    for row in ROWS {
        let row = row.replace("Claire Gute", "Cl\u{e9}ire Gute");
        // Every char here is below U+0100, so the cast is the Latin-1 encoding
        bytes.extend(row.chars().map(|c| c as u8));
        bytes.push(b'\n');
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn config_in(root: &Path) -> EtlConfig {
    let mut config = EtlConfig::default();
    config.paths = PathsConfig {
        raw_data: root.join("raw/superstore.csv"),
        cleaned_data: root.join("processed/superstore_cleaned.parquet"),
        category_summary: root.join("processed/category_sales_summary.csv"),
        analytics_dir: root.join("processed/analytics"),
    };
    config.schedule.retries = 0;
    config.schedule.retry_delay_secs = 0;
    config
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

#[test]
fn test_stages_produce_cleaned_table_and_analytics() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(dir.path().join("raw"))?;
    write_raw(&config.paths.raw_data)?;

    let bronze = bronze_ingestion(&config)?;
    assert_eq!(bronze.rows_in, 7);
    assert!(bronze.artifacts.is_empty());

    let silver = silver_transformation(&config)?;
    assert_eq!(silver.rows_out, 7);
    assert_eq!(silver.artifacts.len(), 2);

    let cleaned = read_parquet(&config.paths.cleaned_data)?;
    assert_eq!(cleaned.len(), 7);
    assert!(cleaned.has_column("Profit Margin"));
    assert_eq!(cleaned.get(3, "Region"), Some(&Value::Text("South".into())));
    assert_eq!(cleaned.get(3, "Sub-Category"), Some(&Value::Text("Tables".into())));
    assert_eq!(cleaned.get(5, "Order Date"), Some(&Value::Null));
    assert_eq!(cleaned.get(5, "Postal Code"), Some(&Value::Int(0)));
    assert_eq!(cleaned.get(6, "Profit Margin"), Some(&Value::Float(0.0)));
    assert_eq!(
        cleaned.get(0, "Customer Name"),
        Some(&Value::Text("Cléire Gute".into()))
    );

    let gold = gold_analytics(&config)?;
    assert_eq!(gold.artifacts.len(), 4);
    assert!(gold.notes.iter().any(|n| n.contains("sales_profit_trend: 1 rows")));

    let analytics = &config.paths.analytics_dir;
    let trend: Vec<TrendRow> = read_rows(&analytics.join("sales_profit_trend.csv"))?;
    let months: Vec<&str> = trend.iter().map(|r| r.order_month.as_str()).collect();
    assert_eq!(months, vec!["2015-10", "2016-06", "2016-11", "2017-09"]);

    let perf: Vec<CategoryPerformanceRow> =
        read_rows(&analytics.join("category_subcategory_performance.csv"))?;
    assert_eq!(perf[0].sub_category, "Tables");
    assert!(perf.windows(2).all(|w| w[0].total_sales >= w[1].total_sales));
    let total: f64 = perf.iter().map(|r| r.total_sales).sum();
    assert!((total - 2895.6175).abs() < 1e-6);

    let losses: Vec<LossMakingProductRow> = read_rows(&analytics.join("loss_making_products.csv"))?;
    assert_eq!(losses.len(), 2);
    assert_eq!(losses[0].product_name, "Bretford CR4500 Series Slim Rectangular Table");
    assert!(losses.iter().all(|r| r.total_profit < 0.0));

    let regional = std::fs::read_to_string(analytics.join("regional_performance.csv"))?;
    assert!(regional.starts_with("Region,Total_Sales,Total_Profit\nSouth,"));

    let summary = std::fs::read_to_string(&config.paths.category_summary)?;
    assert!(summary.starts_with("Category,Total_Sales,Total_Profit,Avg_Profit_Margin\nFurniture,"));
    Ok(())
}

#[test]
fn test_postal_code_spellings_do_not_survive_as_duplicates() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(dir.path().join("raw"))?;
    let decimal = ROWS[0].replace(",42420,", ",42420.0,");
    std::fs::write(
        &config.paths.raw_data,
        format!("{}\n{}\n{}\n", HEADER, ROWS[0], decimal),
    )?;

    let silver = silver_transformation(&config)?;
    assert_eq!(silver.rows_out, 1);

    let cleaned = read_parquet(&config.paths.cleaned_data)?;
    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned.get(0, "Postal Code"), Some(&Value::Float(42420.0)));

    gold_analytics(&config)?;
    let perf: Vec<CategoryPerformanceRow> = read_rows(
        &config
            .paths
            .analytics_dir
            .join("category_subcategory_performance.csv"),
    )?;
    assert_eq!(perf.len(), 1);
    assert!((perf[0].total_sales - 261.96).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_reruns_produce_identical_artifacts() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(dir.path().join("raw"))?;
    write_raw(&config.paths.raw_data)?;

    let first_silver = silver_transformation(&config)?;
    let first_gold = gold_analytics(&config)?;
    let second_silver = silver_transformation(&config)?;
    let second_gold = gold_analytics(&config)?;

    let digests = |r: &superstore_etl::pipeline::StageReport| {
        r.artifacts.iter().map(|a| a.sha256.clone()).collect::<Vec<_>>()
    };
    assert_eq!(digests(&first_silver), digests(&second_silver));
    assert_eq!(digests(&first_gold), digests(&second_gold));
    Ok(())
}

#[tokio::test]
async fn test_scheduled_run_completes_all_tasks() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(dir.path().join("raw"))?;
    write_raw(&config.paths.raw_data)?;

    let alerts = RecordingAlertPort::new();
    let report = Scheduler::superstore(&config, Box::new(alerts.clone())).run().await;

    assert!(report.succeeded());
    assert_eq!(report.tasks.len(), 3);
    assert!(report.tasks.iter().all(|t| t.attempts == 1));
    assert!(alerts.alerts().is_empty());
    assert!(config.paths.analytics_dir.join("regional_performance.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_column_fails_bronze_and_skips_the_rest() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(dir.path().join("raw"))?;
    std::fs::write(&config.paths.raw_data, "Order ID,Sales\nCA-1,10\n")?;

    let alerts = RecordingAlertPort::new();
    let report = Scheduler::superstore(&config, Box::new(alerts.clone())).run().await;

    assert!(!report.succeeded());
    assert_eq!(report.tasks[0].state, TaskState::Failed);
    assert!(report.tasks[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("Missing columns") || e.contains("missing columns")));
    assert_eq!(report.tasks[1].state, TaskState::UpstreamFailed);
    assert_eq!(report.tasks[2].state, TaskState::UpstreamFailed);
    assert_eq!(alerts.alerts().len(), 1);
    assert!(!config.paths.cleaned_data.exists());
    Ok(())
}
