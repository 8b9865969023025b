/// Column names of the Superstore dataset. Spelling and case must match the
/// header row of the source file exactly.
pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_DATE: &str = "Ship Date";
pub const SHIP_MODE: &str = "Ship Mode";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const CUSTOMER_NAME: &str = "Customer Name";
pub const SEGMENT: &str = "Segment";
pub const COUNTRY: &str = "Country";
pub const CITY: &str = "City";
pub const STATE: &str = "State";
pub const POSTAL_CODE: &str = "Postal Code";
pub const REGION: &str = "Region";
pub const PRODUCT_ID: &str = "Product ID";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const PRODUCT_NAME: &str = "Product Name";
pub const SALES: &str = "Sales";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const PROFIT: &str = "Profit";

// Derived by the cleaner
pub const PROFIT_MARGIN: &str = "Profit Margin";

// Summary table headers
pub const ORDER_MONTH: &str = "Order Month";
pub const TOTAL_SALES: &str = "Total_Sales";
pub const TOTAL_PROFIT: &str = "Total_Profit";
pub const AVG_PROFIT_MARGIN: &str = "Avg_Profit_Margin";

pub const EXPECTED_COLUMNS: [&str; 20] = [
    ORDER_ID,
    ORDER_DATE,
    SHIP_DATE,
    SHIP_MODE,
    CUSTOMER_ID,
    CUSTOMER_NAME,
    SEGMENT,
    COUNTRY,
    CITY,
    STATE,
    POSTAL_CODE,
    REGION,
    PRODUCT_ID,
    CATEGORY,
    SUB_CATEGORY,
    PRODUCT_NAME,
    SALES,
    QUANTITY,
    DISCOUNT,
    PROFIT,
];

pub const DATE_COLUMNS: [&str; 2] = [ORDER_DATE, SHIP_DATE];

pub const NUMERIC_COLUMNS: [&str; 4] = [SALES, QUANTITY, DISCOUNT, PROFIT];

/// Nulls in these columns are replaced with zero by the cleaner
pub const ZERO_FILL_COLUMNS: [&str; 3] = [POSTAL_CODE, SALES, PROFIT];

/// Free-text categorical columns that are trimmed and title-cased
pub const CATEGORICAL_COLUMNS: [&str; 3] = [REGION, CATEGORY, SUB_CATEGORY];

// Analytics artifact file names (written under the analytics directory)
pub const TREND_FILE: &str = "sales_profit_trend.csv";
pub const CATEGORY_PERFORMANCE_FILE: &str = "category_subcategory_performance.csv";
pub const LOSS_MAKING_FILE: &str = "loss_making_products.csv";
pub const REGIONAL_PERFORMANCE_FILE: &str = "regional_performance.csv";

// Scheduler task identifiers
pub const BRONZE_TASK: &str = "bronze_ingestion";
pub const SILVER_TASK: &str = "silver_transformation";
pub const GOLD_TASK: &str = "gold_analytics";

/// Convert a list of column constants into owned names
pub fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
