pub mod analytics_use_case;
pub mod ingest_use_case;
pub mod ports;
pub mod transform_use_case;

pub use analytics_use_case::{AnalyticsOutcome, AnalyticsUseCase};
pub use ingest_use_case::{IngestOutcome, IngestUseCase};
pub use transform_use_case::{TransformOutcome, TransformUseCase};
