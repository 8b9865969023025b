pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

// Layered boundaries: ports and use cases, then the adapters behind them
pub mod app;
pub mod infra;
