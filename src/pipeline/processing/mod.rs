// Table processing: schema check, coercion, cleaning, summaries

pub mod aggregate;
pub mod clean;
pub mod coerce;
pub mod profile;
pub mod validate;
