//! Retail sales data preparation pipeline
//!
//! Prepares per-store, per-day retail transaction records for downstream
//! modeling:
//! - [`merge`] - join transactions with static store metadata under a
//!   consistent integer key
//! - [`clean`] - calendar features, cyclical encodings, and days-since-event
//!   lag features
//! - [`impute`] - per-column missing-value imputation with strict
//!   fit/transform separation
//! - [`pipeline`] - end-to-end composition of the three stages
//!
//! All stages consume and produce [`polars`] `DataFrame`s; the only state
//! carried between calls is the imputer's fitted parameter set.

pub mod clean;
pub mod config;
pub mod error;
pub mod impute;
pub mod merge;
pub mod pipeline;
pub mod schema;

pub use error::{PrepError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clean::Cleaner;
    pub use crate::config::{CleanConfig, ImputerConfig};
    pub use crate::error::{PrepError, Result};
    pub use crate::impute::{FillValue, ImputeStrategy, Imputer};
    pub use crate::merge::Merger;
    pub use crate::pipeline::SalesPreprocessor;
}
