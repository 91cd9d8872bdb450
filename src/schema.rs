//! Column names shared across the pipeline stages
//!
//! Every stage addresses the table through these constants; stage entry
//! points validate their required columns up front so a schema mismatch
//! surfaces before any transformation runs.

use crate::error::{PrepError, Result};
use polars::prelude::*;

// Transaction table
pub const STORE: &str = "Store";
pub const DATE: &str = "Date";
pub const SALES: &str = "Sales";
pub const CUSTOMERS: &str = "Customers";
pub const OPEN: &str = "Open";
pub const PROMO: &str = "Promo";
pub const SCHOOL_HOLIDAY: &str = "SchoolHoliday";
pub const STATE_HOLIDAY: &str = "StateHoliday";
pub const DAY_OF_WEEK: &str = "DayOfWeek";

// Store metadata table
pub const STORE_TYPE: &str = "StoreType";
pub const ASSORTMENT: &str = "Assortment";
pub const COMPETITION_DISTANCE: &str = "CompetitionDistance";
pub const COMPETITION_OPEN_SINCE_MONTH: &str = "CompetitionOpenSinceMonth";
pub const COMPETITION_OPEN_SINCE_YEAR: &str = "CompetitionOpenSinceYear";
pub const PROMO2: &str = "Promo2";
pub const PROMO2_SINCE_YEAR: &str = "Promo2SinceYear";
pub const PROMO2_SINCE_WEEK: &str = "Promo2SinceWeek";
pub const PROMO_INTERVAL: &str = "PromoInterval";

// Derived columns
pub const YEAR: &str = "Year";
pub const MONTH_SIN: &str = "Month_sin";
pub const MONTH_COS: &str = "Month_cos";
pub const WEEKDAY_SIN: &str = "Weekday_sin";
pub const WEEKDAY_COS: &str = "Weekday_cos";
pub const SALES_COMPETITION_LAG: &str = "SalesCompetitionLag";
pub const PROMO2_LAG: &str = "Promo2Lag";

/// Check that every required column is present, failing fast on the first
/// missing one.
pub fn ensure_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    for name in required {
        if df.column(name).is_err() {
            return Err(PrepError::ColumnNotFound((*name).to_string()));
        }
    }
    Ok(())
}

/// Whether the table carries the given column.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}
