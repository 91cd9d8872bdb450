//! Stage configuration

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};
use crate::impute::ImputeStrategy;
use crate::schema;

/// Configuration for calendar feature derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Period of the weekday sine/cosine encoding.
    ///
    /// Weekdays repeat every 7 days, so 7.0 is the default. Earlier
    /// exports of this dataset encoded weekdays over a 365-day period;
    /// set it explicitly if that behavior has to be reproduced.
    pub weekday_period: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self { weekday_period: 7.0 }
    }
}

impl CleanConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the weekday encoding period
    pub fn with_weekday_period(mut self, period: f64) -> Self {
        self.weekday_period = period;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.weekday_period <= 0.0 {
            return Err(PrepError::ConfigError(format!(
                "weekday_period must be positive, got {}",
                self.weekday_period
            )));
        }
        Ok(())
    }
}

/// Column-to-strategy assignment for the imputer.
///
/// The assignment is an explicit ordered map from column name to strategy;
/// `transform` emits the imputed columns in this declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputerConfig {
    columns: Vec<(String, ImputeStrategy)>,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        for name in [schema::OPEN, schema::PROMO, schema::SCHOOL_HOLIDAY] {
            config = config.with_column(name, ImputeStrategy::ConstantZero);
        }
        for name in [
            schema::STATE_HOLIDAY,
            schema::STORE_TYPE,
            schema::ASSORTMENT,
            schema::PROMO_INTERVAL,
            schema::PROMO2,
        ] {
            config = config.with_column(name, ImputeStrategy::MostFrequent);
        }
        config.with_column(schema::COMPETITION_DISTANCE, ImputeStrategy::Median)
    }
}

impl ImputerConfig {
    /// The canonical column set for the merged sales table
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration with no declared columns
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Builder method to declare one more column
    pub fn with_column(mut self, name: impl Into<String>, strategy: ImputeStrategy) -> Self {
        self.columns.push((name.into(), strategy));
        self
    }

    /// Declared columns in order
    pub fn columns(&self) -> &[(String, ImputeStrategy)] {
        &self.columns
    }

    /// Reject assignments that declare the same column twice.
    pub fn validate(&self) -> Result<()> {
        for (i, (name, _)) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|(seen, _)| seen == name) {
                return Err(PrepError::ConfigError(format!(
                    "column {name} is assigned to more than one imputation strategy"
                )));
            }
        }
        Ok(())
    }
}
