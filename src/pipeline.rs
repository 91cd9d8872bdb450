//! End-to-end composition of the preparation stages

use polars::prelude::*;
use tracing::info;

use crate::clean::Cleaner;
use crate::config::{CleanConfig, ImputerConfig};
use crate::error::{PrepError, Result};
use crate::impute::Imputer;
use crate::merge::Merger;

/// Merge, clean, and impute in one pass.
///
/// The imputation parameters are fitted once by `fit_transform` and reused
/// by every later `transform`; nothing re-fits implicitly, so held-out
/// tables never leak into the training statistics.
#[derive(Debug, Clone)]
pub struct SalesPreprocessor {
    merger: Merger,
    cleaner: Cleaner,
    imputer: Imputer,
}

impl SalesPreprocessor {
    pub fn new() -> Self {
        Self::with_config(CleanConfig::default(), ImputerConfig::default())
    }

    pub fn with_config(clean: CleanConfig, imputer: ImputerConfig) -> Self {
        Self {
            merger: Merger::new(),
            cleaner: Cleaner::with_config(clean),
            imputer: Imputer::with_config(imputer),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.imputer.is_fitted()
    }

    /// The imputer, for parameter inspection or persistence.
    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    /// Prepare a training table: fit the imputation parameters on it and
    /// return the modeling-ready result with the full schema.
    pub fn fit_transform(
        &mut self,
        transactions: &DataFrame,
        stores: &DataFrame,
    ) -> Result<DataFrame> {
        let merged = self.merger.merge(transactions, stores)?;
        let cleaned = self.cleaner.clean(&merged)?;
        self.imputer.fit(&cleaned)?;
        let out = self.imputer.transform_reconstruct(&cleaned)?;
        info!(
            rows_in = transactions.height(),
            rows_out = out.height(),
            columns = out.width(),
            "fitted preparation pipeline"
        );
        Ok(out)
    }

    /// Prepare a held-out table with the already-fitted parameters.
    pub fn transform(&self, transactions: &DataFrame, stores: &DataFrame) -> Result<DataFrame> {
        if !self.imputer.is_fitted() {
            return Err(PrepError::NotFitted);
        }
        let merged = self.merger.merge(transactions, stores)?;
        let cleaned = self.cleaner.clean(&merged)?;
        self.imputer.transform_reconstruct(&cleaned)
    }
}

impl Default for SalesPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
