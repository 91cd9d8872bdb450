//! Per-column missing-value imputation
//!
//! Strict fit/transform separation: the per-column parameters are computed
//! once from a training table and reused unchanged on any later table.
//! Transforming held-out data never re-fits.

use std::collections::HashMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ImputerConfig;
use crate::error::{PrepError, Result};
use crate::schema;

/// Strategy for filling the missing values of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Missing flag-like values become 0
    ConstantZero,
    /// Missing values become the most frequent fitted value
    MostFrequent,
    /// Missing numeric values become the fitted median
    Median,
}

/// Fitted fill value for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Num(f64),
    Str(String),
}

/// Per-column missing-value imputer.
///
/// Two-phase: `fit` computes the per-column parameters, `transform`
/// applies them. `transform` returns the declared columns only, in
/// declared order (the estimator-facing view); `transform_reconstruct`
/// hands back the full input schema with the declared columns replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    config: ImputerConfig,
    params: HashMap<String, FillValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create an imputer over the canonical merged-table column set
    pub fn new() -> Self {
        Self::with_config(ImputerConfig::default())
    }

    pub fn with_config(config: ImputerConfig) -> Self {
        Self {
            config,
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted per-column fill values
    pub fn params(&self) -> &HashMap<String, FillValue> {
        &self.params
    }

    /// Compute and store the per-column fill values from the training
    /// table. The input is not mutated.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.config.validate()?;
        let declared: Vec<&str> = self
            .config
            .columns()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        schema::ensure_columns(df, &declared)?;

        self.params.clear();
        for (name, strategy) in self.config.columns() {
            let series = df.column(name)?.as_materialized_series();
            let fill = match strategy {
                ImputeStrategy::ConstantZero => FillValue::Num(0.0),
                ImputeStrategy::MostFrequent => most_frequent(name, series)?,
                ImputeStrategy::Median => median(name, series)?,
            };
            self.params.insert(name.clone(), fill);
        }
        self.is_fitted = true;
        info!(columns = self.params.len(), "fitted imputation parameters");
        Ok(self)
    }

    /// Impute the declared columns and return them alone, in declared
    /// order.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let imputed = self.imputed_columns(df)?;
        Ok(DataFrame::new(
            imputed.into_iter().map(|series| series.into()).collect(),
        )?)
    }

    /// Fit on and transform the same table.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Full copy of the input with only the declared columns replaced by
    /// their imputed values.
    ///
    /// Column order and all non-declared columns stay untouched; this is
    /// the entry point for consumers that expect the original schema back.
    pub fn transform_reconstruct(&self, df: &DataFrame) -> Result<DataFrame> {
        let imputed = self.imputed_columns(df)?;
        let mut out = df.clone();
        for series in imputed {
            out.with_column(series)?;
        }
        Ok(out)
    }

    /// Persist the fitted state as JSON.
    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a previously fitted imputer.
    pub fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn imputed_columns(&self, df: &DataFrame) -> Result<Vec<Series>> {
        if !self.is_fitted {
            return Err(PrepError::NotFitted);
        }
        let declared: Vec<&str> = self
            .config
            .columns()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        schema::ensure_columns(df, &declared)?;

        self.config
            .columns()
            .iter()
            .map(|(name, _)| {
                let fill = self.params.get(name).ok_or(PrepError::NotFitted)?;
                fill_series(df.column(name)?.as_materialized_series(), fill)
            })
            .collect()
    }
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Most frequent value, with ties broken by first appearance in the
/// column so repeated fits of the same table always agree.
fn most_frequent(name: &str, series: &Series) -> Result<FillValue> {
    match series.dtype() {
        DataType::String | DataType::Categorical(_, _) => {
            let casted = series.cast(&DataType::String)?;
            let mut counts: Vec<(String, usize)> = Vec::new();
            for value in casted.str()?.into_iter().flatten() {
                match counts.iter_mut().find(|(seen, _)| seen.as_str() == value) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((value.to_string(), 1)),
                }
            }
            pick_most_frequent(name, counts).map(FillValue::Str)
        }
        _ => {
            let casted = series.cast(&DataType::Float64)?;
            let mut counts: Vec<(f64, usize)> = Vec::new();
            for value in casted.f64()?.into_iter().flatten() {
                match counts.iter_mut().find(|(seen, _)| *seen == value) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((value, 1)),
                }
            }
            pick_most_frequent(name, counts).map(FillValue::Num)
        }
    }
}

/// Counts are in first-seen order; replacement only on a strictly greater
/// count keeps the earliest value on ties.
fn pick_most_frequent<T>(name: &str, counts: Vec<(T, usize)>) -> Result<T> {
    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value).ok_or_else(|| {
        PrepError::DataError(format!(
            "column {name} has no observed values to take the mode from"
        ))
    })
}

/// Column median from the fit table.
fn median(name: &str, series: &Series) -> Result<FillValue> {
    let casted = series.cast(&DataType::Float64)?;
    let median = casted.f64()?.median().ok_or_else(|| {
        PrepError::DataError(format!(
            "column {name} has no observed values to take the median from"
        ))
    })?;
    Ok(FillValue::Num(median))
}

/// Replace nulls with the fitted fill value, keeping the column name.
///
/// Numeric fills produce Float64 output; string fills keep categorical
/// columns categorical.
fn fill_series(series: &Series, fill: &FillValue) -> Result<Series> {
    match fill {
        FillValue::Num(fill) => {
            let casted = series.cast(&DataType::Float64)?;
            let filled: Float64Chunked = casted
                .f64()?
                .into_iter()
                .map(|value| Some(value.unwrap_or(*fill)))
                .collect();
            Ok(filled.with_name(series.name().clone()).into_series())
        }
        FillValue::Str(fill) => {
            let casted = series.cast(&DataType::String)?;
            let filled: StringChunked = casted
                .str()?
                .into_iter()
                .map(|value| Some(value.unwrap_or(fill).to_string()))
                .collect();
            let mut out = filled.with_name(series.name().clone()).into_series();
            if matches!(series.dtype(), DataType::Categorical(_, _)) {
                out = out.cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
            }
            Ok(out)
        }
    }
}
