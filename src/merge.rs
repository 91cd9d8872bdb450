//! Transaction / store-metadata merging

use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::schema::{self, CUSTOMERS, SALES, STORE};

/// Joins per-day transaction records with static store metadata.
///
/// Rows with null or zero sales are dropped before the join: a store that
/// is not trading carries no demand signal, and keeping such rows would
/// bias both imputation and the downstream model. The customer count is
/// dropped entirely since it is unavailable at prediction time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger;

impl Merger {
    pub fn new() -> Self {
        Self
    }

    /// Left-join filtered transactions onto store metadata by store id.
    ///
    /// Every surviving transaction row survives the join; store-side
    /// fields are null for any store id with no metadata row. Inputs are
    /// never mutated.
    pub fn merge(&self, transactions: &DataFrame, stores: &DataFrame) -> Result<DataFrame> {
        schema::ensure_columns(transactions, &[SALES, STORE])?;
        schema::ensure_columns(stores, &[STORE])?;

        let filtered = self.drop_not_trading(transactions)?;
        let filtered = self.drop_customers(&filtered)?;
        let keyed = self.normalize_store_key(&filtered)?;
        let stores_keyed = self.cast_store_key(stores)?;

        // transaction order is the row identity downstream; keep it
        let mut args = JoinArgs::new(JoinType::Left);
        args.maintain_order = MaintainOrderJoin::Left;

        let merged = keyed
            .lazy()
            .join(stores_keyed.lazy(), [col(STORE)], [col(STORE)], args)
            .collect()?;
        Ok(merged)
    }

    /// Drop rows whose sales are null or exactly zero.
    fn drop_not_trading(&self, df: &DataFrame) -> Result<DataFrame> {
        let sales = df
            .column(SALES)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let mask: BooleanChunked = sales
            .f64()?
            .into_iter()
            .map(|value| Some(value.map_or(false, |s| s != 0.0)))
            .collect();

        let kept = df.filter(&mask)?;
        debug!(
            before = df.height(),
            after = kept.height(),
            "dropped not-trading transaction rows"
        );
        Ok(kept)
    }

    fn drop_customers(&self, df: &DataFrame) -> Result<DataFrame> {
        if schema::has_column(df, CUSTOMERS) {
            Ok(df.drop(CUSTOMERS)?)
        } else {
            Ok(df.clone())
        }
    }

    /// Null store ids become the 0 sentinel so the join key is always
    /// present and integer-typed on both sides.
    fn normalize_store_key(&self, df: &DataFrame) -> Result<DataFrame> {
        let store = df
            .column(STORE)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let keys: Int64Chunked = store
            .f64()?
            .into_iter()
            .map(|value| Some(value.unwrap_or(0.0) as i64))
            .collect();

        let mut out = df.clone();
        out.with_column(keys.with_name(STORE.into()).into_series())?;
        Ok(out)
    }

    fn cast_store_key(&self, df: &DataFrame) -> Result<DataFrame> {
        let store = df
            .column(STORE)?
            .as_materialized_series()
            .cast(&DataType::Int64)?;
        let mut out = df.clone();
        out.with_column(store)?;
        Ok(out)
    }
}
