//! Calendar and event-lag feature derivation
//!
//! Derives, from the merged table:
//! - transaction year plus sine/cosine encodings of month and weekday
//! - days since the nearest competitor opened (`SalesCompetitionLag`)
//! - days since the recurring promotion started (`Promo2Lag`)
//!
//! and drops the raw calendar source columns afterwards, so the output
//! carries only typed, model-ready features.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;
use tracing::debug;

use crate::config::CleanConfig;
use crate::error::{PrepError, Result};
use crate::schema::{
    self, ASSORTMENT, COMPETITION_OPEN_SINCE_MONTH, COMPETITION_OPEN_SINCE_YEAR, DATE,
    DAY_OF_WEEK, MONTH_COS, MONTH_SIN, PROMO2_LAG, PROMO2_SINCE_WEEK, PROMO2_SINCE_YEAR,
    SALES_COMPETITION_LAG, STATE_HOLIDAY, STORE_TYPE, WEEKDAY_COS, WEEKDAY_SIN, YEAR,
};

/// Months repeat every 12.
const MONTH_PERIOD: f64 = 12.0;

/// Sentinel for "the reference event never happened".
const MISSING_LAG: f64 = -1.0;

/// Derives calendar and lag features from the merged table.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    config: CleanConfig,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::with_config(CleanConfig::default())
    }

    pub fn with_config(config: CleanConfig) -> Self {
        Self { config }
    }

    /// Run the full derivation sequence.
    ///
    /// Both lag features need the parsed dates from the first step, so the
    /// sub-steps are private and always run in one fixed order; the output
    /// no longer carries the date column, which is why `clean` cannot be
    /// applied to its own output.
    pub fn clean(&self, merged: &DataFrame) -> Result<DataFrame> {
        self.config.validate()?;
        schema::ensure_columns(
            merged,
            &[
                DATE,
                STATE_HOLIDAY,
                COMPETITION_OPEN_SINCE_YEAR,
                COMPETITION_OPEN_SINCE_MONTH,
                PROMO2_SINCE_YEAR,
                PROMO2_SINCE_WEEK,
                STORE_TYPE,
                ASSORTMENT,
            ],
        )?;

        let dates = parse_dates(merged)?;

        let mut df = merged.clone();
        self.attach_calendar_features(&mut df, &dates)?;
        self.normalize_state_holiday(&mut df)?;
        self.attach_competition_lag(&mut df, &dates)?;
        self.attach_promo2_lag(&mut df, &dates)?;
        self.cast_categoricals(&mut df)?;
        self.drop_superseded(&mut df)?;

        debug!(
            rows = df.height(),
            columns = df.width(),
            "derived calendar and lag features"
        );
        Ok(df)
    }

    /// Year column plus cyclical month/weekday encodings.
    fn attach_calendar_features(&self, df: &mut DataFrame, dates: &[NaiveDate]) -> Result<()> {
        let years: Vec<i32> = dates.iter().map(|d| d.year()).collect();
        let months: Vec<f64> = dates.iter().map(|d| d.month() as f64).collect();
        let weekdays: Vec<f64> = dates
            .iter()
            .map(|d| d.weekday().num_days_from_monday() as f64)
            .collect();

        df.with_column(Series::new(YEAR.into(), years))?;

        let (month_sin, month_cos) = cyclical_encode(&months, MONTH_PERIOD);
        df.with_column(Series::new(MONTH_SIN.into(), month_sin))?;
        df.with_column(Series::new(MONTH_COS.into(), month_cos))?;

        let (weekday_sin, weekday_cos) = cyclical_encode(&weekdays, self.config.weekday_period);
        df.with_column(Series::new(WEEKDAY_SIN.into(), weekday_sin))?;
        df.with_column(Series::new(WEEKDAY_COS.into(), weekday_cos))?;
        Ok(())
    }

    /// Collapse the mixed encodings of "no holiday" into one category.
    ///
    /// The raw files carry both the string "0" and a numeric zero that
    /// stringifies to "0.0"; both must land in the same category before
    /// the categorical cast.
    fn normalize_state_holiday(&self, df: &mut DataFrame) -> Result<()> {
        let series = df
            .column(STATE_HOLIDAY)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let normalized: StringChunked = series
            .str()?
            .into_iter()
            .map(|value| {
                value.map(|v| {
                    if v == "0.0" {
                        "0".to_string()
                    } else {
                        v.to_string()
                    }
                })
            })
            .collect();

        df.with_column(normalized.with_name(STATE_HOLIDAY.into()).into_series())?;
        Ok(())
    }

    /// Days since the competitor opened, anchored to the first day of its
    /// opening month.
    ///
    /// A competitor opening after the transaction clamps to 0; a store
    /// without a known competitor (either source field null) gets the -1
    /// sentinel.
    fn attach_competition_lag(&self, df: &mut DataFrame, dates: &[NaiveDate]) -> Result<()> {
        let years = numeric_column(df, COMPETITION_OPEN_SINCE_YEAR)?;
        let months = numeric_column(df, COMPETITION_OPEN_SINCE_MONTH)?;

        let mut lags = Vec::with_capacity(dates.len());
        for (idx, date) in dates.iter().enumerate() {
            let lag = match (years[idx], months[idx]) {
                (Some(year), Some(month)) => {
                    let opened = NaiveDate::from_ymd_opt(year as i32, month as u32, 1)
                        .ok_or_else(|| {
                            PrepError::InvalidDate(format!(
                                "invalid competition opening {year}-{month} at row {idx}"
                            ))
                        })?;
                    days_since(*date, opened)
                }
                _ => MISSING_LAG,
            };
            lags.push(lag);
        }

        df.with_column(Series::new(SALES_COMPETITION_LAG.into(), lags))?;
        Ok(())
    }

    /// Days since the recurring promotion started.
    ///
    /// The start is anchored to the Sunday closing the promotion's ISO
    /// start week. Clamp and sentinel policy match the competition lag.
    fn attach_promo2_lag(&self, df: &mut DataFrame, dates: &[NaiveDate]) -> Result<()> {
        let years = numeric_column(df, PROMO2_SINCE_YEAR)?;
        let weeks = numeric_column(df, PROMO2_SINCE_WEEK)?;

        let mut lags = Vec::with_capacity(dates.len());
        for (idx, date) in dates.iter().enumerate() {
            let lag = match (years[idx], weeks[idx]) {
                (Some(year), Some(week)) => {
                    let started =
                        NaiveDate::from_isoywd_opt(year as i32, week as u32, Weekday::Sun)
                            .ok_or_else(|| {
                                PrepError::InvalidDate(format!(
                                    "invalid promotion start week {year}-W{week} at row {idx}"
                                ))
                            })?;
                    days_since(*date, started)
                }
                _ => MISSING_LAG,
            };
            lags.push(lag);
        }

        df.with_column(Series::new(PROMO2_LAG.into(), lags))?;
        Ok(())
    }

    /// Closed, enumerable domains become categorical so downstream
    /// encoders and the most-frequent imputation see a fixed category set.
    fn cast_categoricals(&self, df: &mut DataFrame) -> Result<()> {
        for name in [STATE_HOLIDAY, STORE_TYPE, ASSORTMENT] {
            let casted = df
                .column(name)?
                .as_materialized_series()
                .cast(&DataType::String)?
                .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
            df.with_column(casted)?;
        }
        Ok(())
    }

    /// The raw date and the lag source fields are superseded by the
    /// derived features.
    fn drop_superseded(&self, df: &mut DataFrame) -> Result<()> {
        let mut to_drop = vec![
            DATE,
            COMPETITION_OPEN_SINCE_YEAR,
            COMPETITION_OPEN_SINCE_MONTH,
            PROMO2_SINCE_YEAR,
            PROMO2_SINCE_WEEK,
        ];
        if schema::has_column(df, DAY_OF_WEEK) {
            to_drop.push(DAY_OF_WEEK);
        }
        for name in to_drop {
            *df = df.drop(name)?;
        }
        Ok(())
    }
}

/// Parse the transaction date column into calendar dates.
///
/// Accepts either a native `Date` column or `YYYY-MM-DD` strings. A null
/// or unparseable date fails the whole batch: every lag feature downstream
/// depends on it.
fn parse_dates(df: &DataFrame) -> Result<Vec<NaiveDate>> {
    let column = df.column(DATE)?.as_materialized_series();
    match column.dtype() {
        DataType::Date => column
            .date()?
            .as_date_iter()
            .enumerate()
            .map(|(idx, value)| {
                value.ok_or_else(|| PrepError::InvalidDate(format!("null date at row {idx}")))
            })
            .collect(),
        _ => {
            let strings = column.cast(&DataType::String)?;
            strings
                .str()?
                .into_iter()
                .enumerate()
                .map(|(idx, value)| {
                    let raw = value.ok_or_else(|| {
                        PrepError::InvalidDate(format!("null date at row {idx}"))
                    })?;
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                        PrepError::InvalidDate(format!("unparseable date {raw:?} at row {idx}"))
                    })
                })
                .collect()
        }
    }
}

/// Column as nullable f64 values, accepting any numeric dtype.
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Elapsed days from `event` to `date`, with forward-looking intervals
/// clamped to 0.
fn days_since(date: NaiveDate, event: NaiveDate) -> f64 {
    let days = date.signed_duration_since(event).num_days() as f64;
    days.max(0.0)
}

/// Sine/cosine pair over the given period, so the encoded distance stays
/// continuous across the period boundary.
fn cyclical_encode(values: &[f64], period: f64) -> (Vec<f64>, Vec<f64>) {
    let sin = values
        .iter()
        .map(|v| (2.0 * PI * v / period).sin())
        .collect();
    let cos = values
        .iter()
        .map(|v| (2.0 * PI * v / period).cos())
        .collect();
    (sin, cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{COMPETITION_DISTANCE, OPEN, PROMO, PROMO2, PROMO_INTERVAL, SALES, SCHOOL_HOLIDAY, STORE};

    fn merged_df() -> DataFrame {
        df!(
            STORE => &[1i64, 1, 2, 3],
            DATE => &["2015-06-11", "2015-07-27", "2015-05-27", "2015-06-01"],
            SALES => &[5263.0, 6064.0, 3821.0, 4822.0],
            OPEN => &[Some(1.0), Some(1.0), None, Some(1.0)],
            PROMO => &[1.0, 0.0, 1.0, 0.0],
            SCHOOL_HOLIDAY => &[0.0, 1.0, 0.0, 0.0],
            STATE_HOLIDAY => &["0.0", "0", "a", "0"],
            STORE_TYPE => &[Some("c"), Some("c"), Some("a"), None],
            ASSORTMENT => &[Some("a"), Some("a"), Some("c"), None],
            COMPETITION_DISTANCE => &[Some(1270.0), Some(1270.0), None, Some(310.0)],
            COMPETITION_OPEN_SINCE_MONTH => &[Some(6.0), Some(6.0), None, Some(6.0)],
            COMPETITION_OPEN_SINCE_YEAR => &[Some(2015.0), Some(2015.0), None, Some(2015.0)],
            PROMO2 => &[0.0, 0.0, 1.0, 1.0],
            PROMO2_SINCE_YEAR => &[None, None, Some(2015.0), Some(2015.0)],
            PROMO2_SINCE_WEEK => &[None, None, Some(20.0), Some(20.0)],
            PROMO_INTERVAL => &[None, None, Some("Feb,May,Aug,Nov"), Some("Feb,May,Aug,Nov")]
        )
        .unwrap()
    }

    fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_state_holiday_normalized() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let holidays = cleaned
            .column(STATE_HOLIDAY)
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::String)
            .unwrap();
        let values: Vec<String> = holidays
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["0", "0", "a", "0"]);
    }

    #[test]
    fn test_categorical_dtypes() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        for name in [STATE_HOLIDAY, STORE_TYPE, ASSORTMENT] {
            assert!(
                matches!(
                    cleaned.column(name).unwrap().dtype(),
                    DataType::Categorical(_, _)
                ),
                "{name} should be categorical"
            );
        }
    }

    #[test]
    fn test_weekday_encoding_period_seven() {
        // 2015-07-27 is a Monday: weekday 0 encodes to (sin 0, cos 1)
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let sin = column_values(&cleaned, WEEKDAY_SIN);
        let cos = column_values(&cleaned, WEEKDAY_COS);
        assert!(sin[1].abs() < 1e-12);
        assert!((cos[1] - 1.0).abs() < 1e-12);
        // 2015-06-11 is a Thursday: weekday 3, sin(2*pi*3/7)
        let expected = (2.0 * PI * 3.0 / 7.0).sin();
        assert!((sin[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_weekday_period_is_configurable() {
        let config = CleanConfig::new().with_weekday_period(365.0);
        let cleaned = Cleaner::with_config(config).clean(&merged_df()).unwrap();
        let sin = column_values(&cleaned, WEEKDAY_SIN);
        let expected = (2.0 * PI * 3.0 / 365.0).sin();
        assert!((sin[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_month_encoding() {
        // June: sin(2*pi*6/12) ~ 0, cos ~ -1
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let sin = column_values(&cleaned, MONTH_SIN);
        let cos = column_values(&cleaned, MONTH_COS);
        assert!(sin[0].abs() < 1e-12);
        assert!((cos[0] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_year_column() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let years: Vec<i32> = cleaned
            .column(YEAR)
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(years, vec![2015; 4]);
    }

    #[test]
    fn test_competition_lag_elapsed_days() {
        // competitor opened 2015-06-01; transaction 2015-06-11 lags 10 days
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let lags = column_values(&cleaned, SALES_COMPETITION_LAG);
        assert_eq!(lags[0], 10.0);
    }

    #[test]
    fn test_competition_lag_sentinel_when_missing() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let lags = column_values(&cleaned, SALES_COMPETITION_LAG);
        assert_eq!(lags[2], -1.0);
    }

    #[test]
    fn test_competition_lag_clamps_future_opening() {
        // row 3: competitor opens 2015-06-01, transaction on the same day
        // row with a strictly earlier transaction date must clamp to 0
        let df = df!(
            STORE => &[3i64],
            DATE => &["2015-05-22"],
            SALES => &[4822.0],
            STATE_HOLIDAY => &["0"],
            STORE_TYPE => &["a"],
            ASSORTMENT => &["c"],
            COMPETITION_OPEN_SINCE_MONTH => &[Some(6.0)],
            COMPETITION_OPEN_SINCE_YEAR => &[Some(2015.0)],
            PROMO2_SINCE_YEAR => &[None::<f64>],
            PROMO2_SINCE_WEEK => &[None::<f64>]
        )
        .unwrap();
        let cleaned = Cleaner::new().clean(&df).unwrap();
        let lags = column_values(&cleaned, SALES_COMPETITION_LAG);
        assert_eq!(lags[0], 0.0);
    }

    #[test]
    fn test_promo2_lag_elapsed_days() {
        // ISO week 20 of 2015 closes on Sunday 2015-05-17;
        // transaction 2015-05-27 lags 10 days
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let lags = column_values(&cleaned, PROMO2_LAG);
        assert_eq!(lags[2], 10.0);
    }

    #[test]
    fn test_promo2_lag_sentinel_when_missing() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let lags = column_values(&cleaned, PROMO2_LAG);
        assert_eq!(lags[0], -1.0);
        assert_eq!(lags[1], -1.0);
    }

    #[test]
    fn test_superseded_columns_dropped() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        for name in [
            DATE,
            COMPETITION_OPEN_SINCE_YEAR,
            COMPETITION_OPEN_SINCE_MONTH,
            PROMO2_SINCE_YEAR,
            PROMO2_SINCE_WEEK,
        ] {
            assert!(cleaned.column(name).is_err(), "{name} should be dropped");
        }
    }

    #[test]
    fn test_clean_is_not_idempotent() {
        let cleaned = Cleaner::new().clean(&merged_df()).unwrap();
        let err = Cleaner::new().clean(&cleaned).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(_)));
    }

    #[test]
    fn test_row_count_preserved() {
        let df = merged_df();
        let cleaned = Cleaner::new().clean(&df).unwrap();
        assert_eq!(cleaned.height(), df.height());
    }

    #[test]
    fn test_unparseable_date_fails_batch() {
        let mut df = merged_df();
        df.with_column(Series::new(
            DATE.into(),
            vec!["2015-06-11", "not-a-date", "2015-05-27", "2015-06-01"],
        ))
        .unwrap();
        let err = Cleaner::new().clean(&df).unwrap_err();
        assert!(matches!(err, PrepError::InvalidDate(_)));
    }

    #[test]
    fn test_invalid_competition_month_fails_batch() {
        let mut df = merged_df();
        df.with_column(Series::new(
            COMPETITION_OPEN_SINCE_MONTH.into(),
            vec![Some(13.0), Some(6.0), None, Some(6.0)],
        ))
        .unwrap();
        let err = Cleaner::new().clean(&df).unwrap_err();
        assert!(matches!(err, PrepError::InvalidDate(_)));
    }
}
