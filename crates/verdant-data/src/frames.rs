//! Loading core types from CSV tables through polars.
//!
//! Headers are lower-cased and `date` is accepted as an alias of `dt`. Rows
//! with a null or unparsable numeric cell are skipped; a missing required
//! column or an unparsable date is an error.

use crate::error::{DataError, Result};
use crate::esg::{EsgObservation, EsgScores, derive_features};
use crate::rates::RiskFreeSeries;
use crate::records::ReturnRecord;
use crate::series::AssetSeries;
use crate::weights::WeightRow;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Read a CSV file and normalize its column names.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    normalize_columns(&mut df)?;
    tracing::debug!(path = %path.display(), rows = df.height(), "loaded table");
    Ok(df)
}

/// Lower-case every column name and rename `date` to `dt`.
pub fn normalize_columns(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for name in names {
        let mut normalized = name.trim().to_lowercase();
        if normalized == "date" {
            normalized = "dt".to_string();
        }
        if normalized != name {
            df.rename(&name, normalized.into())?;
        }
    }
    Ok(())
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn require(df: &DataFrame, table: &str, name: &str) -> Result<Series> {
    if !has_column(df, name) {
        return Err(DataError::MissingColumn {
            column: name.to_string(),
            table: table.to_string(),
        });
    }
    Ok(df.column(name)?.as_materialized_series().clone())
}

fn string_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    let series = require(df, table, name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn float_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let series = require(df, table, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

fn date_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<NaiveDate>> {
    string_column(df, table, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let raw = value.ok_or_else(|| {
                DataError::Parse(format!("{table}: empty {name} at row {row}"))
            })?;
            parse_date(&raw)
        })
        .collect()
}

/// Parse an ISO date, ignoring any time-of-day suffix.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("invalid date '{raw}': {e}")))
}

/// Price series from a table with `asset_id`, `dt` and `adj_close` columns.
pub fn prices_from_frame(df: &DataFrame) -> Result<Vec<AssetSeries>> {
    let assets = string_column(df, "prices", "asset_id")?;
    let dates = date_column(df, "prices", "dt")?;
    let closes = float_column(df, "prices", "adj_close")?;

    let mut grouped: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    let mut skipped = 0usize;
    for ((asset, date), close) in assets.into_iter().zip(dates).zip(closes) {
        match (asset, close) {
            (Some(asset), Some(close)) => grouped.entry(asset).or_default().push((date, close)),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "dropped price rows with missing asset or close");
    }

    grouped
        .into_iter()
        .map(|(asset, points)| AssetSeries::from_unsorted(asset, points))
        .collect()
}

/// Risk-free series from a table with `dt` and `rate` columns holding daily
/// rates.
pub fn risk_free_from_frame(df: &DataFrame) -> Result<RiskFreeSeries> {
    let dates = date_column(df, "risk_free", "dt")?;
    let rates = float_column(df, "risk_free", "rate")?;
    Ok(RiskFreeSeries::new(
        dates
            .into_iter()
            .zip(rates)
            .filter_map(|(d, r)| r.map(|r| (d, r))),
    ))
}

/// ESG scores from a table with `asset_id` and `esg` columns.
///
/// When a `dt` column is present, the latest score per asset wins.
pub fn esg_scores_from_frame(df: &DataFrame) -> Result<EsgScores> {
    let assets = string_column(df, "esg", "asset_id")?;
    let scores = float_column(df, "esg", "esg")?;
    let dates = if has_column(df, "dt") {
        date_column(df, "esg", "dt")?
    } else {
        vec![NaiveDate::MIN; assets.len()]
    };

    let mut latest: BTreeMap<String, (NaiveDate, f64)> = BTreeMap::new();
    for ((asset, score), date) in assets.into_iter().zip(scores).zip(dates) {
        let (Some(asset), Some(score)) = (asset, score) else {
            continue;
        };
        let entry = latest.entry(asset).or_insert((date, score));
        if date >= entry.0 {
            *entry = (date, score);
        }
    }

    EsgScores::new(latest.into_iter().map(|(a, (_, s))| (a, s)))
}

/// ESG scores from either a normalized (`esg`) or a raw (`esg_raw`) table.
///
/// Raw observations are normalized within each date and the latest
/// normalized score per asset wins.
pub fn esg_scores_from_any_frame(df: &DataFrame) -> Result<EsgScores> {
    if has_column(df, "esg_raw") {
        let features = derive_features(&esg_observations_from_frame(df)?);
        EsgScores::from_features(&features, NaiveDate::MAX)
    } else {
        esg_scores_from_frame(df)
    }
}

/// Raw ESG observations from a table with `asset_id`, `dt` and `esg_raw`
/// columns and an optional `provider` column.
pub fn esg_observations_from_frame(df: &DataFrame) -> Result<Vec<EsgObservation>> {
    let assets = string_column(df, "esg_raw", "asset_id")?;
    let dates = date_column(df, "esg_raw", "dt")?;
    let raws = float_column(df, "esg_raw", "esg_raw")?;
    let providers = if has_column(df, "provider") {
        string_column(df, "esg_raw", "provider")?
    } else {
        vec![None; assets.len()]
    };

    Ok(assets
        .into_iter()
        .zip(dates)
        .zip(raws)
        .zip(providers)
        .filter_map(|(((asset, date), raw), provider)| {
            Some(EsgObservation {
                asset_id: asset?,
                date,
                provider: provider.unwrap_or_else(|| "unknown".to_string()),
                esg_raw: raw?,
            })
        })
        .collect())
}

/// Long-format returns from a table with `asset_id`, `dt` and `return_1d`
/// columns.
pub fn returns_from_frame(df: &DataFrame) -> Result<Vec<ReturnRecord>> {
    let assets = string_column(df, "returns", "asset_id")?;
    let dates = date_column(df, "returns", "dt")?;
    let values = float_column(df, "returns", "return_1d")?;

    Ok(assets
        .into_iter()
        .zip(dates)
        .zip(values)
        .filter_map(|((asset, date), value)| Some(ReturnRecord::new(asset?, date, value?)))
        .collect())
}

/// Long-format weights from a table with `dt`, `asset_id` and `weight`
/// columns.
pub fn weights_from_frame(df: &DataFrame) -> Result<Vec<WeightRow>> {
    let dates = date_column(df, "weights", "dt")?;
    let assets = string_column(df, "weights", "asset_id")?;
    let weights = float_column(df, "weights", "weight")?;

    Ok(dates
        .into_iter()
        .zip(assets)
        .zip(weights)
        .filter_map(|((date, asset), weight)| {
            Some(WeightRow {
                date,
                asset_id: asset?,
                weight: weight?,
            })
        })
        .collect())
}

/// Long-format returns as a polars frame with `asset_id`, `dt` and
/// `return_1d` columns.
pub fn returns_to_frame(records: &[ReturnRecord]) -> Result<DataFrame> {
    let assets: Vec<&str> = records.iter().map(|r| r.asset_id.as_str()).collect();
    let dates: Vec<String> = records.iter().map(|r| r.date.to_string()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.return_1d).collect();

    Ok(DataFrame::new(vec![
        Series::new("asset_id".into(), assets).into(),
        Series::new("dt".into(), dates).into(),
        Series::new("return_1d".into(), values).into(),
    ])?)
}
