//! Price series, the dates x assets price panel, and simple return derivation.

use crate::error::{DataError, Result};
use crate::records::ReturnRecord;
use chrono::NaiveDate;
use derive_more::Display;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered price history for one asset.
///
/// Dates are strictly increasing with no duplicates and every price is finite
/// and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    asset_id: String,
    points: Vec<(NaiveDate, f64)>,
}

impl AssetSeries {
    /// Build a validated series from `(date, price)` pairs in date order.
    pub fn new(asset_id: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Result<Self> {
        let asset_id = asset_id.into();

        for (idx, &(date, price)) in points.iter().enumerate() {
            if !price.is_finite() || price <= 0.0 {
                return Err(DataError::InvalidPrice {
                    asset: asset_id,
                    date: date.to_string(),
                    price,
                });
            }
            if idx > 0 && points[idx - 1].0 >= date {
                return Err(DataError::UnorderedDates {
                    asset: asset_id,
                    date: date.to_string(),
                });
            }
        }

        Ok(Self { asset_id, points })
    }

    /// Build a series from unordered observations, sorting by date first.
    ///
    /// Duplicate dates are still rejected.
    pub fn from_unsorted(
        asset_id: impl Into<String>,
        mut points: Vec<(NaiveDate, f64)>,
    ) -> Result<Self> {
        points.sort_by_key(|&(date, _)| date);
        Self::new(asset_id, points)
    }

    /// Asset identifier.
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Observations in date order.
    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// Number of observations.
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no observations.
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// How the first observation of a series is treated when deriving returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum FirstReturn {
    /// The first observation produces no return record.
    #[default]
    #[display("drop")]
    Drop,

    /// The first observation produces a zero return.
    #[display("zero")]
    Zero,
}

/// Derive simple daily returns `p_t / p_{t-1} - 1` for one series.
pub fn simple_returns(series: &AssetSeries, first: FirstReturn) -> Vec<ReturnRecord> {
    let points = series.points();
    let mut records = Vec::with_capacity(points.len());

    if let (Some(&(date, _)), FirstReturn::Zero) = (points.first(), first) {
        records.push(ReturnRecord::new(series.asset_id(), date, 0.0));
    }

    records.extend(points.windows(2).map(|pair| {
        let (_, previous) = pair[0];
        let (date, current) = pair[1];
        ReturnRecord::new(series.asset_id(), date, current / previous - 1.0)
    }));

    records
}

/// Prices for many assets aligned on the union of their dates.
///
/// Cells where an asset has no quote are NaN. Columns follow `assets`, which is
/// sorted by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePanel {
    assets: Vec<String>,
    dates: Vec<NaiveDate>,
    prices: Array2<f64>,
}

impl PricePanel {
    /// Align a set of series into a panel.
    pub fn from_series(series: &[AssetSeries]) -> Result<Self> {
        let mut by_asset: BTreeMap<&str, &AssetSeries> = BTreeMap::new();
        for s in series {
            if by_asset.insert(s.asset_id(), s).is_some() {
                return Err(DataError::Parse(format!(
                    "asset {} appears more than once",
                    s.asset_id()
                )));
            }
        }

        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.points().iter().map(|&(date, _)| date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: BTreeMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

        let assets: Vec<String> = by_asset.keys().map(|a| (*a).to_string()).collect();
        let mut prices = Array2::from_elem((dates.len(), assets.len()), f64::NAN);

        for (col, s) in by_asset.values().enumerate() {
            for &(date, price) in s.points() {
                prices[[row_of[&date], col]] = price;
            }
        }

        Ok(Self {
            assets,
            dates,
            prices,
        })
    }

    /// Column labels.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Raw price matrix (dates x assets), NaN where missing.
    pub const fn prices(&self) -> &Array2<f64> {
        &self.prices
    }

    /// Restrict the panel to the given assets, in the given order.
    pub fn select(&self, assets: &[String]) -> Result<Self> {
        let cols: Vec<usize> = assets
            .iter()
            .map(|a| {
                self.assets
                    .iter()
                    .position(|x| x == a)
                    .ok_or_else(|| DataError::MissingData {
                        asset: a.clone(),
                        reason: "not present in price panel".to_string(),
                    })
            })
            .collect::<Result<_>>()?;

        let mut prices = Array2::from_elem((self.dates.len(), cols.len()), f64::NAN);
        for (new_col, &old_col) in cols.iter().enumerate() {
            prices.column_mut(new_col).assign(&self.prices.column(old_col));
        }

        Ok(Self {
            assets: assets.to_vec(),
            dates: self.dates.clone(),
            prices,
        })
    }

    /// Copy of the price matrix with gaps filled from the previous quote.
    ///
    /// Leading gaps stay NaN.
    pub fn forward_filled(&self) -> Array2<f64> {
        let mut filled = self.prices.clone();
        for mut column in filled.columns_mut() {
            let mut last = f64::NAN;
            for value in column.iter_mut() {
                if value.is_nan() {
                    *value = last;
                } else {
                    last = *value;
                }
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_series_rejects_duplicate_dates() {
        let result = AssetSeries::new("A", vec![(day(1), 10.0), (day(1), 11.0)]);
        assert!(matches!(result, Err(DataError::UnorderedDates { .. })));
    }

    #[test]
    fn test_series_rejects_non_positive_price() {
        let result = AssetSeries::new("A", vec![(day(1), 10.0), (day(2), 0.0)]);
        assert!(matches!(result, Err(DataError::InvalidPrice { .. })));
    }

    #[test]
    fn test_from_unsorted_orders_points() {
        let series = AssetSeries::from_unsorted("A", vec![(day(3), 12.0), (day(1), 10.0)]).unwrap();
        assert_eq!(series.points()[0].0, day(1));
    }

    #[test]
    fn test_simple_returns_drop_and_zero() {
        let series = AssetSeries::new("A", vec![(day(1), 100.0), (day(2), 101.0), (day(3), 99.99)])
            .unwrap();

        let dropped = simple_returns(&series, FirstReturn::Drop);
        assert_eq!(dropped.len(), 2);
        assert_relative_eq!(dropped[0].return_1d, 0.01, epsilon = 1e-12);
        assert_relative_eq!(dropped[1].return_1d, -0.01, epsilon = 1e-12);

        let zeroed = simple_returns(&series, FirstReturn::Zero);
        assert_eq!(zeroed.len(), 3);
        assert_eq!(zeroed[0].date, day(1));
        assert_eq!(zeroed[0].return_1d, 0.0);
    }

    #[test]
    fn test_panel_alignment_and_forward_fill() {
        let a = AssetSeries::new("B", vec![(day(1), 10.0), (day(3), 12.0)]).unwrap();
        let b = AssetSeries::new("A", vec![(day(2), 5.0), (day(3), 6.0)]).unwrap();
        let panel = PricePanel::from_series(&[a, b]).unwrap();

        assert_eq!(panel.assets(), &["A".to_string(), "B".to_string()]);
        assert_eq!(panel.dates().len(), 3);
        assert!(panel.prices()[[0, 0]].is_nan());
        assert!(panel.prices()[[1, 1]].is_nan());

        let filled = panel.forward_filled();
        assert!(filled[[0, 0]].is_nan());
        assert_eq!(filled[[1, 1]], 10.0);
    }

    #[test]
    fn test_panel_select_unknown_asset() {
        let a = AssetSeries::new("A", vec![(day(1), 10.0)]).unwrap();
        let panel = PricePanel::from_series(&[a]).unwrap();
        assert!(panel.select(&["Z".to_string()]).is_err());
    }
}
