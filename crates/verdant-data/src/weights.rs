//! Weight vectors and dated weight snapshots.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for the sum-to-one and bound checks on weights.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Long-only portfolio weights summing to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    /// Build a validated weight vector.
    pub fn new(weights: impl IntoIterator<Item = (String, f64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (asset, w) in weights {
            if !w.is_finite() || w < -WEIGHT_TOLERANCE {
                return Err(DataError::InvalidWeights(format!(
                    "weight {w} for {asset} is negative or not finite"
                )));
            }
            if map.insert(asset.clone(), w.max(0.0)).is_some() {
                return Err(DataError::InvalidWeights(format!(
                    "asset {asset} weighted twice"
                )));
            }
        }

        let total: f64 = map.values().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(DataError::InvalidWeights(format!(
                "weights sum to {total}, expected 1"
            )));
        }

        Ok(Self { weights: map })
    }

    /// Build from an array aligned with `assets`.
    pub fn from_array(assets: &[String], weights: &Array1<f64>) -> Result<Self> {
        if assets.len() != weights.len() {
            return Err(DataError::InvalidWeights(format!(
                "{} assets but {} weights",
                assets.len(),
                weights.len()
            )));
        }
        Self::new(assets.iter().cloned().zip(weights.iter().copied()))
    }

    /// Check every weight lies within `[lower, upper]` up to the tolerance.
    pub fn check_bounds(&self, lower: f64, upper: f64) -> Result<()> {
        match self
            .weights
            .iter()
            .find(|&(_, &w)| w < lower - WEIGHT_TOLERANCE || w > upper + WEIGHT_TOLERANCE)
        {
            Some((asset, w)) => Err(DataError::InvalidWeights(format!(
                "weight {w} for {asset} outside [{lower}, {upper}]"
            ))),
            None => Ok(()),
        }
    }

    /// Weight of one asset.
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.weights.get(asset).copied()
    }

    /// Weights in the order of `assets`, zero for unknown assets.
    pub fn to_array(&self, assets: &[String]) -> Array1<f64> {
        assets
            .iter()
            .map(|a| self.get(a).unwrap_or(0.0))
            .collect()
    }

    /// Iterate over `(asset, weight)` in asset order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(a, &w)| (a.as_str(), w))
    }

    /// Sum of weights.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the vector has no assets.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Weight vector tagged with the date it became effective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    /// As-of date.
    pub date: NaiveDate,

    /// Weights effective from `date`.
    pub weights: WeightVector,
}

impl WeightSnapshot {
    /// Create a new snapshot.
    pub const fn new(date: NaiveDate, weights: WeightVector) -> Self {
        Self { date, weights }
    }

    /// Group long-format `(date, asset, weight)` rows into snapshots ordered
    /// by date.
    pub fn from_rows(rows: &[WeightRow]) -> Result<Vec<Self>> {
        let mut grouped: BTreeMap<NaiveDate, Vec<(String, f64)>> = BTreeMap::new();
        for row in rows {
            grouped
                .entry(row.date)
                .or_default()
                .push((row.asset_id.clone(), row.weight));
        }
        grouped
            .into_iter()
            .map(|(date, weights)| Ok(Self::new(date, WeightVector::new(weights)?)))
            .collect()
    }

    /// Flatten into long-format rows.
    pub fn to_rows(&self) -> Vec<WeightRow> {
        self.weights
            .iter()
            .map(|(asset, weight)| WeightRow {
                date: self.date,
                asset_id: asset.to_string(),
                weight,
            })
            .collect()
    }
}

/// One row of the long-format weights table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    /// As-of date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Asset identifier.
    pub asset_id: String,

    /// Portfolio weight.
    pub weight: f64,
}
