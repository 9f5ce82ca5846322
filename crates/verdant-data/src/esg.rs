//! ESG scores and per-date cross-sectional feature transforms.
//!
//! Raw provider scores are standardized, min-max normalized and ranked within
//! each date. The normalized value is the `[0, 1]` score consumed by the
//! optimizer.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ESG score per asset, each in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EsgScores {
    scores: BTreeMap<String, f64>,
}

impl EsgScores {
    /// Build validated scores, at most one per asset.
    pub fn new(scores: impl IntoIterator<Item = (String, f64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (asset, score) in scores {
            if !(0.0..=1.0).contains(&score) {
                return Err(DataError::InvalidEsgScore { asset, score });
            }
            if map.contains_key(&asset) {
                return Err(DataError::DuplicateEsgScore { asset });
            }
            map.insert(asset, score);
        }
        Ok(Self { scores: map })
    }

    /// Latest normalized score per asset at or before `as_of`.
    pub fn from_features(features: &[EsgFeature], as_of: NaiveDate) -> Result<Self> {
        let mut latest: BTreeMap<&str, &EsgFeature> = BTreeMap::new();
        for feature in features.iter().filter(|f| f.date <= as_of) {
            let entry = latest.entry(feature.asset_id.as_str()).or_insert(feature);
            if feature.date >= entry.date {
                *entry = feature;
            }
        }
        Self::new(
            latest
                .into_iter()
                .map(|(asset, f)| (asset.to_string(), f.esg_normalized)),
        )
    }

    /// Score for one asset.
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.scores.get(asset).copied()
    }

    /// Scores in the order of `assets`; every asset must have a score.
    pub fn aligned(&self, assets: &[String]) -> Result<Array1<f64>> {
        assets
            .iter()
            .map(|a| {
                self.get(a).ok_or_else(|| DataError::MissingData {
                    asset: a.clone(),
                    reason: "no ESG score".to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Iterate over `(asset, score)` in asset order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(a, &s)| (a.as_str(), s))
    }

    /// Number of scored assets.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether no asset is scored.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Raw provider score for one asset on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgObservation {
    /// Asset identifier.
    pub asset_id: String,

    /// Observation date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Score provider.
    pub provider: String,

    /// Unscaled provider score.
    pub esg_raw: f64,
}

/// Cross-sectional ESG features for one asset on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgFeature {
    /// Asset identifier.
    pub asset_id: String,

    /// Observation date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Score provider.
    pub provider: String,

    /// Z-score within the date.
    pub esg_z: f64,

    /// Percentile rank within the date, in `(0, 1]`.
    pub esg_percentile: f64,

    /// Min-max normalized score within the date, in `[0, 1]`.
    pub esg_normalized: f64,
}

/// Z-scores using the population standard deviation. A zero deviation
/// divides by one.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let scale = if std > 0.0 { std } else { 1.0 };
    values.iter().map(|v| (v - mean) / scale).collect()
}

/// Min-max scaling to `[0, 1]`; a constant cross-section maps to 0.5.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || min == max {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Percentile ranks `rank / n`, ties broken by position.
pub fn percentile_rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut ranks = vec![0.0; n];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = (rank + 1) as f64 / n as f64;
    }
    ranks
}

/// Derive features for every date present in `observations`.
///
/// Standardization runs on raw scores; percentile and normalization run on
/// the resulting z-scores, all grouped by date. Output is ordered by date,
/// then by input order within the date.
pub fn derive_features(observations: &[EsgObservation]) -> Vec<EsgFeature> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&EsgObservation>> = BTreeMap::new();
    for obs in observations {
        by_date.entry(obs.date).or_default().push(obs);
    }

    let mut features = Vec::with_capacity(observations.len());
    for (date, group) in by_date {
        let raw: Vec<f64> = group.iter().map(|o| o.esg_raw).collect();
        let z = standardize(&raw);
        let pct = percentile_rank(&z);
        let norm = normalize(&z);

        for (i, obs) in group.into_iter().enumerate() {
            features.push(EsgFeature {
                asset_id: obs.asset_id.clone(),
                date,
                provider: obs.provider.clone(),
                esg_z: z[i],
                esg_percentile: pct[i],
                esg_normalized: norm[i],
            });
        }
    }

    tracing::debug!(count = features.len(), "derived ESG features");
    features
}
