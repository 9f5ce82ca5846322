//! CSV and JSON export of verdant results.
//!
//! Every tabular result exports one CSV row per record with a header line.
//! JSON output serializes the records as an array.

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use verdant_backtest::PerformanceMetrics;
use verdant_data::{
    CovarianceEntry, PerformanceRecord, ReturnRecord, WeightRow, WeightSnapshot, WeightVector,
};
use verdant_optimize::{AssetSharpe, FrontierPoint, PortfolioStats};

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[display("csv")]
    Csv,

    /// Compact JSON format.
    #[display("json")]
    Json,

    /// Pretty-printed JSON format.
    #[display("pretty-json")]
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn to_csv<T: Serialize>(rows: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn to_json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::PrettyJson => serde_json::to_string_pretty(value)?,
        _ => serde_json::to_string(value)?,
    })
}

macro_rules! record_exporter {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Exporter for [$ty] {
                fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
                    match format {
                        ExportFormat::Csv => to_csv(self),
                        _ => to_json(self, format),
                    }
                }
            }

            impl Exporter for Vec<$ty> {
                fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
                    self.as_slice().export_to_string(format)
                }
            }
        )+
    };
}

record_exporter!(
    ReturnRecord,
    CovarianceEntry,
    PerformanceRecord,
    WeightRow,
    FrontierPoint,
    AssetSharpe,
    PortfolioStats,
    PerformanceMetrics,
);

/// One holding of an undated weight vector.
#[derive(Debug, Serialize)]
struct HoldingRow<'a> {
    asset_id: &'a str,
    weight: f64,
}

impl Exporter for WeightVector {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let rows: Vec<HoldingRow<'_>> = self
            .iter()
            .map(|(asset_id, weight)| HoldingRow { asset_id, weight })
            .collect();
        match format {
            ExportFormat::Csv => to_csv(&rows),
            _ => to_json(&rows, format),
        }
    }
}

impl Exporter for [WeightSnapshot] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let rows: Vec<WeightRow> = self.iter().flat_map(WeightSnapshot::to_rows).collect();
        rows.export_to_string(format)
    }
}

impl Exporter for Vec<WeightSnapshot> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        self.as_slice().export_to_string(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn weights() -> WeightVector {
        WeightVector::new([("AAPL".to_string(), 0.6), ("MSFT".to_string(), 0.4)]).unwrap()
    }

    #[test]
    fn test_performance_csv_has_header_and_rows() {
        let records = vec![PerformanceRecord {
            date: date(),
            portfolio_return: 0.01,
            cumulative_return: 0.01,
        }];
        let csv = records.export_to_string(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("dt,portfolio_return,cumulative_return"));
        assert_eq!(lines.next(), Some("2024-01-02,0.01,0.01"));
    }

    #[test]
    fn test_frontier_json() {
        let points = vec![
            FrontierPoint {
                target_esg: 0.55,
                sharpe: 1.2,
            },
            FrontierPoint {
                target_esg: 0.56,
                sharpe: 1.1,
            },
        ];
        let json = points.export_to_string(ExportFormat::Json).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"target_esg\":0.55"));

        let pretty = points.export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(pretty.contains("  "));
    }

    #[test]
    fn test_weight_vector_csv() {
        let csv = weights().export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("asset_id,weight"));
        assert!(csv.contains("AAPL,0.6"));
        assert!(csv.contains("MSFT,0.4"));
    }

    #[test]
    fn test_snapshots_flatten_to_rows() {
        let snapshots = vec![WeightSnapshot::new(date(), weights())];
        let csv = snapshots.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("dt,asset_id,weight"));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_nan_covariance_exports() {
        let entries = vec![CovarianceEntry {
            date: date(),
            asset_i: "A".into(),
            asset_j: "B".into(),
            cov: f64::NAN,
        }];
        let csv = entries.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.contains("NaN"));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_format_parsing(#[case] raw: &str, #[case] expected: ExportFormat) {
        assert_eq!(raw.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!("parquet".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
        assert_eq!(ExportFormat::PrettyJson.to_string(), "pretty-json");
    }

    #[test]
    fn test_export_to_file() {
        let path =
            std::env::temp_dir().join(format!("verdant-weights-{}.csv", std::process::id()));
        weights().export_to_file(&path, ExportFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("AAPL"));
        std::fs::remove_file(path).ok();
    }
}
