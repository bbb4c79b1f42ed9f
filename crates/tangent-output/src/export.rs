//! JSON and CSV export of allocation reports and growth series.

use crate::growth::GrowthSeries;
use crate::report::AllocationReport;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

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

    /// CSV writer produced invalid UTF-8.
    #[error("Encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    #[default]
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

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ExportError::InvalidFormat(format!("{} has no extension", path.display())))?
            .parse()
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::PrettyJson),
            "compact-json" | "compact_json" => Ok(Self::Json),
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

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Serialize)]
struct AllocationRecord<'a> {
    asset: &'a str,
    weight: f64,
    amount: Option<f64>,
    expected_return: Option<f64>,
    source: Option<&'a str>,
}

impl Exporter for AllocationReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut output = String::new();
                let performance = &self.performance;
                output.push_str(&format!("# Method: {}\n", self.method));
                output.push_str(&format!("# Expected Return: {}\n", performance.expected_return));
                output.push_str(&format!("# Volatility: {}\n", performance.volatility));
                output.push_str(&format!("# Sharpe Ratio: {}\n", performance.sharpe_ratio));

                let mut wtr = csv::Writer::from_writer(vec![]);
                for row in &self.rows {
                    wtr.serialize(AllocationRecord {
                        asset: &row.asset,
                        weight: row.weight,
                        amount: row.amount,
                        expected_return: row.expected_return,
                        source: row.source.as_deref(),
                    })?;
                }
                output.push_str(&into_string(wtr)?);
                Ok(output)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for GrowthSeries {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for point in self.points() {
                    wtr.serialize(point)?;
                }
                into_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::GrowthPoint;
    use crate::report::AllocationRow;
    use chrono::NaiveDate;
    use rstest::rstest;
    use tangent_optimize::{OptimizationMethod, PerformanceSummary};

    fn report() -> AllocationReport {
        AllocationReport {
            title: "Test".to_string(),
            method: OptimizationMethod::MaxSharpe,
            risk_free_rate: 0.02,
            investment_amount: Some(10_000.0),
            rows: vec![
                AllocationRow {
                    asset: "AAPL".to_string(),
                    weight: 0.6,
                    amount: Some(6_000.0),
                    expected_return: Some(0.11),
                    source: Some("capm".to_string()),
                },
                AllocationRow {
                    asset: "MSFT".to_string(),
                    weight: 0.4,
                    amount: Some(4_000.0),
                    expected_return: None,
                    source: None,
                },
            ],
            performance: PerformanceSummary {
                expected_return: 0.1,
                volatility: 0.15,
                sharpe_ratio: 0.53,
            },
            dropped: Vec::new(),
        }
    }

    #[test]
    fn test_allocation_csv() {
        let csv = report().export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("# Method: max_sharpe\n"));
        assert!(csv.contains("asset,weight,amount,expected_return,source"));
        assert!(csv.contains("AAPL,0.6,6000.0,0.11,capm"));
        assert!(csv.contains("MSFT,0.4,4000.0,,"));
    }

    #[test]
    fn test_allocation_json_round_trips() {
        let json = report().export_to_string(ExportFormat::Json).unwrap();
        let parsed: AllocationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report());
    }

    #[test]
    fn test_growth_csv() {
        let series = GrowthSeries::from_points(
            1_000.0,
            vec![GrowthPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                value: 1_000.0,
            }],
        );
        let csv = series.export_to_string(ExportFormat::Csv).unwrap();
        assert_eq!(csv, "date,value\n2024-01-02,1000.0\n");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocation.json");
        report().export_to_file(&path, ExportFormat::PrettyJson).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"AAPL\""));
        assert!(written.contains("  "));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::PrettyJson)]
    #[case("compact-json", ExportFormat::Json)]
    fn test_parse_format(#[case] raw: &str, #[case] expected: ExportFormat) {
        assert_eq!(raw.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out/weights.csv")).unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::from_path(Path::new("weights")).is_err());
        assert!(ExportFormat::from_path(Path::new("weights.xlsx")).is_err());
    }
}
