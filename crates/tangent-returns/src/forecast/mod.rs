//! External forecasts.
//!
//! Forecaster output is untrusted text. It is parsed against a fixed schema
//! (`{"expected_return": number, "confidence": number}`, unknown fields
//! rejected) and range-checked before it can become a view.

mod collector;

pub use collector::{ForecastCollector, ForecastSet, ForecastStrategy};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floor applied when a confidence is turned into a view confidence.
pub const MIN_VIEW_CONFIDENCE: f64 = 1e-3;

/// Why forecaster output was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastValidationError {
    /// Response was empty
    #[error("empty response")]
    Empty,

    /// Response did not match the schema
    #[error("malformed forecast: {0}")]
    Malformed(String),

    /// A field was not a finite number
    #[error("{field} is not finite")]
    NonFinite {
        /// Offending field
        field: &'static str,
    },

    /// Confidence outside [0, 100]
    #[error("confidence {0} is outside [0, 100]")]
    ConfidenceOutOfRange(f64),

    /// Expected return outside (-1, max]
    #[error("expected return {value} is outside (-1, {max}]")]
    ReturnOutOfRange {
        /// Parsed value
        value: f64,
        /// Configured upper bound
        max: f64,
    },
}

/// Validated forecast for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Annualized expected return as a fraction
    pub expected_return: f64,
    /// Confidence in [0, 100]
    pub confidence: f64,
}

impl Forecast {
    /// Confidence as a view confidence in [1e-3, 1].
    pub fn view_confidence(&self) -> f64 {
        (self.confidence / 100.0).clamp(MIN_VIEW_CONFIDENCE, 1.0)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForecast {
    expected_return: f64,
    confidence: f64,
}

/// Forecast collection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Per-asset deadline in milliseconds (default: 30000)
    pub timeout_ms: u64,
    /// Requests in flight (default: 4)
    pub concurrency: usize,
    /// Largest accepted expected return (default: 1.0, i.e. +100%)
    pub max_abs_return: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            concurrency: 4,
            max_abs_return: 1.0,
        }
    }
}

/// Strip an optional Markdown code fence (```json ... ```).
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    // Drop the info string ("json") on the opening line.
    match body.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => body.trim(),
    }
}

/// Parse and validate raw forecaster output.
pub fn parse_forecast(raw: &str, max_abs_return: f64) -> Result<Forecast, ForecastValidationError> {
    let body = strip_fence(raw);
    if body.is_empty() {
        return Err(ForecastValidationError::Empty);
    }

    let parsed: RawForecast =
        serde_json::from_str(body).map_err(|e| ForecastValidationError::Malformed(e.to_string()))?;

    if !parsed.expected_return.is_finite() {
        return Err(ForecastValidationError::NonFinite {
            field: "expected_return",
        });
    }
    if !parsed.confidence.is_finite() {
        return Err(ForecastValidationError::NonFinite { field: "confidence" });
    }
    if !(0.0..=100.0).contains(&parsed.confidence) {
        return Err(ForecastValidationError::ConfidenceOutOfRange(parsed.confidence));
    }
    if parsed.expected_return <= -1.0 || parsed.expected_return > max_abs_return {
        return Err(ForecastValidationError::ReturnOutOfRange {
            value: parsed.expected_return,
            max: max_abs_return,
        });
    }

    Ok(Forecast {
        expected_return: parsed.expected_return,
        confidence: parsed.confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parses_plain_json() {
        let forecast = parse_forecast(r#"{"expected_return": 0.07, "confidence": 82}"#, 1.0).unwrap();
        assert_eq!(forecast.expected_return, 0.07);
        assert_eq!(forecast.confidence, 82.0);
        assert!((forecast.view_confidence() - 0.82).abs() < 1e-12);
    }

    #[rstest]
    #[case("```json\n{\"expected_return\": 0.05, \"confidence\": 60}\n```")]
    #[case("```\n{\"expected_return\": 0.05, \"confidence\": 60}\n```")]
    #[case("  {\"expected_return\": 0.05, \"confidence\": 60}\n")]
    fn test_tolerates_fences(#[case] raw: &str) {
        let forecast = parse_forecast(raw, 1.0).unwrap();
        assert_eq!(forecast.expected_return, 0.05);
    }

    #[rstest]
    #[case("", "empty")]
    #[case("```json\n```", "empty")]
    #[case("{'expected_return': 0.07, 'confidence': 82}", "malformed")]
    #[case(r#"{"expected_return": 0.07}"#, "malformed")]
    #[case(r#"{"expected_return": 0.07, "confidence": 82, "note": "x"}"#, "malformed")]
    #[case(r#"{"expected_return": "0.07", "confidence": 82}"#, "malformed")]
    #[case(r#"__import__('os').system('echo')"#, "malformed")]
    #[case(r#"{"expected_return": 0.07, "confidence": 120}"#, "confidence")]
    #[case(r#"{"expected_return": 0.07, "confidence": -1}"#, "confidence")]
    #[case(r#"{"expected_return": -1.0, "confidence": 50}"#, "return")]
    #[case(r#"{"expected_return": 3.5, "confidence": 50}"#, "return")]
    fn test_rejections(#[case] raw: &str, #[case] kind: &str) {
        let err = parse_forecast(raw, 1.0).unwrap_err();
        let matched = match kind {
            "empty" => matches!(err, ForecastValidationError::Empty),
            "malformed" => matches!(err, ForecastValidationError::Malformed(_)),
            "confidence" => matches!(err, ForecastValidationError::ConfidenceOutOfRange(_)),
            "return" => matches!(err, ForecastValidationError::ReturnOutOfRange { .. }),
            _ => false,
        };
        assert!(matched, "{raw:?} gave {err:?}");
    }

    #[test]
    fn test_view_confidence_floor() {
        let forecast = Forecast {
            expected_return: 0.1,
            confidence: 0.0,
        };
        assert_eq!(forecast.view_confidence(), MIN_VIEW_CONFIDENCE);
    }
}
