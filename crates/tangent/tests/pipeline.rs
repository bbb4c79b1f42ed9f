//! End-to-end runs over in-memory prices.

use approx::assert_abs_diff_eq;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rstest::rstest;
use std::ops::Range;
use std::sync::Arc;
use tangent::data::{DataError, DateRange, Forecaster, PriceSeries, StaticPriceProvider};
use tangent::optimize::OptimizationMethod;
use tangent::risk::covariance::symmetric_eigen;
use tangent::{Error, ForecastSource, Pipeline, RunConfig};

const DAYS: usize = 120;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn full_range() -> DateRange {
    DateRange::new(start(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()).unwrap()
}

fn market_return(t: usize) -> f64 {
    0.0006 + 0.01 * (0.4 * t as f64).sin()
}

/// Compound `period_return` from a price of 100.
fn compound(symbol: &str, period_return: impl Fn(usize) -> f64) -> PriceSeries {
    let mut price = 100.0;
    let observations: Vec<(NaiveDate, f64)> = (0..DAYS)
        .map(|t| {
            if t > 0 {
                price *= 1.0 + period_return(t);
            }
            (start() + Duration::days(t as i64), price)
        })
        .collect();
    PriceSeries::new(symbol, observations)
}

/// Market exposure plus a distinct idiosyncratic cycle per asset.
fn asset(symbol: &str, beta: f64, drift: f64, amplitude: f64, frequency: f64, phase: f64) -> PriceSeries {
    compound(symbol, |t| {
        beta * market_return(t) + drift + amplitude * (frequency * t as f64 + phase).sin()
    })
}

fn provider() -> StaticPriceProvider {
    StaticPriceProvider::new()
        .with_series(asset("AAA", 1.2, 0.0012, 0.012, 0.9, 0.0))
        .with_series(asset("BBB", 0.8, 0.0008, 0.010, 1.7, 0.5))
        .with_series(asset("CCC", 0.5, 0.0004, 0.008, 2.6, 1.0))
        .with_series(compound("^GSPC", market_return))
        .with_series(PriceSeries::new(
            "^IRX",
            (0..DAYS).map(|t| (start() + Duration::days(t as i64), 4.0)).collect::<Vec<_>>(),
        ))
}

fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn config(source: ForecastSource) -> RunConfig {
    RunConfig {
        source,
        investment_amount: Some(10_000.0),
        ..RunConfig::default()
    }
}

fn assert_long_only_budget(weights: &[(String, f64)]) {
    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-3);
    assert!(weights.iter().all(|(_, w)| (0.0..=1.0).contains(w)));
}

#[tokio::test]
async fn test_historical_mean_run() {
    let outcome = Pipeline::new(provider(), config(ForecastSource::HistoricalMean))
        .run(&tickers(&["AAA", "BBB", "CCC", "ZZZZ"]), full_range())
        .await
        .unwrap();

    assert_eq!(outcome.allocation.weights().len(), 3);
    assert_long_only_budget(outcome.allocation.weights());
    assert_eq!(outcome.allocation.method(), OptimizationMethod::MaxSharpe);
    for ticker in ["AAA", "BBB", "CCC"] {
        assert_eq!(outcome.estimation.sources()[ticker], "historical_mean");
    }

    assert_eq!(outcome.dropped.len(), 1);
    assert!(outcome.dropped.contains_key("ZZZZ"));
    assert_eq!(outcome.report.dropped.len(), 1);
    assert_eq!(outcome.report.rows.len(), 3);
    assert_eq!(outcome.report.investment_amount, Some(10_000.0));

    let growth = outcome.growth.unwrap();
    assert_eq!(growth.len(), DAYS);
    assert_abs_diff_eq!(growth.points()[0].value, 10_000.0, epsilon = 1e-6);
}

#[tokio::test]
async fn test_capm_run_uses_market_series() {
    let outcome = Pipeline::new(provider(), config(ForecastSource::Capm))
        .run(&tickers(&["AAA", "BBB", "CCC"]), full_range())
        .await
        .unwrap();

    for ticker in ["AAA", "BBB", "CCC"] {
        assert_eq!(outcome.estimation.sources()[ticker], "capm");
    }
    // Higher beta, higher CAPM view.
    let views = outcome.estimation.views();
    assert!(views.get("AAA").unwrap() > views.get("BBB").unwrap());
    assert!(views.get("BBB").unwrap() > views.get("CCC").unwrap());

    assert!(outcome.allocation.weight("^GSPC").is_none());
    assert_eq!(outcome.posterior.returns().len(), 3);
    assert!(outcome.dropped.is_empty());
    assert_long_only_budget(outcome.allocation.weights());
}

#[tokio::test]
async fn test_capm_without_market_data_falls_back() {
    let provider = StaticPriceProvider::new()
        .with_series(asset("AAA", 1.2, 0.0012, 0.012, 0.9, 0.0))
        .with_series(asset("BBB", 0.8, 0.0008, 0.010, 1.7, 0.5));

    let outcome = Pipeline::new(provider, config(ForecastSource::Capm))
        .run(&tickers(&["AAA", "BBB"]), full_range())
        .await
        .unwrap();

    assert_eq!(outcome.estimation.sources()["AAA"], "historical_mean");
    assert_eq!(outcome.estimation.sources()["BBB"], "historical_mean");
}

#[rstest]
#[case(OptimizationMethod::MaxSharpe)]
#[case(OptimizationMethod::MinVolatility)]
#[tokio::test]
async fn test_methods(#[case] method: OptimizationMethod) {
    let config = RunConfig {
        method,
        ..config(ForecastSource::HistoricalMean)
    };
    let outcome = Pipeline::new(provider(), config)
        .run(&tickers(&["AAA", "BBB", "CCC"]), full_range())
        .await
        .unwrap();

    assert_eq!(outcome.allocation.method(), method);
    assert_long_only_budget(outcome.allocation.weights());
}

#[tokio::test]
async fn test_one_valid_ticker_is_too_few() {
    let err = Pipeline::new(provider(), config(ForecastSource::HistoricalMean))
        .run(&tickers(&["AAA", "ZZZZ"]), full_range())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TooFewTickers { count: 1, required: 2 }));
    assert!(err.is_data_shortage());
}

#[tokio::test]
async fn test_duplicate_tickers_count_once() {
    let err = Pipeline::new(provider(), config(ForecastSource::HistoricalMean))
        .run(&tickers(&["AAA", "aaa"]), full_range())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TooFewTickers { count: 1, required: 2 }));
}

#[tokio::test]
async fn test_short_window_is_insufficient() {
    let range = DateRange::new(start(), start() + Duration::days(2)).unwrap();
    let err = Pipeline::new(provider(), config(ForecastSource::HistoricalMean))
        .run(&tickers(&["AAA", "BBB"]), range)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientHistory { required: 5, actual: 3 }));
}

#[tokio::test]
async fn test_no_data_at_all() {
    let err = Pipeline::new(provider(), config(ForecastSource::HistoricalMean))
        .run(&tickers(&["XXXX", "YYYY"]), full_range())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Data(DataError::MissingData { .. })));
}

/// Prices on `days` only, so the series has gaps where other assets trade.
fn staggered(symbol: &str, days: &[Range<usize>], period_return: impl Fn(usize) -> f64) -> PriceSeries {
    let mut price = 100.0;
    let observations: Vec<(NaiveDate, f64)> = days
        .iter()
        .cloned()
        .flatten()
        .enumerate()
        .map(|(i, t)| {
            if i > 0 {
                price *= 1.0 + period_return(t);
            }
            (start() + Duration::days(t as i64), price)
        })
        .collect();
    PriceSeries::new(symbol, observations)
}

#[tokio::test]
async fn test_staggered_histories_are_repaired() {
    // Each pair overlaps on a different window: AAA and BBB move together,
    // BBB and CCC move together, AAA and CCC move opposite. The pairwise
    // covariance is indefinite.
    let first = |t: usize| 0.002 + 0.01 * (0.5 * t as f64).sin();
    let second = |t: usize| 0.001 + 0.01 * (0.7 * t as f64).sin();
    let third = |t: usize| 0.01 * (0.9 * t as f64).sin();

    let provider = StaticPriceProvider::new()
        .with_series(staggered("AAA", &[0..30, 60..90], |t| if t < 30 { first(t) } else { third(t) }))
        .with_series(staggered("BBB", &[0..60], |t| if t < 30 { first(t) } else { second(t) }))
        .with_series(staggered("CCC", &[30..90], |t| if t < 60 { second(t) } else { -third(t) }));

    let outcome = Pipeline::new(provider, config(ForecastSource::HistoricalMean))
        .run(&tickers(&["AAA", "BBB", "CCC"]), full_range())
        .await
        .unwrap();

    let min_eigenvalue = symmetric_eigen(outcome.covariance.values()).unwrap().min_eigenvalue();
    assert!(min_eigenvalue > 0.0, "min eigenvalue {min_eigenvalue}");
    assert_eq!(outcome.posterior.returns().len(), 3);
    assert!(outcome.dropped.is_empty());
    assert_long_only_budget(outcome.allocation.weights());
}

/// Answers AAA with a fenced forecast, BBB with prose and fails CCC.
#[derive(Debug)]
struct Scripted;

#[async_trait]
impl Forecaster for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn forecast(&self, ticker: &str) -> tangent::data::Result<String> {
        match ticker {
            "AAA" => Ok("```json\n{\"expected_return\": 0.15, \"confidence\": 80}\n```".to_string()),
            "BBB" => Ok("I expect about ten percent.".to_string()),
            _ => Err(DataError::Forecaster("service unavailable".to_string())),
        }
    }
}

#[tokio::test]
async fn test_external_forecasts_with_fallback() {
    let config = RunConfig {
        use_forecast_confidence: true,
        ..config(ForecastSource::External)
    };
    let outcome = Pipeline::new(provider(), config)
        .with_forecaster(Arc::new(Scripted))
        .run(&tickers(&["AAA", "BBB", "CCC"]), full_range())
        .await
        .unwrap();

    let sources = outcome.estimation.sources();
    assert_eq!(sources["AAA"], "external_forecast");
    assert_eq!(sources["BBB"], "historical_mean");
    assert_eq!(sources["CCC"], "historical_mean");
    assert_abs_diff_eq!(outcome.estimation.views().get("AAA").unwrap(), 0.15);
    assert_long_only_budget(outcome.allocation.weights());

    let row = outcome.report.rows.iter().find(|r| r.asset == "AAA").unwrap();
    assert_eq!(row.source.as_deref(), Some("external_forecast"));
}

#[tokio::test]
async fn test_external_without_forecaster() {
    let err = Pipeline::new(provider(), config(ForecastSource::External))
        .run(&tickers(&["AAA", "BBB"]), full_range())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingForecaster));
}
