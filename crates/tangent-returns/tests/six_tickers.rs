//! CAPM estimation over a batch where one ticker has no data.

use chrono::NaiveDate;
use tangent_data::{DataError, PriceHistory, PriceSeries};
use tangent_returns::{
    CapmConfig, EstimationError, Frequency, HistoricalMeanConfig, MarketContext, ReturnEstimator,
};

const TICKERS: [&str; 6] = ["AAPL", "MSFT", "GOOG", "AMZN", "NVDA", "ZZZZ"];

fn business_days(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

/// Compound a repeating return pattern scaled by `scale` plus a drift.
fn series(symbol: &str, scale: f64, drift: f64, days: &[NaiveDate]) -> PriceSeries {
    let pattern = [0.010, -0.006, 0.004, -0.002, 0.007, -0.008, 0.003];
    let mut price = 100.0;
    let observations = days.iter().enumerate().map(|(i, day)| {
        if i > 0 {
            price *= 1.0 + scale * pattern[i % pattern.len()] + drift;
        }
        (*day, price)
    });
    PriceSeries::new(symbol, observations.collect::<Vec<_>>())
}

fn history() -> PriceHistory {
    let days = business_days(60);
    let mut history = PriceHistory::new();
    history.insert(series("^GSPC", 1.0, 0.0003, &days));
    history.insert(PriceSeries::new(
        "^IRX",
        days.iter().map(|d| (*d, 5.2)).collect::<Vec<_>>(),
    ));
    for (i, ticker) in TICKERS.iter().take(5).enumerate() {
        history.insert(series(ticker, 0.5 + 0.3 * i as f64, 0.0001 * i as f64, &days));
    }
    history.insert_missing("ZZZZ", DataError::missing("ZZZZ", "No data found, symbol may be delisted"));
    history
}

#[test]
fn test_one_missing_ticker_is_dropped_alone() {
    let history = history();
    let config = CapmConfig::default();
    let context = MarketContext::from_history(&history, &config).unwrap();
    let estimator = ReturnEstimator::capm(context, &config, HistoricalMeanConfig::default());

    let tickers: Vec<String> = TICKERS.iter().map(|t| t.to_string()).collect();
    let report = estimator.estimate(&tickers, &history);

    assert_eq!(report.views().len(), 5);
    assert!(report.views().is_clean());
    assert_eq!(report.failures().len(), 1);
    assert!(matches!(
        report.failure("ZZZZ").and_then(|f| f.primary()),
        Some(EstimationError::DataUnavailable { .. })
    ));
    for ticker in TICKERS.iter().take(5) {
        assert_eq!(report.sources()[*ticker], "capm");
    }
}

#[test]
fn test_monthly_frequency_falls_back_when_overlap_is_short() {
    // Two month ends give a single monthly return, below the beta minimum.
    let history = history();
    let config = CapmConfig {
        frequency: Frequency::Monthly,
        ..Default::default()
    };
    let context = MarketContext::from_history(&history, &config).unwrap();
    let estimator = ReturnEstimator::capm(context, &config, HistoricalMeanConfig::default());

    let report = estimator.estimate(&["AAPL".to_string()], &history);
    assert_eq!(report.sources()["AAPL"], "historical_mean");
}
