#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod forecast;
pub mod prices;
pub mod provider;
pub mod yahoo;

pub use error::{DataError, Result};
pub use forecast::{Forecaster, OpenAiForecaster};
pub use prices::{DateRange, PriceHistory, PriceSeries};
pub use provider::{CachedPriceProvider, PriceHistoryProvider, StaticPriceProvider};
pub use yahoo::YahooQuoteProvider;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
