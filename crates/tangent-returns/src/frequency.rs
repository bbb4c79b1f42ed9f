//! Return sampling frequency.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tangent_data::PriceSeries;

/// Sampling frequency for periodic returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One return per trading day
    #[default]
    Daily,
    /// One return per calendar month, from month-end prices
    Monthly,
}

impl Frequency {
    /// Periods per year used to annualize.
    pub const fn periods_per_year(self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Monthly => 12.0,
        }
    }

    /// Periodic simple returns of `series` at this frequency.
    ///
    /// Monthly returns are keyed by calendar month end so that series whose
    /// last trading days differ still line up.
    pub fn returns(self, series: &PriceSeries) -> BTreeMap<NaiveDate, f64> {
        match self {
            Self::Daily => series.returns(),
            Self::Monthly => series
                .resample_monthly()
                .returns()
                .into_iter()
                .map(|(date, r)| (month_end(date), r))
                .collect(),
        }
    }
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}
