//! Human-readable allocation reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tangent_optimize::{AllocationResult, OptimizationMethod, PerformanceSummary};

/// One line of the allocation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    /// Asset ticker.
    pub asset: String,

    /// Portfolio weight in `[0, 1]`.
    pub weight: f64,

    /// Currency amount, when an investment amount was given.
    pub amount: Option<f64>,

    /// Annualized view used for the asset, if known.
    pub expected_return: Option<f64>,

    /// Strategy that produced the view.
    pub source: Option<String>,
}

/// An asset that did not make it into the allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedAsset {
    /// Asset ticker.
    pub asset: String,

    /// Why it was dropped.
    pub reason: String,
}

/// Allocation table plus performance summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    /// Report title.
    pub title: String,

    /// Objective that produced the weights.
    pub method: OptimizationMethod,

    /// Annual risk-free rate used for the Sharpe ratio.
    pub risk_free_rate: f64,

    /// Amount invested, reporting only.
    pub investment_amount: Option<f64>,

    /// Allocation rows in universe order.
    pub rows: Vec<AllocationRow>,

    /// Performance of the allocation.
    pub performance: PerformanceSummary,

    /// Assets excluded before optimization.
    pub dropped: Vec<DroppedAsset>,
}

impl AllocationReport {
    /// Build a report from optimizer output.
    pub fn new(result: &AllocationResult, risk_free_rate: f64) -> Self {
        Self {
            title: "Portfolio Allocation".to_string(),
            method: result.method(),
            risk_free_rate,
            investment_amount: None,
            rows: result
                .weights()
                .iter()
                .map(|(asset, weight)| AllocationRow {
                    asset: asset.clone(),
                    weight: *weight,
                    amount: None,
                    expected_return: None,
                    source: None,
                })
                .collect(),
            performance: *result.performance(),
            dropped: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attach an investment amount and fill in per-asset amounts.
    pub fn with_investment_amount(mut self, amount: f64) -> Self {
        self.investment_amount = Some(amount);
        for row in &mut self.rows {
            row.amount = Some(row.weight * amount);
        }
        self
    }

    /// Attach the views and the strategy that produced each of them.
    pub fn with_views(
        mut self,
        views: &BTreeMap<String, f64>,
        sources: &BTreeMap<String, String>,
    ) -> Self {
        for row in &mut self.rows {
            row.expected_return = views.get(&row.asset).copied();
            row.source = sources.get(&row.asset).cloned();
        }
        self
    }

    /// Record an asset excluded from the allocation.
    pub fn with_dropped(mut self, asset: impl Into<String>, reason: impl Into<String>) -> Self {
        self.dropped.push(DroppedAsset {
            asset: asset.into(),
            reason: reason.into(),
        });
        self
    }

    /// Sum of the weights.
    pub fn total_weight(&self) -> f64 {
        self.rows.iter().map(|row| row.weight).sum()
    }

    /// Fixed-width plain text rendering.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();
        let rule = "=".repeat(80);

        output.push_str(&rule);
        output.push('\n');
        output.push_str(&format!("{:^80}\n", self.title));
        output.push_str(&rule);
        output.push_str("\n\n");

        output.push_str(&format!("Method:          {}\n", self.method));
        output.push_str(&format!("Risk-free rate:  {:.2}%\n", self.risk_free_rate * 100.0));
        if let Some(amount) = self.investment_amount {
            output.push_str(&format!("Investment:      ${:.2}\n", amount));
        }
        output.push('\n');

        output.push_str(&format!(
            "{:<12} {:>10} {:>14} {:>10}  {}\n",
            "Asset", "Weight", "Amount", "View", "Source"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');
        for row in &self.rows {
            output.push_str(&format!(
                "{:<12} {:>9.2}% {:>14} {:>10}  {}\n",
                row.asset,
                row.weight * 100.0,
                row.amount.map_or_else(|| "-".to_string(), |a| format!("${:.2}", a)),
                row.expected_return
                    .map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r * 100.0)),
                row.source.as_deref().unwrap_or("-"),
            ));
        }
        output.push('\n');

        output.push_str("PERFORMANCE\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "Expected annual return:  {:.2}%\n",
            self.performance.expected_return * 100.0
        ));
        output.push_str(&format!(
            "Annual volatility:       {:.2}%\n",
            self.performance.volatility * 100.0
        ));
        output.push_str(&format!(
            "Sharpe ratio:            {:.2}\n",
            self.performance.sharpe_ratio
        ));

        if !self.dropped.is_empty() {
            output.push('\n');
            output.push_str("DROPPED\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for dropped in &self.dropped {
                output.push_str(&format!("{:<12} {}\n", dropped.asset, dropped.reason));
            }
        }

        output.push_str(&rule);
        output.push('\n');
        output
    }

    /// Markdown rendering.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("- **Method:** {}\n", self.method));
        output.push_str(&format!(
            "- **Risk-free rate:** {:.2}%\n",
            self.risk_free_rate * 100.0
        ));
        if let Some(amount) = self.investment_amount {
            output.push_str(&format!("- **Investment:** ${:.2}\n", amount));
        }
        output.push('\n');

        output.push_str("## Allocation\n\n");
        output.push_str("| Asset | Weight | Amount | View | Source |\n");
        output.push_str("|-------|-------:|-------:|-----:|--------|\n");
        for row in &self.rows {
            output.push_str(&format!(
                "| {} | {:.2}% | {} | {} | {} |\n",
                row.asset,
                row.weight * 100.0,
                row.amount.map_or_else(|| "-".to_string(), |a| format!("${:.2}", a)),
                row.expected_return
                    .map_or_else(|| "-".to_string(), |r| format!("{:.2}%", r * 100.0)),
                row.source.as_deref().unwrap_or("-"),
            ));
        }
        output.push('\n');

        output.push_str("## Performance\n\n");
        output.push_str(&format!(
            "- **Expected annual return:** {:.2}%\n",
            self.performance.expected_return * 100.0
        ));
        output.push_str(&format!(
            "- **Annual volatility:** {:.2}%\n",
            self.performance.volatility * 100.0
        ));
        output.push_str(&format!(
            "- **Sharpe ratio:** {:.2}\n",
            self.performance.sharpe_ratio
        ));

        if !self.dropped.is_empty() {
            output.push_str("\n## Dropped\n\n");
            for dropped in &self.dropped {
                output.push_str(&format!("- **{}:** {}\n", dropped.asset, dropped.reason));
            }
        }

        output
    }
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii_table())
    }
}
