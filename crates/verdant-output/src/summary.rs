//! Terminal and markdown summaries.
//!
//! Each summary renders an ASCII table for the terminal via
//! `to_ascii_table` and a markdown section via `to_markdown`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use verdant_backtest::{BacktestOutcome, PerformanceMetrics};
use verdant_data::WeightVector;
use verdant_optimize::{AllocationArtifacts, AssetSharpe, FrontierPoint, OptimizationResult};

const RULE_WIDTH: usize = 64;

fn rule(output: &mut String, ch: &str) {
    output.push_str(&ch.repeat(RULE_WIDTH));
    output.push('\n');
}

fn fmt_esg(target: f64) -> String {
    if target.is_nan() {
        "-".to_string()
    } else {
        format!("{target:.3}")
    }
}

/// A named optimized portfolio shown beside the frontier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLine {
    /// Display label, e.g. "ESG target" or "Tangency".
    pub label: String,

    /// Requested ESG target; NaN when unconstrained.
    pub target_esg: f64,

    /// Annualized Sharpe ratio.
    pub sharpe: f64,

    /// Whether the ESG equality was actually imposed.
    pub esg_constrained: bool,

    /// Holdings in asset order.
    pub weights: Vec<(String, f64)>,
}

impl PortfolioLine {
    /// Build from an optimizer result.
    pub fn new(label: impl Into<String>, result: &OptimizationResult) -> Self {
        Self {
            label: label.into(),
            target_esg: result.target_esg,
            sharpe: result.sharpe,
            esg_constrained: result.esg_constrained,
            weights: holdings(&result.weights),
        }
    }
}

fn holdings(weights: &WeightVector) -> Vec<(String, f64)> {
    weights.iter().map(|(a, w)| (a.to_string(), w)).collect()
}

/// Frontier, reference portfolios and per-asset Sharpe ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontierSummary {
    /// Frontier points in increasing target ESG.
    pub points: Vec<FrontierPoint>,

    /// Optimized portfolios to compare.
    pub portfolios: Vec<PortfolioLine>,

    /// Stand-alone asset Sharpe ratios.
    pub asset_sharpes: Vec<AssetSharpe>,
}

impl FrontierSummary {
    /// Summary of a frontier.
    pub const fn new(points: Vec<FrontierPoint>) -> Self {
        Self {
            points,
            portfolios: Vec::new(),
            asset_sharpes: Vec::new(),
        }
    }

    /// Add a portfolio line.
    #[must_use]
    pub fn with_portfolio(mut self, label: impl Into<String>, result: &OptimizationResult) -> Self {
        self.portfolios.push(PortfolioLine::new(label, result));
        self
    }

    /// Attach per-asset Sharpe ratios.
    #[must_use]
    pub fn with_asset_sharpes(mut self, sharpes: Vec<AssetSharpe>) -> Self {
        self.asset_sharpes = sharpes;
        self
    }

    /// Frontier point with the highest Sharpe ratio.
    pub fn best_point(&self) -> Option<&FrontierPoint> {
        self.points
            .iter()
            .max_by(|a, b| a.sharpe.total_cmp(&b.sharpe))
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nESG / Sharpe Frontier\n");
        rule(&mut output, "=");

        if self.points.is_empty() {
            output.push_str("  (no frontier: ESG scores are degenerate or no target was feasible)\n");
        } else {
            output.push_str(&format!("{:>12} {:>12}\n", "Target ESG", "Sharpe"));
            rule(&mut output, "-");
            for p in &self.points {
                output.push_str(&format!("{:>12.3} {:>12.4}\n", p.target_esg, p.sharpe));
            }
            if let Some(best) = self.best_point() {
                output.push_str(&format!(
                    "\n  Best Sharpe {:.4} at ESG {:.3}\n",
                    best.sharpe, best.target_esg
                ));
            }
        }

        for line in &self.portfolios {
            output.push_str(&format!(
                "\n{} (ESG {}, Sharpe {:.4}{})\n",
                line.label,
                fmt_esg(line.target_esg),
                line.sharpe,
                if line.esg_constrained || line.target_esg.is_nan() {
                    ""
                } else {
                    ", ESG constraint dropped"
                }
            ));
            rule(&mut output, "-");
            for (asset, weight) in &line.weights {
                output.push_str(&format!("  {:<12} {:>8.2}%\n", asset, weight * 100.0));
            }
        }

        if !self.asset_sharpes.is_empty() {
            output.push_str("\nAsset Sharpe Ratios\n");
            rule(&mut output, "-");
            for s in &self.asset_sharpes {
                output.push_str(&format!("  {:<12} {:>8.4}\n", s.asset_id, s.sharpe));
            }
        }

        rule(&mut output, "=");
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::from("# ESG / Sharpe Frontier\n\n");

        if self.points.is_empty() {
            output.push_str("_No frontier points._\n\n");
        } else {
            output.push_str("| Target ESG | Sharpe |\n|-----------:|-------:|\n");
            for p in &self.points {
                output.push_str(&format!("| {:.3} | {:.4} |\n", p.target_esg, p.sharpe));
            }
            output.push('\n');
        }

        for line in &self.portfolios {
            output.push_str(&format!(
                "## {}\n\n- **Target ESG:** {}\n- **Sharpe:** {:.4}\n\n",
                line.label,
                fmt_esg(line.target_esg),
                line.sharpe
            ));
            output.push_str("| Asset | Weight |\n|-------|-------:|\n");
            for (asset, weight) in &line.weights {
                output.push_str(&format!("| {} | {:.2}% |\n", asset, weight * 100.0));
            }
            output.push('\n');
        }

        if !self.asset_sharpes.is_empty() {
            output.push_str("## Asset Sharpe Ratios\n\n| Asset | Sharpe |\n|-------|-------:|\n");
            for s in &self.asset_sharpes {
                output.push_str(&format!("| {} | {:.4} |\n", s.asset_id, s.sharpe));
            }
        }

        output
    }
}

/// Mean-variance allocation for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    /// Allocation date.
    pub date: NaiveDate,

    /// Daily expected return of the weights.
    pub expected_return: f64,

    /// Daily volatility of the weights.
    pub volatility: f64,

    /// Holdings, largest first.
    pub holdings: Vec<(String, f64)>,
}

impl AllocationSummary {
    /// Summarize allocator output.
    pub fn new(artifacts: &AllocationArtifacts) -> Self {
        let mut holdings = holdings(&artifacts.snapshot.weights);
        holdings.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self {
            date: artifacts.snapshot.date,
            expected_return: artifacts.stats.expected_return,
            volatility: artifacts.stats.volatility,
            holdings,
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = format!("\nAllocation as of {}\n", self.date);
        rule(&mut output, "=");
        output.push_str(&format!(
            "  Expected return (daily):  {:.4}%\n  Volatility (daily):       {:.4}%\n",
            self.expected_return * 100.0,
            self.volatility * 100.0
        ));
        rule(&mut output, "-");
        for (asset, weight) in self.holdings.iter().filter(|(_, w)| *w > 0.0) {
            output.push_str(&format!("  {:<12} {:>8.2}%\n", asset, weight * 100.0));
        }
        rule(&mut output, "=");
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = format!(
            "# Allocation as of {}\n\n- **Expected return (daily):** {:.4}%\n- **Volatility (daily):** {:.4}%\n\n",
            self.date,
            self.expected_return * 100.0,
            self.volatility * 100.0
        );
        output.push_str("| Asset | Weight |\n|-------|-------:|\n");
        for (asset, weight) in &self.holdings {
            output.push_str(&format!("| {} | {:.2}% |\n", asset, weight * 100.0));
        }
        output
    }
}

/// Backtest performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Portfolio name.
    pub name: String,

    /// Headline metrics; `None` when no date was evaluated.
    pub metrics: Option<PerformanceMetrics>,

    /// Days on which the weight/return join narrowed the portfolio.
    pub coverage_gaps: usize,
}

impl PerformanceSummary {
    /// Summarize a backtest outcome.
    pub fn new(name: impl Into<String>, outcome: &BacktestOutcome) -> Self {
        Self {
            name: name.into(),
            metrics: PerformanceMetrics::from_records(&outcome.records).ok(),
            coverage_gaps: outcome.coverage_gaps.len(),
        }
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = format!("\nBacktest: {}\n", self.name);
        rule(&mut output, "=");
        match &self.metrics {
            None => output.push_str("  (no evaluated dates)\n"),
            Some(m) => {
                output.push_str(&format!("Period: {} to {} ({} days)\n", m.start, m.end, m.days));
                rule(&mut output, "-");
                output.push_str(&format!(
                    "  Total Return:             {:.2}%\n",
                    m.total_return * 100.0
                ));
                output.push_str(&format!(
                    "  Annualized Return:        {:.2}%\n",
                    m.annualized_return * 100.0
                ));
                output.push_str(&format!(
                    "  Annualized Volatility:    {:.2}%\n",
                    m.annualized_volatility * 100.0
                ));
                output.push_str(&format!("  Sharpe Ratio:             {:.3}\n", m.sharpe));
                output.push_str(&format!(
                    "  Max Drawdown:             {:.2}%\n",
                    m.max_drawdown * 100.0
                ));
            }
        }
        if self.coverage_gaps > 0 {
            output.push_str(&format!(
                "  Coverage gaps:            {} day(s)\n",
                self.coverage_gaps
            ));
        }
        rule(&mut output, "=");
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = format!("# Backtest: {}\n\n", self.name);
        match &self.metrics {
            None => output.push_str("_No evaluated dates._\n"),
            Some(m) => {
                output.push_str(&format!("**Period:** {} to {}\n\n", m.start, m.end));
                output.push_str("| Metric | Value |\n|--------|------:|\n");
                output.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
                output.push_str(&format!(
                    "| Annualized Return | {:.2}% |\n",
                    m.annualized_return * 100.0
                ));
                output.push_str(&format!(
                    "| Annualized Volatility | {:.2}% |\n",
                    m.annualized_volatility * 100.0
                ));
                output.push_str(&format!("| Sharpe Ratio | {:.3} |\n", m.sharpe));
                output.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
            }
        }
        if self.coverage_gaps > 0 {
            output.push_str(&format!("\n{} day(s) with coverage gaps.\n", self.coverage_gaps));
        }
        output
    }
}

impl fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metrics {
            Some(m) => write!(
                f,
                "{}: total {:.2}%, Sharpe {:.3}, max drawdown {:.2}%",
                self.name,
                m.total_return * 100.0,
                m.sharpe,
                m.max_drawdown * 100.0
            ),
            None => write!(f, "{}: no evaluated dates", self.name),
        }
    }
}
