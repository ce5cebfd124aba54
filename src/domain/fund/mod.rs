//! Fund accumulation strategies run over a daily net-value series.
//!
//! Two families share this module:
//! - [`swing`]: "T" strategies that hold a core position and trade fixed
//!   lots around it on large daily moves.
//! - [`plan`]: investment plans that decide a cash amount to put in each day,
//!   guarded by a portfolio-level stop-loss.
//!
//! Both consume [`NavPoint`]s derived from the close of each bar and report a
//! [`FundOutcome`].

pub mod plan;
pub mod swing;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use super::error::KlineTraderError;
use super::ohlcv::Bar;

pub use plan::{PlanKind, PlanParams};
pub use swing::SwingParams;

/// One day of a fund's net value. `change_pct` is the move from the previous
/// day in percent (`1.5` means +1.5%), zero on the first day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub nav: f64,
    pub change_pct: f64,
}

/// Builds the net-value series from bar closes. Rejects invalid bars and
/// dates that do not strictly increase.
pub fn nav_series(bars: &[Bar]) -> Result<Vec<NavPoint>, KlineTraderError> {
    let mut points: Vec<NavPoint> = Vec::with_capacity(bars.len());
    for bar in bars {
        bar.validate()?;
        let change_pct = match points.last() {
            Some(prev) if bar.date <= prev.date => {
                return Err(KlineTraderError::OutOfOrder {
                    previous: prev.date,
                    date: bar.date,
                });
            }
            Some(prev) => (bar.close / prev.nav - 1.0) * 100.0,
            None => 0.0,
        };
        points.push(NavPoint {
            date: bar.date,
            nav: bar.close,
            change_pct,
        });
    }
    Ok(points)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundAction {
    Buy,
    Sell,
    /// Whole position redeemed by the plan stop-loss.
    Liquidate,
}

impl FundAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundAction::Buy => "buy",
            FundAction::Sell => "sell",
            FundAction::Liquidate => "liquidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundTransaction {
    pub date: NaiveDate,
    pub action: FundAction,
    pub units: f64,
    pub price: f64,
    /// Cash moved by the transaction, fees excluded.
    pub amount: f64,
}

/// Final state of a fund run.
///
/// `total_cost` is the cash committed to the position still held, net of sale
/// proceeds, plus fees and any stop-loss losses. `average_cost` therefore
/// carries past losses into the remaining units.
#[derive(Debug, Clone, PartialEq)]
pub struct FundOutcome {
    pub kind: FundKind,
    pub total_cost: f64,
    pub units: f64,
    pub first_nav: f64,
    pub last_nav: f64,
    pub fees: f64,
    pub loss: f64,
    pub transactions: Vec<FundTransaction>,
}

impl FundOutcome {
    pub(crate) fn empty(kind: FundKind) -> Self {
        FundOutcome {
            kind,
            total_cost: 0.0,
            units: 0.0,
            first_nav: 0.0,
            last_nav: 0.0,
            fees: 0.0,
            loss: 0.0,
            transactions: Vec::new(),
        }
    }

    pub fn average_cost(&self) -> Option<f64> {
        (self.units > 0.0).then(|| self.total_cost / self.units)
    }

    pub fn market_value(&self) -> f64 {
        self.units * self.last_nav
    }

    pub fn profit(&self) -> f64 {
        self.market_value() - self.total_cost
    }

    /// Profit as a percentage of `total_cost`; zero when nothing was invested.
    pub fn profit_rate(&self) -> f64 {
        if self.total_cost > 0.0 {
            self.profit() / self.total_cost * 100.0
        } else {
            0.0
        }
    }

    /// Percentage change of the net value over the run.
    pub fn hold_return(&self) -> f64 {
        if self.first_nav > 0.0 {
            (self.last_nav / self.first_nav - 1.0) * 100.0
        } else {
            0.0
        }
    }

    pub fn count(&self, action: FundAction) -> usize {
        self.transactions.iter().filter(|t| t.action == action).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundKind {
    Swing,
    DynamicSwing,
    Plan(PlanKind),
}

impl fmt::Display for FundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundKind::Swing => f.write_str("t"),
            FundKind::DynamicSwing => f.write_str("dynamic_t"),
            FundKind::Plan(plan) => write!(f, "{plan}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown fund strategy '{0}' (expected t, dynamic_t, fixed_drop, dynamic_drop, periodic, ma, value_averaging, rsi or enhanced_rsi)"
)]
pub struct UnknownFundKind(pub String);

impl FromStr for FundKind {
    type Err = UnknownFundKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase().replace('-', "_");
        match name.as_str() {
            "t" => Ok(FundKind::Swing),
            "dynamic_t" => Ok(FundKind::DynamicSwing),
            other => other
                .parse::<PlanKind>()
                .map(FundKind::Plan)
                .map_err(|_| UnknownFundKind(other.to_string())),
        }
    }
}

/// A fund strategy together with every tunable it may read.
#[derive(Debug, Clone, PartialEq)]
pub struct FundConfig {
    pub kind: FundKind,
    pub swing: SwingParams,
    pub plan: PlanParams,
}

/// Runs the configured strategy over `points`.
pub fn run_fund(config: &FundConfig, points: &[NavPoint]) -> Result<FundOutcome, KlineTraderError> {
    if points.is_empty() {
        return Err(KlineTraderError::Data {
            reason: "fund run needs at least one net value".to_string(),
        });
    }
    let outcome = match config.kind {
        FundKind::Swing => swing::run_t(&config.swing, points),
        FundKind::DynamicSwing => swing::run_dynamic_t(&config.swing, points),
        FundKind::Plan(kind) => plan::calculate_investment(kind, &config.plan, points),
    };
    Ok(outcome)
}

/// Rounds a cash amount to cents, half away from zero.
pub(crate) fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
