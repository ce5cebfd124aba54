//! Run reports and batch summaries.

use std::cmp::Ordering;

use super::ledger::EquityPoint;
use super::position::{ClosedLot, Position};
use super::strategy::StrategyKind;
use super::trade_log::TradeAction;
use super::trader::RunResult;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub code: String,
    pub strategy: StrategyKind,
    pub start_price: f64,
    pub end_price: f64,
    pub initial_cash: f64,
    pub final_value: f64,
    /// Percent: (final / initial - 1) * 100.
    pub return_rate: f64,
    /// Percent: (end / start - 1) * 100.
    pub buy_and_hold_return: f64,
    /// Fraction of the running equity peak.
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub buys: usize,
    pub sells: usize,
    pub stop_losses: usize,
    pub win_rate: f64,
    pub skipped_buys: usize,
    pub total_fees: f64,
    pub cumulative_loss: f64,
    pub cash: f64,
    pub open_positions: Vec<Position>,
    pub bars: usize,
}

impl RunReport {
    pub fn from_run(code: &str, run: &RunResult) -> Self {
        let start_price = run.first_open.unwrap_or(0.0);
        let end_price = run.last_close.unwrap_or(start_price);
        let final_value = run.snapshot.total_value;
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&run.equity_curve);

        RunReport {
            code: code.to_string(),
            strategy: run.strategy,
            start_price,
            end_price,
            initial_cash: run.initial_cash,
            final_value,
            return_rate: percent_change(run.initial_cash, final_value),
            buy_and_hold_return: percent_change(start_price, end_price),
            max_drawdown,
            max_drawdown_duration,
            buys: run.trades.count(TradeAction::Buy),
            sells: run.trades.count(TradeAction::Sell),
            stop_losses: run.trades.count(TradeAction::StopLoss),
            win_rate: win_rate(&run.closed_lots),
            skipped_buys: run.skipped_buys.len(),
            total_fees: run.snapshot.realized_fees,
            cumulative_loss: run.snapshot.cumulative_loss,
            cash: run.snapshot.cash,
            open_positions: run.snapshot.positions.clone(),
            bars: run.bars,
        }
    }
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to / from - 1.0) * 100.0
    } else {
        0.0
    }
}

/// Share of closed lots with a positive price PnL.
fn win_rate(lots: &[ClosedLot]) -> f64 {
    if lots.is_empty() {
        return 0.0;
    }
    let won = lots.iter().filter(|l| l.gross_pnl() > 0.0).count();
    won as f64 / lots.len() as f64
}

/// (max drawdown fraction, longest run of bars below the peak)
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

/// Reports sorted by return rate, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub reports: Vec<RunReport>,
    pub average_return: f64,
}

impl BatchSummary {
    pub fn new(mut reports: Vec<RunReport>) -> Self {
        reports.sort_by(|a, b| {
            b.return_rate
                .partial_cmp(&a.return_rate)
                .unwrap_or(Ordering::Equal)
        });
        let average_return = if reports.is_empty() {
            0.0
        } else {
            reports.iter().map(|r| r.return_rate).sum::<f64>() / reports.len() as f64
        };
        BatchSummary {
            reports,
            average_return,
        }
    }

    pub fn best(&self) -> Option<&RunReport> {
        self.reports.first()
    }

    pub fn worst(&self) -> Option<&RunReport> {
        self.reports.last()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
