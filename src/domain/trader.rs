//! Per-bar trading loop.
//!
//! For every bar, in date order:
//! 1. Validate the bar and its ordering.
//! 2. Generate orders from the strategy's view of completed history.
//! 3. Match them against the bar (stop-loss, sells, buys).
//! 4. Mark the ledger to the close and record an equity point.
//! 5. Fold the bar into the market state for the next bar.

use chrono::NaiveDate;
use tracing::{debug, info};

use super::error::KlineTraderError;
use super::execution::{OrderMatcher, SkippedBuy};
use super::ledger::{EquityPoint, Ledger, LedgerSnapshot};
use super::ohlcv::Bar;
use super::params::SimulationParams;
use super::position::ClosedLot;
use super::strategy::{MarketState, OrderSet, Strategy, StrategyKind};
use super::trade_log::{TradeLog, TradeRecord};

/// Everything a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub strategy: StrategyKind,
    pub snapshot: LedgerSnapshot,
    pub trades: TradeLog,
    pub skipped_buys: Vec<SkippedBuy>,
    pub equity_curve: Vec<EquityPoint>,
    pub closed_lots: Vec<ClosedLot>,
    pub initial_cash: f64,
    pub lot_quantity: u64,
    pub first_open: Option<f64>,
    pub last_close: Option<f64>,
    pub bars: usize,
}

#[derive(Debug, Clone)]
pub struct Trader {
    strategy: Strategy,
    params: SimulationParams,
    market: MarketState,
    ledger: Ledger,
    matcher: Option<OrderMatcher>,
    trades: TradeLog,
    skipped_buys: Vec<SkippedBuy>,
    last_date: Option<NaiveDate>,
    first_open: Option<f64>,
    last_close: Option<f64>,
    bars: usize,
}

impl Trader {
    pub fn new(strategy: Strategy, params: SimulationParams) -> Self {
        let market = MarketState::new(&strategy);
        let ledger = Ledger::new(params.cash);
        Trader {
            strategy,
            params,
            market,
            ledger,
            matcher: None,
            trades: TradeLog::new(),
            skipped_buys: Vec::new(),
            last_date: None,
            first_open: None,
            last_close: None,
            bars: 0,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn trades(&self) -> &TradeLog {
        &self.trades
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    /// Processes one bar and returns the executions it produced. An invalid
    /// bar is rejected before any state changes; any error ends the run.
    pub fn step(&mut self, bar: &Bar) -> Result<&[TradeRecord], KlineTraderError> {
        bar.validate()?;
        if let Some(previous) = self.last_date {
            if bar.date <= previous {
                return Err(KlineTraderError::OutOfOrder {
                    previous,
                    date: bar.date,
                });
            }
        }

        let matcher = self.matcher.get_or_insert_with(|| {
            OrderMatcher::new(
                self.params.clone(),
                self.params.lot_quantity(bar.open),
                self.strategy.stop_basis(),
                self.strategy.applies_exit_fee_rate(),
            )
        });
        self.first_open.get_or_insert(bar.open);

        self.market.begin_bar(bar);
        let orders = self
            .strategy
            .generate_orders(&self.market, &self.ledger.positions, bar);
        debug!(date = %bar.date, buy = ?orders.buy, sell = ?orders.sell.map(|s| s.price), "orders");

        let outcome = matcher.execute(&mut self.ledger, bar, &orders)?;

        self.ledger.mark(bar.close);
        self.ledger.check_invariants(bar.date)?;
        self.ledger.record_equity(bar.date);

        self.market.end_bar(bar);
        self.last_date = Some(bar.date);
        self.last_close = Some(bar.close);
        self.bars += 1;

        if let Some(skipped) = outcome.skipped_buy {
            self.skipped_buys.push(skipped);
        }
        let start = self.trades.len();
        self.trades.extend(outcome.records);
        Ok(&self.trades.records()[start..])
    }

    /// Orders the strategy would place if the next bar opened at `open`.
    pub fn preview(&self, open: f64) -> Option<OrderSet> {
        self.strategy
            .preview(&self.market, &self.ledger.positions, open)
    }

    pub fn finish(self) -> RunResult {
        let lot_quantity = self
            .matcher
            .as_ref()
            .map_or(0, |m| m.quantity());
        RunResult {
            strategy: self.strategy.kind(),
            snapshot: self.ledger.snapshot(),
            trades: self.trades,
            skipped_buys: self.skipped_buys,
            equity_curve: self.ledger.equity_curve,
            closed_lots: self.ledger.closed_lots,
            initial_cash: self.ledger.initial_cash,
            lot_quantity,
            first_open: self.first_open,
            last_close: self.last_close,
            bars: self.bars,
        }
    }
}

/// Trailing `last_n_days` bars, or all of them.
pub fn window(bars: &[Bar], last_n_days: Option<usize>) -> &[Bar] {
    match last_n_days {
        Some(n) if n < bars.len() => &bars[bars.len() - n..],
        _ => bars,
    }
}

/// Runs a fresh trader over `bars`. Stops at the first invalid bar or
/// ledger invariant violation.
pub fn run(
    strategy: Strategy,
    params: SimulationParams,
    bars: &[Bar],
) -> Result<RunResult, KlineTraderError> {
    let kind = strategy.kind();
    info!(strategy = %kind, bars = bars.len(), cash = params.cash, "run started");

    let mut trader = Trader::new(strategy, params);
    for bar in bars {
        trader.step(bar)?;
    }
    let result = trader.finish();

    info!(
        strategy = %kind,
        trades = result.trades.len(),
        total_value = result.snapshot.total_value,
        "run finished"
    );
    Ok(result)
}
