//! Order matching against a daily bar.
//!
//! Per bar the matcher runs, in order:
//! 1. Stop-loss over eligible lots. If any lot triggers, every triggered lot
//!    is closed and nothing else executes that bar.
//! 2. The sell target, if `bar.high` reaches it. The fill is at the target
//!    even when the bar gapped above it.
//! 3. The buy target, if it lies within `[bar.low, bar.high]` and is affordable.
//!
//! Lots opened on the bar being matched are never sold on it. The fixed sell
//! fee is charged once per bar with at least one exit. The ledger invariants
//! are checked after every execution.

use chrono::NaiveDate;
use tracing::debug;

use super::error::KlineTraderError;
use super::ledger::Ledger;
use super::ohlcv::Bar;
use super::params::SimulationParams;
use super::position::PositionId;
use super::strategy::{OrderSet, PRICE_EPSILON, SellOrder, SellScope, StopBasis};
use super::trade_log::{TradeAction, TradeRecord};

/// A buy that reached its price but could not be filled.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBuy {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: u64,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuyResult {
    Filled(PositionId),
    OutOfRange,
    InsufficientCash(SkippedBuy),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub records: Vec<TradeRecord>,
    pub stopped_out: bool,
    pub skipped_buy: Option<SkippedBuy>,
}

/// Stop level for an entry: entry * (1 + rate), rate <= 0.
pub fn stop_level(entry: f64, stop_loss_rate: f64) -> f64 {
    entry * (1.0 + stop_loss_rate)
}

/// Fee owed on one exit: the proportional part always, the fixed part only
/// for the first exit of the bar.
fn exit_fee(proceeds: f64, fixed: f64, rate: f64, first: bool) -> f64 {
    let fixed = if first { fixed } else { 0.0 };
    fixed + proceeds * rate
}

#[derive(Debug, Clone)]
pub struct OrderMatcher {
    params: SimulationParams,
    quantity: u64,
    stop_basis: StopBasis,
    exit_fee_rate: f64,
}

impl OrderMatcher {
    pub fn new(
        params: SimulationParams,
        quantity: u64,
        stop_basis: StopBasis,
        applies_exit_fee_rate: bool,
    ) -> Self {
        let exit_fee_rate = if applies_exit_fee_rate {
            params.sell_fee_rate
        } else {
            0.0
        };
        OrderMatcher {
            params,
            quantity,
            stop_basis,
            exit_fee_rate,
        }
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn execute(
        &self,
        ledger: &mut Ledger,
        bar: &Bar,
        orders: &OrderSet,
    ) -> Result<MatchOutcome, KlineTraderError> {
        let mut outcome = MatchOutcome::default();

        let triggered = self.triggered_stops(ledger, bar);
        if !triggered.is_empty() {
            self.close_lots(ledger, bar.date, &triggered, TradeAction::StopLoss, &mut outcome)?;
            outcome.stopped_out = true;
            return Ok(outcome);
        }

        if let Some(sell) = orders.sell {
            let lots = self.sellable_lots(ledger, bar, sell);
            self.close_lots(ledger, bar.date, &lots, TradeAction::Sell, &mut outcome)?;
        }

        if let Some(price) = orders.buy {
            match self.execute_buy(ledger, bar, price)? {
                BuyResult::Filled(_) => {
                    outcome.records.push(record(ledger, bar.date, TradeAction::Buy, price, self.quantity));
                }
                BuyResult::InsufficientCash(skipped) => outcome.skipped_buy = Some(skipped),
                BuyResult::OutOfRange => {}
            }
        }

        Ok(outcome)
    }

    /// Eligible lots whose stop fires on this bar, with their fill prices.
    pub fn triggered_stops(&self, ledger: &Ledger, bar: &Bar) -> Vec<(PositionId, f64)> {
        if !self.params.stop_loss_enabled() {
            return Vec::new();
        }
        let rate = self.params.stop_loss_rate;
        ledger
            .positions
            .iter()
            .filter(|(_, p)| p.is_eligible_on(bar.date))
            .filter_map(|(id, p)| match self.stop_basis {
                StopBasis::Intraday => {
                    let level = stop_level(p.price, rate);
                    (bar.low <= level + PRICE_EPSILON).then_some((id, level.min(bar.open)))
                }
                StopBasis::Close => {
                    (p.return_at(bar.close) <= rate + PRICE_EPSILON).then_some((id, bar.close))
                }
            })
            .collect()
    }

    fn sellable_lots(&self, ledger: &Ledger, bar: &Bar, sell: SellOrder) -> Vec<(PositionId, f64)> {
        if bar.high < sell.price - PRICE_EPSILON {
            return Vec::new();
        }
        ledger
            .positions
            .iter()
            .filter(|(_, p)| p.is_eligible_on(bar.date))
            .filter(|(_, p)| match sell.scope {
                SellScope::All => true,
                SellScope::Profitable => p.price < sell.price - PRICE_EPSILON,
            })
            .map(|(id, _)| (id, sell.price))
            .collect()
    }

    fn close_lots(
        &self,
        ledger: &mut Ledger,
        date: NaiveDate,
        lots: &[(PositionId, f64)],
        action: TradeAction,
        outcome: &mut MatchOutcome,
    ) -> Result<(), KlineTraderError> {
        let stopped_out = action == TradeAction::StopLoss;
        let mut first = true;
        for &(id, price) in lots {
            let Some(lot) = ledger.sell(id, price, date, stopped_out) else {
                continue;
            };
            let proceeds = lot.exit_price * lot.quantity as f64;
            ledger.charge_fee(exit_fee(proceeds, self.params.fee_sell, self.exit_fee_rate, first));
            first = false;
            ledger.check_invariants(date)?;

            debug!(
                %date,
                action = action.as_str(),
                price,
                quantity = lot.quantity,
                entry = lot.entry_price,
                cash = ledger.cash,
                "exit"
            );
            outcome.records.push(record(ledger, date, action, price, lot.quantity));
        }
        Ok(())
    }

    pub fn execute_buy(
        &self,
        ledger: &mut Ledger,
        bar: &Bar,
        price: f64,
    ) -> Result<BuyResult, KlineTraderError> {
        if !bar.spans(price) {
            return Ok(BuyResult::OutOfRange);
        }
        if self.quantity == 0 || !ledger.can_afford(price, self.quantity, self.params.fee_buy) {
            let skipped = SkippedBuy {
                date: bar.date,
                price,
                quantity: self.quantity,
                cash: ledger.cash,
            };
            debug!(date = %bar.date, price, cash = ledger.cash, "buy skipped: insufficient cash");
            return Ok(BuyResult::InsufficientCash(skipped));
        }

        let id = ledger.buy(price, self.quantity, self.params.fee_buy, bar.date);
        ledger.check_invariants(bar.date)?;
        debug!(date = %bar.date, price, quantity = self.quantity, cash = ledger.cash, "buy");
        Ok(BuyResult::Filled(id))
    }
}

fn record(ledger: &Ledger, date: NaiveDate, action: TradeAction, price: f64, quantity: u64) -> TradeRecord {
    TradeRecord {
        date,
        action,
        price,
        quantity,
        cash: ledger.cash,
        total_value: ledger.total_value(),
    }
}
