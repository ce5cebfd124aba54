//! Cash/position ledger and equity tracking.
//!
//! The ledger is mutated only by the order matcher. After every execution the
//! caller is expected to run [`Ledger::check_invariants`]; a negative cash
//! balance or total value aborts the run.

use chrono::NaiveDate;

use super::error::KlineTraderError;
use super::position::{ClosedLot, Position, PositionBook, PositionId};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    pub initial_cash: f64,
    pub positions: PositionBook,
    /// Fixed and proportional fees paid so far.
    pub realized_fees: f64,
    /// Sum of `cost_basis - exit_value` over stop-loss exits.
    pub cumulative_loss: f64,
    /// Last execution price, re-marked to the close at the end of each bar.
    pub mark_price: f64,
    pub gross_bought: f64,
    pub gross_sold: f64,
    pub closed_lots: Vec<ClosedLot>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Final state of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub cash: f64,
    pub positions: Vec<Position>,
    pub realized_fees: f64,
    pub cumulative_loss: f64,
    pub mark_price: f64,
    pub total_value: f64,
    /// Notional of every buy, fees excluded.
    pub gross_bought: f64,
    /// Proceeds of every exit, fees excluded.
    pub gross_sold: f64,
    /// Entry notional of the lots still open.
    pub open_cost_basis: f64,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Ledger {
            cash: initial_cash,
            initial_cash,
            positions: PositionBook::new(),
            realized_fees: 0.0,
            cumulative_loss: 0.0,
            mark_price: 0.0,
            gross_bought: 0.0,
            gross_sold: 0.0,
            closed_lots: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn can_afford(&self, price: f64, quantity: u64, fee: f64) -> bool {
        self.cash >= price * quantity as f64 + fee
    }

    /// Opens one lot: `cash -= price * quantity + fee`.
    pub fn buy(&mut self, price: f64, quantity: u64, fee: f64, date: NaiveDate) -> PositionId {
        let notional = price * quantity as f64;
        self.cash -= notional + fee;
        self.realized_fees += fee;
        self.gross_bought += notional;
        self.mark_price = price;
        self.positions.open(price, quantity, date)
    }

    /// Closes one lot at `price`; fees are charged separately.
    pub fn sell(
        &mut self,
        id: PositionId,
        price: f64,
        date: NaiveDate,
        stopped_out: bool,
    ) -> Option<ClosedLot> {
        let position = self.positions.close(id)?;
        let proceeds = position.market_value(price);
        self.cash += proceeds;
        self.gross_sold += proceeds;
        self.mark_price = price;
        if stopped_out {
            self.cumulative_loss += position.cost_basis() - proceeds;
        }

        let lot = ClosedLot {
            quantity: position.quantity,
            entry_price: position.price,
            exit_price: price,
            entry_date: position.purchase_date,
            exit_date: date,
            stopped_out,
        };
        self.closed_lots.push(lot.clone());
        Some(lot)
    }

    pub fn charge_fee(&mut self, amount: f64) {
        self.cash -= amount;
        self.realized_fees += amount;
    }

    pub fn mark(&mut self, price: f64) {
        self.mark_price = price;
    }

    pub fn position_value(&self) -> f64 {
        self.positions
            .iter()
            .map(|(_, p)| p.market_value(self.mark_price))
            .sum()
    }

    /// cash + sum(quantity * mark price)
    pub fn total_value(&self) -> f64 {
        self.cash + self.position_value()
    }

    pub fn check_invariants(&self, date: NaiveDate) -> Result<(), KlineTraderError> {
        if self.cash < 0.0 {
            return Err(KlineTraderError::NegativeCash {
                date,
                cash: self.cash,
            });
        }
        let total = self.total_value();
        if total < 0.0 {
            return Err(KlineTraderError::NegativeTotalValue { date, total });
        }
        Ok(())
    }

    pub fn record_equity(&mut self, date: NaiveDate) {
        let equity = self.total_value();
        self.equity_curve.push(EquityPoint { date, equity });
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            cash: self.cash,
            positions: self.positions.snapshot(),
            realized_fees: self.realized_fees,
            cumulative_loss: self.cumulative_loss,
            mark_price: self.mark_price,
            total_value: self.total_value(),
            gross_bought: self.gross_bought,
            gross_sold: self.gross_sold,
            open_cost_basis: self.positions.total_cost_basis(),
        }
    }
}
