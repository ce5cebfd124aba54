//! Append-only record of executions.

use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy,
    Sell,
    StopLoss,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::StopLoss => "stop_loss",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution, with the ledger state immediately after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: u64,
    pub cash: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TradeLog {
    records: Vec<TradeRecord>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TradeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, action: TradeAction) -> usize {
        self.records.iter().filter(|r| r.action == action).count()
    }

    pub fn into_records(self) -> Vec<TradeRecord> {
        self.records
    }
}

impl Extend<TradeRecord> for TradeLog {
    fn extend<I: IntoIterator<Item = TradeRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}
