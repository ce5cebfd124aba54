//! Moving-average crossover with a momentum filter.
//!
//! Holds at most one position at a time. Orders are priced at the close of
//! the bar whose close completes the signal.

use super::{OrderSet, SellOrder, SellScope};
use crate::domain::indicator::CloseHistory;
use crate::domain::ohlcv::Bar;
use crate::domain::position::PositionBook;

pub const DEFAULT_SHORT_WINDOW: usize = 5;
pub const DEFAULT_LONG_WINDOW: usize = 10;
pub const DEFAULT_MOMENTUM_DAYS: usize = 3;
pub const DEFAULT_BUY_THRESHOLD: f64 = 0.02;
pub const DEFAULT_SELL_THRESHOLD: f64 = -0.015;

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumParams {
    pub short_window: usize,
    pub long_window: usize,
    pub momentum_days: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        MomentumParams {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            momentum_days: DEFAULT_MOMENTUM_DAYS,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            sell_threshold: DEFAULT_SELL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumSignal {
    pub short_ma: f64,
    pub long_ma: f64,
    pub momentum: f64,
}

/// Indicators over `closes`, which must already include today's close.
pub fn signal(params: &MomentumParams, closes: &CloseHistory) -> Option<MomentumSignal> {
    if closes.len() < params.long_window {
        return None;
    }
    Some(MomentumSignal {
        short_ma: closes.sma(params.short_window)?,
        long_ma: closes.sma(params.long_window)?,
        momentum: closes.momentum(params.momentum_days)?,
    })
}

pub fn generate(
    params: &MomentumParams,
    closes: &CloseHistory,
    positions: &PositionBook,
    bar: &Bar,
) -> OrderSet {
    let Some(sig) = signal(params, closes) else {
        return OrderSet::none();
    };

    if positions.is_empty() {
        let buy = sig.short_ma > sig.long_ma && sig.momentum >= params.buy_threshold;
        return OrderSet {
            buy: buy.then_some(bar.close),
            sell: None,
        };
    }

    let eligible = positions.iter().any(|(_, p)| p.is_eligible_on(bar.date));
    let exit = sig.short_ma < sig.long_ma || sig.momentum <= params.sell_threshold;
    OrderSet {
        buy: None,
        sell: (eligible && exit).then_some(SellOrder {
            price: bar.close,
            scope: SellScope::All,
        }),
    }
}
