//! Grid order generation.
//!
//! grid_price(p) = round(p / grid_size) * grid_size
//!
//! Gap up (open > previous close): sell near the predicted high, buy only
//! down at open * 0.99. Otherwise buy near the predicted low and sell only up
//! at open * 1.01.

use super::{OrderSet, PRICE_EPSILON, SellOrder, SellScope};
use crate::domain::position::PositionBook;
use crate::domain::prediction::PriceBand;
use crate::domain::volatility::VolatilityParams;

pub const DEFAULT_GRID_SIZE: f64 = 0.2;
pub const GAP_UP_BUY_FACTOR: f64 = 0.99;
pub const GAP_DOWN_SELL_FACTOR: f64 = 1.01;

#[derive(Debug, Clone, PartialEq)]
pub struct GridParams {
    pub grid_size: f64,
    pub volatility: VolatilityParams,
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams {
            grid_size: DEFAULT_GRID_SIZE,
            volatility: VolatilityParams::default(),
        }
    }
}

/// Nearest grid level, ties rounded away from zero.
pub fn grid_price(price: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 {
        return price;
    }
    (price / grid_size).round() * grid_size
}

/// Highest grid level that does not exceed `bound`.
pub fn level_at_or_below(bound: f64, grid_size: f64) -> f64 {
    let level = grid_price(bound, grid_size);
    if level > bound + PRICE_EPSILON {
        grid_price(level - grid_size, grid_size)
    } else {
        level
    }
}

pub fn generate(
    params: &GridParams,
    band: PriceBand,
    open: f64,
    prev_close: Option<f64>,
    positions: &PositionBook,
) -> OrderSet {
    let gap_up = prev_close.is_some_and(|close| open > close);
    let (sell_bound, buy_bound) = if gap_up {
        (band.high, open * GAP_UP_BUY_FACTOR)
    } else {
        (open * GAP_DOWN_SELL_FACTOR, band.low)
    };

    OrderSet {
        buy: buy_target(buy_bound, params.grid_size, positions),
        sell: sell_target(sell_bound, params.grid_size, positions),
    }
}

fn sell_target(bound: f64, grid_size: f64, positions: &PositionBook) -> Option<SellOrder> {
    let lowest = positions.lowest_entry()?;
    let level = level_at_or_below(bound, grid_size);
    (lowest < level - PRICE_EPSILON).then_some(SellOrder {
        price: level,
        scope: SellScope::Profitable,
    })
}

fn buy_target(bound: f64, grid_size: f64, positions: &PositionBook) -> Option<f64> {
    let target = grid_price(bound, grid_size);
    if target <= PRICE_EPSILON {
        return None;
    }
    match positions.lowest_entry() {
        None => Some(target),
        Some(lowest) if target <= lowest - grid_size + PRICE_EPSILON => Some(target),
        Some(_) => None,
    }
}
