//! High/low cost averaging: buy just above the day's low, sell just under
//! the day's high.

use super::{OrderSet, PRICE_EPSILON, SellOrder, SellScope};
use crate::domain::ohlcv::Bar;
use crate::domain::position::PositionBook;

const TICK: f64 = 0.1;

/// round(low + 0.1) to one decimal.
pub fn buy_price(low: f64) -> f64 {
    ((low + TICK) * 10.0).round() / 10.0
}

/// floor(high * 10) / 10
pub fn sell_price(high: f64) -> f64 {
    (high * 10.0 + PRICE_EPSILON).floor() / 10.0
}

pub fn generate(positions: &PositionBook, bar: &Bar) -> OrderSet {
    let buy = buy_price(bar.low);
    let below_all = positions
        .lowest_entry()
        .is_none_or(|lowest| buy < lowest - PRICE_EPSILON);
    let buy = (buy <= bar.high + PRICE_EPSILON && below_all).then_some(buy);

    let sell = sell_price(bar.high);
    let has_profitable = positions
        .iter()
        .any(|(_, p)| p.is_eligible_on(bar.date) && p.price < sell - PRICE_EPSILON);
    let sell = has_profitable.then_some(SellOrder {
        price: sell,
        scope: SellScope::Profitable,
    });

    OrderSet { buy, sell }
}
