//! "T" swing strategies around a core fund holding.
//!
//! The run opens `initial_shares` at the first net value, split into
//! `initial_shares / lot_shares` core lots. Afterwards:
//! - a drop beyond `threshold_rate` percent buys lots,
//! - a rise beyond it sells lots that were bought at least `hold_days`
//!   calendar days earlier below today's value, as long as the holding
//!   stays above `initial_shares`.
//!
//! The plain variant trades one lot per signal and sells the cheapest
//! eligible lot. The dynamic variant trades `round(|change| / threshold)`
//! lots, rounding half away from zero, and sells eligible lots oldest first
//! without dipping under the core lot count.

use chrono::{Days, NaiveDate};
use tracing::debug;

use super::{FundAction, FundKind, FundOutcome, FundTransaction, NavPoint, round_cents};

pub const DEFAULT_INITIAL_SHARES: u64 = 3000;
pub const DEFAULT_LOT_SHARES: u64 = 1000;
pub const DEFAULT_THRESHOLD_RATE: f64 = 1.0;
pub const DEFAULT_HOLD_DAYS: u64 = 7;
pub const DEFAULT_SELL_FEE_RATE: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub struct SwingParams {
    pub initial_shares: u64,
    pub lot_shares: u64,
    /// Daily move, in percent, that triggers a trade.
    pub threshold_rate: f64,
    pub hold_days: u64,
    /// Proportional fee on each sold lot, rounded to cents.
    pub sell_fee_rate: f64,
}

impl Default for SwingParams {
    fn default() -> Self {
        SwingParams {
            initial_shares: DEFAULT_INITIAL_SHARES,
            lot_shares: DEFAULT_LOT_SHARES,
            threshold_rate: DEFAULT_THRESHOLD_RATE,
            hold_days: DEFAULT_HOLD_DAYS,
            sell_fee_rate: DEFAULT_SELL_FEE_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    date: NaiveDate,
    price: f64,
}

struct SwingBook<'a> {
    params: &'a SwingParams,
    holds: Vec<Hold>,
    core_lots: usize,
    shares: u64,
    total_cost: f64,
    fees: f64,
    transactions: Vec<FundTransaction>,
}

impl<'a> SwingBook<'a> {
    fn open(params: &'a SwingParams, first: &NavPoint) -> Self {
        let core_lots = (params.initial_shares / params.lot_shares.max(1)) as usize;
        let hold = Hold {
            date: first.date,
            price: first.nav,
        };
        let amount = first.nav * params.initial_shares as f64;
        SwingBook {
            params,
            holds: vec![hold; core_lots],
            core_lots,
            shares: params.initial_shares,
            total_cost: amount,
            fees: 0.0,
            transactions: vec![FundTransaction {
                date: first.date,
                action: FundAction::Buy,
                units: params.initial_shares as f64,
                price: first.nav,
                amount,
            }],
        }
    }

    fn above_core(&self) -> bool {
        self.shares > self.params.initial_shares
    }

    fn buy(&mut self, point: &NavPoint, lots: usize) {
        let units = self.params.lot_shares * lots as u64;
        let amount = point.nav * units as f64;
        for _ in 0..lots {
            self.holds.push(Hold {
                date: point.date,
                price: point.nav,
            });
        }
        self.shares += units;
        self.total_cost += amount;
        self.transactions.push(FundTransaction {
            date: point.date,
            action: FundAction::Buy,
            units: units as f64,
            price: point.nav,
            amount,
        });
        debug!(date = %point.date, units, price = point.nav, shares = self.shares, "fund buy");
    }

    /// Indexes of lots old enough to sell and bought below today's value,
    /// in purchase order.
    fn eligible(&self, point: &NavPoint) -> Vec<usize> {
        let Some(cutoff) = point.date.checked_sub_days(Days::new(self.params.hold_days)) else {
            return Vec::new();
        };
        self.holds
            .iter()
            .enumerate()
            .filter(|(_, h)| h.date <= cutoff && point.nav > h.price)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sells the lots at `indexes`, one fee per lot.
    fn sell(&mut self, point: &NavPoint, mut indexes: Vec<usize>) {
        if indexes.is_empty() {
            return;
        }
        indexes.sort_unstable();
        for &i in indexes.iter().rev() {
            self.holds.remove(i);
        }
        let lots = indexes.len() as u64;
        let lot_amount = point.nav * self.params.lot_shares as f64;
        let fee = round_cents(lot_amount * self.params.sell_fee_rate);
        let units = self.params.lot_shares * lots;

        self.shares -= units;
        self.total_cost += (fee - lot_amount) * lots as f64;
        self.fees += fee * lots as f64;
        self.transactions.push(FundTransaction {
            date: point.date,
            action: FundAction::Sell,
            units: units as f64,
            price: point.nav,
            amount: lot_amount * lots as f64,
        });
        debug!(date = %point.date, units, price = point.nav, shares = self.shares, fee, "fund sell");
    }

    fn finish(self, kind: FundKind, first: &NavPoint, last: &NavPoint) -> FundOutcome {
        FundOutcome {
            kind,
            total_cost: self.total_cost,
            units: self.shares as f64,
            first_nav: first.nav,
            last_nav: last.nav,
            fees: self.fees,
            loss: 0.0,
            transactions: self.transactions,
        }
    }
}

/// One lot per signal; sells the cheapest eligible lot.
pub fn run_t(params: &SwingParams, points: &[NavPoint]) -> FundOutcome {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return FundOutcome::empty(FundKind::Swing);
    };
    let mut book = SwingBook::open(params, first);

    for point in &points[1..] {
        if point.change_pct < -params.threshold_rate {
            book.buy(point, 1);
        } else if point.change_pct > params.threshold_rate && book.above_core() {
            let cheapest = book
                .eligible(point)
                .into_iter()
                .min_by(|&a, &b| book.holds[a].price.total_cmp(&book.holds[b].price));
            match cheapest {
                Some(i) => book.sell(point, vec![i]),
                None => debug!(date = %point.date, "no lot past its holding period below today's value"),
            }
        }
    }
    book.finish(FundKind::Swing, first, last)
}

/// Lots per signal scale with the size of the move.
pub fn run_dynamic_t(params: &SwingParams, points: &[NavPoint]) -> FundOutcome {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return FundOutcome::empty(FundKind::DynamicSwing);
    };
    let mut book = SwingBook::open(params, first);

    for point in &points[1..] {
        let multiple = move_multiple(point.change_pct, params.threshold_rate);
        if multiple == 0 {
            continue;
        }
        if point.change_pct < 0.0 {
            book.buy(point, multiple);
        } else if point.change_pct > 0.0 && book.above_core() {
            let limit = multiple.min(book.holds.len().saturating_sub(book.core_lots));
            let indexes: Vec<usize> = book.eligible(point).into_iter().take(limit).collect();
            if indexes.is_empty() {
                debug!(date = %point.date, "no lot past its holding period below today's value");
            }
            book.sell(point, indexes);
        }
    }
    book.finish(FundKind::DynamicSwing, first, last)
}

/// `|change| / threshold` rounded half away from zero.
pub fn move_multiple(change_pct: f64, threshold_rate: f64) -> usize {
    if threshold_rate <= 0.0 || !change_pct.is_finite() {
        return 0;
    }
    let multiple = (change_pct.abs() / threshold_rate).round();
    if multiple.is_finite() { multiple as usize } else { 0 }
}
