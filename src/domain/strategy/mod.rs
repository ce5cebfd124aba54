//! Order-generating strategies.
//!
//! Every strategy proposes at most one buy target and one sell target per
//! bar through [`Strategy::generate_orders`]. Whether those orders execute is
//! decided afterwards by the matcher.

pub mod grid;
pub mod highlow;
pub mod momentum;

use std::fmt;
use std::str::FromStr;

use super::indicator::CloseHistory;
use super::ohlcv::Bar;
use super::position::PositionBook;
use super::prediction::predict_band;
use super::volatility::{RangeEstimate, VolatilityParams, VolatilityState};

pub use grid::GridParams;
pub use momentum::MomentumParams;

/// Tolerance for comparing prices against grid levels.
pub const PRICE_EPSILON: f64 = 1e-9;

/// Which open lots a sell order liquidates once its price is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellScope {
    /// Only lots whose entry price is strictly below the sell price.
    Profitable,
    /// Every eligible lot.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellOrder {
    pub price: f64,
    pub scope: SellScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderSet {
    pub buy: Option<f64>,
    pub sell: Option<SellOrder>,
}

impl OrderSet {
    pub fn none() -> Self {
        OrderSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_none() && self.sell.is_none()
    }
}

/// Which price a stop-loss is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBasis {
    /// Triggered when the day's low touches the stop level.
    Intraday,
    /// Triggered on the closing price.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Grid,
    EnhancedGrid,
    Momentum,
    HighLow,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Grid => "grid",
            StrategyKind::EnhancedGrid => "egrid",
            StrategyKind::Momentum => "momentum",
            StrategyKind::HighLow => "highlow",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy '{0}' (expected grid, egrid, momentum or highlow)")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(StrategyKind::Grid),
            "egrid" | "enhanced_grid" | "enhanced-grid" => Ok(StrategyKind::EnhancedGrid),
            "momentum" => Ok(StrategyKind::Momentum),
            "highlow" | "high_low" | "high-low" => Ok(StrategyKind::HighLow),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Grid with a fixed predicted band (cold-start range, never adapts).
    Grid(GridParams),
    /// Grid whose band follows the decayed range estimate.
    EnhancedGrid(GridParams),
    Momentum(MomentumParams),
    HighLow,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Grid(_) => StrategyKind::Grid,
            Strategy::EnhancedGrid(_) => StrategyKind::EnhancedGrid,
            Strategy::Momentum(_) => StrategyKind::Momentum,
            Strategy::HighLow => StrategyKind::HighLow,
        }
    }

    pub fn stop_basis(&self) -> StopBasis {
        match self {
            Strategy::Momentum(_) => StopBasis::Close,
            _ => StopBasis::Intraday,
        }
    }

    /// Whether the proportional exit fee applies to this strategy's sells.
    pub fn applies_exit_fee_rate(&self) -> bool {
        !matches!(self, Strategy::Momentum(_))
    }

    pub fn volatility_params(&self) -> VolatilityParams {
        match self {
            Strategy::Grid(p) | Strategy::EnhancedGrid(p) => p.volatility.clone(),
            _ => VolatilityParams::default(),
        }
    }

    fn history_capacity(&self) -> usize {
        match self {
            Strategy::Momentum(p) => p.long_window.max(p.momentum_days + 1),
            _ => 1,
        }
    }

    pub fn generate_orders(&self, market: &MarketState, positions: &PositionBook, bar: &Bar) -> OrderSet {
        match self {
            Strategy::Grid(_) | Strategy::EnhancedGrid(_) => self
                .grid_orders(market, positions, bar.open)
                .unwrap_or_default(),
            Strategy::Momentum(p) => momentum::generate(p, &market.closes, positions, bar),
            Strategy::HighLow => highlow::generate(positions, bar),
        }
    }

    /// Targets a grid strategy would place for a hypothetical open, without
    /// executing. Strategies that need the full bar return `None`.
    pub fn preview(&self, market: &MarketState, positions: &PositionBook, open: f64) -> Option<OrderSet> {
        self.grid_orders(market, positions, open)
    }

    fn grid_orders(&self, market: &MarketState, positions: &PositionBook, open: f64) -> Option<OrderSet> {
        let (params, estimate) = match self {
            Strategy::Grid(p) => (p, RangeEstimate::uniform(p.volatility.default_range)),
            Strategy::EnhancedGrid(p) => (p, market.volatility.estimate()),
            _ => return None,
        };
        let band = predict_band(open, estimate, params.volatility.multiplier);
        Some(grid::generate(params, band, open, market.prev_close, positions))
    }
}

/// Per-run market memory shared by the strategies.
///
/// `closes` includes the bar being traded once [`MarketState::begin_bar`] has
/// run; the volatility window and `prev_close` only ever hold completed bars.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub prev_close: Option<f64>,
    pub volatility: VolatilityState,
    pub closes: CloseHistory,
}

impl MarketState {
    pub fn new(strategy: &Strategy) -> Self {
        MarketState {
            prev_close: None,
            volatility: VolatilityState::new(strategy.volatility_params()),
            closes: CloseHistory::new(strategy.history_capacity()),
        }
    }

    pub fn begin_bar(&mut self, bar: &Bar) {
        self.closes.push(bar.close);
    }

    pub fn end_bar(&mut self, bar: &Bar) {
        self.volatility.push(bar);
        self.prev_close = Some(bar.close);
    }
}
