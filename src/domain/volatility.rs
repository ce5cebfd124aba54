//! Decayed up/down range estimator.
//!
//! up_range = (high - open) / open, down_range = (open - low) / open.
//! Sample of age k (0 = most recent) is weighted decay^k, weights normalised
//! to sum to 1. Until the window is full both ranges fall back to
//! `default_range`.

use std::collections::VecDeque;

use super::ohlcv::Bar;

pub const DEFAULT_VOLATILITY_WINDOW: usize = 10;
pub const DEFAULT_VOLATILITY_DECAY: f64 = 0.94;
pub const DEFAULT_VOLATILITY_MULTIPLIER: f64 = 1.1;
pub const DEFAULT_RANGE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityParams {
    pub window: usize,
    pub decay: f64,
    /// Buffer applied by the price predictor to widen the band.
    pub multiplier: f64,
    pub default_range: f64,
}

impl Default for VolatilityParams {
    fn default() -> Self {
        VolatilityParams {
            window: DEFAULT_VOLATILITY_WINDOW,
            decay: DEFAULT_VOLATILITY_DECAY,
            multiplier: DEFAULT_VOLATILITY_MULTIPLIER,
            default_range: DEFAULT_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeEstimate {
    pub down: f64,
    pub up: f64,
}

impl RangeEstimate {
    pub fn uniform(range: f64) -> Self {
        RangeEstimate {
            down: range,
            up: range,
        }
    }
}

/// Up/down range of a completed bar.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RangeSample {
    up: f64,
    down: f64,
}

impl From<&Bar> for RangeSample {
    fn from(bar: &Bar) -> Self {
        RangeSample {
            up: bar.up_range(),
            down: bar.down_range(),
        }
    }
}

/// Trailing window of past bars' ranges.
#[derive(Debug, Clone)]
pub struct VolatilityState {
    params: VolatilityParams,
    samples: VecDeque<RangeSample>,
}

impl VolatilityState {
    pub fn new(params: VolatilityParams) -> Self {
        let capacity = params.window;
        VolatilityState {
            params,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn params(&self) -> &VolatilityParams {
        &self.params
    }

    /// Adds a completed bar; the oldest sample drops out once the window is full.
    pub fn push(&mut self, bar: &Bar) {
        if self.params.window == 0 {
            return;
        }
        if self.samples.len() == self.params.window {
            self.samples.pop_front();
        }
        self.samples.push_back(RangeSample::from(bar));
    }

    pub fn is_warm(&self) -> bool {
        self.params.window > 0 && self.samples.len() >= self.params.window
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn estimate(&self) -> RangeEstimate {
        if !self.is_warm() {
            return RangeEstimate::uniform(self.params.default_range);
        }
        decayed_estimate(self.samples.iter().copied(), self.params.decay)
            .unwrap_or_else(|| RangeEstimate::uniform(self.params.default_range))
    }
}

/// Samples are ordered oldest first. Returns `None` if the weights degenerate.
fn decayed_estimate(
    samples: impl DoubleEndedIterator<Item = RangeSample>,
    decay: f64,
) -> Option<RangeEstimate> {
    let mut weight = 1.0;
    let mut weight_sum = 0.0;
    let mut down = 0.0;
    let mut up = 0.0;

    for sample in samples.rev() {
        down += weight * sample.down;
        up += weight * sample.up;
        weight_sum += weight;
        weight *= decay;
    }

    if weight_sum <= 0.0 || !weight_sum.is_finite() {
        return None;
    }
    let estimate = RangeEstimate {
        down: down / weight_sum,
        up: up / weight_sum,
    };
    if estimate.down.is_finite() && estimate.up.is_finite() {
        Some(estimate)
    } else {
        None
    }
}
