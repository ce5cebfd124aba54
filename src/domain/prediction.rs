//! Predicted trading band from the open price and a range estimate.

use super::volatility::RangeEstimate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub low: f64,
    pub high: f64,
}

/// low = open * (1 - down * buffer), high = open * (1 + up * buffer)
pub fn predict_band(open: f64, estimate: RangeEstimate, buffer: f64) -> PriceBand {
    PriceBand {
        low: open * (1.0 - estimate.down * buffer),
        high: open * (1.0 + estimate.up * buffer),
    }
}
