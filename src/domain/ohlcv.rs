//! Daily OHLC bar representation.

use chrono::NaiveDate;

use super::error::KlineTraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Checks positivity and that open/close lie within [low, high].
    pub fn validate(&self) -> Result<(), KlineTraderError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(self.invalid("prices must be finite and positive"));
        }
        if self.low > self.high {
            return Err(self.invalid("low is above high"));
        }
        if self.low > self.open.min(self.close) {
            return Err(self.invalid("low is above open or close"));
        }
        if self.high < self.open.max(self.close) {
            return Err(self.invalid("high is below open or close"));
        }
        Ok(())
    }

    /// (high - open) / open
    pub fn up_range(&self) -> f64 {
        if self.open > 0.0 {
            (self.high - self.open) / self.open
        } else {
            0.0
        }
    }

    /// (open - low) / open
    pub fn down_range(&self) -> f64 {
        if self.open > 0.0 {
            (self.open - self.low) / self.open
        } else {
            0.0
        }
    }

    /// True when `price` lies inside the day's traded range. Grid levels carry
    /// float noise, so the bounds are widened by 1e-9.
    pub fn spans(&self, price: f64) -> bool {
        const TOLERANCE: f64 = 1e-9;
        self.low - TOLERANCE <= price && price <= self.high + TOLERANCE
    }

    fn invalid(&self, reason: &str) -> KlineTraderError {
        KlineTraderError::InvalidBar {
            date: self.date,
            reason: reason.to_string(),
        }
    }
}
