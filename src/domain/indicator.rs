//! Rolling close-price indicators used by the momentum strategy and the
//! fund investment plans.
//!
//! SMA(n) = mean of the last n closes.
//! Momentum(n) = (C[t] - C[t-n]) / C[t-n]; undefined if C[t-n] == 0.
//! RSI(n) = 100 - 100 / (1 + avg_gain / avg_loss) over the last n changes,
//! using plain means (no Wilder smoothing). Undefined if avg_loss == 0.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct CloseHistory {
    capacity: usize,
    closes: VecDeque<f64>,
}

impl CloseHistory {
    /// Keeps at most `capacity` closes (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        CloseHistory {
            capacity,
            closes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, close: f64) {
        if self.closes.len() == self.capacity {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.back().copied()
    }

    pub fn sma(&self, window: usize) -> Option<f64> {
        if window == 0 || self.closes.len() < window {
            return None;
        }
        let sum: f64 = self.closes.iter().rev().take(window).sum();
        Some(sum / window as f64)
    }

    pub fn momentum(&self, days: usize) -> Option<f64> {
        if days == 0 || self.closes.len() <= days {
            return None;
        }
        let last = self.closes[self.closes.len() - 1];
        let reference = self.closes[self.closes.len() - 1 - days];
        if reference == 0.0 {
            return None;
        }
        let value = (last - reference) / reference;
        value.is_finite().then_some(value)
    }

    /// `None` while fewer than `period + 1` closes are held, and when the
    /// window had no losing day.
    pub fn rsi(&self, period: usize) -> Option<f64> {
        if period == 0 || self.closes.len() <= period {
            return None;
        }
        let start = self.closes.len() - 1 - period;
        let (mut gains, mut losses) = (0.0, 0.0);
        for i in start..self.closes.len() - 1 {
            let change = self.closes[i + 1] - self.closes[i];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change;
            }
        }
        let avg_gain = gains / period as f64;
        let avg_loss = losses / period as f64;
        if avg_loss == 0.0 {
            return None;
        }
        let rsi = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        rsi.is_finite().then_some(rsi)
    }
}
