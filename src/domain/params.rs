//! Simulation-wide parameters and lot sizing.

pub const DEFAULT_CASH: f64 = 20_000.0;
pub const DEFAULT_MIN_QUANTITY: u64 = 100;
pub const DEFAULT_FEE_BUY: f64 = 6.0;
pub const DEFAULT_FEE_SELL: f64 = 5.0;
pub const DEFAULT_STOP_LOSS_RATE: f64 = -0.05;
pub const BOARD_LOT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotSizing {
    Fixed(u64),
    /// Derived from the initial cash and the first simulated open.
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub cash: f64,
    pub lot: LotSizing,
    pub fee_buy: f64,
    pub fee_sell: f64,
    /// Proportional fee on sell proceeds, grid and high/low sells only.
    pub sell_fee_rate: f64,
    /// Non-positive return threshold; zero disables the stop.
    pub stop_loss_rate: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            cash: DEFAULT_CASH,
            lot: LotSizing::Fixed(DEFAULT_MIN_QUANTITY),
            fee_buy: DEFAULT_FEE_BUY,
            fee_sell: DEFAULT_FEE_SELL,
            sell_fee_rate: 0.0,
            stop_loss_rate: DEFAULT_STOP_LOSS_RATE,
        }
    }
}

impl SimulationParams {
    pub fn stop_loss_enabled(&self) -> bool {
        self.stop_loss_rate < 0.0
    }

    /// Lot quantity for a run whose first bar opens at `first_open`.
    pub fn lot_quantity(&self, first_open: f64) -> u64 {
        match self.lot {
            LotSizing::Fixed(q) => q,
            LotSizing::Auto => max_lot_quantity(self.cash, first_open, BOARD_LOT),
        }
    }
}

/// round(cash / open / board_lot) * board_lot - board_lot, floored at zero.
pub fn max_lot_quantity(cash: f64, first_open: f64, board_lot: u64) -> u64 {
    if board_lot == 0 || first_open.is_nan() || first_open <= 0.0 || cash.is_nan() || cash <= 0.0 {
        return 0;
    }
    let lots = (cash / first_open / board_lot as f64).round();
    if !lots.is_finite() || lots < 1.0 {
        return 0;
    }
    (lots as u64).saturating_mul(board_lot).saturating_sub(board_lot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_lot_quantity_leaves_one_lot_of_headroom() {
        // 20000 / 10 / 100 = 20 lots -> 1900 shares
        assert_eq!(max_lot_quantity(20_000.0, 10.0, 100), 1900);
        // 20000 / 13 / 100 = 15.38 -> 15 lots -> 1400
        assert_eq!(max_lot_quantity(20_000.0, 13.0, 100), 1400);
    }

    #[test]
    fn max_lot_quantity_degenerate_inputs() {
        assert_eq!(max_lot_quantity(20_000.0, 0.0, 100), 0);
        assert_eq!(max_lot_quantity(0.0, 10.0, 100), 0);
        assert_eq!(max_lot_quantity(100.0, 10.0, 100), 0);
        assert_eq!(max_lot_quantity(20_000.0, f64::NAN, 100), 0);
    }

    #[test]
    fn lot_quantity_respects_sizing() {
        let fixed = SimulationParams::default();
        assert_eq!(fixed.lot_quantity(10.0), 100);

        let auto = SimulationParams {
            lot: LotSizing::Auto,
            ..Default::default()
        };
        assert_eq!(auto.lot_quantity(10.0), 1900);
    }

    #[test]
    fn zero_rate_disables_stop_loss() {
        let params = SimulationParams {
            stop_loss_rate: 0.0,
            ..Default::default()
        };
        assert!(!params.stop_loss_enabled());
        assert!(SimulationParams::default().stop_loss_enabled());
    }
}
