//! Bar data access port trait.

use crate::domain::error::KlineTraderError;
use crate::domain::ohlcv::Bar;

pub trait BarSource {
    /// Daily bars for `code`, oldest first.
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, KlineTraderError>;

    fn list_codes(&self) -> Result<Vec<String>, KlineTraderError>;
}
