//! Trade log output port trait.

use std::path::Path;

use crate::domain::error::KlineTraderError;
use crate::domain::trade_log::TradeRecord;

/// Port for persisting a run's executions.
pub trait TradeLogSink {
    fn write_trade_log(
        &self,
        trades: &[TradeRecord],
        output_path: &Path,
    ) -> Result<(), KlineTraderError>;
}
