//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for klinetrader.
#[derive(Debug, thiserror::Error)]
pub enum KlineTraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid bar on {date}: {reason}")]
    InvalidBar { date: NaiveDate, reason: String },

    #[error("bar dated {date} does not follow {previous}")]
    OutOfOrder {
        previous: NaiveDate,
        date: NaiveDate,
    },

    /// Fatal ledger invariant: the run cannot continue past this point.
    #[error("ledger cash went negative on {date}: {cash:.4}")]
    NegativeCash { date: NaiveDate, cash: f64 },

    /// Fatal ledger invariant: the run cannot continue past this point.
    #[error("ledger total value went negative on {date}: {total:.4}")]
    NegativeTotalValue { date: NaiveDate, total: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KlineTraderError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        KlineTraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the ledger invariant violations that abort a run.
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(
            self,
            KlineTraderError::NegativeCash { .. } | KlineTraderError::NegativeTotalValue { .. }
        )
    }
}

impl From<&KlineTraderError> for std::process::ExitCode {
    fn from(err: &KlineTraderError) -> Self {
        let code: u8 = match err {
            KlineTraderError::Io(_) => 1,
            KlineTraderError::ConfigParse { .. }
            | KlineTraderError::ConfigMissing { .. }
            | KlineTraderError::ConfigInvalid { .. } => 2,
            KlineTraderError::Data { .. }
            | KlineTraderError::InvalidBar { .. }
            | KlineTraderError::OutOfOrder { .. } => 3,
            KlineTraderError::NoData { .. } => 5,
            KlineTraderError::NegativeCash { .. }
            | KlineTraderError::NegativeTotalValue { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
