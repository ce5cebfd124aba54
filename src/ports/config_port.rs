//! Configuration access port trait.

use crate::domain::error::KlineTraderError;

/// Typed access to `[section] key = value` settings.
///
/// Numeric getters return `Ok(None)` for a missing key and `ConfigInvalid`
/// for a value that does not parse.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, KlineTraderError>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, KlineTraderError>;
}
