#![allow(dead_code)]

use chrono::NaiveDate;
use klinetrader::domain::config_validation::{DataConfig, RunConfig};
use klinetrader::domain::error::KlineTraderError;
pub use klinetrader::domain::ohlcv::Bar;
use klinetrader::domain::params::SimulationParams;
use klinetrader::domain::strategy::{GridParams, Strategy};
use klinetrader::ports::data_port::BarSource;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct MockBarSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl BarSource for MockBarSource {
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, KlineTraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(KlineTraderError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(code) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(KlineTraderError::NoData {
                code: code.to_string(),
            }),
        }
    }

    fn list_codes(&self) -> Result<Vec<String>, KlineTraderError> {
        let mut codes: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: &str, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open,
        high,
        low,
        close,
    )
}

/// Consecutive daily bars from `(open, high, low, close)` tuples.
pub fn bars_from(start: &str, ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    ohlc.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::new(start + chrono::Duration::days(i as i64), open, high, low, close)
        })
        .collect()
}

/// Bars oscillating around `center` with a 4% daily range.
pub fn generate_bars(start: &str, count: usize, center: f64) -> Vec<Bar> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let open = center * (1.0 + 0.03 * ((i as f64) * 0.7).sin());
            let close = center * (1.0 + 0.03 * ((i as f64) * 0.7 + 0.5).sin());
            let high = open.max(close) * 1.02;
            let low = open.min(close) * 0.98;
            Bar::new(start + chrono::Duration::days(i as i64), open, high, low, close)
        })
        .collect()
}

pub fn sample_config(strategy: Strategy) -> RunConfig {
    RunConfig {
        simulation: SimulationParams::default(),
        strategy,
        data: DataConfig {
            path: PathBuf::from("unused"),
            codes: Vec::new(),
            last_n_days: None,
        },
    }
}

pub fn grid_config() -> RunConfig {
    sample_config(Strategy::Grid(GridParams::default()))
}
