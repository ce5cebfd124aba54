//! CSV file data adapter.
//!
//! Reads one `<CODE>.csv` per instrument with a header row and the columns
//! `date,open,high,low,close`; extra columns (volume, turnover, ...) are
//! ignored. Also writes trade logs.

use crate::domain::error::KlineTraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::trade_log::TradeRecord;
use crate::ports::data_port::BarSource;
use crate::ports::report_port::TradeLogSink;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const TRADE_LOG_HEADER: [&str; 6] = ["date", "action", "price", "quantity", "cash", "total_value"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn data_error(reason: String) -> KlineTraderError {
    KlineTraderError::Data { reason }
}

fn parse_price(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, KlineTraderError> {
    record
        .get(index)
        .ok_or_else(|| data_error(format!("line {line}: missing {name} column")))?
        .trim()
        .parse()
        .map_err(|e| data_error(format!("line {line}: invalid {name} value: {e}")))
}

impl BarSource for CsvAdapter {
    fn fetch_bars(&self, code: &str) -> Result<Vec<Bar>, KlineTraderError> {
        let path = self.csv_path(code);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(KlineTraderError::NoData {
                    code: code.to_string(),
                });
            }
            Err(e) => {
                return Err(data_error(format!("failed to read {}: {}", path.display(), e)));
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;
            let line = record.position().map_or(0, |p| p.line());

            let date_str = record
                .get(0)
                .ok_or_else(|| data_error(format!("line {line}: missing date column")))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| data_error(format!("line {line}: invalid date format: {e}")))?;

            bars.push(Bar {
                date,
                open: parse_price(&record, 1, "open", line)?,
                high: parse_price(&record, 2, "high", line)?,
                low: parse_price(&record, 3, "low", line)?,
                close: parse_price(&record, 4, "close", line)?,
            });
        }

        if bars.is_empty() {
            return Err(KlineTraderError::NoData {
                code: code.to_string(),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_codes(&self) -> Result<Vec<String>, KlineTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(code) = name_str.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}

impl TradeLogSink for CsvAdapter {
    fn write_trade_log(
        &self,
        trades: &[TradeRecord],
        output_path: &Path,
    ) -> Result<(), KlineTraderError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(std::io::Error::other)?;
        wtr.write_record(TRADE_LOG_HEADER)
            .map_err(std::io::Error::other)?;
        for t in trades {
            wtr.write_record([
                t.date.format("%Y-%m-%d").to_string(),
                t.action.to_string(),
                format!("{:.4}", t.price),
                t.quantity.to_string(),
                format!("{:.2}", t.cash),
                format!("{:.2}", t.total_value),
            ])
            .map_err(std::io::Error::other)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
