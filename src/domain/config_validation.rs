//! Configuration loading and validation.
//!
//! Reads the `[simulation]`, `[strategy]` and `[data]` sections into typed
//! parameters, rejecting out-of-range values before any run starts. Fund
//! strategies are selected by `[strategy] fund` and read their own keys from
//! the same section.

use std::path::PathBuf;

use crate::domain::error::KlineTraderError;
use crate::domain::fund::{self, FundConfig, FundKind, PlanParams, SwingParams};
use crate::domain::params::{self, LotSizing, SimulationParams};
use crate::domain::strategy::momentum::{self, MomentumParams};
use crate::domain::strategy::{GridParams, Strategy, StrategyKind, grid};
use crate::domain::volatility::{self, VolatilityParams};
use crate::ports::config_port::ConfigPort;

const SIMULATION: &str = "simulation";
const STRATEGY: &str = "strategy";
const DATA: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    /// Directory holding one `<CODE>.csv` per instrument.
    pub path: PathBuf,
    pub codes: Vec<String>,
    pub last_n_days: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub simulation: SimulationParams,
    pub strategy: Strategy,
    pub data: DataConfig,
}

/// Fund strategy plus the data it runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct FundRunConfig {
    pub fund: FundConfig,
    pub data: DataConfig,
}

/// Loads every section. `kind_override` replaces `[strategy] kind`.
pub fn load_run_config(
    config: &dyn ConfigPort,
    kind_override: Option<StrategyKind>,
) -> Result<RunConfig, KlineTraderError> {
    Ok(RunConfig {
        simulation: load_simulation(config)?,
        strategy: load_strategy(config, kind_override)?,
        data: load_data(config)?,
    })
}

pub fn load_simulation(config: &dyn ConfigPort) -> Result<SimulationParams, KlineTraderError> {
    let cash = double_or(config, SIMULATION, "cash", params::DEFAULT_CASH)?;
    if cash <= 0.0 {
        return Err(invalid(SIMULATION, "cash", "cash must be positive"));
    }

    let lot = match config.get_string(SIMULATION, "min_quantity") {
        Some(v) if v.eq_ignore_ascii_case("auto") => LotSizing::Auto,
        Some(_) => {
            let q = config.get_int(SIMULATION, "min_quantity")?.unwrap_or(0);
            if q < 1 {
                return Err(invalid(SIMULATION, "min_quantity", "min_quantity must be at least 1"));
            }
            LotSizing::Fixed(q as u64)
        }
        None => LotSizing::Fixed(params::DEFAULT_MIN_QUANTITY),
    };

    let fee_buy = double_or(config, SIMULATION, "transaction_fee_buy", params::DEFAULT_FEE_BUY)?;
    let fee_sell = double_or(config, SIMULATION, "transaction_fee_sell", params::DEFAULT_FEE_SELL)?;
    for (key, fee) in [("transaction_fee_buy", fee_buy), ("transaction_fee_sell", fee_sell)] {
        if fee < 0.0 {
            return Err(invalid(SIMULATION, key, "fees must be non-negative"));
        }
    }

    let sell_fee_rate = double_or(config, SIMULATION, "sell_fee_rate", 0.0)?;
    if !(0.0..1.0).contains(&sell_fee_rate) {
        return Err(invalid(SIMULATION, "sell_fee_rate", "sell_fee_rate must be in [0, 1)"));
    }

    let stop_loss_rate = double_or(
        config,
        SIMULATION,
        "stop_loss_rate",
        params::DEFAULT_STOP_LOSS_RATE,
    )?;
    if stop_loss_rate <= -1.0 || stop_loss_rate > 0.0 {
        return Err(invalid(SIMULATION, "stop_loss_rate", "stop_loss_rate must be in (-1, 0]"));
    }

    Ok(SimulationParams {
        cash,
        lot,
        fee_buy,
        fee_sell,
        sell_fee_rate,
        stop_loss_rate,
    })
}

pub fn load_strategy(
    config: &dyn ConfigPort,
    kind_override: Option<StrategyKind>,
) -> Result<Strategy, KlineTraderError> {
    let kind = match kind_override {
        Some(kind) => kind,
        None => config
            .get_string(STRATEGY, "kind")
            .ok_or_else(|| KlineTraderError::ConfigMissing {
                section: STRATEGY.to_string(),
                key: "kind".to_string(),
            })?
            .parse::<StrategyKind>()
            .map_err(|e| invalid(STRATEGY, "kind", &e.to_string()))?,
    };

    Ok(match kind {
        StrategyKind::Grid => Strategy::Grid(load_grid(config)?),
        StrategyKind::EnhancedGrid => Strategy::EnhancedGrid(load_grid(config)?),
        StrategyKind::Momentum => Strategy::Momentum(load_momentum(config)?),
        StrategyKind::HighLow => Strategy::HighLow,
    })
}

fn load_grid(config: &dyn ConfigPort) -> Result<GridParams, KlineTraderError> {
    let grid_size = double_or(config, STRATEGY, "grid_size", grid::DEFAULT_GRID_SIZE)?;
    if grid_size <= 0.0 {
        return Err(invalid(STRATEGY, "grid_size", "grid_size must be positive"));
    }

    let window = count_or(config, STRATEGY, "volatility_window", volatility::DEFAULT_VOLATILITY_WINDOW)?;
    let multiplier = double_or(
        config,
        STRATEGY,
        "volatility_multiplier",
        volatility::DEFAULT_VOLATILITY_MULTIPLIER,
    )?;
    if multiplier <= 0.0 {
        return Err(invalid(STRATEGY, "volatility_multiplier", "volatility_multiplier must be positive"));
    }
    let decay = double_or(config, STRATEGY, "volatility_decay", volatility::DEFAULT_VOLATILITY_DECAY)?;
    if decay <= 0.0 || decay > 1.0 {
        return Err(invalid(STRATEGY, "volatility_decay", "volatility_decay must be in (0, 1]"));
    }

    Ok(GridParams {
        grid_size,
        volatility: VolatilityParams {
            window,
            decay,
            multiplier,
            default_range: volatility::DEFAULT_RANGE,
        },
    })
}

fn load_momentum(config: &dyn ConfigPort) -> Result<MomentumParams, KlineTraderError> {
    let short_window = count_or(config, STRATEGY, "short_window", momentum::DEFAULT_SHORT_WINDOW)?;
    let long_window = count_or(config, STRATEGY, "long_window", momentum::DEFAULT_LONG_WINDOW)?;
    if short_window >= long_window {
        return Err(invalid(STRATEGY, "short_window", "short_window must be less than long_window"));
    }
    let momentum_days = count_or(config, STRATEGY, "momentum_days", momentum::DEFAULT_MOMENTUM_DAYS)?;
    let buy_threshold = double_or(config, STRATEGY, "buy_threshold", momentum::DEFAULT_BUY_THRESHOLD)?;
    let sell_threshold = double_or(config, STRATEGY, "sell_threshold", momentum::DEFAULT_SELL_THRESHOLD)?;

    Ok(MomentumParams {
        short_window,
        long_window,
        momentum_days,
        buy_threshold,
        sell_threshold,
    })
}

pub fn load_data(config: &dyn ConfigPort) -> Result<DataConfig, KlineTraderError> {
    let path = config
        .get_string(DATA, "path")
        .ok_or_else(|| KlineTraderError::ConfigMissing {
            section: DATA.to_string(),
            key: "path".to_string(),
        })?;

    let codes = config
        .get_string(DATA, "codes")
        .map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let last_n_days = match config.get_int(DATA, "last_n_days")? {
        Some(n) if n < 1 => {
            return Err(invalid(DATA, "last_n_days", "last_n_days must be at least 1"));
        }
        Some(n) => Some(n as usize),
        None => None,
    };

    Ok(DataConfig {
        path: PathBuf::from(path),
        codes,
        last_n_days,
    })
}

pub fn load_fund_run_config(
    config: &dyn ConfigPort,
    kind_override: Option<FundKind>,
) -> Result<FundRunConfig, KlineTraderError> {
    Ok(FundRunConfig {
        fund: load_fund(config, kind_override)?,
        data: load_data(config)?,
    })
}

/// `[strategy] fund` and its swing and plan settings.
pub fn load_fund(
    config: &dyn ConfigPort,
    kind_override: Option<FundKind>,
) -> Result<FundConfig, KlineTraderError> {
    let kind = match kind_override {
        Some(kind) => kind,
        None => config
            .get_string(STRATEGY, "fund")
            .ok_or_else(|| KlineTraderError::ConfigMissing {
                section: STRATEGY.to_string(),
                key: "fund".to_string(),
            })?
            .parse::<FundKind>()
            .map_err(|e| invalid(STRATEGY, "fund", &e.to_string()))?,
    };

    Ok(FundConfig {
        kind,
        swing: load_swing(config)?,
        plan: load_plan(config)?,
    })
}

fn load_swing(config: &dyn ConfigPort) -> Result<SwingParams, KlineTraderError> {
    let initial_shares = count_or(
        config,
        STRATEGY,
        "initial_shares",
        fund::swing::DEFAULT_INITIAL_SHARES as usize,
    )? as u64;
    let lot_shares = count_or(config, STRATEGY, "lot_shares", fund::swing::DEFAULT_LOT_SHARES as usize)? as u64;
    let threshold_rate = double_or(
        config,
        STRATEGY,
        "threshold_rate",
        fund::swing::DEFAULT_THRESHOLD_RATE,
    )?;
    if threshold_rate <= 0.0 {
        return Err(invalid(STRATEGY, "threshold_rate", "threshold_rate must be positive"));
    }
    let hold_days = match config.get_int(STRATEGY, "hold_days")? {
        None => fund::swing::DEFAULT_HOLD_DAYS,
        Some(n) if n >= 0 => n as u64,
        Some(_) => return Err(invalid(STRATEGY, "hold_days", "hold_days must be non-negative")),
    };
    let sell_fee_rate = double_or(
        config,
        STRATEGY,
        "fund_sell_fee_rate",
        fund::swing::DEFAULT_SELL_FEE_RATE,
    )?;
    if !(0.0..1.0).contains(&sell_fee_rate) {
        return Err(invalid(STRATEGY, "fund_sell_fee_rate", "fund_sell_fee_rate must be in [0, 1)"));
    }

    Ok(SwingParams {
        initial_shares,
        lot_shares,
        threshold_rate,
        hold_days,
        sell_fee_rate,
    })
}

fn load_plan(config: &dyn ConfigPort) -> Result<PlanParams, KlineTraderError> {
    let mut amounts = [
        ("investment_amount", fund::plan::DEFAULT_AMOUNT),
        ("drop_investment_cap", fund::plan::DEFAULT_DROP_CAP),
        ("rsi_investment_cap", fund::plan::DEFAULT_RSI_CAP),
        ("target_growth", fund::plan::DEFAULT_AMOUNT),
    ];
    for (key, value) in amounts.iter_mut() {
        *value = double_or(config, STRATEGY, key, *value)?;
        if *value <= 0.0 {
            return Err(invalid(STRATEGY, key, &format!("{key} must be positive")));
        }
    }
    let [(_, amount), (_, drop_cap), (_, rsi_cap), (_, target_growth)] = amounts;
    for (key, cap) in [("drop_investment_cap", drop_cap), ("rsi_investment_cap", rsi_cap)] {
        if cap < amount {
            return Err(invalid(STRATEGY, key, &format!("{key} must not be below investment_amount")));
        }
    }

    let stop_loss = double_or(config, STRATEGY, "plan_stop_loss", fund::plan::DEFAULT_PLAN_STOP_LOSS)?;
    if stop_loss <= 0.0 || stop_loss > 1.0 {
        return Err(invalid(STRATEGY, "plan_stop_loss", "plan_stop_loss must be in (0, 1]"));
    }

    Ok(PlanParams {
        amount,
        drop_cap,
        rsi_cap,
        period_days: count_or(config, STRATEGY, "plan_period_days", fund::plan::DEFAULT_PERIOD_DAYS)?,
        ma_window: count_or(config, STRATEGY, "plan_ma_window", fund::plan::DEFAULT_MA_WINDOW)?,
        target_growth,
        month_days: count_or(config, STRATEGY, "month_days", fund::plan::DEFAULT_MONTH_DAYS)?,
        rsi_period: count_or(config, STRATEGY, "rsi_period", fund::plan::DEFAULT_RSI_PERIOD)?,
        stop_loss,
    })
}

/// Loads every section a file may hold, surfacing the first problem. The
/// fund settings are only checked when `[strategy] fund` is set.
pub fn validate_run_config(
    config: &dyn ConfigPort,
) -> Result<(RunConfig, Option<FundConfig>), KlineTraderError> {
    let run = load_run_config(config, None)?;
    let fund = match config.get_string(STRATEGY, "fund") {
        Some(_) => Some(load_fund(config, None)?),
        None => None,
    };
    Ok((run, fund))
}

fn invalid(section: &str, key: &str, reason: &str) -> KlineTraderError {
    KlineTraderError::config_invalid(section, key, reason)
}

fn double_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, KlineTraderError> {
    let value = config.get_double(section, key)?.unwrap_or(default);
    if !value.is_finite() {
        return Err(invalid(section, key, "value must be finite"));
    }
    Ok(value)
}

/// Positive integer setting.
fn count_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, KlineTraderError> {
    match config.get_int(section, key)? {
        None => Ok(default),
        Some(n) if n >= 1 => Ok(n as usize),
        Some(_) => Err(invalid(section, key, &format!("{key} must be at least 1"))),
    }
}
