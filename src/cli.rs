//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    load_fund_run_config, load_run_config, validate_run_config, DataConfig, FundRunConfig, RunConfig,
};
use crate::domain::error::KlineTraderError;
use crate::domain::fund::{self, FundAction, FundKind, FundOutcome};
use crate::domain::metrics::{BatchSummary, RunReport};
use crate::domain::strategy::{OrderSet, StrategyKind};
use crate::domain::trader::{self, RunResult, Trader};
use crate::ports::data_port::BarSource;
use crate::ports::report_port::TradeLogSink;

#[derive(Parser, Debug)]
#[command(name = "klinetrader", about = "Daily-bar discretionary trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate one code and print its report
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        /// grid, egrid, momentum or highlow; overrides [strategy] kind
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
        /// Write the trade log as CSV
        #[arg(short, long)]
        trades: Option<PathBuf>,
    },
    /// Simulate every configured code in parallel and rank the results
    Batch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
    },
    /// Preview the orders a grid strategy would place for a given open
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        open: f64,
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
    },
    /// Run a fund T-strategy or investment plan over one code's closes
    Fund {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        /// t, dynamic_t, fixed_drop, dynamic_drop, periodic, ma,
        /// value_averaging, rsi or enhanced_rsi; overrides [strategy] fund
        #[arg(short, long)]
        strategy: Option<FundKind>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Installs the stderr log subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate {
            config,
            code,
            strategy,
            trades,
        } => run_simulate(&config, code.as_deref(), strategy, trades.as_deref()),
        Command::Batch { config, strategy } => run_batch(&config, strategy),
        Command::Signal {
            config,
            code,
            open,
            strategy,
        } => run_signal(&config, &code, open, strategy),
        Command::Fund {
            config,
            code,
            strategy,
        } => run_fund(&config, code.as_deref(), strategy),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Reports `err` and maps it to the process exit code. Ledger invariant
/// violations are also logged at error level.
pub fn fail(err: &KlineTraderError) -> ExitCode {
    if err.is_fatal_invariant() {
        error!(error = %err, "simulation aborted on a ledger invariant");
        eprintln!("fatal: {err}");
    } else {
        eprintln!("error: {err}");
    }
    err.into()
}

pub fn load_config(
    path: &Path,
    kind_override: Option<StrategyKind>,
) -> Result<RunConfig, KlineTraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    load_run_config(&adapter, kind_override)
}

pub fn load_fund_config(
    path: &Path,
    kind_override: Option<FundKind>,
) -> Result<FundRunConfig, KlineTraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    load_fund_run_config(&adapter, kind_override)
}

/// `--code` if given, otherwise the first configured code.
pub fn resolve_code(code_override: Option<&str>, data: &DataConfig) -> Option<String> {
    code_override
        .map(str::to_string)
        .or_else(|| data.codes.first().cloned())
}

/// Configured codes, or every code the source knows about.
pub fn resolve_codes<S: BarSource + ?Sized>(
    source: &S,
    config: &RunConfig,
) -> Result<Vec<String>, KlineTraderError> {
    if config.data.codes.is_empty() {
        source.list_codes()
    } else {
        Ok(config.data.codes.clone())
    }
}

/// Fetches, windows and simulates one code.
pub fn simulate_code<S: BarSource + ?Sized>(
    source: &S,
    config: &RunConfig,
    code: &str,
) -> Result<(RunReport, RunResult), KlineTraderError> {
    let bars = source.fetch_bars(code)?;
    let bars = trader::window(&bars, config.data.last_n_days);
    if bars.is_empty() {
        return Err(KlineTraderError::NoData {
            code: code.to_string(),
        });
    }
    info!(code, bars = bars.len(), "simulating");
    let result = trader::run(config.strategy.clone(), config.simulation.clone(), bars)?;
    Ok((RunReport::from_run(code, &result), result))
}

/// Runs every code on the rayon pool. Failed codes are returned alongside
/// the summary of the ones that finished.
pub fn run_batch_pipeline<S: BarSource + Sync + ?Sized>(
    source: &S,
    config: &RunConfig,
    codes: &[String],
) -> (BatchSummary, Vec<(String, KlineTraderError)>) {
    let results: Vec<(String, Result<RunReport, KlineTraderError>)> = codes
        .par_iter()
        .map(|code| {
            let report = simulate_code(source, config, code).map(|(report, _)| report);
            (code.clone(), report)
        })
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (code, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(code = %code, error = %e, "skipping code");
                failures.push((code, e));
            }
        }
    }
    (BatchSummary::new(reports), failures)
}

/// Replays the history of `code`, then previews the orders for `open`.
/// Returns `None` for strategies that cannot preview from an open alone.
pub fn preview_signal<S: BarSource + ?Sized>(
    source: &S,
    config: &RunConfig,
    code: &str,
    open: f64,
) -> Result<Option<OrderSet>, KlineTraderError> {
    let bars = source.fetch_bars(code)?;
    let bars = trader::window(&bars, config.data.last_n_days);
    let mut trader = Trader::new(config.strategy.clone(), config.simulation.clone());
    for bar in bars {
        trader.step(bar)?;
    }
    Ok(trader.preview(open))
}

/// Fetches and windows one code, then runs the fund strategy on its closes.
pub fn simulate_fund<S: BarSource + ?Sized>(
    source: &S,
    config: &FundRunConfig,
    code: &str,
) -> Result<FundOutcome, KlineTraderError> {
    let bars = source.fetch_bars(code)?;
    let bars = trader::window(&bars, config.data.last_n_days);
    if bars.is_empty() {
        return Err(KlineTraderError::NoData {
            code: code.to_string(),
        });
    }
    let points = fund::nav_series(bars)?;
    info!(code, strategy = %config.fund.kind, days = points.len(), "fund run");
    fund::run_fund(&config.fund, &points)
}

fn run_simulate(
    config_path: &Path,
    code_override: Option<&str>,
    kind_override: Option<StrategyKind>,
    trades_path: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path, kind_override) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let Some(code) = resolve_code(code_override, &config.data) else {
        eprintln!("error: no code given and [data] codes is empty");
        return ExitCode::from(2);
    };

    let source = CsvAdapter::new(config.data.path.clone());
    let (report, result) = match simulate_code(&source, &config, &code) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    print_report(&report);

    if let Some(path) = trades_path {
        if let Err(e) = source.write_trade_log(result.trades.records(), path) {
            return fail(&e);
        }
        eprintln!("\nTrade log written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

fn run_batch(config_path: &Path, kind_override: Option<StrategyKind>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path, kind_override) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let source = CsvAdapter::new(config.data.path.clone());
    let codes = match resolve_codes(&source, &config) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if codes.is_empty() {
        eprintln!("error: no codes to simulate");
        return ExitCode::from(5);
    }

    eprintln!(
        "Running {} on {} codes",
        config.strategy.kind(),
        codes.len()
    );
    let (summary, failures) = run_batch_pipeline(&source, &config, &codes);

    for (code, e) in &failures {
        eprintln!("warning: skipped {} ({})", code, e);
    }
    if summary.is_empty() {
        eprintln!("error: no code produced a result");
        return ExitCode::from(5);
    }

    print_summary(&summary);
    ExitCode::SUCCESS
}

fn run_signal(
    config_path: &Path,
    code: &str,
    open: f64,
    kind_override: Option<StrategyKind>,
) -> ExitCode {
    let config = match load_config(config_path, kind_override) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let source = CsvAdapter::new(config.data.path.clone());

    match preview_signal(&source, &config, code, open) {
        Ok(Some(orders)) => {
            eprintln!("=== Signal: {} @ open {:.2} ===", code, open);
            match orders.buy {
                Some(price) => eprintln!("Buy target:   {:.2}", price),
                None => eprintln!("Buy target:   none"),
            }
            match orders.sell {
                Some(sell) => eprintln!("Sell target:  {:.2}", sell.price),
                None => eprintln!("Sell target:  none"),
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!(
                "error: {} orders depend on the full bar and cannot be previewed",
                config.strategy.kind()
            );
            ExitCode::from(2)
        }
        Err(e) => fail(&e),
    }
}

fn run_fund(
    config_path: &Path,
    code_override: Option<&str>,
    kind_override: Option<FundKind>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_fund_config(config_path, kind_override) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let Some(code) = resolve_code(code_override, &config.data) else {
        eprintln!("error: no code given and [data] codes is empty");
        return ExitCode::from(2);
    };

    let source = CsvAdapter::new(config.data.path.clone());
    match simulate_fund(&source, &config, &code) {
        Ok(outcome) => {
            eprint!("{}", render_fund_report(&code, &outcome));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let checked = FileConfigAdapter::from_file(config_path).and_then(|a| validate_run_config(&a));
    match checked {
        Ok((config, fund)) => {
            eprintln!("  strategy: {}", config.strategy.kind());
            if let Some(fund) = fund {
                eprintln!("  fund:     {}", fund.kind);
            }
            eprintln!("  cash:     {:.2}", config.simulation.cash);
            eprintln!("  data:     {}", config.data.path.display());
            if !config.data.codes.is_empty() {
                eprintln!("  codes:    {}", config.data.codes.join(", "));
            }
            eprintln!("\nConfig is valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn print_report(report: &RunReport) {
    eprint!("{}", render_report(report));
}

pub fn render_report(report: &RunReport) -> String {
    let mut out = format!("\n=== {} ({}) ===\n", report.code, report.strategy);
    out.push_str(&format!("Bars:             {}\n", report.bars));
    out.push_str(&format!(
        "Start / End:      {:.2} -> {:.2}\n",
        report.start_price, report.end_price
    ));
    out.push_str(&format!("Initial Cash:     {:.2}\n", report.initial_cash));
    out.push_str(&format!("Final Value:      {:.2}\n", report.final_value));
    out.push_str(&format!("Return:           {:.2}%\n", report.return_rate));
    out.push_str(&format!("Buy & Hold:       {:.2}%\n", report.buy_and_hold_return));
    out.push_str(&format!("Max Drawdown:     -{:.1}%\n", report.max_drawdown * 100.0));
    out.push_str(&format!("Drawdown Length:  {} bars\n", report.max_drawdown_duration));
    out.push_str(&format!(
        "Trades:           {} buys, {} sells, {} stop-losses\n",
        report.buys, report.sells, report.stop_losses
    ));
    out.push_str(&format!("Win Rate:         {:.1}%\n", report.win_rate * 100.0));
    out.push_str(&format!("Skipped Buys:     {}\n", report.skipped_buys));
    out.push_str(&format!("Fees Paid:        {:.2}\n", report.total_fees));
    out.push_str(&format!("Stop-Loss Losses: {:.2}\n", report.cumulative_loss));
    out.push_str(&format!("Cash:             {:.2}\n", report.cash));
    if !report.open_positions.is_empty() {
        out.push_str("Open Positions:\n");
        for p in &report.open_positions {
            out.push_str(&format!(
                "  {} x {:.2} (since {})\n",
                p.quantity, p.price, p.purchase_date
            ));
        }
    }
    out
}

pub fn render_fund_report(code: &str, outcome: &FundOutcome) -> String {
    let mut out = format!("\n=== {} ({}) ===\n", code, outcome.kind);
    out.push_str(&format!("Total Cost:       {:.4}\n", outcome.total_cost));
    out.push_str(&format!("Units Held:       {:.2}\n", outcome.units));
    out.push_str(&format!(
        "Start / End NAV:  {:.4} -> {:.4}\n",
        outcome.first_nav, outcome.last_nav
    ));
    match outcome.average_cost() {
        Some(avg) => out.push_str(&format!("Average Cost:     {:.4}\n", avg)),
        None => out.push_str("Average Cost:     n/a\n"),
    }
    out.push_str(&format!("Market Value:     {:.2}\n", outcome.market_value()));
    out.push_str(&format!(
        "Profit:           {:.2} ({:.2}%)\n",
        outcome.profit(),
        outcome.profit_rate()
    ));
    out.push_str(&format!("Hold Return:      {:.2}%\n", outcome.hold_return()));
    out.push_str(&format!(
        "Transactions:     {} buys, {} sells, {} liquidations\n",
        outcome.count(FundAction::Buy),
        outcome.count(FundAction::Sell),
        outcome.count(FundAction::Liquidate)
    ));
    out.push_str(&format!("Fees Paid:        {:.2}\n", outcome.fees));
    out.push_str(&format!("Stop-Loss Losses: {:.2}\n", outcome.loss));
    out
}

pub fn print_summary(summary: &BatchSummary) {
    eprintln!("\n=== Batch Results ===");
    for r in &summary.reports {
        let sign = if r.return_rate >= 0.0 { "+" } else { "" };
        eprintln!(
            "  {}:  {}{:.2}% (hold {:.2}%), {} trades",
            r.code,
            sign,
            r.return_rate,
            r.buy_and_hold_return,
            r.buys + r.sells + r.stop_losses,
        );
    }
    eprintln!("\nAverage Return:   {:.2}%", summary.average_return);
    if let (Some(best), Some(worst)) = (summary.best(), summary.worst()) {
        eprintln!("Best:             {} {:.2}%", best.code, best.return_rate);
        eprintln!("Worst:            {} {:.2}%", worst.code, worst.return_rate);
    }
}
