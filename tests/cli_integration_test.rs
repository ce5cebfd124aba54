//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Argument parsing for every subcommand
//! - Config loading from INI files on disk, with strategy overrides
//! - Code resolution (--code, configured codes, directory listing)
//! - Simulate, batch and signal pipelines over real CSV files
//! - Trade log output
//! - Fund strategies over CSV closes
//! - Report rendering and exit-code mapping

mod common;

use approx::assert_abs_diff_eq;
use clap::Parser;
use common::*;
use klinetrader::adapters::csv_adapter::CsvAdapter;
use klinetrader::cli::{self, Cli, Command};
use klinetrader::domain::error::KlineTraderError;
use klinetrader::domain::fund::{FundAction, FundKind, PlanKind};
use klinetrader::domain::strategy::{Strategy, StrategyKind};
use klinetrader::ports::report_port::TradeLogSink;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// `ExitCode` has no `PartialEq`; compare through its debug form.
fn same_exit(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

fn write_bars_csv(dir: &Path, code: &str, bars: &[Bar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},100000\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close
        ));
    }
    fs::write(dir.join(format!("{code}.csv")), content).unwrap();
}

fn ini_for(data_dir: &Path, kind: &str, codes: &str) -> String {
    format!(
        r#"
[simulation]
cash = 20000
min_quantity = 100
transaction_fee_buy = 6
transaction_fee_sell = 5
stop_loss_rate = -0.05

[strategy]
kind = {kind}
grid_size = 0.2
volatility_window = 10
volatility_decay = 0.94
volatility_multiplier = 1.1

[data]
path = {}
codes = {codes}
"#,
        data_dir.display()
    )
}

fn fund_ini(data_dir: &Path, fund: &str) -> String {
    ini_for(data_dir, "grid", "600000").replace(
        "[strategy]\n",
        &format!("[strategy]\nfund = {fund}\ndrop_investment_cap = 5000\nrsi_investment_cap = 5000\n"),
    )
}

/// Data directory with two codes.
fn setup_data() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_bars_csv(dir.path(), "600000", &generate_bars("2024-01-02", 40, 10.0));
    write_bars_csv(dir.path(), "000001", &generate_bars("2024-01-02", 40, 15.0));
    dir
}

mod arg_parsing {
    use super::*;

    #[test]
    fn simulate_with_overrides() {
        let cli = Cli::try_parse_from([
            "klinetrader",
            "simulate",
            "-c",
            "run.ini",
            "--code",
            "600000",
            "--strategy",
            "egrid",
            "--trades",
            "out.csv",
        ])
        .unwrap();
        match cli.command {
            Command::Simulate {
                config,
                code,
                strategy,
                trades,
            } => {
                assert_eq!(config.to_str(), Some("run.ini"));
                assert_eq!(code.as_deref(), Some("600000"));
                assert_eq!(strategy, Some(StrategyKind::EnhancedGrid));
                assert_eq!(trades.unwrap().to_str(), Some("out.csv"));
            }
            other => panic!("expected simulate, got {other:?}"),
        }
    }

    #[test]
    fn signal_requires_open() {
        assert!(Cli::try_parse_from(["klinetrader", "signal", "-c", "run.ini", "--code", "A"]).is_err());
        let cli = Cli::try_parse_from([
            "klinetrader", "signal", "-c", "run.ini", "--code", "A", "--open", "10.25",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Signal { open, .. } if (open - 10.25).abs() < 1e-12));
    }

    #[test]
    fn fund_with_strategy_override() {
        let cli = Cli::try_parse_from([
            "klinetrader", "fund", "-c", "run.ini", "--code", "A", "-s", "dynamic-t",
        ])
        .unwrap();
        match cli.command {
            Command::Fund { code, strategy, .. } => {
                assert_eq!(code.as_deref(), Some("A"));
                assert_eq!(strategy, Some(FundKind::DynamicSwing));
            }
            other => panic!("expected fund, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["klinetrader", "fund", "-c", "run.ini", "-s", "sideways"]).is_err());
    }

    #[test]
    fn unknown_strategy_rejected() {
        let result = Cli::try_parse_from(["klinetrader", "batch", "-c", "run.ini", "-s", "martingale"]);
        assert!(result.is_err());
    }
}

mod config_files {
    use super::*;

    #[test]
    fn load_config_from_disk() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", "600000, 000001"));

        let config = cli::load_config(file.path(), None).unwrap();
        assert_eq!(config.strategy.kind(), StrategyKind::Grid);
        assert_eq!(config.data.codes, vec!["600000", "000001"]);
        assert_eq!(config.data.path, data.path());
        assert_abs_diff_eq!(config.simulation.cash, 20_000.0);
    }

    #[test]
    fn strategy_override_wins() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", ""));
        let config = cli::load_config(file.path(), Some(StrategyKind::HighLow)).unwrap();
        assert_eq!(config.strategy, Strategy::HighLow);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = cli::load_config(Path::new("/nonexistent/run.ini"), None).unwrap_err();
        assert!(matches!(err, KlineTraderError::ConfigParse { .. }));
        assert!(same_exit(ExitCode::from(&err), ExitCode::from(2)));
    }

    #[test]
    fn validate_command_exit_codes() {
        let data = setup_data();
        let good = write_temp_ini(&ini_for(data.path(), "momentum", ""));
        let bad = write_temp_ini("[strategy]\nkind = grid\n");

        let ok = cli::run(Cli {
            command: Command::Validate {
                config: good.path().to_path_buf(),
            },
        });
        assert!(same_exit(ok, ExitCode::SUCCESS));

        let missing = cli::run(Cli {
            command: Command::Validate {
                config: bad.path().to_path_buf(),
            },
        });
        assert!(same_exit(missing, ExitCode::from(2)));

        let bad_fund = write_temp_ini(&fund_ini(data.path(), "rsi").replace(
            "rsi_investment_cap = 5000",
            "rsi_investment_cap = 10",
        ));
        let code = cli::run(Cli {
            command: Command::Validate {
                config: bad_fund.path().to_path_buf(),
            },
        });
        assert!(same_exit(code, ExitCode::from(2)));
    }
}

mod code_resolution {
    use super::*;

    #[test]
    fn explicit_code_beats_configured() {
        let config = grid_config();
        assert_eq!(cli::resolve_code(Some("A"), &config.data), Some("A".to_string()));
        assert_eq!(cli::resolve_code(None, &config.data), None);

        let mut config = grid_config();
        config.data.codes = vec!["B".to_string(), "C".to_string()];
        assert_eq!(cli::resolve_code(None, &config.data), Some("B".to_string()));
    }

    #[test]
    fn empty_codes_lists_data_directory() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", ""));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());

        let codes = cli::resolve_codes(&source, &config).unwrap();
        assert_eq!(codes, vec!["000001", "600000"]);
    }
}

mod pipelines {
    use super::*;

    #[test]
    fn simulate_from_csv() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "egrid", "600000"));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());

        let (report, result) = cli::simulate_code(&source, &config, "600000").unwrap();
        assert_eq!(report.code, "600000");
        assert_eq!(report.strategy, StrategyKind::EnhancedGrid);
        assert_eq!(report.bars, 40);
        assert_eq!(report.buys, result.trades.count(klinetrader::domain::trade_log::TradeAction::Buy));
        assert!(report.buys > 0);
        assert_abs_diff_eq!(report.final_value, result.snapshot.total_value, epsilon = 1e-9);
    }

    #[test]
    fn trade_log_written_next_to_run() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "highlow", "600000"));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());
        let (_, result) = cli::simulate_code(&source, &config, "600000").unwrap();

        let out = data.path().join("trades.out");
        source.write_trade_log(result.trades.records(), &out).unwrap();

        let content = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "date,action,price,quantity,cash,total_value");
        assert_eq!(lines.len(), result.trades.len() + 1);
        assert!(lines[1].contains(",buy,"));
    }

    #[test]
    fn simulate_command_writes_trades() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", "600000"));
        let out = data.path().join("grid_trades.out");

        let code = cli::run(Cli {
            command: Command::Simulate {
                config: file.path().to_path_buf(),
                code: None,
                strategy: None,
                trades: Some(out.clone()),
            },
        });
        assert!(same_exit(code, ExitCode::SUCCESS));
        assert!(out.exists());
    }

    #[test]
    fn simulate_command_unknown_code_exits_no_data() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", ""));
        let code = cli::run(Cli {
            command: Command::Simulate {
                config: file.path().to_path_buf(),
                code: Some("999999".to_string()),
                strategy: None,
                trades: None,
            },
        });
        assert!(same_exit(code, ExitCode::from(5)));
    }

    #[test]
    fn batch_over_directory_skips_corrupt_file() {
        let data = setup_data();
        fs::write(
            data.path().join("BAD.csv"),
            "date,open,high,low,close\nnot-a-date,1,1,1,1\n",
        )
        .unwrap();
        let file = write_temp_ini(&ini_for(data.path(), "grid", ""));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());
        let codes = cli::resolve_codes(&source, &config).unwrap();

        let (summary, failures) = cli::run_batch_pipeline(&source, &config, &codes);
        assert_eq!(summary.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "BAD");
        assert!(matches!(failures[0].1, KlineTraderError::Data { .. }));
    }

    #[test]
    fn signal_preview_from_history() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", ""));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());

        let orders = cli::preview_signal(&source, &config, "600000", 10.0)
            .unwrap()
            .unwrap();
        if let Some(buy) = orders.buy {
            let steps = buy / 0.2;
            assert_abs_diff_eq!(steps, steps.round(), epsilon = 1e-6);
            assert!(buy <= 10.0 + 1e-9);
        }
        if let Some(sell) = orders.sell {
            assert!(sell.price <= 10.0 * 1.01 + 1e-9);
        }
    }

    #[test]
    fn signal_command_rejects_bar_strategies() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "momentum", ""));
        let code = cli::run(Cli {
            command: Command::Signal {
                config: file.path().to_path_buf(),
                code: "600000".to_string(),
                open: 10.0,
                strategy: None,
            },
        });
        assert!(same_exit(code, ExitCode::from(2)));
    }
}

mod funds {
    use super::*;

    #[test]
    fn dynamic_t_from_csv_keeps_core_holding() {
        let data = setup_data();
        let file = write_temp_ini(&fund_ini(data.path(), "dynamic_t"));
        let config = cli::load_fund_config(file.path(), None).unwrap();
        assert_eq!(config.fund.plan.drop_cap, 5000.0);

        let source = CsvAdapter::new(config.data.path.clone());
        let outcome = cli::simulate_fund(&source, &config, "600000").unwrap();
        assert_eq!(outcome.kind, FundKind::DynamicSwing);
        assert!(outcome.units >= config.fund.swing.initial_shares as f64);
        assert_eq!(outcome.transactions[0].action, FundAction::Buy);
        assert_eq!(outcome.transactions[0].units, config.fund.swing.initial_shares as f64);

        let bars = generate_bars("2024-01-02", 40, 10.0);
        assert_abs_diff_eq!(outcome.first_nav, bars[0].close, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.last_nav, bars[39].close, epsilon = 1e-9);
    }

    #[test]
    fn rsi_plan_on_rising_closes_never_buys() {
        let bars = bars_from(
            "2024-01-02",
            &(0..30)
                .map(|i| {
                    let p = 10.0 + i as f64 * 0.1;
                    (p, p, p, p)
                })
                .collect::<Vec<_>>(),
        );
        let source = MockBarSource::new().with_bars("UP", bars);
        let data = TempDir::new().unwrap();
        let file = write_temp_ini(&fund_ini(data.path(), "rsi"));
        let config = cli::load_fund_config(file.path(), None).unwrap();

        let outcome = cli::simulate_fund(&source, &config, "UP").unwrap();
        assert_eq!(outcome.kind, FundKind::Plan(PlanKind::Rsi));
        assert!(outcome.transactions.is_empty());
        assert_eq!(outcome.profit_rate(), 0.0);
    }

    #[test]
    fn fund_override_and_missing_code() {
        let data = setup_data();
        let file = write_temp_ini(&fund_ini(data.path(), "t"));
        let config = cli::load_fund_config(file.path(), Some(FundKind::Plan(PlanKind::Periodic))).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());

        let outcome = cli::simulate_fund(&source, &config, "000001").unwrap();
        // every fifth day over 40 closes
        assert_eq!(outcome.count(FundAction::Buy), 8);

        let err = cli::simulate_fund(&source, &config, "999999").unwrap_err();
        assert!(same_exit(ExitCode::from(&err), ExitCode::from(5)));
    }

    #[test]
    fn fund_command_prints_report() {
        let data = setup_data();
        let file = write_temp_ini(&fund_ini(data.path(), "fixed_drop"));
        let code = cli::run(Cli {
            command: Command::Fund {
                config: file.path().to_path_buf(),
                code: None,
                strategy: None,
            },
        });
        assert!(same_exit(code, ExitCode::SUCCESS));

        let config = cli::load_fund_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());
        let outcome = cli::simulate_fund(&source, &config, "600000").unwrap();
        let text = cli::render_fund_report("600000", &outcome);
        assert!(text.contains("=== 600000 (fixed_drop) ==="));
        assert!(text.contains(&format!("{} buys", outcome.count(FundAction::Buy))));
    }
}

mod reporting {
    use super::*;

    #[test]
    fn report_includes_drawdown_length() {
        let data = setup_data();
        let file = write_temp_ini(&ini_for(data.path(), "grid", "600000"));
        let config = cli::load_config(file.path(), None).unwrap();
        let source = CsvAdapter::new(config.data.path.clone());
        let (report, _) = cli::simulate_code(&source, &config, "600000").unwrap();

        let text = cli::render_report(&report);
        assert!(text.contains(&format!("Drawdown Length:  {} bars", report.max_drawdown_duration)));
        assert!(text.contains("=== 600000 (grid) ==="));
    }

    #[test]
    fn ledger_invariant_failures_exit_six() {
        let err = KlineTraderError::NegativeCash {
            date: date(2024, 1, 2),
            cash: -3.0,
        };
        assert!(err.is_fatal_invariant());
        assert!(same_exit(cli::fail(&err), ExitCode::from(6)));

        let err = KlineTraderError::NoData {
            code: "X".to_string(),
        };
        assert!(!err.is_fatal_invariant());
        assert!(same_exit(cli::fail(&err), ExitCode::from(5)));
    }
}
