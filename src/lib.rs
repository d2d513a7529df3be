pub mod cache;
pub mod config;
pub mod dashboard;
pub mod decode;
pub mod errors;
pub mod format;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod render;
pub mod reports;
pub mod warehouse;

use crate::config::DashboardConfig;
use crate::dashboard::{parse_command, ControlCommand, Dashboard, COMMAND_HELP};
use crate::errors::{AppError, AppResult};
use crate::render::{render_json, render_section, render_text};
use crate::warehouse::demo::seed_demo_warehouse;
use crate::warehouse::{SqliteWarehouse, WarehouseClient};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub const DEFAULT_DEMO_SEED: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "gold-dashboard", about = "Gold-table analytics dashboard", version)]
pub struct CliArgs {
    /// Dashboard config file (defaults to GOLD_DASHBOARD_CONFIG).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Render every section once and exit.
    Render {
        #[arg(long)]
        json: bool,
    },
    /// Render, then apply control commands read from stdin.
    Interactive,
    /// Write a deterministic demo warehouse to `path`.
    SeedDemo {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_DEMO_SEED)]
        seed: u64,
    },
}

pub fn run(args: CliArgs) -> anyhow::Result<()> {
    match args.command.unwrap_or(CliCommand::Render { json: false }) {
        CliCommand::SeedDemo { path, seed } => {
            init_tracing(None)?;
            let summary = seed_demo_warehouse(&path, seed)?;
            println!(
                "seeded {}: {} customers, {} rolling rows, {} trend rows, {} loyalty rows, {} discount rows",
                path.display(),
                summary.customers,
                summary.rolling_rows,
                summary.trend_rows,
                summary.loyalty_rows,
                summary.discount_rows
            );
            Ok(())
        }
        CliCommand::Render { json } => {
            let config = DashboardConfig::load(args.config.as_deref())?;
            init_tracing(config.log_dir.as_deref())?;
            let mut dashboard = open_dashboard(&config)?;
            let view = dashboard.render_all(Utc::now())?;
            if json {
                println!("{}", render_json(&view)?);
            } else {
                print!("{}", render_text(&view));
            }
            Ok(())
        }
        CliCommand::Interactive => {
            let config = DashboardConfig::load(args.config.as_deref())?;
            init_tracing(config.log_dir.as_deref())?;
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            runtime.block_on(run_interactive(config))?;
            Ok(())
        }
    }
}

fn open_dashboard(config: &DashboardConfig) -> AppResult<Dashboard<SqliteWarehouse>> {
    let warehouse = SqliteWarehouse::open(&config.warehouse_path)?;
    tracing::info!(
        path = %warehouse.path().display(),
        cache_ttl_seconds = config.cache_ttl_seconds,
        "opened gold warehouse"
    );
    Ok(Dashboard::new(warehouse, config))
}

async fn run_interactive(config: DashboardConfig) -> AppResult<()> {
    let mut dashboard = open_dashboard(&config)?;
    print!("{}", render_text(&dashboard.render_all(Utc::now())?));
    println!("\n{}", COMMAND_HELP);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = config.refresh_interval().map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&mut dashboard, &line) {
                    break;
                }
            }
            _ = next_tick(&mut ticker) => {
                tracing::info!("periodic refresh");
                match dashboard.refresh(Utc::now()) {
                    Ok(view) => print!("{}", render_text(&view)),
                    Err(error) => report_error(&error),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Returns `false` once the user asks to quit.
fn handle_line<W: WarehouseClient>(dashboard: &mut Dashboard<W>, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(error) => {
            report_error(&error);
            return true;
        }
    };

    let now = Utc::now();
    match command {
        ControlCommand::Quit => return false,
        ControlCommand::Help => println!("{}", COMMAND_HELP),
        ControlCommand::Show => {
            let view = dashboard.snapshot(uuid::Uuid::new_v4().to_string(), now);
            print!("{}", render_text(&view));
        }
        ControlCommand::Refresh => match dashboard.refresh(now) {
            Ok(view) => print!("{}", render_text(&view)),
            Err(error) => report_error(&error),
        },
        ControlCommand::Change(change) => match dashboard.apply(change, now) {
            Ok(views) => {
                for view in &views {
                    print!("\n{}", render_section(view));
                }
            }
            Err(error) => report_error(&error),
        },
    }
    true
}

fn report_error(error: &AppError) {
    match error {
        AppError::Control(_) => tracing::debug!(error = %error, "rejected control input"),
        _ => tracing::error!(error = %error, "dashboard update failed"),
    }
    eprintln!("{}", error);
}

/// JSON logs to a daily rolling file under `log_dir`, or plain logs on stderr.
pub fn init_tracing(log_dir: Option<&Path>) -> AppResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "gold-dashboard.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
                .map_err(|error| AppError::Internal(error.to_string()))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| AppError::Internal(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{next_tick, CliArgs, CliCommand, DEFAULT_DEMO_SEED};
    use clap::error::ErrorKind;
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    fn parse(values: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("gold-dashboard").chain(values.iter().copied()))
    }

    #[test]
    fn no_subcommand_means_render() {
        let parsed = parse(&[]).expect("parse");
        assert_eq!(parsed.command, None);
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn parses_config_and_subcommands() {
        let parsed = parse(&["--config", "dash.yaml", "render", "--json"]).expect("parse");
        assert_eq!(parsed.config, Some(PathBuf::from("dash.yaml")));
        assert_eq!(parsed.command, Some(CliCommand::Render { json: true }));

        let parsed = parse(&["-c", "dash.yaml", "interactive"]).expect("parse");
        assert_eq!(parsed.config, Some(PathBuf::from("dash.yaml")));
        assert_eq!(parsed.command, Some(CliCommand::Interactive));

        let parsed = parse(&["seed-demo", "gold.db"]).expect("parse");
        assert_eq!(
            parsed.command,
            Some(CliCommand::SeedDemo {
                path: PathBuf::from("gold.db"),
                seed: DEFAULT_DEMO_SEED
            })
        );
        let parsed = parse(&["seed-demo", "gold.db", "--seed", "42"]).expect("parse");
        assert!(matches!(parsed.command, Some(CliCommand::SeedDemo { seed: 42, .. })));
    }

    #[test]
    fn rejects_bad_arguments() {
        let cases: [&[&str]; 5] = [
            &["--config"],
            &["seed-demo"],
            &["explode"],
            &["--verbose"],
            &["seed-demo", "x.db", "--seed", "abc"],
        ];
        for bad in cases {
            assert!(parse(bad).is_err(), "{bad:?}");
        }
        let help = parse(&["--help"]).expect_err("help short-circuits");
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);
    }

    #[tokio::test]
    async fn refresh_tick_only_fires_when_configured() {
        let mut disabled = None;
        let waited = tokio::time::timeout(Duration::from_millis(30), next_tick(&mut disabled)).await;
        assert!(waited.is_err());

        let period = Duration::from_millis(5);
        let mut enabled = Some(tokio::time::interval_at(tokio::time::Instant::now() + period, period));
        let fired = tokio::time::timeout(Duration::from_secs(2), next_tick(&mut enabled)).await;
        assert!(fired.is_ok());
    }
}
