//! Volatility overlay backtest CLI.
//!
//! # Usage
//!
//! ```bash
//! # Run the backtest over the three reference instruments
//! vol-overlay-backtest run --kc data/kc.csv --spx data/spx.csv --eurusd data/eurusd.csv
//!
//! # Reproducible run with instant fills and a custom config
//! vol-overlay-backtest run --kc data/kc.csv --spx data/spx.csv --eurusd data/eurusd.csv \
//!     --config config/default.toml --instant-fills --seed 42
//!
//! # Cumulative daily P&L of a saved trade table
//! vol-overlay-backtest pnl --trades results/trades.csv --output results/daily_pnl.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use vol_overlay_backtest::backtest::{
    read_trades_csv, write_trades_csv, BacktestConfig, BacktestEngine, InstrumentSource,
    TradeRecord, DEFAULT_TRADES_PATH,
};
use vol_overlay_backtest::metrics::{daily_pnl, write_daily_pnl_csv, PnlSummary};

const SEPARATOR: &str = "============================================================";

const PREVIEW_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "vol-overlay-backtest")]
#[command(about = "Backtest a realized-vs-implied volatility overlay on futures options")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the backtest and save the trade table
    Run {
        /// Coffee (KC) daily closes
        #[arg(long)]
        kc: PathBuf,

        /// S&P 500 (SPX) daily closes
        #[arg(long)]
        spx: PathBuf,

        /// EUR/USD daily closes
        #[arg(long)]
        eurusd: PathBuf,

        /// Path to TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trade table output path
        #[arg(short, long, default_value = DEFAULT_TRADES_PATH)]
        output: PathBuf,

        /// Fill at the signal bar without delay or slippage
        #[arg(long)]
        instant_fills: bool,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Aggregate a trade table into daily and cumulative P&L
    Pnl {
        /// Trade table to read
        #[arg(short, long, default_value = DEFAULT_TRADES_PATH)]
        trades: PathBuf,

        /// Optional CSV output for the daily P&L curve
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vol_overlay_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            kc,
            spx,
            eurusd,
            config,
            output,
            instant_fills,
            seed,
        } => {
            let mut config = match config {
                Some(path) => BacktestConfig::from_toml_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => BacktestConfig::default(),
            };
            if instant_fills {
                config.delayed_fills = false;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            cmd_run(config, InstrumentSource::defaults(kc, spx, eurusd), output)?;
        }
        Commands::Pnl { trades, output } => {
            cmd_pnl(trades, output)?;
        }
    }

    Ok(())
}

fn cmd_run(config: BacktestConfig, sources: Vec<InstrumentSource>, output: PathBuf) -> Result<()> {
    let engine = BacktestEngine::new(config);
    let result = engine.run(&sources).context("Backtest failed")?;

    write_trades_csv(&result.trades, &output)
        .with_context(|| format!("Failed to write trades to {}", output.display()))?;
    info!("Saved {} trades to {}", result.len(), output.display());

    println!("{}", SEPARATOR);
    println!("{}", result.summary());
    println!("{}", SEPARATOR);

    println!("\nFirst {} trades:", PREVIEW_ROWS.min(result.len()));
    print_trades(result.preview(PREVIEW_ROWS));

    Ok(())
}

fn cmd_pnl(trades_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let trades = read_trades_csv(&trades_path)
        .with_context(|| format!("Failed to read trades from {}", trades_path.display()))?;

    let rows = daily_pnl(&trades);
    let summary = PnlSummary::from_trades(&trades);

    println!("{}", SEPARATOR);
    println!("{}", summary.summary());
    println!("{}", SEPARATOR);

    println!("\n{:<12} {:>16} {:>18}", "date", "pnl", "cumulative_pnl");
    for row in &rows {
        println!(
            "{:<12} {:>16} {:>18}",
            row.date.to_string(),
            row.pnl.round_dp(4).to_string(),
            row.cumulative_pnl.round_dp(4).to_string()
        );
    }

    if let Some(path) = output {
        write_daily_pnl_csv(&rows, &path)
            .with_context(|| format!("Failed to write P&L to {}", path.display()))?;
        info!("Saved {} daily P&L rows to {}", rows.len(), path.display());
    }

    Ok(())
}

fn print_trades(trades: &[TradeRecord]) {
    println!(
        "{:<12} {:<8} {:<14} {:>12} {:>12} {:>8} {:>8} {:>12} {:>9}",
        "date", "product", "signal", "spot_entry", "spot_fill", "iv", "rv", "premium", "contracts"
    );
    for t in trades {
        println!(
            "{:<12} {:<8} {:<14} {:>12.4} {:>12.4} {:>8.4} {:>8.4} {:>12.6} {:>9}",
            t.date.to_string(),
            t.product,
            t.signal.as_str(),
            t.spot_entry,
            t.spot_fill,
            t.iv,
            t.rv,
            t.premium,
            t.contracts
        );
    }
}
