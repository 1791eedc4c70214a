use backtester::{BacktestEngine, BacktestResult, Decision, PriceBar, Strategy};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::{load_settings, Settings};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// The main entry point for the Stockpilot trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging, default level info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Backtest(args) => handle_backtest(args)?,
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A rule-based equity trading engine with backtesting and paper/live execution.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay historical bars through the ledger and report performance.
    Backtest(BacktestArgs),
}

#[derive(Parser)]
struct BacktestArgs {
    /// CSV of historical bars with columns: timestamp,ticker,close.
    #[arg(long)]
    data: PathBuf,

    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ==============================================================================
// Backtest Command Logic
// ==============================================================================

/// Buys every ticker on the first bar and holds to the end. A baseline to
/// sanity-check data and cost assumptions before plugging in a real strategy.
struct BuyAndHold {
    entered: bool,
}

impl Strategy for BuyAndHold {
    fn evaluate(&mut self, bar: &PriceBar) -> Vec<Decision> {
        if self.entered {
            return Vec::new();
        }
        self.entered = true;
        bar.closes
            .keys()
            .map(|ticker| Decision::Buy {
                ticker: ticker.clone(),
                atr: None,
            })
            .collect()
    }
}

fn handle_backtest(args: BacktestArgs) -> anyhow::Result<()> {
    let settings = load_settings(&args.config)?;
    let bars = backtester::load_bars_csv(&args.data)?;
    tracing::info!(
        bars = bars.len(),
        initial_capital = %settings.account.initial_capital,
        "starting backtest"
    );

    let mut engine = BacktestEngine::new(&settings);
    let mut strategy = BuyAndHold { entered: false };
    let result = engine.run(&bars, &mut strategy)?;

    print_report(&settings, &result);
    Ok(())
}

fn print_report(settings: &Settings, result: &BacktestResult) {
    let metrics = &result.metrics;
    let final_equity = result
        .equity_curve
        .last()
        .map_or(settings.account.initial_capital, |p| p.value);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Period".to_string(), format!("{} to {}", result.start.date_naive(), result.end.date_naive())]);
    table.add_row(vec!["Trading Days".to_string(), metrics.trading_days.to_string()]);
    table.add_row(vec!["Initial Capital".to_string(), format!("${}", settings.account.initial_capital)]);
    table.add_row(vec!["Final Equity".to_string(), format!("${:.2}", final_equity)]);
    table.add_row(vec!["Total Return".to_string(), format!("{:.2}%", metrics.total_return)]);
    table.add_row(vec!["Annual Return".to_string(), format!("{:.2}%", metrics.annual_return)]);
    table.add_row(vec!["Monthly Return".to_string(), format!("{:.2}%", metrics.monthly_return)]);
    table.add_row(vec!["Volatility".to_string(), format!("{:.2}%", metrics.volatility)]);
    table.add_row(vec!["Sharpe Ratio".to_string(), format!("{:.2}", metrics.sharpe_ratio)]);
    table.add_row(vec!["Sortino Ratio".to_string(), format!("{:.2}", metrics.sortino_ratio)]);
    table.add_row(vec!["Calmar Ratio".to_string(), format!("{:.2}", metrics.calmar_ratio)]);
    table.add_row(vec!["Max Drawdown".to_string(), format!("{:.2}%", metrics.max_drawdown)]);
    table.add_row(vec!["Max Drawdown Duration".to_string(), format!("{} days", metrics.max_drawdown_duration)]);
    table.add_row(vec!["Win Rate".to_string(), format!("{:.2}%", metrics.win_rate * Decimal::from(100))]);
    table.add_row(vec![
        "Profit Factor".to_string(),
        metrics
            .profit_factor
            .map_or_else(|| "inf".to_string(), |pf| format!("{pf:.2}")),
    ]);
    table.add_row(vec!["Trades".to_string(), metrics.num_trades.to_string()]);

    println!("{table}");
}
