use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use smacross::api::{AlpacaClient, HistoricalDataProvider};
use smacross::backtest::{BacktestResult, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use smacross::config::Settings;
use smacross::report::{self, ConsoleSummary, HtmlChart, ReportSink};

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about = "Backtest a dual simple moving average crossover on daily stock bars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a historical backtest and reports the results.
    Backtest(BacktestArgs),

    /// Fetches daily bars from Alpaca and prints them as JSON lines.
    Bars(BarsArgs),
}

/// Flags shared by every subcommand that reads settings
#[derive(Args, Debug)]
struct CommonArgs {
    /// Settings file (TOML). Defaults to ./smacross.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stock symbol (e.g., "MSFT").
    #[arg(long)]
    symbol: Option<String>,

    /// First replayed day in YYYY-MM-DD format.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last replayed day in YYYY-MM-DD format.
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct BacktestArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Short SMA period.
    #[arg(long)]
    short: Option<usize>,

    /// Long SMA period.
    #[arg(long)]
    long: Option<usize>,

    /// Starting cash.
    #[arg(long)]
    cash: Option<f64>,

    /// Replay generated prices instead of fetching from Alpaca.
    #[arg(long, value_enum)]
    synthetic: Option<MarketScenario>,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Where to write the HTML chart.
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Skip writing the chart.
    #[arg(long)]
    no_chart: bool,

    #[arg(long)]
    hide_stock: bool,

    #[arg(long)]
    hide_account: bool,

    #[arg(long)]
    hide_trades: bool,

    /// Print the full result as JSON instead of the text summary.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct BarsArgs {
    #[command(flatten)]
    common: CommonArgs,
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest(args) => run_backtest(args).await,
        Commands::Bars(args) => print_bars(args).await,
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smacross=info"));

    // stdout carries the report and JSON output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(common: &CommonArgs) -> Result<Settings> {
    let mut settings = Settings::load(common.config.as_deref()).context("Failed to load settings")?;

    if let Some(symbol) = &common.symbol {
        settings.strategy.symbol = symbol.to_uppercase();
    }
    if let Some(start) = common.start {
        settings.strategy.start_date = start;
    }
    if let Some(end) = common.end {
        settings.strategy.end_date = end;
    }

    Ok(settings)
}

async fn run_backtest(args: BacktestArgs) -> Result<()> {
    let mut settings = load_settings(&args.common)?;

    if let Some(short) = args.short {
        settings.strategy.short_period = short;
    }
    if let Some(long) = args.long {
        settings.strategy.long_period = long;
    }
    if let Some(cash) = args.cash {
        settings.backtest.initial_cash = cash;
    }
    if let Some(chart) = args.chart {
        settings.report.chart_path = chart;
    }
    settings.report.show_stock_value &= !args.hide_stock;
    settings.report.show_account_value &= !args.hide_account;
    settings.report.show_trades &= !args.hide_trades;

    settings.validate().context("Invalid settings")?;

    let runner = BacktestRunner::new(settings.strategy.clone(), settings.backtest.clone())?;

    tracing::info!(
        "Backtesting {} SMA {}/{} from {} to {} (fetching from {})",
        settings.strategy.symbol,
        settings.strategy.short_period,
        settings.strategy.long_period,
        settings.strategy.start_date,
        settings.strategy.end_date,
        runner.warmup_start()?
    );

    let result = match args.synthetic {
        Some(scenario) => {
            tracing::info!("Using synthetic {:?} data (seed {})", scenario, args.seed);
            let provider = SyntheticDataGenerator::new(args.seed, scenario);
            replay(&runner, &provider).await?
        }
        None => {
            let provider = AlpacaClient::new(&settings.alpaca).context("Failed to create Alpaca client")?;
            replay(&runner, &provider).await?
        }
    };

    let mut summary = ConsoleSummary::stdout();
    let mut chart = HtmlChart::new(&settings.report.chart_path);

    let mut sinks: Vec<&mut dyn ReportSink> = Vec::new();
    if !args.json {
        sinks.push(&mut summary);
    }
    if !args.no_chart {
        sinks.push(&mut chart);
    }
    report::publish(&result, &settings.report, &mut sinks).context("Failed to publish report")?;

    if args.json {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, &result)?;
        writeln!(out)?;
    }

    Ok(())
}

async fn replay<P: HistoricalDataProvider>(runner: &BacktestRunner, provider: &P) -> Result<BacktestResult> {
    runner.run(provider).await.context("Backtest failed")
}

async fn print_bars(args: BarsArgs) -> Result<()> {
    let settings = load_settings(&args.common)?;
    settings.validate().context("Invalid settings")?;

    let client = AlpacaClient::new(&settings.alpaca).context("Failed to create Alpaca client")?;
    let strategy = &settings.strategy;

    let bars = client
        .get_daily_bars(&strategy.symbol, strategy.start_date, strategy.end_date)
        .await
        .with_context(|| format!("Failed to fetch bars for {}", strategy.symbol))?;

    tracing::info!("Fetched {} bars for {}", bars.len(), strategy.symbol);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for bar in &bars {
        serde_json::to_writer(&mut out, bar)?;
        writeln!(out)?;
    }

    Ok(())
}
