use anyhow::{Context, Result};
use backtester::market_data::{MarketDataFile, MarketDataSource, StaticMarketData};
use backtester::models::{BackTestResult, BacktestRequest, StrategyType};
use backtester::orchestrator::{BacktestOrchestrator, ReportSink};
use backtester::strategy::parameter_help;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "backtester")]
#[command(about = "Deterministic strategy backtester over historical candle data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configuration in a request file against a market data fixture
    Run {
        /// Path to the backtest request (configs, balance, interval)
        #[arg(long, value_name = "PATH")]
        request: PathBuf,
        /// Path to the market data fixture (instruments, schedule, candles)
        #[arg(long = "market-data", value_name = "PATH")]
        market_data: PathBuf,
        /// Worker pool size (defaults to the number of CPUs)
        #[arg(long)]
        pool_size: Option<usize>,
        /// Write the ranked results as JSON to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// List supported strategy types and their parameters
    Strategies,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            request,
            market_data,
            pool_size,
            report,
        } => run(&request, &market_data, pool_size, report),
        Commands::Strategies => {
            list_strategies();
            Ok(())
        }
    }
}

fn run(
    request_path: &Path,
    market_data_path: &Path,
    pool_size: Option<usize>,
    report: Option<PathBuf>,
) -> Result<()> {
    let request: BacktestRequest = read_json(request_path)
        .with_context(|| format!("failed to load request from {}", request_path.display()))?;
    let market_data: MarketDataFile = read_json(market_data_path).with_context(|| {
        format!(
            "failed to load market data from {}",
            market_data_path.display()
        )
    })?;
    let source: Arc<dyn MarketDataSource> = Arc::new(StaticMarketData::new(market_data));

    let orchestrator = match pool_size {
        Some(size) => BacktestOrchestrator::new(size)?,
        None => BacktestOrchestrator::with_default_pool(),
    };
    let sink = report.map(JsonReportSink);
    let results = orchestrator.run(
        &request,
        source,
        sink.as_ref().map(|s| s as &dyn ReportSink),
    )?;

    info!("Ranked results ({} runs):", results.len());
    for (rank, result) in results.iter().enumerate() {
        match &result.error {
            Some(error) => warn!(
                "#{} {} {} on {}: FAILED: {}",
                rank + 1,
                result.config.account_id,
                result.config.strategy.as_str(),
                result.config.figi,
                error
            ),
            None => info!(
                "#{} {} {} on {}: total {} {} (absolute {}, annualized {}, {} operations)",
                rank + 1,
                result.config.account_id,
                result.config.strategy.as_str(),
                result.config.figi,
                result.balances.total,
                result.balances.currency,
                result.profits.absolute,
                result.profits.annualized,
                result.operations.len()
            ),
        }
    }
    Ok(())
}

fn list_strategies() {
    for strategy in StrategyType::all() {
        println!("{}", strategy.as_str());
        for (name, description) in parameter_help(*strategy) {
            println!("  {:<18} {}", name, description);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

struct JsonReportSink(PathBuf);

impl ReportSink for JsonReportSink {
    fn save(&self, results: &[BackTestResult]) -> Result<()> {
        let json = serde_json::to_string_pretty(results)?;
        fs::write(&self.0, json)
            .with_context(|| format!("failed to write report to {}", self.0.display()))?;
        info!("Report written to {}", self.0.display());
        Ok(())
    }
}
