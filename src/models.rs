use crate::interval::Interval;
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleResolution {
    OneMin,
    FiveMin,
    FifteenMin,
    Hour,
    Day,
}

/// OHLCV summary for one time bucket, as delivered by the market data feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub figi: String,
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
    pub resolution: CandleResolution,
}

/// One day of the exchange trading calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingDay {
    pub date: NaiveDate,
    pub is_trading_day: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Static instrument metadata from the instrument directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub figi: String,
    pub currency: String,
    pub lot_size: i64,
    pub exchange: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

/// Immutable record of one ledger-affecting fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub time: DateTime<Utc>,
    pub figi: String,
    pub direction: Direction,
    pub lots: i64,
    pub price: Decimal,
    pub commission: Decimal,
    pub currency: String,
}

/// An open position held on the simulated exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub figi: String,
    pub lots: i64,
    pub average_price: Decimal,
    pub currency: String,
}

/// Read-only ledger snapshot handed to a strategy at each decision step.
#[derive(Debug, Clone)]
pub struct PortfolioView {
    pub currency: String,
    pub cash: Decimal,
    pub position: Option<Position>,
    pub last_price: Option<Decimal>,
    pub open_orders: usize,
    pub lot_size: i64,
    pub commission_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Conservative,
    Reactive,
    MaCrossover,
    MaCrossoverStrict,
    TrendReversal,
}

impl StrategyType {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyType::Conservative => "conservative",
            StrategyType::Reactive => "reactive",
            StrategyType::MaCrossover => "ma_crossover",
            StrategyType::MaCrossoverStrict => "ma_crossover_strict",
            StrategyType::TrendReversal => "trend_reversal",
        }
    }

    pub fn all() -> &'static [StrategyType] {
        &[
            StrategyType::Conservative,
            StrategyType::Reactive,
            StrategyType::MaCrossover,
            StrategyType::MaCrossoverStrict,
            StrategyType::TrendReversal,
        ]
    }
}

impl FromStr for StrategyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(StrategyType::Conservative),
            "reactive" => Ok(StrategyType::Reactive),
            "ma_crossover" => Ok(StrategyType::MaCrossover),
            "ma_crossover_strict" => Ok(StrategyType::MaCrossoverStrict),
            "trend_reversal" => Ok(StrategyType::TrendReversal),
            other => Err(anyhow!("Unknown strategy type '{}'", other)),
        }
    }
}

/// Outcome of one strategy decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Wait,
    Buy { lots: i64 },
    Sell { lots: i64 },
}

/// Strategy-local state carried between successive decisions. Owned by the
/// strategy, opaque to the engine; created once per run via `init_cache`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StrategyCache {
    #[default]
    None,
    Crossover {
        last_signal_at: Option<DateTime<Utc>>,
    },
}

/// One requested backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub account_id: String,
    pub figi: String,
    pub resolution: CandleResolution,
    pub commission_rate: Decimal,
    pub strategy: StrategyType,
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

/// Scheduled balance top-up: a cron-subset rule plus the credited amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpConfig {
    pub rule: String,
    pub amount: Decimal,
}

/// Shared balance configuration applied to every run in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceConfig {
    pub currency: String,
    pub initial_amount: Decimal,
    #[serde(default)]
    pub top_up: Option<TopUpConfig>,
}

/// Final cash/position summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub currency: String,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total: Decimal,
    pub invested: Decimal,
    pub weighted_average_investment: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profits {
    pub absolute: Decimal,
    pub relative: Decimal,
    pub annualized: Decimal,
}

/// Outcome of one configuration, successful or failed. Failed runs carry
/// the error message and zeroed financial fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackTestResult {
    pub config: BotConfig,
    pub interval: Interval,
    pub balances: Balances,
    pub profits: Profits,
    pub positions: Vec<Position>,
    pub operations: Vec<Operation>,
    pub candles: Vec<Candle>,
    pub error: Option<String>,
}

impl BackTestResult {
    pub fn failed(config: BotConfig, interval: Interval, message: String) -> Self {
        Self {
            config,
            interval,
            balances: Balances::default(),
            profits: Profits::default(),
            positions: Vec::new(),
            operations: Vec::new(),
            candles: Vec::new(),
            error: Some(message),
        }
    }

    /// Ranking metric used by the orchestrator.
    pub fn final_total_savings(&self) -> Decimal {
        self.balances.total
    }
}

/// Top-level request accepted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub configs: Vec<BotConfig>,
    pub balance: BalanceConfig,
    pub interval: Interval,
}
