use crate::models::{BotConfig, Candle, Decision, PortfolioView, StrategyCache, StrategyType};
use anyhow::Result;

/// A trading decision function over a rolling candle window and a ledger
/// snapshot. Implementations are pure: all run-local state lives in the
/// cache threaded through every call.
pub trait Strategy {
    fn strategy_type(&self) -> StrategyType;

    /// Number of trailing candles the runner should hand to `decide`.
    fn window_size(&self) -> usize {
        1
    }

    /// Initial opaque cache, created once per run.
    fn init_cache(&self) -> StrategyCache {
        StrategyCache::None
    }

    fn decide(
        &self,
        window: &[Candle],
        portfolio: &PortfolioView,
        cache: &mut StrategyCache,
    ) -> Decision;
}

#[path = "strategies/conservative.rs"]
pub mod conservative;

pub use conservative::ConservativeStrategy;

#[path = "strategies/reactive.rs"]
pub mod reactive;

pub use reactive::ReactiveStrategy;

#[path = "strategies/ma_crossover.rs"]
pub mod ma_crossover;

pub use ma_crossover::MaCrossoverStrategy;

#[path = "strategies/trend_reversal.rs"]
pub mod trend_reversal;

pub use trend_reversal::TrendReversalStrategy;

pub fn create_strategy(config: &BotConfig) -> Result<Box<dyn Strategy + Send + Sync>> {
    match config.strategy {
        StrategyType::Conservative => Ok(Box::new(ConservativeStrategy::new())),
        StrategyType::Reactive => Ok(Box::new(ReactiveStrategy::new(&config.parameters)?)),
        StrategyType::MaCrossover => {
            Ok(Box::new(MaCrossoverStrategy::new(&config.parameters, true)?))
        }
        StrategyType::MaCrossoverStrict => {
            Ok(Box::new(MaCrossoverStrategy::new(&config.parameters, false)?))
        }
        StrategyType::TrendReversal => {
            Ok(Box::new(TrendReversalStrategy::new(&config.parameters)?))
        }
    }
}

/// Parameter names and defaults accepted by a strategy type, for help
/// output.
pub fn parameter_help(strategy: StrategyType) -> &'static [(&'static str, &'static str)] {
    match strategy {
        StrategyType::Conservative => &[],
        StrategyType::Reactive => &[("minProfitRatio", "sell threshold as a fraction, default 0.05")],
        StrategyType::MaCrossover | StrategyType::MaCrossoverStrict => &[
            ("windowSize", "candles per decision window, default 100"),
            ("shortPeriod", "short moving-average period, default 10"),
            ("longPeriod", "long moving-average period, default 30"),
            ("indexCoefficient", "lookback position within the window, 0..=1, default 1"),
            ("minProfitRatio", "sell threshold as a fraction, default 0"),
        ],
        StrategyType::TrendReversal => &[
            ("windowSize", "candles per decision window, default 20"),
            ("indexCoefficient", "lookback position within the window, 0..=1, default 0.5"),
            ("minProfitRatio", "sell threshold as a fraction, default 0"),
        ],
    }
}
