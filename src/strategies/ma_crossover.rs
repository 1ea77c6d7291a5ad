use crate::errors::ParameterError;
use crate::indicators::{crossover_at, lookback_index, simple_moving_average, Crossover};
use crate::models::{Candle, Decision, PortfolioView, StrategyCache, StrategyType};
use crate::param_utils::{get_param_decimal, get_usize_param_min, require_param_in_range};
use crate::strategy_utils::{buy_or_wait, try_sell, SellAttempt};
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Moving-average crossover over the window's open prices. An
/// upward cross at the lookback index buys, a downward cross sells.
///
/// The greedy variant falls back to buying when a sell is rejected by the
/// profit threshold; the strict variant waits instead. The asymmetry is
/// deliberate and covered by tests.
#[derive(Debug)]
pub struct MaCrossoverStrategy {
    window_size: usize,
    short_period: usize,
    long_period: usize,
    index_coefficient: f64,
    min_profit_ratio: Decimal,
    greedy: bool,
}

impl MaCrossoverStrategy {
    pub fn new(parameters: &HashMap<String, f64>, greedy: bool) -> Result<Self, ParameterError> {
        let window_size = get_usize_param_min(parameters, "windowSize", 100, 2);
        let short_period = get_usize_param_min(parameters, "shortPeriod", 10, 1);
        let long_period = get_usize_param_min(parameters, "longPeriod", 30, 2);
        let index_coefficient =
            require_param_in_range(parameters, "indexCoefficient", 1.0, 0.0, 1.0)?;
        let min_profit_ratio = get_param_decimal(parameters, "minProfitRatio", Decimal::ZERO)?;

        if short_period >= long_period {
            return Err(ParameterError::new(
                "shortPeriod",
                format!(
                    "must be less than longPeriod ({} >= {})",
                    short_period, long_period
                ),
            ));
        }
        if window_size < long_period {
            return Err(ParameterError::new(
                "windowSize",
                format!(
                    "must hold at least longPeriod candles ({} < {})",
                    window_size, long_period
                ),
            ));
        }

        Ok(Self {
            window_size,
            short_period,
            long_period,
            index_coefficient,
            min_profit_ratio,
            greedy,
        })
    }
}

impl super::Strategy for MaCrossoverStrategy {
    fn strategy_type(&self) -> StrategyType {
        if self.greedy {
            StrategyType::MaCrossover
        } else {
            StrategyType::MaCrossoverStrict
        }
    }

    fn window_size(&self) -> usize {
        self.window_size
    }

    fn init_cache(&self) -> StrategyCache {
        StrategyCache::Crossover {
            last_signal_at: None,
        }
    }

    fn decide(
        &self,
        window: &[Candle],
        portfolio: &PortfolioView,
        cache: &mut StrategyCache,
    ) -> Decision {
        if portfolio.open_orders > 0 {
            return Decision::Wait;
        }
        if window.len() < self.window_size {
            debug!(
                "Crossover window not filled yet: {} of {} candles",
                window.len(),
                self.window_size
            );
            return Decision::Wait;
        }

        let opens: Vec<Decimal> = window.iter().map(|candle| candle.open).collect();
        let short = simple_moving_average(&opens, self.short_period);
        let long = simple_moving_average(&opens, self.long_period);
        let index = lookback_index(self.index_coefficient, opens.len());

        let Some(direction) = crossover_at(&short, &long, index) else {
            return Decision::Wait;
        };

        // One action per crossover: the same signal candle reappears in
        // overlapping windows and must not trigger twice.
        let signal_at = window[index].time;
        if let StrategyCache::Crossover { last_signal_at } = cache {
            if *last_signal_at == Some(signal_at) {
                return Decision::Wait;
            }
            *last_signal_at = Some(signal_at);
        }

        match direction {
            Crossover::Up => buy_or_wait(portfolio),
            Crossover::Down => match try_sell(portfolio, self.min_profit_ratio) {
                SellAttempt::Sell { lots } => Decision::Sell { lots },
                SellAttempt::BelowThreshold if self.greedy => buy_or_wait(portfolio),
                _ => Decision::Wait,
            },
        }
    }
}
