use crate::errors::ParameterError;
use crate::indicators::{lookback_index, window_max, window_min};
use crate::models::{Candle, Decision, PortfolioView, StrategyCache, StrategyType};
use crate::param_utils::{get_param_decimal, get_usize_param_min, require_param_in_range};
use crate::strategy_utils::{buy_or_wait, sell_or_wait};
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Lag-window extremum detector: when the open price at the lookback
/// index turns out to be the window's realized minimum the trend is
/// assumed to have reversed upward (buy); the realized maximum sells.
#[derive(Debug)]
pub struct TrendReversalStrategy {
    window_size: usize,
    index_coefficient: f64,
    min_profit_ratio: Decimal,
}

impl TrendReversalStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> Result<Self, ParameterError> {
        let window_size = get_usize_param_min(parameters, "windowSize", 20, 2);
        let index_coefficient =
            require_param_in_range(parameters, "indexCoefficient", 0.5, 0.0, 1.0)?;
        let min_profit_ratio = get_param_decimal(parameters, "minProfitRatio", Decimal::ZERO)?;
        Ok(Self {
            window_size,
            index_coefficient,
            min_profit_ratio,
        })
    }
}

impl super::Strategy for TrendReversalStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::TrendReversal
    }

    fn window_size(&self) -> usize {
        self.window_size
    }

    fn decide(
        &self,
        window: &[Candle],
        portfolio: &PortfolioView,
        _cache: &mut StrategyCache,
    ) -> Decision {
        if portfolio.open_orders > 0 {
            return Decision::Wait;
        }
        if window.len() < self.window_size {
            debug!(
                "Reversal window not filled yet: {} of {} candles",
                window.len(),
                self.window_size
            );
            return Decision::Wait;
        }

        let opens: Vec<Decimal> = window.iter().map(|candle| candle.open).collect();
        let index = lookback_index(self.index_coefficient, opens.len());
        let probe = opens[index];

        if window_min(&opens) == Some(probe) {
            buy_or_wait(portfolio)
        } else if window_max(&opens) == Some(probe) {
            sell_or_wait(portfolio, self.min_profit_ratio)
        } else {
            Decision::Wait
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandleResolution, Position};
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn candles(opens: &[i64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        opens
            .iter()
            .enumerate()
            .map(|(i, open)| Candle {
                figi: "FIGI1".to_string(),
                time: base + Duration::minutes(i as i64),
                open: Decimal::from(*open),
                close: Decimal::from(*open),
                high: Decimal::from(*open),
                low: Decimal::from(*open),
                volume: 1,
                resolution: CandleResolution::OneMin,
            })
            .collect()
    }

    fn portfolio(cash: Decimal, position: Option<Position>, price: Decimal) -> PortfolioView {
        PortfolioView {
            currency: "usd".to_string(),
            cash,
            position,
            last_price: Some(price),
            open_orders: 0,
            lot_size: 1,
            commission_rate: Decimal::ZERO,
        }
    }

    fn params(window: f64, coefficient: f64) -> HashMap<String, f64> {
        HashMap::from([
            ("windowSize".to_string(), window),
            ("indexCoefficient".to_string(), coefficient),
        ])
    }

    #[test]
    fn buys_when_lookback_price_is_the_window_minimum() {
        let strategy = TrendReversalStrategy::new(&params(5.0, 0.5)).unwrap();
        // Middle candle (index 2) is the minimum: a V-shaped reversal.
        let window = candles(&[12, 11, 9, 10, 11]);
        let view = portfolio(dec!(100), None, dec!(11));
        let mut cache = StrategyCache::None;
        assert_eq!(
            strategy.decide(&window, &view, &mut cache),
            Decision::Buy { lots: 9 }
        );
    }

    #[test]
    fn sells_when_lookback_price_is_the_window_maximum() {
        let strategy = TrendReversalStrategy::new(&params(5.0, 0.5)).unwrap();
        let window = candles(&[10, 11, 13, 12, 11]);
        let position = Position {
            figi: "FIGI1".to_string(),
            lots: 4,
            average_price: dec!(9),
            currency: "usd".to_string(),
        };
        let view = portfolio(dec!(0), Some(position), dec!(11));
        let mut cache = StrategyCache::None;
        assert_eq!(
            strategy.decide(&window, &view, &mut cache),
            Decision::Sell { lots: 4 }
        );
    }

    #[test]
    fn interior_lookback_price_waits() {
        let strategy = TrendReversalStrategy::new(&params(5.0, 0.5)).unwrap();
        let window = candles(&[9, 10, 11, 12, 13]);
        let view = portfolio(dec!(100), None, dec!(13));
        let mut cache = StrategyCache::None;
        assert_eq!(strategy.decide(&window, &view, &mut cache), Decision::Wait);
    }

    #[test]
    fn short_window_waits_for_more_candles() {
        let strategy = TrendReversalStrategy::new(&params(5.0, 0.5)).unwrap();
        let window = candles(&[9, 10]);
        let view = portfolio(dec!(100), None, dec!(10));
        let mut cache = StrategyCache::None;
        assert_eq!(strategy.decide(&window, &view, &mut cache), Decision::Wait);
    }
}
