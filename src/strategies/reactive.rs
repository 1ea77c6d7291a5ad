use crate::errors::ParameterError;
use crate::models::{Candle, Decision, PortfolioView, StrategyCache, StrategyType};
use crate::param_utils::get_param_decimal;
use crate::strategy_utils::{buy_or_wait, try_sell, SellAttempt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Buys like the conservative strategy while flat; once a position is
/// held, sells the moment its unrealized profit fraction reaches
/// `minProfitRatio`, otherwise keeps buying.
#[derive(Debug)]
pub struct ReactiveStrategy {
    min_profit_ratio: Decimal,
}

impl ReactiveStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> Result<Self, ParameterError> {
        let min_profit_ratio = get_param_decimal(parameters, "minProfitRatio", dec!(0.05))?;
        if min_profit_ratio < Decimal::ZERO {
            return Err(ParameterError::new(
                "minProfitRatio",
                format!("must not be negative, got {}", min_profit_ratio),
            ));
        }
        Ok(Self { min_profit_ratio })
    }
}

impl super::Strategy for ReactiveStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Reactive
    }

    fn decide(
        &self,
        _window: &[Candle],
        portfolio: &PortfolioView,
        _cache: &mut StrategyCache,
    ) -> Decision {
        if portfolio.open_orders > 0 {
            return Decision::Wait;
        }
        match try_sell(portfolio, self.min_profit_ratio) {
            SellAttempt::Sell { lots } => Decision::Sell { lots },
            SellAttempt::NoPosition | SellAttempt::BelowThreshold => buy_or_wait(portfolio),
            SellAttempt::NoQuote => Decision::Wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use crate::strategy::Strategy;

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

    #[test]
    fn sells_once_profit_threshold_is_reached() {
        let strategy = ReactiveStrategy::new(&HashMap::new()).unwrap();
        let position = Position {
            figi: "FIGI1".to_string(),
            lots: 3,
            average_price: dec!(100),
            currency: "usd".to_string(),
        };
        let mut cache = StrategyCache::None;

        // 10% above cost: past the 5% default threshold.
        let decision = strategy.decide(
            &[],
            &portfolio(dec!(0), Some(position.clone()), dec!(110)),
            &mut cache,
        );
        assert_eq!(decision, Decision::Sell { lots: 3 });

        // Below threshold: keeps accumulating instead.
        let decision = strategy.decide(
            &[],
            &portfolio(dec!(500), Some(position), dec!(102)),
            &mut cache,
        );
        assert_eq!(decision, Decision::Buy { lots: 4 });
    }

    #[test]
    fn in_flight_order_forces_wait() {
        let strategy = ReactiveStrategy::new(&HashMap::new()).unwrap();
        let mut view = portfolio(dec!(1000), None, dec!(100));
        view.open_orders = 1;
        let mut cache = StrategyCache::None;
        assert_eq!(strategy.decide(&[], &view, &mut cache), Decision::Wait);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let params = HashMap::from([("minProfitRatio".to_string(), -0.1)]);
        assert!(ReactiveStrategy::new(&params).is_err());
    }
}
