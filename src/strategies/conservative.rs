use crate::models::{Candle, Decision, PortfolioView, StrategyCache, StrategyType};
use crate::strategy_utils::buy_or_wait;

/// Buys every affordable lot on every step and never sells.
#[derive(Debug, Default)]
pub struct ConservativeStrategy;

impl ConservativeStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl super::Strategy for ConservativeStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Conservative
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
        buy_or_wait(portfolio)
    }
}
