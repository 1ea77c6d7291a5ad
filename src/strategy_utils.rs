use crate::models::{Decision, PortfolioView};
use crate::money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Cash needed to buy `lots` at `price`, commission included.
fn required_for(portfolio: &PortfolioView, price: Decimal, lots: i64) -> Decimal {
    let cost = price * Decimal::from(lots) * Decimal::from(portfolio.lot_size);
    cost + money::round_money(cost * portfolio.commission_rate)
}

/// Largest whole number of lots the portfolio can afford at `price`.
pub fn max_affordable_lots(portfolio: &PortfolioView, price: Decimal) -> i64 {
    if price <= Decimal::ZERO || portfolio.lot_size <= 0 || portfolio.cash <= Decimal::ZERO {
        return 0;
    }
    let gross_per_lot =
        price * Decimal::from(portfolio.lot_size) * (Decimal::ONE + portfolio.commission_rate);
    let mut lots = (portfolio.cash / gross_per_lot).floor().to_i64().unwrap_or(0);
    // Commission rounding can push the exact requirement past the estimate.
    while lots > 0 && required_for(portfolio, price, lots) > portfolio.cash {
        lots -= 1;
    }
    lots
}

/// BUY every affordable lot, or WAIT when none fits.
pub fn buy_or_wait(portfolio: &PortfolioView) -> Decision {
    let Some(price) = portfolio.last_price else {
        return Decision::Wait;
    };
    match max_affordable_lots(portfolio, price) {
        lots if lots > 0 => Decision::Buy { lots },
        _ => Decision::Wait,
    }
}

/// Why a sell attempt did not produce an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellAttempt {
    Sell { lots: i64 },
    NoPosition,
    BelowThreshold,
    NoQuote,
}

/// SELL the whole position when its unrealized profit fraction reaches
/// `min_profit`, otherwise report why not.
pub fn try_sell(portfolio: &PortfolioView, min_profit: Decimal) -> SellAttempt {
    let Some(position) = portfolio.position.as_ref().filter(|p| p.lots > 0) else {
        return SellAttempt::NoPosition;
    };
    let Some(price) = portfolio.last_price else {
        return SellAttempt::NoQuote;
    };
    let profit = money::divide(price - position.average_price, position.average_price)
        .unwrap_or(Decimal::ZERO);
    if profit >= min_profit {
        SellAttempt::Sell {
            lots: position.lots,
        }
    } else {
        SellAttempt::BelowThreshold
    }
}

/// SELL at the profit threshold or WAIT.
pub fn sell_or_wait(portfolio: &PortfolioView, min_profit: Decimal) -> Decision {
    match try_sell(portfolio, min_profit) {
        SellAttempt::Sell { lots } => Decision::Sell { lots },
        _ => Decision::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use rust_decimal_macros::dec;

    fn portfolio(cash: Decimal, position: Option<Position>) -> PortfolioView {
        PortfolioView {
            currency: "usd".to_string(),
            cash,
            position,
            last_price: Some(dec!(100)),
            open_orders: 0,
            lot_size: 10,
            commission_rate: dec!(0.01),
        }
    }

    fn held(lots: i64, average_price: Decimal) -> Position {
        Position {
            figi: "FIGI1".to_string(),
            lots,
            average_price,
            currency: "usd".to_string(),
        }
    }

    #[test]
    fn affordable_lots_account_for_commission() {
        // One lot costs 1000 plus 10 commission.
        let view = portfolio(dec!(1009.99), None);
        assert_eq!(max_affordable_lots(&view, dec!(100)), 0);
        let view = portfolio(dec!(1010), None);
        assert_eq!(max_affordable_lots(&view, dec!(100)), 1);
        let view = portfolio(dec!(3030), None);
        assert_eq!(max_affordable_lots(&view, dec!(100)), 3);
    }

    #[test]
    fn buy_or_wait_waits_without_cash_or_quote() {
        assert_eq!(buy_or_wait(&portfolio(dec!(1), None)), Decision::Wait);
        let mut no_quote = portfolio(dec!(100000), None);
        no_quote.last_price = None;
        assert_eq!(buy_or_wait(&no_quote), Decision::Wait);
        assert_eq!(
            buy_or_wait(&portfolio(dec!(100000), None)),
            Decision::Buy { lots: 99 }
        );
    }

    #[test]
    fn try_sell_reports_threshold_and_position_state() {
        assert_eq!(
            try_sell(&portfolio(dec!(0), None), dec!(0.05)),
            SellAttempt::NoPosition
        );
        // Bought at 96, quoted at 100: profit fraction ~0.04167.
        let view = portfolio(dec!(0), Some(held(2, dec!(96))));
        assert_eq!(try_sell(&view, dec!(0.05)), SellAttempt::BelowThreshold);
        assert_eq!(try_sell(&view, dec!(0.04)), SellAttempt::Sell { lots: 2 });
    }
}
