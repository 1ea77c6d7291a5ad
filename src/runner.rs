use crate::errors::InvalidIntervalError;
use crate::exchange::FakeExchange;
use crate::interval::Interval;
use crate::market_data::MarketDataSource;
use crate::models::{
    BackTestResult, Balances, BalanceConfig, BotConfig, Candle, Decision, Direction,
    PortfolioView, Profits,
};
use crate::money;
use crate::schedule::CronRule;
use crate::strategy::create_strategy;
use anyhow::{anyhow, ensure, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const DAYS_PER_YEAR: Decimal = dec!(365.25);

/// Drives one configuration against a fresh simulated exchange from
/// `interval.from` to `interval.to` and computes the final summary.
///
/// Everything here runs strictly sequentially and reads no wall clock, so
/// identical inputs reproduce identical results.
pub fn run_backtest(
    config: &BotConfig,
    balance: &BalanceConfig,
    interval: &Interval,
    source: &dyn MarketDataSource,
) -> Result<BackTestResult> {
    let (from, to) = interval
        .bounds()
        .ok_or_else(|| InvalidIntervalError("backtest interval must be closed".to_string()))?;

    let instrument = source.get_instrument(&config.figi)?;
    ensure!(
        instrument.lot_size > 0,
        "Instrument {} has a non-positive lot size ({})",
        config.figi,
        instrument.lot_size
    );
    ensure!(
        instrument.currency == balance.currency,
        "Instrument {} trades in {} but the balance is configured in {}",
        config.figi,
        instrument.currency,
        balance.currency
    );

    let strategy = create_strategy(config)?;
    debug!(
        "Running {} for account {} on {} over [{} .. {}]",
        strategy.strategy_type().as_str(),
        config.account_id,
        config.figi,
        from,
        to
    );
    let top_up = balance
        .top_up
        .as_ref()
        .map(|top_up| CronRule::parse(&top_up.rule).map(|rule| (rule, top_up.amount)))
        .transpose()?;

    let schedule = source.get_trading_schedule(&instrument.exchange, interval)?;
    let mut exchange = FakeExchange::init(from, &schedule).ok_or_else(|| {
        anyhow!(
            "Trading schedule for {} has no trading minutes within the interval",
            instrument.exchange
        )
    })?;
    let sim_start = exchange.now();
    exchange.add_investment(
        &config.account_id,
        sim_start,
        &balance.currency,
        balance.initial_amount,
    )?;

    let window_size = strategy.window_size();
    let mut cache = strategy.init_cache();
    let mut candle_history: Vec<Candle> = Vec::new();
    let mut prev_window_start: Option<DateTime<Utc>> = None;
    let mut prev_step = sim_start;

    loop {
        let now = exchange.now();
        if now >= to {
            break;
        }

        let visible = Interval::of(None, Some(now))?;
        let candles = source.get_candles(&config.figi, &visible, config.resolution)?;
        for candle in &candles {
            if candle_history
                .last()
                .map_or(true, |last| candle.time > last.time)
            {
                candle_history.push(candle.clone());
            }
        }
        let window = &candles[candles.len().saturating_sub(window_size)..];
        if let Some(last) = window.last() {
            exchange.update_price(&config.figi, last.close);
        }

        let window_start = window.first().map(|candle| candle.time);
        if window_start.is_some() && window_start == prev_window_start {
            debug!("No new candles at {}, skipping decision", now);
        } else if !window.is_empty() {
            let portfolio = PortfolioView {
                currency: balance.currency.clone(),
                cash: exchange.cash_balance(&config.account_id, &balance.currency),
                position: exchange.position(&config.account_id, &config.figi),
                last_price: exchange.last_price(&config.figi),
                open_orders: exchange.open_orders(&config.account_id),
                lot_size: instrument.lot_size,
                commission_rate: config.commission_rate,
            };
            match strategy.decide(window, &portfolio, &mut cache) {
                Decision::Wait => {}
                Decision::Buy { lots } => {
                    exchange.execute_market_order(
                        &config.account_id,
                        &instrument,
                        Direction::Buy,
                        lots,
                        config.commission_rate,
                    )?;
                }
                Decision::Sell { lots } => {
                    exchange.execute_market_order(
                        &config.account_id,
                        &instrument,
                        Direction::Sell,
                        lots,
                        config.commission_rate,
                    )?;
                }
            }
        }
        prev_window_start = window_start;

        if let Some((rule, amount)) = &top_up {
            for trigger in rule.trigger_instants(prev_step, now) {
                exchange.add_investment(&config.account_id, trigger, &balance.currency, *amount)?;
            }
        }
        prev_step = now;

        if exchange.advance(&schedule).is_none() {
            break;
        }
    }

    finalize(config, balance, interval, sim_start, to, &instrument.figi, instrument.lot_size, &exchange, candle_history)
}

#[allow(clippy::too_many_arguments)]
fn finalize(
    config: &BotConfig,
    balance: &BalanceConfig,
    interval: &Interval,
    sim_start: DateTime<Utc>,
    to: DateTime<Utc>,
    figi: &str,
    lot_size: i64,
    exchange: &FakeExchange,
    candle_history: Vec<Candle>,
) -> Result<BackTestResult> {
    let cash = exchange.cash_balance(&config.account_id, &balance.currency);
    let positions = exchange.positions(&config.account_id);
    let positions_value: Decimal = positions
        .iter()
        .map(|position| {
            let price = exchange
                .last_price(&position.figi)
                .unwrap_or(position.average_price);
            price * Decimal::from(position.lots) * Decimal::from(lot_size)
        })
        .sum();
    let total = cash + positions_value;

    let investments = exchange.investments(&config.account_id, &balance.currency);
    let invested: Decimal = investments.iter().map(|(_, amount)| *amount).sum();
    // The averaging runs over invested capital, so each entry carries the
    // running total up to that point, not the individual contribution.
    let mut cumulative = Vec::with_capacity(investments.len());
    let mut running = Decimal::ZERO;
    for (instant, amount) in &investments {
        running += *amount;
        cumulative.push((*instant, running));
    }
    let weighted_average_investment = money::weighted_time_average(&cumulative, sim_start, to);

    let absolute = total - invested;
    let relative = money::divide(absolute, weighted_average_investment)?;
    let years = money::divide(interval.to_days(), DAYS_PER_YEAR)?;
    let annualized = money::divide(relative, years)?;

    let operations = exchange.operations_in(&config.account_id, interval, figi);
    debug!(
        "Backtest for {} on {} finished: total {}, {} operations",
        config.strategy.as_str(),
        figi,
        total,
        operations.len()
    );

    Ok(BackTestResult {
        config: config.clone(),
        interval: *interval,
        balances: Balances {
            currency: balance.currency.clone(),
            cash,
            positions_value,
            total,
            invested,
            weighted_average_investment,
        },
        profits: Profits {
            absolute,
            relative,
            annualized,
        },
        positions,
        operations,
        candles: candle_history,
        error: None,
    })
}
