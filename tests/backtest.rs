use anyhow::Result;
use backtester::interval::Interval;
use backtester::market_data::{MarketDataFile, MarketDataSource, StaticMarketData};
use backtester::models::{
    BacktestRequest, BalanceConfig, BotConfig, Candle, CandleResolution, Direction, Instrument,
    StrategyType, TradingDay,
};
use backtester::orchestrator::BacktestOrchestrator;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Once;

const TRADING_MINUTES: i64 = 10;

fn ensure_test_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn session_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap()
}

/// Flat price series of `price` across the whole 10-minute session.
fn flat_market(price: Decimal) -> Arc<dyn MarketDataSource> {
    let candles = (0..TRADING_MINUTES)
        .map(|i| Candle {
            figi: "FIGI1".to_string(),
            time: session_open() + Duration::minutes(i),
            open: price,
            close: price,
            high: price,
            low: price,
            volume: 1_000,
            resolution: CandleResolution::OneMin,
        })
        .collect();
    Arc::new(StaticMarketData::new(MarketDataFile {
        instruments: vec![Instrument {
            figi: "FIGI1".to_string(),
            currency: "rub".to_string(),
            lot_size: 1,
            exchange: "MOEX".to_string(),
            name: Some("Test instrument".to_string()),
        }],
        trading_days: HashMap::from([(
            "MOEX".to_string(),
            vec![TradingDay {
                date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                is_trading_day: true,
                start_time: Some(session_open()),
                end_time: Some(session_open() + Duration::minutes(TRADING_MINUTES)),
            }],
        )]),
        candles,
    }))
}

fn request(strategy: StrategyType, parameters: HashMap<String, f64>) -> BacktestRequest {
    BacktestRequest {
        configs: vec![BotConfig {
            account_id: "acc-1".to_string(),
            figi: "FIGI1".to_string(),
            resolution: CandleResolution::OneMin,
            commission_rate: Decimal::ZERO,
            strategy,
            parameters,
        }],
        balance: BalanceConfig {
            currency: "rub".to_string(),
            initial_amount: dec!(1000000),
            top_up: None,
        },
        interval: Interval::closed(
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap(),
        )
        .unwrap(),
    }
}

#[test]
fn conservative_run_over_flat_prices_adds_up_exactly() -> Result<()> {
    ensure_test_env();
    let orchestrator = BacktestOrchestrator::new(1)?;
    let results = orchestrator.run(
        &request(StrategyType::Conservative, HashMap::new()),
        flat_market(dec!(100)),
        None,
    )?;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.error.is_none());

    let lots: i64 = result.positions.iter().map(|p| p.lots).sum();
    assert!(lots > 0);
    assert_eq!(
        result.balances.cash,
        dec!(1000000) - Decimal::from(lots) * dec!(100)
    );
    assert_eq!(
        result.profits.absolute,
        result.balances.total - dec!(1000000)
    );
    assert_eq!(
        result.profits.relative,
        backtester::money::divide(
            result.profits.absolute,
            result.balances.weighted_average_investment
        )?
    );
    assert!(result
        .operations
        .iter()
        .all(|op| op.direction == Direction::Buy));
    assert_eq!(result.candles.len(), TRADING_MINUTES as usize);
    Ok(())
}

#[test]
fn identical_runs_produce_bit_identical_results() -> Result<()> {
    ensure_test_env();
    let orchestrator = BacktestOrchestrator::new(2)?;
    let parameters = HashMap::from([("minProfitRatio".to_string(), 0.01)]);
    let request = request(StrategyType::Reactive, parameters);

    let first = orchestrator.run(&request, flat_market(dec!(100)), None)?;
    let second = orchestrator.run(&request, flat_market(dec!(100)), None)?;

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first)?,
        serde_json::to_string(&second)?
    );
    Ok(())
}

#[test]
fn results_are_ranked_by_final_total_savings() -> Result<()> {
    ensure_test_env();
    let mut ranked = request(StrategyType::Conservative, HashMap::new());
    ranked.configs.push(BotConfig {
        account_id: "acc-2".to_string(),
        figi: "FIGI1".to_string(),
        resolution: CandleResolution::OneMin,
        // Commission drains this account relative to the first one.
        commission_rate: dec!(0.05),
        strategy: StrategyType::Conservative,
        parameters: HashMap::new(),
    });

    let orchestrator = BacktestOrchestrator::new(2)?;
    let results = orchestrator.run(&ranked, flat_market(dec!(100)), None)?;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].config.account_id, "acc-1");
    assert_eq!(results[1].config.account_id, "acc-2");
    assert!(results[0].final_total_savings() > results[1].final_total_savings());
    Ok(())
}

#[test]
fn serialized_results_are_plain_aggregates() -> Result<()> {
    ensure_test_env();
    let orchestrator = BacktestOrchestrator::new(1)?;
    let results = orchestrator.run(
        &request(StrategyType::Conservative, HashMap::new()),
        flat_market(dec!(100)),
        None,
    )?;

    let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&results)?)?;
    let first = &json[0];
    assert!(first["balances"]["total"].is_string() || first["balances"]["total"].is_number());
    assert!(first["config"]["accountId"].is_string());
    assert!(first["operations"].is_array());
    assert!(first["error"].is_null());
    Ok(())
}
