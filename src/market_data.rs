use crate::interval::Interval;
use crate::models::{Candle, CandleResolution, Instrument, TradingDay};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Collaborator surface the core consumes. Implementations must return
/// candles in ascending time order; gaps are allowed.
pub trait MarketDataSource: Send + Sync {
    fn get_candles(
        &self,
        figi: &str,
        interval: &Interval,
        resolution: CandleResolution,
    ) -> Result<Vec<Candle>>;

    fn get_trading_schedule(&self, exchange: &str, interval: &Interval) -> Result<Vec<TradingDay>>;

    fn get_instrument(&self, figi: &str) -> Result<Instrument>;
}

/// On-disk fixture format consumed by the CLI and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataFile {
    pub instruments: Vec<Instrument>,
    pub trading_days: HashMap<String, Vec<TradingDay>>,
    pub candles: Vec<Candle>,
}

/// In-memory market data source backing deterministic runs.
pub struct StaticMarketData {
    instruments: HashMap<String, Instrument>,
    schedules: HashMap<String, Vec<TradingDay>>,
    candles: HashMap<String, Vec<Candle>>,
}

impl StaticMarketData {
    pub fn new(file: MarketDataFile) -> Self {
        let instruments = file
            .instruments
            .into_iter()
            .map(|instrument| (instrument.figi.clone(), instrument))
            .collect();

        let mut schedules = file.trading_days;
        for days in schedules.values_mut() {
            days.sort_by_key(|day| day.date);
        }

        let mut candles: HashMap<String, Vec<Candle>> = HashMap::new();
        for candle in file.candles {
            candles.entry(candle.figi.clone()).or_default().push(candle);
        }
        for series in candles.values_mut() {
            series.sort_by_key(|candle| candle.time);
        }

        Self {
            instruments,
            schedules,
            candles,
        }
    }
}

impl MarketDataSource for StaticMarketData {
    fn get_candles(
        &self,
        figi: &str,
        interval: &Interval,
        resolution: CandleResolution,
    ) -> Result<Vec<Candle>> {
        let series = self.candles.get(figi).map(Vec::as_slice).unwrap_or(&[]);
        Ok(series
            .iter()
            .filter(|candle| candle.resolution == resolution && interval.contains(candle.time))
            .cloned()
            .collect())
    }

    fn get_trading_schedule(&self, exchange: &str, interval: &Interval) -> Result<Vec<TradingDay>> {
        let days = self
            .schedules
            .get(exchange)
            .ok_or_else(|| anyhow!("No trading schedule for exchange {}", exchange))?;
        let filtered = days
            .iter()
            .filter(|day| {
                let in_from = interval
                    .from()
                    .map_or(true, |from| day.date >= from.date_naive());
                let in_to = interval.to().map_or(true, |to| day.date <= to.date_naive());
                in_from && in_to
            })
            .cloned()
            .collect();
        Ok(filtered)
    }

    fn get_instrument(&self, figi: &str) -> Result<Instrument> {
        self.instruments
            .get(figi)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown instrument {}", figi))
    }
}
