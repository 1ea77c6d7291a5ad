use crate::errors::LedgerError;
use crate::interval::Interval;
use crate::models::{Direction, Instrument, Operation, Position, TradingDay};
use crate::money;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct AccountLedger {
    cash: HashMap<String, Decimal>,
    positions: HashMap<String, Position>,
    operations: Vec<Operation>,
    investments: HashMap<String, Vec<(DateTime<Utc>, Decimal)>>,
}

/// Deterministic fake exchange: owns the simulated clock, per-account cash
/// and positions, the append-only operation history, and the last observed
/// price per instrument. Market orders fill synchronously at the last
/// known price plus commission; the clock only moves forward, along the
/// trading schedule, so operation timestamps are monotonically
/// non-decreasing by construction.
pub struct FakeExchange {
    now: DateTime<Utc>,
    accounts: HashMap<String, AccountLedger>,
    last_prices: HashMap<String, Decimal>,
}

impl FakeExchange {
    /// Positions the clock at the first trading minute not before `start`.
    /// `None` when the schedule holds no such minute.
    pub fn init(start: DateTime<Utc>, schedule: &[TradingDay]) -> Option<Self> {
        let now = first_trading_minute(schedule, start)?;
        Some(Self {
            now,
            accounts: HashMap::new(),
            last_prices: HashMap::new(),
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Moves the clock to the next trading minute. `None` when the schedule
    /// is exhausted; stopping is the caller's job, the exchange never
    /// terminates on its own.
    pub fn advance(&mut self, schedule: &[TradingDay]) -> Option<DateTime<Utc>> {
        let next = next_trading_minute(schedule, self.now)?;
        self.now = next;
        Some(next)
    }

    pub fn update_price(&mut self, figi: &str, price: Decimal) {
        self.last_prices.insert(figi.to_string(), price);
    }

    pub fn last_price(&self, figi: &str) -> Option<Decimal> {
        self.last_prices.get(figi).copied()
    }

    /// Credits cash and records the entry in the investment ledger.
    pub fn add_investment(
        &mut self,
        account_id: &str,
        instant: DateTime<Utc>,
        currency: &str,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        let ledger = self.accounts.entry(account_id.to_string()).or_default();
        *ledger.cash.entry(currency.to_string()).or_default() += amount;
        ledger
            .investments
            .entry(currency.to_string())
            .or_default()
            .push((instant, amount));
        debug!(
            "Credited {} {} to account {} at {}",
            amount, currency, account_id, instant
        );
        Ok(())
    }

    /// Fills a market order at the last known price. A failed order leaves
    /// the ledger untouched.
    pub fn execute_market_order(
        &mut self,
        account_id: &str,
        instrument: &Instrument,
        direction: Direction,
        lots: i64,
        commission_rate: Decimal,
    ) -> Result<Operation, LedgerError> {
        if lots <= 0 {
            return Err(LedgerError::NonPositiveQuantity(lots));
        }
        let price = self
            .last_price(&instrument.figi)
            .ok_or_else(|| LedgerError::MissingPrice(instrument.figi.clone()))?;

        let cost = price * Decimal::from(lots) * Decimal::from(instrument.lot_size);
        let commission = money::round_money(cost * commission_rate);
        let currency = instrument.currency.as_str();
        let ledger = self.accounts.entry(account_id.to_string()).or_default();

        match direction {
            Direction::Buy => {
                let required = cost + commission;
                let available = ledger.cash.get(currency).copied().unwrap_or_default();
                if available < required {
                    return Err(LedgerError::InsufficientBalance {
                        currency: currency.to_string(),
                        available,
                        required,
                    });
                }
                *ledger.cash.entry(currency.to_string()).or_default() -= required;

                let position = ledger
                    .positions
                    .entry(instrument.figi.clone())
                    .or_insert_with(|| Position {
                        figi: instrument.figi.clone(),
                        lots: 0,
                        average_price: Decimal::ZERO,
                        currency: currency.to_string(),
                    });
                let held = Decimal::from(position.lots);
                let bought = Decimal::from(lots);
                position.average_price = money::round_money(
                    (position.average_price * held + price * bought) / (held + bought),
                );
                position.lots += lots;
            }
            Direction::Sell => {
                let held = ledger
                    .positions
                    .get(&instrument.figi)
                    .map(|position| position.lots)
                    .unwrap_or(0);
                if lots > held {
                    return Err(LedgerError::InsufficientPosition {
                        figi: instrument.figi.clone(),
                        held,
                        requested: lots,
                    });
                }
                *ledger.cash.entry(currency.to_string()).or_default() += cost - commission;
                if lots == held {
                    ledger.positions.remove(&instrument.figi);
                } else if let Some(position) = ledger.positions.get_mut(&instrument.figi) {
                    position.lots -= lots;
                }
            }
        }

        let operation = Operation {
            time: self.now,
            figi: instrument.figi.clone(),
            direction,
            lots,
            price,
            commission,
            currency: currency.to_string(),
        };
        ledger.operations.push(operation.clone());
        debug!(
            "Filled {} {} x{} lots at {} (commission {}) for account {}",
            direction.as_str(),
            instrument.figi,
            lots,
            price,
            commission,
            account_id
        );
        Ok(operation)
    }

    pub fn cash_balance(&self, account_id: &str, currency: &str) -> Decimal {
        self.accounts
            .get(account_id)
            .and_then(|ledger| ledger.cash.get(currency))
            .copied()
            .unwrap_or_default()
    }

    pub fn position(&self, account_id: &str, figi: &str) -> Option<Position> {
        self.accounts
            .get(account_id)
            .and_then(|ledger| ledger.positions.get(figi))
            .cloned()
    }

    pub fn positions(&self, account_id: &str) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .accounts
            .get(account_id)
            .map(|ledger| ledger.positions.values().cloned().collect())
            .unwrap_or_default();
        positions.sort_by(|a, b| a.figi.cmp(&b.figi));
        positions
    }

    /// Operation history filtered to an interval and instrument.
    pub fn operations_in(
        &self,
        account_id: &str,
        interval: &Interval,
        figi: &str,
    ) -> Vec<Operation> {
        self.accounts
            .get(account_id)
            .map(|ledger| {
                ledger
                    .operations
                    .iter()
                    .filter(|op| op.figi == figi && interval.contains(op.time))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Time-ordered investment entries for one account and currency.
    pub fn investments(&self, account_id: &str, currency: &str) -> Vec<(DateTime<Utc>, Decimal)> {
        self.accounts
            .get(account_id)
            .and_then(|ledger| ledger.investments.get(currency))
            .cloned()
            .unwrap_or_default()
    }

    /// Market orders fill synchronously, so nothing is ever in flight.
    pub fn open_orders(&self, _account_id: &str) -> usize {
        0
    }
}

fn ceil_to_minute(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = instant.timestamp();
    let remainder = seconds.rem_euclid(60);
    let aligned = if remainder == 0 && instant.timestamp_subsec_nanos() == 0 {
        seconds
    } else {
        seconds - remainder + 60
    };
    DateTime::from_timestamp(aligned, 0)
}

/// First trading minute at or after `not_before` on the schedule.
fn first_trading_minute(
    schedule: &[TradingDay],
    not_before: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let candidate = ceil_to_minute(not_before)?;
    for day in schedule {
        if !day.is_trading_day {
            continue;
        }
        let (Some(start), Some(end)) = (day.start_time, day.end_time) else {
            continue;
        };
        if candidate >= end {
            continue;
        }
        if candidate < start {
            return ceil_to_minute(start);
        }
        return Some(candidate);
    }
    None
}

fn next_trading_minute(schedule: &[TradingDay], after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let after_aligned = ceil_to_minute(after)?;
    first_trading_minute(schedule, after_aligned + chrono::Duration::minutes(1))
}
