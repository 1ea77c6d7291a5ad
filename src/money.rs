use crate::errors::MoneyError;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Scale every monetary value is rounded to after division or rescaling.
pub const MONEY_SCALE: u32 = 5;

/// Rounds a value to the monetary scale, half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Divides two decimals, rounding the quotient to the monetary scale.
pub fn divide(dividend: Decimal, divisor: Decimal) -> Result<Decimal, MoneyError> {
    dividend
        .checked_div(divisor)
        .map(round_money)
        .ok_or(MoneyError::DivisionByZero)
}

/// Arithmetic mean of the values. An empty slice averages to zero.
pub fn average(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().copied().sum();
    round_money(sum / Decimal::from(values.len()))
}

/// Time-weighted mean of a time-ordered value series over `[begin, end]`.
///
/// Each entry is weighted by the seconds it stayed current: from its own
/// timestamp (clamped to `begin`) until the next entry's timestamp, or until
/// `end` for the last entry. A single entry is returned as-is; when every
/// weight collapses to zero the last value wins.
pub fn weighted_time_average(
    entries: &[(DateTime<Utc>, Decimal)],
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Decimal {
    match entries {
        [] => return Decimal::ZERO,
        [(_, only)] => return *only,
        _ => {}
    }

    let mut weighted_sum = Decimal::ZERO;
    let mut total_weight = Decimal::ZERO;
    for (i, (start, value)) in entries.iter().enumerate() {
        let active_from = (*start).max(begin);
        let active_to = match entries.get(i + 1) {
            Some((next_start, _)) => *next_start,
            None => end,
        };
        let seconds = (active_to - active_from).num_seconds();
        if seconds <= 0 {
            continue;
        }
        let weight = Decimal::from(seconds);
        weighted_sum += *value * weight;
        total_weight += weight;
    }

    if total_weight.is_zero() {
        return entries
            .last()
            .map(|(_, value)| *value)
            .unwrap_or(Decimal::ZERO);
    }
    round_money(weighted_sum / total_weight)
}
