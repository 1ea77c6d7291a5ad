use crate::money;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Rolling simple moving average. The first `period - 1` slots are padded
/// with the first value so the output aligns index-for-index with the input.
pub fn simple_moving_average(values: &[Decimal], period: usize) -> Vec<Decimal> {
    if values.is_empty() {
        return Vec::new();
    }
    if period <= 1 || values.len() < period {
        return values.to_vec();
    }

    let mut averages = Vec::with_capacity(values.len());
    for _ in 0..period - 1 {
        averages.push(values[0]);
    }

    let divisor = Decimal::from(period);
    let mut window_sum: Decimal = values[..period].iter().copied().sum();
    averages.push(money::round_money(window_sum / divisor));
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        averages.push(money::round_money(window_sum / divisor));
    }

    averages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// Short average moved from below the long average to above it.
    Up,
    /// Short average moved from above the long average to below it.
    Down,
}

/// Detects whether the short series crosses the long one at `index`.
///
/// Exact equality on the preceding slot counts toward the crossing, so a
/// short average that touches the long one and leaves it on the other
/// side still signals; equality on `index` itself never does.
pub fn crossover_at(short: &[Decimal], long: &[Decimal], index: usize) -> Option<Crossover> {
    if index == 0 || short.len() != long.len() || index >= short.len() {
        return None;
    }
    let previous = short[index - 1].cmp(&long[index - 1]);
    let current = short[index].cmp(&long[index]);
    match (previous, current) {
        (Ordering::Less | Ordering::Equal, Ordering::Greater) => Some(Crossover::Up),
        (Ordering::Greater | Ordering::Equal, Ordering::Less) => Some(Crossover::Down),
        _ => None,
    }
}

/// Index examined for signals: `round(coefficient * (window_len - 1))`,
/// clamped into the window.
pub fn lookback_index(coefficient: f64, window_len: usize) -> usize {
    if window_len == 0 {
        return 0;
    }
    let raw = (coefficient * (window_len - 1) as f64).round();
    (raw.max(0.0) as usize).min(window_len - 1)
}

pub fn window_min(values: &[Decimal]) -> Option<Decimal> {
    values.iter().copied().min()
}

pub fn window_max(values: &[Decimal]) -> Option<Decimal> {
    values.iter().copied().max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sma_rolls_over_the_window() {
        let values = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let sma = simple_moving_average(&values, 2);
        assert_eq!(sma, vec![dec!(1), dec!(1.5), dec!(2.5), dec!(3.5), dec!(4.5)]);
    }

    #[test]
    fn sma_short_input_passes_through() {
        let values = vec![dec!(7), dec!(8)];
        assert_eq!(simple_moving_average(&values, 5), values);
    }

    #[test]
    fn crossover_up_and_down_are_detected() {
        let long = vec![dec!(10), dec!(10), dec!(10), dec!(10)];
        let rising = vec![dec!(9), dec!(9.5), dec!(10.5), dec!(11)];
        assert_eq!(crossover_at(&rising, &long, 2), Some(Crossover::Up));
        assert_eq!(crossover_at(&rising, &long, 3), None);

        let falling = vec![dec!(11), dec!(10.5), dec!(9.5), dec!(9)];
        assert_eq!(crossover_at(&falling, &long, 2), Some(Crossover::Down));
    }

    #[test]
    fn touching_the_line_counts_toward_the_crossing() {
        let long = vec![dec!(10), dec!(10), dec!(10), dec!(10)];
        let short = vec![dec!(9), dec!(10), dec!(11), dec!(10)];
        assert_eq!(crossover_at(&short, &long, 2), Some(Crossover::Up));
        // Still sitting on the line: no signal yet.
        assert_eq!(crossover_at(&short, &long, 1), None);
        // Falling back onto the line is not a cross either.
        assert_eq!(crossover_at(&short, &long, 3), None);
    }

    #[test]
    fn lookback_index_rounds_and_clamps() {
        assert_eq!(lookback_index(1.0, 10), 9);
        assert_eq!(lookback_index(0.5, 10), 5);
        assert_eq!(lookback_index(0.0, 10), 0);
        assert_eq!(lookback_index(2.0, 10), 9);
        assert_eq!(lookback_index(0.5, 0), 0);
    }
}
