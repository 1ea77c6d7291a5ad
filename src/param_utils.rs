use crate::errors::ParameterError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Extract a parameter as usize with a minimum value
pub fn get_usize_param_min(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| v.round().max(min as f64) as usize)
        .unwrap_or(default)
}

/// Extract a parameter as a decimal ratio, rejecting non-finite values
pub fn get_param_decimal(
    params: &HashMap<String, f64>,
    key: &str,
    default: Decimal,
) -> Result<Decimal, ParameterError> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) => Decimal::try_from(*raw)
            .map_err(|_| ParameterError::new(key, format!("not representable as decimal: {}", raw))),
    }
}

/// Require a finite parameter within inclusive bounds
pub fn require_param_in_range(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> Result<f64, ParameterError> {
    let value = params.get(key).copied().unwrap_or(default);
    if !value.is_finite() {
        return Err(ParameterError::new(key, format!("must be finite, got {}", value)));
    }
    if value < min || value > max {
        return Err(ParameterError::new(
            key,
            format!("must be within [{}, {}], got {}", min, max, value),
        ));
    }
    Ok(value)
}
