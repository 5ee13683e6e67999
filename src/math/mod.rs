use alloy_primitives::{I256, U256};
use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{AnalyticsError, AnalyticsResult};

pub mod serde_u256;

pub const BPS_DENOMINATOR: u32 = 10_000;
pub const WAD_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    #[default]
    Down,
    Up,
}

pub fn pow10(exponent: u32) -> AnalyticsResult<U256> {
    U256::from(10u64)
        .checked_pow(U256::from(exponent))
        .ok_or_else(|| AnalyticsError::Overflow(format!("10^{}", exponent)))
}

/// `value * numerator / denominator` with a single rounding step.
pub fn mul_div(
    value: U256,
    numerator: U256,
    denominator: U256,
    rounding: Rounding,
) -> AnalyticsResult<U256> {
    if denominator.is_zero() {
        return Err(AnalyticsError::DivisionByZero(format!(
            "{} * {} / 0",
            value, numerator
        )));
    }

    let product = value
        .checked_mul(numerator)
        .ok_or_else(|| AnalyticsError::Overflow(format!("{} * {}", value, numerator)))?;
    let quotient = product / denominator;
    let remainder = product % denominator;

    match rounding {
        Rounding::Up if !remainder.is_zero() => quotient
            .checked_add(U256::from(1u64))
            .ok_or_else(|| AnalyticsError::Overflow("rounding up".to_string())),
        _ => Ok(quotient),
    }
}

pub fn format_fixed_point(value: U256, decimals: i32) -> AnalyticsResult<String> {
    if decimals < 0 {
        return Err(AnalyticsError::InvalidDecimals(i64::from(decimals)));
    }

    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return Ok(digits);
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;

    Ok(format!("{}.{}", &padded[..split], &padded[split..]))
}

pub fn parse_fixed_point(text: &str, decimals: i32) -> AnalyticsResult<U256> {
    if decimals < 0 {
        return Err(AnalyticsError::InvalidDecimals(i64::from(decimals)));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalyticsError::EmptyInput);
    }
    if trimmed.starts_with('-') {
        return Err(AnalyticsError::NegativeValue {
            field: "value".to_string(),
            value: trimmed.to_string(),
        });
    }

    let mut parts = trimmed.split('.');
    let integer_part = parts.next().unwrap_or_default();
    let fractional_part = parts.next();
    if parts.next().is_some() {
        return Err(AnalyticsError::MalformedDecimal(trimmed.to_string()));
    }

    if !is_digits(integer_part) {
        return Err(AnalyticsError::MalformedInteger(trimmed.to_string()));
    }

    let decimals = decimals as u32;
    let scale = pow10(decimals)?;
    let integer = parse_digits(integer_part)?
        .checked_mul(scale)
        .ok_or_else(|| AnalyticsError::Overflow(format!("parsing '{}'", trimmed)))?;

    let fraction = match fractional_part {
        None => U256::ZERO,
        Some(fraction) => {
            if !is_digits(fraction) {
                return Err(AnalyticsError::MalformedDecimal(trimmed.to_string()));
            }
            if fraction.len() > decimals as usize {
                return Err(AnalyticsError::TooManyFractionalDigits {
                    text: trimmed.to_string(),
                    decimals,
                });
            }
            let padding = pow10(decimals - fraction.len() as u32)?;
            parse_digits(fraction)?
                .checked_mul(padding)
                .ok_or_else(|| AnalyticsError::Overflow(format!("parsing '{}'", trimmed)))?
        }
    };

    integer
        .checked_add(fraction)
        .ok_or_else(|| AnalyticsError::Overflow(format!("parsing '{}'", trimmed)))
}

pub fn parse_integer(text: &str) -> AnalyticsResult<U256> {
    parse_fixed_point(text, 0)
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_digits(digits: &str) -> AnalyticsResult<U256> {
    U256::from_str_radix(digits, 10)
        .map_err(|_| AnalyticsError::Overflow(format!("'{}' does not fit in 256 bits", digits)))
}

/// Relative change scaled by 100 (two implied decimal places): 250 means 2.50%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentageChange {
    Finite(I256),
    Infinite,
}

impl PercentageChange {
    pub fn is_infinite(&self) -> bool {
        matches!(self, PercentageChange::Infinite)
    }

    pub fn as_percent(&self) -> f64 {
        match self {
            PercentageChange::Finite(scaled) => i256_to_f64(*scaled) / 100.0,
            PercentageChange::Infinite => f64::INFINITY,
        }
    }
}

impl fmt::Display for PercentageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentageChange::Infinite => write!(f, "+inf%"),
            PercentageChange::Finite(scaled) => {
                let magnitude = scaled.unsigned_abs();
                let hundred = U256::from(100u64);
                let cents = (magnitude % hundred).as_limbs()[0];
                let sign = if scaled.is_negative() { "-" } else { "+" };
                write!(f, "{}{}.{:02}%", sign, magnitude / hundred, cents)
            }
        }
    }
}

impl Serialize for PercentageChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PercentageChange::Finite(scaled) => serializer.serialize_str(&scaled.to_string()),
            PercentageChange::Infinite => serializer.serialize_str("Infinity"),
        }
    }
}

impl<'de> Deserialize<'de> for PercentageChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "Infinity" {
            return Ok(PercentageChange::Infinite);
        }
        let negative = text.starts_with('-');
        let magnitude = parse_integer(text.trim_start_matches('-')).map_err(serde::de::Error::custom)?;
        let magnitude = I256::try_from(magnitude).map_err(serde::de::Error::custom)?;
        Ok(PercentageChange::Finite(if negative { -magnitude } else { magnitude }))
    }
}

/// `(new - old) / old * 10_000`, rounded to nearest (ties away from zero).
///
/// `old == 0` has no finite answer: both zero is no change, anything else is
/// the `Infinite` sentinel.
pub fn percentage_change(old: U256, new: U256) -> AnalyticsResult<PercentageChange> {
    if old.is_zero() {
        return Ok(if new.is_zero() {
            PercentageChange::Finite(I256::ZERO)
        } else {
            PercentageChange::Infinite
        });
    }

    let (negative, difference) = if new >= old {
        (false, new - old)
    } else {
        (true, old - new)
    };

    let scaled = difference
        .checked_mul(U256::from(BPS_DENOMINATOR))
        .ok_or_else(|| AnalyticsError::Overflow("percentage change".to_string()))?;
    let mut quotient = scaled / old;
    let remainder = scaled % old;
    if remainder >= old - remainder {
        quotient += U256::from(1u64);
    }

    let magnitude = I256::try_from(quotient)
        .map_err(|_| AnalyticsError::Overflow("percentage change".to_string()))?;

    Ok(PercentageChange::Finite(if negative { -magnitude } else { magnitude }))
}

pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 18_446_744_073_709_551_616.0 + limb as f64)
}

fn i256_to_f64(value: I256) -> f64 {
    let magnitude = u256_to_f64(value.unsigned_abs());
    if value.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Token amount as a `Decimal` in whole units, falling back to a float path
/// when the value has more digits than `Decimal` holds.
pub fn to_decimal(value: U256, decimals: u8) -> Decimal {
    format_fixed_point(value, i32::from(decimals))
        .ok()
        .and_then(|text| Decimal::from_str(&text).ok())
        .or_else(|| Decimal::from_f64(u256_to_f64(value) / 10f64.powi(i32::from(decimals))))
        .unwrap_or(Decimal::MAX)
}
