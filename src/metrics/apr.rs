use alloy_primitives::U256;
use log::debug;

use super::conversion::price_per_share;
use crate::clock::SECONDS_PER_DAY;
use crate::error::AnalyticsResult;
use crate::math::{mul_div, pow10, to_decimal, u256_to_f64, Rounding, WAD_DECIMALS};
use crate::model::{
    AprDataPoint, AprReferencePoints, CurrentApr, PeriodSummary, ShareScale, YieldDataPoint,
};

pub const THIRTY_DAYS_SECS: u64 = 30 * SECONDS_PER_DAY;
pub const DAYS_PER_YEAR: f64 = 365.0;

fn to_data_point(period: &PeriodSummary, scale: ShareScale) -> AnalyticsResult<AprDataPoint> {
    Ok(AprDataPoint {
        timestamp: period.timestamp,
        price_per_share: price_per_share(
            period.total_assets_at_start,
            period.total_supply_at_start,
            scale,
            Rounding::Down,
        )?,
    })
}

/// Picks the 30-day and inception reference prices out of the period history.
///
/// The 30-day reference is the latest period at or before `now - 30d`. A vault
/// younger than that falls back to its earliest period.
pub fn derive_apr_reference_points(
    periods: &[PeriodSummary],
    scale: ShareScale,
    now: u64,
) -> AnalyticsResult<AprReferencePoints> {
    let inception = match periods.iter().min_by_key(|period| period.timestamp) {
        Some(period) => period,
        None => return Ok(AprReferencePoints::default()),
    };

    let boundary = now.saturating_sub(THIRTY_DAYS_SECS);
    let thirty_day = periods
        .iter()
        .filter(|period| period.timestamp <= boundary)
        .max_by_key(|period| period.timestamp)
        .unwrap_or_else(|| {
            debug!(
                "No period summary older than 30 days (boundary {}), using inception at {}",
                boundary, inception.timestamp
            );
            inception
        });

    Ok(AprReferencePoints {
        thirty_day: Some(to_data_point(thirty_day, scale)?),
        inception: Some(to_data_point(inception, scale)?),
    })
}

/// `(new - old) / old` as a float, with the division done on WAD-scaled integers.
pub fn relative_change(old_price: U256, new_price: U256) -> f64 {
    if old_price.is_zero() {
        return 0.0;
    }

    let (negative, difference) = if new_price >= old_price {
        (false, new_price - old_price)
    } else {
        (true, old_price - new_price)
    };

    let magnitude = pow10(WAD_DECIMALS)
        .and_then(|wad| mul_div(difference, wad, old_price, Rounding::Down))
        .map(|scaled| u256_to_f64(scaled) / 1e18)
        .unwrap_or_else(|_| u256_to_f64(difference) / u256_to_f64(old_price));

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

pub fn annualized_return(old_price: U256, new_price: U256, days_elapsed: f64) -> f64 {
    if old_price.is_zero() || !(days_elapsed > 0.0) {
        return 0.0;
    }

    relative_change(old_price, new_price) * (DAYS_PER_YEAR / days_elapsed) * 100.0
}

pub fn compounded_return(old_price: U256, new_price: U256, days_elapsed: f64) -> f64 {
    if old_price.is_zero() || !(days_elapsed > 0.0) {
        return 0.0;
    }

    let growth = 1.0 + relative_change(old_price, new_price);
    if growth <= 0.0 {
        return -100.0;
    }
    (growth.powf(DAYS_PER_YEAR / days_elapsed) - 1.0) * 100.0
}

pub fn current_apr(reference_points: &AprReferencePoints, current_price: U256, now: u64) -> CurrentApr {
    let apr_since = |point: &Option<AprDataPoint>| {
        point.and_then(|point| {
            if now <= point.timestamp {
                return None;
            }
            let days = (now - point.timestamp) as f64 / SECONDS_PER_DAY as f64;
            Some(annualized_return(point.price_per_share, current_price, days))
        })
    };

    CurrentApr {
        thirty_day: apr_since(&reference_points.thirty_day),
        inception: apr_since(&reference_points.inception),
    }
}

fn sorted_by_time(periods: &[PeriodSummary]) -> Vec<&PeriodSummary> {
    let mut sorted: Vec<&PeriodSummary> = periods.iter().collect();
    sorted.sort_by_key(|period| period.timestamp);
    sorted
}

pub fn price_history(periods: &[PeriodSummary], scale: ShareScale) -> AnalyticsResult<Vec<AprDataPoint>> {
    sorted_by_time(periods)
        .into_iter()
        .map(|period| to_data_point(period, scale))
        .collect()
}

pub fn yield_history(periods: &[PeriodSummary], scale: ShareScale) -> AnalyticsResult<Vec<YieldDataPoint>> {
    let sorted = sorted_by_time(periods);
    let prices = sorted
        .iter()
        .map(|period| to_data_point(period, scale))
        .collect::<AnalyticsResult<Vec<_>>>()?;

    Ok(prices
        .windows(2)
        .zip(sorted.iter().skip(1))
        .filter(|(pair, _)| pair[1].timestamp > pair[0].timestamp)
        .map(|(pair, period)| {
            let days = (pair[1].timestamp - pair[0].timestamp) as f64 / SECONDS_PER_DAY as f64;
            YieldDataPoint {
                timestamp: pair[1].timestamp,
                annualized_return: annualized_return(pair[0].price_per_share, pair[1].price_per_share, days),
                total_value_locked: to_decimal(period.total_assets_at_start, scale.asset_decimals),
            }
        })
        .collect())
}
