//! Yield trend and forecast from an annualized-return series.
//!
//! The predicted rate blends an OLS extrapolation `forecast_days` past the
//! last sample with an EMA of the recent samples. Confidence grows with the
//! sample count until `sample_saturation`, and is split between stability
//! (inverse coefficient of variation) and fit quality (|r|).

use log::debug;

use crate::clock::SECONDS_PER_DAY;
use crate::config::PredictionConfig;
use crate::model::{ProjectedReturn, Trend, YieldDataPoint, YieldPrediction};

const DAYS_PER_YEAR: f64 = 365.0;
/// Volatility band is quoted per 30 days and widens with sqrt(horizon).
const BAND_BASE_DAYS: f64 = 30.0;

struct Regression {
    slope: f64,
    intercept: f64,
    correlation: f64,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    let avg = mean(values);
    (values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn least_squares(xs: &[f64], ys: &[f64]) -> Regression {
    let x_mean = mean(xs);
    let y_mean = mean(ys);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - x_mean).powi(2);
        syy += (y - y_mean).powi(2);
        sxy += (x - x_mean) * (y - y_mean);
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let correlation = if sxx > 0.0 && syy > 0.0 {
        sxy / (sxx * syy).sqrt()
    } else {
        0.0
    };

    Regression {
        slope,
        intercept: y_mean - slope * x_mean,
        correlation,
    }
}

pub fn exponential_moving_average(values: &[f64], window: usize) -> Option<f64> {
    let (first, rest) = values.split_first()?;
    let alpha = 2.0 / (window.max(1) as f64 + 1.0);
    Some(rest.iter().fold(*first, |ema, value| alpha * value + (1.0 - alpha) * ema))
}

pub fn project_returns(rate: f64, volatility: f64, horizons_days: &[u32]) -> Vec<ProjectedReturn> {
    horizons_days
        .iter()
        .map(|&horizon_days| {
            let fraction = f64::from(horizon_days) / DAYS_PER_YEAR;
            let band = volatility * (f64::from(horizon_days) / BAND_BASE_DAYS).sqrt();
            ProjectedReturn {
                horizon_days,
                min: (rate - band) * fraction,
                expected: rate * fraction,
                max: (rate + band) * fraction,
            }
        })
        .collect()
}

pub fn predict_yield(history: &[YieldDataPoint], config: &PredictionConfig) -> YieldPrediction {
    let mut points = history.to_vec();
    points.sort_by_key(|point| point.timestamp);

    let current_rate = points.last().map(|point| point.annualized_return).unwrap_or(0.0);

    if points.len() < 2 {
        return YieldPrediction {
            current_rate,
            predicted_rate: current_rate,
            trend: Trend::Stable,
            confidence: 0.0,
            slope_per_day: 0.0,
            moving_average: current_rate,
            volatility: 0.0,
            sample_count: points.len(),
            projected_returns: project_returns(current_rate, 0.0, &config.horizons_days),
        };
    }

    let origin = points[0].timestamp;
    let xs: Vec<f64> = points
        .iter()
        .map(|point| (point.timestamp - origin) as f64 / SECONDS_PER_DAY as f64)
        .collect();
    let ys: Vec<f64> = points.iter().map(|point| point.annualized_return).collect();

    let fit = least_squares(&xs, &ys);
    let volatility = population_std_dev(&ys);
    let span_days = xs.last().copied().unwrap_or(0.0);

    let drift = fit.slope * span_days;
    let trend = if drift.abs() > config.trend_noise_factor * volatility {
        if drift > 0.0 {
            Trend::Increasing
        } else {
            Trend::Decreasing
        }
    } else {
        Trend::Stable
    };

    let moving_average = exponential_moving_average(&ys, config.ema_window).unwrap_or(current_rate);
    let extrapolated = fit.intercept + fit.slope * (span_days + config.forecast_days);
    let predicted_rate =
        config.regression_weight * extrapolated + (1.0 - config.regression_weight) * moving_average;

    let average = mean(&ys);
    let variation = if average.abs() > f64::EPSILON {
        volatility / average.abs()
    } else if volatility > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let sample_factor = (points.len() as f64 / config.sample_saturation.max(1) as f64).min(1.0);
    let confidence = (sample_factor
        * (config.stability_weight / (1.0 + variation) + config.trend_weight * fit.correlation.abs()))
    .clamp(0.0, 1.0);

    debug!(
        "Yield fit over {} points: slope {:.4}/day, r {:.3}, sigma {:.3}, trend {:?}",
        points.len(),
        fit.slope,
        fit.correlation,
        volatility,
        trend
    );

    YieldPrediction {
        current_rate,
        predicted_rate,
        trend,
        confidence,
        slope_per_day: fit.slope,
        moving_average,
        volatility,
        sample_count: points.len(),
        projected_returns: project_returns(predicted_rate, volatility, &config.horizons_days),
    }
}
