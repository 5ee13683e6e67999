use alloy_primitives::U256;
use log::warn;
use rust_decimal::prelude::*;

use super::apr::relative_change;
use crate::clock::SECONDS_PER_DAY;
use crate::config::{RiskParameters, RiskWeights};
use crate::math::u256_to_f64;
use crate::model::*;

pub const TVL_FACTOR: &str = "TVL";
pub const CONCENTRATION_FACTOR: &str = "Concentration";
pub const VOLATILITY_FACTOR: &str = "Volatility";
pub const AGE_FACTOR: &str = "Age";
pub const CURATOR_FACTOR: &str = "Curator";
pub const FEE_FACTOR: &str = "Fee";
pub const LIQUIDITY_FACTOR: &str = "Liquidity";

const MAX_SCORE: f64 = 100.0;
const SATURATED_HIGH: f64 = 95.0;
const SATURATED_LOW: f64 = 5.0;

fn factor(name: &str, score: f64, weight: f64, explanation: String, fallback: bool) -> RiskFactorScore {
    RiskFactorScore {
        factor_name: name.to_string(),
        score: score.clamp(0.0, MAX_SCORE),
        weight,
        explanation,
        fallback,
    }
}

fn days_since(timestamp: u64, now: u64) -> f64 {
    now.saturating_sub(timestamp) as f64 / SECONDS_PER_DAY as f64
}

pub fn calculate_tvl_risk(tvl_usd: Decimal, params: &RiskParameters, weight: f64) -> RiskFactorScore {
    let score = if tvl_usd <= params.tvl_floor_usd {
        SATURATED_HIGH
    } else if tvl_usd >= params.tvl_ceiling_usd {
        SATURATED_LOW
    } else {
        let tvl = tvl_usd.to_f64().unwrap_or(0.0);
        let floor = params.tvl_floor_usd.to_f64().unwrap_or(1.0);
        let ceiling = params.tvl_ceiling_usd.to_f64().unwrap_or(1.0);
        let position = (tvl / floor).ln() / (ceiling / floor).ln();
        SATURATED_HIGH - (SATURATED_HIGH - SATURATED_LOW) * position
    };

    factor(
        TVL_FACTOR,
        score,
        weight,
        format!("TVL of ${:.0}", tvl_usd.round()),
        false,
    )
}

pub fn calculate_concentration_risk(
    tvl_usd: Decimal,
    protocol_tvl_usd: Decimal,
    params: &RiskParameters,
    weight: f64,
) -> RiskFactorScore {
    if protocol_tvl_usd <= Decimal::ZERO {
        return factor(
            CONCENTRATION_FACTOR,
            params.medium_risk_default,
            weight,
            "No protocol TVL on this chain".to_string(),
            true,
        );
    }

    let share = (tvl_usd / protocol_tvl_usd).to_f64().unwrap_or(0.0) * 100.0;
    factor(
        CONCENTRATION_FACTOR,
        share,
        weight,
        format!("{:.1}% of protocol TVL on this chain", share),
        false,
    )
}

/// Population standard deviation of period-over-period price returns, as a fraction.
pub fn price_return_volatility(price_history: &[AprDataPoint]) -> Option<f64> {
    if price_history.len() < 2 {
        return None;
    }

    let returns: Vec<f64> = price_history
        .windows(2)
        .map(|pair| relative_change(pair[0].price_per_share, pair[1].price_per_share))
        .collect();

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    Some(variance.sqrt())
}

pub fn calculate_volatility_risk(
    price_history: &[AprDataPoint],
    params: &RiskParameters,
    weight: f64,
) -> RiskFactorScore {
    match price_return_volatility(price_history) {
        Some(std_dev) => {
            let pct = std_dev * 100.0;
            factor(
                VOLATILITY_FACTOR,
                pct * 10.0,
                weight,
                format!("{:.2}% std dev of period returns", pct),
                false,
            )
        }
        None => factor(
            VOLATILITY_FACTOR,
            params.medium_risk_default,
            weight,
            format!("Only {} price points", price_history.len()),
            true,
        ),
    }
}

pub fn calculate_age_risk(
    first_activity_timestamp: Option<u64>,
    now: u64,
    params: &RiskParameters,
    weight: f64,
) -> RiskFactorScore {
    let Some(first) = first_activity_timestamp else {
        return factor(AGE_FACTOR, MAX_SCORE, weight, "Unknown vault age".to_string(), true);
    };

    let age_days = days_since(first, now);
    let score = if age_days < params.young_vault_days {
        MAX_SCORE
    } else if age_days >= params.mature_vault_days {
        SATURATED_LOW
    } else {
        let progress = (age_days - params.young_vault_days) / (params.mature_vault_days - params.young_vault_days);
        MAX_SCORE - (MAX_SCORE - SATURATED_LOW) * progress
    };

    factor(
        AGE_FACTOR,
        score,
        weight,
        format!("{:.0} days since first activity", age_days),
        false,
    )
}

pub fn calculate_curator_risk(
    curator: &CuratorProfile,
    now: u64,
    params: &RiskParameters,
    weight: f64,
) -> RiskFactorScore {
    let name = curator.name.as_deref().unwrap_or("Unknown curator");
    if curator.other_vault_tvls_usd.is_empty() {
        return factor(
            CURATOR_FACTOR,
            params.new_curator_score,
            weight,
            format!("{} has no other vaults", name),
            true,
        );
    }

    let viable = curator
        .other_vault_tvls_usd
        .iter()
        .filter(|tvl| **tvl >= params.curator_min_viable_tvl_usd)
        .count();
    let success_rate = viable as f64 / curator.other_vault_tvls_usd.len() as f64;
    let tenure_days = curator
        .first_vault_timestamp
        .map(|first| days_since(first, now))
        .unwrap_or(0.0);
    let tenure = (tenure_days / params.mature_vault_days).min(1.0);

    let score = (1.0 - success_rate) * 70.0 + (1.0 - tenure) * 30.0;
    factor(
        CURATOR_FACTOR,
        score,
        weight,
        format!(
            "{}: {}/{} other vaults viable, {:.0} days tenure",
            name,
            viable,
            curator.other_vault_tvls_usd.len(),
            tenure_days
        ),
        false,
    )
}

/// Annual fee drag in percent. The performance fee only counts while the
/// price sits above the high-water mark.
pub fn annual_fee_drag(input: &RiskInput) -> f64 {
    let management = f64::from(input.management_fee_bps) / 100.0;
    let performance = if input.performance_fee_active {
        f64::from(input.performance_fee_bps) / 10_000.0 * input.gross_apr.unwrap_or(0.0).max(0.0)
    } else {
        0.0
    };
    management + performance
}

pub fn calculate_fee_risk(input: &RiskInput, params: &RiskParameters, weight: f64) -> RiskFactorScore {
    let drag = annual_fee_drag(input);
    let low = params.low_fee_drag_pct;
    let high = params.high_fee_drag_pct;

    let score = if drag <= 0.0 {
        0.0
    } else if drag <= low {
        drag / low * 20.0
    } else if drag <= high && high > low {
        20.0 + (drag - low) / (high - low) * 60.0
    } else if high > 0.0 {
        80.0 + ((drag - high) / high).min(1.0) * 20.0
    } else {
        MAX_SCORE
    };

    factor(
        FEE_FACTOR,
        score,
        weight,
        format!("{:.2}% annual fee drag", drag),
        false,
    )
}

/// Safe balance over assets waiting for settlement. `None` when nothing is pending.
pub fn liquidity_coverage(safe_asset_balance: U256, pending_assets: U256) -> Option<f64> {
    if pending_assets.is_zero() {
        return None;
    }
    Some(u256_to_f64(safe_asset_balance) / u256_to_f64(pending_assets))
}

pub fn calculate_liquidity_risk(
    safe_asset_balance: U256,
    pending_assets: U256,
    weight: f64,
) -> RiskFactorScore {
    let Some(coverage) = liquidity_coverage(safe_asset_balance, pending_assets) else {
        return factor(LIQUIDITY_FACTOR, 0.0, weight, "Nothing pending settlement".to_string(), true);
    };

    let score = if coverage >= 2.0 {
        0.0
    } else if coverage >= 1.0 {
        30.0 * (2.0 - coverage)
    } else {
        30.0 + (1.0 - coverage) * 70.0
    };

    factor(
        LIQUIDITY_FACTOR,
        score,
        weight,
        format!("Safe covers {:.2}x pending settlement", coverage),
        false,
    )
}

pub fn analyze_risk(
    input: &RiskInput,
    weights: &RiskWeights,
    params: &RiskParameters,
    now: u64,
) -> RiskAnalysis {
    let factors: Vec<RiskFactorScore> = [
        calculate_tvl_risk(input.tvl_usd, params, weights.tvl),
        calculate_concentration_risk(input.tvl_usd, input.protocol_tvl_usd, params, weights.concentration),
        calculate_volatility_risk(&input.price_history, params, weights.volatility),
        calculate_age_risk(input.first_activity_timestamp, now, params, weights.age),
        calculate_curator_risk(&input.curator, now, params, weights.curator),
        calculate_fee_risk(input, params, weights.fee),
        calculate_liquidity_risk(input.safe_asset_balance, input.pending_settlement_assets, weights.liquidity),
    ]
    .into_iter()
    .map(|mut scored| {
        if !scored.score.is_finite() {
            warn!("{} risk score is not finite, using medium default", scored.factor_name);
            scored.score = params.medium_risk_default;
            scored.fallback = true;
        }
        scored
    })
    .collect::<Vec<_>>();

    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    let weighted = if total_weight > 0.0 && total_weight.is_finite() {
        factors.iter().map(|f| f.score * f.weight).sum::<f64>() / total_weight
    } else {
        params.medium_risk_default
    };
    let overall_score = weighted.round().clamp(0.0, MAX_SCORE) as u8;
    let level = RiskLevel::from_score(overall_score);

    let summary = match factors
        .iter()
        .max_by(|a, b| (a.score * a.weight).total_cmp(&(b.score * b.weight)))
    {
        Some(top) if overall_score > 0 => format!(
            "{} risk ({}/100), largest contributor {} ({:.0})",
            level, overall_score, top.factor_name, top.score
        ),
        _ => format!("{} risk ({}/100)", level, overall_score),
    };

    RiskAnalysis {
        overall_score,
        level,
        factors,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    const NOW: u64 = 1_760_000_000;
    const DAY: u64 = SECONDS_PER_DAY;

    fn prices(values: &[u64]) -> Vec<AprDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, price)| AprDataPoint {
                timestamp: NOW - (values.len() - i) as u64 * DAY,
                price_per_share: U256::from(*price),
            })
            .collect()
    }

    fn established_vault() -> RiskInput {
        RiskInput {
            tvl_usd: dec!(50000000),
            protocol_tvl_usd: dec!(500000000),
            price_history: prices(&(0..20u64).map(|i| 1_000_000 + i * 100).collect::<Vec<u64>>()),
            first_activity_timestamp: Some(NOW - 730 * DAY),
            curator: CuratorProfile {
                name: Some("Steakhouse".to_string()),
                other_vault_tvls_usd: vec![dec!(2000000), dec!(750000), dec!(150000)],
                first_vault_timestamp: Some(NOW - 800 * DAY),
            },
            management_fee_bps: 50,
            performance_fee_bps: 1_000,
            performance_fee_active: true,
            gross_apr: Some(5.0),
            safe_asset_balance: U256::from(2_000_000u64),
            pending_settlement_assets: U256::from(1_000_000u64),
        }
    }

    fn fresh_vault() -> RiskInput {
        RiskInput {
            tvl_usd: dec!(5000),
            protocol_tvl_usd: dec!(5000),
            price_history: prices(&[1_000_000, 1_100_000, 1_000_000, 1_100_000, 1_000_000]),
            first_activity_timestamp: Some(NOW - 3 * DAY),
            curator: CuratorProfile::default(),
            management_fee_bps: 200,
            performance_fee_bps: 2_000,
            performance_fee_active: true,
            gross_apr: Some(50.0),
            safe_asset_balance: U256::from(200u64),
            pending_settlement_assets: U256::from(1_000u64),
        }
    }

    fn analyze(input: &RiskInput) -> RiskAnalysis {
        analyze_risk(input, &RiskWeights::default(), &RiskParameters::default(), NOW)
    }

    #[test]
    fn established_vault_scores_low() {
        let analysis = analyze(&established_vault());
        assert!(analysis.overall_score < 20, "score {}", analysis.overall_score);
        assert_eq!(analysis.level, RiskLevel::VeryLow);
        assert_eq!(analysis.factors.len(), 7);
        assert!(analysis.factors.iter().all(|f| !f.fallback));
        assert_relative_eq!(analysis.factor(FEE_FACTOR).unwrap().score, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn fresh_small_vault_scores_very_high() {
        let analysis = analyze(&fresh_vault());
        assert!(analysis.overall_score > 80, "score {}", analysis.overall_score);
        assert_eq!(analysis.level, RiskLevel::VeryHigh);
        assert_eq!(analysis.factor(AGE_FACTOR).unwrap().score, 100.0);
        assert_eq!(analysis.factor(CURATOR_FACTOR).unwrap().score, 60.0);
        assert!(analysis.summary.starts_with("Very High risk"));
    }

    #[test]
    fn scoring_is_deterministic() {
        let input = fresh_vault();
        assert_eq!(analyze(&input), analyze(&input));
    }

    #[test]
    fn missing_data_uses_documented_defaults() {
        let input = RiskInput {
            tvl_usd: dec!(0),
            protocol_tvl_usd: dec!(0),
            price_history: prices(&[1_000_000]),
            first_activity_timestamp: None,
            curator: CuratorProfile::default(),
            management_fee_bps: 0,
            performance_fee_bps: 0,
            performance_fee_active: false,
            gross_apr: None,
            safe_asset_balance: U256::ZERO,
            pending_settlement_assets: U256::ZERO,
        };
        let analysis = analyze(&input);

        let concentration = analysis.factor(CONCENTRATION_FACTOR).unwrap();
        assert!(concentration.fallback);
        assert_eq!(concentration.score, 50.0);
        assert_eq!(analysis.factor(VOLATILITY_FACTOR).unwrap().score, 50.0);
        assert_eq!(analysis.factor(AGE_FACTOR).unwrap().score, 100.0);
        assert_eq!(analysis.factor(LIQUIDITY_FACTOR).unwrap().score, 0.0);
        assert_eq!(analysis.factor(FEE_FACTOR).unwrap().score, 0.0);
    }

    #[test]
    fn tvl_risk_is_log_linear_between_floors() {
        let params = RiskParameters::default();
        assert_eq!(calculate_tvl_risk(dec!(1000), &params, 1.0).score, 95.0);
        assert_eq!(calculate_tvl_risk(dec!(20000000), &params, 1.0).score, 5.0);

        // geometric midpoint of $10K and $10M
        let mid = calculate_tvl_risk(dec!(316227.766), &params, 1.0).score;
        assert_relative_eq!(mid, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn age_risk_declines_linearly_after_young_period() {
        let params = RiskParameters::default();
        let young = calculate_age_risk(Some(NOW - 13 * DAY), NOW, &params, 1.0);
        assert_eq!(young.score, 100.0);

        let mid_days = (14 + 365) / 2;
        let mid = calculate_age_risk(Some(NOW - mid_days * DAY), NOW, &params, 1.0);
        assert!(mid.score > 5.0 && mid.score < 100.0);

        let old = calculate_age_risk(Some(NOW - 400 * DAY), NOW, &params, 1.0);
        assert_eq!(old.score, 5.0);
    }

    #[test]
    fn fee_drag_ignores_inactive_performance_fee() {
        let mut input = fresh_vault();
        input.performance_fee_active = false;
        assert_relative_eq!(annual_fee_drag(&input), 2.0);
        assert_relative_eq!(calculate_fee_risk(&input, &RiskParameters::default(), 1.0).score, 35.0);

        input.performance_fee_active = true;
        assert_relative_eq!(annual_fee_drag(&input), 12.0);
        assert_eq!(calculate_fee_risk(&input, &RiskParameters::default(), 1.0).score, 100.0);
    }

    #[test]
    fn liquidity_risk_rises_below_full_coverage() {
        let full = calculate_liquidity_risk(U256::from(300u64), U256::from(100u64), 1.0);
        assert_eq!(full.score, 0.0);
        let tight = calculate_liquidity_risk(U256::from(150u64), U256::from(100u64), 1.0);
        assert_relative_eq!(tight.score, 15.0);
        let short = calculate_liquidity_risk(U256::from(50u64), U256::from(100u64), 1.0);
        assert_relative_eq!(short.score, 65.0);
        assert_eq!(liquidity_coverage(U256::from(1u64), U256::ZERO), None);
    }

    #[test]
    fn curator_risk_combines_success_rate_and_tenure() {
        let params = RiskParameters::default();
        let curator = CuratorProfile {
            name: None,
            other_vault_tvls_usd: vec![dec!(500000), dec!(5000)],
            first_vault_timestamp: Some(NOW),
        };
        let score = calculate_curator_risk(&curator, NOW, &params, 1.0).score;
        assert_relative_eq!(score, 0.5 * 70.0 + 30.0);
    }

    #[test]
    fn zero_fee_band_keeps_scores_finite() {
        let mut input = fresh_vault();
        input.first_activity_timestamp = Some(NOW - DAY);
        input.management_fee_bps = 0;
        input.performance_fee_bps = 0;
        let params = RiskParameters {
            low_fee_drag_pct: 0.0,
            ..RiskParameters::default()
        };

        let fee = calculate_fee_risk(&input, &params, 1.0);
        assert_eq!(fee.score, 0.0);

        let analysis = analyze_risk(&input, &RiskWeights::default(), &params, NOW);
        assert!(analysis.factors.iter().all(|f| f.score.is_finite()));
        assert_eq!(analysis.overall_score, analyze(&input).overall_score);
        assert!(analysis.level >= RiskLevel::High, "level {:?}", analysis.level);
    }

    #[test]
    fn collapsed_fee_band_saturates_instead_of_dividing() {
        let mut input = fresh_vault();
        input.performance_fee_active = false;
        let params = RiskParameters {
            low_fee_drag_pct: 0.0,
            high_fee_drag_pct: 0.0,
            ..RiskParameters::default()
        };
        assert_eq!(calculate_fee_risk(&input, &params, 1.0).score, 100.0);
    }

    #[test]
    fn non_finite_factor_falls_back_to_medium() {
        let input = established_vault();
        let params = RiskParameters {
            mature_vault_days: f64::NAN,
            ..RiskParameters::default()
        };
        let analysis = analyze_risk(&input, &RiskWeights::default(), &params, NOW);

        let age = analysis.factor(AGE_FACTOR).unwrap();
        assert!(age.fallback);
        assert_eq!(age.score, 50.0);
        assert!(analysis.factors.iter().all(|f| f.score.is_finite()));
    }
}
