use log::warn;
use rust_decimal::prelude::*;

use crate::config::PortfolioConfig;
use crate::model::{PortfolioOptimization, PortfolioPosition, PositionAllocation, Strategy};

/// Floor applied to volatility (percent) and risk score before they divide.
const MIN_DIVISOR: f64 = 0.01;

fn equal_weights(count: usize) -> Vec<f64> {
    vec![1.0 / count as f64; count]
}

fn normalize(raw: Vec<f64>, strategy: Strategy) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        warn!("{:?} produced no usable weights, falling back to equal weight", strategy);
        return equal_weights(raw.len());
    }
    raw.into_iter().map(|weight| weight / total).collect()
}

/// Target weights as fractions summing to 1.
pub fn target_weights(positions: &[PortfolioPosition], strategy: Strategy, risk_free_rate: f64) -> Vec<f64> {
    if positions.is_empty() {
        return Vec::new();
    }

    let raw: Vec<f64> = match strategy {
        Strategy::EqualWeight => return equal_weights(positions.len()),
        Strategy::RiskParity => positions
            .iter()
            .map(|p| 1.0 / p.risk_score.max(MIN_DIVISOR))
            .collect(),
        Strategy::MaxSharpe => positions
            .iter()
            .map(|p| ((p.expected_return - risk_free_rate) / p.volatility.max(MIN_DIVISOR)).max(0.0))
            .collect(),
        Strategy::MinVariance => positions
            .iter()
            .map(|p| 1.0 / p.volatility.max(MIN_DIVISOR).powi(2))
            .collect(),
    };

    normalize(raw, strategy)
}

/// `1 - HHI` of the weights; 0 for a single position, approaching 1 when spread evenly.
pub fn diversification_score(weights: &[f64]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    (1.0 - weights.iter().map(|w| w * w).sum::<f64>()).clamp(0.0, 1.0)
}

fn neutral(positions: &[PortfolioPosition], strategy: Strategy, total_value_usd: Decimal) -> PortfolioOptimization {
    PortfolioOptimization {
        strategy,
        total_value_usd,
        positions: positions
            .iter()
            .map(|p| PositionAllocation {
                vault_identifier: p.vault_identifier.clone(),
                current_value_usd: p.current_value_usd,
                current_allocation: 0.0,
                target_allocation: 0.0,
                rebalance_amount: Decimal::ZERO,
                drift: 0.0,
            })
            .collect(),
        expected_return: 0.0,
        risk: 0.0,
        sharpe_ratio: 0.0,
        diversification_score: 0.0,
        rebalance_needed: false,
    }
}

/// Allocations are reported in percent and `rebalance_threshold` is in
/// percentage points of drift. Portfolio risk is the weight-averaged position
/// volatility, there is no covariance term.
pub fn optimize_portfolio(
    positions: &[PortfolioPosition],
    strategy: Strategy,
    rebalance_threshold: f64,
    config: &PortfolioConfig,
) -> PortfolioOptimization {
    let total_value_usd: Decimal = positions.iter().map(|p| p.current_value_usd).sum();
    if positions.is_empty() || total_value_usd <= Decimal::ZERO {
        return neutral(positions, strategy, total_value_usd);
    }

    let weights = target_weights(positions, strategy, config.risk_free_rate);

    let mut allocations = Vec::with_capacity(positions.len());
    let mut rebalance_needed = false;
    for (position, weight) in positions.iter().zip(&weights) {
        let current = (position.current_value_usd / total_value_usd).to_f64().unwrap_or(0.0);
        let target_value = Decimal::from_f64(*weight).unwrap_or(Decimal::ZERO) * total_value_usd;
        let drift = ((weight - current) * 100.0).abs();
        rebalance_needed |= drift > rebalance_threshold;

        allocations.push(PositionAllocation {
            vault_identifier: position.vault_identifier.clone(),
            current_value_usd: position.current_value_usd,
            current_allocation: current * 100.0,
            target_allocation: weight * 100.0,
            rebalance_amount: (target_value - position.current_value_usd).round_dp(2),
            drift,
        });
    }

    let expected_return: f64 = positions.iter().zip(&weights).map(|(p, w)| p.expected_return * w).sum();
    let risk: f64 = positions.iter().zip(&weights).map(|(p, w)| p.volatility * w).sum();
    let sharpe_ratio = if risk > 0.0 {
        (expected_return - config.risk_free_rate) / risk
    } else {
        0.0
    };

    PortfolioOptimization {
        strategy,
        total_value_usd,
        positions: allocations,
        expected_return,
        risk,
        sharpe_ratio,
        diversification_score: diversification_score(&weights),
        rebalance_needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn position(id: &str, value: Decimal, expected_return: f64, volatility: f64, risk_score: f64) -> PortfolioPosition {
        PortfolioPosition {
            vault_identifier: id.to_string(),
            current_value_usd: value,
            expected_return,
            volatility,
            risk_score,
        }
    }

    fn book() -> Vec<PortfolioPosition> {
        vec![
            position("a", dec!(6000), 12.0, 4.0, 20.0),
            position("b", dec!(3000), 8.0, 2.0, 40.0),
            position("c", dec!(1000), 3.0, 1.0, 80.0),
        ]
    }

    fn weights_sum_to_one(result: &PortfolioOptimization) {
        let total: f64 = result.positions.iter().map(|p| p.target_allocation).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn equal_weight_splits_evenly() {
        let result = optimize_portfolio(&book(), Strategy::EqualWeight, 5.0, &PortfolioConfig::default());
        weights_sum_to_one(&result);
        for allocation in &result.positions {
            assert_relative_eq!(allocation.target_allocation, 100.0 / 3.0, epsilon = 1e-9);
        }
        assert!(result.rebalance_needed);
        assert_eq!(result.positions[0].rebalance_amount, dec!(-2666.67));
        assert_relative_eq!(result.positions[0].drift, 60.0 - 100.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(result.diversification_score, 2.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn risk_parity_favors_low_risk_scores() {
        let result = optimize_portfolio(&book(), Strategy::RiskParity, 5.0, &PortfolioConfig::default());
        weights_sum_to_one(&result);
        // 1/20 : 1/40 : 1/80 = 4 : 2 : 1
        assert_relative_eq!(result.positions[0].target_allocation, 400.0 / 7.0, epsilon = 1e-9);
        assert_relative_eq!(result.positions[2].target_allocation, 100.0 / 7.0, epsilon = 1e-9);
    }

    #[test]
    fn max_sharpe_drops_positions_below_risk_free_rate() {
        let result = optimize_portfolio(&book(), Strategy::MaxSharpe, 5.0, &PortfolioConfig::default());
        weights_sum_to_one(&result);
        // (12-4)/4 = 2, (8-4)/2 = 2, (3-4)/1 < 0
        assert_relative_eq!(result.positions[0].target_allocation, 50.0, epsilon = 1e-9);
        assert_relative_eq!(result.positions[1].target_allocation, 50.0, epsilon = 1e-9);
        assert_eq!(result.positions[2].target_allocation, 0.0);
        assert_relative_eq!(result.expected_return, 10.0, epsilon = 1e-9);
        assert_relative_eq!(result.risk, 3.0, epsilon = 1e-9);
        assert_relative_eq!(result.sharpe_ratio, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn max_sharpe_without_excess_return_falls_back_to_equal_weight() {
        let positions = vec![
            position("a", dec!(100), 1.0, 2.0, 10.0),
            position("b", dec!(100), 2.0, 2.0, 10.0),
        ];
        let result = optimize_portfolio(&positions, Strategy::MaxSharpe, 5.0, &PortfolioConfig::default());
        assert_relative_eq!(result.positions[0].target_allocation, 50.0);
        assert!(!result.rebalance_needed);
    }

    #[test]
    fn min_variance_weights_by_inverse_variance() {
        let result = optimize_portfolio(&book(), Strategy::MinVariance, 5.0, &PortfolioConfig::default());
        weights_sum_to_one(&result);
        // 1/16 : 1/4 : 1 = 1 : 4 : 16
        assert_relative_eq!(result.positions[2].target_allocation, 1600.0 / 21.0, epsilon = 1e-9);
    }

    #[test]
    fn threshold_controls_rebalance_flag() {
        let positions = vec![
            position("a", dec!(520), 5.0, 1.0, 10.0),
            position("b", dec!(480), 5.0, 1.0, 10.0),
        ];
        let config = PortfolioConfig::default();
        assert!(!optimize_portfolio(&positions, Strategy::EqualWeight, 5.0, &config).rebalance_needed);
        assert!(optimize_portfolio(&positions, Strategy::EqualWeight, 1.0, &config).rebalance_needed);
    }

    #[test]
    fn empty_or_worthless_portfolio_is_neutral() {
        let config = PortfolioConfig::default();
        let empty = optimize_portfolio(&[], Strategy::MaxSharpe, 5.0, &config);
        assert!(empty.positions.is_empty());
        assert_eq!(empty.sharpe_ratio, 0.0);
        assert!(!empty.rebalance_needed);

        let worthless = vec![position("a", Decimal::ZERO, 5.0, 1.0, 10.0)];
        let result = optimize_portfolio(&worthless, Strategy::EqualWeight, 5.0, &config);
        assert_eq!(result.total_value_usd, Decimal::ZERO);
        assert_eq!(result.positions[0].rebalance_amount, Decimal::ZERO);
        assert_eq!(result.diversification_score, 0.0);
    }

    #[test]
    fn single_position_has_no_diversification() {
        assert_eq!(diversification_score(&[1.0]), 0.0);
        assert_relative_eq!(diversification_score(&[0.25; 4]), 0.75);
    }
}
