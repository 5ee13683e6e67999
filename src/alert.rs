use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::to_datetime;
use crate::config::AlertThresholds;
use crate::math::u256_to_f64;
use crate::model::{Alert, AlertLevel, SimulationResult, Trend};
use crate::report::VaultAnalysis;

pub fn check_alerts(analysis: &VaultAnalysis, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let at = analysis.generated_at;

    let score = analysis.risk.overall_score;
    if score >= thresholds.risk_score_critical {
        alerts.push(create_alert(
            AlertLevel::Critical,
            "Risk Score".to_string(),
            format!("{} risk: {}", analysis.risk.level, analysis.risk.summary),
            f64::from(score),
            f64::from(thresholds.risk_score_critical),
            at,
        ));
    } else if score >= thresholds.risk_score_warning {
        alerts.push(create_alert(
            AlertLevel::Warning,
            "Risk Score".to_string(),
            format!("Elevated risk: {}", analysis.risk.summary),
            f64::from(score),
            f64::from(thresholds.risk_score_warning),
            at,
        ));
    }

    if let Some(coverage) = analysis.liquidity_coverage {
        if coverage < thresholds.min_liquidity_coverage {
            let level = if coverage < thresholds.min_liquidity_coverage / 2.0 {
                AlertLevel::Critical
            } else {
                AlertLevel::Warning
            };
            alerts.push(create_alert(
                level,
                "Liquidity Coverage".to_string(),
                format!("Safe covers only {:.2}x of pending settlement", coverage),
                coverage,
                thresholds.min_liquidity_coverage,
                at,
            ));
        }
    }

    if analysis.fee_drag > thresholds.fee_drag_warning {
        alerts.push(create_alert(
            AlertLevel::Warning,
            "Fee Drag".to_string(),
            format!("Annual fee drag of {:.2}%", analysis.fee_drag),
            analysis.fee_drag,
            thresholds.fee_drag_warning,
            at,
        ));
    }

    let prediction = &analysis.yield_prediction;
    if prediction.trend == Trend::Decreasing && prediction.confidence >= thresholds.trend_confidence {
        alerts.push(create_alert(
            AlertLevel::Info,
            "Yield Trend".to_string(),
            format!(
                "Yield trending down: {:.2}% now, {:.2}% predicted ({:.0}% confidence)",
                prediction.current_rate,
                prediction.predicted_rate,
                prediction.confidence * 100.0
            ),
            prediction.confidence,
            thresholds.trend_confidence,
            at,
        ));
    }

    alerts
}

pub fn check_simulation_alerts(result: &SimulationResult, thresholds: &AlertThresholds, now: u64) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let at = to_datetime(now);

    let impact = result.price_impact.as_percent();
    if impact.abs() >= thresholds.price_impact_warning {
        alerts.push(create_alert(
            AlertLevel::Warning,
            "Price Impact".to_string(),
            format!("Simulated price per share moves {}", result.price_impact),
            impact,
            thresholds.price_impact_warning,
            at,
        ));
    }

    let deferred = result.settlement.deferred_redemption_shares;
    if !deferred.is_zero() {
        alerts.push(create_alert(
            AlertLevel::Warning,
            "Redemption".to_string(),
            format!("Redemption of {} shares exceeds available liquidity and stays queued", deferred),
            u256_to_f64(deferred),
            0.0,
            at,
        ));
    }

    alerts
}

fn create_alert(
    level: AlertLevel,
    metric: String,
    message: String,
    value: f64,
    threshold: f64,
    timestamp: DateTime<Utc>,
) -> Alert {
    Alert {
        id: Uuid::new_v4().to_string(),
        level,
        metric,
        message,
        timestamp,
        value,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::snapshot::tests::SNAPSHOT_JSON;
    use crate::api::snapshot::Snapshot;
    use crate::config::Config;
    use crate::math::PercentageChange;
    use crate::metrics::simulation::simulate_at;
    use crate::model::{PendingBalances, RiskLevel, SimulationInput};
    use crate::report::{analyze_vault, AnalysisInput};
    use alloy_primitives::{I256, U256};

    const NOW: u64 = 1_700_000_000 + 45 * 86_400;

    fn quiet_analysis() -> VaultAnalysis {
        let snapshot: Snapshot = serde_json::from_str(SNAPSHOT_JSON).unwrap();
        let input = AnalysisInput {
            vault: &snapshot.vaults[0],
            periods: &[],
            chain_vaults: &[],
            curator_vaults: &[],
        };
        let mut analysis = analyze_vault(&input, &Config::default(), NOW).unwrap();
        analysis.risk.overall_score = 10;
        analysis.liquidity_coverage = None;
        analysis.fee_drag = 0.5;
        analysis.yield_prediction.trend = Trend::Stable;
        analysis
    }

    #[test]
    fn quiet_vault_raises_nothing() {
        assert!(check_alerts(&quiet_analysis(), &AlertThresholds::default()).is_empty());
    }

    #[test]
    fn risk_score_maps_to_alert_level() {
        let mut analysis = quiet_analysis();
        analysis.risk.overall_score = 65;
        analysis.risk.level = RiskLevel::High;
        let alerts = check_alerts(&analysis, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);

        analysis.risk.overall_score = 85;
        let alerts = check_alerts(&analysis, &AlertThresholds::default());
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].threshold, 80.0);
    }

    #[test]
    fn thin_liquidity_and_fee_drag_are_flagged() {
        let mut analysis = quiet_analysis();
        analysis.liquidity_coverage = Some(0.4);
        analysis.fee_drag = 4.0;
        let alerts = check_alerts(&analysis, &AlertThresholds::default());

        let metrics: Vec<&str> = alerts.iter().map(|alert| alert.metric.as_str()).collect();
        assert_eq!(metrics, vec!["Liquidity Coverage", "Fee Drag"]);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_ne!(alerts[0].id, alerts[1].id);
    }

    #[test]
    fn alerts_are_stamped_with_the_analysis_time() {
        let mut analysis = quiet_analysis();
        analysis.fee_drag = 4.0;
        let first = check_alerts(&analysis, &AlertThresholds::default());
        let second = check_alerts(&analysis, &AlertThresholds::default());

        assert_eq!(first[0].timestamp, analysis.generated_at);
        assert_eq!(first[0].timestamp.timestamp(), NOW as i64);
        assert_eq!(first[0].timestamp, second[0].timestamp);
    }

    #[test]
    fn confident_downtrend_is_reported() {
        let mut analysis = quiet_analysis();
        analysis.yield_prediction.trend = Trend::Decreasing;
        analysis.yield_prediction.confidence = 0.4;
        assert!(check_alerts(&analysis, &AlertThresholds::default()).is_empty());

        analysis.yield_prediction.confidence = 0.6;
        let alerts = check_alerts(&analysis, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, "Yield Trend");
    }

    #[test]
    fn simulation_alerts_cover_impact_and_queued_redemptions() {
        let snapshot: Snapshot = serde_json::from_str(SNAPSHOT_JSON).unwrap();
        let mut state = snapshot.vaults[0].to_state().unwrap();
        state.management_fee_bps = 0;
        state.performance_fee_bps = 0;
        state.safe_asset_balance = U256::ZERO;
        state.pending_settlement = PendingBalances::new(U256::ZERO, U256::from(10u64).pow(U256::from(20u64)));

        let mut input = SimulationInput::new(U256::from(1_100_000_000u64));
        input.settle_deposit = true;
        let result = simulate_at(&state, &input, state.last_fee_timestamp).unwrap();
        assert_eq!(result.price_impact, PercentageChange::Finite(I256::try_from(1_000i64).unwrap()));

        let alerts = check_simulation_alerts(&result, &AlertThresholds::default(), NOW);
        let metrics: Vec<&str> = alerts.iter().map(|alert| alert.metric.as_str()).collect();
        assert_eq!(metrics, vec!["Price Impact", "Redemption"]);
        assert!(alerts.iter().all(|alert| alert.timestamp.timestamp() == NOW as i64));
    }
}
