use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::alert::{check_alerts, check_simulation_alerts};
use crate::clock::to_datetime;
use crate::config::{AlertThresholds, Config};
use crate::error::AnalyticsResult;
use crate::math::{format_fixed_point, pow10, PercentageChange, Rounding};
use crate::metrics::risk::{annual_fee_drag, liquidity_coverage};
use crate::metrics::{
    analyze_risk, current_apr, derive_apr_reference_points, predict_yield, price_history, price_per_share,
    yield_history,
};
use crate::model::vault::{to_period_summaries, PeriodSummaryRecord, VaultRecord};
use crate::model::*;

/// An on-chain amount as the raw integer string next to its decimal rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountView {
    pub raw: String,
    pub formatted: String,
}

impl AmountView {
    pub fn new(value: U256, decimals: u8) -> AnalyticsResult<Self> {
        Ok(Self {
            raw: value.to_string(),
            formatted: format_fixed_point(value, i32::from(decimals))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePointView {
    pub timestamp: u64,
    pub price_per_share: AmountView,
}

impl PricePointView {
    pub fn new(point: &AprDataPoint, asset_decimals: u8) -> AnalyticsResult<Self> {
        Ok(Self {
            timestamp: point.timestamp,
            price_per_share: AmountView::new(point.price_per_share, asset_decimals)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprReferenceView {
    pub thirty_day: Option<PricePointView>,
    pub inception: Option<PricePointView>,
}

impl AprReferenceView {
    pub fn new(points: &AprReferencePoints, asset_decimals: u8) -> AnalyticsResult<Self> {
        let view = |point: &Option<AprDataPoint>| {
            point
                .as_ref()
                .map(|point| PricePointView::new(point, asset_decimals))
                .transpose()
        };
        Ok(Self {
            thirty_day: view(&points.thirty_day)?,
            inception: view(&points.inception)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub chain_id: String,
    pub chain_name: String,
    pub asset_symbol: String,
    pub curators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAnalysis {
    pub vault: VaultInfo,
    pub generated_at: DateTime<Utc>,
    pub total_assets: AmountView,
    pub total_supply: AmountView,
    pub price_per_share: AmountView,
    pub high_water_mark: AmountView,
    pub tvl_usd: Decimal,
    pub apr_reference_points: AprReferenceView,
    pub apr: CurrentApr,
    pub fee_drag: f64,
    pub liquidity_coverage: Option<f64>,
    pub risk: RiskAnalysis,
    pub yield_prediction: YieldPrediction,
    pub alerts: Vec<Alert>,
}

/// Everything fetched upstream for one vault.
pub struct AnalysisInput<'a> {
    pub vault: &'a VaultRecord,
    pub periods: &'a [PeriodSummaryRecord],
    pub chain_vaults: &'a [VaultRecord],
    pub curator_vaults: &'a [VaultRecord],
}

fn protocol_tvl(vault: &VaultRecord, chain_vaults: &[VaultRecord]) -> Decimal {
    let listed = chain_vaults
        .iter()
        .any(|other| other.address.eq_ignore_ascii_case(&vault.address));
    let others: Decimal = chain_vaults.iter().map(VaultRecord::tvl_usd).sum();
    if listed {
        others
    } else {
        others + vault.tvl_usd()
    }
}

fn curator_profile(vault: &VaultRecord, curator_vaults: &[VaultRecord]) -> CuratorProfile {
    CuratorProfile {
        name: vault.curators.first().map(|curator| curator.name.clone()),
        other_vault_tvls_usd: curator_vaults
            .iter()
            .filter(|other| !other.address.eq_ignore_ascii_case(&vault.address))
            .map(VaultRecord::tvl_usd)
            .collect(),
        first_vault_timestamp: curator_vaults
            .iter()
            .chain(std::iter::once(vault))
            .filter_map(|record| record.inception)
            .min(),
    }
}

pub fn analyze_vault(input: &AnalysisInput<'_>, config: &Config, now: u64) -> AnalyticsResult<VaultAnalysis> {
    let vault = input.vault;
    let state = vault.to_state()?;
    let scale = state.scale;
    let periods = to_period_summaries(input.periods)?;

    let price = price_per_share(state.total_assets, state.total_supply, scale, Rounding::Down)?;
    let reference_points = derive_apr_reference_points(&periods, scale, now)?;
    let apr = current_apr(&reference_points, price, now);

    let mut prices = price_history(&periods, scale)?;
    if prices.last().map_or(true, |last| last.timestamp < now) {
        prices.push(AprDataPoint {
            timestamp: now,
            price_per_share: price,
        });
    }

    let high_water_mark = if state.high_water_mark.is_zero() {
        pow10(u32::from(scale.asset_decimals))?
    } else {
        state.high_water_mark
    };

    let risk_input = RiskInput {
        tvl_usd: vault.tvl_usd(),
        protocol_tvl_usd: protocol_tvl(vault, input.chain_vaults),
        price_history: prices,
        first_activity_timestamp: vault
            .inception
            .or_else(|| periods.iter().map(|period| period.timestamp).min()),
        curator: curator_profile(vault, input.curator_vaults),
        management_fee_bps: state.management_fee_bps,
        performance_fee_bps: state.performance_fee_bps,
        performance_fee_active: price > high_water_mark,
        gross_apr: apr.thirty_day,
        safe_asset_balance: state.safe_asset_balance,
        pending_settlement_assets: state.pending_settlement.assets,
    };

    let risk = analyze_risk(&risk_input, &config.risk_weights, &config.risk_parameters, now);
    let yield_prediction = predict_yield(&yield_history(&periods, scale)?, &config.prediction);
    debug!(
        "Analyzed {} on chain {}: price {}, risk {}",
        vault.address, vault.chain.id, price, risk.overall_score
    );

    let mut analysis = VaultAnalysis {
        vault: VaultInfo {
            address: vault.address.clone(),
            name: vault.name.clone(),
            symbol: vault.symbol.clone(),
            chain_id: vault.chain.id.clone(),
            chain_name: vault.chain.name.clone(),
            asset_symbol: vault.asset.symbol.clone(),
            curators: vault.curators.iter().map(|curator| curator.name.clone()).collect(),
        },
        generated_at: to_datetime(now),
        total_assets: AmountView::new(state.total_assets, scale.asset_decimals)?,
        total_supply: AmountView::new(state.total_supply, scale.share_decimals)?,
        price_per_share: AmountView::new(price, scale.asset_decimals)?,
        high_water_mark: AmountView::new(high_water_mark, scale.asset_decimals)?,
        tvl_usd: vault.tvl_usd(),
        apr_reference_points: AprReferenceView::new(&reference_points, scale.asset_decimals)?,
        apr,
        fee_drag: annual_fee_drag(&risk_input),
        liquidity_coverage: liquidity_coverage(state.safe_asset_balance, state.pending_settlement.assets),
        risk,
        yield_prediction,
        alerts: Vec::new(),
    };
    analysis.alerts = check_alerts(&analysis, &config.alert_thresholds);

    Ok(analysis)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingView {
    pub assets: AmountView,
    pub shares: AmountView,
}

impl PendingView {
    fn new(balances: &PendingBalances, scale: ShareScale) -> AnalyticsResult<Self> {
        Ok(Self {
            assets: AmountView::new(balances.assets, scale.asset_decimals)?,
            shares: AmountView::new(balances.shares, scale.share_decimals)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementView {
    pub settled: bool,
    pub deposited_assets: AmountView,
    pub minted_shares: AmountView,
    pub redeemed_shares: AmountView,
    pub redeemed_assets: AmountView,
    pub redemption_settled: bool,
    pub deferred_redemption_shares: AmountView,
    pub remaining_pending: PendingView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub generated_at: DateTime<Utc>,
    pub total_assets: AmountView,
    pub total_supply: AmountView,
    pub price_per_share_before: AmountView,
    pub price_per_share: AmountView,
    pub price_impact: PercentageChange,
    pub price_impact_formatted: String,
    pub management_fees: AmountView,
    pub performance_fees: AmountView,
    pub total_fees: AmountView,
    pub fee_shares: AmountView,
    pub excess_returns: AmountView,
    pub high_water_mark: AmountView,
    pub high_water_mark_raised: bool,
    pub elapsed_seconds: u64,
    pub period_net_return: f64,
    pub linear_net_apr: Option<f64>,
    pub compounded_net_apr: Option<f64>,
    pub settlement: SettlementView,
    pub alerts: Vec<Alert>,
}

pub fn simulation_report(
    result: &SimulationResult,
    scale: ShareScale,
    thresholds: &AlertThresholds,
    now: u64,
) -> AnalyticsResult<SimulationReport> {
    let assets = |value: U256| AmountView::new(value, scale.asset_decimals);
    let shares = |value: U256| AmountView::new(value, scale.share_decimals);
    let settlement = &result.settlement;

    Ok(SimulationReport {
        generated_at: to_datetime(now),
        total_assets: assets(result.total_assets)?,
        total_supply: shares(result.total_supply)?,
        price_per_share_before: assets(result.price_per_share_before)?,
        price_per_share: assets(result.price_per_share)?,
        price_impact: result.price_impact,
        price_impact_formatted: result.price_impact.to_string(),
        management_fees: assets(result.management_fees)?,
        performance_fees: assets(result.performance_fees)?,
        total_fees: assets(result.total_fees())?,
        fee_shares: shares(result.fee_shares)?,
        excess_returns: assets(result.excess_returns)?,
        high_water_mark: assets(result.high_water_mark)?,
        high_water_mark_raised: result.high_water_mark_raised,
        elapsed_seconds: result.elapsed_seconds,
        period_net_return: result.period_net_return,
        linear_net_apr: result.linear_net_apr,
        compounded_net_apr: result.compounded_net_apr,
        settlement: SettlementView {
            settled: settlement.settled,
            deposited_assets: assets(settlement.deposited_assets)?,
            minted_shares: shares(settlement.minted_shares)?,
            redeemed_shares: shares(settlement.redeemed_shares)?,
            redeemed_assets: assets(settlement.redeemed_assets)?,
            redemption_settled: settlement.redemption_settled,
            deferred_redemption_shares: shares(settlement.deferred_redemption_shares)?,
            remaining_pending: PendingView::new(&settlement.remaining_pending, scale)?,
        },
        alerts: check_simulation_alerts(result, thresholds, now),
    })
}

/// One entry of a holdings file fed to the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub chain_id: String,
    pub address: String,
    pub value_usd: Decimal,
}

/// Expected return and volatility come from the yield forecast, risk from the composite score.
pub fn to_position(analysis: &VaultAnalysis, value_usd: Decimal) -> PortfolioPosition {
    PortfolioPosition {
        vault_identifier: format!("{}:{}", analysis.vault.chain_id, analysis.vault.address),
        current_value_usd: value_usd,
        expected_return: analysis.yield_prediction.predicted_rate,
        volatility: analysis.yield_prediction.volatility,
        risk_score: f64::from(analysis.risk.overall_score),
    }
}
