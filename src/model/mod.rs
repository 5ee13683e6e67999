pub mod vault;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::math::PercentageChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareScale {
    pub share_decimals: u8,
    pub asset_decimals: u8,
}

impl ShareScale {
    pub fn new(share_decimals: u8, asset_decimals: u8) -> Self {
        Self {
            share_decimals,
            asset_decimals,
        }
    }

    pub fn decimals_offset(&self) -> i32 {
        i32::from(self.share_decimals) - i32::from(self.asset_decimals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBalances {
    #[serde(with = "crate::math::serde_u256")]
    pub assets: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub shares: U256,
}

impl PendingBalances {
    pub fn new(assets: U256, shares: U256) -> Self {
        Self { assets, shares }
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_zero() && self.shares.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultState {
    #[serde(with = "crate::math::serde_u256")]
    pub total_assets: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub total_supply: U256,
    pub scale: ShareScale,
    #[serde(with = "crate::math::serde_u256")]
    pub high_water_mark: U256,
    pub last_fee_timestamp: u64,
    pub management_fee_bps: u32,
    pub performance_fee_bps: u32,
    #[serde(with = "crate::math::serde_u256")]
    pub safe_asset_balance: U256,
    pub pending_silo_balances: PendingBalances,
    pub pending_settlement: PendingBalances,
}

impl VaultState {
    pub fn decimals_offset(&self) -> i32 {
        self.scale.decimals_offset()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub timestamp: u64,
    #[serde(with = "crate::math::serde_u256")]
    pub total_assets_at_start: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub total_supply_at_start: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprDataPoint {
    pub timestamp: u64,
    #[serde(with = "crate::math::serde_u256")]
    pub price_per_share: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprReferencePoints {
    pub thirty_day: Option<AprDataPoint>,
    pub inception: Option<AprDataPoint>,
}

impl AprReferencePoints {
    pub fn is_empty(&self) -> bool {
        self.thirty_day.is_none() && self.inception.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentApr {
    pub thirty_day: Option<f64>,
    pub inception: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    #[serde(with = "crate::math::serde_u256")]
    pub new_total_assets: U256,
    #[serde(default)]
    pub pending_silo_balances: Option<PendingBalances>,
    #[serde(default)]
    pub pending_settlement: Option<PendingBalances>,
    #[serde(default, with = "crate::math::serde_u256::option")]
    pub safe_asset_balance: Option<U256>,
    #[serde(default)]
    pub settle_deposit: bool,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl SimulationInput {
    pub fn new(new_total_assets: U256) -> Self {
        Self {
            new_total_assets,
            pending_silo_balances: None,
            pending_settlement: None,
            safe_asset_balance: None,
            settle_deposit: false,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementOutcome {
    pub settled: bool,
    #[serde(with = "crate::math::serde_u256")]
    pub deposited_assets: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub minted_shares: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub redeemed_shares: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub redeemed_assets: U256,
    pub redemption_settled: bool,
    #[serde(with = "crate::math::serde_u256")]
    pub deferred_redemption_shares: U256,
    pub remaining_pending: PendingBalances,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    #[serde(with = "crate::math::serde_u256")]
    pub total_assets: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub total_supply: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub price_per_share_before: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub price_per_share: U256,
    pub price_impact: PercentageChange,
    #[serde(with = "crate::math::serde_u256")]
    pub management_fees: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub performance_fees: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub fee_shares: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub excess_returns: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub high_water_mark: U256,
    pub high_water_mark_raised: bool,
    pub elapsed_seconds: u64,
    pub period_net_return: f64,
    pub linear_net_apr: Option<f64>,
    pub compounded_net_apr: Option<f64>,
    pub settlement: SettlementOutcome,
}

impl SimulationResult {
    pub fn total_fees(&self) -> U256 {
        self.management_fees + self.performance_fees
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=19 => RiskLevel::VeryLow,
            20..=39 => RiskLevel::Low,
            40..=59 => RiskLevel::Medium,
            60..=80 => RiskLevel::High,
            _ => RiskLevel::VeryHigh,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactorScore {
    pub factor_name: String,
    pub score: f64,
    pub weight: f64,
    pub explanation: String,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub overall_score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactorScore>,
    pub summary: String,
}

impl RiskAnalysis {
    pub fn factor(&self, name: &str) -> Option<&RiskFactorScore> {
        self.factors.iter().find(|factor| factor.factor_name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratorProfile {
    pub name: Option<String>,
    pub other_vault_tvls_usd: Vec<Decimal>,
    pub first_vault_timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInput {
    pub tvl_usd: Decimal,
    pub protocol_tvl_usd: Decimal,
    pub price_history: Vec<AprDataPoint>,
    pub first_activity_timestamp: Option<u64>,
    pub curator: CuratorProfile,
    pub management_fee_bps: u32,
    pub performance_fee_bps: u32,
    pub performance_fee_active: bool,
    pub gross_apr: Option<f64>,
    #[serde(with = "crate::math::serde_u256")]
    pub safe_asset_balance: U256,
    #[serde(with = "crate::math::serde_u256")]
    pub pending_settlement_assets: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldDataPoint {
    pub timestamp: u64,
    pub annualized_return: f64,
    pub total_value_locked: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedReturn {
    pub horizon_days: u32,
    pub min: f64,
    pub expected: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldPrediction {
    pub current_rate: f64,
    pub predicted_rate: f64,
    pub trend: Trend,
    pub confidence: f64,
    pub slope_per_day: f64,
    pub moving_average: f64,
    pub volatility: f64,
    pub sample_count: usize,
    pub projected_returns: Vec<ProjectedReturn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    EqualWeight,
    RiskParity,
    MaxSharpe,
    MinVariance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub vault_identifier: String,
    pub current_value_usd: Decimal,
    /// Annualized, in percent.
    pub expected_return: f64,
    /// Annualized, in percent.
    pub volatility: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAllocation {
    pub vault_identifier: String,
    pub current_value_usd: Decimal,
    pub current_allocation: f64,
    pub target_allocation: f64,
    pub rebalance_amount: Decimal,
    /// Absolute drift in percentage points.
    pub drift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioOptimization {
    pub strategy: Strategy,
    pub total_value_usd: Decimal,
    pub positions: Vec<PositionAllocation>,
    pub expected_return: f64,
    pub risk: f64,
    pub sharpe_ratio: f64,
    pub diversification_score: f64,
    pub rebalance_needed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub threshold: f64,
}
