use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PendingBalances, PeriodSummary, ShareScale, VaultState};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::math::{parse_integer, BPS_DENOMINATOR};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inception: Option<u64>,
    pub asset: AssetRecord,
    pub chain: ChainRecord,
    pub state: VaultStateRecord,
    #[serde(default)]
    pub curators: Vec<CuratorRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratorRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBalancesRecord {
    pub assets: String,
    pub shares: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStateRecord {
    pub total_supply: String,
    pub total_assets: String,
    #[serde(default)]
    pub total_assets_usd: Decimal,
    pub high_water_mark: String,
    pub last_fee_time: String,
    pub management_fee: String,
    pub performance_fee: String,
    pub safe_asset_balance: String,
    pub pending_silo_balances: PendingBalancesRecord,
    pub pending_settlement: PendingBalancesRecord,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummaryRecord {
    pub timestamp: String,
    pub total_assets_at_start: String,
    pub total_supply_at_start: String,
}

impl VaultRecord {
    pub fn scale(&self) -> ShareScale {
        ShareScale::new(self.decimals, self.asset.decimals)
    }

    pub fn tvl_usd(&self) -> Decimal {
        self.state.total_assets_usd
    }

    pub fn curator_ids(&self) -> impl Iterator<Item = &str> {
        self.curators.iter().map(|curator| curator.id.as_str())
    }

    pub fn to_state(&self) -> AnalyticsResult<VaultState> {
        let state = &self.state;
        Ok(VaultState {
            total_assets: parse_field("totalAssets", &state.total_assets)?,
            total_supply: parse_field("totalSupply", &state.total_supply)?,
            scale: self.scale(),
            high_water_mark: parse_field("highWaterMark", &state.high_water_mark)?,
            last_fee_timestamp: parse_timestamp("lastFeeTime", &state.last_fee_time)?,
            management_fee_bps: parse_rate("managementFee", &state.management_fee)?,
            performance_fee_bps: parse_rate("performanceFee", &state.performance_fee)?,
            safe_asset_balance: parse_field("safeAssetBalance", &state.safe_asset_balance)?,
            pending_silo_balances: state.pending_silo_balances.to_balances("pendingSiloBalances")?,
            pending_settlement: state.pending_settlement.to_balances("pendingSettlement")?,
        })
    }
}

impl PendingBalancesRecord {
    fn to_balances(&self, field: &str) -> AnalyticsResult<PendingBalances> {
        Ok(PendingBalances::new(
            parse_field(&format!("{}.assets", field), &self.assets)?,
            parse_field(&format!("{}.shares", field), &self.shares)?,
        ))
    }
}

impl TryFrom<&PeriodSummaryRecord> for PeriodSummary {
    type Error = AnalyticsError;

    fn try_from(record: &PeriodSummaryRecord) -> AnalyticsResult<Self> {
        Ok(PeriodSummary {
            timestamp: parse_timestamp("timestamp", &record.timestamp)?,
            total_assets_at_start: parse_field("totalAssetsAtStart", &record.total_assets_at_start)?,
            total_supply_at_start: parse_field("totalSupplyAtStart", &record.total_supply_at_start)?,
        })
    }
}

pub fn to_period_summaries(records: &[PeriodSummaryRecord]) -> AnalyticsResult<Vec<PeriodSummary>> {
    records.iter().map(PeriodSummary::try_from).collect()
}

fn parse_field(field: &str, text: &str) -> AnalyticsResult<U256> {
    parse_integer(text).map_err(|err| match err {
        AnalyticsError::NegativeValue { value, .. } => AnalyticsError::NegativeValue {
            field: field.to_string(),
            value,
        },
        other => other,
    })
}

fn parse_timestamp(field: &str, text: &str) -> AnalyticsResult<u64> {
    let value = parse_field(field, text)?;
    if value > U256::from(u64::MAX) {
        return Err(AnalyticsError::Overflow(format!("{} = {}", field, value)));
    }
    Ok(value.as_limbs()[0])
}

fn parse_rate(field: &str, text: &str) -> AnalyticsResult<u32> {
    let value = parse_field(field, text)?;
    if value > U256::from(BPS_DENOMINATOR) {
        let shown = if value > U256::from(u32::MAX) {
            u32::MAX
        } else {
            value.as_limbs()[0] as u32
        };
        return Err(AnalyticsError::InvalidRate {
            field: field.to_string(),
            value: shown,
            max: BPS_DENOMINATOR,
        });
    }
    Ok(value.as_limbs()[0] as u32)
}
