use alloy_primitives::U256;
use log::{debug, warn};

use super::apr::{annualized_return, compounded_return, relative_change};
use super::conversion::{convert_assets_to_shares, convert_shares_to_assets, price_per_share};
use crate::clock::{Clock, SystemClock, SECONDS_PER_DAY};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::math::{mul_div, percentage_change, pow10, Rounding, BPS_DENOMINATOR};
use crate::model::{PendingBalances, SettlementOutcome, SimulationInput, SimulationResult, VaultState};

pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

pub struct VaultSimulator<C: Clock = SystemClock> {
    clock: C,
}

impl VaultSimulator<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl Default for VaultSimulator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> VaultSimulator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// `input.timestamp`, when set, takes precedence over the clock.
    pub fn simulate(
        &self,
        state: Option<&VaultState>,
        input: &SimulationInput,
    ) -> AnalyticsResult<SimulationResult> {
        let state = state.ok_or(AnalyticsError::MissingVaultState)?;
        let now = input.timestamp.unwrap_or_else(|| self.clock.now());
        simulate_at(state, input, now)
    }
}

fn check_rate(field: &str, bps: u32) -> AnalyticsResult<()> {
    if bps > BPS_DENOMINATOR {
        return Err(AnalyticsError::InvalidRate {
            field: field.to_string(),
            value: bps,
            max: BPS_DENOMINATOR,
        });
    }
    Ok(())
}

fn checked_add(a: U256, b: U256, what: &str) -> AnalyticsResult<U256> {
    a.checked_add(b)
        .ok_or_else(|| AnalyticsError::Overflow(what.to_string()))
}

fn add_pending(a: PendingBalances, b: PendingBalances) -> AnalyticsResult<PendingBalances> {
    Ok(PendingBalances::new(
        checked_add(a.assets, b.assets, "pending assets")?,
        checked_add(a.shares, b.shares, "pending shares")?,
    ))
}

pub fn simulate_at(
    state: &VaultState,
    input: &SimulationInput,
    now: u64,
) -> AnalyticsResult<SimulationResult> {
    if input.new_total_assets.is_zero() {
        return Err(AnalyticsError::NonPositiveTarget);
    }
    check_rate("managementFee", state.management_fee_bps)?;
    check_rate("performanceFee", state.performance_fee_bps)?;

    let scale = state.scale;
    let offset = state.decimals_offset();
    let new_total_assets = input.new_total_assets;
    let supply = state.total_supply;

    let price_before = price_per_share(state.total_assets, supply, scale, Rounding::Down)?;
    let elapsed_seconds = now.saturating_sub(state.last_fee_timestamp);

    let management_fees = mul_div(
        new_total_assets,
        U256::from(u128::from(state.management_fee_bps) * u128::from(elapsed_seconds)),
        U256::from(u128::from(BPS_DENOMINATOR) * u128::from(SECONDS_PER_YEAR)),
        Rounding::Down,
    )?;
    let net_total_assets = new_total_assets.checked_sub(management_fees).ok_or_else(|| {
        AnalyticsError::FeesExceedAssets {
            fees: management_fees.to_string(),
            total_assets: new_total_assets.to_string(),
        }
    })?;

    // An unset mark starts at the 1:1 price.
    let high_water_mark = if state.high_water_mark.is_zero() {
        pow10(u32::from(scale.asset_decimals))?
    } else {
        state.high_water_mark
    };

    let price_after_management = price_per_share(net_total_assets, supply, scale, Rounding::Down)?;
    let (excess_returns, performance_fees) = if price_after_management > high_water_mark && !supply.is_zero() {
        let profit = mul_div(
            price_after_management - high_water_mark,
            supply,
            pow10(u32::from(scale.share_decimals))?,
            Rounding::Down,
        )?;
        let fee = mul_div(
            profit,
            U256::from(state.performance_fee_bps),
            U256::from(BPS_DENOMINATOR),
            Rounding::Down,
        )?;
        (profit, fee)
    } else {
        (U256::ZERO, U256::ZERO)
    };

    let total_fees = checked_add(management_fees, performance_fees, "total fees")?;
    if total_fees > new_total_assets {
        return Err(AnalyticsError::FeesExceedAssets {
            fees: total_fees.to_string(),
            total_assets: new_total_assets.to_string(),
        });
    }
    let fee_shares = convert_assets_to_shares(
        total_fees,
        new_total_assets - total_fees,
        supply,
        offset,
        Rounding::Down,
    )?;

    let mut total_assets = new_total_assets;
    let mut total_supply = checked_add(supply, fee_shares, "total supply")?;

    let price_after_fees = price_per_share(total_assets, total_supply, scale, Rounding::Down)?;
    let high_water_mark_raised = price_after_fees > high_water_mark;
    let new_high_water_mark = high_water_mark.max(price_after_fees);

    let pending_settlement = input.pending_settlement.unwrap_or(state.pending_settlement);
    let pending_silo = input.pending_silo_balances.unwrap_or(state.pending_silo_balances);
    let safe_asset_balance = input.safe_asset_balance.unwrap_or(state.safe_asset_balance);

    let mut settlement = SettlementOutcome {
        remaining_pending: pending_silo,
        ..SettlementOutcome::default()
    };

    if input.settle_deposit {
        settlement.settled = true;

        let deposited = pending_settlement.assets;
        let minted = convert_assets_to_shares(deposited, total_assets, total_supply, offset, Rounding::Down)?;
        total_assets = checked_add(total_assets, deposited, "total assets")?;
        total_supply = checked_add(total_supply, minted, "total supply")?;
        settlement.deposited_assets = deposited;
        settlement.minted_shares = minted;

        let redeem_shares = pending_settlement.shares;
        if !redeem_shares.is_zero() {
            let redeem_assets =
                convert_shares_to_assets(redeem_shares, total_assets, total_supply, offset, Rounding::Down)?;
            let available = checked_add(safe_asset_balance, deposited, "available liquidity")?;

            if redeem_assets <= available && redeem_assets <= total_assets && redeem_shares <= total_supply {
                total_assets -= redeem_assets;
                total_supply -= redeem_shares;
                settlement.redeemed_shares = redeem_shares;
                settlement.redeemed_assets = redeem_assets;
                settlement.redemption_settled = true;
            } else {
                warn!(
                    "Redemption of {} shares needs {} assets but only {} are liquid; leaving it pending",
                    redeem_shares, redeem_assets, available
                );
                settlement.deferred_redemption_shares = redeem_shares;
                settlement.remaining_pending = add_pending(
                    settlement.remaining_pending,
                    PendingBalances::new(U256::ZERO, redeem_shares),
                )?;
            }
        }
    } else {
        settlement.remaining_pending = add_pending(pending_silo, pending_settlement)?;
    }

    let price_after = price_per_share(total_assets, total_supply, scale, Rounding::Down)?;
    let price_impact = percentage_change(price_before, price_after)?;

    let days = elapsed_seconds as f64 / SECONDS_PER_DAY as f64;
    let (linear_net_apr, compounded_net_apr) = if elapsed_seconds > 0 {
        (
            Some(annualized_return(price_before, price_after, days)),
            Some(compounded_return(price_before, price_after, days)),
        )
    } else {
        (None, None)
    };

    debug!(
        "Simulated vault to {} assets: mgmt fee {}, perf fee {}, price {} -> {} ({})",
        new_total_assets, management_fees, performance_fees, price_before, price_after, price_impact
    );

    Ok(SimulationResult {
        total_assets,
        total_supply,
        price_per_share_before: price_before,
        price_per_share: price_after,
        price_impact,
        management_fees,
        performance_fees,
        fee_shares,
        excess_returns,
        high_water_mark: new_high_water_mark,
        high_water_mark_raised,
        elapsed_seconds,
        period_net_return: relative_change(price_before, price_after) * 100.0,
        linear_net_apr,
        compounded_net_apr,
        settlement,
    })
}
