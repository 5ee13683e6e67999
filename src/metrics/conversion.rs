//! Share <-> asset conversion with the ERC-4626 virtual offset.
//!
//! The side with fewer decimals gets a virtual unit, the other side gets
//! `10^|offset|` virtual units, so an empty vault prices at exactly 1:1.
//! Deposits round down in shares and redemptions round down in assets:
//! callers pick `Rounding::Up` only when the protocol is the one receiving.

use alloy_primitives::U256;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::math::{mul_div, pow10, Rounding};
use crate::model::ShareScale;

fn virtual_offsets(decimals_offset: i32) -> AnalyticsResult<(U256, U256)> {
    let scale = pow10(decimals_offset.unsigned_abs())?;
    if decimals_offset >= 0 {
        Ok((U256::from(1u64), scale))
    } else {
        Ok((scale, U256::from(1u64)))
    }
}

fn padded(total: U256, virtual_units: U256, what: &str) -> AnalyticsResult<U256> {
    total
        .checked_add(virtual_units)
        .ok_or_else(|| AnalyticsError::Overflow(what.to_string()))
}

pub fn convert_shares_to_assets(
    shares: U256,
    total_assets: U256,
    total_supply: U256,
    decimals_offset: i32,
    rounding: Rounding,
) -> AnalyticsResult<U256> {
    if shares.is_zero() {
        return Ok(U256::ZERO);
    }

    let (virtual_assets, virtual_shares) = virtual_offsets(decimals_offset)?;
    if total_supply.is_zero() {
        return mul_div(shares, virtual_assets, virtual_shares, rounding);
    }

    mul_div(
        shares,
        padded(total_assets, virtual_assets, "total assets")?,
        padded(total_supply, virtual_shares, "total supply")?,
        rounding,
    )
}

pub fn convert_assets_to_shares(
    assets: U256,
    total_assets: U256,
    total_supply: U256,
    decimals_offset: i32,
    rounding: Rounding,
) -> AnalyticsResult<U256> {
    if assets.is_zero() {
        return Ok(U256::ZERO);
    }

    let (virtual_assets, virtual_shares) = virtual_offsets(decimals_offset)?;
    if total_supply.is_zero() {
        return mul_div(assets, virtual_shares, virtual_assets, rounding);
    }

    mul_div(
        assets,
        padded(total_supply, virtual_shares, "total supply")?,
        padded(total_assets, virtual_assets, "total assets")?,
        rounding,
    )
}

/// Asset value of one whole share (`10^share_decimals` units). An empty vault
/// prices at `10^asset_decimals`.
pub fn price_per_share(
    total_assets: U256,
    total_supply: U256,
    scale: ShareScale,
    rounding: Rounding,
) -> AnalyticsResult<U256> {
    if total_supply.is_zero() {
        return pow10(u32::from(scale.asset_decimals));
    }

    convert_shares_to_assets(
        pow10(u32::from(scale.share_decimals))?,
        total_assets,
        total_supply,
        scale.decimals_offset(),
        rounding,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn u(value: u128) -> U256 {
        U256::from(value)
    }

    const ONE_SHARE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn zero_supply_prices_at_one_to_one() {
        let price = price_per_share(U256::ZERO, U256::ZERO, ShareScale::new(18, 6), Rounding::Down);
        assert_eq!(price.unwrap(), u(1_000_000));

        let same_decimals = price_per_share(U256::ZERO, U256::ZERO, ShareScale::new(18, 18), Rounding::Up);
        assert_eq!(same_decimals.unwrap(), u(ONE_SHARE));
    }

    #[test]
    fn zero_supply_conversions_use_decimal_ratio() {
        assert_eq!(
            convert_assets_to_shares(u(5_000_000), U256::ZERO, U256::ZERO, 12, Rounding::Down).unwrap(),
            u(5 * ONE_SHARE)
        );
        assert_eq!(
            convert_shares_to_assets(u(5 * ONE_SHARE), U256::ZERO, U256::ZERO, 12, Rounding::Down).unwrap(),
            u(5_000_000)
        );
        assert_eq!(
            convert_shares_to_assets(u(7), u(1_000), U256::ZERO, -2, Rounding::Down).unwrap(),
            u(700)
        );
    }

    #[test]
    fn zero_input_converts_to_zero() {
        assert_eq!(
            convert_shares_to_assets(U256::ZERO, u(1), u(1), 12, Rounding::Up).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            convert_assets_to_shares(U256::ZERO, u(1), u(1), 12, Rounding::Up).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn price_reflects_virtual_offset() {
        // 1000 USDC backing one 18-decimal share
        let price = price_per_share(u(1_000_000_000), u(ONE_SHARE), ShareScale::new(18, 6), Rounding::Down);
        assert_eq!(price.unwrap(), u(999_999_001));

        // 1000 USDC backing 1000 shares
        let price = price_per_share(
            u(1_000_000_000),
            u(1_000 * ONE_SHARE),
            ShareScale::new(18, 6),
            Rounding::Down,
        );
        assert_eq!(price.unwrap(), u(1_000_000));
    }

    #[test]
    fn negative_offset_pads_the_asset_side() {
        // 6-decimal shares over an 8-decimal asset, 2 assets per share
        let assets = convert_shares_to_assets(u(1_000_000), u(200_000_000), u(1_000_000), -2, Rounding::Down);
        assert_eq!(assets.unwrap(), u(199_999_900));
        let shares = convert_assets_to_shares(u(200_000_000), u(200_000_000), u(1_000_000), -2, Rounding::Down);
        assert_eq!(shares.unwrap(), u(1_000_000));
    }

    #[test]
    fn up_rounding_never_below_down() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let offset = [0, 6, 12, -2][rng.gen_range(0..4)];
            let total_assets = u(rng.gen_range(1..10u128.pow(15)));
            let total_supply = u(rng.gen_range(1..10u128.pow(27)));
            let amount = u(rng.gen_range(1..10u128.pow(24)));

            let down = convert_shares_to_assets(amount, total_assets, total_supply, offset, Rounding::Down).unwrap();
            let up = convert_shares_to_assets(amount, total_assets, total_supply, offset, Rounding::Up).unwrap();
            assert!(up >= down && up - down <= u(1));

            let down = convert_assets_to_shares(amount, total_assets, total_supply, offset, Rounding::Down).unwrap();
            let up = convert_assets_to_shares(amount, total_assets, total_supply, offset, Rounding::Up).unwrap();
            assert!(up >= down && up - down <= u(1));
        }
    }

    #[test]
    fn shares_round_trip_within_one_asset_unit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let offset = [0, 6, 12, -2][rng.gen_range(0..4)];
            let total_assets = rng.gen_range(1..10u128.pow(15));
            let total_supply = rng.gen_range(1..10u128.pow(27));
            let shares = u(rng.gen_range(0..10u128.pow(24)));

            let assets =
                convert_shares_to_assets(shares, u(total_assets), u(total_supply), offset, Rounding::Down).unwrap();
            let back =
                convert_assets_to_shares(assets, u(total_assets), u(total_supply), offset, Rounding::Down).unwrap();

            let (virtual_assets, virtual_shares) = virtual_offsets(offset).unwrap();
            let shares_per_asset_unit =
                (u(total_supply) + virtual_shares) / (u(total_assets) + virtual_assets);
            assert!(back <= shares);
            assert!(shares - back <= shares_per_asset_unit + u(1));
        }
    }
}
