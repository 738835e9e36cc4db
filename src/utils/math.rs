//! Mathematical utility functions

use alloy::primitives::U256;
use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

pub fn pow10(n: i32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        18 => dec!(1_000_000_000_000_000_000),
        _ => {
            let mut result = dec!(1);
            if n > 0 {
                for _ in 0..n {
                    result *= dec!(10);
                }
            } else {
                for _ in 0..(-n) {
                    result /= dec!(10);
                }
            }
            result
        }
    }
}

/// Raw on-chain integer amount → human units.
pub fn u256_to_decimal(raw: U256, decimals: u8) -> Result<Decimal> {
    let whole = Decimal::from_str(&raw.to_string())
        .with_context(|| format!("amount {} does not fit a decimal", raw))?;
    Ok(whole / pow10(decimals as i32))
}

/// Human units → raw on-chain integer amount, truncating any precision
/// beyond the token's decimals.
pub fn decimal_to_u256(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(anyhow!("negative amount {}", amount));
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let ten = U256::from(10u8);
    let scaled = mantissa * ten.pow(U256::from(decimals));
    Ok(scaled / ten.pow(U256::from(amount.scale())))
}

/// Rounds a slippage percentage to the four places it is tracked at.
pub fn round_slippage(value: Decimal) -> Decimal {
    value.round_dp(crate::config::SLIPPAGE_DECIMALS)
}

/// `(a - b) / b * 100`, or zero when `b` is zero.
pub fn percentage_difference(a: Decimal, b: Decimal) -> Decimal {
    if b.is_zero() {
        return Decimal::ZERO;
    }
    (a - b) / b * dec!(100)
}
