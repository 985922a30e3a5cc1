//! Conversion between a chain's main denomination (decimal string such as
//! `"0.05"`) and its integer base denomination (satoshis).
//!
//! All arithmetic goes through `rust_decimal`; amounts never touch `f64`.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::UtxoError;

/// Largest `decimals` value a `Decimal` scale can represent.
pub const MAX_DECIMALS: u32 = 18;

/// Parse a decimal string, accepting plain and scientific notation.
pub fn parse_decimal(input: &str) -> Result<Decimal, UtxoError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UtxoError::InvalidNumericInput("empty amount".into()));
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| UtxoError::InvalidNumericInput(format!("{trimmed}: {e}")))
}

fn scale_factor(decimals: u32) -> Result<Decimal, UtxoError> {
    if decimals > MAX_DECIMALS {
        return Err(UtxoError::InvalidNumericInput(format!(
            "unsupported decimal places: {decimals}"
        )));
    }
    Ok(Decimal::from(10u64.pow(decimals)))
}

/// Convert a main-denomination amount to base units, rounding down.
pub fn to_base(main_amount: &str, decimals: u32) -> Result<u64, UtxoError> {
    let amount = parse_decimal(main_amount)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UtxoError::InvalidNumericInput(format!(
            "negative amount: {main_amount}"
        )));
    }
    let scaled = amount
        .checked_mul(scale_factor(decimals)?)
        .ok_or_else(|| UtxoError::InvalidNumericInput(format!("amount overflow: {main_amount}")))?;
    scaled
        .floor()
        .to_u64()
        .ok_or_else(|| UtxoError::InvalidNumericInput(format!("amount out of range: {main_amount}")))
}

/// Convert base units to a normalized main-denomination string.
pub fn to_main(base_amount: u64, decimals: u32) -> String {
    Decimal::from_i128_with_scale(i128::from(base_amount), decimals.min(MAX_DECIMALS))
        .normalize()
        .to_string()
}

/// Parse a base-unit amount string, rounding any fraction up.
///
/// Used for fee values, where rounding down could underpay the network.
pub fn parse_base_ceil(base_amount: &str) -> Result<u64, UtxoError> {
    let amount = parse_decimal(base_amount)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UtxoError::InvalidNumericInput(format!(
            "negative amount: {base_amount}"
        )));
    }
    amount
        .ceil()
        .to_u64()
        .ok_or_else(|| UtxoError::InvalidNumericInput(format!("amount out of range: {base_amount}")))
}
