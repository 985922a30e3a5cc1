//! Transaction size estimation and fee computation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::UtxoError;
use crate::types::{FeeRate, FeeRateType};
use crate::units;

/// Bounds on the serialized size of a transaction, in (virtual) bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSize {
    pub min: u64,
    pub max: u64,
}

impl TxSize {
    /// Midpoint of the bounds, rounded up.
    pub fn mean(&self) -> u64 {
        (self.min + self.max).div_ceil(2)
    }
}

fn varint_len(count: u64) -> u64 {
    if count < 0xfd {
        1
    } else if count <= 0xffff {
        3
    } else {
        5
    }
}

/// Estimate transaction size from input/output counts.
///
/// Legacy inputs cost 146-148 bytes and outputs 33-34 bytes. For SegWit
/// spends the witness (106-108 bytes per input) is weighted at 1/4 via
/// `(3 * no_witness + with_witness) / 4`.
pub fn estimate_tx_size(input_count: usize, output_count: usize, segwit: bool) -> TxSize {
    let n = input_count as u64;
    let m = output_count as u64;
    let varint = varint_len(n);

    if segwit {
        // version + marker/flag + inputs + output count + outputs + locktime
        let base = varint + 4 + 2 + 59 * n + 1 + 4;
        let min_no_witness = base + 31 * m;
        let max_no_witness = base + 33 * m;
        let min_witness = min_no_witness + 106 * n;
        let max_witness = max_no_witness + 108 * n;
        TxSize {
            min: (3 * min_no_witness + min_witness).div_ceil(4),
            max: (3 * max_no_witness + max_witness).div_ceil(4),
        }
    } else {
        TxSize {
            min: varint + 4 + 146 * n + 1 + 33 * m + 4,
            max: varint + 4 + 148 * n + 1 + 34 * m + 4,
        }
    }
}

fn ceil_to_u64(value: Decimal, context: &str) -> Result<u64, UtxoError> {
    value
        .ceil()
        .to_u64()
        .ok_or_else(|| UtxoError::InvalidNumericInput(format!("fee out of range: {context}")))
}

/// Fee in base units for `fee_rate` at the given transaction shape.
///
/// Flat rates ignore the shape; per-weight rates are multiplied by the mean
/// estimated size. Always rounds up to a whole base unit.
pub fn fee_for_rate(
    fee_rate: &FeeRate,
    input_count: usize,
    output_count: usize,
    segwit: bool,
    decimals: u32,
) -> Result<u64, UtxoError> {
    let rate = units::parse_decimal(&fee_rate.fee_rate)?;
    if rate.is_sign_negative() && !rate.is_zero() {
        return Err(UtxoError::InvalidNumericInput(format!(
            "negative fee rate: {fee_rate}"
        )));
    }

    match fee_rate.fee_rate_type {
        FeeRateType::Base => ceil_to_u64(rate, &fee_rate.fee_rate),
        FeeRateType::Main => {
            let scale = Decimal::from(10u64.pow(decimals.min(units::MAX_DECIMALS)));
            let base = rate.checked_mul(scale).ok_or_else(|| {
                UtxoError::InvalidNumericInput(format!("fee overflow: {fee_rate}"))
            })?;
            ceil_to_u64(base, &fee_rate.fee_rate)
        }
        FeeRateType::BasePerWeight => {
            let size = estimate_tx_size(input_count, output_count, segwit).mean();
            let fee = rate.checked_mul(Decimal::from(size)).ok_or_else(|| {
                UtxoError::InvalidNumericInput(format!("fee overflow: {fee_rate}"))
            })?;
            ceil_to_u64(fee, &fee_rate.fee_rate)
        }
    }
}

/// Applies the configured fee floors on top of a requested rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeCalculator {
    pub decimals: u32,
    pub segwit: bool,
    pub min_tx_fee: Option<FeeRate>,
    pub network_min_relay_fee: u64,
}

impl FeeCalculator {
    /// `max(requested, min_tx_fee, network_min_relay_fee)` in base units.
    pub fn estimate_tx_fee(
        &self,
        fee_rate: &FeeRate,
        input_count: usize,
        output_count: usize,
    ) -> Result<u64, UtxoError> {
        let requested = fee_for_rate(fee_rate, input_count, output_count, self.segwit, self.decimals)?;
        let floor = match &self.min_tx_fee {
            Some(min) => fee_for_rate(min, input_count, output_count, self.segwit, self.decimals)?,
            None => 0,
        };
        Ok(requested.max(floor).max(self.network_min_relay_fee))
    }
}
