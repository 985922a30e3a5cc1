//! Fee-level recommendation and fee option resolution.

use std::sync::Arc;

use async_trait::async_trait;
use chain_utxo::fee;
use chain_utxo::network::ChainPolicy;
use chain_utxo::types::{FeeLevel, FeeRate, FeeRateType};
use chain_utxo::units;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use utxo_api::UtxoApi;

use crate::error::WalletError;
use crate::types::{FeeOption, ResolvedFeeOption};

/// Bytes per kilobyte in indexer fee estimates.
const BYTES_PER_KB: u64 = 1_000;

/// Source of recommended fee rates per level.
#[async_trait]
pub trait FeeRateRecommender: Send + Sync {
    async fn get_fee_rate_recommendation(&self, level: FeeLevel) -> Result<FeeRate, WalletError>;
}

/// Recommends rates from the indexer's `estimatefee` endpoint.
pub struct BlockbookFeeRecommender {
    api: Arc<dyn UtxoApi>,
    policy: ChainPolicy,
}

impl BlockbookFeeRecommender {
    pub fn new(api: Arc<dyn UtxoApi>, policy: ChainPolicy) -> Self {
        Self { api, policy }
    }
}

/// Convert a main-units-per-kB estimate into base units per vbyte.
pub fn per_kb_to_per_vbyte(main_per_kb: &str, decimals: u32) -> Result<FeeRate, WalletError> {
    let per_kb = units::parse_decimal(main_per_kb)?;
    if per_kb <= Decimal::ZERO {
        return Err(WalletError::InvalidNumericInput(format!(
            "fee estimate must be positive, got {main_per_kb}"
        )));
    }
    let scale = Decimal::from(10u64.pow(decimals.min(units::MAX_DECIMALS)));
    let per_vbyte = per_kb
        .checked_mul(scale)
        .map(|base| base / Decimal::from(BYTES_PER_KB))
        .ok_or_else(|| WalletError::InvalidNumericInput(format!("fee estimate overflow: {main_per_kb}")))?;
    Ok(FeeRate::per_weight(per_vbyte.normalize().to_string()))
}

#[async_trait]
impl FeeRateRecommender for BlockbookFeeRecommender {
    async fn get_fee_rate_recommendation(&self, level: FeeLevel) -> Result<FeeRate, WalletError> {
        let blocks = self.policy.confirmation_target(level);
        let estimate = self.api.estimate_fee(blocks).await?;
        let rate = per_kb_to_per_vbyte(&estimate, self.policy.decimals)?;
        debug!(%level, blocks, %rate, "blockbook fee recommendation");
        Ok(rate)
    }
}

/// Always answers from the policy's hardcoded table.
pub struct StaticFeeRecommender {
    policy: ChainPolicy,
}

impl StaticFeeRecommender {
    pub fn new(policy: ChainPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl FeeRateRecommender for StaticFeeRecommender {
    async fn get_fee_rate_recommendation(&self, level: FeeLevel) -> Result<FeeRate, WalletError> {
        Ok(self.policy.default_fee_rate(level))
    }
}

/// Turn a fee request into a concrete rate.
///
/// Recommender failures fall back to the policy table. Flat rates also
/// report their base/main amounts; the fee floors are applied at build
/// time once the transaction shape is known.
pub async fn resolve_fee_option(
    option: &FeeOption,
    recommender: &dyn FeeRateRecommender,
    policy: &ChainPolicy,
) -> Result<ResolvedFeeOption, WalletError> {
    let (level, rate) = match option {
        FeeOption::Custom(rate) => (FeeLevel::Custom, rate.clone()),
        FeeOption::Level(FeeLevel::Custom) => {
            return Err(WalletError::InvalidNumericInput(
                "custom fee level requires an explicit fee rate".into(),
            ));
        }
        FeeOption::Level(level) => {
            let rate = match recommender.get_fee_rate_recommendation(*level).await {
                Ok(rate) => rate,
                Err(err) => {
                    let fallback = policy.default_fee_rate(*level);
                    warn!(%level, error = %err, fallback = %fallback, "fee recommendation failed, using default rate");
                    fallback
                }
            };
            (*level, rate)
        }
    };

    let parsed = units::parse_decimal(&rate.fee_rate)?;
    if parsed.is_sign_negative() {
        return Err(WalletError::InvalidNumericInput(format!("negative fee rate: {rate}")));
    }

    let (fee_base, fee_main) = match rate.fee_rate_type {
        FeeRateType::BasePerWeight => (None, None),
        FeeRateType::Base | FeeRateType::Main => {
            let base = fee::fee_for_rate(&rate, 0, 0, false, policy.decimals)?;
            (Some(base.to_string()), Some(units::to_main(base, policy.decimals)))
        }
    };

    Ok(ResolvedFeeOption {
        target_fee_level: level,
        target_fee_rate: rate.fee_rate,
        target_fee_rate_type: rate.fee_rate_type,
        fee_base,
        fee_main,
    })
}
