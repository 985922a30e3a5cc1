//! HD-account payments over a UTXO chain.
//!
//! [`UtxoPayments`] wires the account keys, the indexer, the fee
//! recommender and the signer around the pure coin-selection builder.

use std::sync::Arc;

use chain_utxo::address;
use chain_utxo::network::ChainPolicy;
use chain_utxo::signer::{BitcoinSigner, PaymentSigner};
use chain_utxo::transaction::PaymentTxBuilder;
use chain_utxo::types::{TxOutput, UtxoInfo};
use chain_utxo::units;
use chain_utxo::utxo;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use utxo_api::{BlockbookClient, RetryingApi, UtxoApi};

use crate::address_cache::{AddressCache, HdAccount};
use crate::config::PaymentsConfig;
use crate::error::WalletError;
use crate::fees::{self, BlockbookFeeRecommender, FeeRateRecommender};
use crate::hd_derivation;
use crate::types::{
    BalanceResult, BroadcastResult, CreateTransactionOptions, FeeOption, FromTo, Payport,
    PayportTarget, PublicConfig, ResolvedFeeOption, SignedTx, TransactionInfo, TransactionStatus,
    UnsignedTx,
};

pub struct UtxoPayments {
    policy: ChainPolicy,
    config: PaymentsConfig,
    account: HdAccount,
    api: Arc<dyn UtxoApi>,
    fees: Arc<dyn FeeRateRecommender>,
    signer: Arc<dyn PaymentSigner>,
}

impl UtxoPayments {
    /// Payments for the account at the configured path below `root_key`.
    ///
    /// `root_key` may be an extended private or public key with any known
    /// prefix. Public keys give a watch-only instance that cannot sign.
    pub fn new(
        root_key: &str,
        config: PaymentsConfig,
        api: Arc<dyn UtxoApi>,
        fees: Arc<dyn FeeRateRecommender>,
        signer: Arc<dyn PaymentSigner>,
        cache: Arc<AddressCache>,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        let policy = config.policy();
        let path = config.account_path(policy.coin_type);
        let account = HdAccount::new(root_key, &path, config.address_type, config.network, cache)?;
        Ok(Self {
            policy,
            config,
            account,
            api,
            fees,
            signer,
        })
    }

    /// Payments backed by Blockbook with retry, Blockbook fee estimates and
    /// the bundled signer.
    pub fn from_config(root_key: &str, config: PaymentsConfig) -> Result<Self, WalletError> {
        config.validate()?;
        let policy = config.policy();
        let url = config.blockbook_url(&policy)?;

        let client = BlockbookClient::new(&url, policy.decimals, config.request_timeout())?;
        let api: Arc<dyn UtxoApi> = Arc::new(RetryingApi::with_max_retries(client, config.max_retries));
        let fees = Arc::new(BlockbookFeeRecommender::new(api.clone(), policy.clone()));

        let mut signer = BitcoinSigner::new(policy.network, policy.decimals);
        if let Some(max_rate) = config.maximum_fee_rate()? {
            signer = signer.with_maximum_fee_rate(max_rate);
        }

        Self::new(root_key, config, api, fees, Arc::new(signer), Arc::new(AddressCache::new()))
    }

    pub fn policy(&self) -> &ChainPolicy {
        &self.policy
    }

    pub fn config(&self) -> &PaymentsConfig {
        &self.config
    }

    pub fn account(&self) -> &HdAccount {
        &self.account
    }

    pub fn is_valid_address(&self, address: &str) -> bool {
        matches!(address::validate_address(address, self.policy.network), Ok(true))
    }

    fn require_valid_address(&self, address: &str) -> Result<(), WalletError> {
        if self.is_valid_address(address) {
            Ok(())
        } else {
            Err(WalletError::InvalidAddress(format!(
                "{address} is not a valid {} address",
                self.policy.network
            )))
        }
    }

    pub fn get_payport(&self, index: u32) -> Result<Payport, WalletError> {
        Ok(Payport::new(self.account.get_address(index)?))
    }

    pub fn resolve_payport(&self, target: impl Into<PayportTarget>) -> Result<Payport, WalletError> {
        match target.into() {
            PayportTarget::Index(index) => self.get_payport(index),
            PayportTarget::Address(address) => {
                self.require_valid_address(&address)?;
                Ok(Payport::new(address))
            }
            PayportTarget::Payport(payport) => {
                self.require_valid_address(&payport.address)?;
                Ok(payport)
            }
        }
    }

    /// Resolve a spending account index and a destination.
    pub fn resolve_from_to(
        &self,
        from: u32,
        to: impl Into<PayportTarget>,
    ) -> Result<FromTo, WalletError> {
        let to = to.into();
        let to_index = match &to {
            PayportTarget::Index(index) => Some(*index),
            _ => None,
        };
        let from_payport = self.get_payport(from)?;
        let to_payport = self.resolve_payport(to)?;
        Ok(FromTo {
            from_address: from_payport.address,
            from_index: Some(from),
            to_address: to_payport.address,
            to_index,
        })
    }

    /// Index of `address` within the first `max_address_scan` addresses.
    pub fn get_address_index(&self, address: &str) -> Result<Option<u32>, WalletError> {
        self.require_valid_address(address)?;
        self.account.lookup_index(address, self.config.max_address_scan)
    }

    /// Whether `balance` (main units) is worth more than the relay fee.
    pub fn is_sweepable_balance(&self, balance: &str) -> Result<bool, WalletError> {
        let base = units::to_base(balance, self.policy.decimals)?;
        Ok(base > self.policy.network_min_relay_fee)
    }

    pub async fn get_balance(&self, target: impl Into<PayportTarget>) -> Result<BalanceResult, WalletError> {
        let payport = self.resolve_payport(target)?;
        let details = self.api.get_address_details(&payport.address).await?;

        let confirmed = units::parse_base_ceil(&details.balance)
            .map(|sat| units::to_main(sat, self.policy.decimals))?;
        let unconfirmed = signed_base_to_main(&details.unconfirmed_balance, self.policy.decimals)?;
        let sweepable = self.is_sweepable_balance(&confirmed)?;

        Ok(BalanceResult {
            confirmed_balance: confirmed,
            unconfirmed_balance: unconfirmed,
            sweepable,
        })
    }

    /// Spendable UTXOs of `target`, optionally including unconfirmed ones.
    pub async fn get_utxos(
        &self,
        target: impl Into<PayportTarget>,
        include_unconfirmed: bool,
    ) -> Result<Vec<UtxoInfo>, WalletError> {
        let payport = self.resolve_payport(target)?;
        let utxos = self.api.get_utxos_for_address(&payport.address).await?;
        Ok(self.spendable(utxos, include_unconfirmed))
    }

    fn spendable(&self, utxos: Vec<UtxoInfo>, include_unconfirmed: bool) -> Vec<UtxoInfo> {
        let unspent: Vec<UtxoInfo> = utxos.into_iter().filter(|u| u.spent != Some(true)).collect();
        if include_unconfirmed {
            unspent
        } else {
            utxo::confirmed_only(unspent)
        }
    }

    pub async fn resolve_fee_option(&self, option: &FeeOption) -> Result<ResolvedFeeOption, WalletError> {
        fees::resolve_fee_option(option, self.fees.as_ref(), &self.policy).await
    }

    fn builder(&self) -> PaymentTxBuilder {
        PaymentTxBuilder::from_policy(&self.policy, self.account.address_type().is_segwit())
    }

    /// Build an unsigned payment of `amount` (main units) from account
    /// index `from` to `to`.
    ///
    /// Amount and destination are checked before any indexer call.
    pub async fn create_transaction(
        &self,
        from: u32,
        to: impl Into<PayportTarget>,
        amount: &str,
        options: CreateTransactionOptions,
    ) -> Result<UnsignedTx, WalletError> {
        let amount_base = units::to_base(amount, self.policy.decimals)?;
        if amount_base == 0 {
            return Err(WalletError::InvalidAmount(format!("amount must be positive, got {amount}")));
        }
        let from_to = self.resolve_from_to(from, to)?;

        let utxos = match options.available_utxos {
            Some(utxos) => self.spendable(utxos, options.use_unconfirmed_utxos),
            None => {
                let fetched = self.api.get_utxos_for_address(&from_to.from_address).await?;
                self.spendable(fetched, options.use_unconfirmed_utxos)
            }
        };

        let fee_option = self.resolve_fee_option(&options.fee).await?;
        let fee_rate = fee_option.fee_rate();

        let desired = [TxOutput {
            address: from_to.to_address.clone(),
            value: units::to_main(amount_base, self.policy.decimals),
        }];
        let payment = self.builder().build_payment_tx(
            &utxos,
            &desired,
            &from_to.from_address,
            &fee_rate,
            options.use_all_utxos,
        )?;

        let sent = payment
            .outputs
            .first()
            .map(|o| o.value.clone())
            .ok_or_else(|| WalletError::Internal("payment has no outputs".into()))?;

        debug!(
            from = %from_to.from_address,
            to = %from_to.to_address,
            amount = %sent,
            fee = %payment.fee,
            change = %payment.change,
            inputs = payment.inputs.len(),
            "created unsigned transaction"
        );

        Ok(UnsignedTx {
            status: TransactionStatus::Unsigned,
            from_address: from_to.from_address,
            from_index: from_to.from_index,
            to_address: from_to.to_address,
            to_index: from_to.to_index,
            amount: sent,
            fee: payment.fee.clone(),
            target_fee_level: fee_option.target_fee_level,
            target_fee_rate: fee_option.target_fee_rate,
            target_fee_rate_type: fee_option.target_fee_rate_type,
            input_utxos: payment.inputs.clone(),
            data: payment,
        })
    }

    /// Spend every UTXO of account index `from` to `to`; the fee comes out
    /// of the swept amount.
    pub async fn create_sweep_transaction(
        &self,
        from: u32,
        to: impl Into<PayportTarget>,
        options: CreateTransactionOptions,
    ) -> Result<UnsignedTx, WalletError> {
        let to = to.into();
        let from_to = self.resolve_from_to(from, to.clone())?;

        let utxos = match options.available_utxos.clone() {
            Some(utxos) => self.spendable(utxos, options.use_unconfirmed_utxos),
            None => {
                let fetched = self.api.get_utxos_for_address(&from_to.from_address).await?;
                self.spendable(fetched, options.use_unconfirmed_utxos)
            }
        };
        if utxos.is_empty() {
            return Err(WalletError::NoUtxosToSweep(format!(
                "no spendable utxos at {}",
                from_to.from_address
            )));
        }

        let total = utxo::sum_utxo_value(&utxos, self.policy.decimals)?;
        let total_main = units::to_main(total, self.policy.decimals);
        if !self.is_sweepable_balance(&total_main)? {
            return Err(WalletError::BalanceNotSweepable(format!(
                "balance {total_main} {} at {} does not exceed the minimum relay fee of {} sat",
                self.policy.symbol, from_to.from_address, self.policy.network_min_relay_fee
            )));
        }

        let options = CreateTransactionOptions {
            use_all_utxos: true,
            available_utxos: Some(utxos),
            ..options
        };
        self.create_transaction(from, to, &total_main, options).await
    }

    /// Sign with the key at the transaction's source index.
    pub fn sign_transaction(&self, unsigned: &UnsignedTx) -> Result<SignedTx, WalletError> {
        let index = match unsigned.from_index {
            Some(index) => index,
            None => self
                .get_address_index(&unsigned.from_address)?
                .ok_or_else(|| {
                    WalletError::InvalidKeyMaterial(format!(
                        "{} does not belong to this account",
                        unsigned.from_address
                    ))
                })?,
        };

        let expected = self.account.get_address(index)?;
        if expected != unsigned.from_address {
            return Err(WalletError::SigningFailed(format!(
                "index {index} derives {expected}, not {}",
                unsigned.from_address
            )));
        }

        let key = hd_derivation::derive_secp256k1_key(self.account.node(), index)?;
        let signed = self
            .signer
            .sign(&unsigned.data, &key.private_key, self.account.address_type())?;
        debug!(txid = %signed.id, vsize = signed.vsize, "signed transaction");

        Ok(SignedTx {
            status: TransactionStatus::Signed,
            id: signed.id,
            from_address: unsigned.from_address.clone(),
            from_index: Some(index),
            to_address: unsigned.to_address.clone(),
            to_index: unsigned.to_index,
            amount: unsigned.amount.clone(),
            fee: unsigned.fee.clone(),
            target_fee_level: unsigned.target_fee_level,
            target_fee_rate: unsigned.target_fee_rate.clone(),
            target_fee_rate_type: unsigned.target_fee_rate_type,
            input_utxos: unsigned.input_utxos.clone(),
            hex: signed.hex,
            data: unsigned.data.clone(),
        })
    }

    /// Submit a signed transaction. The returned id is the network's.
    pub async fn broadcast_transaction(&self, signed: &SignedTx) -> Result<BroadcastResult, WalletError> {
        let id = self.api.send_tx(&signed.hex).await?;
        if id != signed.id {
            warn!(local = %signed.id, network = %id, "broadcast txid differs from locally computed id");
        }
        info!(txid = %id, from = %signed.from_address, amount = %signed.amount, "broadcast transaction");
        Ok(BroadcastResult { id })
    }

    pub async fn get_transaction_info(&self, txid: &str) -> Result<TransactionInfo, WalletError> {
        let tx = self.api.get_tx(txid).await?;
        let confirmed = tx.confirmations > 0;
        let fee = match &tx.fees {
            Some(fees) => Some(units::to_main(units::parse_base_ceil(fees)?, self.policy.decimals)),
            None => None,
        };

        Ok(TransactionInfo {
            id: tx.txid,
            status: if confirmed {
                TransactionStatus::Confirmed
            } else {
                TransactionStatus::Pending
            },
            confirmations: tx.confirmations,
            block_height: u64::try_from(tx.block_height).ok().filter(|h| *h > 0),
            block_hash: tx.block_hash,
            block_time: (tx.block_time > 0).then_some(tx.block_time),
            fee,
            raw_hex: tx.hex,
        })
    }

    pub fn get_public_config(&self) -> Result<PublicConfig, WalletError> {
        let prefix = self.account.address_type().xpub_prefix(self.policy.network);
        Ok(PublicConfig {
            network: self.policy.network,
            address_type: self.account.address_type(),
            derivation_path: self.config.account_path(self.policy.coin_type),
            xpub: self.account.node().to_xpub(prefix)?,
        })
    }
}

/// Base-unit string that may be negative, rendered in main units.
fn signed_base_to_main(base: &str, decimals: u32) -> Result<String, WalletError> {
    if base.trim().is_empty() {
        return Ok("0".into());
    }
    let value = units::parse_decimal(base)?;
    let scale = Decimal::from(10u64.pow(decimals.min(units::MAX_DECIMALS)));
    Ok((value / scale).normalize().to_string())
}
