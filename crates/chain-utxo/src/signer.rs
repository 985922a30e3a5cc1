use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf, ScriptBuf};
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, CompressedPublicKey, OutPoint, PublicKey, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use rust_decimal::Decimal;

use crate::address::{self, AddressType};
use crate::error::UtxoError;
use crate::network::BtcNetwork;
use crate::types::PaymentTx;
use crate::units;

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    pub hex: String,
    pub id: String,
    pub vsize: usize,
}

/// Chain-specific script building and finalization.
pub trait PaymentSigner: Send + Sync {
    /// Sign every input of `payment` with a single key controlling all inputs.
    fn sign(
        &self,
        payment: &PaymentTx,
        private_key: &[u8; 32],
        address_type: AddressType,
    ) -> Result<SignedPayload, UtxoError>;
}

/// Signs P2PKH, P2SH-P2WPKH and P2WPKH spends with the `bitcoin` crate.
#[derive(Debug, Clone)]
pub struct BitcoinSigner {
    pub network: BtcNetwork,
    pub decimals: u32,
    /// Upper bound in sat/vbyte on the final signed transaction.
    pub maximum_fee_rate: Option<Decimal>,
}

impl BitcoinSigner {
    pub fn new(network: BtcNetwork, decimals: u32) -> Self {
        Self {
            network,
            decimals,
            maximum_fee_rate: None,
        }
    }

    pub fn with_maximum_fee_rate(mut self, sat_per_vbyte: Decimal) -> Self {
        self.maximum_fee_rate = Some(sat_per_vbyte);
        self
    }

    fn build_unsigned(
        &self,
        payment: &PaymentTx,
        address_type: AddressType,
        own_script: &ScriptBuf,
    ) -> Result<(Transaction, Vec<TxOut>), UtxoError> {
        let mut inputs = Vec::with_capacity(payment.inputs.len());
        let mut prevouts = Vec::with_capacity(payment.inputs.len());

        for utxo in &payment.inputs {
            let txid: Txid = utxo
                .txid
                .parse()
                .map_err(|e| UtxoError::TransactionBuildError(format!("invalid txid: {e}")))?;

            if let Some(input_address) = &utxo.address {
                let input_type = address::address_type_of(input_address, self.network)?;
                if input_type != Some(address_type) {
                    return Err(UtxoError::SigningError(format!(
                        "input {}:{} pays to {input_address}, which is not a {address_type} address",
                        utxo.txid, utxo.vout
                    )));
                }
            }

            let script_pubkey = match &utxo.script_pub_key_hex {
                Some(script_hex) => ScriptBuf::from(hex::decode(script_hex).map_err(|e| {
                    UtxoError::TransactionBuildError(format!("invalid scriptPubKey hex: {e}"))
                })?),
                None => own_script.clone(),
            };
            if &script_pubkey != own_script {
                return Err(UtxoError::SigningError(format!(
                    "input {}:{} is not controlled by the signing key",
                    utxo.txid, utxo.vout
                )));
            }

            inputs.push(TxIn {
                previous_output: OutPoint::new(txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::default(),
            });
            prevouts.push(TxOut {
                value: Amount::from_sat(utxo.value_base(self.decimals)?),
                script_pubkey,
            });
        }

        let outputs = payment
            .outputs
            .iter()
            .map(|output| {
                Ok(TxOut {
                    value: Amount::from_sat(units::to_base(&output.value, self.decimals)?),
                    script_pubkey: address::script_pubkey_for(&output.address, self.network)?,
                })
            })
            .collect::<Result<Vec<_>, UtxoError>>()?;

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs,
            output: outputs,
        };
        Ok((tx, prevouts))
    }

    fn check_fee_rate(&self, signed: &Transaction, prevouts: &[TxOut]) -> Result<(), UtxoError> {
        let Some(max_rate) = self.maximum_fee_rate else {
            return Ok(());
        };
        let input_total: u64 = prevouts.iter().map(|p| p.value.to_sat()).sum();
        let output_total: u64 = signed.output.iter().map(|o| o.value.to_sat()).sum();
        let fee = input_total.saturating_sub(output_total);
        let vsize = signed.vsize() as u64;
        let rate = Decimal::from(fee) / Decimal::from(vsize.max(1));
        if rate > max_rate {
            return Err(UtxoError::FeeTooHigh(format!(
                "{fee} sat over {vsize} vbytes is {} sat/vbyte, above maximum {max_rate}",
                rate.round_dp(2)
            )));
        }
        Ok(())
    }
}

impl PaymentSigner for BitcoinSigner {
    fn sign(
        &self,
        payment: &PaymentTx,
        private_key: &[u8; 32],
        address_type: AddressType,
    ) -> Result<SignedPayload, UtxoError> {
        if payment.inputs.is_empty() {
            return Err(UtxoError::TransactionBuildError("payment has no inputs".into()));
        }

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(private_key)
            .map_err(|e| UtxoError::InvalidPrivateKey(format!("invalid secret key: {e}")))?;
        let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let compressed_pk = CompressedPublicKey(public_key);

        let wpkh_script = ScriptBuf::new_p2wpkh(&compressed_pk.wpubkey_hash());
        let own_script = match address_type {
            AddressType::P2pkh => ScriptBuf::new_p2pkh(&compressed_pk.pubkey_hash()),
            AddressType::P2shP2wpkh => ScriptBuf::new_p2sh(&wpkh_script.script_hash()),
            AddressType::P2wpkh => wpkh_script.clone(),
        };

        let (unsigned, prevouts) = self.build_unsigned(payment, address_type, &own_script)?;
        let mut signed_tx = unsigned.clone();
        let mut sighash_cache = SighashCache::new(&unsigned);

        for input_index in 0..unsigned.input.len() {
            let digest = if address_type.is_segwit() {
                sighash_cache
                    .p2wpkh_signature_hash(
                        input_index,
                        &wpkh_script,
                        prevouts[input_index].value,
                        EcdsaSighashType::All,
                    )
                    .map_err(|e| UtxoError::SigningError(format!("sighash computation failed: {e}")))?
                    .to_byte_array()
            } else {
                sighash_cache
                    .legacy_signature_hash(input_index, &own_script, EcdsaSighashType::All.to_u32())
                    .map_err(|e| UtxoError::SigningError(format!("sighash computation failed: {e}")))?
                    .to_byte_array()
            };

            let msg = Message::from_digest(digest);
            let signature = secp.sign_ecdsa(&msg, &secret_key);
            secp.verify_ecdsa(&msg, &signature, &public_key)
                .map_err(|e| UtxoError::SigningError(format!("signature check failed: {e}")))?;

            // DER signature + sighash type byte.
            let mut sig_bytes = signature.serialize_der().to_vec();
            sig_bytes.push(EcdsaSighashType::All as u8);

            let input = &mut signed_tx.input[input_index];
            match address_type {
                AddressType::P2pkh => {
                    let sig_push = PushBytesBuf::try_from(sig_bytes)
                        .map_err(|e| UtxoError::SigningError(format!("signature push: {e}")))?;
                    input.script_sig = Builder::new()
                        .push_slice(sig_push)
                        .push_key(&PublicKey::new(public_key))
                        .into_script();
                }
                AddressType::P2shP2wpkh | AddressType::P2wpkh => {
                    if address_type == AddressType::P2shP2wpkh {
                        let redeem_push = PushBytesBuf::try_from(wpkh_script.to_bytes())
                            .map_err(|e| UtxoError::SigningError(format!("redeem script push: {e}")))?;
                        input.script_sig = Builder::new().push_slice(redeem_push).into_script();
                    }
                    let mut witness = Witness::new();
                    witness.push(&sig_bytes);
                    witness.push(public_key.serialize());
                    input.witness = witness;
                }
            }
        }

        self.check_fee_rate(&signed_tx, &prevouts)?;

        Ok(SignedPayload {
            hex: bitcoin::consensus::encode::serialize_hex(&signed_tx),
            id: signed_tx.compute_txid().to_string(),
            vsize: signed_tx.vsize(),
        })
    }
}
