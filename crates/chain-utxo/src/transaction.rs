use tracing::debug;

use crate::address;
use crate::error::UtxoError;
use crate::fee::FeeCalculator;
use crate::network::{BtcNetwork, ChainPolicy};
use crate::types::{FeeRate, PaymentTx, TxOutput, UtxoInfo};
use crate::units;
use crate::utxo;

/// Coin selection and change policy shared by every UTXO chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTxBuilder {
    pub network: BtcNetwork,
    pub decimals: u32,
    pub dust_threshold: u64,
    pub fees: FeeCalculator,
}

struct Output {
    address: String,
    value: u64,
}

impl PaymentTxBuilder {
    /// Builder using the policy's own dust and fee floors.
    pub fn from_policy(policy: &ChainPolicy, segwit: bool) -> Self {
        Self {
            network: policy.network,
            decimals: policy.decimals,
            dust_threshold: policy.dust_threshold,
            fees: FeeCalculator {
                decimals: policy.decimals,
                segwit,
                min_tx_fee: Some(policy.min_tx_fee.clone()),
                network_min_relay_fee: policy.network_min_relay_fee,
            },
        }
    }

    fn validate_outputs(&self, desired_outputs: &[TxOutput]) -> Result<(Vec<Output>, u64), UtxoError> {
        if desired_outputs.is_empty() {
            return Err(UtxoError::TransactionBuildError("no outputs requested".into()));
        }

        let mut outputs = Vec::with_capacity(desired_outputs.len());
        let mut total: u64 = 0;
        for (i, output) in desired_outputs.iter().enumerate() {
            address::parse_address(&output.address, self.network)?;
            let value = units::to_base(&output.value, self.decimals).map_err(|e| {
                UtxoError::InvalidAmount(format!("output {i} value {}: {e}", output.value))
            })?;
            if value == 0 {
                return Err(UtxoError::InvalidAmount(format!(
                    "output {i} value must be positive, got {}",
                    output.value
                )));
            }
            if value <= self.dust_threshold {
                return Err(UtxoError::DustOutput(format!(
                    "output {i} value {value} sat is at or below dust threshold {} sat",
                    self.dust_threshold
                )));
            }
            total = total
                .checked_add(value)
                .ok_or_else(|| UtxoError::InvalidAmount("output total overflows u64".into()))?;
            outputs.push(Output {
                address: output.address.clone(),
                value,
            });
        }
        Ok((outputs, total))
    }

    /// Select inputs, price the fee and settle change.
    ///
    /// With `use_all_utxos` every provided UTXO is spent; otherwise UTXOs are
    /// taken in [`utxo::sort_utxos`] order until they cover outputs plus fee.
    /// Sending exactly the spendable total deducts the fee from the first
    /// output. Change at or below the dust threshold is added to the fee.
    pub fn build_payment_tx(
        &self,
        utxos: &[UtxoInfo],
        desired_outputs: &[TxOutput],
        change_address: &str,
        desired_fee_rate: &FeeRate,
        use_all_utxos: bool,
    ) -> Result<PaymentTx, UtxoError> {
        let (mut outputs, mut output_total) = self.validate_outputs(desired_outputs)?;
        address::parse_address(change_address, self.network)
            .map_err(|e| UtxoError::InvalidAddress(format!("change address: {e}")))?;

        // Reserve a change slot even if change ends up being dropped.
        let output_count = outputs.len() + 1;

        let mut inputs: Vec<UtxoInfo> = Vec::new();
        let mut input_total: u64 = 0;
        let mut fee;

        if use_all_utxos {
            inputs = utxos.to_vec();
            input_total = utxo::sum_utxo_value(&inputs, self.decimals)?;
            fee = self.fees.estimate_tx_fee(desired_fee_rate, inputs.len(), output_count)?;
        } else {
            fee = self.fees.estimate_tx_fee(desired_fee_rate, 1, output_count)?;
            for candidate in utxo::sort_utxos(utxos, self.decimals)? {
                input_total = input_total
                    .checked_add(candidate.value_base(self.decimals)?)
                    .ok_or_else(|| UtxoError::InvalidAmount("utxo total overflows".into()))?;
                inputs.push(candidate);
                fee = self.fees.estimate_tx_fee(desired_fee_rate, inputs.len(), output_count)?;
                if input_total >= required_total(output_total, fee)? {
                    break;
                }
            }
        }

        debug!(
            inputs = inputs.len(),
            input_total,
            output_total,
            fee,
            fee_rate = %desired_fee_rate,
            use_all_utxos,
            "selected utxos"
        );

        let required = required_total(output_total, fee)?;
        if input_total < required {
            if output_total == input_total {
                let first = &mut outputs[0];
                let reduced = first.value.saturating_sub(fee);
                if reduced <= self.dust_threshold {
                    return Err(UtxoError::DustOutput(format!(
                        "sending {} sat after a {fee} sat fee leaves {reduced} sat, at or below dust threshold {} sat",
                        first.value, self.dust_threshold
                    )));
                }
                debug!(from = first.value, to = reduced, "deducting fee from first output");
                first.value = reduced;
                output_total -= fee;
            } else {
                return Err(UtxoError::InsufficientFunds(format!(
                    "have {input_total} sat, need {required} sat (outputs {output_total} + fee {fee}) at fee rate {desired_fee_rate}"
                )));
            }
        }

        let mut change = input_total - output_total - fee;
        if change > self.dust_threshold {
            outputs.push(Output {
                address: change_address.to_string(),
                value: change,
            });
        } else if change > 0 {
            debug!(change, dust_threshold = self.dust_threshold, "adding dust change to fee");
            fee += change;
            change = 0;
        }

        let emitted: u64 = outputs.iter().map(|o| o.value).sum();
        if emitted + fee != input_total {
            return Err(UtxoError::TransactionBuildError(format!(
                "unbalanced transaction: inputs {input_total} != outputs {emitted} + fee {fee}"
            )));
        }

        Ok(PaymentTx {
            inputs,
            outputs: outputs
                .into_iter()
                .map(|o| TxOutput {
                    address: o.address,
                    value: units::to_main(o.value, self.decimals),
                })
                .collect(),
            fee: units::to_main(fee, self.decimals),
            change: units::to_main(change, self.decimals),
            change_address: if change > 0 {
                Some(change_address.to_string())
            } else {
                None
            },
        })
    }
}

fn required_total(output_total: u64, fee: u64) -> Result<u64, UtxoError> {
    output_total.checked_add(fee).ok_or_else(|| {
        UtxoError::InvalidAmount(format!("outputs {output_total} sat plus fee {fee} sat overflows"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeeRateType;

    const RECIPIENT: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const CHANGE: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn builder() -> PaymentTxBuilder {
        PaymentTxBuilder {
            network: BtcNetwork::Mainnet,
            decimals: 8,
            dust_threshold: 546,
            fees: FeeCalculator {
                decimals: 8,
                segwit: true,
                min_tx_fee: None,
                network_min_relay_fee: 0,
            },
        }
    }

    fn make_utxo(txid: &str, satoshis: u64, confirmations: u32) -> UtxoInfo {
        UtxoInfo {
            txid: txid.to_string(),
            vout: 0,
            value: units::to_main(satoshis, 8),
            satoshis: None,
            confirmations: Some(confirmations),
            height: None,
            lock_time: None,
            address: None,
            script_pub_key_hex: None,
            tx_hex: None,
            spent: None,
        }
    }

    fn output(address: &str, satoshis: u64) -> TxOutput {
        TxOutput {
            address: address.to_string(),
            value: units::to_main(satoshis, 8),
        }
    }

    fn flat(sat: u64) -> FeeRate {
        FeeRate::new(sat.to_string(), FeeRateType::Base)
    }

    fn base(amount: &str) -> u64 {
        units::to_base(amount, 8).unwrap()
    }

    fn assert_balanced(tx: &PaymentTx) {
        let inputs: u64 = tx.inputs.iter().map(|u| base(&u.value)).sum();
        let outputs: u64 = tx.outputs.iter().map(|o| base(&o.value)).sum();
        assert_eq!(inputs, outputs + base(&tx.fee));
        for o in &tx.outputs {
            assert!(base(&o.value) > 546, "dust output {o:?}");
        }
    }

    #[test]
    fn send_with_change() {
        let utxos = vec![make_utxo("a", 5_000_000, 10)];
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_000_000)], CHANGE, &flat(1_400), false)
            .unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(base(&tx.outputs[0].value), 1_000_000);
        assert_eq!(tx.outputs[1].address, CHANGE);
        assert_eq!(base(&tx.outputs[1].value), 3_998_600);
        assert_eq!(base(&tx.fee), 1_400);
        assert_eq!(base(&tx.change), 3_998_600);
        assert_eq!(tx.change_address.as_deref(), Some(CHANGE));
        assert_balanced(&tx);
    }

    #[test]
    fn sweep_deducts_fee_from_output() {
        let utxos = vec![
            make_utxo("a", 2_000_000, 10),
            make_utxo("b", 3_000_000, 1),
        ];
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 5_000_000)], CHANGE, &flat(1_000), true)
            .unwrap();

        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(base(&tx.outputs[0].value), 4_999_000);
        assert_eq!(base(&tx.fee), 1_000);
        assert_eq!(tx.change, "0");
        assert!(tx.change_address.is_none());
        assert_balanced(&tx);
    }

    #[test]
    fn dust_change_is_added_to_fee() {
        let utxos = vec![make_utxo("a", 1_001_600, 10)];
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_000_000)], CHANGE, &flat(1_400), false)
            .unwrap();

        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.change, "0");
        assert_eq!(base(&tx.fee), 1_600);
        assert_balanced(&tx);
    }

    #[test]
    fn exact_cover_has_no_change() {
        let utxos = vec![make_utxo("a", 1_001_400, 10)];
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_000_000)], CHANGE, &flat(1_400), false)
            .unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(base(&tx.fee), 1_400);
        assert_eq!(tx.change, "0");
    }

    #[test]
    fn insufficient_funds_names_shortfall() {
        let utxos = vec![make_utxo("a", 1_000_000, 10)];
        let err = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 999_000)], CHANGE, &flat(1_400), false)
            .unwrap_err();
        match err {
            UtxoError::InsufficientFunds(msg) => {
                assert!(msg.contains("have 1000000 sat"), "{msg}");
                assert!(msg.contains("need 1000400 sat"), "{msg}");
                assert!(msg.contains("1400 base"), "{msg}");
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn sending_balance_that_becomes_dust_fails() {
        let utxos = vec![make_utxo("a", 1_500, 10)];
        let err = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_500)], CHANGE, &flat(1_000), false)
            .unwrap_err();
        assert!(matches!(err, UtxoError::DustOutput(_)));
    }

    #[test]
    fn selection_prefers_small_mature_utxos() {
        let utxos = vec![
            make_utxo("big", 10_000_000, 50),
            make_utxo("young", 9_000_000, 2),
            make_utxo("small1", 300_000, 6),
            make_utxo("small2", 800_000, 7),
        ];
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_000_000)], CHANGE, &flat(1_000), false)
            .unwrap();
        let picked: Vec<&str> = tx.inputs.iter().map(|u| u.txid.as_str()).collect();
        assert_eq!(picked, vec!["small1", "small2"]);
        assert_balanced(&tx);

        let again = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 1_000_000)], CHANGE, &flat(1_000), false)
            .unwrap();
        assert_eq!(tx, again);
    }

    #[test]
    fn per_weight_fee_recomputed_per_input() {
        let utxos = vec![
            make_utxo("a", 10_000, 10),
            make_utxo("b", 20_000, 10),
            make_utxo("c", 1_000_000, 10),
        ];
        let rate = FeeRate::per_weight("10");
        let tx = builder()
            .build_payment_tx(&utxos, &[output(RECIPIENT, 500_000)], CHANGE, &rate, false)
            .unwrap();
        assert_eq!(tx.inputs.len(), 3);
        let expected = crate::fee::fee_for_rate(&rate, 3, 2, true, 8).unwrap();
        assert_eq!(base(&tx.fee), expected);
        assert_balanced(&tx);
    }

    #[test]
    fn rejects_invalid_outputs() {
        let utxos = vec![make_utxo("a", 1_000_000, 10)];
        let b = builder();

        let bad_addr = b.build_payment_tx(&utxos, &[output("nope", 10_000)], CHANGE, &flat(1), false);
        assert!(matches!(bad_addr, Err(UtxoError::InvalidAddress(_))));

        let zero = TxOutput {
            address: RECIPIENT.into(),
            value: "0".into(),
        };
        let zero_res = b.build_payment_tx(&utxos, &[zero], CHANGE, &flat(1), false);
        assert!(matches!(zero_res, Err(UtxoError::InvalidAmount(_))));

        let nan = TxOutput {
            address: RECIPIENT.into(),
            value: "abc".into(),
        };
        let nan_res = b.build_payment_tx(&utxos, &[nan], CHANGE, &flat(1), false);
        assert!(matches!(nan_res, Err(UtxoError::InvalidAmount(_))));

        let dust = b.build_payment_tx(&utxos, &[output(RECIPIENT, 546)], CHANGE, &flat(1), false);
        assert!(matches!(dust, Err(UtxoError::DustOutput(_))));

        let bad_change = b.build_payment_tx(&utxos, &[output(RECIPIENT, 10_000)], "xyz", &flat(1), false);
        assert!(matches!(bad_change, Err(UtxoError::InvalidAddress(_))));
    }

    #[test]
    fn no_utxos_is_insufficient() {
        let err = builder()
            .build_payment_tx(&[], &[output(RECIPIENT, 10_000)], CHANGE, &flat(1_000), false)
            .unwrap_err();
        assert!(matches!(err, UtxoError::InsufficientFunds(_)));
    }

    #[test]
    fn multiple_outputs_balance() {
        let utxos = vec![make_utxo("a", 3_000_000, 10), make_utxo("b", 3_000_000, 10)];
        let outs = vec![output(RECIPIENT, 2_500_000), output(CHANGE, 2_500_000)];
        let tx = builder()
            .build_payment_tx(&utxos, &outs, CHANGE, &FeeRate::per_weight("2"), false)
            .unwrap();
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 3);
        assert_balanced(&tx);
    }

    #[test]
    fn amounts_near_u64_max_are_rejected() {
        let huge = TxOutput {
            address: RECIPIENT.to_string(),
            value: "184467440737.0955".to_string(),
        };
        let err = builder()
            .build_payment_tx(&[], &[huge], CHANGE, &flat(100_000), false)
            .unwrap_err();
        assert!(matches!(err, UtxoError::InvalidAmount(_)), "{err:?}");

        let mut big = make_utxo("a", 0, 10);
        big.value = "100000000000".to_string();
        let mut other = make_utxo("b", 0, 10);
        other.value = "100000000000".to_string();
        let target = TxOutput {
            address: RECIPIENT.to_string(),
            value: "150000000000".to_string(),
        };
        let err = builder()
            .build_payment_tx(&[big, other], &[target], CHANGE, &flat(1_000), false)
            .unwrap_err();
        assert!(matches!(err, UtxoError::InvalidAmount(_)), "{err:?}");
    }
}
