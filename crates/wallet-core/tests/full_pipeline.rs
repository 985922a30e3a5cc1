//! Cross-crate integration tests exercising the full pipeline:
//! mnemonic -> account -> select UTXOs -> sign -> broadcast.
//!
//! An in-memory indexer stands in for Blockbook so the payment scenarios
//! are exact and reproducible.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chain_utxo::signer::BitcoinSigner;
use tracing_subscriber::EnvFilter;
use utxo_api::types::{AddressDetails, BlockInfo, BlockbookTx};
use utxo_api::{ApiError, RetryingApi, UtxoApi};
use wallet_core::hd_derivation;
use wallet_core::mnemonic;
use wallet_core::*;

const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

const EXTERNAL: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Indexer double: fixed UTXO set, records broadcasts, and fails the
/// first `flaky_sends` broadcasts with a transient error.
#[derive(Default)]
struct MemoryIndexer {
    utxos: Vec<UtxoInfo>,
    flaky_sends: Mutex<u32>,
    broadcasts: Mutex<Vec<String>>,
}

#[async_trait]
impl UtxoApi for MemoryIndexer {
    async fn get_utxos_for_address(&self, _address: &str) -> Result<Vec<UtxoInfo>, ApiError> {
        Ok(self.utxos.clone())
    }

    async fn get_address_details(&self, address: &str) -> Result<AddressDetails, ApiError> {
        let balance: u64 = self.utxos.iter().filter_map(|u| u.satoshis).sum();
        Ok(AddressDetails {
            address: address.to_string(),
            balance: balance.to_string(),
            unconfirmed_balance: "0".into(),
            total_received: None,
            total_sent: None,
            txs: self.utxos.len() as u64,
            unconfirmed_txs: 0,
        })
    }

    async fn get_tx(&self, txid: &str) -> Result<BlockbookTx, ApiError> {
        Err(ApiError::Status {
            status: 404,
            body: format!("tx {txid} not found"),
        })
    }

    async fn send_tx(&self, tx_hex: &str) -> Result<String, ApiError> {
        let mut flaky = self.flaky_sends.lock().unwrap();
        if *flaky > 0 {
            *flaky -= 1;
            return Err(ApiError::Request("socket hang up".into()));
        }
        self.broadcasts.lock().unwrap().push(tx_hex.to_string());
        let tx: bitcoin::Transaction =
            bitcoin::consensus::deserialize(&hex::decode(tx_hex).unwrap()).unwrap();
        Ok(tx.compute_txid().to_string())
    }

    async fn get_block(&self, _hash_or_height: &str) -> Result<BlockInfo, ApiError> {
        Err(ApiError::MissingField("block".into()))
    }

    async fn estimate_fee(&self, _blocks: u32) -> Result<String, ApiError> {
        Ok("0.00002".into())
    }
}

fn utxo(seed: &str, sat: u64, confirmations: u32) -> UtxoInfo {
    UtxoInfo {
        txid: seed.repeat(32),
        vout: 1,
        value: chain_utxo::units::to_main(sat, 8),
        satoshis: Some(sat),
        confirmations: Some(confirmations),
        height: None,
        lock_time: None,
        address: None,
        script_pub_key_hex: None,
        tx_hex: None,
        spent: Some(false),
    }
}

fn payments_with(indexer: Arc<MemoryIndexer>) -> UtxoPayments {
    init_tracing();
    let config = PaymentsConfig::default();
    let policy = config.policy();
    let root = mnemonic::mnemonic_to_xprv(TEST_MNEMONIC, "", config.network).unwrap();
    UtxoPayments::new(
        &root,
        config,
        indexer,
        Arc::new(StaticFeeRecommender::new(policy.clone())),
        Arc::new(BitcoinSigner::new(policy.network, policy.decimals)),
        Arc::new(AddressCache::new()),
    )
    .unwrap()
}

fn flat_fee(sat: u64) -> CreateTransactionOptions {
    CreateTransactionOptions::default()
        .with_fee(FeeOption::Custom(FeeRate::new(sat.to_string(), FeeRateType::Base)))
}

fn base(main: &str) -> u64 {
    chain_utxo::units::to_base(main, 8).unwrap()
}

fn assert_balanced(tx: &PaymentTx) {
    let inputs: u64 = tx.inputs.iter().map(|u| u.value_base(8).unwrap()).sum();
    let outputs: u64 = tx.outputs.iter().map(|o| base(&o.value)).sum();
    assert_eq!(inputs, outputs + base(&tx.fee));
    assert!(tx.outputs.iter().all(|o| base(&o.value) > 546));
}

// ─── HD derivation vectors ──────────────────────────────────────────

#[test]
fn bip84_account_and_addresses() {
    let root = mnemonic::mnemonic_to_xprv(TEST_MNEMONIC, "", BtcNetwork::Mainnet).unwrap();
    let account = hd_derivation::derive_node(&root, "m/84'/0'/0'").unwrap();
    assert_eq!(
        account.to_xpub("zpub").unwrap(),
        "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs"
    );
    assert_eq!(
        hd_derivation::get_address(&account, 0, AddressType::P2wpkh, BtcNetwork::Mainnet).unwrap(),
        "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
    );
    assert_eq!(
        hd_derivation::get_address(&account, 1, AddressType::P2wpkh, BtcNetwork::Mainnet).unwrap(),
        "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g"
    );
}

#[test]
fn bip44_and_bip49_first_addresses() {
    let root = mnemonic::mnemonic_to_xprv(TEST_MNEMONIC, "", BtcNetwork::Mainnet).unwrap();
    let legacy = hd_derivation::derive_node(&root, "m/44'/0'/0'").unwrap();
    assert_eq!(
        hd_derivation::get_address(&legacy, 0, AddressType::P2pkh, BtcNetwork::Mainnet).unwrap(),
        "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
    );

    let test_root = mnemonic::mnemonic_to_xprv(TEST_MNEMONIC, "", BtcNetwork::Testnet).unwrap();
    let nested = hd_derivation::derive_node(&test_root, "m/49'/1'/0'").unwrap();
    assert_eq!(
        hd_derivation::get_address(&nested, 0, AddressType::P2shP2wpkh, BtcNetwork::Testnet).unwrap(),
        "2Mww8dCYPUpKHofjgcXcBCEGmniw9CoaiD2"
    );
}

#[test]
fn watch_only_account_matches_private() {
    let full = payments_with(Arc::new(MemoryIndexer::default()));
    let public = full.get_public_config().unwrap();
    assert!(public.xpub.starts_with("zpub"));

    let config = PaymentsConfig::default();
    let policy = config.policy();
    let watch = UtxoPayments::new(
        &public.xpub,
        config,
        Arc::new(MemoryIndexer::default()),
        Arc::new(StaticFeeRecommender::new(policy.clone())),
        Arc::new(BitcoinSigner::new(policy.network, policy.decimals)),
        Arc::new(AddressCache::new()),
    )
    .unwrap();
    for index in 0..3 {
        assert_eq!(watch.get_payport(index).unwrap(), full.get_payport(index).unwrap());
    }
}

// ─── Payment scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_exact_sweep() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("a1", 2_000_000, 12), utxo("a2", 3_000_000, 40)],
        ..Default::default()
    });
    let payments = payments_with(indexer);

    let tx = payments
        .create_sweep_transaction(0, EXTERNAL, flat_fee(1_000))
        .await
        .unwrap();
    assert_eq!(base(&tx.amount), 4_999_000);
    assert_eq!(base(&tx.fee), 1_000);
    assert_eq!(tx.data.outputs.len(), 1);
    assert_eq!(tx.data.change, "0");
    assert_balanced(&tx.data);
}

#[tokio::test]
async fn scenario_b_send_with_change() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("b1", 5_000_000, 10)],
        ..Default::default()
    });
    let payments = payments_with(indexer);
    let own = payments.get_payport(0).unwrap();

    let tx = payments
        .create_transaction(0, EXTERNAL, "0.01", flat_fee(1_400))
        .await
        .unwrap();
    assert_eq!(tx.data.outputs.len(), 2);
    assert_eq!(base(&tx.data.outputs[0].value), 1_000_000);
    assert_eq!(tx.data.outputs[1].address, own.address);
    assert_eq!(base(&tx.data.outputs[1].value), 3_998_600);
    assert_eq!(base(&tx.data.change), 3_998_600);
    assert_eq!(base(&tx.fee), 1_400);
    assert_balanced(&tx.data);
}

#[tokio::test]
async fn scenario_c_dust_change_folded_into_fee() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("c1", 1_001_600, 10)],
        ..Default::default()
    });
    let payments = payments_with(indexer);

    let tx = payments
        .create_transaction(0, EXTERNAL, "0.01", flat_fee(1_400))
        .await
        .unwrap();
    assert_eq!(tx.data.change, "0");
    assert_eq!(tx.data.outputs.len(), 1);
    assert_eq!(base(&tx.fee), 1_600);
    assert_balanced(&tx.data);
}

#[tokio::test]
async fn scenario_d_insufficient_funds() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("d1", 1_000_000, 10)],
        ..Default::default()
    });
    let payments = payments_with(indexer);

    let err = payments
        .create_transaction(0, EXTERNAL, "0.02", flat_fee(1_000))
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds(msg) => {
            assert!(msg.contains("1000000"), "{msg}");
            assert!(msg.contains("base"), "{msg}");
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_e_sweep_leaves_dust() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("e1", 1_500, 10)],
        ..Default::default()
    });
    let payments = payments_with(indexer);

    let err = payments
        .create_transaction(0, EXTERNAL, "0.000015", flat_fee(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::DustOutput(_)), "{err:?}");

    let err = payments
        .create_sweep_transaction(0, EXTERNAL, flat_fee(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::DustOutput(_)), "{err:?}");
}

#[tokio::test]
async fn selection_is_deterministic_and_prefers_small_mature() {
    let utxos = vec![
        utxo("f1", 4_000_000, 2),
        utxo("f2", 600_000, 50),
        utxo("f3", 900_000, 7),
        utxo("f4", 3_000_000, 5),
    ];
    let indexer = Arc::new(MemoryIndexer {
        utxos,
        ..Default::default()
    });
    let payments = payments_with(indexer);

    let first = payments
        .create_transaction(0, EXTERNAL, "0.02", flat_fee(2_000))
        .await
        .unwrap();
    let second = payments
        .create_transaction(0, EXTERNAL, "0.02", flat_fee(2_000))
        .await
        .unwrap();
    assert_eq!(first.data, second.data);

    let order: Vec<String> = first.input_utxos.iter().map(|u| u.txid[..2].to_string()).collect();
    assert_eq!(order, ["f2", "f3", "f4"]);
    assert_balanced(&first.data);
}

// ─── Sign -> broadcast ──────────────────────────────────────────────

#[tokio::test]
async fn sign_then_broadcast_through_retry() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("aa", 5_000_000, 10)],
        flaky_sends: Mutex::new(2),
        ..Default::default()
    });

    // Share the indexer between the retry wrapper and the assertions.
    struct Shared(Arc<MemoryIndexer>);

    #[async_trait]
    impl UtxoApi for Shared {
        async fn get_utxos_for_address(&self, a: &str) -> Result<Vec<UtxoInfo>, ApiError> {
            self.0.get_utxos_for_address(a).await
        }
        async fn get_address_details(&self, a: &str) -> Result<AddressDetails, ApiError> {
            self.0.get_address_details(a).await
        }
        async fn get_tx(&self, t: &str) -> Result<BlockbookTx, ApiError> {
            self.0.get_tx(t).await
        }
        async fn send_tx(&self, h: &str) -> Result<String, ApiError> {
            self.0.send_tx(h).await
        }
        async fn get_block(&self, b: &str) -> Result<BlockInfo, ApiError> {
            self.0.get_block(b).await
        }
        async fn estimate_fee(&self, n: u32) -> Result<String, ApiError> {
            self.0.estimate_fee(n).await
        }
    }

    init_tracing();
    let config = PaymentsConfig::default();
    let policy = config.policy();
    let root = mnemonic::mnemonic_to_xprv(TEST_MNEMONIC, "", config.network).unwrap();
    let api: Arc<dyn UtxoApi> = Arc::new(RetryingApi::new(Shared(indexer.clone())));
    let payments = UtxoPayments::new(
        &root,
        config,
        api.clone(),
        Arc::new(BlockbookFeeRecommender::new(api, policy.clone())),
        Arc::new(BitcoinSigner::new(policy.network, policy.decimals)),
        Arc::new(AddressCache::new()),
    )
    .unwrap();

    let opts = CreateTransactionOptions::default().with_fee(FeeOption::Level(FeeLevel::Medium));
    let unsigned = payments.create_transaction(0, EXTERNAL, "0.01", opts).await.unwrap();
    // 0.00002 BTC/kB from the indexer is 2 sat/vbyte.
    assert_eq!(unsigned.target_fee_rate, "2");

    let signed = payments.sign_transaction(&unsigned).unwrap();
    assert_eq!(signed.status, TransactionStatus::Signed);

    let tx: bitcoin::Transaction =
        bitcoin::consensus::deserialize(&hex::decode(&signed.hex).unwrap()).unwrap();
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.output.len(), 2);
    assert!(!tx.input[0].witness.is_empty());
    assert_eq!(tx.compute_txid().to_string(), signed.id);

    let result = payments.broadcast_transaction(&signed).await.unwrap();
    assert_eq!(result.id, signed.id);
    assert_eq!(indexer.broadcasts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn balance_reports_sweepable() {
    let indexer = Arc::new(MemoryIndexer {
        utxos: vec![utxo("aa", 250_000, 10)],
        ..Default::default()
    });
    let payments = payments_with(indexer);
    let balance = payments.get_balance(0u32).await.unwrap();
    assert_eq!(balance.confirmed_balance, "0.0025");
    assert_eq!(balance.unconfirmed_balance, "0");
    assert!(balance.sweepable);
}
