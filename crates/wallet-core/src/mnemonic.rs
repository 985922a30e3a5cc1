use bip39::{Language, Mnemonic};
use chain_utxo::network::BtcNetwork;
use zeroize::{Zeroize, Zeroizing};

use crate::error::WalletError;
use crate::hd_derivation;

/// Validate a mnemonic phrase
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive seed bytes from mnemonic + optional passphrase
pub fn mnemonic_to_seed(phrase: &str, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

    let mut seed = mnemonic.to_seed(passphrase);
    let out = Zeroizing::new(seed.to_vec());
    seed.zeroize();
    Ok(out)
}

/// Master extended private key for a mnemonic, encoded for `network`.
pub fn mnemonic_to_xprv(
    phrase: &str,
    passphrase: &str,
    network: BtcNetwork,
) -> Result<Zeroizing<String>, WalletError> {
    let seed = mnemonic_to_seed(phrase, passphrase)?;
    hd_derivation::seed_to_xprv(&seed, network)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_validate_mnemonic() {
        assert!(validate_mnemonic(ABANDON));
        assert!(!validate_mnemonic("invalid mnemonic phrase here"));
        // Bad checksum word
        assert!(!validate_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"
        ));
    }

    #[test]
    fn test_bip39_test_vector() {
        let seed = mnemonic_to_seed(ABANDON, "").unwrap();
        assert_eq!(
            hex::encode(seed.as_slice()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_passphrase_changes_seed() {
        let seed_no_pass = mnemonic_to_seed(ABANDON, "").unwrap();
        let seed_with_pass = mnemonic_to_seed(ABANDON, "mypassphrase").unwrap();
        assert_ne!(seed_no_pass.as_slice(), seed_with_pass.as_slice());
    }

    #[test]
    fn test_invalid_phrase_is_error() {
        let err = mnemonic_to_seed("not a real phrase", "").unwrap_err();
        assert!(matches!(err, WalletError::InvalidMnemonic(_)));
    }

    #[test]
    fn test_xprv_prefix_follows_network() {
        assert!(mnemonic_to_xprv(ABANDON, "", BtcNetwork::Mainnet)
            .unwrap()
            .starts_with("xprv"));
        assert!(mnemonic_to_xprv(ABANDON, "", BtcNetwork::Testnet)
            .unwrap()
            .starts_with("tprv"));
    }
}
