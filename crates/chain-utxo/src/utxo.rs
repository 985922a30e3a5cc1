use crate::error::UtxoError;
use crate::network::MATURE_CONFIRMATIONS;
use crate::types::UtxoInfo;

/// Order UTXOs for coin selection.
///
/// Mature outputs (at least [`MATURE_CONFIRMATIONS`]) come first, smallest
/// value first, so dust-like outputs get consolidated. Immature outputs
/// follow, most-confirmed first. Both sorts are stable.
pub fn sort_utxos(utxos: &[UtxoInfo], decimals: u32) -> Result<Vec<UtxoInfo>, UtxoError> {
    let mut mature: Vec<(u64, &UtxoInfo)> = Vec::new();
    let mut immature: Vec<&UtxoInfo> = Vec::new();

    for utxo in utxos {
        if utxo.confirmation_count() >= MATURE_CONFIRMATIONS {
            mature.push((utxo.value_base(decimals)?, utxo));
        } else {
            immature.push(utxo);
        }
    }

    mature.sort_by_key(|(value, _)| *value);
    immature.sort_by(|a, b| b.confirmation_count().cmp(&a.confirmation_count()));

    Ok(mature
        .into_iter()
        .map(|(_, utxo)| utxo.clone())
        .chain(immature.into_iter().cloned())
        .collect())
}

/// Drop outputs with no confirmations.
pub fn confirmed_only(utxos: Vec<UtxoInfo>) -> Vec<UtxoInfo> {
    utxos
        .into_iter()
        .filter(|utxo| utxo.confirmation_count() > 0)
        .collect()
}

/// Total value of `utxos` in base units.
pub fn sum_utxo_value(utxos: &[UtxoInfo], decimals: u32) -> Result<u64, UtxoError> {
    utxos.iter().try_fold(0u64, |total, utxo| {
        total
            .checked_add(utxo.value_base(decimals)?)
            .ok_or_else(|| UtxoError::InvalidAmount("utxo total overflows u64".into()))
    })
}
