use super::psbt::PsbtInput;
use super::script::{check_key_matches, p2wpkh_script, InputKind};
use super::tx::{OutPoint, Transaction, TxIn, TxOut};
use super::UtxoTransaction;
use crate::address::{AddressCodec, UtxoAddress, UtxoAddressCodec};
use crate::chain::ChainConfig;
use crate::codec::decode_hex;
use crate::error::{Result, TxError};
use crate::transaction::network::{SpendableOutput, UtxoState};
use crate::transaction::overrides::UtxoOverrides;
use crate::transaction::{unsupported, TransactionRequest};
use tracing::debug;

/// Opt-in RBF, no relative lock time
const SEQUENCE_RBF: u32 = 0xffff_fffd;
const TX_VERSION: i32 = 2;

/// Virtual size of a signed transaction spending `kinds` into `outputs`
pub(crate) fn estimate_vsize(kinds: &[InputKind], outputs: &[TxOut]) -> usize {
    // version, lock time, one-byte input and output counts
    let mut weight = 10 * 4;
    if kinds.iter().any(InputKind::is_segwit) {
        // marker and flag
        weight += 2;
    }
    weight += kinds.iter().map(InputKind::input_weight).sum::<usize>();
    weight += outputs.iter().map(|output| output.serialized_len() * 4).sum::<usize>();
    weight.div_ceil(4)
}

struct Candidate<'a> {
    utxo: &'a SpendableOutput,
    kind: InputKind,
    redeem_script: Option<Vec<u8>>,
}

/// Build a PSBT paying `amount` to one recipient, change back to the sender
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &UtxoState,
    overrides: &UtxoOverrides,
) -> Result<UtxoTransaction> {
    let transfer = match request {
        TransactionRequest::NativeTransfer(transfer) => transfer,
        other => return Err(unsupported(config, other)),
    };
    let params = config.utxo()?;
    let codec = UtxoAddressCodec::new(params);
    let script_of = |address: &str| -> Result<Vec<u8>> {
        codec
            .decode(address)
            .map(|decoded| decoded.script_pubkey())
            .map_err(|err| TxError::InvalidAddress {
                chain: config.alias,
                address: address.to_string(),
                reason: err.to_string(),
            })
    };
    let invalid = |reason: String| TxError::invalid_transaction(config.alias, reason);

    let change_script = script_of(&transfer.from)?;
    let recipient = TxOut {
        value: u64::try_from(transfer.amount)
            .map_err(|_| invalid(format!("amount {} exceeds u64", transfer.amount)))?,
        script_pubkey: script_of(&transfer.to)?,
    };
    if recipient.value < params.dust_limit {
        return Err(invalid(format!(
            "amount {} is below the dust limit of {}",
            recipient.value, params.dust_limit
        )));
    }

    let public_key = match &transfer.public_key {
        Some(hex_key) => {
            let key = decode_hex(hex_key).map_err(|err| invalid(format!("public key: {err}")))?;
            if key.len() != 33 || !matches!(key[0], 0x02 | 0x03) {
                return Err(invalid("public key must be a 33-byte compressed key".to_string()));
            }
            Some(key)
        }
        None => None,
    };
    let fee_rate = overrides.fee_rate.unwrap_or(state.fee_rate);

    let utxos: Vec<&SpendableOutput> = match &overrides.inputs {
        Some(refs) => refs
            .iter()
            .map(|wanted| {
                state
                    .utxos
                    .iter()
                    .find(|utxo| utxo.txid.eq_ignore_ascii_case(&wanted.txid) && utxo.vout == wanted.vout)
                    .ok_or_else(|| {
                        invalid(format!("input {}:{} is not spendable", wanted.txid, wanted.vout))
                    })
            })
            .collect::<Result<_>>()?,
        None => {
            let mut sorted: Vec<&SpendableOutput> = state.utxos.iter().collect();
            // largest first, ties by outpoint for a stable order
            sorted.sort_by(|a, b| {
                b.value
                    .cmp(&a.value)
                    .then_with(|| a.txid.cmp(&b.txid))
                    .then_with(|| a.vout.cmp(&b.vout))
            });
            sorted
        }
    };
    let take_all = overrides.inputs.is_some();

    let mut selected: Vec<Candidate> = Vec::new();
    let mut total: u64 = 0;
    let mut plan: Option<(u64, Option<TxOut>)> = None;

    for utxo in utxos {
        selected.push(candidate(config, utxo, public_key.as_deref())?);
        total = total.saturating_add(utxo.value);
        if take_all {
            continue;
        }
        plan = settle(
            config,
            &selected,
            total,
            &recipient,
            &change_script,
            fee_rate,
            params.dust_limit,
        )?;
        if plan.is_some() {
            break;
        }
    }
    if take_all {
        plan = settle(
            config,
            &selected,
            total,
            &recipient,
            &change_script,
            fee_rate,
            params.dust_limit,
        )?;
    }

    let (fee, change) = match plan {
        Some(plan) => plan,
        None => {
            let kinds: Vec<InputKind> = selected.iter().map(|c| c.kind).collect();
            let fee = fee_for(config, &kinds, std::slice::from_ref(&recipient), fee_rate)?;
            return Err(TxError::InsufficientFunds {
                chain: config.alias,
                required: u128::from(recipient.value) + u128::from(fee),
                available: u128::from(total),
            });
        }
    };

    let mut inputs = Vec::with_capacity(selected.len());
    let mut psbt_inputs = Vec::with_capacity(selected.len());
    for chosen in &selected {
        let outpoint = OutPoint::from_display(&chosen.utxo.txid, chosen.utxo.vout)
            .map_err(|err| invalid(format!("input txid {}: {err}", chosen.utxo.txid)))?;
        inputs.push(TxIn::new(outpoint, SEQUENCE_RBF));
        psbt_inputs.push(PsbtInput {
            witness_utxo: Some(TxOut {
                value: chosen.utxo.value,
                script_pubkey: chosen.utxo.script_pubkey.clone(),
            }),
            redeem_script: chosen.redeem_script.clone(),
            public_key: match chosen.kind {
                InputKind::P2tr => None,
                _ => public_key.clone(),
            },
            sighash_type: Some(u32::from(chosen.kind.default_sighash())),
            ..Default::default()
        });
    }

    let mut outputs = vec![recipient];
    outputs.extend(change);
    let tx = Transaction {
        version: TX_VERSION,
        inputs,
        outputs,
        lock_time: 0,
    };

    debug!(
        chain = %config.alias,
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        fee,
        fee_rate,
        "built UTXO transaction"
    );
    Ok(UtxoTransaction::new(tx, psbt_inputs))
}

fn candidate<'a>(
    config: &ChainConfig,
    utxo: &'a SpendableOutput,
    public_key: Option<&[u8]>,
) -> Result<Candidate<'a>> {
    let invalid = |reason: String| {
        TxError::invalid_transaction(config.alias, format!("input {}:{}: {reason}", utxo.txid, utxo.vout))
    };

    let redeem_script = match UtxoAddress::from_script_pubkey(&utxo.script_pubkey) {
        Some(UtxoAddress::P2sh(_)) => public_key.map(p2wpkh_script),
        _ => None,
    };
    let kind = InputKind::classify(&utxo.script_pubkey, redeem_script.as_deref())
        .map_err(|err| invalid(err.to_string()))?;

    if kind != InputKind::P2tr {
        let key = public_key.ok_or_else(|| invalid("spending it needs the sender's public key".to_string()))?;
        check_key_matches(kind, &utxo.script_pubkey, key, redeem_script.as_deref())
            .map_err(|err| invalid(err.to_string()))?;
    }

    Ok(Candidate {
        utxo,
        kind,
        redeem_script,
    })
}

/// `fee_rate` sat/vB over the estimated size
fn fee_for(
    config: &ChainConfig,
    kinds: &[InputKind],
    outputs: &[TxOut],
    fee_rate: u64,
) -> Result<u64> {
    (estimate_vsize(kinds, outputs) as u64)
        .checked_mul(fee_rate)
        .ok_or_else(|| {
            TxError::invalid_transaction(config.alias, format!("fee rate {fee_rate} overflows the fee"))
        })
}

/// Fee and optional change output once `total` covers the payment
fn settle(
    config: &ChainConfig,
    selected: &[Candidate],
    total: u64,
    recipient: &TxOut,
    change_script: &[u8],
    fee_rate: u64,
    dust_limit: u64,
) -> Result<Option<(u64, Option<TxOut>)>> {
    let kinds: Vec<InputKind> = selected.iter().map(|c| c.kind).collect();
    let change_template = TxOut {
        value: 0,
        script_pubkey: change_script.to_vec(),
    };

    let fee_with_change = fee_for(
        config,
        &kinds,
        &[recipient.clone(), change_template.clone()],
        fee_rate,
    )?;
    if let Some(change) = total
        .checked_sub(recipient.value)
        .and_then(|rest| rest.checked_sub(fee_with_change))
    {
        if change >= dust_limit {
            return Ok(Some((
                fee_with_change,
                Some(TxOut {
                    value: change,
                    ..change_template
                }),
            )));
        }
    }

    // no change output: whatever is left over goes to the miner
    let fee_without_change = fee_for(config, &kinds, std::slice::from_ref(recipient), fee_rate)?;
    let covered = recipient
        .value
        .checked_add(fee_without_change)
        .is_some_and(|spent| total >= spent);
    Ok(covered.then(|| (total - recipient.value, None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::hash::hash160;
    use crate::recovery::test_keys::{compressed_public_key, signing_key};
    use crate::transaction::overrides::OutPointRef;
    use crate::transaction::{ContractCall, NativeTransfer, TokenTransfer};

    fn config() -> ChainConfig {
        ChainConfig::builtin(ChainAlias::Bitcoin)
    }

    fn sender_key() -> Vec<u8> {
        compressed_public_key(&signing_key(3))
    }

    fn sender_script() -> Vec<u8> {
        p2wpkh_script(&sender_key())
    }

    fn address_of(script: &[u8]) -> String {
        UtxoAddressCodec::new(config().utxo().unwrap())
            .address_of_script(script)
            .unwrap()
    }

    fn utxo(byte: u8, vout: u32, value: u64) -> SpendableOutput {
        SpendableOutput {
            txid: hex::encode([byte; 32]),
            vout,
            value,
            script_pubkey: sender_script(),
        }
    }

    fn recipient() -> String {
        address_of(&UtxoAddress::P2wpkh([0x42; 20]).script_pubkey())
    }

    fn transfer(amount: u128) -> TransactionRequest {
        NativeTransfer::new(address_of(&sender_script()), recipient(), amount)
            .with_public_key(hex::encode(sender_key()))
            .into()
    }

    #[test]
    fn test_largest_first_with_change() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 10_000), utxo(2, 1, 200_000), utxo(3, 0, 50_000)],
            fee_rate: 10,
        };
        let tx = build(&config(), &transfer(100_000), &state, &UtxoOverrides::default()).unwrap();

        assert_eq!(tx.tx.inputs.len(), 1);
        assert_eq!(tx.tx.inputs[0].previous_output.txid, [2u8; 32]);
        assert_eq!(tx.tx.inputs[0].sequence, SEQUENCE_RBF);
        assert_eq!(tx.tx.version, 2);
        assert_eq!(tx.tx.outputs.len(), 2);
        assert_eq!(tx.tx.outputs[0].value, 100_000);
        assert_eq!(tx.tx.outputs[1].script_pubkey, sender_script());

        let vsize = estimate_vsize(&[InputKind::P2wpkh], &tx.tx.outputs) as u64;
        assert_eq!(tx.tx.outputs[1].value, 200_000 - 100_000 - vsize * 10);
        assert_eq!(tx.inputs[0].public_key.as_deref(), Some(sender_key().as_slice()));
        assert_eq!(tx.inputs[0].sighash_type, Some(1));
    }

    #[test]
    fn test_dust_change_goes_to_fee() {
        let vsize = estimate_vsize(
            &[InputKind::P2wpkh],
            &[TxOut {
                value: 0,
                script_pubkey: UtxoAddress::P2wpkh([0x42; 20]).script_pubkey(),
            }],
        ) as u64;
        // leaves 100 sats over the no-change fee: below dust
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 100_000 + vsize * 2 + 100)],
            fee_rate: 2,
        };
        let tx = build(&config(), &transfer(100_000), &state, &UtxoOverrides::default()).unwrap();
        assert_eq!(tx.tx.outputs.len(), 1);
        assert_eq!(tx.fee(), Some(vsize * 2 + 100));
    }

    #[test]
    fn test_insufficient_funds() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 5_000), utxo(2, 0, 4_000)],
            fee_rate: 5,
        };
        let err = build(&config(), &transfer(9_000), &state, &UtxoOverrides::default()).unwrap_err();
        match err {
            TxError::InsufficientFunds {
                chain,
                required,
                available,
            } => {
                assert_eq!(chain, ChainAlias::Bitcoin);
                assert_eq!(available, 9_000);
                assert!(required > 9_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_explicit_inputs_used_in_order() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 300_000), utxo(2, 0, 40_000), utxo(3, 0, 40_000)],
            fee_rate: 1,
        };
        let overrides = UtxoOverrides {
            inputs: Some(vec![
                OutPointRef { txid: hex::encode([3u8; 32]), vout: 0 },
                OutPointRef { txid: hex::encode([2u8; 32]), vout: 0 },
            ]),
            ..Default::default()
        };
        let tx = build(&config(), &transfer(50_000), &state, &overrides).unwrap();
        let spent: Vec<_> = tx.tx.inputs.iter().map(|i| i.previous_output.txid[0]).collect();
        assert_eq!(spent, vec![3, 2]);

        let missing = UtxoOverrides {
            inputs: Some(vec![OutPointRef { txid: hex::encode([9u8; 32]), vout: 0 }]),
            ..Default::default()
        };
        assert!(build(&config(), &transfer(50_000), &state, &missing).is_err());
    }

    #[test]
    fn test_fee_rate_override() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 1_000_000)],
            fee_rate: 1,
        };
        let slow = build(&config(), &transfer(100_000), &state, &UtxoOverrides::default()).unwrap();
        let fast = build(
            &config(),
            &transfer(100_000),
            &state,
            &UtxoOverrides {
                fee_rate: Some(50),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fast.fee().unwrap(), slow.fee().unwrap() * 50);
    }

    #[test]
    fn test_huge_fee_rate_rejected() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 1_000_000)],
            fee_rate: 1,
        };
        let overrides = UtxoOverrides {
            fee_rate: Some(u64::MAX / 100),
            ..Default::default()
        };
        match build(&config(), &transfer(100_000), &state, &overrides) {
            Err(TxError::InvalidTransaction { reason, .. }) => {
                assert!(reason.contains("overflows"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nested_segwit_gets_redeem_script() {
        let key = sender_key();
        let redeem = p2wpkh_script(&key);
        let state = UtxoState {
            utxos: vec![SpendableOutput {
                script_pubkey: UtxoAddress::P2sh(hash160(&redeem)).script_pubkey(),
                ..utxo(1, 0, 100_000)
            }],
            fee_rate: 1,
        };
        let tx = build(&config(), &transfer(10_000), &state, &UtxoOverrides::default()).unwrap();
        assert_eq!(tx.inputs[0].redeem_script, Some(redeem));
    }

    #[test]
    fn test_rejects_unowned_input_and_missing_key() {
        let foreign = SpendableOutput {
            script_pubkey: UtxoAddress::P2wpkh([0x55; 20]).script_pubkey(),
            ..utxo(1, 0, 100_000)
        };
        let state = UtxoState {
            utxos: vec![foreign],
            fee_rate: 1,
        };
        assert!(build(&config(), &transfer(10_000), &state, &UtxoOverrides::default()).is_err());

        let state = UtxoState {
            utxos: vec![utxo(1, 0, 100_000)],
            fee_rate: 1,
        };
        let keyless: TransactionRequest =
            NativeTransfer::new(address_of(&sender_script()), recipient(), 10_000).into();
        assert!(build(&config(), &keyless, &state, &UtxoOverrides::default()).is_err());
    }

    #[test]
    fn test_dust_amount_and_tokens_rejected() {
        let state = UtxoState {
            utxos: vec![utxo(1, 0, 100_000)],
            fee_rate: 1,
        };
        assert!(matches!(
            build(&config(), &transfer(545), &state, &UtxoOverrides::default()),
            Err(TxError::InvalidTransaction { .. })
        ));

        let token: TransactionRequest = TokenTransfer {
            from: address_of(&sender_script()),
            to: recipient(),
            token: recipient(),
            amount: 1,
        }
        .into();
        assert!(matches!(
            build(&config(), &token, &state, &UtxoOverrides::default()),
            Err(TxError::UnsupportedOperation { .. })
        ));

        let call: TransactionRequest = ContractCall {
            from: address_of(&sender_script()),
            contract: recipient(),
            data: vec![],
            value: 0,
            accounts: vec![],
        }
        .into();
        assert!(build(&config(), &call, &state, &UtxoOverrides::default()).is_err());
    }
}
