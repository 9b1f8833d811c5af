use super::codec::MAX_DROPS;
use super::{XrpTransaction, TF_FULLY_CANONICAL_SIG};
use crate::address::{AddressCodec, XrpAddressCodec};
use crate::chain::ChainConfig;
use crate::codec::decode_hex;
use crate::error::{Result, TxError};
use crate::hash::hash160;
use crate::transaction::network::XrpState;
use crate::transaction::overrides::XrpOverrides;
use crate::transaction::{unsupported, TransactionRequest};
use tracing::debug;

/// Build an XRP `Payment`
///
/// The memo, when present, must be a numeric destination tag. The sender's
/// compressed secp256k1 key is required and must hash to the `from` account.
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &XrpState,
    overrides: &XrpOverrides,
) -> Result<XrpTransaction> {
    let transfer = match request {
        TransactionRequest::NativeTransfer(transfer) => transfer,
        other => return Err(unsupported(config, other)),
    };
    let params = config.xrp()?;
    let invalid = |reason: String| TxError::invalid_transaction(config.alias, reason);
    let account = |value: &str| {
        XrpAddressCodec
            .decode(value)
            .map_err(|err| TxError::InvalidAddress {
                chain: config.alias,
                address: value.to_string(),
                reason: err.to_string(),
            })
    };

    let from = account(&transfer.from)?;
    let destination = account(&transfer.to)?;

    let public_key = transfer
        .public_key
        .as_deref()
        .ok_or_else(|| invalid("XRP payments need the sender's public key".to_string()))
        .and_then(|key| {
            decode_hex(key).map_err(|err| invalid(format!("public key: {err}")))
        })?;
    if public_key.len() != 33 || !matches!(public_key[0], 0x02 | 0x03) {
        return Err(invalid(
            "public key must be a 33-byte compressed secp256k1 key".to_string(),
        ));
    }
    if hash160(&public_key) != from {
        return Err(invalid(format!(
            "public key does not belong to {}",
            transfer.from
        )));
    }

    let amount = u64::try_from(transfer.amount)
        .ok()
        .filter(|drops| *drops <= MAX_DROPS)
        .ok_or_else(|| invalid(format!("{} drops exceeds the XRP supply", transfer.amount)))?;

    let destination_tag = transfer
        .memo
        .as_deref()
        .map(|memo| {
            memo.trim()
                .parse::<u32>()
                .map_err(|_| invalid(format!("destination tag {memo:?} is not a 32-bit integer")))
        })
        .transpose()?;

    let fee = overrides.fee.unwrap_or(state.fee.max(params.base_fee));
    let sequence = overrides.sequence.unwrap_or(state.sequence);
    let offset = overrides.ledger_offset.unwrap_or(params.ledger_offset);
    let last_ledger_sequence = state
        .ledger_index
        .checked_add(offset)
        .ok_or_else(|| invalid("last ledger sequence overflows".to_string()))?;

    let tx = XrpTransaction {
        account: from,
        destination,
        amount,
        fee,
        sequence,
        flags: TF_FULLY_CANONICAL_SIG,
        destination_tag,
        last_ledger_sequence: Some(last_ledger_sequence),
        signing_pub_key: public_key,
        txn_signature: None,
    };
    debug!(
        chain = %config.alias,
        sequence,
        fee,
        last_ledger_sequence,
        "built XRP payment"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::recovery::test_keys::{compressed_public_key, signing_key};
    use crate::transaction::{NativeTransfer, TokenTransfer};

    fn sender() -> (String, String) {
        let public_key = compressed_public_key(&signing_key(4));
        let address = XrpAddressCodec.encode(&hash160(&public_key)).unwrap();
        (address, hex::encode(public_key))
    }

    fn state() -> XrpState {
        XrpState {
            sequence: 41,
            ledger_index: 90_000_000,
            fee: 10,
        }
    }

    #[test]
    fn test_payment_defaults() {
        let config = ChainConfig::builtin(ChainAlias::Xrp);
        let (from, public_key) = sender();
        let request = NativeTransfer::new(from, "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh", 25_000_000)
            .with_memo("12345")
            .with_public_key(public_key)
            .into();
        let tx = build(&config, &request, &state(), &XrpOverrides::default()).unwrap();

        // state fee below the configured base fee
        assert_eq!(tx.fee, 12);
        assert_eq!(tx.sequence, 41);
        assert_eq!(tx.last_ledger_sequence, Some(90_000_020));
        assert_eq!(tx.destination_tag, Some(12345));
        assert_eq!(tx.flags, TF_FULLY_CANONICAL_SIG);
        assert_eq!(tx.amount, 25_000_000);
    }

    #[test]
    fn test_overrides_win() {
        let config = ChainConfig::builtin(ChainAlias::Xrp);
        let (from, public_key) = sender();
        let request = NativeTransfer::new(from, "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh", 1)
            .with_public_key(public_key)
            .into();
        let overrides = XrpOverrides {
            fee: Some(5_000),
            sequence: Some(7),
            ledger_offset: Some(4),
        };
        let tx = build(&config, &request, &state(), &overrides).unwrap();
        assert_eq!((tx.fee, tx.sequence), (5_000, 7));
        assert_eq!(tx.last_ledger_sequence, Some(90_000_004));
        assert_eq!(tx.destination_tag, None);
    }

    #[test]
    fn test_rejections() {
        let config = ChainConfig::builtin(ChainAlias::Xrp);
        let (from, public_key) = sender();
        let to = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

        let no_key = NativeTransfer::new(from.clone(), to, 1).into();
        assert!(build(&config, &no_key, &state(), &XrpOverrides::default()).is_err());

        let bad_tag = NativeTransfer::new(from.clone(), to, 1)
            .with_memo("invoice 7")
            .with_public_key(public_key.clone())
            .into();
        assert!(matches!(
            build(&config, &bad_tag, &state(), &XrpOverrides::default()),
            Err(TxError::InvalidTransaction { .. })
        ));

        let foreign_key = NativeTransfer::new(to, from.clone(), 1)
            .with_public_key(public_key)
            .into();
        assert!(build(&config, &foreign_key, &state(), &XrpOverrides::default()).is_err());

        let token = TokenTransfer {
            from,
            to: to.to_string(),
            token: to.to_string(),
            amount: 1,
        }
        .into();
        assert!(matches!(
            build(&config, &token, &state(), &XrpOverrides::default()),
            Err(TxError::UnsupportedOperation { .. })
        ));
    }
}
