use super::call::SubstrateCall;
use super::era::Era;
use super::{AdditionalSigned, SubstrateTransaction};
use crate::address::{AddressCodec, Ss58Codec};
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::transaction::network::SubstrateState;
use crate::transaction::overrides::SubstrateOverrides;
use crate::transaction::{unsupported, TransactionRequest};
use tracing::debug;

/// Build a `Balances.transfer_keep_alive` extrinsic
///
/// A mortal era is anchored at `state.block_number`, so `state.block_hash`
/// must be that block's hash. An immortal era signs over the genesis hash.
pub fn build(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &SubstrateState,
    overrides: &SubstrateOverrides,
) -> Result<SubstrateTransaction> {
    let transfer = match request {
        TransactionRequest::NativeTransfer(transfer) => transfer,
        other => return Err(unsupported(config, other)),
    };
    let params = config.substrate()?;
    if transfer.memo.is_some() {
        return Err(TxError::invalid_transaction(
            config.alias,
            "balance transfers cannot carry a memo",
        ));
    }

    let codec = Ss58Codec::new(params.ss58_prefix);
    let account = |value: &str| {
        codec
            .decode(value)
            .map(|decoded| decoded.public_key)
            .map_err(|err| TxError::InvalidAddress {
                chain: config.alias,
                address: value.to_string(),
                reason: err.to_string(),
            })
    };
    let signer = account(&transfer.from)?;
    let dest = account(&transfer.to)?;

    let era = match overrides.era_period.unwrap_or(params.default_era_period) {
        0 => Era::Immortal,
        period => Era::mortal(period, state.block_number),
    };
    let block_hash = if era.is_immortal() {
        state.genesis_hash
    } else {
        state.block_hash
    };

    let tx = SubstrateTransaction {
        signer,
        call: SubstrateCall::transfer(params, dest, transfer.amount),
        era,
        nonce: overrides.nonce.unwrap_or(state.nonce),
        tip: overrides.tip.unwrap_or(0),
        metadata_hash_check: params.metadata_hash_check,
        additional: Some(AdditionalSigned {
            spec_version: state.spec_version,
            transaction_version: state.transaction_version,
            genesis_hash: state.genesis_hash,
            block_hash,
        }),
        signature: None,
    };
    debug!(
        chain = %config.alias,
        nonce = tx.nonce,
        tip = tx.tip,
        era = %tx.era,
        "built Substrate extrinsic"
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ss58::encode_address;
    use crate::chain::ChainAlias;
    use crate::transaction::{ContractDeploy, NativeTransfer};

    fn state() -> SubstrateState {
        SubstrateState {
            nonce: 9,
            genesis_hash: [0x91; 32],
            block_number: 22_000_123,
            block_hash: [0x42; 32],
            spec_version: 1_003_000,
            transaction_version: 26,
        }
    }

    fn request(memo: Option<&str>) -> TransactionRequest {
        let mut transfer = NativeTransfer::new(
            encode_address(&[1; 32], 0).unwrap(),
            encode_address(&[2; 32], 0).unwrap(),
            10_000_000_000,
        );
        if let Some(memo) = memo {
            transfer = transfer.with_memo(memo);
        }
        transfer.into()
    }

    #[test]
    fn test_mortal_transfer() {
        let config = ChainConfig::builtin(ChainAlias::Polkadot);
        let tx = build(&config, &request(None), &state(), &SubstrateOverrides::default()).unwrap();
        assert_eq!(tx.signer, [1; 32]);
        assert_eq!(
            tx.call,
            SubstrateCall::Transfer {
                pallet_index: 5,
                call_index: 3,
                dest: [2; 32],
                amount: 10_000_000_000,
            }
        );
        assert_eq!(tx.era, Era::mortal(64, 22_000_123));
        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.additional.unwrap().block_hash, [0x42; 32]);
    }

    #[test]
    fn test_immortal_override() {
        let config = ChainConfig::builtin(ChainAlias::Polkadot);
        let overrides = SubstrateOverrides {
            tip: Some(1_000),
            nonce: Some(10),
            era_period: Some(0),
        };
        let tx = build(&config, &request(None), &state(), &overrides).unwrap();
        assert_eq!(tx.era, Era::Immortal);
        assert_eq!((tx.tip, tx.nonce), (1_000, 10));
        assert_eq!(tx.additional.unwrap().block_hash, [0x91; 32]);
    }

    #[test]
    fn test_rejections() {
        let config = ChainConfig::builtin(ChainAlias::Polkadot);
        assert!(build(&config, &request(Some("hi")), &state(), &SubstrateOverrides::default()).is_err());

        // Kusama address on Polkadot
        let wrong_network = NativeTransfer::new(
            encode_address(&[1; 32], 2).unwrap(),
            encode_address(&[2; 32], 0).unwrap(),
            1,
        )
        .into();
        assert!(matches!(
            build(&config, &wrong_network, &state(), &SubstrateOverrides::default()),
            Err(TxError::InvalidAddress { .. })
        ));

        let deploy = ContractDeploy {
            from: encode_address(&[1; 32], 0).unwrap(),
            bytecode: vec![0],
            value: 0,
        }
        .into();
        assert!(matches!(
            build(&config, &deploy, &state(), &SubstrateOverrides::default()),
            Err(TxError::UnsupportedOperation { .. })
        ));
    }
}
