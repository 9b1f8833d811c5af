use super::network::NetworkState;
use super::normalised::NormalisedTransaction;
use super::overrides::{self, TransactionOverrides};
use super::payload::SigningPayload;
use super::request::TransactionRequest;
use super::signed::SignedTransaction;
use super::{check_signature_count, RawTransaction};
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::{address, evm, solana, substrate, tron, utxo, xrp};
use std::sync::Arc;
use tracing::debug;

/// A built transaction waiting for signatures
///
/// Keeps the request, the network state and the effective overrides it was
/// built from so that [`rebuild`](Self::rebuild) can produce a replacement
/// (speed-up, different inputs, ...) without touching this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    config: Arc<ChainConfig>,
    origin: Option<Origin>,
    sender: Option<String>,
    raw: RawTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    request: TransactionRequest,
    state: NetworkState,
    overrides: Option<TransactionOverrides>,
}

impl UnsignedTransaction {
    /// Build from a request and live network state
    ///
    /// Every address in `request` is validated first, so a malformed address
    /// fails before any state is looked at.
    pub fn build(
        config: Arc<ChainConfig>,
        request: TransactionRequest,
        state: NetworkState,
        overrides: Option<TransactionOverrides>,
    ) -> Result<Self> {
        for address in request.addresses() {
            address::validate(&config, address)?;
        }
        if state.ecosystem() != config.ecosystem() {
            return Err(TxError::invalid_transaction(
                config.alias,
                format!("{} network state supplied", state.ecosystem()),
            ));
        }
        if let Some(overrides) = &overrides {
            overrides.ensure_ecosystem(config.ecosystem())?;
        }

        let raw = build_raw(&config, &request, &state, overrides.as_ref())?;
        debug!(
            chain = %config.alias,
            operation = request.operation(),
            "built unsigned transaction"
        );

        Ok(Self {
            config,
            sender: Some(request.sender().to_string()),
            origin: Some(Origin {
                request,
                state,
                overrides,
            }),
            raw,
        })
    }

    /// Wrap an already constructed raw transaction, e.g. one returned by `decode`
    pub fn from_raw(config: Arc<ChainConfig>, raw: RawTransaction) -> Result<Self> {
        raw.ensure_chain(&config)?;
        if raw.is_signed() {
            return Err(TxError::invalid_transaction(
                config.alias,
                "transaction is already signed",
            ));
        }
        Ok(Self {
            config,
            origin: None,
            sender: None,
            raw,
        })
    }

    /// Record the signing address of a decoded transaction, needed where the
    /// wire signature carries a recovery id (EVM)
    pub fn with_sender(mut self, sender: impl Into<String>) -> Result<Self> {
        let sender = sender.into();
        address::validate(&self.config, &sender)?;
        self.sender = Some(sender);
        Ok(self)
    }

    /// Build a new transaction with `overrides` layered over the current ones
    pub fn rebuild(&self, overrides: TransactionOverrides) -> Result<Self> {
        let origin = self.origin.as_ref().ok_or_else(|| {
            TxError::invalid_transaction(
                self.config.alias,
                "decoded transactions carry no request to rebuild from",
            )
        })?;
        overrides.ensure_ecosystem(self.config.ecosystem())?;

        let merged = match &origin.overrides {
            Some(current) => current.merge(&overrides)?,
            None => overrides,
        };
        Self::build(
            Arc::clone(&self.config),
            origin.request.clone(),
            origin.state.clone(),
            Some(merged),
        )
    }

    pub fn signing_payload(&self) -> Result<SigningPayload> {
        let entries = self.raw.signing_payload(&self.config)?;
        Ok(SigningPayload::from_entries(
            self.config.alias,
            self.config.signature_algorithm(),
            entries,
        ))
    }

    /// Consume the transaction, producing the signed one
    ///
    /// `signatures` must match the signing payload entry for entry. Nothing
    /// is applied unless the whole set is accepted.
    pub fn apply_signature(self, signatures: &[Vec<u8>]) -> Result<SignedTransaction> {
        let expected = self.raw.signing_payload(&self.config)?.len();
        check_signature_count(&self.config, signatures, expected)?;

        let sender = self.sender.as_deref();
        let signed = self.raw.apply_signatures(&self.config, signatures, sender)?;
        SignedTransaction::new(self.config, signed, signatures.to_vec())
    }

    /// Unsigned serialized form, accepted back by `decode`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.raw.serialize_unsigned(&self.config)
    }

    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.serialize()?))
    }

    pub fn normalise(&self) -> Result<NormalisedTransaction> {
        self.raw.normalise(&self.config)
    }

    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn request(&self) -> Option<&TransactionRequest> {
        self.origin.as_ref().map(|origin| &origin.request)
    }

    pub fn network_state(&self) -> Option<&NetworkState> {
        self.origin.as_ref().map(|origin| &origin.state)
    }

    /// Overrides in effect, after merging
    pub fn overrides(&self) -> Option<&TransactionOverrides> {
        self.origin.as_ref().and_then(|origin| origin.overrides.as_ref())
    }
}

fn build_raw(
    config: &ChainConfig,
    request: &TransactionRequest,
    state: &NetworkState,
    overrides: Option<&TransactionOverrides>,
) -> Result<RawTransaction> {
    let raw = match state {
        NetworkState::Evm(state) => RawTransaction::Evm(evm::build(
            config,
            request,
            state,
            &overrides::evm_overrides(overrides)?,
        )?),
        NetworkState::Svm(state) => RawTransaction::Svm(solana::build(
            config,
            request,
            state,
            &overrides::solana_overrides(overrides)?,
        )?),
        NetworkState::Utxo(state) => RawTransaction::Utxo(utxo::build(
            config,
            request,
            state,
            &overrides::utxo_overrides(overrides)?,
        )?),
        NetworkState::Tvm(state) => RawTransaction::Tvm(tron::build(
            config,
            request,
            state,
            &overrides::tron_overrides(overrides)?,
        )?),
        NetworkState::Xrp(state) => RawTransaction::Xrp(xrp::build(
            config,
            request,
            state,
            &overrides::xrp_overrides(overrides)?,
        )?),
        NetworkState::Substrate(state) => RawTransaction::Substrate(substrate::build(
            config,
            request,
            state,
            &overrides::substrate_overrides(overrides)?,
        )?),
    };
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainAlias, Ecosystem};
    use crate::transaction::overrides::{EvmOverrides, SubstrateOverrides};
    use crate::transaction::{EvmState, NativeTransfer};

    fn transfer() -> UnsignedTransaction {
        let request = NativeTransfer::new(
            "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F",
            "0x3535353535353535353535353535353535353535",
            1_000,
        )
        .into();
        let state = NetworkState::Evm(EvmState {
            nonce: 4,
            gas_limit: 21_000,
            gas_price: 20_000_000_000,
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        });
        UnsignedTransaction::build(
            Arc::new(ChainConfig::builtin(ChainAlias::Ethereum)),
            request,
            state,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_rebuild_leaves_original_untouched() {
        let original = transfer();
        let snapshot = original.clone();

        let rebuilt = original
            .rebuild(TransactionOverrides::Evm(EvmOverrides {
                nonce: Some(99),
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(original, snapshot);

        let mut expected = match original.raw() {
            RawTransaction::Evm(tx) => tx.clone(),
            other => panic!("unexpected {other:?}"),
        };
        expected.nonce = 99;
        assert_eq!(rebuilt.raw(), &RawTransaction::Evm(expected));
        assert_eq!(rebuilt.request(), original.request());
        assert_eq!(rebuilt.network_state(), original.network_state());

        // overrides layer: a second rebuild keeps the earlier nonce
        let layered = rebuilt
            .rebuild(TransactionOverrides::Evm(EvmOverrides {
                gas_limit: Some(50_000),
                ..Default::default()
            }))
            .unwrap();
        match layered.raw() {
            RawTransaction::Evm(tx) => {
                assert_eq!(tx.nonce, 99);
                assert_eq!(tx.gas_limit, 50_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_rejects_other_ecosystem() {
        let original = transfer();
        let err = original
            .rebuild(TransactionOverrides::Substrate(SubstrateOverrides::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            TxError::OverrideMismatch {
                expected: Ecosystem::Evm,
                actual: Ecosystem::Substrate,
            }
        ));
        assert_eq!(original, transfer());
    }
}
