//! The ecosystem-agnostic transaction lifecycle
//!
//! `TransactionRequest + NetworkState (+ overrides)` is built into an
//! [`UnsignedTransaction`], which yields a [`SigningPayload`]. Applying the
//! signer's output produces a [`SignedTransaction`] carrying the wire bytes and
//! the transaction hash. Every value is immutable; rebuilding or signing
//! returns a new one.

pub mod decode;
pub mod network;
pub mod normalised;
pub mod overrides;
pub mod payload;
pub mod request;
pub mod signed;
pub mod unsigned;

use crate::chain::{ChainConfig, Ecosystem};
use crate::error::{Result, TxError};
use crate::evm::EvmTransaction;
use crate::solana::SolanaTransaction;
use crate::substrate::SubstrateTransaction;
use crate::tron::TronTransaction;
use crate::utxo::UtxoTransaction;
use crate::xrp::XrpTransaction;

pub use decode::{decode, DecodeFormat, Decoded};
pub use network::{
    EvmState, NetworkState, SolanaState, SpendableOutput, SubstrateState, TronState, UtxoState,
    XrpState,
};
pub use normalised::{format_units, NormalisedTransaction, TransactionKind};
pub use overrides::TransactionOverrides;
pub use payload::{PayloadEntry, SigningPayload};
pub use request::{
    CallAccount, ContractCall, ContractDeploy, NativeTransfer, TokenTransfer, TransactionRequest,
};
pub use signed::SignedTransaction;
pub use unsigned::UnsignedTransaction;

/// Behaviour every ecosystem's raw transaction provides
pub trait ChainTransaction: Sized {
    const ECOSYSTEM: Ecosystem;

    /// What the signer must sign, one entry per required signature
    fn signing_payload(&self, config: &ChainConfig) -> Result<Vec<PayloadEntry>>;

    /// Return a copy carrying `signatures`, in signing payload order
    ///
    /// `sender` is the requesting address when known; formats that need a
    /// recovery id use it to pick one.
    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        sender: Option<&str>,
    ) -> Result<Self>;

    fn is_signed(&self) -> bool;

    /// Signatures as handed in by the signer
    fn signatures(&self) -> Vec<Vec<u8>>;

    fn serialize_unsigned(&self, config: &ChainConfig) -> Result<Vec<u8>>;

    /// Broadcastable wire bytes; fails while unsigned
    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>>;

    /// Canonical hash or id of the signed transaction
    fn transaction_hash(&self, config: &ChainConfig, wire: &[u8]) -> Result<String>;

    /// Parse either serialized form
    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self>;

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction>;
}

/// One raw transaction of any ecosystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTransaction {
    Evm(EvmTransaction),
    Svm(SolanaTransaction),
    Utxo(UtxoTransaction),
    Tvm(TronTransaction),
    Xrp(XrpTransaction),
    Substrate(SubstrateTransaction),
}

macro_rules! dispatch {
    ($raw:expr, $tx:ident => $body:expr) => {
        match $raw {
            RawTransaction::Evm($tx) => $body,
            RawTransaction::Svm($tx) => $body,
            RawTransaction::Utxo($tx) => $body,
            RawTransaction::Tvm($tx) => $body,
            RawTransaction::Xrp($tx) => $body,
            RawTransaction::Substrate($tx) => $body,
        }
    };
}

impl RawTransaction {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            RawTransaction::Evm(_) => Ecosystem::Evm,
            RawTransaction::Svm(_) => Ecosystem::Svm,
            RawTransaction::Utxo(_) => Ecosystem::Utxo,
            RawTransaction::Tvm(_) => Ecosystem::Tvm,
            RawTransaction::Xrp(_) => Ecosystem::Xrp,
            RawTransaction::Substrate(_) => Ecosystem::Substrate,
        }
    }

    /// Fail unless this transaction belongs to `config`'s ecosystem
    pub fn ensure_chain(&self, config: &ChainConfig) -> Result<()> {
        if self.ecosystem() != config.ecosystem() {
            return Err(TxError::invalid_transaction(
                config.alias,
                format!("{} transaction cannot be used on this chain", self.ecosystem()),
            ));
        }
        Ok(())
    }

    pub fn signing_payload(&self, config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        dispatch!(self, tx => tx.signing_payload(config))
    }

    pub fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        sender: Option<&str>,
    ) -> Result<RawTransaction> {
        Ok(match self {
            RawTransaction::Evm(tx) => {
                RawTransaction::Evm(tx.apply_signatures(config, signatures, sender)?)
            }
            RawTransaction::Svm(tx) => {
                RawTransaction::Svm(tx.apply_signatures(config, signatures, sender)?)
            }
            RawTransaction::Utxo(tx) => {
                RawTransaction::Utxo(tx.apply_signatures(config, signatures, sender)?)
            }
            RawTransaction::Tvm(tx) => {
                RawTransaction::Tvm(tx.apply_signatures(config, signatures, sender)?)
            }
            RawTransaction::Xrp(tx) => {
                RawTransaction::Xrp(tx.apply_signatures(config, signatures, sender)?)
            }
            RawTransaction::Substrate(tx) => {
                RawTransaction::Substrate(tx.apply_signatures(config, signatures, sender)?)
            }
        })
    }

    pub fn is_signed(&self) -> bool {
        dispatch!(self, tx => tx.is_signed())
    }

    pub fn signatures(&self) -> Vec<Vec<u8>> {
        dispatch!(self, tx => tx.signatures())
    }

    pub fn serialize_unsigned(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        dispatch!(self, tx => tx.serialize_unsigned(config))
    }

    pub fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        dispatch!(self, tx => tx.serialize_signed(config))
    }

    /// The signed wire form when signed, otherwise the unsigned encoding
    pub fn serialize(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        if self.is_signed() {
            self.serialize_signed(config)
        } else {
            self.serialize_unsigned(config)
        }
    }

    pub fn transaction_hash(&self, config: &ChainConfig, wire: &[u8]) -> Result<String> {
        dispatch!(self, tx => tx.transaction_hash(config, wire))
    }

    pub fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        dispatch!(self, tx => tx.normalise(config))
    }

    /// Parse serialized bytes with the codec of `config`'s ecosystem
    pub fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<RawTransaction> {
        Ok(match config.ecosystem() {
            Ecosystem::Evm => RawTransaction::Evm(EvmTransaction::decode(config, bytes)?),
            Ecosystem::Svm => RawTransaction::Svm(SolanaTransaction::decode(config, bytes)?),
            Ecosystem::Utxo => RawTransaction::Utxo(UtxoTransaction::decode(config, bytes)?),
            Ecosystem::Tvm => RawTransaction::Tvm(TronTransaction::decode(config, bytes)?),
            Ecosystem::Xrp => RawTransaction::Xrp(XrpTransaction::decode(config, bytes)?),
            Ecosystem::Substrate => {
                RawTransaction::Substrate(SubstrateTransaction::decode(config, bytes)?)
            }
        })
    }
}

/// Fail unless exactly `expected` signatures were supplied
pub(crate) fn check_signature_count(
    config: &ChainConfig,
    signatures: &[Vec<u8>],
    expected: usize,
) -> Result<()> {
    if signatures.is_empty() {
        return Err(TxError::MissingSignatures { chain: config.alias });
    }
    if signatures.len() != expected {
        return Err(TxError::SignatureCountMismatch {
            chain: config.alias,
            expected,
            actual: signatures.len(),
        });
    }
    Ok(())
}

/// Count check plus a fixed length for every signature
pub(crate) fn check_signatures(
    config: &ChainConfig,
    signatures: &[Vec<u8>],
    expected: usize,
    len: usize,
) -> Result<()> {
    check_signature_count(config, signatures, expected)?;
    for (index, signature) in signatures.iter().enumerate() {
        if signature.len() != len {
            return Err(TxError::signature(
                config.alias,
                format!(
                    "signature {index} must be {len} bytes, got {}",
                    signature.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Reject a request kind the ecosystem has no meaning for
pub(crate) fn unsupported(config: &ChainConfig, request: &TransactionRequest) -> TxError {
    TxError::UnsupportedOperation {
        chain: config.alias,
        operation: request.operation(),
    }
}
