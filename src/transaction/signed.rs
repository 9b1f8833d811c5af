use super::normalised::NormalisedTransaction;
use super::RawTransaction;
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::provider::ChainProvider;
use std::sync::Arc;

/// A fully signed transaction
///
/// The wire bytes and hash are computed once when the value is created and
/// never change, so broadcasting the same value twice submits identical
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    config: Arc<ChainConfig>,
    raw: RawTransaction,
    signatures: Vec<Vec<u8>>,
    wire: Vec<u8>,
    hash: String,
}

impl SignedTransaction {
    pub(crate) fn new(
        config: Arc<ChainConfig>,
        raw: RawTransaction,
        signatures: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let wire = raw.serialize_signed(&config)?;
        let hash = raw.transaction_hash(&config, &wire)?;
        Ok(Self {
            config,
            raw,
            signatures,
            wire,
            hash,
        })
    }

    /// Wrap a decoded transaction that already carries its signatures
    pub fn from_raw(config: Arc<ChainConfig>, raw: RawTransaction) -> Result<Self> {
        raw.ensure_chain(&config)?;
        if !raw.is_signed() {
            return Err(TxError::MissingSignatures { chain: config.alias });
        }
        let signatures = raw.signatures();
        Self::new(config, raw, signatures)
    }

    /// Broadcastable bytes
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.wire)
    }

    /// Transaction hash or id in the chain's usual notation
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn normalise(&self) -> Result<NormalisedTransaction> {
        let normalised = self.raw.normalise(&self.config)?;
        Ok(normalised.with_metadata("hash", &self.hash))
    }

    /// Submit through `provider`, returning the transaction hash
    pub async fn broadcast(&self, provider: &dyn ChainProvider) -> Result<String> {
        provider.broadcast(self).await
    }
}
