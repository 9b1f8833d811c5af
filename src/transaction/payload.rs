//! What an external signer is asked to sign

use crate::chain::{ChainAlias, SignatureAlgorithm};
use crate::codec::decode_hex;
use crate::error::{CodecResult, Result};
use serde::{Deserialize, Serialize};

/// One message to sign and the algorithm to sign it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub algorithm: SignatureAlgorithm,
    pub data: Vec<u8>,
}

impl PayloadEntry {
    pub fn new(algorithm: SignatureAlgorithm, data: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            data: data.into(),
        }
    }
}

/// Signing request handed to a signer
///
/// `data` holds one hex string per required signature, in the order the
/// signatures must be returned. `algorithm` is the algorithm of the first
/// entry; UTXO transactions mixing Taproot and ECDSA inputs list the
/// per-entry algorithm in `algorithms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningPayload {
    pub chain_alias: ChainAlias,
    pub algorithm: SignatureAlgorithm,
    pub data: Vec<String>,
    pub algorithms: Vec<SignatureAlgorithm>,
}

impl SigningPayload {
    pub(crate) fn from_entries(
        chain_alias: ChainAlias,
        fallback: SignatureAlgorithm,
        entries: Vec<PayloadEntry>,
    ) -> Self {
        let algorithm = entries.first().map(|entry| entry.algorithm).unwrap_or(fallback);
        let algorithms = entries.iter().map(|entry| entry.algorithm).collect();
        let data = entries.iter().map(|entry| hex::encode(&entry.data)).collect();
        Self {
            chain_alias,
            algorithm,
            data,
            algorithms,
        }
    }

    /// Number of signatures `apply_signature` expects
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries as raw bytes
    pub fn data_bytes(&self) -> Result<Vec<Vec<u8>>> {
        let entries = self
            .data
            .iter()
            .map(|entry| decode_hex(entry))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() {
        let payload = SigningPayload::from_entries(
            ChainAlias::Solana,
            SignatureAlgorithm::Ed25519,
            vec![PayloadEntry::new(SignatureAlgorithm::Ed25519, vec![0xab, 0xcd])],
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chainAlias"], "solana");
        assert_eq!(json["algorithm"], "ed25519");
        assert_eq!(json["data"][0], "abcd");
        assert_eq!(payload.data_bytes().unwrap(), vec![vec![0xab, 0xcd]]);
    }

    #[test]
    fn test_mixed_algorithms_listed_per_entry() {
        let payload = SigningPayload::from_entries(
            ChainAlias::Bitcoin,
            SignatureAlgorithm::Secp256k1Ecdsa,
            vec![
                PayloadEntry::new(SignatureAlgorithm::Secp256k1Ecdsa, [1u8; 32]),
                PayloadEntry::new(SignatureAlgorithm::Secp256k1Schnorr, [2u8; 32]),
            ],
        );
        assert_eq!(payload.algorithm, SignatureAlgorithm::Secp256k1Ecdsa);
        assert_eq!(
            payload.algorithms,
            vec![
                SignatureAlgorithm::Secp256k1Ecdsa,
                SignatureAlgorithm::Secp256k1Schnorr
            ]
        );
        assert_eq!(payload.len(), 2);
    }
}
