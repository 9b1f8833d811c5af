//! Substrate extrinsics (v4, `MultiAddress::Id` signer, `MultiSignature`)
//!
//! Signatures are sr25519 or ed25519 depending on the chain's configured
//! scheme and are placed into the extrinsic unchanged.

mod builder;
pub mod call;
pub mod era;
pub mod extrinsic;

pub use builder::build;
pub use call::SubstrateCall;
pub use era::Era;

use crate::address::ss58::encode_address;
use crate::chain::{ChainConfig, Ecosystem, SubstrateScheme};
use crate::error::{Result, TxError};
use crate::hash::blake2b_256;
use crate::transaction::normalised::ContractCallInfo;
use crate::transaction::{
    check_signatures, ChainTransaction, NormalisedTransaction, PayloadEntry, TransactionKind,
};

/// Data signed over but not carried by the extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditionalSigned {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: [u8; 32],
    /// Hash of the era's checkpoint block, or the genesis hash when immortal
    pub block_hash: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiSignature {
    Ed25519([u8; 64]),
    Sr25519([u8; 64]),
}

impl MultiSignature {
    pub fn bytes(&self) -> &[u8; 64] {
        match self {
            MultiSignature::Ed25519(bytes) | MultiSignature::Sr25519(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstrateTransaction {
    /// Sender public key
    pub signer: [u8; 32],
    pub call: SubstrateCall,
    pub era: Era,
    pub nonce: u32,
    pub tip: u128,
    /// Runtime carries the `CheckMetadataHash` extension
    pub metadata_hash_check: bool,
    /// Known when built or decoded from the unsigned form; a broadcast
    /// extrinsic does not carry it
    pub additional: Option<AdditionalSigned>,
    pub signature: Option<MultiSignature>,
}

impl SubstrateTransaction {
    /// `0x`-prefixed blake2b-256 of the extrinsic
    pub fn hash_of(wire: &[u8]) -> String {
        format!("0x{}", hex::encode(blake2b_256(wire)))
    }
}

impl ChainTransaction for SubstrateTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Substrate;

    fn signing_payload(&self, config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        Ok(vec![PayloadEntry::new(
            config.signature_algorithm(),
            extrinsic::signing_payload(self)?,
        )])
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        _sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, 1, 64)?;
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&signatures[0]);
        let signature = match config.substrate()?.signature_scheme {
            SubstrateScheme::Sr25519 => MultiSignature::Sr25519(bytes),
            SubstrateScheme::Ed25519 => MultiSignature::Ed25519(bytes),
        };
        Ok(Self {
            signature: Some(signature),
            ..self.clone()
        })
    }

    fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.signature
            .iter()
            .map(|signature| signature.bytes().to_vec())
            .collect()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(extrinsic::encode_unsigned(self)?)
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        let signature = self.signature.as_ref().ok_or_else(|| {
            TxError::invalid_transaction(config.alias, "transaction is not signed")
        })?;
        Ok(extrinsic::encode_signed(self, signature))
    }

    fn transaction_hash(&self, _config: &ChainConfig, wire: &[u8]) -> Result<String> {
        Ok(Self::hash_of(wire))
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        let params = config.substrate()?;
        extrinsic::decode(params, bytes).map_err(|err| TxError::parse(config.ecosystem(), err))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let prefix = config.substrate()?.ss58_prefix;
        let mut normalised = match &self.call {
            SubstrateCall::Transfer { dest, amount, .. } => {
                let mut normalised =
                    NormalisedTransaction::new(config, TransactionKind::NativeTransfer)
                        .with_value(config, *amount);
                normalised.to = encode_address(dest, prefix).ok();
                normalised
            }
            SubstrateCall::Raw(bytes) => {
                let mut normalised = NormalisedTransaction::new(config, TransactionKind::Unknown);
                normalised.contract_call = Some(ContractCallInfo {
                    contract: self
                        .call
                        .indices()
                        .map(|(pallet, _)| format!("pallet {pallet}"))
                        .unwrap_or_default(),
                    method: bytes.get(..2).map(hex::encode),
                    data: hex::encode(bytes),
                });
                normalised
            }
        };
        normalised.from = encode_address(&self.signer, prefix).ok();

        normalised = normalised
            .with_metadata("nonce", self.nonce)
            .with_metadata("era", self.era);
        if self.tip > 0 {
            normalised = normalised.with_metadata("tip", self.tip);
        }
        if let Some(additional) = &self.additional {
            normalised = normalised
                .with_metadata("specVersion", additional.spec_version)
                .with_metadata("transactionVersion", additional.transaction_version)
                .with_metadata("genesisHash", format!("0x{}", hex::encode(additional.genesis_hash)));
        }
        if let Some(signature) = &self.signature {
            let wire = extrinsic::encode_signed(self, signature);
            normalised = normalised.with_metadata("hash", Self::hash_of(&wire));
        }
        Ok(normalised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainAlias, SignatureAlgorithm};
    use crate::transaction::network::SubstrateState;
    use crate::transaction::overrides::SubstrateOverrides;
    use crate::transaction::NativeTransfer;

    fn config() -> ChainConfig {
        ChainConfig::builtin(ChainAlias::Kusama)
    }

    fn transfer() -> SubstrateTransaction {
        let request = NativeTransfer::new(
            encode_address(&[7; 32], 2).unwrap(),
            encode_address(&[8; 32], 2).unwrap(),
            1_500_000_000_000,
        )
        .into();
        let state = SubstrateState {
            nonce: 3,
            genesis_hash: [0xb0; 32],
            block_number: 25_000_000,
            block_hash: [0xc1; 32],
            spec_version: 1_003_000,
            transaction_version: 26,
        };
        build(&config(), &request, &state, &SubstrateOverrides::default()).unwrap()
    }

    #[test]
    fn test_payload_and_signing() {
        let config = config();
        let tx = transfer();
        let payload = tx.signing_payload(&config).unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].algorithm, SignatureAlgorithm::Sr25519);

        let signed = tx.apply_signatures(&config, &[vec![0x3c; 64]], None).unwrap();
        assert_eq!(signed.signature, Some(MultiSignature::Sr25519([0x3c; 64])));
        assert_eq!(signed.signatures(), vec![vec![0x3c; 64]]);

        let wire = signed.serialize_signed(&config).unwrap();
        let hash = signed.transaction_hash(&config, &wire).unwrap();
        assert_eq!(hash, format!("0x{}", hex::encode(blake2b_256(&wire))));

        let decoded = SubstrateTransaction::decode(&config, &wire).unwrap();
        assert_eq!(decoded.signature, signed.signature);
        assert_eq!(decoded.call, signed.call);
        assert_eq!(decoded.normalise(&config).unwrap().metadata["hash"], hash);
    }

    #[test]
    fn test_signature_checks() {
        let config = config();
        let tx = transfer();
        assert!(matches!(
            tx.apply_signatures(&config, &[vec![0; 63]], None),
            Err(TxError::Signature { .. })
        ));
        assert!(matches!(
            tx.apply_signatures(&config, &[vec![0; 64], vec![0; 64]], None),
            Err(TxError::SignatureCountMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(tx.serialize_signed(&config).is_err());
    }

    #[test]
    fn test_unsigned_round_trip_and_normalise() {
        let config = config();
        let tx = transfer();
        let bytes = tx.serialize_unsigned(&config).unwrap();
        assert_eq!(SubstrateTransaction::decode(&config, &bytes).unwrap(), tx);

        let normalised = tx.normalise(&config).unwrap();
        assert_eq!(normalised.kind, TransactionKind::NativeTransfer);
        assert_eq!(normalised.formatted_value, "1.5");
        assert_eq!(normalised.symbol, "KSM");
        assert_eq!(normalised.from, Some(encode_address(&[7; 32], 2).unwrap()));
        assert_eq!(normalised.metadata["nonce"], "3");
        assert_eq!(
            normalised.metadata["era"],
            format!("mortal(64, {})", 25_000_000u64 % 64)
        );
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(matches!(
            SubstrateTransaction::decode(&config(), &[0x10, 0x84, 0x00]),
            Err(TxError::Parse { ecosystem: Ecosystem::Substrate, .. })
        ));
    }
}
