//! XRP Ledger `Payment` transactions
//!
//! The signer signs `sha512_half("STX\0" || fields without TxnSignature)`;
//! the DER-encoded signature lands in `TxnSignature` and the transaction id
//! is `sha512_half("TXN\0" || signed blob)` in uppercase hex.

mod builder;
pub mod codec;

pub use builder::build;

use crate::address::{AddressCodec, XrpAddressCodec};
use crate::chain::{ChainConfig, Ecosystem, SignatureAlgorithm};
use crate::codec::der::{signature_from_der, signature_to_der};
use crate::error::{Result, TxError};
use crate::hash::sha512_half;
use crate::transaction::{
    check_signatures, ChainTransaction, NormalisedTransaction, PayloadEntry, TransactionKind,
};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};

/// `tfFullyCanonicalSig`
pub const TF_FULLY_CANONICAL_SIG: u32 = 0x8000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrpTransaction {
    pub account: [u8; 20],
    pub destination: [u8; 20],
    /// Drops
    pub amount: u64,
    /// Drops
    pub fee: u64,
    pub sequence: u32,
    pub flags: u32,
    pub destination_tag: Option<u32>,
    pub last_ledger_sequence: Option<u32>,
    pub signing_pub_key: Vec<u8>,
    /// DER-encoded
    pub txn_signature: Option<Vec<u8>>,
}

impl XrpTransaction {
    /// Digest the signer signs
    pub fn signing_hash(&self) -> Result<[u8; 32]> {
        let blob = codec::encode(self, true)?;
        Ok(sha512_half(&[&codec::SIGNING_PREFIX, &blob]))
    }

    /// Transaction id of a signed blob
    pub fn id_of(wire: &[u8]) -> String {
        hex::encode_upper(sha512_half(&[&codec::TRANSACTION_ID_PREFIX, wire]))
    }
}

fn classic(account: &[u8; 20]) -> Option<String> {
    XrpAddressCodec.encode(account).ok()
}

impl ChainTransaction for XrpTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Xrp;

    fn signing_payload(&self, _config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        Ok(vec![PayloadEntry::new(
            SignatureAlgorithm::Secp256k1Ecdsa,
            self.signing_hash()?,
        )])
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        _sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, 1, 64)?;
        let digest = self.signing_hash()?;
        let signature = &signatures[0];

        // k256 rejects high-S signatures, which the ledger also refuses
        let verified = VerifyingKey::from_sec1_bytes(&self.signing_pub_key)
            .ok()
            .zip(Signature::from_slice(signature).ok())
            .map(|(key, sig)| key.verify_prehash(&digest, &sig).is_ok())
            .unwrap_or(false);
        if !verified {
            return Err(TxError::signature(
                config.alias,
                "signature does not verify against SigningPubKey",
            ));
        }

        Ok(Self {
            txn_signature: Some(signature_to_der(signature)?),
            ..self.clone()
        })
    }

    fn is_signed(&self) -> bool {
        self.txn_signature.is_some()
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.txn_signature
            .as_deref()
            .and_then(|der| signature_from_der(der).ok())
            .map(|signature| vec![signature.to_vec()])
            .unwrap_or_default()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(codec::encode(self, true)?)
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        if !self.is_signed() {
            return Err(TxError::invalid_transaction(config.alias, "transaction is not signed"));
        }
        Ok(codec::encode(self, false)?)
    }

    fn transaction_hash(&self, _config: &ChainConfig, wire: &[u8]) -> Result<String> {
        Ok(Self::id_of(wire))
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes).map_err(|err| TxError::parse(config.ecosystem(), err))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let mut normalised = NormalisedTransaction::new(config, TransactionKind::NativeTransfer)
            .with_value(config, u128::from(self.amount))
            .with_fee(config, u128::from(self.fee))
            .with_metadata("sequence", self.sequence)
            .with_metadata("flags", self.flags);
        normalised.from = classic(&self.account);
        normalised.to = classic(&self.destination);

        if let Some(tag) = self.destination_tag {
            normalised = normalised.with_metadata("destinationTag", tag);
        }
        if let Some(ledger) = self.last_ledger_sequence {
            normalised = normalised.with_metadata("lastLedgerSequence", ledger);
        }
        if self.is_signed() {
            let wire = codec::encode(self, false)?;
            normalised = normalised.with_metadata("hash", Self::id_of(&wire));
        }
        Ok(normalised)
    }
}
