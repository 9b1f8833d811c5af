//! Solana transactions: short-vec signatures followed by a legacy or v0 message
//!
//! Every required signer signs the serialized message. Unsigned transactions
//! carry all-zero signature slots so they keep the wire layout.

mod builder;
pub mod fees;
pub mod instruction;
pub mod message;
pub mod programs;

pub use builder::build;
pub use message::{Message, MessageCompiler, MessageVersion};

use crate::chain::{ChainConfig, Ecosystem, SignatureAlgorithm};
use crate::codec::base58::encode_base58;
use crate::codec::varint::{compact_u16_len, decode_compact_u16, encode_compact_u16};
use crate::codec::{decode_array, ensure_consumed, ByteDeserialize, ByteSerialize};
use crate::error::{CodecError, CodecResult, Result, TxError};
use crate::transaction::normalised::{ContractCallInfo, TokenTransferInfo};
use crate::transaction::{
    check_signatures, ChainTransaction, NormalisedTransaction, PayloadEntry, TransactionKind,
};
use fees::PriorityFeeCalculator;
use programs::{
    is_advance_nonce, is_token_program, parse_system_transfer, parse_transfer_checked,
    COMPUTE_BUDGET_PROGRAM_ID, MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID,
};
use solana_sdk::transaction::VersionedTransaction;
use std::io::Cursor;

const EMPTY_SIGNATURE: [u8; 64] = [0u8; 64];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaTransaction {
    pub message: Message,
    /// One slot per required signer, in account order
    pub signatures: Vec<[u8; 64]>,
}

impl SolanaTransaction {
    pub fn new_unsigned(message: Message) -> Self {
        let count = message.header.num_required_signatures as usize;
        Self {
            message,
            signatures: vec![EMPTY_SIGNATURE; count],
        }
    }

    /// Serialized message, the bytes every signer signs
    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.to_bytes()
    }

    pub fn wire_size(&self) -> usize {
        compact_u16_len(self.signatures.len() as u16)
            + self.signatures.len() * 64
            + self.message_bytes().len()
    }

    /// Convert to the SDK representation via its bincode layout
    pub fn to_versioned(&self) -> Result<VersionedTransaction> {
        bincode::deserialize(&self.to_bytes())
            .map_err(|err| TxError::parse(Ecosystem::Svm, err))
    }

    pub fn from_versioned(tx: &VersionedTransaction) -> Result<Self> {
        let bytes = bincode::serialize(tx).map_err(|err| TxError::parse(Ecosystem::Svm, err))?;
        Self::from_wire(&bytes).map_err(|err| TxError::parse(Ecosystem::Svm, err))
    }

    fn from_wire(bytes: &[u8]) -> CodecResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let tx = Self::deserialize_bytes(&mut cursor)?;
        ensure_consumed(&cursor)?;
        Ok(tx)
    }
}

impl ByteSerialize for SolanaTransaction {
    fn serialize_bytes(&self, writer: &mut Vec<u8>) {
        encode_compact_u16(self.signatures.len() as u16, writer);
        for signature in &self.signatures {
            writer.extend_from_slice(signature);
        }
        self.message.serialize_bytes(writer);
    }
}

impl ByteDeserialize for SolanaTransaction {
    fn deserialize_bytes(cursor: &mut Cursor<&[u8]>) -> CodecResult<Self> {
        let count = decode_compact_u16(cursor)? as usize;
        let mut signatures = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            signatures.push(decode_array::<64>(cursor)?);
        }
        let message = Message::deserialize_bytes(cursor)?;
        if count != message.header.num_required_signatures as usize {
            return Err(CodecError::Other(format!(
                "{count} signatures for a message requiring {}",
                message.header.num_required_signatures
            )));
        }
        Ok(Self {
            message,
            signatures,
        })
    }
}

impl ChainTransaction for SolanaTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Svm;

    fn signing_payload(&self, _config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        let message = self.message_bytes();
        Ok(self
            .signatures
            .iter()
            .map(|_| PayloadEntry::new(SignatureAlgorithm::Ed25519, message.clone()))
            .collect())
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        _sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, self.signatures.len(), 64)?;
        let mut slots = Vec::with_capacity(signatures.len());
        for (index, signature) in signatures.iter().enumerate() {
            let mut slot = [0u8; 64];
            slot.copy_from_slice(signature);
            if slot == EMPTY_SIGNATURE {
                return Err(TxError::signature(
                    config.alias,
                    format!("signature {index} is all zeros"),
                ));
            }
            slots.push(slot);
        }
        Ok(Self {
            message: self.message.clone(),
            signatures: slots,
        })
    }

    fn is_signed(&self) -> bool {
        !self.signatures.is_empty() && self.signatures.iter().all(|s| *s != EMPTY_SIGNATURE)
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.signatures
            .iter()
            .filter(|s| **s != EMPTY_SIGNATURE)
            .map(|s| s.to_vec())
            .collect()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(Self::new_unsigned(self.message.clone()).to_bytes())
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        if !self.is_signed() {
            return Err(TxError::invalid_transaction(config.alias, "transaction is not signed"));
        }
        Ok(self.to_bytes())
    }

    /// Base58 of the fee payer's signature
    fn transaction_hash(&self, config: &ChainConfig, _wire: &[u8]) -> Result<String> {
        match self.signatures.first() {
            Some(signature) if *signature != EMPTY_SIGNATURE => Ok(encode_base58(signature)),
            _ => Err(TxError::signature(
                config.alias,
                "fee payer signature is missing",
            )),
        }
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        Self::from_wire(bytes).map_err(|err| TxError::parse(config.ecosystem(), err))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let message = &self.message;
        let key_at = |index: Option<&u8>| {
            index
                .and_then(|i| message.account_key(*i))
                .map(|key| encode_base58(key))
        };

        let mut kind = TransactionKind::Unknown;
        let mut value = 0u128;
        let mut to = None;
        let mut from = message.fee_payer().map(|key| encode_base58(key));
        let mut token_transfer = None;
        let mut contract_call = None;
        let mut memo = None;
        let mut durable_nonce = false;

        for instruction in &message.instructions {
            let Some(program) = message.program_id(instruction) else {
                continue;
            };
            let accounts = &instruction.account_indices;

            if *program == SYSTEM_PROGRAM_ID {
                if let Some(lamports) = parse_system_transfer(&instruction.data) {
                    if kind == TransactionKind::Unknown {
                        kind = TransactionKind::NativeTransfer;
                        from = key_at(accounts.first()).or(from);
                        to = key_at(accounts.get(1));
                    }
                    value += u128::from(lamports);
                    continue;
                }
                if is_advance_nonce(&instruction.data) {
                    durable_nonce = true;
                    continue;
                }
            } else if *program == COMPUTE_BUDGET_PROGRAM_ID {
                continue;
            } else if *program == MEMO_PROGRAM_ID {
                memo = Some(String::from_utf8_lossy(&instruction.data).into_owned());
                continue;
            } else if is_token_program(program) {
                if let Some(transfer) = parse_transfer_checked(&instruction.data) {
                    kind = TransactionKind::TokenTransfer;
                    from = key_at(accounts.get(3)).or(from);
                    let destination = key_at(accounts.get(2)).unwrap_or_default();
                    to = Some(destination.clone());
                    token_transfer = Some(TokenTransferInfo {
                        token: key_at(accounts.get(1)).unwrap_or_default(),
                        to: destination,
                        amount: transfer.amount.to_string(),
                    });
                    continue;
                }
            } else if *program == programs::ASSOCIATED_TOKEN_PROGRAM_ID {
                continue;
            }

            if contract_call.is_none() && kind != TransactionKind::TokenTransfer {
                kind = TransactionKind::ContractCall;
                to = Some(encode_base58(program));
                contract_call = Some(ContractCallInfo {
                    contract: encode_base58(program),
                    method: instruction.discriminator().map(hex::encode),
                    data: hex::encode(&instruction.data),
                });
            }
        }

        let fee = PriorityFeeCalculator::new().estimate(message);
        let mut normalised = NormalisedTransaction::new(config, kind)
            .with_value(config, value)
            .with_fee(config, u128::from(fee.total))
            .with_metadata("recentBlockhash", encode_base58(&message.recent_blockhash))
            .with_metadata(
                "version",
                match message.version {
                    MessageVersion::Legacy => "legacy",
                    MessageVersion::V0 => "0",
                },
            )
            .with_metadata("signers", message.header.num_required_signatures);
        if fee.compute_unit_price > 0 {
            normalised = normalised.with_metadata("computeUnitPrice", fee.compute_unit_price);
        }
        if durable_nonce {
            normalised = normalised.with_metadata("durableNonce", true);
        }
        if let Some(memo) = memo {
            normalised = normalised.with_metadata("memo", memo);
        }
        normalised.from = from;
        normalised.to = to;
        normalised.token_transfer = token_transfer;
        normalised.contract_call = contract_call;
        Ok(normalised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::solana::programs::system_transfer;
    use crate::transaction::overrides::SolanaOverrides;
    use crate::transaction::{NativeTransfer, SolanaState};
    use solana_sdk::signature::{Keypair, Signer};

    fn signed_transfer(payer: &Keypair, to: &str) -> (ChainConfig, SolanaTransaction) {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let request = NativeTransfer::new(payer.pubkey().to_string(), to, 1_500_000_000).into();
        let state = SolanaState {
            recent_blockhash: [4u8; 32],
            token_decimals: None,
            token_program: None,
            destination_token_account_exists: false,
        };
        let tx = build(&config, &request, &state, &SolanaOverrides::default()).unwrap();
        let payload = tx.signing_payload(&config).unwrap();
        assert_eq!(payload.len(), 1);
        let signature = payer.sign_message(&payload[0].data);
        let signed = tx
            .apply_signatures(&config, &[signature.as_ref().to_vec()], None)
            .unwrap();
        (config, signed)
    }

    #[test]
    fn test_sdk_accepts_signed_transfer() {
        let payer = Keypair::new();
        let to = Keypair::new().pubkey();
        let (_, signed) = signed_transfer(&payer, &to.to_string());

        let versioned = signed.to_versioned().unwrap();
        assert!(versioned.verify_with_results().iter().all(|ok| *ok));
        assert_eq!(SolanaTransaction::from_versioned(&versioned).unwrap(), signed);
    }

    #[test]
    fn test_hash_is_first_signature() {
        let payer = Keypair::new();
        let (config, signed) = signed_transfer(&payer, &Keypair::new().pubkey().to_string());
        let wire = signed.serialize_signed(&config).unwrap();
        let hash = signed.transaction_hash(&config, &wire).unwrap();
        assert_eq!(hash, encode_base58(&signed.signatures[0]));
    }

    #[test]
    fn test_unsigned_round_trip_and_hash_error() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let message = MessageCompiler::new()
            .payer([1u8; 32])
            .recent_blockhash([2u8; 32])
            .add_instruction(system_transfer([1u8; 32], [3u8; 32], 9).unwrap())
            .compile()
            .unwrap();
        let tx = SolanaTransaction::new_unsigned(message);
        let bytes = tx.serialize_unsigned(&config).unwrap();
        let decoded = SolanaTransaction::decode(&config, &bytes).unwrap();
        assert_eq!(decoded, tx);
        assert!(!decoded.is_signed());
        assert!(decoded.transaction_hash(&config, &bytes).is_err());
    }

    #[test]
    fn test_zero_signature_rejected() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let message = MessageCompiler::new()
            .payer([1u8; 32])
            .recent_blockhash([2u8; 32])
            .add_instruction(system_transfer([1u8; 32], [3u8; 32], 9).unwrap())
            .compile()
            .unwrap();
        let tx = SolanaTransaction::new_unsigned(message);
        let err = tx.apply_signatures(&config, &[vec![0u8; 64]], None).unwrap_err();
        assert!(matches!(err, TxError::Signature { .. }));
        let err = tx.apply_signatures(&config, &[], None).unwrap_err();
        assert!(matches!(err, TxError::MissingSignatures { .. }));
    }

    #[test]
    fn test_normalise_native_transfer() {
        let payer = Keypair::new();
        let to = Keypair::new().pubkey().to_string();
        let (config, signed) = signed_transfer(&payer, &to);
        let normalised = signed.normalise(&config).unwrap();
        assert_eq!(normalised.kind, TransactionKind::NativeTransfer);
        assert_eq!(normalised.from, Some(payer.pubkey().to_string()));
        assert_eq!(normalised.to, Some(to));
        assert_eq!(normalised.value, "1500000000");
        assert_eq!(normalised.formatted_value, "1.5");
        assert_eq!(normalised.fee.unwrap().value, "5000");
    }

    #[test]
    fn test_signature_count_must_match_header() {
        let config = ChainConfig::builtin(ChainAlias::Solana);
        let message = MessageCompiler::new()
            .payer([1u8; 32])
            .recent_blockhash([2u8; 32])
            .add_instruction(system_transfer([1u8; 32], [3u8; 32], 9).unwrap())
            .compile()
            .unwrap();
        let mut bytes = vec![2u8];
        bytes.extend_from_slice(&[0u8; 128]);
        bytes.extend_from_slice(&message.to_bytes());
        assert!(SolanaTransaction::decode(&config, &bytes).is_err());
    }
}
