//! Tron transactions: protobuf `Transaction.raw` signed over its SHA-256
//!
//! The txID is `sha256(raw_data)`. Signatures go on the wire as
//! `r || s || v` with `v = 27 + recovery id`.

mod builder;
pub mod raw;

pub use builder::{build, reference_block};
pub use raw::{TronContract, TronRaw};

use crate::address::tron::from_raw;
use crate::address::{AddressCodec, TronAddressCodec};
use crate::chain::{ChainConfig, Ecosystem, SignatureAlgorithm};
use crate::error::{CodecResult, Result, TxError};
use crate::evm::abi::Erc20Call;
use crate::hash::sha256;
use crate::recovery::find_recovery_id;
use crate::transaction::normalised::{ContractCallInfo, TokenTransferInfo};
use crate::transaction::{
    check_signatures, ChainTransaction, NormalisedTransaction, PayloadEntry, TransactionKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronTransaction {
    pub raw: TronRaw,
    /// `raw_data` exactly as hashed; decoding keeps the received bytes
    raw_data: Vec<u8>,
    pub signatures: Vec<[u8; 65]>,
}

impl TronTransaction {
    pub fn new(raw: TronRaw) -> Self {
        let raw_data = raw.encode();
        Self {
            raw,
            raw_data,
            signatures: Vec::new(),
        }
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.raw_data
    }

    pub fn tx_id_bytes(&self) -> [u8; 32] {
        sha256(&self.raw_data)
    }

    /// Lowercase hex txID
    pub fn tx_id(&self) -> String {
        hex::encode(self.tx_id_bytes())
    }

    fn from_wire(bytes: &[u8]) -> CodecResult<Self> {
        let (raw_data, signatures) = raw::decode_transaction(bytes)?;
        let raw = TronRaw::decode(&raw_data)?;
        Ok(Self {
            raw,
            raw_data,
            signatures,
        })
    }
}

fn base58(account: &[u8; 21]) -> Option<String> {
    from_raw(account)
        .and_then(|account| TronAddressCodec.encode(&account))
        .ok()
}

impl ChainTransaction for TronTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Tvm;

    fn signing_payload(&self, _config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        Ok(vec![PayloadEntry::new(
            SignatureAlgorithm::Secp256k1Ecdsa,
            self.tx_id_bytes(),
        )])
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        _sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, 1, 64)?;
        let owner = from_raw(self.raw.contract.owner())?;
        let signature = &signatures[0];

        let recovery_id = find_recovery_id(&self.tx_id_bytes(), signature, &owner).ok_or_else(|| {
            TxError::signature(
                config.alias,
                format!(
                    "signature does not recover to the owner {}",
                    base58(self.raw.contract.owner()).unwrap_or_default()
                ),
            )
        })?;

        let mut wire_signature = [0u8; 65];
        wire_signature[..64].copy_from_slice(signature);
        wire_signature[64] = 27 + recovery_id;
        Ok(Self {
            signatures: vec![wire_signature],
            ..self.clone()
        })
    }

    fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.signatures
            .iter()
            .map(|signature| signature[..64].to_vec())
            .collect()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(raw::encode_transaction(&self.raw_data, &[]))
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        if !self.is_signed() {
            return Err(TxError::invalid_transaction(config.alias, "transaction is not signed"));
        }
        Ok(raw::encode_transaction(&self.raw_data, &self.signatures))
    }

    fn transaction_hash(&self, _config: &ChainConfig, _wire: &[u8]) -> Result<String> {
        Ok(self.tx_id())
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        Self::from_wire(bytes).map_err(|err| TxError::parse(config.ecosystem(), err))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let mut normalised = match &self.raw.contract {
            TronContract::Transfer { owner, to, amount } => {
                let mut normalised =
                    NormalisedTransaction::new(config, TransactionKind::NativeTransfer)
                        .with_value(config, u128::try_from(*amount).unwrap_or(0));
                normalised.from = base58(owner);
                normalised.to = base58(to);
                normalised
            }
            TronContract::TriggerSmartContract {
                owner,
                contract,
                call_value,
                data,
            } => {
                let contract_address = base58(contract);
                let call = Erc20Call::decode(data);
                let kind = match call {
                    Some(Erc20Call::Transfer { .. }) => TransactionKind::TokenTransfer,
                    Some(Erc20Call::Approve { .. }) => TransactionKind::Approval,
                    None => TransactionKind::ContractCall,
                };
                let mut normalised = NormalisedTransaction::new(config, kind)
                    .with_value(config, u128::try_from(*call_value).unwrap_or(0))
                    .with_fee(config, u128::try_from(self.raw.fee_limit).unwrap_or(0));
                normalised.from = base58(owner);
                normalised.to = contract_address.clone();

                match call {
                    Some(Erc20Call::Transfer { to, amount }) => {
                        normalised.token_transfer = Some(TokenTransferInfo {
                            token: contract_address.unwrap_or_default(),
                            to: TronAddressCodec.encode(&to).unwrap_or_default(),
                            amount: amount.to_string(),
                        });
                    }
                    Some(Erc20Call::Approve { spender, amount }) => {
                        normalised = normalised
                            .with_metadata("spender", TronAddressCodec.encode(&spender).unwrap_or_default())
                            .with_metadata("allowance", amount);
                    }
                    None => {
                        normalised.contract_call = Some(ContractCallInfo {
                            contract: contract_address.unwrap_or_default(),
                            method: data.get(..4).map(hex::encode),
                            data: hex::encode(data),
                        });
                    }
                }
                normalised
            }
        };

        normalised = normalised
            .with_metadata("txID", self.tx_id())
            .with_metadata("refBlockBytes", hex::encode(self.raw.ref_block_bytes))
            .with_metadata("expiration", self.raw.expiration);
        if !self.raw.data.is_empty() {
            normalised = normalised.with_metadata("memo", String::from_utf8_lossy(&self.raw.data));
        }
        if self.raw.permission_id != 0 {
            normalised = normalised.with_metadata("permissionId", self.raw.permission_id);
        }
        Ok(normalised)
    }
}
