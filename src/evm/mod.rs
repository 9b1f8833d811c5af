//! EVM transactions: legacy (EIP-155) and EIP-1559
//!
//! The signer signs `keccak256(unsigned encoding)`. Its 64-byte `r || s` is
//! completed with the recovery parity found by recovering the sender.

pub mod abi;
mod builder;
mod codec;

pub use builder::build;

use crate::address::evm::{parse_address, to_checksum_address};
use crate::chain::{ChainConfig, Ecosystem, SignatureAlgorithm};
use crate::error::{Result, TxError};
use crate::hash::keccak256;
use crate::recovery::{find_recovery_id, recover_address};
use crate::transaction::overrides::EvmTxType;
use crate::transaction::{
    check_signatures, ChainTransaction, NormalisedTransaction, PayloadEntry, TransactionKind,
};
use crate::transaction::normalised::{ContractCallInfo, TokenTransferInfo};

/// One entry of an EIP-2930 access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: [u8; 20],
    pub storage_keys: Vec<[u8; 32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSignature {
    /// Recovery parity, 0 or 1
    pub y_parity: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EvmSignature {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub tx_type: EvmTxType,
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Legacy transactions only
    pub gas_price: Option<u128>,
    /// EIP-1559 transactions only
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    /// `None` deploys a contract
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub data: Vec<u8>,
    pub access_list: Vec<AccessListItem>,
    pub signature: Option<EvmSignature>,
}

impl EvmTransaction {
    /// Digest the signer signs
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&codec::encode_unsigned(self))
    }

    /// Highest fee the transaction can pay, in wei
    pub fn max_fee(&self) -> u128 {
        let per_gas = match self.tx_type {
            EvmTxType::Legacy => self.gas_price.unwrap_or(0),
            EvmTxType::Eip1559 => self.max_fee_per_gas.unwrap_or(0),
        };
        per_gas.saturating_mul(u128::from(self.gas_limit))
    }

    /// Address that signed the transaction
    pub fn recover_sender(&self) -> Result<Option<[u8; 20]>> {
        match &self.signature {
            None => Ok(None),
            Some(signature) => {
                let sender =
                    recover_address(&self.signing_hash(), &signature.to_bytes(), signature.y_parity)?;
                Ok(Some(sender))
            }
        }
    }
}

impl ChainTransaction for EvmTransaction {
    const ECOSYSTEM: Ecosystem = Ecosystem::Evm;

    fn signing_payload(&self, _config: &ChainConfig) -> Result<Vec<PayloadEntry>> {
        Ok(vec![PayloadEntry::new(
            SignatureAlgorithm::Secp256k1Ecdsa,
            self.signing_hash(),
        )])
    }

    fn apply_signatures(
        &self,
        config: &ChainConfig,
        signatures: &[Vec<u8>],
        sender: Option<&str>,
    ) -> Result<Self> {
        check_signatures(config, signatures, 1, 64)?;
        let sender = sender.ok_or_else(|| {
            TxError::signature(config.alias, "sender address is needed to recover the parity")
        })?;
        let sender = parse_address(sender).map_err(|err| TxError::InvalidAddress {
            chain: config.alias,
            address: sender.to_string(),
            reason: err.to_string(),
        })?;

        let raw = &signatures[0];
        let y_parity = find_recovery_id(&self.signing_hash(), raw, &sender).ok_or_else(|| {
            TxError::signature(
                config.alias,
                format!("signature does not recover to {}", to_checksum_address(&sender)),
            )
        })?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&raw[..32]);
        s.copy_from_slice(&raw[32..]);

        Ok(Self {
            signature: Some(EvmSignature { y_parity, r, s }),
            ..self.clone()
        })
    }

    fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    fn signatures(&self) -> Vec<Vec<u8>> {
        self.signature.iter().map(EvmSignature::to_bytes).collect()
    }

    fn serialize_unsigned(&self, _config: &ChainConfig) -> Result<Vec<u8>> {
        Ok(codec::encode_unsigned(self))
    }

    fn serialize_signed(&self, config: &ChainConfig) -> Result<Vec<u8>> {
        codec::encode_signed(self)
            .ok_or_else(|| TxError::invalid_transaction(config.alias, "transaction is not signed"))
    }

    fn transaction_hash(&self, _config: &ChainConfig, wire: &[u8]) -> Result<String> {
        Ok(format!("0x{}", hex::encode(keccak256(wire))))
    }

    fn decode(config: &ChainConfig, bytes: &[u8]) -> Result<Self> {
        codec::decode(bytes).map_err(|err| TxError::parse(config.ecosystem(), err))
    }

    fn normalise(&self, config: &ChainConfig) -> Result<NormalisedTransaction> {
        let to = self.to.as_ref().map(to_checksum_address);
        let kind = match (&self.to, abi::Erc20Call::decode(&self.data)) {
            (None, _) => TransactionKind::ContractDeployment,
            (Some(_), Some(abi::Erc20Call::Transfer { .. })) => TransactionKind::TokenTransfer,
            (Some(_), Some(abi::Erc20Call::Approve { .. })) => TransactionKind::Approval,
            (Some(_), None) if self.data.is_empty() => TransactionKind::NativeTransfer,
            (Some(_), None) => TransactionKind::ContractCall,
        };

        let mut normalised = NormalisedTransaction::new(config, kind)
            .with_value(config, self.value)
            .with_fee(config, self.max_fee())
            .with_metadata("nonce", self.nonce)
            .with_metadata("chainId", self.chain_id)
            .with_metadata("gasLimit", self.gas_limit)
            .with_metadata(
                "txType",
                match self.tx_type {
                    EvmTxType::Legacy => "legacy",
                    EvmTxType::Eip1559 => "eip1559",
                },
            );
        normalised.to = to.clone();
        normalised.from = self.recover_sender()?.as_ref().map(to_checksum_address);

        match abi::Erc20Call::decode(&self.data) {
            Some(abi::Erc20Call::Transfer { to: recipient, amount }) => {
                normalised.token_transfer = Some(TokenTransferInfo {
                    token: to.clone().unwrap_or_default(),
                    to: to_checksum_address(&recipient),
                    amount: amount.to_string(),
                });
            }
            Some(abi::Erc20Call::Approve { spender, amount }) => {
                normalised = normalised
                    .with_metadata("spender", to_checksum_address(&spender))
                    .with_metadata("allowance", amount);
            }
            None => {}
        }

        if kind != TransactionKind::NativeTransfer {
            normalised.contract_call = Some(ContractCallInfo {
                contract: to.unwrap_or_default(),
                method: self.data.get(..4).map(hex::encode),
                data: hex::encode(&self.data),
            });
        }

        Ok(normalised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::transaction::overrides::EvmOverrides;
    use crate::transaction::{
        ContractDeploy, EvmState, NativeTransfer, TokenTransfer, TransactionRequest,
    };

    /// EIP-155 example transaction (nonce 9, 20 gwei, 1 ether)
    fn eip155_example() -> EvmTransaction {
        EvmTransaction {
            tx_type: EvmTxType::Legacy,
            chain_id: 1,
            nonce: 9,
            gas_limit: 21_000,
            gas_price: Some(20_000_000_000),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            to: Some([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: vec![],
            access_list: vec![],
            signature: None,
        }
    }

    fn eip155_signature() -> Vec<u8> {
        hex::decode(concat!(
            "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276",
            "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        ))
        .unwrap()
    }

    const EIP155_SENDER: &str = "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F";

    #[test]
    fn test_eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_wire() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let signed = eip155_example()
            .apply_signatures(&config, &[eip155_signature()], Some(EIP155_SENDER))
            .unwrap();
        assert_eq!(signed.signature.unwrap().y_parity, 0);

        let wire = signed.serialize_signed(&config).unwrap();
        assert_eq!(
            hex::encode(&wire),
            concat!(
                "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a7640000",
                "8025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f",
                "761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
            )
        );

        let decoded = EvmTransaction::decode(&config, &wire).unwrap();
        assert_eq!(decoded, signed);
        let normalised = decoded.normalise(&config).unwrap();
        assert_eq!(normalised.from.as_deref(), Some(EIP155_SENDER));
        assert_eq!(normalised.kind, TransactionKind::NativeTransfer);
        assert_eq!(normalised.formatted_value, "1");
    }

    #[test]
    fn test_unsigned_round_trip() {
        let state = EvmState {
            nonce: 12,
            gas_limit: 90_000,
            gas_price: 20_000_000_000,
            max_fee_per_gas: 40_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
        };
        let usdc = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        let requests: Vec<TransactionRequest> = vec![
            NativeTransfer::new(EIP155_SENDER, usdc, 7).into(),
            TokenTransfer {
                from: EIP155_SENDER.to_string(),
                to: usdc.to_string(),
                token: usdc.to_string(),
                amount: 2_500_000,
            }
            .into(),
            ContractDeploy {
                from: EIP155_SENDER.to_string(),
                bytecode: vec![0x60, 0x80, 0x60, 0x40, 0x52],
                value: 0,
            }
            .into(),
        ];

        for alias in [ChainAlias::Ethereum, ChainAlias::Bsc] {
            let config = ChainConfig::builtin(alias);
            for request in &requests {
                let tx = build(&config, request, &state, &EvmOverrides::default()).unwrap();
                let bytes = tx.serialize_unsigned(&config).unwrap();
                let decoded = EvmTransaction::decode(&config, &bytes).unwrap();
                assert!(!decoded.is_signed());
                assert_eq!(decoded, tx, "{alias} {}", request.operation());
            }
        }
    }

    #[test]
    fn test_signature_from_someone_else_rejected() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let err = eip155_example()
            .apply_signatures(
                &config,
                &[eip155_signature()],
                Some("0x0000000000000000000000000000000000000001"),
            )
            .unwrap_err();
        assert!(matches!(err, TxError::Signature { .. }));
    }

    #[test]
    fn test_short_signature_rejected() {
        let config = ChainConfig::builtin(ChainAlias::Ethereum);
        let err = eip155_example()
            .apply_signatures(&config, &[vec![0u8; 65]], Some(EIP155_SENDER))
            .unwrap_err();
        assert!(matches!(err, TxError::Signature { .. }));
    }
}
