//! Caller-supplied overrides, one record per ecosystem
//!
//! Merging is field-wise: a newer `Some` wins, `None` keeps the older value.

use crate::chain::Ecosystem;
use crate::error::{Result, TxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmTxType {
    Legacy,
    Eip1559,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvmOverrides {
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub tx_type: Option<EvmTxType>,
    pub data: Option<Vec<u8>>,
}

/// Durable nonce used instead of a recent blockhash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableNonce {
    pub nonce_account: String,
    pub authority: String,
    /// Nonce value stored in the account (base58)
    pub nonce_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolanaOverrides {
    /// Micro-lamports per compute unit
    pub compute_unit_price: Option<u64>,
    pub compute_unit_limit: Option<u32>,
    pub durable_nonce: Option<DurableNonce>,
}

/// Explicit input selected by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPointRef {
    pub txid: String,
    pub vout: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoOverrides {
    /// Satoshis per virtual byte
    pub fee_rate: Option<u64>,
    pub inputs: Option<Vec<OutPointRef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TronOverrides {
    pub fee_limit: Option<i64>,
    pub permission_id: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrpOverrides {
    /// Fee in drops
    pub fee: Option<u64>,
    pub sequence: Option<u32>,
    /// Ledgers before `LastLedgerSequence`
    pub ledger_offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstrateOverrides {
    pub tip: Option<u128>,
    pub nonce: Option<u32>,
    /// Mortality period in blocks; `Some(0)` makes the extrinsic immortal
    pub era_period: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOverrides {
    Evm(EvmOverrides),
    Svm(SolanaOverrides),
    Utxo(UtxoOverrides),
    Tvm(TronOverrides),
    Xrp(XrpOverrides),
    Substrate(SubstrateOverrides),
}

impl TransactionOverrides {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            TransactionOverrides::Evm(_) => Ecosystem::Evm,
            TransactionOverrides::Svm(_) => Ecosystem::Svm,
            TransactionOverrides::Utxo(_) => Ecosystem::Utxo,
            TransactionOverrides::Tvm(_) => Ecosystem::Tvm,
            TransactionOverrides::Xrp(_) => Ecosystem::Xrp,
            TransactionOverrides::Substrate(_) => Ecosystem::Substrate,
        }
    }

    /// Fail unless these overrides target `ecosystem`
    pub fn ensure_ecosystem(&self, ecosystem: Ecosystem) -> Result<()> {
        if self.ecosystem() != ecosystem {
            return Err(TxError::OverrideMismatch {
                expected: ecosystem,
                actual: self.ecosystem(),
            });
        }
        Ok(())
    }

    /// Layer `newer` on top of `self`
    pub fn merge(&self, newer: &TransactionOverrides) -> Result<TransactionOverrides> {
        use TransactionOverrides::*;

        let merged = match (self, newer) {
            (Evm(old), Evm(new)) => Evm(EvmOverrides {
                nonce: new.nonce.or(old.nonce),
                gas_limit: new.gas_limit.or(old.gas_limit),
                gas_price: new.gas_price.or(old.gas_price),
                max_fee_per_gas: new.max_fee_per_gas.or(old.max_fee_per_gas),
                max_priority_fee_per_gas: new
                    .max_priority_fee_per_gas
                    .or(old.max_priority_fee_per_gas),
                tx_type: new.tx_type.or(old.tx_type),
                data: new.data.clone().or_else(|| old.data.clone()),
            }),
            (Svm(old), Svm(new)) => Svm(SolanaOverrides {
                compute_unit_price: new.compute_unit_price.or(old.compute_unit_price),
                compute_unit_limit: new.compute_unit_limit.or(old.compute_unit_limit),
                durable_nonce: new
                    .durable_nonce
                    .clone()
                    .or_else(|| old.durable_nonce.clone()),
            }),
            (Utxo(old), Utxo(new)) => Utxo(UtxoOverrides {
                fee_rate: new.fee_rate.or(old.fee_rate),
                inputs: new.inputs.clone().or_else(|| old.inputs.clone()),
            }),
            (Tvm(old), Tvm(new)) => Tvm(TronOverrides {
                fee_limit: new.fee_limit.or(old.fee_limit),
                permission_id: new.permission_id.or(old.permission_id),
            }),
            (Xrp(old), Xrp(new)) => Xrp(XrpOverrides {
                fee: new.fee.or(old.fee),
                sequence: new.sequence.or(old.sequence),
                ledger_offset: new.ledger_offset.or(old.ledger_offset),
            }),
            (Substrate(old), Substrate(new)) => Substrate(SubstrateOverrides {
                tip: new.tip.or(old.tip),
                nonce: new.nonce.or(old.nonce),
                era_period: new.era_period.or(old.era_period),
            }),
            (old, new) => {
                return Err(TxError::OverrideMismatch {
                    expected: old.ecosystem(),
                    actual: new.ecosystem(),
                })
            }
        };

        Ok(merged)
    }
}

macro_rules! overrides_accessor {
    ($name:ident, $variant:ident, $ty:ty, $ecosystem:expr) => {
        /// Overrides of one ecosystem; `None` yields the defaults
        pub fn $name(overrides: Option<&TransactionOverrides>) -> Result<$ty> {
            match overrides {
                None => Ok(<$ty>::default()),
                Some(TransactionOverrides::$variant(inner)) => Ok(inner.clone()),
                Some(other) => Err(TxError::OverrideMismatch {
                    expected: $ecosystem,
                    actual: other.ecosystem(),
                }),
            }
        }
    };
}

overrides_accessor!(evm_overrides, Evm, EvmOverrides, Ecosystem::Evm);
overrides_accessor!(solana_overrides, Svm, SolanaOverrides, Ecosystem::Svm);
overrides_accessor!(utxo_overrides, Utxo, UtxoOverrides, Ecosystem::Utxo);
overrides_accessor!(tron_overrides, Tvm, TronOverrides, Ecosystem::Tvm);
overrides_accessor!(xrp_overrides, Xrp, XrpOverrides, Ecosystem::Xrp);
overrides_accessor!(substrate_overrides, Substrate, SubstrateOverrides, Ecosystem::Substrate);
