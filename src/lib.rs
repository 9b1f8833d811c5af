//! TxForge - Multi-Ecosystem Transaction Builder
//!
//! Builds, signs and serializes transactions for EVM, Solana, UTXO, Tron, XRP
//! and Substrate chains behind one lifecycle: a [`TransactionRequest`] plus
//! live [`NetworkState`] becomes an [`UnsignedTransaction`], whose
//! [`SigningPayload`] goes to an external signer, and the signatures turn it
//! into a broadcastable [`SignedTransaction`].

pub mod address;
pub mod chain;
pub mod codec;
pub mod error;
pub mod evm;
pub mod hash;
pub mod provider;
pub mod recovery;
pub mod rpc;
pub mod solana;
pub mod substrate;
pub mod transaction;
pub mod tron;
pub mod utxo;
pub mod xrp;

pub use chain::{ChainAlias, ChainConfig, ChainRegistry, Ecosystem, SignatureAlgorithm};
pub use error::{CodecError, Result, TxError};
pub use provider::{connect, connect_http, ChainProvider};
pub use transaction::{
    decode, DecodeFormat, Decoded, NetworkState, NormalisedTransaction, RawTransaction,
    SignedTransaction, SigningPayload, TransactionOverrides, TransactionRequest,
    UnsignedTransaction,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::address::{is_valid_address, AddressCodec};
    pub use crate::chain::{ChainAlias, ChainConfig, ChainRegistry, Ecosystem, SignatureAlgorithm};
    pub use crate::error::{Result, TxError};
    pub use crate::provider::{connect, connect_http, ChainProvider};
    pub use crate::rpc::{HttpTransport, JsonRpcTransport};
    pub use crate::transaction::{
        decode, ContractCall, ContractDeploy, DecodeFormat, Decoded, NativeTransfer,
        NetworkState, NormalisedTransaction, SignedTransaction, SigningPayload, TokenTransfer,
        TransactionKind, TransactionOverrides, TransactionRequest, UnsignedTransaction,
    };
}
