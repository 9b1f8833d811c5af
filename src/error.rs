//! Error types for TxForge

use crate::chain::{ChainAlias, Ecosystem};
use thiserror::Error;

/// Failures raised by the chain-agnostic codec primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Buffer too small: needed {needed} bytes, got {available}")]
    UnexpectedEnd { needed: usize, available: usize },

    #[error("Invalid character {character:?} at position {index}")]
    InvalidCharacter { character: char, index: usize },

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid compact integer: {0}")]
    InvalidCompact(String),

    #[error("Invalid DER signature: {0}")]
    InvalidDer(String),

    #[error("Invalid RLP: {0}")]
    InvalidRlp(String),

    #[error("Invalid protobuf: {0}")]
    InvalidProtobuf(String),

    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("{0}")]
    Other(String),
}

impl From<bs58::decode::Error> for CodecError {
    fn from(err: bs58::decode::Error) -> Self {
        match err {
            bs58::decode::Error::InvalidCharacter { character, index } => {
                CodecError::InvalidCharacter { character, index }
            }
            bs58::decode::Error::InvalidChecksum { .. } => CodecError::ChecksumMismatch,
            other => CodecError::Other(other.to_string()),
        }
    }
}

impl From<hex::FromHexError> for CodecError {
    fn from(err: hex::FromHexError) -> Self {
        CodecError::InvalidHex(err.to_string())
    }
}

/// Errors surfaced to callers of the transaction lifecycle and providers.
#[derive(Error, Debug)]
pub enum TxError {
    #[error("{chain}: invalid address {address:?}: {reason}")]
    InvalidAddress {
        chain: ChainAlias,
        address: String,
        reason: String,
    },

    #[error("{chain}: signature error: {message}")]
    Signature { chain: ChainAlias, message: String },

    #[error("{chain}: signature count mismatch: expected {expected}, got {actual}")]
    SignatureCountMismatch {
        chain: ChainAlias,
        expected: usize,
        actual: usize,
    },

    #[error("{chain}: at least one signature is required")]
    MissingSignatures { chain: ChainAlias },

    #[error("{ecosystem}: failed to parse transaction: {reason}")]
    Parse { ecosystem: Ecosystem, reason: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{chain}: {operation} is not supported")]
    UnsupportedOperation {
        chain: ChainAlias,
        operation: &'static str,
    },

    #[error("{chain}: invalid transaction: {reason}")]
    InvalidTransaction { chain: ChainAlias, reason: String },

    #[error("{chain}: insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        chain: ChainAlias,
        required: u128,
        available: u128,
    },

    #[error("overrides for {actual} cannot be applied to a {expected} transaction")]
    OverrideMismatch {
        expected: Ecosystem,
        actual: Ecosystem,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC {method} failed{}: {message}", code_suffix(.code))]
    Rpc {
        method: String,
        code: Option<i64>,
        message: String,
    },
}

fn code_suffix(code: &Option<i64>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

impl TxError {
    pub fn invalid_transaction(chain: ChainAlias, reason: impl Into<String>) -> Self {
        TxError::InvalidTransaction {
            chain,
            reason: reason.into(),
        }
    }

    pub fn signature(chain: ChainAlias, message: impl Into<String>) -> Self {
        TxError::Signature {
            chain,
            message: message.into(),
        }
    }

    pub fn parse(ecosystem: Ecosystem, reason: impl ToString) -> Self {
        TxError::Parse {
            ecosystem,
            reason: reason.to_string(),
        }
    }

    pub fn rpc(method: &str, message: impl Into<String>) -> Self {
        TxError::Rpc {
            method: method.to_string(),
            code: None,
            message: message.into(),
        }
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

pub type Result<T> = std::result::Result<T, TxError>;
