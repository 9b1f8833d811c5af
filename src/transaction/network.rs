//! Live chain state a builder needs
//!
//! Providers fetch these over JSON-RPC; builders never do I/O themselves.

use crate::chain::Ecosystem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmState {
    pub nonce: u64,
    pub gas_limit: u64,
    /// Legacy gas price (wei)
    pub gas_price: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaState {
    pub recent_blockhash: [u8; 32],
    /// Decimals of the mint, needed for `TransferChecked`
    pub token_decimals: Option<u8>,
    /// Program owning the mint (Token or Token-2022); Token when absent
    pub token_program: Option<[u8; 32]>,
    /// Whether the recipient's associated token account already exists
    pub destination_token_account_exists: bool,
}

/// An unspent output owned by the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableOutput {
    /// Transaction id in display (big-endian hex) order
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoState {
    pub utxos: Vec<SpendableOutput>,
    /// Fee rate in satoshis per virtual byte
    pub fee_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TronState {
    pub block_number: u64,
    pub block_hash: [u8; 32],
    /// Block timestamp in milliseconds
    pub block_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrpState {
    pub sequence: u32,
    /// Last validated ledger index
    pub ledger_index: u32,
    /// Open ledger fee in drops
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstrateState {
    pub nonce: u32,
    pub genesis_hash: [u8; 32],
    pub block_number: u64,
    pub block_hash: [u8; 32],
    pub spec_version: u32,
    pub transaction_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkState {
    Evm(EvmState),
    Svm(SolanaState),
    Utxo(UtxoState),
    Tvm(TronState),
    Xrp(XrpState),
    Substrate(SubstrateState),
}

impl NetworkState {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            NetworkState::Evm(_) => Ecosystem::Evm,
            NetworkState::Svm(_) => Ecosystem::Svm,
            NetworkState::Utxo(_) => Ecosystem::Utxo,
            NetworkState::Tvm(_) => Ecosystem::Tvm,
            NetworkState::Xrp(_) => Ecosystem::Xrp,
            NetworkState::Substrate(_) => Ecosystem::Substrate,
        }
    }
}
