//! Network-facing side of the lifecycle
//!
//! A provider fetches the [`NetworkState`] a builder needs and submits signed
//! transactions. Everything between those two calls is pure and lives in
//! [`crate::transaction`].

mod evm;
mod solana;
mod substrate;
mod tron;
mod utxo;
mod xrp;

pub use evm::EvmProvider;
pub use solana::SolanaProvider;
pub use substrate::SubstrateProvider;
pub use tron::TronProvider;
pub use utxo::UtxoProvider;
pub use xrp::XrpProvider;

use crate::address;
use crate::chain::{ChainConfig, Ecosystem};
use crate::error::{Result, TxError};
use crate::rpc::{HttpTransport, JsonRpcTransport};
use crate::transaction::{
    self, ContractCall, ContractDeploy, DecodeFormat, Decoded, NativeTransfer, NetworkState,
    SignedTransaction, TokenTransfer, TransactionOverrides, TransactionRequest,
    UnsignedTransaction,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn config(&self) -> &Arc<ChainConfig>;

    /// Query the live state `request` is built against
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState>;

    /// Submit `signed`, returning its locally computed hash
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String>;

    /// Validate addresses, fetch state and build
    async fn build(
        &self,
        request: TransactionRequest,
        overrides: Option<TransactionOverrides>,
    ) -> Result<UnsignedTransaction> {
        for address in request.addresses() {
            address::validate(self.config(), address)?;
        }
        let state = self.fetch_network_state(&request).await?;
        UnsignedTransaction::build(Arc::clone(self.config()), request, state, overrides)
    }

    async fn build_native_transfer(
        &self,
        transfer: NativeTransfer,
        overrides: Option<TransactionOverrides>,
    ) -> Result<UnsignedTransaction> {
        self.build(transfer.into(), overrides).await
    }

    async fn build_token_transfer(
        &self,
        transfer: TokenTransfer,
        overrides: Option<TransactionOverrides>,
    ) -> Result<UnsignedTransaction> {
        self.build(transfer.into(), overrides).await
    }

    async fn build_contract_call(
        &self,
        call: ContractCall,
        overrides: Option<TransactionOverrides>,
    ) -> Result<UnsignedTransaction> {
        self.build(call.into(), overrides).await
    }

    async fn build_contract_deploy(
        &self,
        deploy: ContractDeploy,
        overrides: Option<TransactionOverrides>,
    ) -> Result<UnsignedTransaction> {
        self.build(deploy.into(), overrides).await
    }

    fn decode(&self, serialized: &[u8], format: DecodeFormat) -> Result<Decoded> {
        transaction::decode(self.config(), serialized, format)
    }
}

/// Provider for `config`'s ecosystem over `transport`
pub fn connect(
    config: ChainConfig,
    transport: Arc<dyn JsonRpcTransport>,
) -> Result<Box<dyn ChainProvider>> {
    config.validate()?;
    let config = Arc::new(config);
    Ok(match config.ecosystem() {
        Ecosystem::Evm => Box::new(EvmProvider::new(config, transport)),
        Ecosystem::Svm => Box::new(SolanaProvider::new(config, transport)),
        Ecosystem::Utxo => Box::new(UtxoProvider::new(config, transport)),
        Ecosystem::Tvm => Box::new(TronProvider::new(config, transport)),
        Ecosystem::Xrp => Box::new(XrpProvider::new(config, transport)),
        Ecosystem::Substrate => Box::new(SubstrateProvider::new(config, transport)),
    })
}

/// Provider talking HTTP JSON-RPC to `config.rpc_url`
pub fn connect_http(config: ChainConfig) -> Result<Box<dyn ChainProvider>> {
    let url = config
        .rpc_url
        .clone()
        .ok_or_else(|| TxError::Config(format!("{} has no rpc_url", config.alias)))?;
    connect(config, Arc::new(HttpTransport::new(url)?))
}

/// Fail unless `signed` was built for this provider's chain
pub(crate) fn ensure_same_chain(config: &ChainConfig, signed: &SignedTransaction) -> Result<()> {
    if signed.config().alias != config.alias {
        return Err(TxError::invalid_transaction(
            config.alias,
            format!("transaction was built for {}", signed.config().alias),
        ));
    }
    Ok(())
}

pub(crate) fn log_broadcast(config: &ChainConfig, signed: &SignedTransaction, node_hash: Option<&str>) {
    if let Some(node_hash) = node_hash {
        if !node_hash.eq_ignore_ascii_case(signed.hash()) {
            tracing::warn!(
                chain = %config.alias,
                hash = signed.hash(),
                node_hash,
                "node reported a different transaction hash"
            );
        }
    }
    info!(chain = %config.alias, hash = signed.hash(), "broadcast transaction");
}
