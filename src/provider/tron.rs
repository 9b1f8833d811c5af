//! Tron full-node wallet API, called by method name through the transport

use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::chain::ChainConfig;
use crate::codec::decode_hex_array;
use crate::error::{Result, TxError};
use crate::rpc::{field_str, field_u64, JsonRpcTransport};
use crate::transaction::{NetworkState, SignedTransaction, TransactionRequest, TronState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

pub struct TronProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl TronProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }
}

/// `{"result": false, "code": ..., "message": <hex>}` into an RPC error
fn broadcast_outcome(method: &str, response: &Value) -> Result<Option<String>> {
    if response.get("result").and_then(Value::as_bool) == Some(true) {
        return Ok(response.get("txid").and_then(Value::as_str).map(str::to_string));
    }
    let code = response
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .map(|message| {
            hex::decode(message)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_else(|| message.to_string())
        })
        .unwrap_or_default();
    Err(TxError::rpc(method, format!("{code}: {message}")))
}

#[async_trait]
impl ChainProvider for TronProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, _request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, _request: &TransactionRequest) -> Result<NetworkState> {
        let method = "getnowblock";
        let block = self.transport.call(method, json!({})).await?;
        let block_hash = decode_hex_array(field_str(method, &block, "/blockID")?)
            .map_err(|err| TxError::rpc(method, format!("blockID: {err}")))?;
        let block_number = field_u64(method, &block, "/block_header/raw_data/number")?;
        let block_timestamp = i64::try_from(field_u64(
            method,
            &block,
            "/block_header/raw_data/timestamp",
        )?)
        .map_err(|_| TxError::rpc(method, "timestamp exceeds int64"))?;

        Ok(NetworkState::Tvm(TronState {
            block_number,
            block_hash,
            block_timestamp,
        }))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let method = "broadcasthex";
        let response = self
            .transport
            .call(method, json!({"transaction": signed.to_hex()}))
            .await?;
        let node_hash = broadcast_outcome(method, &response)?;
        log_broadcast(&self.config, signed, node_hash.as_deref());
        Ok(signed.hash().to_string())
    }
}
