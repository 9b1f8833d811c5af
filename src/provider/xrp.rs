use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::rpc::{field_str, field_u64, JsonRpcTransport};
use crate::transaction::{NetworkState, SignedTransaction, TransactionRequest, XrpState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

pub struct XrpProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl XrpProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }

    /// rippled reports failures inside `result` with `status: "error"`
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let result = self.transport.call(method, json!([params])).await?;
        if result.get("status").and_then(Value::as_str) == Some("error") {
            let error = result.get("error").and_then(Value::as_str).unwrap_or("error");
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or(error);
            return Err(TxError::rpc(method, format!("{error}: {message}")));
        }
        Ok(result)
    }
}

fn field_u32(method: &str, value: &Value, pointer: &str) -> Result<u32> {
    u32::try_from(field_u64(method, value, pointer)?)
        .map_err(|_| TxError::rpc(method, format!("{pointer} exceeds u32")))
}

/// Preliminary results a submission may legitimately return
fn accepted(engine_result: &str) -> bool {
    engine_result.starts_with("tes") || engine_result.starts_with("ter")
}

#[async_trait]
impl ChainProvider for XrpProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState> {
        let account = self
            .call(
                "account_info",
                json!({"account": request.sender(), "ledger_index": "current"}),
            )
            .await?;
        let sequence = field_u32("account_info", &account, "/account_data/Sequence")?;

        let ledger = self
            .call("ledger", json!({"ledger_index": "validated"}))
            .await?;
        let ledger_index = field_u32("ledger", &ledger, "/ledger_index")?;

        let fees = self.call("fee", json!({})).await?;
        let fee = field_u64("fee", &fees, "/drops/open_ledger_fee")?;

        Ok(NetworkState::Xrp(XrpState {
            sequence,
            ledger_index,
            fee,
        }))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let method = "submit";
        let result = self
            .call(method, json!({"tx_blob": hex::encode_upper(signed.wire())}))
            .await?;
        let engine_result = field_str(method, &result, "/engine_result")?;
        if !accepted(engine_result) {
            let message = result
                .get("engine_result_message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(TxError::rpc(method, format!("{engine_result}: {message}")));
        }
        let node_hash = result.pointer("/tx_json/hash").and_then(Value::as_str);
        log_broadcast(&self.config, signed, node_hash);
        Ok(signed.hash().to_string())
    }
}
