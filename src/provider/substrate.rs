use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::chain::ChainConfig;
use crate::codec::decode_hex_array;
use crate::error::{Result, TxError};
use crate::rpc::{field, field_u64, parse_quantity, JsonRpcTransport};
use crate::transaction::{NetworkState, SignedTransaction, SubstrateState, TransactionRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

pub struct SubstrateProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl SubstrateProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }

    async fn hash(&self, method: &str, params: Value) -> Result<[u8; 32]> {
        let result = self.transport.call(method, params).await?;
        let text = result
            .as_str()
            .ok_or_else(|| TxError::rpc(method, "block hash is not a string"))?;
        decode_hex_array(text).map_err(|err| TxError::rpc(method, format!("block hash: {err}")))
    }
}

fn field_u32(method: &str, value: &Value, pointer: &str) -> Result<u32> {
    u32::try_from(field_u64(method, value, pointer)?)
        .map_err(|_| TxError::rpc(method, format!("{pointer} exceeds u32")))
}

#[async_trait]
impl ChainProvider for SubstrateProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState> {
        let method = "system_accountNextIndex";
        let nonce = self.transport.call(method, json!([request.sender()])).await?;
        let nonce = nonce
            .as_u64()
            .and_then(|nonce| u32::try_from(nonce).ok())
            .ok_or_else(|| TxError::rpc(method, "nonce is not a u32"))?;

        let genesis_hash = self.hash("chain_getBlockHash", json!([0])).await?;
        let block_hash = self.hash("chain_getFinalizedHead", json!([])).await?;
        let block_hex = format!("0x{}", hex::encode(block_hash));

        let method = "chain_getHeader";
        let header = self.transport.call(method, json!([block_hex])).await?;
        let block_number = u64::try_from(parse_quantity(method, field(method, &header, "/number")?)?)
            .map_err(|_| TxError::rpc(method, "block number exceeds u64"))?;

        let method = "state_getRuntimeVersion";
        let runtime = self.transport.call(method, json!([block_hex])).await?;

        Ok(NetworkState::Substrate(SubstrateState {
            nonce,
            genesis_hash,
            block_number,
            block_hash,
            spec_version: field_u32(method, &runtime, "/specVersion")?,
            transaction_version: field_u32(method, &runtime, "/transactionVersion")?,
        }))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let result = self
            .transport
            .call(
                "author_submitExtrinsic",
                json!([format!("0x{}", signed.to_hex())]),
            )
            .await?;
        log_broadcast(&self.config, signed, result.as_str());
        Ok(signed.hash().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ss58::encode_address;
    use crate::chain::ChainAlias;
    use crate::provider::mock::MockTransport;
    use crate::transaction::NativeTransfer;

    #[tokio::test]
    async fn test_state_from_finalized_head() {
        let finalized = format!("0x{}", "cd".repeat(32));
        let transport = Arc::new(
            MockTransport::default()
                .with("system_accountNextIndex", json!(12))
                .with("chain_getBlockHash", json!(format!("0x{}", "91".repeat(32))))
                .with("chain_getFinalizedHead", json!(finalized))
                .with("chain_getHeader", json!({"number": "0x14fb180", "parentHash": "0x00"}))
                .with(
                    "state_getRuntimeVersion",
                    json!({"specName": "polkadot", "specVersion": 1_003_000, "transactionVersion": 26}),
                ),
        );
        let provider = SubstrateProvider::new(
            Arc::new(ChainConfig::builtin(ChainAlias::Polkadot)),
            transport.clone(),
        );
        let address = encode_address(&[1; 32], 0).unwrap();
        let request = NativeTransfer::new(address.clone(), address, 1).into();
        let state = provider.fetch_network_state(&request).await.unwrap();
        assert_eq!(
            state,
            NetworkState::Substrate(SubstrateState {
                nonce: 12,
                genesis_hash: [0x91; 32],
                block_number: 22_000_000,
                block_hash: [0xcd; 32],
                spec_version: 1_003_000,
                transaction_version: 26,
            })
        );
        assert_eq!(transport.params_of("chain_getHeader"), Some(json!([finalized])));
    }
}
