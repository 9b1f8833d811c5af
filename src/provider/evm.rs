use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::address::evm::parse_address;
use crate::chain::ChainConfig;
use crate::error::{Result, TxError};
use crate::evm::abi::Erc20Call;
use crate::rpc::{field, parse_quantity, JsonRpcTransport};
use crate::transaction::{EvmState, NetworkState, SignedTransaction, TransactionRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// Max fee = `BASE_FEE_MULTIPLIER * base fee + priority fee`
const BASE_FEE_MULTIPLIER: u128 = 2;

pub struct EvmProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl EvmProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let result = self.transport.call(method, params).await?;
        parse_quantity(method, &result)
    }

    /// `eth_estimateGas` call object for `request`
    fn call_object(&self, request: &TransactionRequest) -> Result<Value> {
        let hex = |bytes: &[u8]| format!("0x{}", hex::encode(bytes));
        let quantity = |value: u128| format!("{value:#x}");
        Ok(match request {
            TransactionRequest::NativeTransfer(transfer) => json!({
                "from": transfer.from,
                "to": transfer.to,
                "value": quantity(transfer.amount),
            }),
            TransactionRequest::TokenTransfer(transfer) => {
                let to = parse_address(&transfer.to).map_err(|err| TxError::InvalidAddress {
                    chain: self.config.alias,
                    address: transfer.to.clone(),
                    reason: err.to_string(),
                })?;
                let data = Erc20Call::Transfer {
                    to,
                    amount: transfer.amount,
                }
                .encode();
                json!({
                    "from": transfer.from,
                    "to": transfer.token,
                    "data": hex(&data),
                })
            }
            TransactionRequest::ContractCall(call) => json!({
                "from": call.from,
                "to": call.contract,
                "value": quantity(call.value),
                "data": hex(&call.data),
            }),
            TransactionRequest::ContractDeploy(deploy) => json!({
                "from": deploy.from,
                "value": quantity(deploy.value),
                "data": hex(&deploy.bytecode),
            }),
        })
    }
}

#[async_trait]
impl ChainProvider for EvmProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState> {
        let params = self.config.evm()?;
        let nonce = self
            .quantity("eth_getTransactionCount", json!([request.sender(), "pending"]))
            .await?;
        let gas_limit = self
            .quantity("eth_estimateGas", json!([self.call_object(request)?]))
            .await?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;

        let (max_fee_per_gas, max_priority_fee_per_gas) = if params.eip1559 {
            let priority = self.quantity("eth_maxPriorityFeePerGas", json!([])).await?;
            let method = "eth_getBlockByNumber";
            let block = self.transport.call(method, json!(["latest", false])).await?;
            let base_fee = parse_quantity(method, field(method, &block, "/baseFeePerGas")?)?;
            (
                base_fee.saturating_mul(BASE_FEE_MULTIPLIER).saturating_add(priority),
                priority,
            )
        } else {
            (gas_price, 0)
        };

        let narrow = |name: &str, value: u128| {
            u64::try_from(value).map_err(|_| TxError::rpc(name, format!("{value} exceeds u64")))
        };
        Ok(NetworkState::Evm(EvmState {
            nonce: narrow("eth_getTransactionCount", nonce)?,
            gas_limit: narrow("eth_estimateGas", gas_limit)?,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let result = self
            .transport
            .call("eth_sendRawTransaction", json!([format!("0x{}", signed.to_hex())]))
            .await?;
        log_broadcast(&self.config, signed, result.as_str());
        Ok(signed.hash().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainAlias;
    use crate::provider::mock::MockTransport;
    use crate::transaction::{NativeTransfer, TokenTransfer};

    const FROM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const TO: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";

    fn transport() -> MockTransport {
        MockTransport::default()
            .with("eth_getTransactionCount", json!("0x7"))
            .with("eth_estimateGas", json!("0x5208"))
            .with("eth_gasPrice", json!("0x3b9aca00"))
            .with("eth_maxPriorityFeePerGas", json!("0x77359400"))
            .with("eth_getBlockByNumber", json!({"baseFeePerGas": "0x3b9aca00"}))
    }

    #[tokio::test]
    async fn test_eip1559_state() {
        let transport = Arc::new(transport());
        let provider = EvmProvider::new(Arc::new(ChainConfig::builtin(ChainAlias::Ethereum)), transport.clone());
        let request = NativeTransfer::new(FROM, TO, 1).into();
        let state = provider.fetch_network_state(&request).await.unwrap();
        assert_eq!(
            state,
            NetworkState::Evm(EvmState {
                nonce: 7,
                gas_limit: 21_000,
                gas_price: 1_000_000_000,
                max_fee_per_gas: 4_000_000_000,
                max_priority_fee_per_gas: 2_000_000_000,
            })
        );
        assert_eq!(transport.params_of("eth_getTransactionCount"), Some(json!([FROM, "pending"])));
    }

    #[tokio::test]
    async fn test_legacy_chain_skips_fee_history() {
        let transport = Arc::new(transport());
        let provider = EvmProvider::new(Arc::new(ChainConfig::builtin(ChainAlias::Bsc)), transport.clone());
        let request = TokenTransfer {
            from: FROM.to_string(),
            to: TO.to_string(),
            token: TO.to_string(),
            amount: 5,
        }
        .into();
        provider.fetch_network_state(&request).await.unwrap();
        assert!(!transport.methods().contains(&"eth_maxPriorityFeePerGas".to_string()));
        let estimate = transport.params_of("eth_estimateGas").unwrap();
        assert!(estimate[0]["data"].as_str().unwrap().starts_with("0xa9059cbb"));
    }
}
