use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::address::{AddressCodec, SolanaAddressCodec};
use crate::chain::ChainConfig;
use crate::codec::base58::{decode_base58_array, encode_base58};
use crate::error::{Result, TxError};
use crate::rpc::{field, field_str, JsonRpcTransport};
use crate::solana::programs::{associated_token_address, TOKEN_PROGRAM_ID};
use crate::transaction::{NetworkState, SignedTransaction, SolanaState, TransactionRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

pub struct SolanaProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

/// Mint facts a `TransferChecked` needs
struct MintInfo {
    decimals: u8,
    program: [u8; 32],
}

impl SolanaProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }

    fn key(&self, address: &str) -> Result<[u8; 32]> {
        SolanaAddressCodec
            .decode(address)
            .map_err(|err| TxError::InvalidAddress {
                chain: self.config.alias,
                address: address.to_string(),
                reason: err.to_string(),
            })
    }

    async fn account_info(&self, address: &str, encoding: &str) -> Result<Value> {
        let result = self
            .transport
            .call(
                "getAccountInfo",
                json!([address, {"encoding": encoding, "commitment": "confirmed"}]),
            )
            .await?;
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn mint(&self, mint: &str) -> Result<MintInfo> {
        let method = "getAccountInfo";
        let account = self.account_info(mint, "jsonParsed").await?;
        if account.is_null() {
            return Err(TxError::rpc(method, format!("mint {mint} does not exist")));
        }
        let decimals = field(method, &account, "/data/parsed/info/decimals")?
            .as_u64()
            .and_then(|decimals| u8::try_from(decimals).ok())
            .ok_or_else(|| TxError::rpc(method, "mint decimals are not a small integer"))?;
        let owner = field_str(method, &account, "/owner")?;
        let program = decode_base58_array(owner)
            .map_err(|err| TxError::rpc(method, format!("mint owner: {err}")))?;
        Ok(MintInfo { decimals, program })
    }
}

#[async_trait]
impl ChainProvider for SolanaProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState> {
        let method = "getLatestBlockhash";
        let latest = self
            .transport
            .call(method, json!([{"commitment": "finalized"}]))
            .await?;
        let recent_blockhash = decode_base58_array(field_str(method, &latest, "/value/blockhash")?)
            .map_err(|err| TxError::rpc(method, format!("blockhash: {err}")))?;

        let mut state = SolanaState {
            recent_blockhash,
            token_decimals: None,
            token_program: None,
            destination_token_account_exists: false,
        };

        if let TransactionRequest::TokenTransfer(transfer) = request {
            let mint = self.mint(&transfer.token).await?;
            let destination = associated_token_address(
                &self.key(&transfer.to)?,
                &self.key(&transfer.token)?,
                &mint.program,
            );
            let account = self
                .account_info(&encode_base58(&destination), "base64")
                .await?;
            state.destination_token_account_exists = !account.is_null();
            state.token_decimals = Some(mint.decimals);
            state.token_program = (mint.program != TOKEN_PROGRAM_ID).then_some(mint.program);
        }

        Ok(NetworkState::Svm(state))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let result = self
            .transport
            .call(
                "sendTransaction",
                json!([encode_base58(signed.wire()), {"encoding": "base58"}]),
            )
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
    use crate::solana::programs::TOKEN_2022_PROGRAM_ID;
    use crate::transaction::{NativeTransfer, TokenTransfer};

    fn address(byte: u8) -> String {
        encode_base58(&[byte; 32])
    }

    fn provider(transport: &Arc<MockTransport>) -> SolanaProvider {
        SolanaProvider::new(
            Arc::new(ChainConfig::builtin(ChainAlias::Solana)),
            transport.clone(),
        )
    }

    fn blockhash() -> Value {
        json!({"context": {"slot": 1}, "value": {"blockhash": encode_base58(&[7; 32]), "lastValidBlockHeight": 9}})
    }

    #[tokio::test]
    async fn test_native_state() {
        let transport = Arc::new(MockTransport::default().with("getLatestBlockhash", blockhash()));
        let request = NativeTransfer::new(address(1), address(2), 5).into();
        let state = provider(&transport).fetch_network_state(&request).await.unwrap();
        match state {
            NetworkState::Svm(state) => {
                assert_eq!(state.recent_blockhash, [7; 32]);
                assert_eq!(state.token_decimals, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.methods(), vec!["getLatestBlockhash"]);
    }

    #[tokio::test]
    async fn test_token_state_reads_mint() {
        let mint_account = json!({
            "value": {
                "owner": encode_base58(&TOKEN_2022_PROGRAM_ID),
                "data": {"parsed": {"info": {"decimals": 6}}}
            }
        });
        let transport = Arc::new(
            MockTransport::default()
                .with("getLatestBlockhash", blockhash())
                .with("getAccountInfo", mint_account),
        );
        let request = TokenTransfer {
            from: address(1),
            to: address(2),
            token: address(3),
            amount: 10,
        }
        .into();
        let state = provider(&transport).fetch_network_state(&request).await.unwrap();
        match state {
            NetworkState::Svm(state) => {
                assert_eq!(state.token_decimals, Some(6));
                assert_eq!(state.token_program, Some(TOKEN_2022_PROGRAM_ID));
                // the mock answers every getAccountInfo with the mint
                assert!(state.destination_token_account_exists);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
