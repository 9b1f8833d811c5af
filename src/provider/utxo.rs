use super::{ensure_same_chain, log_broadcast, ChainProvider};
use crate::chain::ChainConfig;
use crate::codec::decode_hex;
use crate::error::{Result, TxError};
use crate::rpc::{field, field_str, field_u64, JsonRpcTransport};
use crate::transaction::{
    NetworkState, SignedTransaction, SpendableOutput, TransactionRequest, UtxoState,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{instrument, warn};

const SATS_PER_COIN: f64 = 100_000_000.0;
/// Confirmation target handed to `estimatesmartfee`
const CONFIRMATION_TARGET: u32 = 6;
/// Used when the node has no estimate yet
const MIN_FEE_RATE: u64 = 1;

pub struct UtxoProvider {
    config: Arc<ChainConfig>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl UtxoProvider {
    pub fn new(config: Arc<ChainConfig>, transport: Arc<dyn JsonRpcTransport>) -> Self {
        Self { config, transport }
    }
}

fn to_sats(method: &str, amount: &Value) -> Result<u64> {
    let coins = amount
        .as_f64()
        .filter(|coins| coins.is_finite() && *coins >= 0.0)
        .ok_or_else(|| TxError::rpc(method, format!("invalid amount {amount}")))?;
    Ok((coins * SATS_PER_COIN).round() as u64)
}

fn parse_unspent(method: &str, entry: &Value) -> Result<SpendableOutput> {
    let script_pubkey = decode_hex(field_str(method, entry, "/scriptPubKey")?)
        .map_err(|err| TxError::rpc(method, format!("scriptPubKey: {err}")))?;
    let vout = u32::try_from(field_u64(method, entry, "/vout")?)
        .map_err(|_| TxError::rpc(method, "vout exceeds u32"))?;
    Ok(SpendableOutput {
        txid: field_str(method, entry, "/txid")?.to_string(),
        vout,
        value: to_sats(method, field(method, entry, "/amount")?)?,
        script_pubkey,
    })
}

/// BTC/kvB to sat/vB, rounded up
fn fee_rate(estimate: &Value) -> Option<u64> {
    let per_kvb = estimate
        .get("feerate")?
        .as_f64()
        .filter(|rate| rate.is_finite() && *rate >= 0.0)?;
    let sats_per_kvb = (per_kvb * SATS_PER_COIN).round() as u64;
    Some(sats_per_kvb.div_ceil(1000).max(MIN_FEE_RATE))
}

#[async_trait]
impl ChainProvider for UtxoProvider {
    fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    #[instrument(skip(self, request), fields(chain = %self.config.alias))]
    async fn fetch_network_state(&self, request: &TransactionRequest) -> Result<NetworkState> {
        let method = "scantxoutset";
        let descriptor = format!("addr({})", request.sender());
        let scan = self
            .transport
            .call(method, json!(["start", [descriptor]]))
            .await?;
        let utxos = field(method, &scan, "/unspents")?
            .as_array()
            .ok_or_else(|| TxError::rpc(method, "unspents is not an array"))?
            .iter()
            .map(|entry| parse_unspent(method, entry))
            .collect::<Result<Vec<_>>>()?;

        let estimate = self
            .transport
            .call("estimatesmartfee", json!([CONFIRMATION_TARGET]))
            .await?;
        let fee_rate = fee_rate(&estimate).unwrap_or_else(|| {
            warn!(chain = %self.config.alias, ?estimate, "no fee estimate, using the minimum rate");
            MIN_FEE_RATE
        });

        Ok(NetworkState::Utxo(UtxoState { utxos, fee_rate }))
    }

    #[instrument(skip(self, signed), fields(chain = %self.config.alias, hash = signed.hash()))]
    async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        ensure_same_chain(&self.config, signed)?;
        let result = self
            .transport
            .call("sendrawtransaction", json!([signed.to_hex()]))
            .await?;
        log_broadcast(&self.config, signed, result.as_str());
        Ok(signed.hash().to_string())
    }
}
