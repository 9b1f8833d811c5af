//! JSON-RPC 2.0 transport
//!
//! Providers talk to nodes only through [`JsonRpcTransport`], so tests can
//! substitute an in-memory implementation.

use crate::error::{Result, TxError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{trace, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait JsonRpcTransport: Send + Sync {
    /// Call `method` and return its `result`
    async fn call(&self, method: &str, params: Value) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    /// `None` only when the field is absent; `"result": null` is a value
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Transport over HTTP POST
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TxError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Turn a decoded envelope into the call's result
fn into_result(method: &str, response: JsonRpcResponse) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(TxError::Rpc {
            method: method.to_string(),
            code: Some(error.code),
            message: error.message,
        });
    }
    response
        .result
        .ok_or_else(|| TxError::rpc(method, "response has neither result nor error"))
}

#[async_trait]
impl JsonRpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        trace!(method, id, "JSON-RPC request");

        let outcome = async {
            let response = self
                .client
                .post(&self.url)
                .json(&request)
                .send()
                .await
                .map_err(|e| TxError::rpc(method, format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TxError::Rpc {
                    method: method.to_string(),
                    code: Some(i64::from(status.as_u16())),
                    message: format!("HTTP {status}: {body}"),
                });
            }

            let envelope: JsonRpcResponse = response
                .json()
                .await
                .map_err(|e| TxError::rpc(method, format!("invalid response: {e}")))?;
            into_result(method, envelope)
        }
        .await;

        if let Err(TxError::Rpc { code, message, .. }) = &outcome {
            warn!(method, ?code, %message, "JSON-RPC call failed");
        }
        outcome
    }
}

/// Typed view of a JSON result field
pub(crate) fn field<'a>(method: &str, value: &'a Value, pointer: &str) -> Result<&'a Value> {
    value
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| TxError::rpc(method, format!("response is missing {pointer}")))
}

pub(crate) fn field_str<'a>(method: &str, value: &'a Value, pointer: &str) -> Result<&'a str> {
    field(method, value, pointer)?
        .as_str()
        .ok_or_else(|| TxError::rpc(method, format!("{pointer} is not a string")))
}

pub(crate) fn field_u64(method: &str, value: &Value, pointer: &str) -> Result<u64> {
    let field = field(method, value, pointer)?;
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| TxError::rpc(method, format!("{pointer} is not an unsigned integer")))
}

/// `0x`-prefixed hex quantity
pub(crate) fn parse_quantity(method: &str, value: &Value) -> Result<u128> {
    let text = value
        .as_str()
        .ok_or_else(|| TxError::rpc(method, "quantity is not a string"))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|_| TxError::rpc(method, format!("invalid hex quantity {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> JsonRpcResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_envelope_mapping() {
        let ok = response(json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}));
        assert_eq!(into_result("eth_chainId", ok).unwrap(), json!("0x10"));

        let failed = response(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32000, "message": "nonce too low"}
        }));
        match into_result("eth_sendRawTransaction", failed) {
            Err(TxError::Rpc { method, code, message }) => {
                assert_eq!(method, "eth_sendRawTransaction");
                assert_eq!(code, Some(-32000));
                assert_eq!(message, "nonce too low");
            }
            other => panic!("unexpected {other:?}"),
        }

        let null = response(json!({"jsonrpc": "2.0", "id": 3, "result": null}));
        assert_eq!(into_result("getAccountInfo", null).unwrap(), Value::Null);

        let empty = response(json!({"jsonrpc": "2.0", "id": 4}));
        assert!(matches!(
            into_result("getblockcount", empty),
            Err(TxError::Rpc { code: None, .. })
        ));
    }

    #[test]
    fn test_request_envelope() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "getLatestBlockhash",
            params: json!([{"commitment": "finalized"}]),
            id: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["params"][0]["commitment"], "finalized");
    }

    #[test]
    fn test_field_helpers() {
        let value = json!({"result": {"value": {"blockhash": "abc", "slot": "12"}}});
        assert_eq!(field_str("m", &value, "/result/value/blockhash").unwrap(), "abc");
        assert_eq!(field_u64("m", &value, "/result/value/slot").unwrap(), 12);
        assert!(field("m", &value, "/result/missing").is_err());
        assert_eq!(parse_quantity("m", &json!("0x1bc16d674ec80000")).unwrap(), 2_000_000_000_000_000_000);
        assert_eq!(parse_quantity("m", &json!("0x")).unwrap(), 0);
        assert!(parse_quantity("m", &json!(5)).is_err());
    }
}
