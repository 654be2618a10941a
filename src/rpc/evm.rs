//! Minimal JSON-RPC reader for the target chain

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ChainReadClient;
use crate::address::{bytes_to_hex, hex_to_bytes, EvmAddress};
use crate::tx_builder::errors::{BridgeError, BridgeResult};

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    message: String,
}

/// `eth_call` / `eth_getCode` over HTTP JSON-RPC
#[derive(Debug)]
pub struct EvmRpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> BridgeResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::configuration(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::remote(&self.url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BridgeError::remote_status(&self.url, status.as_u16(), text));
        }

        let parsed: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::remote(&self.url, format!("invalid JSON-RPC body: {}", e)))?;

        if let Some(err) = parsed.error {
            return Err(BridgeError::remote(
                &self.url,
                format!("{} (code {})", err.message, err.code),
            ));
        }
        parsed
            .result
            .ok_or_else(|| BridgeError::remote(&self.url, format!("{} returned no result", method)))
    }

    fn hex_result(&self, method: &str, value: Value) -> BridgeResult<Vec<u8>> {
        let text = value.as_str().ok_or_else(|| {
            BridgeError::remote(&self.url, format!("{} result is not a string", method))
        })?;
        hex_to_bytes(text)
            .map_err(|e| BridgeError::remote(&self.url, format!("{} result: {}", method, e)))
    }
}

#[async_trait]
impl ChainReadClient for EvmRpcClient {
    async fn eth_call(&self, to: &EvmAddress, data: &[u8]) -> BridgeResult<Vec<u8>> {
        let params = json!([{ "to": to.to_string(), "data": bytes_to_hex(data) }, "latest"]);
        let value = self.request("eth_call", params).await?;
        self.hex_result("eth_call", value)
    }

    async fn get_code(&self, address: &EvmAddress) -> BridgeResult<Vec<u8>> {
        let value = self
            .request("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        self.hex_result("eth_getCode", value)
    }
}
