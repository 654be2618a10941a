//! Price quote API adapter
//!
//! Two read-only endpoints: an indicative `quote` and an executable `swap`
//! that also returns the calldata to run on the target chain.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::address::{hex_to_bytes, EvmAddress};
use crate::tx_builder::errors::{BridgeError, BridgeResult};

const API_KEY_HEADER: &str = "x-api-key";

/// Indicative quote request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub from_token: EvmAddress,
    pub to_token: EvmAddress,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteResponse {
    pub to_amount: u128,
}

/// Executable swap request; `from_address` is the account that will run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub from_token: EvmAddress,
    pub to_token: EvmAddress,
    pub amount: u128,
    pub from_address: EvmAddress,
    pub max_slippage_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResponse {
    /// Contract to call
    pub to: EvmAddress,
    /// Calldata for the swap
    pub data: Vec<u8>,
    /// Output the swap is quoted to produce
    pub to_amount: u128,
}

/// Source of price quotes and executable swap payloads
#[async_trait]
pub trait PriceQuoteApi: Send + Sync {
    async fn get_quote(&self, req: &QuoteRequest) -> BridgeResult<QuoteResponse>;

    async fn build_swap_transaction(&self, req: &SwapRequest) -> BridgeResult<SwapResponse>;
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "toAmount")]
    to_amount: Option<Value>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSwapTx {
    to: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct RawSwap {
    transaction: Option<RawSwapTx>,
    quote: Option<RawQuote>,
    error: Option<String>,
}

/// Parse an amount that may arrive as a decimal string or a JSON number
fn parse_amount(endpoint: &str, value: Option<&Value>) -> BridgeResult<u128> {
    let value = value.ok_or_else(|| BridgeError::remote(endpoint, "response has no toAmount"))?;
    let parsed = match value {
        Value::String(s) => s.parse::<u128>().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    parsed.ok_or_else(|| BridgeError::remote(endpoint, format!("invalid toAmount: {}", value)))
}

/// Basis points rendered as a percentage string ("500" bps -> "5")
fn bps_to_percent(bps: u16) -> String {
    let whole = bps / 100;
    let frac = bps % 100;
    if frac == 0 {
        whole.to_string()
    } else {
        format!("{}.{:02}", whole, frac).trim_end_matches('0').to_string()
    }
}

/// reqwest-backed quote API client
#[derive(Debug, Clone)]
pub struct HttpPriceQuoteApi {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPriceQuoteApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> BridgeResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::configuration(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn with_key(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> BridgeResult<T> {
        let resp = self
            .with_key(self.http.get(endpoint).query(query))
            .send()
            .await
            .map_err(|e| BridgeError::remote(endpoint, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BridgeError::remote(endpoint, e.to_string()))?;

        if status.as_u16() == 429 {
            return Err(BridgeError::remote_status(endpoint, 429, body));
        }

        // Error payloads come back with 4xx and a JSON `error` field; keep
        // the field text when present.
        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => Err(BridgeError::remote(
                endpoint,
                format!("invalid response body: {}", e),
            )),
            Err(_) => Err(BridgeError::remote_status(endpoint, status.as_u16(), body)),
        }
    }
}

#[async_trait]
impl PriceQuoteApi for HttpPriceQuoteApi {
    async fn get_quote(&self, req: &QuoteRequest) -> BridgeResult<QuoteResponse> {
        let endpoint = self.endpoint("quote");
        let raw: RawQuote = self
            .get_json(
                &endpoint,
                &[
                    ("from", req.from_token.to_string()),
                    ("to", req.to_token.to_string()),
                    ("amount", req.amount.to_string()),
                ],
            )
            .await?;

        if let Some(error) = raw.error {
            return Err(BridgeError::quote_unavailable(error));
        }
        Ok(QuoteResponse {
            to_amount: parse_amount(&endpoint, raw.to_amount.as_ref())?,
        })
    }

    async fn build_swap_transaction(&self, req: &SwapRequest) -> BridgeResult<SwapResponse> {
        let endpoint = self.endpoint("swap");
        let raw: RawSwap = self
            .get_json(
                &endpoint,
                &[
                    ("from", req.from_token.to_string()),
                    ("to", req.to_token.to_string()),
                    ("amount", req.amount.to_string()),
                    ("fromAddress", req.from_address.to_string()),
                    ("maxSlippage", bps_to_percent(req.max_slippage_bps)),
                ],
            )
            .await?;

        if let Some(error) = raw.error {
            return Err(BridgeError::quote_unavailable(error));
        }
        let tx = raw
            .transaction
            .ok_or_else(|| BridgeError::remote(&endpoint, "response has no transaction"))?;
        let quote = raw
            .quote
            .ok_or_else(|| BridgeError::remote(&endpoint, "response has no quote"))?;

        let to = EvmAddress::parse(tx.to.as_str())
            .map_err(|e| BridgeError::remote(&endpoint, format!("transaction.to: {}", e)))?;
        let data = hex_to_bytes(&tx.data)
            .map_err(|e| BridgeError::remote(&endpoint, format!("transaction.data: {}", e)))?;

        Ok(SwapResponse {
            to,
            data,
            to_amount: parse_amount(&endpoint, quote.to_amount.as_ref())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn token(b: u8) -> EvmAddress {
        EvmAddress::new([b; 20])
    }

    #[test]
    fn test_bps_to_percent() {
        assert_eq!(bps_to_percent(500), "5");
        assert_eq!(bps_to_percent(750), "7.5");
        assert_eq!(bps_to_percent(125), "1.25");
        assert_eq!(bps_to_percent(5), "0.05");
    }

    #[tokio::test]
    async fn test_get_quote_sends_key_and_parses_amount() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/quote")
            .match_header("x-api-key", "secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("amount".into(), "1000000000".into()),
                Matcher::UrlEncoded("from".into(), token(1).to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"toAmount":"2500000"}"#)
            .create_async()
            .await;

        let api =
            HttpPriceQuoteApi::new(server.url(), Some("secret".into()), Duration::from_secs(5))
                .unwrap();
        let resp = api
            .get_quote(&QuoteRequest {
                from_token: token(1),
                to_token: token(2),
                amount: 1_000_000_000,
            })
            .await
            .unwrap();

        assert_eq!(resp.to_amount, 2_500_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_swap_parses_transaction() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/swap")
            .match_query(Matcher::UrlEncoded("maxSlippage".into(), "5".into()))
            .with_status(200)
            .with_body(format!(
                r#"{{"transaction":{{"to":"{}","data":"0xabcd"}},"quote":{{"toAmount":42}}}}"#,
                token(9)
            ))
            .create_async()
            .await;

        let api = HttpPriceQuoteApi::new(server.url(), None, Duration::from_secs(5)).unwrap();
        let resp = api
            .build_swap_transaction(&SwapRequest {
                from_token: token(1),
                to_token: token(2),
                amount: 10,
                from_address: token(3),
                max_slippage_bps: 500,
            })
            .await
            .unwrap();

        assert_eq!(resp.to, token(9));
        assert_eq!(resp.data, vec![0xab, 0xcd]);
        assert_eq!(resp.to_amount, 42);
    }

    #[tokio::test]
    async fn test_error_field_and_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"no route"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/swap")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let api = HttpPriceQuoteApi::new(server.url(), None, Duration::from_secs(5)).unwrap();
        let err = api
            .get_quote(&QuoteRequest {
                from_token: token(1),
                to_token: token(2),
                amount: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::QuoteUnavailable(ref m) if m == "no route"));

        let err = api
            .build_swap_transaction(&SwapRequest {
                from_token: token(1),
                to_token: token(2),
                amount: 1,
                from_address: token(3),
                max_slippage_bps: 100,
            })
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }
}
