use async_trait::async_trait;
use base64::Engine;
use bitcoin_feerate_estimator::{
    BlockHeader, BlockTemplate, MempoolInfo, NodeRpc, RpcError,
};
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

/// Bitcoin RPC configuration
#[derive(Debug, Clone)]
pub struct BitcoinRpcConfig {
    /// Endpoint URL, e.g. `http://127.0.0.1:8332/`
    pub url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// JSON-RPC client for the Bitcoin Core calls the estimator needs
pub struct BitcoinRpcClient {
    client: Client,
    config: BitcoinRpcConfig,
    auth_header: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorResponse>,
}

#[derive(Deserialize)]
struct RpcErrorResponse {
    code: i64,
    message: String,
}

impl BitcoinRpcClient {
    /// Creates a new Bitcoin RPC client
    pub fn new(config: BitcoinRpcConfig) -> Result<Self, RpcError> {
        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", config.username, config.password));

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RpcError::transport)?;

        Ok(Self {
            client,
            auth_header: format!("Basic {}", auth),
            config,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Performs one JSON-RPC call and decodes its `result`.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: Utc::now().timestamp_millis().to_string(),
            method,
            params,
        };
        debug!("RPC call {} (id {})", method, request.id);

        let response = self
            .client
            .post(&self.config.url)
            .header(header::AUTHORIZATION, &self.auth_header)
            .json(&request)
            .send()
            .await
            .map_err(RpcError::transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("RPC {} failed with status: {}", method, status);
            return Err(RpcError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(RpcError::ContentType(content_type));
        }

        let body = response.bytes().await.map_err(RpcError::transport)?;
        let parsed: RpcResponse = serde_json::from_slice(&body)?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = parsed
            .result
            .ok_or_else(|| RpcError::invalid_response(format!("{method} returned no result")))?;
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl NodeRpc for BitcoinRpcClient {
    async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        self.call("getbestblockhash", json!([])).await
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError> {
        self.call("getmempoolinfo", json!([])).await
    }

    async fn get_block_header(&self, hash: &str) -> Result<BlockHeader, RpcError> {
        self.call("getblockheader", json!([hash, true])).await
    }

    async fn get_block_template(&self, rules: &[&str]) -> Result<BlockTemplate, RpcError> {
        self.call("getblocktemplate", json!([{ "rules": rules }])).await
    }
}
