//! The node RPC surface the estimator polls.
//!
//! Transport, authentication and timeouts belong to the implementor; the
//! estimator treats every [`RpcError`] as transient and retries on the next
//! cycle. In-flight calls are aborted by dropping their futures when the
//! estimator stops.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::template_transaction::TemplateTransaction;

/// Rules requested from `getblocktemplate`.
pub const TEMPLATE_RULES: [&str; 6] = ["segwit", "taproot", "csv", "bip34", "bip65", "bip66"];

/// Node RPC error types
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Received invalid status code: {0}")]
    HttpStatus(u16),

    #[error("Received invalid content-type: {0}")]
    ContentType(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    /// Creates a Transport error.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Creates an InvalidResponse error.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Subset of `getmempoolinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolInfo {
    /// True once the node has finished loading its persisted mempool
    pub loaded: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub bytes: u64,
}

/// Subset of verbose `getblockheader`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub height: u64,
    pub time: u64,
}

/// Subset of `getblocktemplate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub transactions: Vec<TemplateTransaction>,
}

/// Read-only node calls consumed by the estimator.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// `getbestblockhash`
    async fn get_best_block_hash(&self) -> Result<String, RpcError>;

    /// `getmempoolinfo`
    async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError>;

    /// `getblockheader <hash> true`
    async fn get_block_header(&self, hash: &str) -> Result<BlockHeader, RpcError>;

    /// `getblocktemplate {"rules": [...]}`
    async fn get_block_template(&self, rules: &[&str]) -> Result<BlockTemplate, RpcError>;
}

#[async_trait]
impl<T: NodeRpc + ?Sized> NodeRpc for Arc<T> {
    async fn get_best_block_hash(&self) -> Result<String, RpcError> {
        (**self).get_best_block_hash().await
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, RpcError> {
        (**self).get_mempool_info().await
    }

    async fn get_block_header(&self, hash: &str) -> Result<BlockHeader, RpcError> {
        (**self).get_block_header(hash).await
    }

    async fn get_block_template(&self, rules: &[&str]) -> Result<BlockTemplate, RpcError> {
        (**self).get_block_template(rules).await
    }
}
