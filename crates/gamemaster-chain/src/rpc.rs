//! Ethereum JSON-RPC implementation of the chain boundary.
//!
//! State is read with `eth_call` against the latest block. Forcing actions
//! go through `eth_sendTransaction` from the operator account, leaving the
//! signing to the node's keystore.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::address::Address;
use crate::auth::AuthContext;
use crate::client::{ChainClient, ChainConnection, GameContract};
use crate::error::TickError;
use crate::state::{GET_GAME_STATE_SELECTOR, GameState, Transition, TxReceipt};
use crate::types::ResourceId;

/// Per-request HTTP timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum RpcError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("node returned error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("node returned neither result nor error")]
    MissingResult,
    #[error("unexpected result: {0}")]
    Decode(String),
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP transport shared by every connection opened from one client
struct RpcTransport {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(target: "chain", "rpc #{} {}", id, method);

        let response: RpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (response.result, response.error) {
            (_, Some(err)) => Err(RpcError::Remote {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::MissingResult),
        }
    }
}

/// Chain client talking to a node over HTTP JSON-RPC
#[derive(Clone)]
pub struct JsonRpcClient {
    transport: Arc<RpcTransport>,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            transport: Arc::new(RpcTransport {
                http,
                endpoint: endpoint.into(),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.transport.endpoint
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    fn describe(&self) -> String {
        format!("json-rpc {}", self.transport.endpoint)
    }

    async fn connect(&self) -> Result<Box<dyn ChainConnection>, TickError> {
        let chain_id = self
            .transport
            .call("eth_chainId", json!([]))
            .await
            .map_err(|e| TickError::Connection(e.to_string()))?;
        debug!(target: "chain", "connected to {} (chain id {})", self.transport.endpoint, chain_id);

        Ok(Box::new(RpcConnection {
            transport: self.transport.clone(),
        }))
    }
}

struct RpcConnection {
    transport: Arc<RpcTransport>,
}

#[async_trait]
impl ChainConnection for RpcConnection {
    async fn bind(&self, resource: &ResourceId) -> Result<Box<dyn GameContract>, TickError> {
        let address: Address = resource.as_str().parse().map_err(|e| TickError::Bind {
            resource: resource.clone(),
            reason: format!("{e}"),
        })?;

        Ok(Box::new(RpcGame {
            transport: self.transport.clone(),
            address,
        }))
    }
}

struct RpcGame {
    transport: Arc<RpcTransport>,
    address: Address,
}

#[async_trait]
impl GameContract for RpcGame {
    async fn game_state(&self) -> Result<GameState, TickError> {
        let result = self
            .transport
            .call(
                "eth_call",
                json!([
                    {
                        "to": self.address.to_string(),
                        "data": encode_call(GET_GAME_STATE_SELECTOR),
                    },
                    "latest"
                ]),
            )
            .await
            .map_err(|e| TickError::StateRead(e.to_string()))?;

        let word = decode_word(&result).map_err(|e| TickError::StateRead(e.to_string()))?;
        Ok(GameState::from_word(&word))
    }

    async fn force(
        &self,
        auth: Option<&AuthContext>,
        transition: Transition,
    ) -> Result<TxReceipt, TickError> {
        let auth = auth.ok_or_else(|| TickError::Submission {
            transition,
            reason: "no operator account configured".to_string(),
        })?;

        let result = self
            .transport
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": auth.operator().to_string(),
                    "to": self.address.to_string(),
                    "data": encode_call(transition.selector()),
                }]),
            )
            .await
            .map_err(|e| TickError::Submission {
                transition,
                reason: e.to_string(),
            })?;

        match result {
            Value::String(hash) => Ok(TxReceipt { hash }),
            other => Err(TickError::Submission {
                transition,
                reason: RpcError::Decode(other.to_string()).to_string(),
            }),
        }
    }
}

/// Calldata for a zero-argument method
fn encode_call(selector: [u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Decode a single ABI word from an `eth_call` result
fn decode_word(result: &Value) -> Result<[u8; 32], RpcError> {
    let text = result
        .as_str()
        .ok_or_else(|| RpcError::Decode(result.to_string()))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(digits).map_err(|e| RpcError::Decode(e.to_string()))?;
    // Contracts may return more than one word; the state is the first
    if bytes.len() < 32 {
        return Err(RpcError::Decode(format!("{} byte return value", bytes.len())));
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&bytes[..32]);
    Ok(word)
}
