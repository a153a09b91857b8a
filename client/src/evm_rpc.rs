//! JSON-RPC client for the EVM reads the flow depends on.
//!
//! [`ChainRpc`] is the seam the resolver, executor and tracker are written against;
//! [`EvmRpcClient`] implements it over HTTP with one endpoint per chain.

use crate::abi::IERC20;
use crate::config::SwapConfig;
use crate::error::{Result, SwapError};
use crate::retry::RetryStrategy;
use crate::types::{TransactionReceipt, TransactionRequest, TxHash};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// JSON-RPC request ID type
type RequestId = u64;

/// Chain reads and gas estimation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// ERC-20 `allowance(owner, spender)`
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256>;

    /// ERC-20 `decimals()`
    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8>;

    /// EIP-2612 `nonces(owner)`
    async fn nonces(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256>;

    /// ERC-20 `name()`
    async fn name(&self, chain_id: u64, token: Address) -> Result<String>;

    /// EIP-712 domain `version()`
    async fn version(&self, chain_id: u64, token: Address) -> Result<String>;

    /// Deployed bytecode at `account`
    async fn code(&self, chain_id: u64, account: Address) -> Result<Bytes>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64>;

    /// `eth_getTransactionReceipt`, `None` while the transaction is not mined
    async fn transaction_receipt(
        &self,
        chain_id: u64,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>>;
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: RequestId,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client
#[derive(Clone)]
pub struct EvmRpcClient {
    client: Client,
    endpoints: HashMap<u64, String>,
    retry_strategy: RetryStrategy,
    request_id: Arc<AtomicU64>,
}

impl EvmRpcClient {
    /// Create a new client for every chain in the config
    pub fn new(config: &SwapConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(SwapError::NetworkError)?;

        let endpoints = config
            .rpc_endpoints
            .iter()
            .map(|e| (e.chain_id, e.url.clone()))
            .collect();

        Ok(Self {
            client,
            endpoints,
            retry_strategy: RetryStrategy::from_config(config),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> RequestId {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn endpoint(&self, chain_id: u64) -> Result<&str> {
        self.endpoints
            .get(&chain_id)
            .map(String::as_str)
            .ok_or(SwapError::UnsupportedChain(chain_id))
    }

    /// Make a JSON-RPC call
    async fn call_rpc(&self, chain_id: u64, method: &str, params: Value) -> Result<Value> {
        let url = self.endpoint(chain_id)?;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_request_id(),
            method,
            params,
        };

        debug!(
            "RPC request: {} on chain {} (id: {})",
            method, chain_id, request.id
        );

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(SwapError::NetworkError)?;

                let status = response.status();
                if status.as_u16() == 429 {
                    return Err(SwapError::RateLimitExceeded(1));
                }
                if !status.is_success() {
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(SwapError::InvalidResponse(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }

                let rpc_response: JsonRpcResponse = response
                    .json()
                    .await
                    .map_err(|e| SwapError::InvalidResponse(e.to_string()))?;

                if let Some(error) = rpc_response.error {
                    debug!("RPC error: {} (code: {})", error.message, error.code);
                    return Err(SwapError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }

                Ok(rpc_response.result)
            })
            .await
    }

    /// `eth_call` a view function and decode its return value
    async fn call<C: SolCall + Send + Sync>(
        &self,
        chain_id: u64,
        to: Address,
        call: &C,
    ) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());
        let result = self
            .call_rpc(
                chain_id,
                "eth_call",
                json!([{ "to": to, "data": data }, "latest"]),
            )
            .await?;

        let raw: Bytes = serde_json::from_value(result)?;
        C::abi_decode_returns(&raw, true).map_err(|e| SwapError::AbiDecode(e.to_string()))
    }
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(value: &Value, field: &str) -> Result<u64> {
    let raw = value
        .as_str()
        .ok_or_else(|| SwapError::InvalidResponse(format!("Missing {}", field)))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map_err(|e| SwapError::InvalidResponse(format!("Invalid {}: {}", field, e)))
}

fn parse_receipt(hash: TxHash, body: &Value) -> Result<TransactionReceipt> {
    Ok(TransactionReceipt {
        transaction_hash: hash,
        success: parse_quantity(&body["status"], "status")? == 1,
        block_number: parse_quantity(&body["blockNumber"], "blockNumber")?,
        gas_used: parse_quantity(&body["gasUsed"], "gasUsed").unwrap_or(0),
    })
}

#[async_trait]
impl ChainRpc for EvmRpcClient {
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        let ret = self
            .call(chain_id, token, &IERC20::allowanceCall { owner, spender })
            .await?;
        Ok(ret._0)
    }

    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8> {
        let ret = self.call(chain_id, token, &IERC20::decimalsCall {}).await?;
        Ok(ret._0)
    }

    async fn nonces(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256> {
        let ret = self
            .call(chain_id, token, &IERC20::noncesCall { owner })
            .await?;
        Ok(ret._0)
    }

    async fn name(&self, chain_id: u64, token: Address) -> Result<String> {
        let ret = self.call(chain_id, token, &IERC20::nameCall {}).await?;
        Ok(ret._0)
    }

    async fn version(&self, chain_id: u64, token: Address) -> Result<String> {
        let ret = self.call(chain_id, token, &IERC20::versionCall {}).await?;
        Ok(ret._0)
    }

    async fn code(&self, chain_id: u64, account: Address) -> Result<Bytes> {
        let result = self
            .call_rpc(chain_id, "eth_getCode", json!([account, "latest"]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64> {
        let params = json!([{
            "from": request.from,
            "to": request.to,
            "data": request.data,
            "value": request.value,
        }]);

        let result = self
            .call_rpc(request.chain_id, "eth_estimateGas", params)
            .await?;
        let gas = parse_quantity(&result, "gas estimate")?;

        debug!("Estimated gas on chain {}: {}", request.chain_id, gas);
        Ok(gas)
    }

    async fn transaction_receipt(
        &self,
        chain_id: u64,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>> {
        let result = self
            .call_rpc(chain_id, "eth_getTransactionReceipt", json!([hash]))
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        parse_receipt(hash, &result).map(Some).map_err(|e| {
            error!("Malformed receipt for {}: {}", hash, e);
            e
        })
    }
}
