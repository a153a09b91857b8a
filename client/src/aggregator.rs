//! Routing aggregator API client.
//!
//! This module provides a client for the swap/bridge aggregator, which is used for
//! listing chains and balances, fetching quotes, building route transactions and
//! polling bridge status.

use crate::config::SwapConfig;
use crate::error::{Result, SwapError};
use crate::retry::RetryStrategy;
use crate::types::{
    ActiveRoute, BridgeStatus, BridgeStatusQuery, BuildTxRequest, BuildTxResponse, Chain,
    QuoteRequest, QuoteResponse, TokenBalance,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Aggregator endpoints used by the flow
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// `GET chains`
    async fn chains(&self) -> Result<Vec<Chain>>;

    /// `GET balances?userAddress=`
    async fn balances(&self, user: Address) -> Result<Vec<TokenBalance>>;

    /// `POST quote`
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse>;

    /// `POST build-tx`
    async fn build_tx(&self, request: &BuildTxRequest<'_>) -> Result<BuildTxResponse>;

    /// `GET active-routes?userAddress=`
    async fn active_routes(&self, user: Address) -> Result<Vec<ActiveRoute>>;

    /// `GET bridge-status?transactionHash=&fromChainId=&toChainId=`
    async fn bridge_status(&self, query: &BridgeStatusQuery) -> Result<BridgeStatus>;
}

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP aggregator client
#[derive(Clone)]
pub struct AggregatorClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry_strategy: RetryStrategy,
}

impl AggregatorClient {
    /// Create a new aggregator client
    pub fn new(config: &SwapConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(SwapError::NetworkError)?;

        Ok(Self {
            client,
            base_url: config.aggregator_url.trim_end_matches('/').to_string(),
            api_key: config.aggregator_api_key.clone(),
            retry_strategy: RetryStrategy::from_config(config),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("API-KEY", key),
            None => builder,
        }
    }

    async fn send_request<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(SwapError::NetworkError)?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(SwapError::RateLimitExceeded(retry_after));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SwapError::Aggregator {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| SwapError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            return Err(SwapError::Aggregator {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| SwapError::InvalidResponse("Missing result field".to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        self.retry_strategy
            .retry(|| self.send_request(self.client.get(&url).query(query)))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);

        self.retry_strategy
            .retry(|| self.send_request(self.client.post(&url).json(body)))
            .await
    }

    /// Health check - verify the aggregator answers
    pub async fn health_check(&self) -> Result<bool> {
        match self.chains().await {
            Ok(chains) => {
                info!("Aggregator health check passed ({} chains)", chains.len());
                Ok(true)
            }
            Err(e) => {
                warn!("Aggregator health check failed: {:?}", e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Aggregator for AggregatorClient {
    async fn chains(&self) -> Result<Vec<Chain>> {
        self.get("chains", &[]).await
    }

    async fn balances(&self, user: Address) -> Result<Vec<TokenBalance>> {
        debug!("Fetching balances for: {}", user);
        self.get("balances", &[("userAddress", user.to_string())])
            .await
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        info!(
            "Requesting quote {} -> {} for {} of {}",
            request.from_chain_id, request.to_chain_id, request.from_amount, request.from_token_address
        );

        let response: QuoteResponse = self.post("quote", request).await?;
        debug!("Quote returned {} routes", response.routes.len());
        Ok(response)
    }

    async fn build_tx(&self, request: &BuildTxRequest<'_>) -> Result<BuildTxResponse> {
        info!("Building transaction for route {}", request.route.route_id);
        self.post("build-tx", request).await
    }

    async fn active_routes(&self, user: Address) -> Result<Vec<ActiveRoute>> {
        self.get("active-routes", &[("userAddress", user.to_string())])
            .await
    }

    async fn bridge_status(&self, query: &BridgeStatusQuery) -> Result<BridgeStatus> {
        debug!("Fetching bridge status for: {}", query.transaction_hash);
        self.get(
            "bridge-status",
            &[
                ("transactionHash", query.transaction_hash.to_string()),
                ("fromChainId", query.from_chain_id.to_string()),
                ("toChainId", query.to_chain_id.to_string()),
            ],
        )
        .await
    }
}
