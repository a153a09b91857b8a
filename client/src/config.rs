//! Configuration for the aggregator endpoint, chain RPC endpoints and flow tuning.
//!
//! Values can be built in code with the `with_*` builders, loaded from a TOML file,
//! or overlaid from the environment. Every constructor path ends in [`SwapConfig::validate`].

use crate::error::{Result, SwapError};
use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default aggregator API base URL
pub const DEFAULT_AGGREGATOR_URL: &str = "https://api.socket.tech/v2";

/// Canonical Permit2 deployment, same address on every supported chain
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// Environment variable overriding the aggregator URL
pub const ENV_AGGREGATOR_URL: &str = "EXA_AGGREGATOR_URL";

/// Environment variable holding the aggregator API key
pub const ENV_AGGREGATOR_API_KEY: &str = "EXA_AGGREGATOR_API_KEY";

/// JSON-RPC endpoint of one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcEndpoint {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// HTTP JSON-RPC URL
    pub url: String,
}

/// Configuration for the swap client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Aggregator API base URL
    pub aggregator_url: String,

    /// Aggregator API key, sent as the `API-KEY` header
    pub aggregator_api_key: Option<String>,

    /// JSON-RPC endpoint per chain
    pub rpc_endpoints: Vec<RpcEndpoint>,

    /// HTTP request timeout (in seconds)
    pub request_timeout_secs: u64,

    /// Maximum number of retries for failed read requests
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Delay before a scheduled quote fetch fires (in milliseconds)
    pub quote_debounce_ms: u64,

    /// Bridge-status polling interval (in milliseconds)
    pub bridge_poll_interval_ms: u64,

    /// Receipt polling interval (in milliseconds)
    pub receipt_poll_interval_ms: u64,

    /// Give up waiting for a receipt after this long (in seconds)
    pub receipt_timeout_secs: u64,

    /// Gas limit = estimate * multiplier / 10_000
    pub gas_multiplier_bps: u64,

    /// Permit signature lifetime, measured from signing time (in seconds)
    pub permit_deadline_secs: u64,

    /// EIP-712 domain version used for token permits
    pub permit_domain_version: String,

    /// Permit2 contract
    pub permit2_address: Address,

    /// Same-chain swap contract used as spender when a route carries no approval data
    pub swap_contract: Option<Address>,
}

impl SwapConfig {
    /// Create a configuration against the given aggregator
    pub fn new(aggregator_url: impl Into<String>) -> Self {
        Self {
            aggregator_url: aggregator_url.into(),
            aggregator_api_key: None,
            rpc_endpoints: Vec::new(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            quote_debounce_ms: 500,
            bridge_poll_interval_ms: 5000,
            receipt_poll_interval_ms: 1000,
            receipt_timeout_secs: 300,
            gas_multiplier_bps: 12_000,
            permit_deadline_secs: 3600,
            permit_domain_version: "1".to_string(),
            permit2_address: PERMIT2_ADDRESS,
            swap_contract: None,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SwapError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: SwapConfig = toml::from_str(&content)
            .map_err(|e| SwapError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay aggregator settings from the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_AGGREGATOR_URL) {
            config.aggregator_url = url;
        }
        if let Ok(key) = std::env::var(ENV_AGGREGATOR_API_KEY) {
            config.aggregator_api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the aggregator API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.aggregator_api_key = Some(key.into());
        self
    }

    /// Register a JSON-RPC endpoint for a chain
    pub fn with_rpc_url(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        let url = url.into();
        match self.rpc_endpoints.iter_mut().find(|e| e.chain_id == chain_id) {
            Some(endpoint) => endpoint.url = url,
            None => self.rpc_endpoints.push(RpcEndpoint { chain_id, url }),
        }
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set quote debounce delay
    pub fn with_quote_debounce(mut self, debounce_ms: u64) -> Self {
        self.quote_debounce_ms = debounce_ms;
        self
    }

    /// Set receipt and bridge polling configuration
    pub fn with_poll_config(
        mut self,
        receipt_poll_interval_ms: u64,
        receipt_timeout_secs: u64,
        bridge_poll_interval_ms: u64,
    ) -> Self {
        self.receipt_poll_interval_ms = receipt_poll_interval_ms;
        self.receipt_timeout_secs = receipt_timeout_secs;
        self.bridge_poll_interval_ms = bridge_poll_interval_ms;
        self
    }

    /// Set the gas safety multiplier in basis points
    pub fn with_gas_multiplier_bps(mut self, bps: u64) -> Self {
        self.gas_multiplier_bps = bps;
        self
    }

    /// Set the same-chain swap contract
    pub fn with_swap_contract(mut self, swap_contract: Address) -> Self {
        self.swap_contract = Some(swap_contract);
        self
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// RPC endpoint for a chain
    pub fn rpc_url(&self, chain_id: u64) -> Result<&str> {
        self.rpc_endpoints
            .iter()
            .find(|e| e.chain_id == chain_id)
            .map(|e| e.url.as_str())
            .ok_or(SwapError::UnsupportedChain(chain_id))
    }

    /// Scale a gas estimate by the safety multiplier
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(self.gas_multiplier_bps) / 10_000;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.aggregator_url)?;
        for endpoint in &self.rpc_endpoints {
            url::Url::parse(&endpoint.url).map_err(|e| {
                SwapError::ConfigError(format!(
                    "Invalid RPC URL for chain {}: {}",
                    endpoint.chain_id, e
                ))
            })?;
        }
        if self.request_timeout_secs == 0 {
            return Err(SwapError::ConfigError(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(SwapError::ConfigError(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(SwapError::ConfigError(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(SwapError::ConfigError(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.bridge_poll_interval_ms == 0 || self.receipt_poll_interval_ms == 0 {
            return Err(SwapError::ConfigError(
                "Poll intervals must be greater than 0".to_string(),
            ));
        }
        if self.receipt_timeout_secs == 0 {
            return Err(SwapError::ConfigError(
                "Receipt timeout must be greater than 0".to_string(),
            ));
        }
        if self.gas_multiplier_bps < 10_000 {
            return Err(SwapError::ConfigError(
                "Gas multiplier must be at least 10000 bps".to_string(),
            ));
        }
        if self.permit_deadline_secs == 0 {
            return Err(SwapError::ConfigError(
                "Permit deadline must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self::new(DEFAULT_AGGREGATOR_URL)
    }
}
