//! Completion tracking for broadcast transactions.
//!
//! This module provides receipt polling for the source transaction and
//! bridge-status polling for the destination leg of cross-chain routes.

use crate::aggregator::Aggregator;
use crate::cancel::CancelToken;
use crate::config::SwapConfig;
use crate::error::{Result, SwapError};
use crate::evm_rpc::ChainRpc;
use crate::types::{ActiveRoute, BridgeStatus, BridgeStatusQuery, Transaction, TxHash, TxStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Polling options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Receipt poll interval (in milliseconds)
    pub receipt_poll_interval_ms: u64,
    /// Receipt timeout (in seconds)
    pub receipt_timeout_secs: u64,
    /// Bridge-status poll interval (in milliseconds)
    pub bridge_poll_interval_ms: u64,
}

impl PollOptions {
    /// Create from swap config
    pub fn from_config(config: &SwapConfig) -> Self {
        Self {
            receipt_poll_interval_ms: config.receipt_poll_interval_ms,
            receipt_timeout_secs: config.receipt_timeout_secs,
            bridge_poll_interval_ms: config.bridge_poll_interval_ms,
        }
    }

    /// Set custom receipt poll interval
    pub fn with_receipt_interval(mut self, interval_ms: u64) -> Self {
        self.receipt_poll_interval_ms = interval_ms;
        self
    }

    /// Set custom receipt timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.receipt_timeout_secs = timeout_secs;
        self
    }

    /// Set custom bridge poll interval
    pub fn with_bridge_interval(mut self, interval_ms: u64) -> Self {
        self.bridge_poll_interval_ms = interval_ms;
        self
    }
}

/// Tracks transactions until they reach a final state
#[derive(Clone)]
pub struct CompletionTracker {
    rpc: Arc<dyn ChainRpc>,
    aggregator: Arc<dyn Aggregator>,
    options: PollOptions,
}

/// Sleep for `interval`, returning `Cancelled` if the token fires first
async fn pause(interval: Duration, cancel: &CancelToken) -> Result<()> {
    tokio::select! {
        _ = sleep(interval) => Ok(()),
        _ = cancel.cancelled() => Err(SwapError::Cancelled),
    }
}

impl CompletionTracker {
    /// Create a new tracker
    pub fn new(options: PollOptions, rpc: Arc<dyn ChainRpc>, aggregator: Arc<dyn Aggregator>) -> Self {
        Self {
            rpc,
            aggregator,
            options,
        }
    }

    /// Polling options in use
    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Wait for the receipt of `hash`. A successful receipt yields `success`, a
    /// revert yields `error`; both keep the hash.
    pub async fn await_confirmation(
        &self,
        chain_id: u64,
        hash: TxHash,
        cancel: &CancelToken,
    ) -> Result<Transaction> {
        info!(
            "Waiting for receipt of {} on chain {} (timeout: {}s)",
            hash, chain_id, self.options.receipt_timeout_secs
        );

        let start = Instant::now();
        let timeout = Duration::from_secs(self.options.receipt_timeout_secs);
        let poll_interval = Duration::from_millis(self.options.receipt_poll_interval_ms);
        let mut transaction = Transaction::pending(hash);

        loop {
            if cancel.is_cancelled() {
                return Err(SwapError::Cancelled);
            }
            if start.elapsed() >= timeout {
                warn!("Receipt wait timed out: {}", hash);
                return Err(SwapError::ConfirmationTimeout {
                    hash,
                    secs: self.options.receipt_timeout_secs,
                });
            }

            match self.rpc.transaction_receipt(chain_id, hash).await {
                Ok(Some(receipt)) => {
                    let status = if receipt.success {
                        info!("Transaction succeeded in block {}: {}", receipt.block_number, hash);
                        TxStatus::Success
                    } else {
                        warn!("Transaction reverted in block {}: {}", receipt.block_number, hash);
                        TxStatus::Error
                    };
                    transaction.advance(status);
                    return Ok(transaction);
                }
                Ok(None) => {
                    debug!("Transaction not yet mined: {}", hash);
                    transaction.advance(TxStatus::Processing);
                }
                Err(e) => {
                    debug!("Error fetching receipt: {:?}", e);
                }
            }

            pause(poll_interval, cancel).await?;
        }
    }

    /// Poll the bridge status until both legs leave `PENDING`. `on_update` sees
    /// every snapshot, including the final one. There is no timeout; stop it
    /// through `cancel`.
    pub async fn poll_bridge<F>(
        &self,
        query: BridgeStatusQuery,
        cancel: &CancelToken,
        mut on_update: F,
    ) -> Result<BridgeStatus>
    where
        F: FnMut(&BridgeStatus) + Send,
    {
        info!(
            "Polling bridge status of {} ({} -> {})",
            query.transaction_hash, query.from_chain_id, query.to_chain_id
        );

        let poll_interval = Duration::from_millis(self.options.bridge_poll_interval_ms);

        loop {
            if cancel.is_cancelled() {
                debug!("Bridge polling cancelled: {}", query.transaction_hash);
                return Err(SwapError::Cancelled);
            }

            match self.aggregator.bridge_status(&query).await {
                Ok(status) => {
                    debug!(
                        "Bridge legs: source {}, destination {}",
                        status.source_tx_status, status.destination_tx_status
                    );
                    on_update(&status);
                    if status.is_settled() {
                        info!("Bridge settled: {}", query.transaction_hash);
                        return Ok(status);
                    }
                }
                Err(e) => {
                    warn!("Bridge status poll failed: {}", e);
                }
            }

            pause(poll_interval, cancel).await?;
        }
    }

    /// Resume bridge polling for a route reported by `GET active-routes`
    pub async fn resume<F>(
        &self,
        route: &ActiveRoute,
        cancel: &CancelToken,
        on_update: F,
    ) -> Result<BridgeStatus>
    where
        F: FnMut(&BridgeStatus) + Send,
    {
        let transaction_hash = route
            .source_transaction_hash
            .ok_or(SwapError::MissingInput("source transaction hash"))?;

        info!("Resuming active route {}", route.route_id);
        self.poll_bridge(
            BridgeStatusQuery {
                transaction_hash,
                from_chain_id: route.from_chain_id,
                to_chain_id: route.to_chain_id,
            },
            cancel,
            on_update,
        )
        .await
    }
}
