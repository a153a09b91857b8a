//! Approval and swap/bridge transaction submission.
//!
//! Every transaction is gas-estimated first and sent with the estimate scaled by
//! the configured safety multiplier. Anything failing before the wallet returns a
//! hash is reported as [`SwapError::SubmissionFailed`]; a user rejection keeps
//! its own variant.

use crate::abi::IERC20;
use crate::aggregator::Aggregator;
use crate::config::SwapConfig;
use crate::error::{Result, SwapError};
use crate::evm_rpc::ChainRpc;
use crate::types::{BuildTxRequest, PermitSignature, Route, TransactionRequest, TxHash};
use crate::wallet::Wallet;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transaction builder and submitter
#[derive(Clone)]
pub struct TransactionExecutor {
    aggregator: Arc<dyn Aggregator>,
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn Wallet>,
    config: Arc<SwapConfig>,
}

impl TransactionExecutor {
    /// Create a new executor
    pub fn new(
        config: Arc<SwapConfig>,
        aggregator: Arc<dyn Aggregator>,
        rpc: Arc<dyn ChainRpc>,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        Self {
            aggregator,
            rpc,
            wallet,
            config,
        }
    }

    /// Submit `approve(spender, amount)` on `token`
    pub async fn submit_approval(
        &self,
        chain_id: u64,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash> {
        info!(
            "Submitting approval of {} on {} to {} (chain {})",
            amount, token, spender, chain_id
        );

        let request = TransactionRequest {
            chain_id,
            from: self.wallet.account(),
            to: token,
            data: Bytes::from(IERC20::approveCall { spender, amount }.abi_encode()),
            value: U256::ZERO,
            gas: None,
        };

        self.send(request).await
    }

    /// Build the route's transaction through the aggregator and submit it
    pub async fn submit_swap(
        &self,
        route: &Route,
        destination_call_data: Option<&Bytes>,
        permit: Option<&PermitSignature>,
    ) -> Result<TxHash> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        if let Some(permit) = permit.filter(|p| p.is_expired(now)) {
            return Err(SwapError::PermitExpired {
                deadline: permit.deadline(),
            });
        }

        info!(
            "Submitting route {} ({} -> {})",
            route.route_id, route.from_asset, route.to_asset
        );

        let built = self
            .aggregator
            .build_tx(&BuildTxRequest {
                route,
                destination_call_data,
                permit,
            })
            .await
            .map_err(|e| SwapError::SubmissionFailed(format!("Failed to build transaction: {}", e)))?;

        if let Some(chain_id) = built.chain_id.filter(|id| *id != route.from_chain_id) {
            return Err(SwapError::SubmissionFailed(format!(
                "Built transaction targets chain {} but route starts on chain {}",
                chain_id, route.from_chain_id
            )));
        }

        let request = TransactionRequest {
            chain_id: route.from_chain_id,
            from: self.wallet.account(),
            to: built.tx_target,
            data: built.tx_data,
            value: built.value,
            gas: None,
        };

        self.send(request).await
    }

    async fn send(&self, mut request: TransactionRequest) -> Result<TxHash> {
        let estimate = self
            .rpc
            .estimate_gas(&request)
            .await
            .map_err(|e| SwapError::SubmissionFailed(format!("Gas estimation failed: {}", e)))?;

        let gas = self.config.gas_limit(estimate);
        debug!("Gas estimate {} scaled to {}", estimate, gas);
        request.gas = Some(gas);

        match self.wallet.send_transaction(&request).await {
            Ok(hash) => {
                info!("Transaction broadcast: {}", hash);
                Ok(hash)
            }
            Err(e) if e.is_user_rejection() => {
                info!("Transaction rejected by user");
                Err(e)
            }
            Err(e) => {
                warn!("Transaction submission failed: {}", e);
                Err(SwapError::SubmissionFailed(e.to_string()))
            }
        }
    }
}
