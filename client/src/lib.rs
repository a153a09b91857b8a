//! Exactly Swap and Bridge Client
//!
//! This library drives the client side of swapping or bridging any wallet asset
//! into a target token: it fetches routes from a swap/bridge aggregator, resolves
//! and grants the allowance the route needs, submits the transaction and tracks
//! it to completion, including the destination leg of cross-chain routes.
//!
//! # Features
//!
//! - **Quote Fetching**: Debounced aggregator quotes where only the latest request is ever committed
//! - **Allowance Resolution**: Plain approvals, EIP-2612 permits, Permit2 signatures, contract-wallet approvals
//! - **Signature Provider**: EIP-712 typed data for `permit` and `PermitTransferFrom`
//! - **Transaction Execution**: Gas-estimated submissions with a safety multiplier
//! - **Completion Tracking**: Receipt polling and bridge-status polling with cancellation
//! - **Orchestration**: A single `TxStep` state machine per flow
//! - **Retry Logic**: Exponential backoff for read-only calls
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use exa_swap_client::{FlowKind, SwapConfig, SwapInput, SwapOrchestrator, StepOutcome, Wallet};
//! use std::sync::Arc;
//!
//! # async fn run(wallet: Arc<dyn Wallet>, input: SwapInput) -> Result<(), Box<dyn std::error::Error>> {
//! exa_swap_client::init_tracing();
//!
//! let config = SwapConfig::from_env()?.with_rpc_url(10, "https://mainnet.optimism.io");
//! let flow = SwapOrchestrator::connect(config, FlowKind::GenericSwap, wallet)?;
//!
//! flow.set_input(input).await;
//! flow.quotes_settled().await;
//!
//! flow.review().await;
//! if let StepOutcome::Failed(error) = flow.approve().await {
//!     println!("Approval failed: {}", error.message);
//! }
//! flow.submit().await;
//!
//! println!("Transaction: {:?}", flow.transaction().await);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod abi;
pub mod aggregator;
pub mod allowance;
pub mod cancel;
pub mod config;
pub mod error;
pub mod evm_rpc;
pub mod executor;
pub mod orchestrator;
pub mod quotes;
pub mod retry;
pub mod signature;
pub mod tracker;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use aggregator::{Aggregator, AggregatorClient};
pub use allowance::{AllowanceResolver, ApprovalPlan};
pub use cancel::{CancelToken, Epoch, Ticket};
pub use config::{RpcEndpoint, SwapConfig, PERMIT2_ADDRESS};
pub use error::{FlowError, FlowErrorKind, Result, Severity, SwapError};
pub use evm_rpc::{ChainRpc, EvmRpcClient};
pub use executor::TransactionExecutor;
pub use orchestrator::{FlowKind, FlowSnapshot, StepOutcome, SwapInput, SwapOrchestrator};
pub use quotes::{QuoteFetcher, QuoteInput, QuoteState, RoutesError};
pub use retry::RetryStrategy;
pub use signature::{permit2_nonce, PermitSupport, SignatureProvider};
pub use tracker::{CompletionTracker, PollOptions};
pub use types::{
    AccountKind, ActiveRoute, ApprovalDescriptor, Asset, BridgeStatus, BridgeStatusQuery,
    BuildTxResponse, Chain, LegStatus, PermitSignature, QuoteRequest, QuoteResponse, Route,
    RouteSet, RouteStep, TokenBalance, Transaction, TransactionReceipt, TransactionRequest,
    TxHash, TxStatus, TxStep, NATIVE_ASSET_ADDRESS,
};
pub use wallet::{TypedDataDomain, TypedDataRequest, Wallet};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a `tracing` subscriber filtered by `RUST_LOG`, defaulting to `info`.
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
