//! Error types for the swap and bridge orchestration layer.
//!
//! [`SwapError`] is what every component returns. The orchestrator never lets it
//! escape a state transition; instead it is folded into a [`FlowError`] and parked
//! in the flow's error slot where views can read it.

use crate::types::TxHash;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for swap and bridge operations
#[derive(Error, Debug)]
pub enum SwapError {
    /// Aggregator answered with a non-success HTTP status or `success: false`
    #[error("Aggregator error (status {status}): {message}")]
    Aggregator {
        /// HTTP status code
        status: u16,
        /// Error body or message
        message: String,
    },

    /// JSON-RPC node returned an error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the node
        message: String,
    },

    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The user declined a wallet prompt
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    /// Wallet failed for a reason other than a user rejection
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Transaction could not be broadcast, no hash exists
    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    /// Transaction was mined but reverted
    #[error("Transaction {hash} reverted")]
    Reverted {
        /// Hash of the reverted transaction
        hash: TxHash,
    },

    /// Receipt did not show up in time
    #[error("Transaction {hash} not confirmed after {secs} seconds")]
    ConfirmationTimeout {
        /// Hash being awaited
        hash: TxHash,
        /// Seconds waited
        secs: u64,
    },

    /// A held permit signature expired before use
    #[error("Permit signature expired at {deadline}")]
    PermitExpired {
        /// Unix deadline of the signature
        deadline: u64,
    },

    /// The token stopped answering the EIP-2612 reads a permit plan relied on
    #[error("Token {token} does not support EIP-2612 permits")]
    PermitUnsupported {
        /// Token contract
        token: Address,
    },

    /// Operation was cancelled through its token
    #[error("Operation cancelled")]
    Cancelled,

    /// No RPC endpoint configured for the chain
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    /// A required input is missing
    #[error("Missing input: {0}")]
    MissingInput(&'static str),

    /// No route is available for submission
    #[error("No route selected")]
    NoRouteSelected,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// ABI decoding error
    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl SwapError {
    /// Whether the error is a user declining a wallet prompt
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, SwapError::UserRejected(_))
    }

    /// Hash of the transaction the error refers to, if one was broadcast
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            SwapError::Reverted { hash } | SwapError::ConfirmationTimeout { hash, .. } => {
                Some(*hash)
            }
            _ => None,
        }
    }
}

/// Result type alias for swap operations
pub type Result<T> = std::result::Result<T, SwapError>;

/// How loudly an error should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory, the flow can continue
    Warning,
    /// The last action failed
    Error,
}

/// Which part of the flow produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowErrorKind {
    /// Aggregator unreachable or rejected the quote request
    Quote,
    /// Signature rejected, or approval transaction failed
    Approval,
    /// Swap/bridge transaction failed to submit
    Submission,
    /// Swap/bridge transaction mined and reverted
    Reverted,
    /// A bridge leg failed or is still pending
    BridgeStall,
    /// Advisory about the current input
    Input,
}

/// Error parked in the orchestrator's error slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowError {
    /// Origin of the error
    pub kind: FlowErrorKind,
    /// Human readable message
    pub message: String,
    /// Display severity
    pub severity: Severity,
    /// Hash of a broadcast transaction, kept for tracking
    pub hash: Option<TxHash>,
    /// Whether the view should offer a retry
    pub retryable: bool,
}

impl FlowError {
    /// Fold a component error into a flow error of the given kind
    pub fn from_error(kind: FlowErrorKind, error: &SwapError) -> Self {
        let rejected = error.is_user_rejection();
        let message = if rejected {
            match kind {
                FlowErrorKind::Approval => "Approval request was rejected in the wallet".to_string(),
                _ => "Transaction was rejected in the wallet".to_string(),
            }
        } else {
            error.to_string()
        };

        Self {
            kind,
            message,
            severity: match error {
                SwapError::ConfirmationTimeout { .. } => Severity::Warning,
                _ => Severity::Error,
            },
            hash: error.tx_hash(),
            retryable: !rejected,
        }
    }

    /// Advisory warning that does not block the flow
    pub fn warning(kind: FlowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: Severity::Warning,
            hash: None,
            retryable: false,
        }
    }

    /// Attach the hash of a broadcast transaction
    pub fn with_hash(mut self, hash: TxHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// Error context for retryable operations
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Number of attempts made
    pub attempts: usize,
    /// Last error encountered
    pub last_error: String,
    /// Total time spent retrying (in milliseconds)
    pub total_time_ms: u64,
}

impl RetryContext {
    /// Create a new retry context
    pub fn new() -> Self {
        Self {
            attempts: 0,
            last_error: String::new(),
            total_time_ms: 0,
        }
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: &str, duration_ms: u64) {
        self.attempts += 1;
        self.last_error = error.to_string();
        self.total_time_ms += duration_ms;
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}
