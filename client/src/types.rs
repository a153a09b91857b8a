//! Common types used across the swap and bridge layer.
//!
//! Wire types mirror the aggregator's camelCase JSON. Token amounts travel as
//! decimal strings and are held as [`U256`] in memory.

use alloy_primitives::{address, Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction hash type
pub type TxHash = B256;

/// Sentinel address the aggregator uses for a chain's native coin
pub const NATIVE_ASSET_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// (De)serialize a [`U256`] as a base-10 string
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal string
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        U256::from_str_radix(raw.trim(), 10).map_err(D::Error::custom)
    }
}

/// A token on a specific chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Token contract, or [`NATIVE_ASSET_ADDRESS`]
    pub address: Address,
    /// Ticker symbol
    pub symbol: String,
    /// Token decimals
    pub decimals: u8,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Logo URL
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl Asset {
    /// Whether this is the chain's native coin
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ASSET_ADDRESS
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.chain_id)
    }
}

/// Chain supported by the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Display name
    pub name: String,
    /// Whether funds can leave this chain
    #[serde(default)]
    pub sending_enabled: bool,
    /// Whether funds can arrive on this chain
    #[serde(default)]
    pub receiving_enabled: bool,
}

/// Wallet balance of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Token contract, or [`NATIVE_ASSET_ADDRESS`]
    pub token_address: Address,
    /// Ticker symbol
    pub symbol: String,
    /// Token decimals
    pub decimals: u8,
    /// Balance in base units
    #[serde(with = "decimal_u256")]
    pub amount: U256,
}

/// One hop of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    /// Bridge or DEX executing the hop
    pub protocol: String,
    /// Asset held after the hop
    pub asset: Asset,
}

/// Allowance the route needs before it can move the user's tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDescriptor {
    /// Contract that will pull the tokens
    #[serde(rename = "allowanceTarget")]
    pub spender: Address,
    /// Token to approve
    #[serde(rename = "approvalTokenAddress")]
    pub token: Address,
    /// Minimum allowance required
    #[serde(rename = "minimumApprovalAmount", with = "decimal_u256")]
    pub required_amount: U256,
}

/// Priced execution plan returned by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Aggregator route identifier
    pub route_id: String,
    /// Source chain
    pub from_chain_id: u64,
    /// Destination chain
    pub to_chain_id: u64,
    /// Asset spent
    pub from_asset: Asset,
    /// Asset received
    pub to_asset: Asset,
    /// Input amount in base units
    #[serde(with = "decimal_u256")]
    pub from_amount: U256,
    /// Expected output in base units
    #[serde(with = "decimal_u256")]
    pub to_amount: U256,
    /// Estimated fees in USD
    #[serde(default)]
    pub total_fees_usd: f64,
    /// Output value in USD, when priced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_value_usd: Option<f64>,
    /// Estimated completion time
    #[serde(default)]
    pub service_time_secs: u64,
    /// Ordered hops
    #[serde(default)]
    pub steps: Vec<RouteStep>,
    /// Approval the route needs, if any
    #[serde(default, rename = "approvalData", skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalDescriptor>,
}

impl Route {
    /// Whether the route crosses chains
    pub fn is_cross_chain(&self) -> bool {
        self.from_chain_id != self.to_chain_id
    }

    /// Output value net of fees, used for "best return" tagging
    pub fn net_return_usd(&self) -> Option<f64> {
        self.output_value_usd.map(|value| value - self.total_fees_usd)
    }
}

/// Committed quote result, replaced wholesale on every fetch
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSet {
    /// Candidate routes in aggregator order
    pub routes: Vec<Route>,
    /// Call data the destination contract needs on arrival
    pub destination_call_data: Option<Bytes>,
    /// When the quote was fetched
    pub fetched_at: DateTime<Utc>,
}

impl RouteSet {
    /// Result used when no fetch was necessary
    pub fn empty() -> Self {
        Self {
            routes: Vec::new(),
            destination_call_data: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Body of `POST quote`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Source chain
    pub from_chain_id: u64,
    /// Destination chain
    pub to_chain_id: u64,
    /// Token spent
    pub from_token_address: Address,
    /// Token received
    pub to_token_address: Address,
    /// Amount in base units
    #[serde(with = "decimal_u256")]
    pub from_amount: U256,
    /// Wallet paying
    pub user_address: Address,
    /// Wallet receiving
    pub recipient: Address,
    /// Contract call to run on arrival
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_payload: Option<Bytes>,
    /// Gas for the arrival call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_gas_limit: Option<u64>,
}

/// Result of `POST quote`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// Candidate routes
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Call data for the destination contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_call_data: Option<Bytes>,
}

/// Body of `POST build-tx`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxRequest<'a> {
    /// Route chosen by the user
    pub route: &'a Route,
    /// Call data for the destination contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_call_data: Option<&'a Bytes>,
    /// Signature authorizing the token pull
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit: Option<&'a PermitSignature>,
}

/// Result of `POST build-tx`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTxResponse {
    /// Contract to call
    pub tx_target: Address,
    /// Call data
    pub tx_data: Bytes,
    /// Native value to attach
    #[serde(with = "decimal_u256")]
    pub value: U256,
    /// Chain the transaction belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// Status of one bridge leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegStatus {
    /// Not final yet
    Pending,
    /// Finalized
    Completed,
    /// Failed
    Failed,
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegStatus::Pending => write!(f, "PENDING"),
            LegStatus::Completed => write!(f, "COMPLETED"),
            LegStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Snapshot of both legs of a bridge transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    /// Source chain leg
    pub source_tx_status: LegStatus,
    /// Destination chain leg
    pub destination_tx_status: LegStatus,
    /// Hash on the source chain
    pub source_transaction_hash: TxHash,
    /// Hash on the destination chain, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_transaction_hash: Option<TxHash>,
}

impl BridgeStatus {
    /// Both legs left `PENDING`
    pub fn is_settled(&self) -> bool {
        self.source_tx_status != LegStatus::Pending
            && self.destination_tx_status != LegStatus::Pending
    }

    /// Either leg failed
    pub fn has_failure(&self) -> bool {
        self.source_tx_status == LegStatus::Failed
            || self.destination_tx_status == LegStatus::Failed
    }

    /// Both legs completed
    pub fn is_complete(&self) -> bool {
        self.source_tx_status == LegStatus::Completed
            && self.destination_tx_status == LegStatus::Completed
    }
}

/// Query of `GET bridge-status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStatusQuery {
    /// Source transaction hash
    pub transaction_hash: TxHash,
    /// Source chain
    pub from_chain_id: u64,
    /// Destination chain
    pub to_chain_id: u64,
}

/// In-flight bridge route reported by `GET active-routes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoute {
    /// Aggregator route identifier
    pub route_id: String,
    /// Source chain
    pub from_chain_id: u64,
    /// Destination chain
    pub to_chain_id: u64,
    /// Asset spent
    pub from_asset: Asset,
    /// Asset received
    pub to_asset: Asset,
    /// Source transaction, once broadcast
    #[serde(default)]
    pub source_transaction_hash: Option<TxHash>,
}

/// Off-chain approval produced by the signature provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PermitSignature {
    /// EIP-2612 `permit` on the token itself
    PlainPermit {
        /// Allowance granted
        #[serde(with = "decimal_u256")]
        value: U256,
        /// Unix deadline
        deadline: u64,
        /// Recovery id
        v: u8,
        /// Signature r
        r: B256,
        /// Signature s
        s: B256,
    },
    /// Permit2 `PermitTransferFrom`
    Permit2 {
        /// Amount authorized
        #[serde(with = "decimal_u256")]
        amount: U256,
        /// Unix deadline
        deadline: u64,
        /// Unordered nonce
        #[serde(with = "decimal_u256")]
        nonce: U256,
        /// 65-byte signature
        signature: Bytes,
    },
}

impl PermitSignature {
    /// Unix deadline of the signature
    pub fn deadline(&self) -> u64 {
        match self {
            PermitSignature::PlainPermit { deadline, .. }
            | PermitSignature::Permit2 { deadline, .. } => *deadline,
        }
    }

    /// Amount the signature authorizes
    pub fn amount(&self) -> U256 {
        match self {
            PermitSignature::PlainPermit { value, .. } => *value,
            PermitSignature::Permit2 { amount, .. } => *amount,
        }
    }

    /// Whether the deadline has passed at `now` (unix seconds)
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.deadline()
    }
}

/// Fine-grained status of a broadcast transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Signed, hash known, not yet seen by the node
    Pending,
    /// Waiting for inclusion or for the bridge
    Processing,
    /// Mined successfully
    Success,
    /// Reverted
    Error,
}

impl TxStatus {
    fn rank(self) -> u8 {
        match self {
            TxStatus::Pending => 0,
            TxStatus::Processing => 1,
            TxStatus::Success | TxStatus::Error => 2,
        }
    }

    /// Whether the status is final
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Error)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Pending => write!(f, "pending"),
            TxStatus::Processing => write!(f, "processing"),
            TxStatus::Success => write!(f, "success"),
            TxStatus::Error => write!(f, "error"),
        }
    }
}

/// Broadcast transaction tracked by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Current status
    pub status: TxStatus,
    /// Transaction hash
    pub hash: TxHash,
}

impl Transaction {
    /// New transaction in `pending`
    pub fn pending(hash: TxHash) -> Self {
        Self {
            status: TxStatus::Pending,
            hash,
        }
    }

    /// Move forward to `next`. Regressions and changes out of a terminal
    /// status are refused and return `false`.
    pub fn advance(&mut self, next: TxStatus) -> bool {
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            return false;
        }
        self.status = next;
        true
    }
}

/// Coarse progress of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxStep {
    /// Approval not yet granted
    AwaitingApproval,
    /// Approval signature or transaction in flight
    ApprovalPending,
    /// Ready to submit the swap/bridge
    AwaitingConfirmation,
    /// Swap/bridge submission in flight
    ConfirmationPending,
}

/// Who controls the owner account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Externally owned account, can sign typed data
    Eoa,
    /// Contract or multisig wallet, approvals must be on-chain
    Contract,
}

/// Transaction to estimate or send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Chain to send on
    pub chain_id: u64,
    /// Sender
    pub from: Address,
    /// Target contract
    pub to: Address,
    /// Call data
    pub data: Bytes,
    /// Native value
    pub value: U256,
    /// Gas limit, set after estimation
    pub gas: Option<u64>,
}

/// Mined transaction receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: TxHash,
    /// `true` when execution succeeded
    pub success: bool,
    /// Block the transaction landed in
    pub block_number: u64,
    /// Gas consumed
    pub gas_used: u64,
}
