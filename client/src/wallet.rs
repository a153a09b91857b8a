//! Connected wallet interface.
//!
//! The wallet extension itself is out of scope; the orchestrator only needs an
//! account, a typed-data signer and a transaction sender. Implementations must
//! map a user declining a prompt to [`SwapError::UserRejected`](crate::SwapError::UserRejected).

use crate::error::Result;
use crate::types::{TransactionRequest, TxHash};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::borrow::Cow;

/// EIP-712 domain in the shape wallets expect for `eth_signTypedData_v4`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    /// Domain name
    pub name: String,
    /// Domain version, absent for Permit2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Contract verifying the signature
    pub verifying_contract: Address,
}

impl TypedDataDomain {
    /// Convert into the hashing domain
    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.name.clone())),
            self.version.clone().map(Cow::Owned),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }

    /// `EIP712Domain` type fields for the fields this domain carries
    pub fn type_fields(&self) -> Value {
        let mut fields = vec![json!({ "name": "name", "type": "string" })];
        if self.version.is_some() {
            fields.push(json!({ "name": "version", "type": "string" }));
        }
        fields.push(json!({ "name": "chainId", "type": "uint256" }));
        fields.push(json!({ "name": "verifyingContract", "type": "address" }));
        Value::Array(fields)
    }
}

/// A typed-data signing prompt. Serializes to the `eth_signTypedData_v4`
/// payload; wallets that hash locally can sign `digest` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataRequest {
    /// Type definitions, `EIP712Domain` included
    pub types: Value,
    /// Signing domain
    pub domain: TypedDataDomain,
    /// Primary struct name
    pub primary_type: String,
    /// Struct values as JSON
    pub message: Value,
    /// EIP-712 digest the signature must commit to
    #[serde(skip)]
    pub digest: B256,
}

/// Wallet connected to the flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Connected account
    fn account(&self) -> Address;

    /// Prompt the user to sign typed data; returns the 65-byte `r || s || v` signature
    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Bytes>;

    /// Prompt the user to send a transaction; returns its hash once broadcast
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash>;
}
