//! Off-chain approval signatures.
//!
//! The resolved [`ApprovalPlan`] decides the mechanism: a plain EIP-2612
//! `permit` or a Permit2 `PermitTransferFrom`. The signing prompt is a single
//! user action and is never retried here.

use crate::abi::{Permit, PermitTransferFrom, TokenPermissions};
use crate::allowance::ApprovalPlan;
use crate::config::SwapConfig;
use crate::error::{Result, SwapError};
use crate::evm_rpc::ChainRpc;
use crate::types::PermitSignature;
use crate::wallet::{TypedDataDomain, TypedDataRequest, Wallet};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolStruct, SolValue};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the token exposes for EIP-2612
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitSupport {
    /// `name()`, used as the domain name
    pub name: String,
    /// `version()`, used as the domain version; `None` when the token has no getter
    pub version: Option<String>,
    /// `nonces(owner)`
    pub nonce: U256,
}

/// Produces [`PermitSignature`]s through the connected wallet
#[derive(Clone)]
pub struct SignatureProvider {
    rpc: Arc<dyn ChainRpc>,
    wallet: Arc<dyn Wallet>,
    permit2: Address,
    domain_version: String,
    deadline_secs: u64,
}

impl SignatureProvider {
    /// Create a new provider
    pub fn new(config: &SwapConfig, rpc: Arc<dyn ChainRpc>, wallet: Arc<dyn Wallet>) -> Self {
        Self {
            rpc,
            wallet,
            permit2: config.permit2_address,
            domain_version: config.permit_domain_version.clone(),
            deadline_secs: config.permit_deadline_secs,
        }
    }

    /// See [`permit_support`]
    pub async fn permit_support(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
    ) -> Result<Option<PermitSupport>> {
        permit_support(self.rpc.as_ref(), chain_id, token, owner).await
    }

    /// Sign the approval `plan` calls for, valid for the configured lifetime.
    /// `None` for plans that do not end in a signature.
    pub async fn sign(
        &self,
        chain_id: u64,
        owner: Address,
        plan: &ApprovalPlan,
    ) -> Result<Option<PermitSignature>> {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.sign_at(chain_id, owner, plan, now).await
    }

    /// [`sign`](Self::sign) with an explicit signing time (unix seconds)
    pub async fn sign_at(
        &self,
        chain_id: u64,
        owner: Address,
        plan: &ApprovalPlan,
        now: u64,
    ) -> Result<Option<PermitSignature>> {
        let deadline = now.saturating_add(self.deadline_secs);

        let signature = match *plan {
            ApprovalPlan::Permit {
                token,
                spender,
                amount,
            } => {
                let support = self
                    .permit_support(chain_id, token, owner)
                    .await?
                    .ok_or(SwapError::PermitUnsupported { token })?;
                self.sign_plain_permit(chain_id, token, owner, spender, amount, deadline, support)
                    .await?
            }
            ApprovalPlan::Permit2 {
                token,
                spender,
                amount,
                ..
            } => {
                self.sign_permit2(chain_id, token, owner, spender, amount, deadline)
                    .await?
            }
            ApprovalPlan::NotRequired | ApprovalPlan::Approve { .. } => return Ok(None),
        };
        Ok(Some(signature))
    }

    #[allow(clippy::too_many_arguments)]
    async fn sign_plain_permit(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        support: PermitSupport,
    ) -> Result<PermitSignature> {
        let domain = TypedDataDomain {
            name: support.name,
            version: Some(support.version.unwrap_or_else(|| self.domain_version.clone())),
            chain_id,
            verifying_contract: token,
        };
        let permit = Permit {
            owner,
            spender,
            value,
            nonce: support.nonce,
            deadline: U256::from(deadline),
        };

        let request = TypedDataRequest {
            digest: permit.eip712_signing_hash(&domain.to_eip712()),
            types: json!({
                "EIP712Domain": domain.type_fields(),
                "Permit": [
                    { "name": "owner", "type": "address" },
                    { "name": "spender", "type": "address" },
                    { "name": "value", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" },
                    { "name": "deadline", "type": "uint256" }
                ]
            }),
            domain,
            primary_type: "Permit".to_string(),
            message: json!({
                "owner": owner,
                "spender": spender,
                "value": value.to_string(),
                "nonce": support.nonce.to_string(),
                "deadline": deadline.to_string(),
            }),
        };

        info!("Requesting permit signature for {} on chain {}", token, chain_id);
        let signature = self.prompt(&request).await?;
        let (r, s, v) = split_signature(&signature)?;

        Ok(PermitSignature::PlainPermit {
            value,
            deadline,
            v,
            r,
            s,
        })
    }

    async fn sign_permit2(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
        deadline: u64,
    ) -> Result<PermitSignature> {
        let nonce = permit2_nonce(owner, token, amount, deadline);
        let domain = TypedDataDomain {
            name: "Permit2".to_string(),
            version: None,
            chain_id,
            verifying_contract: self.permit2,
        };
        let transfer = PermitTransferFrom {
            permitted: TokenPermissions { token, amount },
            spender,
            nonce,
            deadline: U256::from(deadline),
        };

        let request = TypedDataRequest {
            digest: transfer.eip712_signing_hash(&domain.to_eip712()),
            types: json!({
                "EIP712Domain": domain.type_fields(),
                "PermitTransferFrom": [
                    { "name": "permitted", "type": "TokenPermissions" },
                    { "name": "spender", "type": "address" },
                    { "name": "nonce", "type": "uint256" },
                    { "name": "deadline", "type": "uint256" }
                ],
                "TokenPermissions": [
                    { "name": "token", "type": "address" },
                    { "name": "amount", "type": "uint256" }
                ]
            }),
            domain,
            primary_type: "PermitTransferFrom".to_string(),
            message: json!({
                "permitted": { "token": token, "amount": amount.to_string() },
                "spender": spender,
                "nonce": nonce.to_string(),
                "deadline": deadline.to_string(),
            }),
        };

        info!("Requesting Permit2 signature for {} on chain {}", token, chain_id);
        let signature = self.prompt(&request).await?;
        split_signature(&signature)?;

        Ok(PermitSignature::Permit2 {
            amount,
            deadline,
            nonce,
            signature,
        })
    }

    async fn prompt(&self, request: &TypedDataRequest) -> Result<Bytes> {
        self.wallet.sign_typed_data(request).await.map_err(|e| {
            if e.is_user_rejection() {
                info!("Signature request rejected by user");
            } else {
                warn!("Signature request failed: {}", e);
            }
            e
        })
    }
}

/// Read `nonces(owner)`, `name()` and `version()`. A token that reverts on
/// `nonces` or `name` does not support EIP-2612; one that only lacks `version`
/// signs under the configured domain version. Transport failures are returned
/// as errors.
pub async fn permit_support(
    rpc: &dyn ChainRpc,
    chain_id: u64,
    token: Address,
    owner: Address,
) -> Result<Option<PermitSupport>> {
    let (nonce, name, version) = futures::join!(
        rpc.nonces(chain_id, token, owner),
        rpc.name(chain_id, token),
        rpc.version(chain_id, token)
    );

    let (nonce, name) = match (nonce, name) {
        (Ok(nonce), Ok(name)) => (nonce, name),
        (Err(e), _) if !is_missing_function(&e) => return Err(e),
        (_, Err(e)) if !is_missing_function(&e) => return Err(e),
        _ => {
            debug!("Token {} on chain {} has no EIP-2612 permit", token, chain_id);
            return Ok(None);
        }
    };
    let version = match version {
        Ok(version) => Some(version),
        Err(e) if is_missing_function(&e) => None,
        Err(e) => return Err(e),
    };

    Ok(Some(PermitSupport {
        name,
        version,
        nonce,
    }))
}

/// Permit2 unordered nonce: `keccak256(abi.encode(owner, token, amount, deadline))`
pub fn permit2_nonce(owner: Address, token: Address, amount: U256, deadline: u64) -> U256 {
    let encoded = (owner, token, amount, U256::from(deadline)).abi_encode();
    U256::from_be_bytes(keccak256(encoded).0)
}

fn is_missing_function(error: &SwapError) -> bool {
    matches!(error, SwapError::Rpc { .. } | SwapError::AbiDecode(_))
}

/// Split a 65-byte `r || s || v` signature, normalizing `v` to 27/28
fn split_signature(signature: &[u8]) -> Result<(B256, B256, u8)> {
    if signature.len() != 65 {
        return Err(SwapError::Wallet(format!(
            "Expected a 65-byte signature, got {} bytes",
            signature.len()
        )));
    }

    let r = B256::from_slice(&signature[..32]);
    let s = B256::from_slice(&signature[32..64]);
    let v = match signature[64] {
        v @ (0 | 1) => v + 27,
        v => v,
    };
    Ok((r, s, v))
}
