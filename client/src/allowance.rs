//! Approval requirement and mechanism resolution.
//!
//! Every function here only reads chain state, so resolving twice against
//! unchanged state gives the same plan.

use crate::config::SwapConfig;
use crate::error::Result;
use crate::evm_rpc::ChainRpc;
use crate::signature::permit_support;
use crate::types::{AccountKind, Route, NATIVE_ASSET_ADDRESS};
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

/// How the route's token pull gets authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPlan {
    /// Native asset, or the allowance already covers the amount
    NotRequired,
    /// On-chain `approve(spender, amount)`; contract and multisig wallets
    Approve {
        /// Token to approve
        token: Address,
        /// Contract pulling the tokens
        spender: Address,
        /// Allowance to grant
        amount: U256,
    },
    /// EIP-2612 permit signature
    Permit {
        /// Token to permit
        token: Address,
        /// Contract pulling the tokens
        spender: Address,
        /// Amount to permit
        amount: U256,
    },
    /// Permit2 transfer signature
    Permit2 {
        /// Token to transfer
        token: Address,
        /// Contract pulling the tokens through Permit2
        spender: Address,
        /// Amount to authorize
        amount: U256,
        /// The owner must first `approve(PERMIT2, MAX)`
        relay_approval: bool,
    },
}

impl ApprovalPlan {
    /// Whether the user has anything to approve
    pub fn is_required(&self) -> bool {
        !matches!(self, ApprovalPlan::NotRequired)
    }

    /// Whether the plan ends in a typed-data signature
    pub fn is_signature(&self) -> bool {
        matches!(self, ApprovalPlan::Permit { .. } | ApprovalPlan::Permit2 { .. })
    }
}

/// Decides whether and how a route's token pull must be approved
#[derive(Clone)]
pub struct AllowanceResolver {
    rpc: Arc<dyn ChainRpc>,
    permit2: Address,
    swap_contract: Option<Address>,
}

impl AllowanceResolver {
    /// Create a new resolver
    pub fn new(config: &SwapConfig, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            rpc,
            permit2: config.permit2_address,
            swap_contract: config.swap_contract,
        }
    }

    /// Permit2 contract used as the relay spender
    pub fn permit2(&self) -> Address {
        self.permit2
    }

    /// Whether `owner`'s allowance to `spender` is below `amount`. Always
    /// `false` for the native asset.
    pub async fn needs_approval(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<bool> {
        if token == NATIVE_ASSET_ADDRESS {
            return Ok(false);
        }

        let allowance = self.rpc.allowance(chain_id, token, owner, spender).await?;
        debug!(
            "Allowance of {} to {} on chain {}: {} (need {})",
            owner, spender, chain_id, allowance, amount
        );
        Ok(allowance < amount)
    }

    /// EOA or contract wallet, from the code deployed at `owner`
    pub async fn account_kind(&self, chain_id: u64, owner: Address) -> Result<AccountKind> {
        let code = self.rpc.code(chain_id, owner).await?;
        Ok(if code.is_empty() {
            AccountKind::Eoa
        } else {
            AccountKind::Contract
        })
    }

    /// Spender, token and required amount for a route, `None` when nothing pulls ERC-20 tokens
    fn target(&self, route: &Route) -> Option<(Address, Address, U256)> {
        if route.from_asset.is_native() {
            return None;
        }

        match &route.approval {
            Some(descriptor) => {
                let amount = if route.is_cross_chain() {
                    descriptor.required_amount
                } else {
                    route.from_amount
                };
                Some((descriptor.spender, descriptor.token, amount))
            }
            None => self
                .swap_contract
                .filter(|_| !route.is_cross_chain())
                .map(|spender| (spender, route.from_asset.address, route.from_amount)),
        }
    }

    /// Full approval plan for `owner` executing `route`
    pub async fn resolve(&self, route: &Route, owner: Address) -> Result<ApprovalPlan> {
        let Some((spender, token, amount)) = self.target(route) else {
            debug!("Route {} needs no approval", route.route_id);
            return Ok(ApprovalPlan::NotRequired);
        };
        let chain_id = route.from_chain_id;

        let (needed, kind) = futures::try_join!(
            self.needs_approval(chain_id, token, owner, spender, amount),
            self.account_kind(chain_id, owner)
        )?;
        if !needed {
            return Ok(ApprovalPlan::NotRequired);
        }

        let plan = match kind {
            AccountKind::Contract => ApprovalPlan::Approve {
                token,
                spender,
                amount,
            },
            AccountKind::Eoa => match permit_support(self.rpc.as_ref(), chain_id, token, owner).await? {
                Some(_) => ApprovalPlan::Permit {
                    token,
                    spender,
                    amount,
                },
                None => ApprovalPlan::Permit2 {
                    token,
                    spender,
                    amount,
                    relay_approval: self
                        .needs_approval(chain_id, token, owner, self.permit2, amount)
                        .await?,
                },
            },
        };

        info!("Route {} approval plan: {:?}", route.route_id, plan);
        Ok(plan)
    }
}
