//! Test doubles shared by the unit tests.

use crate::aggregator::Aggregator;
use crate::error::{Result, SwapError};
use crate::types::{
    ActiveRoute, ApprovalDescriptor, Asset, BridgeStatus, BridgeStatusQuery, BuildTxRequest,
    BuildTxResponse, Chain, QuoteRequest, QuoteResponse, Route, TokenBalance,
};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const USDC: Address = Address::repeat_byte(0xcc);
pub(crate) const EXA: Address = Address::repeat_byte(0xea);
pub(crate) const BRIDGE: Address = Address::repeat_byte(0xbb);

pub(crate) fn asset(chain_id: u64, address: Address, symbol: &str, decimals: u8) -> Asset {
    Asset {
        chain_id,
        address,
        symbol: symbol.to_string(),
        decimals,
        name: None,
        logo_uri: None,
    }
}

/// USDC -> EXA route needing a 50 USDC allowance to [`BRIDGE`]
pub(crate) fn route(from_chain_id: u64, to_chain_id: u64) -> Route {
    Route {
        route_id: format!("route-{}-{}", from_chain_id, to_chain_id),
        from_chain_id,
        to_chain_id,
        from_asset: asset(from_chain_id, USDC, "USDC", 6),
        to_asset: asset(to_chain_id, EXA, "EXA", 18),
        from_amount: U256::from(50_000_000u64),
        to_amount: U256::from(12_000_000_000_000_000_000u128),
        total_fees_usd: 1.0,
        output_value_usd: Some(48.0),
        service_time_secs: 120,
        steps: Vec::new(),
        approval: Some(ApprovalDescriptor {
            spender: BRIDGE,
            token: USDC,
            required_amount: U256::from(50_000_000u64),
        }),
    }
}

#[derive(Default)]
struct StubState {
    quotes: HashMap<U256, (Duration, std::result::Result<QuoteResponse, u16>)>,
    quote_calls: usize,
    build: Option<BuildTxResponse>,
    build_calls: usize,
    statuses: VecDeque<Option<BridgeStatus>>,
    status_calls: usize,
}

/// Scripted aggregator. Quotes are keyed by `fromAmount`; bridge statuses are
/// served in order, repeating the last one, `None` entries fail with a 503.
#[derive(Clone, Default)]
pub(crate) struct StubAggregator {
    state: Arc<Mutex<StubState>>,
}

impl StubAggregator {
    pub(crate) fn with_quote(self, amount: U256, delay: Duration, response: QuoteResponse) -> Self {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(amount, (delay, Ok(response)));
        self
    }

    pub(crate) fn with_quote_failure(self, amount: U256, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(amount, (Duration::ZERO, Err(status)));
        self
    }

    pub(crate) fn with_build(self, response: BuildTxResponse) -> Self {
        self.state.lock().unwrap().build = Some(response);
        self
    }

    pub(crate) fn with_statuses(self, statuses: Vec<Option<BridgeStatus>>) -> Self {
        self.state.lock().unwrap().statuses = statuses.into();
        self
    }

    pub(crate) fn quote_calls(&self) -> usize {
        self.state.lock().unwrap().quote_calls
    }

    pub(crate) fn build_calls(&self) -> usize {
        self.state.lock().unwrap().build_calls
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }
}

#[async_trait]
impl Aggregator for StubAggregator {
    async fn chains(&self) -> Result<Vec<Chain>> {
        Ok(Vec::new())
    }

    async fn balances(&self, _user: Address) -> Result<Vec<TokenBalance>> {
        Ok(Vec::new())
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.quote_calls += 1;
            state.quotes.get(&request.from_amount).cloned()
        };

        let (delay, response) = scripted.ok_or_else(|| SwapError::Aggregator {
            status: 404,
            message: "no quote scripted".to_string(),
        })?;
        tokio::time::sleep(delay).await;
        response.map_err(|status| SwapError::Aggregator {
            status,
            message: "scripted failure".to_string(),
        })
    }

    async fn build_tx(&self, _request: &BuildTxRequest<'_>) -> Result<BuildTxResponse> {
        let mut state = self.state.lock().unwrap();
        state.build_calls += 1;
        state.build.clone().ok_or_else(|| SwapError::Aggregator {
            status: 500,
            message: "no build scripted".to_string(),
        })
    }

    async fn active_routes(&self, _user: Address) -> Result<Vec<ActiveRoute>> {
        Ok(Vec::new())
    }

    async fn bridge_status(&self, _query: &BridgeStatusQuery) -> Result<BridgeStatus> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let next = if state.statuses.len() > 1 {
            state.statuses.pop_front().flatten()
        } else {
            state.statuses.front().cloned().flatten()
        };
        next.ok_or_else(|| SwapError::Aggregator {
            status: 503,
            message: "bridge status unavailable".to_string(),
        })
    }
}
