//! Debounced route quoting.
//!
//! [`QuoteFetcher::schedule`] is the only writer of the quote state. Each call
//! takes a fresh [`Ticket`]; a task whose ticket is no longer current after any
//! await drops its result, so only the latest request is ever observed.

use crate::aggregator::Aggregator;
use crate::cancel::{Epoch, Ticket};
use crate::error::SwapError;
use crate::types::{Asset, QuoteRequest, Route, RouteSet};
use alloy_primitives::{Address, Bytes, U256};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything a quote request depends on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteInput {
    /// Asset the user pays with
    pub source_asset: Option<Asset>,
    /// Chain to end up on
    pub destination_chain_id: Option<u64>,
    /// Asset to end up with
    pub destination_asset: Option<Asset>,
    /// Amount of the source asset, in base units
    pub amount: U256,
    /// Paying wallet
    pub user: Option<Address>,
    /// Receiving wallet
    pub recipient: Option<Address>,
    /// Contract call to run on arrival
    pub destination_payload: Option<Bytes>,
    /// Gas for the arrival call
    pub destination_gas_limit: Option<u64>,
}

impl QuoteInput {
    /// Request body, `None` when the amount is zero or a required field is absent
    pub fn to_request(&self) -> Option<QuoteRequest> {
        if self.amount.is_zero() {
            return None;
        }
        let source = self.source_asset.as_ref()?;
        let destination = self.destination_asset.as_ref()?;
        let to_chain_id = self.destination_chain_id?;
        let recipient = self.recipient?;

        Some(QuoteRequest {
            from_chain_id: source.chain_id,
            to_chain_id,
            from_token_address: source.address,
            to_token_address: destination.address,
            from_amount: self.amount,
            user_address: self.user.unwrap_or(recipient),
            recipient,
            destination_payload: self.destination_payload.clone(),
            destination_gas_limit: self.destination_gas_limit,
        })
    }
}

/// Aggregator failure while quoting; distinct from an empty route list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to fetch routes: {message}")]
pub struct RoutesError {
    /// What went wrong
    pub message: String,
    /// Whether asking again may help
    pub retryable: bool,
}

impl From<SwapError> for RoutesError {
    fn from(error: SwapError) -> Self {
        Self {
            message: error.to_string(),
            retryable: crate::retry::RetryStrategy::is_retryable(&error)
                || matches!(error, SwapError::MaxRetriesExceeded(_)),
        }
    }
}

/// Observable quote state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QuoteState {
    /// Nothing requested, or the input is incomplete
    #[default]
    Idle,
    /// A request is debouncing or in flight
    Loading,
    /// Committed routes and the selected candidate; zero routes means no liquidity
    Ready {
        /// Committed result
        routes: RouteSet,
        /// Index into `routes.routes`
        selected: usize,
    },
    /// The aggregator call failed, routes are unavailable
    Failed(RoutesError),
}

impl QuoteState {
    /// Whether a request is pending
    pub fn is_loading(&self) -> bool {
        matches!(self, QuoteState::Loading)
    }

    /// Committed routes, `None` unless ready
    pub fn routes(&self) -> Option<&RouteSet> {
        match self {
            QuoteState::Ready { routes, .. } => Some(routes),
            _ => None,
        }
    }

    /// Currently selected route
    pub fn selected_route(&self) -> Option<&Route> {
        match self {
            QuoteState::Ready { routes, selected } => routes.routes.get(*selected),
            _ => None,
        }
    }

    /// Quote error, if the last request failed
    pub fn error(&self) -> Option<&RoutesError> {
        match self {
            QuoteState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl RouteSet {
    /// Index of the route with the shortest estimated service time
    pub fn fastest(&self) -> Option<usize> {
        self.routes
            .iter()
            .enumerate()
            .min_by_key(|(_, route)| route.service_time_secs)
            .map(|(index, _)| index)
    }

    /// Index of the route with the highest output value net of fees
    pub fn best_return(&self) -> Option<usize> {
        self.routes
            .iter()
            .enumerate()
            .filter_map(|(index, route)| route.net_return_usd().map(|value| (index, value)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }
}

struct Shared {
    aggregator: Arc<dyn Aggregator>,
    epoch: Epoch,
    state: watch::Sender<QuoteState>,
}

impl Shared {
    async fn fetch_routes(&self, input: &QuoteInput) -> Result<RouteSet, RoutesError> {
        let Some(request) = input.to_request() else {
            debug!("Quote input incomplete, skipping request");
            return Ok(RouteSet::empty());
        };

        let response = self.aggregator.quote(&request).await.map_err(|e| {
            warn!("Quote request failed: {}", e);
            RoutesError::from(e)
        })?;

        info!("Received {} routes", response.routes.len());
        Ok(RouteSet {
            routes: response.routes,
            destination_call_data: response.destination_call_data,
            fetched_at: Utc::now(),
        })
    }

    /// Write `state` if `ticket` is still current; the check runs under the
    /// channel's write lock
    fn commit(&self, ticket: Ticket, state: QuoteState) -> bool {
        let committed = self.state.send_if_modified(|current| {
            if !self.epoch.is_current(ticket) {
                return false;
            }
            *current = state;
            true
        });
        if !committed {
            debug!("Dropping stale quote result (ticket {})", ticket);
        }
        committed
    }
}

/// Debounced, stale-safe quote fetcher
pub struct QuoteFetcher {
    shared: Arc<Shared>,
    debounce: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl QuoteFetcher {
    /// Create a new fetcher
    pub fn new(aggregator: Arc<dyn Aggregator>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(QuoteState::Idle);
        Self {
            shared: Arc::new(Shared {
                aggregator,
                epoch: Epoch::new(),
                state,
            }),
            debounce,
            task: Mutex::new(None),
        }
    }

    /// One immediate fetch, bypassing debounce and state
    pub async fn fetch_routes(&self, input: &QuoteInput) -> Result<RouteSet, RoutesError> {
        self.shared.fetch_routes(input).await
    }

    /// Debounce then fetch for `input`, superseding every earlier request.
    /// Incomplete input resets the state to `Idle` without a network call.
    pub async fn schedule(&self, input: QuoteInput) -> Ticket {
        let ticket = self.shared.epoch.advance();

        if input.to_request().is_none() {
            self.shared.commit(ticket, QuoteState::Idle);
            return ticket;
        }

        self.shared.commit(ticket, QuoteState::Loading);

        let shared = self.shared.clone();
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !shared.epoch.is_current(ticket) {
                debug!("Quote request {} superseded during debounce", ticket);
                return;
            }

            let state = match shared.fetch_routes(&input).await {
                Ok(routes) => QuoteState::Ready { routes, selected: 0 },
                Err(error) => QuoteState::Failed(error),
            };
            shared.commit(ticket, state);
        });

        // superseded tasks finish on their own after their ticket check
        *self.task.lock().await = Some(handle);
        ticket
    }

    /// Invalidate pending requests and abort the latest task
    pub async fn cancel(&self) {
        let ticket = self.shared.epoch.advance();
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        let loading = self.shared.state.borrow().is_loading();
        if loading {
            self.shared.commit(ticket, QuoteState::Idle);
        }
    }

    /// Current state
    pub fn state(&self) -> QuoteState {
        self.shared.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<QuoteState> {
        self.shared.state.subscribe()
    }

    /// Wait until the state is no longer `Loading`
    pub async fn settled(&self) -> QuoteState {
        let mut receiver = self.subscribe();
        let settled = receiver
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_default()
    }

    /// Select another candidate without re-fetching; `false` if out of range
    pub fn select(&self, index: usize) -> bool {
        let mut in_range = false;
        self.shared.state.send_if_modified(|state| match state {
            QuoteState::Ready { routes, selected } if index < routes.routes.len() => {
                in_range = true;
                let changed = *selected != index;
                *selected = index;
                changed
            }
            _ => false,
        });
        in_range
    }

    /// Selected route, if any
    pub fn selected_route(&self) -> Option<Route> {
        self.shared.state.borrow().selected_route().cloned()
    }
}

impl Drop for QuoteFetcher {
    fn drop(&mut self) {
        self.shared.epoch.advance();
        if let Ok(mut task) = self.task.try_lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{asset, route, StubAggregator, EXA, USDC};
    use crate::types::QuoteResponse;
    use assert_matches::assert_matches;

    const USER: Address = Address::repeat_byte(0x01);

    fn input(amount: u64) -> QuoteInput {
        QuoteInput {
            source_asset: Some(asset(1, USDC, "USDC", 6)),
            destination_chain_id: Some(10),
            destination_asset: Some(asset(10, EXA, "EXA", 18)),
            amount: U256::from(amount),
            user: Some(USER),
            recipient: Some(USER),
            destination_payload: None,
            destination_gas_limit: None,
        }
    }

    fn response(routes: Vec<Route>) -> QuoteResponse {
        QuoteResponse {
            routes,
            destination_call_data: None,
        }
    }

    fn fetcher(aggregator: StubAggregator) -> QuoteFetcher {
        QuoteFetcher::new(Arc::new(aggregator), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_zero_amount_skips_network() {
        let aggregator = StubAggregator::default();
        let fetcher = fetcher(aggregator.clone());

        let routes = fetcher.fetch_routes(&input(0)).await.unwrap();
        assert!(routes.routes.is_empty());

        fetcher.schedule(input(0)).await;
        assert_eq!(fetcher.state(), QuoteState::Idle);
        assert_eq!(aggregator.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_field_skips_network() {
        let aggregator = StubAggregator::default();
        let fetcher = fetcher(aggregator.clone());

        let mut incomplete = input(5);
        incomplete.destination_asset = None;
        let routes = fetcher.fetch_routes(&incomplete).await.unwrap();
        assert!(routes.routes.is_empty());
        assert_eq!(aggregator.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_distinct_from_no_liquidity() {
        let aggregator = StubAggregator::default()
            .with_quote(U256::from(1u64), Duration::ZERO, response(Vec::new()))
            .with_quote_failure(U256::from(2u64), 502);
        let fetcher = fetcher(aggregator);

        fetcher.schedule(input(1)).await;
        let empty = fetcher.settled().await;
        assert_eq!(empty.routes().map(|r| r.routes.len()), Some(0));
        assert!(empty.error().is_none());

        fetcher.schedule(input(2)).await;
        let failed = fetcher.settled().await;
        assert!(failed.routes().is_none());
        assert_matches!(failed.error(), Some(RoutesError { retryable: true, .. }));
    }

    #[tokio::test]
    async fn test_only_latest_request_is_committed() {
        let slow = route(1, 10);
        let mut fast = route(1, 10);
        fast.route_id = "latest".to_string();

        let aggregator = StubAggregator::default()
            .with_quote(U256::from(1u64), Duration::from_millis(200), response(vec![slow]))
            .with_quote(U256::from(2u64), Duration::from_millis(5), response(vec![fast]));
        let fetcher = fetcher(aggregator.clone());

        fetcher.schedule(input(1)).await;
        // let the first request get past its debounce and into flight
        tokio::time::sleep(Duration::from_millis(50)).await;
        fetcher.schedule(input(2)).await;

        let state = fetcher.settled().await;
        assert_eq!(state.selected_route().unwrap().route_id, "latest");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fetcher.selected_route().unwrap().route_id, "latest");
        assert_eq!(aggregator.quote_calls(), 2);
    }

    #[tokio::test]
    async fn test_debounce_drops_superseded_request() {
        let aggregator = StubAggregator::default()
            .with_quote(U256::from(1u64), Duration::ZERO, response(vec![route(1, 10)]))
            .with_quote(U256::from(2u64), Duration::ZERO, response(vec![route(1, 10)]));
        let fetcher = QuoteFetcher::new(Arc::new(aggregator.clone()), Duration::from_millis(50));

        fetcher.schedule(input(1)).await;
        fetcher.schedule(input(2)).await;
        fetcher.settled().await;

        assert_eq!(aggregator.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_select_switches_without_refetch() {
        let mut second = route(1, 10);
        second.route_id = "second".to_string();
        let aggregator = StubAggregator::default().with_quote(
            U256::from(1u64),
            Duration::ZERO,
            response(vec![route(1, 10), second]),
        );
        let fetcher = fetcher(aggregator.clone());

        fetcher.schedule(input(1)).await;
        fetcher.settled().await;
        assert_eq!(fetcher.selected_route().unwrap().route_id, "route-1-10");

        assert!(fetcher.select(1));
        assert!(!fetcher.select(5));
        assert_eq!(fetcher.selected_route().unwrap().route_id, "second");
        assert_eq!(aggregator.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_resets_loading() {
        let aggregator = StubAggregator::default().with_quote(
            U256::from(1u64),
            Duration::from_millis(100),
            response(vec![route(1, 10)]),
        );
        let fetcher = fetcher(aggregator);

        fetcher.schedule(input(1)).await;
        assert!(fetcher.state().is_loading());
        fetcher.cancel().await;
        assert_eq!(fetcher.state(), QuoteState::Idle);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fetcher.state(), QuoteState::Idle);
    }

    #[test]
    fn test_ranking_helpers() {
        let mut slow_rich = route(1, 10);
        slow_rich.service_time_secs = 600;
        slow_rich.output_value_usd = Some(49.5);
        let mut fast_poor = route(1, 10);
        fast_poor.service_time_secs = 30;
        fast_poor.output_value_usd = Some(47.0);

        let set = RouteSet {
            routes: vec![slow_rich, fast_poor],
            destination_call_data: None,
            fetched_at: Utc::now(),
        };
        assert_eq!(set.fastest(), Some(1));
        assert_eq!(set.best_return(), Some(0));
        assert_eq!(RouteSet::empty().fastest(), None);
    }
}
