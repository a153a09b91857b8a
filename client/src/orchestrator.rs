//! Swap/bridge flow state machine.
//!
//! A [`SwapOrchestrator`] is built once per flow and owns the [`TxStep`], the
//! broadcast [`Transaction`], the held [`PermitSignature`] and the error slot.
//! Every user action is a named async transition returning a [`StepOutcome`].
//! Component errors never escape a transition; they are folded into a
//! [`FlowError`] and parked in the slot.
//!
//! Two guards keep interleaved actions from mixing state:
//!
//! * one wallet-bound operation at a time; a concurrent `review`, `approve` or
//!   `submit` returns [`StepOutcome::Ignored`] without touching anything;
//! * an input epoch, advanced by `set_input`/`select_route`. A transition whose
//!   epoch changed while it was suspended discards its result and returns
//!   [`StepOutcome::Superseded`].

use crate::aggregator::{Aggregator, AggregatorClient};
use crate::allowance::{AllowanceResolver, ApprovalPlan};
use crate::cancel::{CancelToken, Epoch, Ticket};
use crate::config::SwapConfig;
use crate::error::{FlowError, FlowErrorKind, Result, Severity, SwapError};
use crate::evm_rpc::{ChainRpc, EvmRpcClient};
use crate::executor::TransactionExecutor;
use crate::quotes::{QuoteFetcher, QuoteInput, QuoteState};
use crate::signature::SignatureProvider;
use crate::tracker::{CompletionTracker, PollOptions};
use crate::types::{
    ActiveRoute, Asset, BridgeStatus, BridgeStatusQuery, PermitSignature, Route, TokenBalance,
    Transaction, TxHash, TxStatus, TxStep,
};
use crate::wallet::Wallet;
use alloy_primitives::{Address, Bytes, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which flow the orchestrator drives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowKind {
    /// Any wallet asset into any destination asset
    GenericSwap,
    /// Acquire the target token through a contract call run on arrival
    NativeAcquisition {
        /// Destination contract call
        payload: Bytes,
        /// Gas for the destination call
        gas_limit: u64,
    },
}

/// User-supplied input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapInput {
    /// Asset to pay with
    pub source_asset: Option<Asset>,
    /// Chain to end up on
    pub destination_chain_id: Option<u64>,
    /// Asset to end up with
    pub destination_asset: Option<Asset>,
    /// Amount of the source asset, in base units
    pub amount: U256,
    /// Receiving wallet; the connected account when absent
    pub recipient: Option<Address>,
    /// Wallet balance of the source asset, used for the gas reserve warning;
    /// taken from the last [`SwapOrchestrator::refresh_balances`] when absent
    pub source_balance: Option<U256>,
}

/// Result of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The transition ran; the machine is now at this step
    Advanced(TxStep),
    /// The transition failed; the error is also in the error slot
    Failed(FlowError),
    /// Another operation is in flight, or the machine is not at the required step
    Ignored,
    /// The input changed while the transition was suspended; its result was dropped
    Superseded,
}

/// Everything a view needs to render the flow
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    /// Coarse progress
    pub step: TxStep,
    /// Swap/bridge transaction, once broadcast
    pub transaction: Option<Transaction>,
    /// Latest bridge leg statuses, once polling started
    pub bridge_status: Option<BridgeStatus>,
    /// Error slot
    pub error: Option<FlowError>,
    /// Held approval signature
    pub permit: Option<PermitSignature>,
    /// Last resolved approval plan
    pub approval_plan: Option<ApprovalPlan>,
    /// Quote state
    pub quotes: QuoteState,
}

#[derive(Debug)]
struct FlowState {
    input: SwapInput,
    step: TxStep,
    transaction: Option<Transaction>,
    error: Option<FlowError>,
    permit: Option<PermitSignature>,
    approval_plan: Option<ApprovalPlan>,
    cancel: CancelToken,
}

impl FlowState {
    fn new() -> Self {
        Self {
            input: SwapInput::default(),
            step: TxStep::AwaitingApproval,
            transaction: None,
            error: None,
            permit: None,
            approval_plan: None,
            cancel: CancelToken::new(),
        }
    }

    /// Back to `AwaitingApproval` with nothing held; cancels waits of the old input
    fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.step = TxStep::AwaitingApproval;
        self.transaction = None;
        self.error = None;
        self.permit = None;
        self.approval_plan = None;
    }
}

struct Shared {
    state: RwLock<FlowState>,
    bridge: watch::Sender<Option<BridgeStatus>>,
    epoch: Epoch,
}

impl Shared {
    /// Publish a bridge snapshot unless the input moved on
    fn publish_bridge(&self, ticket: Ticket, status: &BridgeStatus) {
        self.bridge.send_if_modified(|current| {
            if !self.epoch.is_current(ticket) {
                return false;
            }
            *current = Some(status.clone());
            true
        });
    }
}

/// Clears the busy flag on drop
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Swap/bridge orchestrator
pub struct SwapOrchestrator {
    kind: FlowKind,
    wallet: Arc<dyn Wallet>,
    aggregator: Arc<dyn Aggregator>,
    rpc: Arc<dyn ChainRpc>,
    balances: RwLock<Vec<TokenBalance>>,
    quotes: QuoteFetcher,
    resolver: AllowanceResolver,
    signer: SignatureProvider,
    executor: TransactionExecutor,
    tracker: CompletionTracker,
    shared: Arc<Shared>,
    busy: AtomicBool,
    bridge_task: Mutex<Option<(CancelToken, JoinHandle<()>)>>,
}

impl SwapOrchestrator {
    /// Build an orchestrator over the given collaborators
    pub fn new(
        config: SwapConfig,
        kind: FlowKind,
        aggregator: Arc<dyn Aggregator>,
        rpc: Arc<dyn ChainRpc>,
        wallet: Arc<dyn Wallet>,
    ) -> Self {
        let config = Arc::new(config);
        let (bridge, _) = watch::channel(None);

        Self {
            kind,
            quotes: QuoteFetcher::new(
                aggregator.clone(),
                Duration::from_millis(config.quote_debounce_ms),
            ),
            resolver: AllowanceResolver::new(&config, rpc.clone()),
            signer: SignatureProvider::new(&config, rpc.clone(), wallet.clone()),
            executor: TransactionExecutor::new(
                config.clone(),
                aggregator.clone(),
                rpc.clone(),
                wallet.clone(),
            ),
            tracker: CompletionTracker::new(
                PollOptions::from_config(&config),
                rpc.clone(),
                aggregator.clone(),
            ),
            wallet,
            aggregator,
            rpc,
            balances: RwLock::new(Vec::new()),
            shared: Arc::new(Shared {
                state: RwLock::new(FlowState::new()),
                bridge,
                epoch: Epoch::new(),
            }),
            busy: AtomicBool::new(false),
            bridge_task: Mutex::new(None),
        }
    }

    /// Build an orchestrator talking HTTP to the configured aggregator and nodes
    pub fn connect(config: SwapConfig, kind: FlowKind, wallet: Arc<dyn Wallet>) -> Result<Self> {
        config.validate()?;
        let aggregator = Arc::new(AggregatorClient::new(&config)?);
        let rpc = Arc::new(EvmRpcClient::new(&config)?);
        Ok(Self::new(config, kind, aggregator, rpc, wallet))
    }

    /// Flow kind
    pub fn kind(&self) -> &FlowKind {
        &self.kind
    }

    fn quote_input(&self, input: &SwapInput) -> QuoteInput {
        let account = self.wallet.account();
        let (destination_payload, destination_gas_limit) = match &self.kind {
            FlowKind::GenericSwap => (None, None),
            FlowKind::NativeAcquisition { payload, gas_limit } => {
                (Some(payload.clone()), Some(*gas_limit))
            }
        };

        QuoteInput {
            source_asset: input.source_asset.clone(),
            destination_chain_id: input.destination_chain_id,
            destination_asset: input.destination_asset.clone(),
            amount: input.amount,
            user: Some(account),
            recipient: Some(input.recipient.unwrap_or(account)),
            destination_payload,
            destination_gas_limit,
        }
    }

    /// Replace the input. Resets the machine to `AwaitingApproval`, clears the
    /// error slot, the held permit and the transaction, stops bridge polling and
    /// schedules a new quote.
    pub async fn set_input(&self, mut input: SwapInput) {
        self.shared.epoch.advance();
        self.stop_bridge_polling().await;

        if input.source_balance.is_none() {
            if let Some(asset) = &input.source_asset {
                input.source_balance = self
                    .cached_balance(asset.chain_id, asset.address)
                    .await
                    .map(|balance| balance.amount);
            }
        }

        {
            let mut state = self.shared.state.write().await;
            state.reset();
            state.error = gas_reserve_warning(&input);
            state.input = input.clone();
        }
        self.shared.bridge.send_replace(None);

        debug!("Input changed, rescheduling quote");
        self.quotes.schedule(self.quote_input(&input)).await;
    }

    /// Select another quoted route; approval progress starts over. `false` when
    /// the index is out of range or a swap is already in flight.
    pub async fn select_route(&self, index: usize) -> bool {
        let mut state = self.shared.state.write().await;
        if state.step == TxStep::ConfirmationPending || !self.quotes.select(index) {
            return false;
        }

        self.shared.epoch.advance();
        state.reset();
        state.error = gas_reserve_warning(&state.input);
        info!("Selected route {}", index);
        true
    }

    /// Resolve the approval plan for the selected route. Pre-advances to
    /// `AwaitingConfirmation` when nothing needs approving.
    pub async fn review(&self) -> StepOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return StepOutcome::Ignored;
        };
        let ticket = self.shared.epoch.current();

        if self.shared.state.read().await.step != TxStep::AwaitingApproval {
            return StepOutcome::Ignored;
        }
        let route = match self.selected_route_or_fail().await {
            Ok(route) => route,
            Err(outcome) => return outcome,
        };

        let result = self.resolver.resolve(&route, self.wallet.account()).await;

        let mut state = self.shared.state.write().await;
        if !self.shared.epoch.is_current(ticket) {
            return StepOutcome::Superseded;
        }
        match result {
            Ok(plan) => {
                state.approval_plan = Some(plan);
                if !plan.is_required() {
                    debug!("No approval needed, skipping to confirmation");
                    state.step = TxStep::AwaitingConfirmation;
                }
                StepOutcome::Advanced(state.step)
            }
            Err(e) => {
                let error = FlowError::from_error(FlowErrorKind::Approval, &e);
                state.error = Some(error.clone());
                StepOutcome::Failed(error)
            }
        }
    }

    /// Grant the approval the selected route needs. A no-op advance when none is
    /// needed; back to `AwaitingApproval` with the error set on failure.
    pub async fn approve(&self) -> StepOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return StepOutcome::Ignored;
        };
        let ticket = self.shared.epoch.current();

        let route = match self.selected_route_or_fail().await {
            Ok(route) => route,
            Err(outcome) => return outcome,
        };
        let cancel = {
            let mut state = self.shared.state.write().await;
            if state.step != TxStep::AwaitingApproval {
                return StepOutcome::Ignored;
            }
            state.step = TxStep::ApprovalPending;
            state.error = None;
            state.cancel.clone()
        };

        info!("Approving route {}", route.route_id);
        let result = self.run_approval(&route, &cancel).await;

        let mut state = self.shared.state.write().await;
        if !self.shared.epoch.is_current(ticket) {
            return StepOutcome::Superseded;
        }
        match result {
            Ok((plan, permit)) => {
                state.approval_plan = Some(plan);
                state.permit = permit;
                state.step = TxStep::AwaitingConfirmation;
                StepOutcome::Advanced(state.step)
            }
            Err(e) => {
                let error = FlowError::from_error(FlowErrorKind::Approval, &e);
                state.step = TxStep::AwaitingApproval;
                state.error = Some(error.clone());
                StepOutcome::Failed(error)
            }
        }
    }

    async fn run_approval(
        &self,
        route: &Route,
        cancel: &CancelToken,
    ) -> Result<(ApprovalPlan, Option<PermitSignature>)> {
        let owner = self.wallet.account();
        let chain_id = route.from_chain_id;
        let plan = self.resolver.resolve(route, owner).await?;

        match plan {
            ApprovalPlan::Approve {
                token,
                spender,
                amount,
            } => {
                self.approve_onchain(chain_id, token, spender, amount, amount, cancel)
                    .await?;
            }
            ApprovalPlan::Permit2 {
                token,
                amount,
                relay_approval: true,
                ..
            } => {
                let relay = self.resolver.permit2();
                self.approve_onchain(chain_id, token, relay, U256::MAX, amount, cancel)
                    .await?;
            }
            _ => {}
        }

        let permit = self.signer.sign(chain_id, owner, &plan).await?;
        Ok((plan, permit))
    }

    /// Send `approve(spender, grant)` if the allowance is still below
    /// `required`, and wait for it to mine
    async fn approve_onchain(
        &self,
        chain_id: u64,
        token: Address,
        spender: Address,
        grant: U256,
        required: U256,
        cancel: &CancelToken,
    ) -> Result<()> {
        let owner = self.wallet.account();
        if !self
            .resolver
            .needs_approval(chain_id, token, owner, spender, required)
            .await?
        {
            debug!("Allowance granted in the meantime, skipping approve");
            return Ok(());
        }

        let hash = self
            .executor
            .submit_approval(chain_id, token, spender, grant)
            .await?;
        let receipt = self.tracker.await_confirmation(chain_id, hash, cancel).await?;
        if receipt.status == TxStatus::Error {
            return Err(SwapError::Reverted { hash });
        }
        Ok(())
    }

    /// Build and submit the swap/bridge transaction, then wait for its receipt.
    /// Cross-chain routes start bridge polling as soon as the hash is known.
    pub async fn submit(&self) -> StepOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return StepOutcome::Ignored;
        };
        let ticket = self.shared.epoch.current();

        let route = match self.selected_route_or_fail().await {
            Ok(route) => route,
            Err(outcome) => return outcome,
        };
        let destination_call_data = self
            .quotes
            .state()
            .routes()
            .and_then(|set| set.destination_call_data.clone());

        let (permit, cancel) = {
            let mut state = self.shared.state.write().await;
            if state.step != TxStep::AwaitingConfirmation {
                return StepOutcome::Ignored;
            }
            state.step = TxStep::ConfirmationPending;
            state.error = None;
            (state.permit.clone(), state.cancel.clone())
        };

        let submitted = self
            .executor
            .submit_swap(&route, destination_call_data.as_ref(), permit.as_ref())
            .await;

        let hash = {
            let mut state = self.shared.state.write().await;
            if !self.shared.epoch.is_current(ticket) {
                return StepOutcome::Superseded;
            }
            match submitted {
                Ok(hash) => {
                    let mut transaction = Transaction::pending(hash);
                    transaction.advance(TxStatus::Processing);
                    state.transaction = Some(transaction);
                    state.permit = None;
                    hash
                }
                Err(e @ SwapError::PermitExpired { .. }) => {
                    warn!("Held permit expired, approval must be signed again");
                    let error = FlowError::from_error(FlowErrorKind::Approval, &e);
                    state.permit = None;
                    state.step = TxStep::AwaitingApproval;
                    state.error = Some(error.clone());
                    return StepOutcome::Failed(error);
                }
                Err(e) => {
                    let error = FlowError::from_error(FlowErrorKind::Submission, &e);
                    state.step = TxStep::AwaitingConfirmation;
                    state.error = Some(error.clone());
                    return StepOutcome::Failed(error);
                }
            }
        };

        if route.is_cross_chain() {
            self.start_bridge_polling(
                ticket,
                BridgeStatusQuery {
                    transaction_hash: hash,
                    from_chain_id: route.from_chain_id,
                    to_chain_id: route.to_chain_id,
                },
                (route.service_time_secs > 0)
                    .then(|| Duration::from_secs(route.service_time_secs)),
            )
            .await;
        }

        let confirmation = self
            .tracker
            .await_confirmation(route.from_chain_id, hash, &cancel)
            .await;

        let mut state = self.shared.state.write().await;
        if !self.shared.epoch.is_current(ticket) {
            return StepOutcome::Superseded;
        }
        match confirmation {
            Ok(receipt) => {
                if let Some(transaction) = state.transaction.as_mut() {
                    transaction.advance(receipt.status);
                }
                if receipt.status == TxStatus::Error {
                    let error =
                        FlowError::from_error(FlowErrorKind::Reverted, &SwapError::Reverted { hash });
                    state.error = Some(error.clone());
                    return StepOutcome::Failed(error);
                }
                StepOutcome::Advanced(state.step)
            }
            Err(SwapError::Cancelled) => StepOutcome::Superseded,
            Err(e) => {
                let error = FlowError::from_error(FlowErrorKind::Submission, &e).with_hash(hash);
                state.error = Some(error.clone());
                StepOutcome::Failed(error)
            }
        }
    }

    async fn selected_route_or_fail(&self) -> std::result::Result<Route, StepOutcome> {
        match self.quotes.selected_route() {
            Some(route) => Ok(route),
            None => {
                let error = FlowError::from_error(FlowErrorKind::Input, &SwapError::NoRouteSelected);
                self.shared.state.write().await.error = Some(error.clone());
                Err(StepOutcome::Failed(error))
            }
        }
    }

    /// Poll the bridge in the background. A failed leg is reported as soon as it
    /// is seen, even while the other leg is still pending. When `stall_after`
    /// elapses with a leg still pending, a warning is parked in the error slot.
    async fn start_bridge_polling(
        &self,
        ticket: Ticket,
        query: BridgeStatusQuery,
        stall_after: Option<Duration>,
    ) {
        self.stop_bridge_polling().await;

        let cancel = CancelToken::new();
        let tracker = self.tracker.clone();
        let shared = self.shared.clone();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let publisher = shared.clone();
            let poll = tracker.poll_bridge(query, &token, move |status| {
                publisher.publish_bridge(ticket, status)
            });
            tokio::pin!(poll);

            let stall = tokio::time::sleep(stall_after.unwrap_or_default());
            tokio::pin!(stall);
            let mut stall_armed = stall_after.is_some();

            let mut updates = shared.bridge.subscribe();
            updates.borrow_and_update();
            let mut failure_reported = false;

            let result = loop {
                tokio::select! {
                    result = &mut poll => break result,
                    Ok(()) = updates.changed(), if !failure_reported => {
                        let failed = updates
                            .borrow_and_update()
                            .as_ref()
                            .filter(|status| status.has_failure())
                            .cloned();
                        if let Some(status) = failed {
                            failure_reported = true;
                            let mut state = shared.state.write().await;
                            if shared.epoch.is_current(ticket) {
                                warn!("Bridge leg failed for {}", query.transaction_hash);
                                state.error = Some(bridge_failure(&status, query.transaction_hash));
                            }
                        }
                    }
                    _ = &mut stall, if stall_armed => {
                        stall_armed = false;
                        let mut state = shared.state.write().await;
                        if shared.epoch.is_current(ticket) && state.error.is_none() {
                            warn!("Bridge transfer {} is taking longer than estimated", query.transaction_hash);
                            state.error = Some(bridge_stall(query.transaction_hash));
                        }
                    }
                }
            };

            let mut state = shared.state.write().await;
            if !shared.epoch.is_current(ticket) {
                return;
            }
            match result {
                Ok(status) if status.has_failure() => {
                    warn!("Bridge leg failed for {}", query.transaction_hash);
                    state.error = Some(bridge_failure(&status, query.transaction_hash));
                }
                Ok(_) => {
                    info!("Bridge transfer completed: {}", query.transaction_hash);
                    if state
                        .error
                        .as_ref()
                        .is_some_and(|e| e.kind == FlowErrorKind::BridgeStall)
                    {
                        state.error = None;
                    }
                }
                Err(e) => debug!("Bridge polling ended: {}", e),
            }
        });

        *self.bridge_task.lock().await = Some((cancel, handle));
    }

    async fn stop_bridge_polling(&self) {
        if let Some((cancel, handle)) = self.bridge_task.lock().await.take() {
            cancel.cancel();
            handle.abort();
        }
    }

    /// Reload the connected wallet's balances; call when the chain or wallet changes
    pub async fn refresh_balances(&self) -> Result<Vec<TokenBalance>> {
        let balances = self.aggregator.balances(self.wallet.account()).await?;
        debug!("Loaded {} balances", balances.len());
        *self.balances.write().await = balances.clone();
        Ok(balances)
    }

    async fn cached_balance(&self, chain_id: u64, token: Address) -> Option<TokenBalance> {
        self.balances
            .read()
            .await
            .iter()
            .find(|balance| balance.chain_id == chain_id && balance.token_address == token)
            .cloned()
    }

    /// Decimals of `token`, from the loaded balances or the token contract
    pub async fn token_decimals(&self, chain_id: u64, token: Address) -> Result<u8> {
        match self.cached_balance(chain_id, token).await {
            Some(balance) => Ok(balance.decimals),
            None => self.rpc.decimals(chain_id, token).await,
        }
    }

    /// In-flight bridge routes of the connected wallet
    pub async fn active_routes(&self) -> Result<Vec<ActiveRoute>> {
        self.aggregator.active_routes(self.wallet.account()).await
    }

    /// Track an in-flight bridge route found through [`active_routes`](Self::active_routes)
    pub async fn resume(&self, route: &ActiveRoute) -> Result<()> {
        let transaction_hash = route
            .source_transaction_hash
            .ok_or(SwapError::MissingInput("source transaction hash"))?;

        info!("Resuming bridge tracking of route {}", route.route_id);
        self.start_bridge_polling(
            self.shared.epoch.current(),
            BridgeStatusQuery {
                transaction_hash,
                from_chain_id: route.from_chain_id,
                to_chain_id: route.to_chain_id,
            },
            None,
        )
        .await;
        Ok(())
    }

    /// Stop quote fetching, bridge polling and receipt waits
    pub async fn teardown(&self) {
        debug!("Tearing down swap flow");
        self.shared.epoch.advance();
        self.quotes.cancel().await;
        self.stop_bridge_polling().await;
        self.shared.state.read().await.cancel.cancel();
    }

    /// Whether approval and submission controls should be enabled
    pub fn can_proceed(&self) -> bool {
        self.quotes.selected_route().is_some()
    }

    /// Wait for the pending quote request to settle
    pub async fn quotes_settled(&self) -> QuoteState {
        self.quotes.settled().await
    }

    /// Quote state
    pub fn quote_state(&self) -> QuoteState {
        self.quotes.state()
    }

    /// Watch quote state changes
    pub fn subscribe_quotes(&self) -> watch::Receiver<QuoteState> {
        self.quotes.subscribe()
    }

    /// Latest bridge leg statuses
    pub fn bridge_status(&self) -> Option<BridgeStatus> {
        self.shared.bridge.borrow().clone()
    }

    /// Watch bridge status changes
    pub fn subscribe_bridge(&self) -> watch::Receiver<Option<BridgeStatus>> {
        self.shared.bridge.subscribe()
    }

    /// Coarse progress
    pub async fn step(&self) -> TxStep {
        self.shared.state.read().await.step
    }

    /// Swap/bridge transaction, once broadcast
    pub async fn transaction(&self) -> Option<Transaction> {
        self.shared.state.read().await.transaction
    }

    /// Error slot
    pub async fn error(&self) -> Option<FlowError> {
        self.shared.state.read().await.error.clone()
    }

    /// Clear the error slot
    pub async fn dismiss_error(&self) {
        self.shared.state.write().await.error = None;
    }

    /// Held approval signature
    pub async fn permit(&self) -> Option<PermitSignature> {
        self.shared.state.read().await.permit.clone()
    }

    /// Full view of the flow
    pub async fn snapshot(&self) -> FlowSnapshot {
        let state = self.shared.state.read().await;
        FlowSnapshot {
            step: state.step,
            transaction: state.transaction,
            bridge_status: self.bridge_status(),
            error: state.error.clone(),
            permit: state.permit.clone(),
            approval_plan: state.approval_plan,
            quotes: self.quotes.state(),
        }
    }
}

impl Drop for SwapOrchestrator {
    fn drop(&mut self) {
        self.shared.epoch.advance();
        if let Ok(mut task) = self.bridge_task.try_lock() {
            if let Some((cancel, handle)) = task.take() {
                cancel.cancel();
                handle.abort();
            }
        }
        if let Ok(state) = self.shared.state.try_read() {
            state.cancel.cancel();
        }
    }
}

fn bridge_failure(status: &BridgeStatus, hash: TxHash) -> FlowError {
    FlowError {
        kind: FlowErrorKind::BridgeStall,
        message: format!(
            "Bridge transfer failed (source {}, destination {})",
            status.source_tx_status, status.destination_tx_status
        ),
        severity: Severity::Error,
        hash: Some(hash),
        retryable: false,
    }
}

fn bridge_stall(hash: TxHash) -> FlowError {
    FlowError {
        kind: FlowErrorKind::BridgeStall,
        message: "Bridge transfer is taking longer than estimated".to_string(),
        severity: Severity::Warning,
        hash: Some(hash),
        retryable: false,
    }
}

/// Warn when a native-asset amount would leave nothing for gas
fn gas_reserve_warning(input: &SwapInput) -> Option<FlowError> {
    let asset = input.source_asset.as_ref()?;
    let balance = input.source_balance?;
    (asset.is_native() && !input.amount.is_zero() && input.amount >= balance).then(|| {
        FlowError::warning(
            FlowErrorKind::Input,
            format!("Keep some {} to pay for network fees", asset.symbol),
        )
    })
}
