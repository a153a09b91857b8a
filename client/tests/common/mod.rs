//! In-memory aggregator, chain and wallet shared by the integration tests.

#![allow(dead_code)]

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use exa_swap_client::abi::IERC20;
use exa_swap_client::types::BuildTxRequest;
use exa_swap_client::{
    ActiveRoute, Aggregator, ApprovalDescriptor, Asset, BridgeStatus, BridgeStatusQuery,
    BuildTxResponse, Chain, ChainRpc, LegStatus, PermitSignature, QuoteRequest, QuoteResponse,
    Result, Route, SwapConfig, SwapError, TokenBalance, TransactionReceipt, TransactionRequest,
    TxHash, TypedDataDomain, TypedDataRequest, Wallet, NATIVE_ASSET_ADDRESS,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWNER: Address = Address::repeat_byte(0x01);
pub const USDC: Address = Address::repeat_byte(0xcc);
pub const EXA: Address = Address::repeat_byte(0xea);
pub const BRIDGE: Address = Address::repeat_byte(0xbb);
pub const ROUTER: Address = Address::repeat_byte(0x7e);

pub const OPTIMISM: u64 = 10;
pub const ETHEREUM: u64 = 1;

/// Config with short debounce and polling so flows finish in milliseconds
pub fn fast_config() -> SwapConfig {
    SwapConfig::new("http://aggregator.invalid")
        .with_quote_debounce(10)
        .with_poll_config(10, 5, 10)
        .with_max_retries(1)
        .with_retry_config(1, 5, 2.0)
}

pub fn usdc(chain_id: u64) -> Asset {
    Asset {
        chain_id,
        address: USDC,
        symbol: "USDC".to_string(),
        decimals: 6,
        name: Some("USD Coin".to_string()),
        logo_uri: None,
    }
}

pub fn exa(chain_id: u64) -> Asset {
    Asset {
        chain_id,
        address: EXA,
        symbol: "EXA".to_string(),
        decimals: 18,
        name: None,
        logo_uri: None,
    }
}

pub fn eth(chain_id: u64) -> Asset {
    Asset {
        chain_id,
        address: NATIVE_ASSET_ADDRESS,
        symbol: "ETH".to_string(),
        decimals: 18,
        name: None,
        logo_uri: None,
    }
}

/// Route spending `amount` of `from`, approving [`BRIDGE`] unless native
pub fn route(id: &str, from: Asset, to: Asset, amount: u64) -> Route {
    let approval = (!from.is_native()).then(|| ApprovalDescriptor {
        spender: BRIDGE,
        token: from.address,
        required_amount: U256::from(amount),
    });

    Route {
        route_id: id.to_string(),
        from_chain_id: from.chain_id,
        to_chain_id: to.chain_id,
        from_amount: U256::from(amount),
        to_amount: U256::from(amount) * U256::from(1_000_000_000_000u64),
        from_asset: from,
        to_asset: to,
        total_fees_usd: 0.5,
        output_value_usd: Some(49.5),
        service_time_secs: 60,
        steps: Vec::new(),
        approval,
    }
}

pub fn quote(routes: Vec<Route>) -> QuoteResponse {
    QuoteResponse {
        routes,
        destination_call_data: None,
    }
}

pub fn build(value: U256) -> BuildTxResponse {
    BuildTxResponse {
        tx_target: ROUTER,
        tx_data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        value,
        chain_id: None,
    }
}

pub fn legs(source: LegStatus, destination: LegStatus) -> BridgeStatus {
    BridgeStatus {
        source_tx_status: source,
        destination_tx_status: destination,
        source_transaction_hash: B256::ZERO,
        destination_transaction_hash: None,
    }
}

#[derive(Default)]
struct AggregatorState {
    quotes: HashMap<U256, (Duration, std::result::Result<QuoteResponse, u16>)>,
    quote_requests: Vec<QuoteRequest>,
    build: Option<BuildTxResponse>,
    built_permits: Vec<Option<PermitSignature>>,
    statuses: VecDeque<BridgeStatus>,
    status_calls: usize,
    active: Vec<ActiveRoute>,
    balances: Vec<TokenBalance>,
    balance_requests: Vec<Address>,
}

/// Aggregator answering from scripted quotes, keyed by `fromAmount`
#[derive(Clone, Default)]
pub struct FakeAggregator {
    state: Arc<Mutex<AggregatorState>>,
}

impl FakeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, amount: u64, delay: Duration, response: QuoteResponse) -> Self {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(U256::from(amount), (delay, Ok(response)));
        self
    }

    pub fn with_quote_failure(self, amount: u64, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert(U256::from(amount), (Duration::ZERO, Err(status)));
        self
    }

    pub fn with_build(self, response: BuildTxResponse) -> Self {
        self.state.lock().unwrap().build = Some(response);
        self
    }

    /// Statuses are served in order; the last one repeats
    pub fn with_statuses(self, statuses: Vec<BridgeStatus>) -> Self {
        self.state.lock().unwrap().statuses = statuses.into();
        self
    }

    pub fn with_active_route(self, route: ActiveRoute) -> Self {
        self.state.lock().unwrap().active.push(route);
        self
    }

    pub fn with_balance(self, balance: TokenBalance) -> Self {
        self.state.lock().unwrap().balances.push(balance);
        self
    }

    pub fn balance_requests(&self) -> Vec<Address> {
        self.state.lock().unwrap().balance_requests.clone()
    }

    pub fn quote_requests(&self) -> Vec<QuoteRequest> {
        self.state.lock().unwrap().quote_requests.clone()
    }

    pub fn built_permits(&self) -> Vec<Option<PermitSignature>> {
        self.state.lock().unwrap().built_permits.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }
}

#[async_trait]
impl Aggregator for FakeAggregator {
    async fn chains(&self) -> Result<Vec<Chain>> {
        Ok(vec![])
    }

    async fn balances(&self, user: Address) -> Result<Vec<TokenBalance>> {
        let mut state = self.state.lock().unwrap();
        state.balance_requests.push(user);
        Ok(state.balances.clone())
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.quote_requests.push(request.clone());
            state.quotes.get(&request.from_amount).cloned()
        };

        let (delay, response) = scripted.ok_or_else(|| SwapError::Aggregator {
            status: 404,
            message: "no quote".to_string(),
        })?;
        tokio::time::sleep(delay).await;
        response.map_err(|status| SwapError::Aggregator {
            status,
            message: "aggregator unavailable".to_string(),
        })
    }

    async fn build_tx(&self, request: &BuildTxRequest<'_>) -> Result<BuildTxResponse> {
        let mut state = self.state.lock().unwrap();
        state.built_permits.push(request.permit.cloned());
        state.build.clone().ok_or_else(|| SwapError::Aggregator {
            status: 500,
            message: "no build".to_string(),
        })
    }

    async fn active_routes(&self, _user: Address) -> Result<Vec<ActiveRoute>> {
        Ok(self.state.lock().unwrap().active.clone())
    }

    async fn bridge_status(&self, query: &BridgeStatusQuery) -> Result<BridgeStatus> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let next = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };
        next.map(|mut status| {
            status.source_transaction_hash = query.transaction_hash;
            status
        })
        .ok_or_else(|| SwapError::Aggregator {
            status: 503,
            message: "unknown transfer".to_string(),
        })
    }
}

#[derive(Default)]
struct ChainState {
    allowances: HashMap<(Address, Address), U256>,
    permit_tokens: HashSet<Address>,
    contract_wallet: bool,
    reverting: HashSet<TxHash>,
    receipt_polls: HashMap<TxHash, usize>,
}

/// Chain whose allowances move when [`FakeWallet`] sends an `approve`
#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
    polls_until_mined: usize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            polls_until_mined: 2,
        }
    }

    pub fn with_allowance(self, token: Address, spender: Address, amount: U256) -> Self {
        self.set_allowance(token, spender, amount);
        self
    }

    pub fn with_permit(self, token: Address) -> Self {
        self.state.lock().unwrap().permit_tokens.insert(token);
        self
    }

    pub fn with_contract_wallet(self) -> Self {
        self.state.lock().unwrap().contract_wallet = true;
        self
    }

    pub fn reverting(&self, hash: TxHash) {
        self.state.lock().unwrap().reverting.insert(hash);
    }

    pub fn set_allowance(&self, token: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, spender), amount);
    }

    pub fn allowance_of(&self, token: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default()
    }

    fn execute(&self, request: &TransactionRequest) {
        if let Ok(call) = IERC20::approveCall::abi_decode(&request.data, true) {
            self.set_allowance(request.to, call.spender, call.amount);
        }
    }

    fn missing(method: &str) -> SwapError {
        SwapError::Rpc {
            code: 3,
            message: format!("execution reverted: {}", method),
        }
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn allowance(
        &self,
        _chain_id: u64,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256> {
        Ok(self.allowance_of(token, spender))
    }

    async fn decimals(&self, _chain_id: u64, _token: Address) -> Result<u8> {
        Ok(6)
    }

    async fn nonces(&self, _chain_id: u64, token: Address, _owner: Address) -> Result<U256> {
        if self.state.lock().unwrap().permit_tokens.contains(&token) {
            Ok(U256::ZERO)
        } else {
            Err(Self::missing("nonces"))
        }
    }

    async fn name(&self, _chain_id: u64, token: Address) -> Result<String> {
        if self.state.lock().unwrap().permit_tokens.contains(&token) {
            Ok("USD Coin".to_string())
        } else {
            Err(Self::missing("name"))
        }
    }

    async fn version(&self, _chain_id: u64, token: Address) -> Result<String> {
        if self.state.lock().unwrap().permit_tokens.contains(&token) {
            Ok("2".to_string())
        } else {
            Err(Self::missing("version"))
        }
    }

    async fn code(&self, _chain_id: u64, _account: Address) -> Result<Bytes> {
        if self.state.lock().unwrap().contract_wallet {
            Ok(Bytes::from(vec![0x60, 0x80]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn estimate_gas(&self, _request: &TransactionRequest) -> Result<u64> {
        Ok(100_000)
    }

    async fn transaction_receipt(
        &self,
        _chain_id: u64,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>> {
        let mut state = self.state.lock().unwrap();
        let polls = state.receipt_polls.entry(hash).or_default();
        *polls += 1;
        if *polls < self.polls_until_mined {
            return Ok(None);
        }

        Ok(Some(TransactionReceipt {
            transaction_hash: hash,
            success: !state.reverting.contains(&hash),
            block_number: 1234,
            gas_used: 90_000,
        }))
    }
}

/// Wallet that signs and sends without prompting
pub struct FakeWallet {
    chain: FakeChain,
    reject_signatures: bool,
    sign_delay: Duration,
    sent: Mutex<Vec<TransactionRequest>>,
    prompts: Mutex<Vec<String>>,
    domains: Mutex<Vec<TypedDataDomain>>,
    nonce: AtomicUsize,
}

impl FakeWallet {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            chain,
            reject_signatures: false,
            sign_delay: Duration::ZERO,
            sent: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            domains: Mutex::new(Vec::new()),
            nonce: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    pub fn with_sign_delay(mut self, delay: Duration) -> Self {
        self.sign_delay = delay;
        self
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Primary types of every typed-data prompt
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Signing domains of every typed-data prompt
    pub fn domains(&self) -> Vec<TypedDataDomain> {
        self.domains.lock().unwrap().clone()
    }

    /// Hash the next `send_transaction` will return
    pub fn next_hash(&self) -> TxHash {
        hash_for(self.nonce.load(Ordering::SeqCst) + 1)
    }
}

fn hash_for(nonce: usize) -> TxHash {
    B256::left_padding_from(&nonce.to_be_bytes())
}

#[async_trait]
impl Wallet for FakeWallet {
    fn account(&self) -> Address {
        OWNER
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> Result<Bytes> {
        self.prompts.lock().unwrap().push(request.primary_type.clone());
        self.domains.lock().unwrap().push(request.domain.clone());
        tokio::time::sleep(self.sign_delay).await;
        if self.reject_signatures {
            return Err(SwapError::UserRejected("User denied message signature".to_string()));
        }

        let mut signature = request.digest.to_vec();
        signature.extend_from_slice(&[0x11; 32]);
        signature.push(1);
        Ok(Bytes::from(signature))
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<TxHash> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(request.clone());
        self.chain.execute(request);
        Ok(hash_for(nonce))
    }
}
