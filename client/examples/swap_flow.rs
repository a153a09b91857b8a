//! Example: Quote a swap and resolve its approval
//!
//! Loads the wallet's balances, then fetches routes for USDC on Ethereum into
//! EXA on Optimism, tags the fastest and best-return routes and reviews the
//! approval the selected one needs. The demo wallet has no keys, so every prompt
//! is declined.

use alloy_primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use exa_swap_client::{
    Asset, FlowKind, QuoteState, StepOutcome, SwapConfig, SwapError, SwapInput, SwapOrchestrator,
    TransactionRequest, TxHash, TypedDataRequest, Wallet,
};
use std::sync::Arc;

/// Read-only wallet; prints each prompt and declines it
struct WatchOnlyWallet(Address);

#[async_trait]
impl Wallet for WatchOnlyWallet {
    fn account(&self) -> Address {
        self.0
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> exa_swap_client::Result<Bytes> {
        println!("  wallet asked to sign {} ({})", request.primary_type, request.digest);
        Err(SwapError::UserRejected("watch-only wallet".to_string()))
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> exa_swap_client::Result<TxHash> {
        println!("  wallet asked to send to {} on chain {}", request.to, request.chain_id);
        Err(SwapError::UserRejected("watch-only wallet".to_string()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    exa_swap_client::init_tracing();

    println!("=== Swap Quote Example ===\n");

    let account = std::env::args()
        .nth(1)
        .map(|raw| raw.parse::<Address>())
        .transpose()?
        .unwrap_or(address!("1111111111111111111111111111111111111111"));

    let config = SwapConfig::from_env()?
        .with_rpc_url(1, "https://eth.llamarpc.com")
        .with_rpc_url(10, "https://mainnet.optimism.io");
    let flow = SwapOrchestrator::connect(
        config,
        FlowKind::GenericSwap,
        Arc::new(WatchOnlyWallet(account)),
    )?;
    println!("✓ Flow ready for {}\n", account);

    match flow.refresh_balances().await {
        Ok(balances) => {
            for balance in &balances {
                println!("  {} on chain {}: {}", balance.symbol, balance.chain_id, balance.amount);
            }
        }
        Err(e) => eprintln!("✗ Could not load balances: {}", e),
    }

    let usdc = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    let decimals = flow.token_decimals(1, usdc).await?;
    let amount = U256::from(50u64) * U256::from(10u64).pow(U256::from(decimals));

    let input = SwapInput {
        source_asset: Some(Asset {
            chain_id: 1,
            address: usdc,
            symbol: "USDC".to_string(),
            decimals,
            name: None,
            logo_uri: None,
        }),
        destination_chain_id: Some(10),
        destination_asset: Some(Asset {
            chain_id: 10,
            address: address!("1e925De1c68ef83bD98eE3E130eF14a50309C01B"),
            symbol: "EXA".to_string(),
            decimals: 18,
            name: None,
            logo_uri: None,
        }),
        amount,
        recipient: None,
        source_balance: None,
    };

    flow.set_input(input).await;
    let routes = match flow.quotes_settled().await {
        QuoteState::Ready { routes, .. } => routes,
        QuoteState::Failed(error) => {
            eprintln!("✗ {}", error);
            return Ok(());
        }
        state => {
            println!("No quote: {:?}", state);
            return Ok(());
        }
    };

    if routes.routes.is_empty() {
        println!("No liquidity for this pair");
        return Ok(());
    }

    let fastest = routes.fastest();
    let best = routes.best_return();
    for (index, route) in routes.routes.iter().enumerate() {
        let mut tags = Vec::new();
        if fastest == Some(index) {
            tags.push("fastest");
        }
        if best == Some(index) {
            tags.push("best return");
        }
        println!(
            "[{}] {} -> {} in ~{}s, fees ${:.2} {:?}",
            index, route.from_amount, route.to_amount, route.service_time_secs, route.total_fees_usd, tags
        );
    }

    if let Some(index) = best {
        flow.select_route(index).await;
    }

    println!("\nReviewing approval...");
    match flow.review().await {
        StepOutcome::Advanced(step) => println!("✓ Step: {:?}", step),
        StepOutcome::Failed(error) => eprintln!("✗ {}", error.message),
        other => println!("{:?}", other),
    }
    println!("Approval plan: {:?}\n", flow.snapshot().await.approval_plan);

    if let StepOutcome::Failed(error) = flow.approve().await {
        println!("Approval not granted: {}", error.message);
    }

    flow.teardown().await;
    println!("\n=== Example Complete ===");
    Ok(())
}
