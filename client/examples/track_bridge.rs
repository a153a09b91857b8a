//! Example: Track a bridge transfer until both legs settle
//!
//! Usage: `track_bridge <source tx hash> <from chain> <to chain>`, or
//! `track_bridge <address>` to resume every in-flight route of a wallet.

use exa_swap_client::{
    Aggregator, AggregatorClient, BridgeStatus, BridgeStatusQuery, CancelToken, CompletionTracker,
    EvmRpcClient, PollOptions, SwapConfig,
};
use std::sync::Arc;

fn print_status(status: &BridgeStatus) {
    println!(
        "  source: {}, destination: {}",
        status.source_tx_status, status.destination_tx_status
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("exa_swap_client=debug")
        .init();

    println!("=== Bridge Tracking Example ===\n");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = SwapConfig::from_env()?;
    let aggregator = Arc::new(AggregatorClient::new(&config)?);
    let tracker = CompletionTracker::new(
        PollOptions::from_config(&config).with_bridge_interval(3000),
        Arc::new(EvmRpcClient::new(&config)?),
        aggregator.clone(),
    );

    let cancel = CancelToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    match args.as_slice() {
        [hash, from, to] => {
            let query = BridgeStatusQuery {
                transaction_hash: hash.parse()?,
                from_chain_id: from.parse()?,
                to_chain_id: to.parse()?,
            };
            println!("Tracking {}\n", query.transaction_hash);
            let status = tracker.poll_bridge(query, &cancel, print_status).await?;
            println!("\n✓ Settled, complete: {}", status.is_complete());
        }
        [user] => {
            let routes = aggregator.active_routes(user.parse()?).await?;
            println!("{} active routes\n", routes.len());
            for route in &routes {
                println!("Route {} ({} -> {})", route.route_id, route.from_asset, route.to_asset);
                match tracker.resume(route, &cancel, print_status).await {
                    Ok(status) => println!("✓ Settled, complete: {}\n", status.is_complete()),
                    Err(e) => eprintln!("✗ {}\n", e),
                }
            }
        }
        _ => {
            eprintln!("usage: track_bridge <tx hash> <from chain> <to chain> | <address>");
        }
    }

    Ok(())
}
