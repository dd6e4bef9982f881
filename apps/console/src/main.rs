use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    CacheRefreshBinding, HttpContractNode, LifecycleStatus, QuerySnapshot, ReadCache,
    WriteCoordinator,
};
use shared::domain::{Address, Operation, Primitive, Query, QueryKey};

/// The node's first funded dev account; owns the demo contracts.
const DEFAULT_SENDER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    node_url: String,
    /// Account the state-changing calls are sent from.
    #[arg(long, default_value = DEFAULT_SENDER)]
    sender: String,
    /// Bounded wait for a confirmation before reporting a timeout.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Vulnerable,
    Fixed,
}

impl VariantArg {
    fn contract_name(&self, base: &str) -> String {
        match self {
            VariantArg::Vulnerable => format!("{base}Vulnerable"),
            VariantArg::Fixed => format!("{base}Fixed"),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    Increment,
    Decrement,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the demo contracts deployed on the node.
    Contracts,
    /// Create a record; the cached nextId read refreshes on confirmation.
    CrudCreate { title: String, description: String },
    /// Update a record; the cached readRecord read refreshes on confirmation.
    CrudUpdate {
        id: u128,
        title: String,
        description: String,
    },
    /// Delete a record. The dependent readRecord refresh fails afterwards
    /// and the cache keeps the last good value alongside the error.
    CrudDelete { id: u128 },
    /// Read a record without submitting anything.
    CrudRead { id: u128 },
    /// Adjust the 8-bit counter; the cached balance read refreshes on
    /// confirmation. Try `increment 250` against both variants.
    Counter {
        #[arg(long, value_enum, default_value = "fixed")]
        variant: VariantArg,
        direction: Direction,
        value: u8,
    },
    /// Set a user's balance in the registry.
    SetBalance {
        #[arg(long, value_enum, default_value = "fixed")]
        variant: VariantArg,
        user: String,
        amount: u128,
    },
    /// Set a user's reputation score.
    SetReputation {
        #[arg(long, value_enum, default_value = "fixed")]
        variant: VariantArg,
        user: String,
        score: u128,
    },
    /// Withdraw the vault's funds as the acting sender.
    Withdraw {
        #[arg(long, value_enum, default_value = "fixed")]
        variant: VariantArg,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let node = Arc::new(HttpContractNode::new(&cli.node_url)?);
    let sender = Address::parse(cli.sender.as_str())?;
    let timeout = Duration::from_secs(cli.timeout_secs);

    match cli.command {
        Command::Contracts => {
            for summary in node.contracts().await? {
                println!("{}  {}", summary.address, summary.name);
            }
        }
        Command::CrudCreate { title, description } => {
            let crud = find_contract(&node, "Crud").await?;
            run_write(
                &node,
                sender,
                crud.clone(),
                "createRecord",
                vec![Primitive::text(title), Primitive::text(description)],
                vec![Query::new(crud, "nextId", vec![])],
                timeout,
            )
            .await?;
        }
        Command::CrudUpdate {
            id,
            title,
            description,
        } => {
            let crud = find_contract(&node, "Crud").await?;
            run_write(
                &node,
                sender,
                crud.clone(),
                "updateRecord",
                vec![
                    Primitive::uint256(id),
                    Primitive::text(title),
                    Primitive::text(description),
                ],
                vec![Query::new(crud, "readRecord", vec![Primitive::uint256(id)])],
                timeout,
            )
            .await?;
        }
        Command::CrudDelete { id } => {
            let crud = find_contract(&node, "Crud").await?;
            run_write(
                &node,
                sender,
                crud.clone(),
                "deleteRecord",
                vec![Primitive::uint256(id)],
                vec![Query::new(crud, "readRecord", vec![Primitive::uint256(id)])],
                timeout,
            )
            .await?;
        }
        Command::CrudRead { id } => {
            let crud = find_contract(&node, "Crud").await?;
            let cache = ReadCache::new(node.clone());
            let key = cache
                .register(Query::new(crud, "readRecord", vec![Primitive::uint256(id)]))
                .await?;
            cache.refresh(&key).await?;
            print_snapshot(&key, &cache.get(&key).await?);
        }
        Command::Counter {
            variant,
            direction,
            value,
        } => {
            let counter = find_contract(&node, &variant.contract_name("Counter")).await?;
            let function = match direction {
                Direction::Increment => "increment",
                Direction::Decrement => "decrement",
            };
            run_write(
                &node,
                sender,
                counter.clone(),
                function,
                vec![Primitive::uint8(value)],
                vec![Query::new(counter, "balance", vec![])],
                timeout,
            )
            .await?;
        }
        Command::SetBalance {
            variant,
            user,
            amount,
        } => {
            let registry = find_contract(&node, &variant.contract_name("BalanceRegistry")).await?;
            let user = Address::parse(user.as_str())?;
            run_write(
                &node,
                sender,
                registry.clone(),
                "setBalance",
                vec![Primitive::address(user.clone()), Primitive::uint256(amount)],
                vec![Query::new(
                    registry,
                    "balances",
                    vec![Primitive::address(user)],
                )],
                timeout,
            )
            .await?;
        }
        Command::SetReputation {
            variant,
            user,
            score,
        } => {
            let reputation = find_contract(&node, &variant.contract_name("Reputation")).await?;
            let user = Address::parse(user.as_str())?;
            run_write(
                &node,
                sender,
                reputation.clone(),
                "setReputation",
                vec![Primitive::address(user.clone()), Primitive::uint256(score)],
                vec![Query::new(
                    reputation,
                    "userReputation",
                    vec![Primitive::address(user)],
                )],
                timeout,
            )
            .await?;
        }
        Command::Withdraw { variant } => {
            let vault = find_contract(&node, &variant.contract_name("Vault")).await?;
            println!(
                "vault balance before: {}",
                node.native_balance(&vault).await?
            );
            println!(
                "sender balance before: {}",
                node.native_balance(&sender).await?
            );
            run_write(
                &node,
                sender.clone(),
                vault.clone(),
                "withdraw",
                vec![],
                vec![Query::new(vault.clone(), "owner", vec![])],
                timeout,
            )
            .await?;
            println!("vault balance after: {}", node.native_balance(&vault).await?);
            println!(
                "sender balance after: {}",
                node.native_balance(&sender).await?
            );
        }
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

/// Drives one full write lifecycle: register the dependent reads, seed them,
/// submit, observe until terminal, then show the refreshed reads.
async fn run_write(
    node: &Arc<HttpContractNode>,
    sender: Address,
    contract: Address,
    function: &str,
    args: Vec<Primitive>,
    dependents: Vec<Query>,
    timeout: Duration,
) -> Result<()> {
    let cache = Arc::new(ReadCache::new(node.clone()));
    let mut keys = Vec::new();
    for query in dependents {
        keys.push(cache.register(query).await?);
    }
    cache.refresh_all().await;
    for key in &keys {
        print_snapshot(key, &cache.get(key).await?);
    }

    let binding = CacheRefreshBinding::new(cache.clone()).depends_on(
        contract.clone(),
        function,
        keys.clone(),
    );
    let coordinator = WriteCoordinator::new(node.clone(), Arc::new(binding), timeout);

    let status = coordinator
        .submit(Operation::new(sender, contract, function, args))
        .await?;
    println!("status: {status}");

    if let LifecycleStatus::AwaitingConfirmation { handle } = &status {
        println!("tx hash: {handle}");
        let status = coordinator.observe().await?;
        println!("status: {status}");
    }

    for key in &keys {
        print_snapshot(key, &cache.get(key).await?);
    }
    Ok(())
}

fn print_snapshot(key: &QueryKey, snapshot: &QuerySnapshot) {
    let value = match &snapshot.value {
        Some(values) => values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        None => "<never fetched>".to_string(),
    };
    match (&snapshot.fetched_at, &snapshot.last_error) {
        (Some(at), None) => println!("{key} = {value}  (fetched {at})"),
        (Some(at), Some(err)) => {
            println!("{key} = {value}  (stale, fetched {at}; last refresh failed: {err})")
        }
        (None, Some(err)) => println!("{key} = {value}  (refresh failed: {err})"),
        (None, None) => println!("{key} = {value}"),
    }
}
