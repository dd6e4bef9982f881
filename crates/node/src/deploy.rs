use anyhow::{bail, Context};
use contracts::{BalanceRegistry, Counter, Crud, Reputation, Vault, Variant};
use ledger::Ledger;
use shared::domain::Address;
use tracing::info;

use crate::config::Settings;

/// Funds the dev accounts and deploys the demo contract set, mirroring the
/// original deployment script: the secure CRUD store plus a
/// vulnerable/fixed pair per scenario. The first dev account owns every
/// owned contract.
pub(crate) async fn deploy_demo_contracts(
    ledger: &Ledger,
    settings: &Settings,
) -> anyhow::Result<()> {
    let Some(first) = settings.dev_accounts.first() else {
        bail!("at least one dev account is required to own the demo contracts");
    };
    let deployer =
        Address::parse(first.as_str()).context("dev account is not a valid address")?;

    for raw in &settings.dev_accounts {
        let account =
            Address::parse(raw.as_str()).context("dev account is not a valid address")?;
        ledger
            .fund_account(&account, settings.account_funding)
            .await;
    }

    ledger.deploy("Crud", Box::new(Crud::new()), 0).await;
    for variant in [Variant::Vulnerable, Variant::Fixed] {
        ledger
            .deploy(
                format!("Vault{}", variant.suffix()),
                Box::new(Vault::new(variant, deployer.clone())),
                settings.vault_funding,
            )
            .await;
        ledger
            .deploy(
                format!("BalanceRegistry{}", variant.suffix()),
                Box::new(BalanceRegistry::new(variant, deployer.clone())),
                0,
            )
            .await;
        ledger
            .deploy(
                format!("Reputation{}", variant.suffix()),
                Box::new(Reputation::new(variant)),
                0,
            )
            .await;
        ledger
            .deploy(
                format!("Counter{}", variant.suffix()),
                Box::new(Counter::new(variant)),
                0,
            )
            .await;
    }

    let deployed = ledger.contracts().await;
    info!(count = deployed.len(), deployer = %deployer, "demo contract set deployed");
    Ok(())
}
