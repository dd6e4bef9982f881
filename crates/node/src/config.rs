use std::{collections::HashMap, fs};

/// Well-known dev accounts, funded at startup. The first one deploys and
/// owns the demo contracts; the second plays the attacker in the access
/// control scenario.
pub const DEV_ACCOUNTS: [&str; 2] = [
    "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
    "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
];

#[derive(Debug, Clone)]
pub struct Settings {
    pub node_bind: String,
    pub seal_latency_ms: u64,
    pub vault_funding: u128,
    pub account_funding: u128,
    pub dev_accounts: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_bind: "127.0.0.1:8545".into(),
            seal_latency_ms: 500,
            vault_funding: 1_000_000,
            account_funding: 10_000,
            dev_accounts: DEV_ACCOUNTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("node.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("NODE_BIND") {
        settings.node_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.node_bind = v;
    }
    if let Ok(v) = std::env::var("APP__SEAL_LATENCY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.seal_latency_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__VAULT_FUNDING") {
        if let Ok(parsed) = v.parse::<u128>() {
            settings.vault_funding = parsed;
        }
    }
    if let Ok(v) = std::env::var("APP__ACCOUNT_FUNDING") {
        if let Ok(parsed) = v.parse::<u128>() {
            settings.account_funding = parsed;
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr").and_then(|v| v.as_str()) {
        settings.node_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("seal_latency_ms").and_then(|v| v.as_integer()) {
        if v >= 0 {
            settings.seal_latency_ms = v as u64;
        }
    }
    if let Some(v) = file_cfg.get("vault_funding").and_then(|v| v.as_integer()) {
        if v >= 0 {
            settings.vault_funding = v as u128;
        }
    }
    if let Some(v) = file_cfg.get("account_funding").and_then(|v| v.as_integer()) {
        if v >= 0 {
            settings.account_funding = v as u128;
        }
    }
    if let Some(values) = file_cfg.get("dev_accounts").and_then(|v| v.as_array()) {
        let accounts: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if !accounts.is_empty() {
            settings.dev_accounts = accounts;
        }
    }
}
