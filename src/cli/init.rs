//! `starkclaw init` - write the config file and bootstrap secrets.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::bootstrap;
use crate::config::parse_network;
use crate::settings::{Settings, normalize_llm_backend};
use crate::starknet::Felt;

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// mainnet or sepolia
    #[arg(long)]
    pub network: Option<String>,

    /// Starknet JSON-RPC endpoint
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Account contract address
    #[arg(long)]
    pub account: Option<String>,

    /// Identity registry contract address
    #[arg(long)]
    pub registry: Option<String>,

    /// Paymaster service URL
    #[arg(long)]
    pub paymaster_url: Option<String>,

    /// Remote signing service URL; switches the signer to remote mode
    #[arg(long)]
    pub signer_url: Option<String>,

    /// Requester tag for the remote signer
    #[arg(long)]
    pub signer_requester: Option<String>,

    /// openai_compatible or anthropic
    #[arg(long)]
    pub llm_backend: Option<String>,

    /// Paymaster API key, stored in ~/.starkclaw/.env
    #[arg(long, env = "PAYMASTER_API_KEY", hide_env_values = true)]
    pub paymaster_api_key: Option<String>,

    /// LLM API key, stored in ~/.starkclaw/.env
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

pub(super) fn run(config_path: Option<PathBuf>, args: InitArgs) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(Settings::default_toml_path);
    let mut settings = Settings::load_toml(&path)
        .map_err(anyhow::Error::msg)?
        .unwrap_or_default();

    apply(&mut settings, &args)?;
    settings.save_toml(&path).map_err(anyhow::Error::msg)?;
    println!("Wrote {}", path.display());

    let mut secrets = Vec::new();
    if let Some(key) = args.paymaster_api_key.as_deref() {
        secrets.push(("PAYMASTER_API_KEY", key));
    }
    if let Some(key) = args.llm_api_key.as_deref() {
        secrets.push(("LLM_API_KEY", key));
    }
    if !secrets.is_empty() {
        bootstrap::save_bootstrap_env(&secrets).context("failed to write bootstrap env")?;
        println!(
            "Stored {} secret(s) in {}",
            secrets.len(),
            bootstrap::starkclaw_env_path().display()
        );
    }
    Ok(())
}

/// Validate and fold the flags into `settings`.
fn apply(settings: &mut Settings, args: &InitArgs) -> anyhow::Result<()> {
    if let Some(network) = &args.network {
        settings.network.network = parse_network(network, "--network")?.as_str().to_string();
    }
    if let Some(url) = &args.rpc_url {
        settings.network.rpc_url = Some(checked_url(url, "--rpc-url")?);
    }
    if let Some(account) = &args.account {
        settings.network.account_address = Some(checked_address(account, "--account")?);
    }
    if let Some(registry) = &args.registry {
        settings.identity.registry_address = Some(checked_address(registry, "--registry")?);
    }
    if let Some(url) = &args.paymaster_url {
        settings.paymaster.base_url = Some(checked_url(url, "--paymaster-url")?);
    }
    if let Some(url) = &args.signer_url {
        settings.signer.base_url = Some(checked_url(url, "--signer-url")?);
        settings.signer.mode = "remote".to_string();
    }
    if let Some(requester) = &args.signer_requester {
        settings.signer.requester = Some(requester.trim().to_string());
    }
    if settings.signer.mode == "remote" && settings.signer.requester.is_none() {
        anyhow::bail!("remote signer mode needs --signer-requester");
    }
    if let Some(backend) = &args.llm_backend {
        let normalized = normalize_llm_backend(backend)
            .with_context(|| format!("unsupported LLM backend '{backend}'"))?;
        settings.llm.backend = Some(normalized);
    }
    Ok(())
}

fn checked_url(raw: &str, flag: &str) -> anyhow::Result<String> {
    url::Url::parse(raw).with_context(|| format!("{flag}: invalid URL '{raw}'"))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn checked_address(raw: &str, flag: &str) -> anyhow::Result<String> {
    let felt = Felt::from_hex(raw).with_context(|| format!("{flag}: invalid address '{raw}'"))?;
    Ok(felt.to_fixed_hex())
}
