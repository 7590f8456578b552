use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use super::{PaymasterCommand, ctrl_c_signal, load_config, open_journal, print_json};
use crate::config::Config;
use crate::heartbeat::{FinalitySweep, HeartbeatContext};
use crate::identity::{AgentId, IdentityRegistry};
use crate::paymaster::{PaymasterClient, check_sponsorship_eligibility};
use crate::starknet::{Felt, JsonRpcClient, StarknetRpc};
use crate::tx_status::{fetch_tx_status, poll_tx_status};

fn rpc_client(config: &Config) -> JsonRpcClient {
    JsonRpcClient::new(config.network.rpc_url.clone(), config.network.rpc_timeout)
}

pub(super) async fn identity(config: &Config, raw_id: &str) -> anyhow::Result<()> {
    let agent_id: AgentId = raw_id
        .parse()
        .with_context(|| format!("invalid agent id '{raw_id}'"))?;
    let registry_address = config.identity.require_registry()?;
    let registry = IdentityRegistry::new(Arc::new(rpc_client(config)), registry_address);

    let (state, total) = tokio::join!(
        registry.lookup_agent_identity(agent_id),
        registry.total_agents(),
    );
    print_json(&json!({
        "agentId": agent_id.to_string(),
        "registry": registry_address.to_fixed_hex(),
        "totalAgents": total.to_string(),
        "state": state,
    }))
}

pub(super) async fn tx_status(
    config: &Config,
    raw_hash: &str,
    wait: bool,
    interval_secs: u64,
    max_attempts: u32,
) -> anyhow::Result<()> {
    let hash = Felt::from_hex(raw_hash).with_context(|| format!("invalid tx hash '{raw_hash}'"))?;
    let (signal, ctrl_c) = ctrl_c_signal();
    let rpc = rpc_client(config).with_cancel(signal.clone());

    let result = if wait {
        poll_tx_status(
            &rpc,
            &hash,
            Duration::from_secs(interval_secs),
            max_attempts,
            Some(&signal),
        )
        .await?
    } else {
        fetch_tx_status(&rpc, &hash).await
    };
    ctrl_c.abort();

    if result.finalized {
        let journal = open_journal(config);
        if let Some(record) = journal.record_finality(&hash, &result).await? {
            tracing::info!(id = %record.id, "journal updated with settled status");
        }
    }
    print_json(&result)
}

pub(super) async fn paymaster(
    config_path: Option<PathBuf>,
    command: PaymasterCommand,
) -> anyhow::Result<()> {
    match command {
        PaymasterCommand::Status => {
            let config = load_config(config_path)?;
            let client = PaymasterClient::new(config.paymaster.client_settings());
            let available = client.is_available(None).await;
            print_json(&json!({
                "baseUrl": client.base_url(),
                "available": available,
            }))
        }
        PaymasterCommand::Check { kind, entrypoints } => {
            print_json(&check_sponsorship_eligibility(&kind, &entrypoints))
        }
    }
}

pub(super) async fn watch(config: &Config, interval: Option<Duration>) -> anyhow::Result<()> {
    if !config.heartbeat.enabled {
        anyhow::bail!("heartbeat is disabled; set HEARTBEAT_ENABLED=true to run routines");
    }
    let interval = interval.unwrap_or(config.heartbeat.interval);
    if interval.is_zero() {
        anyhow::bail!("interval must be at least one second");
    }

    let journal = Arc::new(open_journal(config));
    let rpc: Arc<dyn StarknetRpc> = Arc::new(rpc_client(config));
    let mut heartbeat = HeartbeatContext::new(interval);
    heartbeat.register(Arc::new(FinalitySweep::new(journal, rpc)));

    let (mut signal, ctrl_c) = ctrl_c_signal();
    heartbeat.start();
    println!(
        "Watching ({}) every {}s, Ctrl-C to stop",
        heartbeat.routine_names().join(", "),
        interval.as_secs()
    );
    signal.cancelled().await;
    heartbeat.stop().await;
    ctrl_c.abort();
    Ok(())
}
