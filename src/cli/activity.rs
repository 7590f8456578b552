use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use super::{ActivityCommand, ctrl_c_signal, open_journal, print_json};
use crate::activity::{AuditAccount, NewActivity, build_audit_bundle};
use crate::config::Config;
use crate::error::Error;
use crate::execution::{
    Action, ActionOrchestrator, ExecutionRequest, HttpSigningService, MobileActionId, SignerMode,
};

pub(super) async fn execute(
    config: &Config,
    action_path: &Path,
    mobile_action_id: Option<&str>,
    session_targets: Option<Vec<String>>,
    sponsored: bool,
) -> anyhow::Result<()> {
    if config.signer.mode != SignerMode::Remote {
        anyhow::bail!("the CLI can only execute through the remote signer; set SIGNER_MODE=remote");
    }
    let (Some(base_url), Some(requester)) = (&config.signer.base_url, &config.signer.requester)
    else {
        anyhow::bail!("remote signer is missing SIGNER_BASE_URL or SIGNER_REQUESTER");
    };

    let raw = std::fs::read_to_string(action_path)
        .with_context(|| format!("failed to read {}", action_path.display()))?;
    let action: Action = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a prepared action", action_path.display()))?;
    let mobile_action_id = match mobile_action_id {
        Some(raw) => MobileActionId::parse(raw)?,
        None => MobileActionId::generate(),
    };

    let service = Arc::new(HttpSigningService::new(base_url.clone(), config.signer.timeout));
    let orchestrator = ActionOrchestrator::new().with_remote_signer(service, requester.clone());

    let mut request = ExecutionRequest::new(&action, mobile_action_id, SignerMode::Remote);
    if let Some(slots) = session_targets {
        request = request.with_session_targets(slots);
    }
    if sponsored {
        request = request.with_sponsorship();
    }

    let (signal, ctrl_c) = ctrl_c_signal();
    let result = orchestrator.execute(request, Some(&signal)).await;
    ctrl_c.abort();

    let journal = open_journal(config);
    match result {
        Ok(outcome) => {
            journal
                .append_activity(NewActivity::from_outcome(&action, &outcome))
                .await?;
            print_json(&outcome)
        }
        Err(err) => {
            if let Some(entry) = NewActivity::from_execution_error(&action, SignerMode::Remote, &err)
            {
                journal.append_activity(entry).await?;
            }
            let err = Error::from(err);
            print_json(&err.to_surface())?;
            Err(err.into())
        }
    }
}

pub(super) async fn run(config: &Config, command: ActivityCommand) -> anyhow::Result<()> {
    let journal = open_journal(config);
    match command {
        ActivityCommand::List { limit, json } => {
            let mut records = journal.list_activity().await?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            if json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!("No activity recorded.");
            }
            for record in records {
                println!(
                    "{}  {:<9}  {:<20}  {}  {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.status.as_str(),
                    record.kind,
                    record.tx_hash.as_deref().unwrap_or("-"),
                    record.summary,
                );
            }
            Ok(())
        }
        ActivityCommand::Export { out } => {
            let account = AuditAccount {
                address: config.network.account_address.map(|a| a.to_fixed_hex()),
                network: config.network.network,
            };
            let bundle =
                build_audit_bundle(&journal, config.signer.mode.as_str(), account).await?;
            let rendered = serde_json::to_string_pretty(&bundle)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Exported {} records to {}", bundle.activity.len(), path.display());
                }
                None => println!("{rendered}"),
            }
            Ok(())
        }
    }
}
