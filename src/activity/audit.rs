//! Audit export bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityJournal, ActivityRecord};
use crate::error::JournalError;
use crate::starknet::Network;

pub const AUDIT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAccount {
    pub address: Option<String>,
    pub network: Network,
}

/// Exported journal snapshot. Correlation fields pass through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBundle {
    pub schema_version: u32,
    pub app_version: String,
    pub exported_at: DateTime<Utc>,
    pub mode: String,
    pub account: AuditAccount,
    pub activity: Vec<ActivityRecord>,
}

/// Assemble a bundle from the full journal, newest first.
pub async fn build_audit_bundle(
    journal: &ActivityJournal,
    mode: &str,
    account: AuditAccount,
) -> Result<AuditBundle, JournalError> {
    let activity = journal.list_activity().await?;
    tracing::info!(records = activity.len(), mode, "audit bundle built");
    Ok(AuditBundle {
        schema_version: AUDIT_SCHEMA_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        exported_at: Utc::now(),
        mode: mode.to_string(),
        account,
        activity,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::activity::{ActivityStatus, Correlated, NewActivity};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn bundle_preserves_explicit_nulls_and_absent_fields() {
        let journal = ActivityJournal::new(Arc::new(MemoryStore::new()));
        let mut local = NewActivity::new("transfer", "local", ActivityStatus::Pending);
        local.mobile_action_id = Correlated::Value("mact_a".into());
        local.signer_request_id = Correlated::Null;
        journal.append_activity(local).await.unwrap();
        journal
            .append_activity(NewActivity::new("transfer", "legacy-like", ActivityStatus::Pending))
            .await
            .unwrap();

        let bundle = build_audit_bundle(
            &journal,
            "local",
            AuditAccount {
                address: Some("0x1".into()),
                network: Network::Sepolia,
            },
        )
        .await
        .unwrap();
        assert_eq!(bundle.schema_version, AUDIT_SCHEMA_VERSION);
        assert_eq!(bundle.app_version, env!("CARGO_PKG_VERSION"));

        let json = serde_json::to_value(&bundle).unwrap();
        let activity = json["activity"].as_array().unwrap();
        assert_eq!(activity.len(), 2);
        assert!(activity[0].get("signerRequestId").is_none());
        assert!(activity[1]["signerRequestId"].is_null());
        assert!(activity[1].as_object().unwrap().contains_key("signerRequestId"));
        assert_eq!(activity[1]["mobileActionId"], "mact_a");
        assert_eq!(json["account"]["network"], "sepolia");
    }
}
