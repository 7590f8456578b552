//! Append-only activity journal.
//!
//! Records are stored as one JSON array under a single store key and read
//! back newest first. Correlation fields keep three states: absent on legacy
//! records, explicit `null` for local-signer entries, and a value for
//! remote-signer entries.
//!
//! The journal assumes a single writer process. Concurrent writers from
//! several processes need external locking.

pub mod audit;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ExecutionError, JournalError};
use crate::execution::{Action, ExecutionOutcome, SignerMode};
use crate::sanitize::scrub_revert_reason;
use crate::starknet::Felt;
use crate::store::SecureStore;
use crate::tx_status::{EXECUTION_REVERTED, EXECUTION_SUCCEEDED, TxOutcome, TxStatusResult};

pub use self::audit::{AUDIT_SCHEMA_VERSION, AuditAccount, AuditBundle, build_audit_bundle};

/// Store key holding the serialized journal.
pub const JOURNAL_KEY: &str = "starkclaw.activity.v1";

/// Optional field that remembers whether it was ever written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Correlated<T> {
    /// Field never existed on the stored record.
    #[default]
    Absent,
    /// Field present and explicitly `null`.
    Null,
    Value(T),
}

impl<T> Correlated<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }

    /// `Some` becomes a value, `None` an explicit null.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }
}

impl<T: Serialize> Serialize for Correlated<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_some(v),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Correlated<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only reached when the field is present; missing fields use Default.
        Ok(Self::from_option(Option::<T>::deserialize(deserializer)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    Succeeded,
    Reverted,
}

impl ActivityStatus {
    /// Status implied by a raw execution status, pending when unsettled.
    pub fn from_execution_status(execution_status: Option<&str>) -> Self {
        match execution_status.map(str::trim) {
            Some(EXECUTION_SUCCEEDED) => Self::Succeeded,
            Some(EXECUTION_REVERTED) => Self::Reverted,
            _ => Self::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Reverted => "reverted",
        }
    }
}

/// One persisted journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Correlated::is_absent")]
    pub mobile_action_id: Correlated<String>,
    #[serde(default, skip_serializing_if = "Correlated::is_absent")]
    pub signer_request_id: Correlated<String>,
}

impl ActivityRecord {
    fn matches_tx(&self, tx_hash: &str) -> bool {
        let Some(own) = self.tx_hash.as_deref() else {
            return false;
        };
        match (Felt::from_hex(own), Felt::from_hex(tx_hash)) {
            (Ok(a), Ok(b)) => a == b,
            _ => own.eq_ignore_ascii_case(tx_hash.trim()),
        }
    }
}

/// Fields for a new entry; the journal assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub kind: String,
    pub summary: String,
    pub tx_hash: Option<String>,
    pub status: ActivityStatus,
    pub execution_status: Option<String>,
    pub revert_reason: Option<String>,
    pub mobile_action_id: Correlated<String>,
    pub signer_request_id: Correlated<String>,
}

impl NewActivity {
    pub fn new(kind: impl Into<String>, summary: impl Into<String>, status: ActivityStatus) -> Self {
        Self {
            kind: kind.into(),
            summary: summary.into(),
            tx_hash: None,
            status,
            execution_status: None,
            revert_reason: None,
            mobile_action_id: Correlated::Absent,
            signer_request_id: Correlated::Absent,
        }
    }

    /// Entry for a broadcast action.
    pub fn from_outcome(action: &Action, outcome: &ExecutionOutcome) -> Self {
        Self {
            kind: action.kind.as_str().to_string(),
            summary: action.summary(),
            tx_hash: outcome.tx_hash.map(|h| h.to_hex()),
            status: ActivityStatus::from_execution_status(outcome.execution_status.as_deref()),
            execution_status: outcome.execution_status.clone(),
            revert_reason: outcome.revert_reason.clone(),
            mobile_action_id: Correlated::Value(outcome.mobile_action_id.to_string()),
            signer_request_id: signer_request_field(
                outcome.signer_mode,
                outcome.signer_request_id.clone(),
            ),
        }
    }

    /// Entry for a failed attempt. `None` when the failure happened before a
    /// correlation chain existed.
    pub fn from_execution_error(
        action: &Action,
        mode: SignerMode,
        error: &ExecutionError,
    ) -> Option<Self> {
        let chain = error.correlation()?;
        Some(Self {
            kind: action.kind.as_str().to_string(),
            summary: action.summary(),
            tx_hash: chain.tx_hash.map(|h| h.to_hex()),
            status: ActivityStatus::Reverted,
            execution_status: None,
            revert_reason: Some(error.to_string()),
            mobile_action_id: Correlated::Value(chain.mobile_action_id.to_string()),
            signer_request_id: signer_request_field(mode, chain.signer_request_id.clone()),
        })
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }
}

fn signer_request_field(mode: SignerMode, id: Option<String>) -> Correlated<String> {
    match mode {
        SignerMode::Local => Correlated::Null,
        SignerMode::Remote => Correlated::from_option(id),
    }
}

/// Activity journal over a [`SecureStore`].
pub struct ActivityJournal {
    store: Arc<dyn SecureStore>,
    write_lock: Mutex<()>,
}

impl ActivityJournal {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<ActivityRecord>, JournalError> {
        match self.store.get(JOURNAL_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Append one entry. The revert reason is scrubbed before it is stored.
    pub async fn append_activity(&self, entry: NewActivity) -> Result<ActivityRecord, JournalError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let record = ActivityRecord {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            kind: entry.kind,
            summary: entry.summary,
            tx_hash: entry.tx_hash.filter(|h| !h.trim().is_empty()),
            status: entry.status,
            execution_status: entry.execution_status,
            revert_reason: entry.revert_reason.as_deref().map(scrub_revert_reason),
            mobile_action_id: entry.mobile_action_id,
            signer_request_id: entry.signer_request_id,
        };
        records.push(record.clone());
        self.store
            .set(JOURNAL_KEY, &serde_json::to_string(&records)?)
            .await?;

        tracing::info!(
            id = %record.id,
            kind = %record.kind,
            status = record.status.as_str(),
            tx_hash = record.tx_hash.as_deref().unwrap_or("-"),
            mobile_action_id = record.mobile_action_id.value().map(String::as_str).unwrap_or("-"),
            signer_request_id = record.signer_request_id.value().map(String::as_str).unwrap_or("-"),
            "activity recorded"
        );
        Ok(record)
    }

    /// Every record, newest first.
    pub async fn list_activity(&self) -> Result<Vec<ActivityRecord>, JournalError> {
        let mut records = self.load().await?;
        records.reverse();
        // Stable sort keeps append order for equal timestamps.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Most recent record for a transaction hash.
    pub async fn latest_for_tx(&self, tx_hash: &str) -> Result<Option<ActivityRecord>, JournalError> {
        Ok(self
            .list_activity()
            .await?
            .into_iter()
            .find(|r| r.matches_tx(tx_hash)))
    }

    /// Hashes whose most recent record is still pending, newest first.
    pub async fn pending_transactions(&self) -> Result<Vec<Felt>, JournalError> {
        let mut seen: Vec<Felt> = Vec::new();
        let mut pending = Vec::new();
        for record in self.list_activity().await? {
            let Some(hash) = record.tx_hash.as_deref().and_then(|h| Felt::from_hex(h).ok()) else {
                continue;
            };
            if seen.contains(&hash) {
                continue;
            }
            seen.push(hash);
            if record.status == ActivityStatus::Pending {
                pending.push(hash);
            }
        }
        Ok(pending)
    }

    /// Append a follow-up record once a tracked transaction settles.
    ///
    /// Earlier records stay untouched. Returns `None` when the result is not
    /// settled, the outcome is unknown, the hash was never journaled, or the
    /// latest record already carries the same status.
    pub async fn record_finality(
        &self,
        tx_hash: &Felt,
        result: &TxStatusResult,
    ) -> Result<Option<ActivityRecord>, JournalError> {
        if !result.finalized {
            return Ok(None);
        }
        let status = match result.status {
            Some(TxOutcome::Succeeded) => ActivityStatus::Succeeded,
            Some(TxOutcome::Reverted) => ActivityStatus::Reverted,
            Some(TxOutcome::Unknown) | None => return Ok(None),
        };
        let hash = tx_hash.to_hex();
        let Some(previous) = self.latest_for_tx(&hash).await? else {
            tracing::debug!(tx_hash = %hash, "finality for untracked transaction ignored");
            return Ok(None);
        };
        if previous.status == status {
            return Ok(None);
        }

        let entry = NewActivity {
            kind: previous.kind,
            summary: previous.summary,
            tx_hash: Some(hash),
            status,
            execution_status: result.execution_status.clone(),
            revert_reason: result.revert_reason.clone(),
            mobile_action_id: previous.mobile_action_id,
            signer_request_id: previous.signer_request_id,
        };
        self.append_activity(entry).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::MemoryStore;

    fn journal() -> (Arc<MemoryStore>, ActivityJournal) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ActivityJournal::new(store))
    }

    #[test]
    fn correlated_round_trips_all_three_states() {
        let record: ActivityRecord = serde_json::from_str(
            r#"{"id":"a","createdAt":"2025-01-01T00:00:00Z","kind":"transfer","summary":"s",
                "status":"pending","signerRequestId":null}"#,
        )
        .unwrap();
        assert_eq!(record.mobile_action_id, Correlated::Absent);
        assert_eq!(record.signer_request_id, Correlated::Null);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("mobileActionId").is_none());
        assert!(json["signerRequestId"].is_null());
        assert!(json.as_object().unwrap().contains_key("signerRequestId"));
        assert!(json.get("txHash").is_none());
    }

    #[tokio::test]
    async fn append_without_tx_hash_never_invents_one() {
        let (_, journal) = journal();
        let record = journal
            .append_activity(NewActivity::new("transfer", "Send 1 ETH", ActivityStatus::Reverted))
            .await
            .unwrap();
        assert_eq!(record.tx_hash, None);

        let listed = journal.list_activity().await.unwrap();
        assert_eq!(listed[0].tx_hash, None);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (_, journal) = journal();
        for summary in ["first", "second", "third"] {
            journal
                .append_activity(NewActivity::new("transfer", summary, ActivityStatus::Pending))
                .await
                .unwrap();
        }
        let summaries: Vec<String> = journal
            .list_activity()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.summary)
            .collect();
        assert_eq!(summaries, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn legacy_records_keep_absent_correlation_fields() {
        let (store, journal) = journal();
        store
            .set(
                JOURNAL_KEY,
                r#"[{"id":"legacy","createdAt":"2024-06-01T00:00:00Z","kind":"transfer",
                     "summary":"old","txHash":"0xabc","status":"succeeded"}]"#,
            )
            .await
            .unwrap();

        let mut local = NewActivity::new("transfer", "new", ActivityStatus::Pending);
        local.mobile_action_id = Correlated::Value("mact_1".into());
        local.signer_request_id = Correlated::Null;
        journal.append_activity(local).await.unwrap();

        let listed = journal.list_activity().await.unwrap();
        assert_eq!(listed[0].signer_request_id, Correlated::Null);
        assert_eq!(listed[1].id, "legacy");
        assert_eq!(listed[1].mobile_action_id, Correlated::Absent);
        assert_eq!(listed[1].signer_request_id, Correlated::Absent);
    }

    #[tokio::test]
    async fn revert_reasons_are_scrubbed_on_append() {
        let (_, journal) = journal();
        let mut entry = NewActivity::new("swap", "swap", ActivityStatus::Reverted);
        entry.revert_reason = Some(format!("fail at 0x{}\n{}", "f".repeat(40), "y".repeat(300)));
        let record = journal.append_activity(entry).await.unwrap();
        let reason = record.revert_reason.unwrap();
        assert!(reason.chars().count() <= 200);
        assert!(!reason.contains("ffffffffff"));
    }

    #[tokio::test]
    async fn finality_appends_follow_up_record() {
        let (_, journal) = journal();
        let hash = Felt::from(0xbeefu64);
        let mut entry = NewActivity::new("transfer", "Send", ActivityStatus::Pending)
            .with_tx_hash(hash.to_fixed_hex());
        entry.mobile_action_id = Correlated::Value("mact_2".into());
        entry.signer_request_id = Correlated::Value("req-2".into());
        journal.append_activity(entry).await.unwrap();
        assert_eq!(journal.pending_transactions().await.unwrap(), vec![hash]);

        let settled = TxStatusResult {
            finalized: true,
            status: Some(TxOutcome::Succeeded),
            execution_status: Some("SUCCEEDED".into()),
            finality_status: Some("ACCEPTED_ON_L2".into()),
            revert_reason: None,
        };
        let follow_up = journal.record_finality(&hash, &settled).await.unwrap().unwrap();
        assert_eq!(follow_up.status, ActivityStatus::Succeeded);
        assert_eq!(follow_up.signer_request_id, Correlated::Value("req-2".into()));

        assert!(journal.record_finality(&hash, &settled).await.unwrap().is_none());
        assert_eq!(journal.list_activity().await.unwrap().len(), 2);
        let latest = journal.latest_for_tx("0xbeef").await.unwrap().unwrap();
        assert_eq!(latest.status, ActivityStatus::Succeeded);
        assert!(journal.pending_transactions().await.unwrap().is_empty());
    }
}
