//! Remote-signer execution end to end: orchestrator, HTTP signing service,
//! activity journal and audit export, against a real Axum signer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use chrono::Utc;
use serde_json::{Value, json};

use starkclaw::activity::{
    ActivityJournal, ActivityStatus, AuditAccount, Correlated, JOURNAL_KEY, NewActivity,
    build_audit_bundle,
};
use starkclaw::error::{ExecutionError, SignerError};
use starkclaw::execution::{
    Action, ActionOrchestrator, ExecutionRequest, HttpSigningService, MobileActionId, SignerMode,
};
use starkclaw::starknet::{Felt, Network};
use starkclaw::store::{FileStore, SecureStore};

fn is_bind_permission_error<E: std::fmt::Display>(err: &E) -> bool {
    err.to_string().contains("Operation not permitted")
        || err.to_string().contains("failed to bind")
}

async fn serve(router: Router) -> Option<String> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if is_bind_permission_error(&e) => return None,
        Err(e) => panic!("Failed to bind test server: {e:?}"),
    };
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Some(format!("http://{addr}"))
}

fn transfer_action() -> Action {
    let valid_until = Utc::now() + chrono::Duration::hours(1);
    serde_json::from_value(json!({
        "kind": "transfer",
        "token": {
            "symbol": "ETH",
            "address": "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7",
            "decimals": 18
        },
        "amount": {"display": "0.5", "baseUnits": "500000000000000000"},
        "target": "0x456",
        "calls": [{
            "contractAddress": "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7",
            "entrypoint": "transfer",
            "calldata": ["0x456", "0x6f05b59d3b20000", "0x0"]
        }],
        "policy": {"spendingLimit": "1", "validUntil": valid_until},
    }))
    .expect("valid action json")
}

fn orchestrator(base_url: &str) -> ActionOrchestrator {
    let service = Arc::new(HttpSigningService::new(base_url, Duration::from_secs(2)));
    ActionOrchestrator::new().with_remote_signer(service, "mobile")
}

#[tokio::test]
async fn rejected_remote_execution_is_journaled_with_correlation() {
    let router = Router::new().route(
        "/v1/actions/execute",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["requester"], "mobile");
            assert!(body["mobileActionId"].as_str().unwrap().starts_with("mact_"));
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"signerRequestId": "req-1", "error": "Insufficient balance"})),
            )
        }),
    );
    let Some(base) = serve(router).await else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("store.json")));
    let journal = ActivityJournal::new(store.clone());
    let action = transfer_action();
    let mobile_action_id = MobileActionId::generate();

    let err = orchestrator(&base)
        .execute(
            ExecutionRequest::new(&action, mobile_action_id.clone(), SignerMode::Remote),
            None,
        )
        .await
        .unwrap_err();

    match &err {
        ExecutionError::Signer { chain, source } => {
            assert_eq!(chain.mobile_action_id, mobile_action_id);
            assert_eq!(chain.signer_request_id.as_deref(), Some("req-1"));
            assert_eq!(chain.tx_hash, None);
            match source {
                SignerError::Rejected { status, reason } => {
                    assert_eq!(*status, 400);
                    assert_eq!(reason, "Insufficient balance");
                }
                other => panic!("unexpected signer error: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let entry = NewActivity::from_execution_error(&action, SignerMode::Remote, &err)
        .expect("failure carries a correlation chain");
    journal.append_activity(entry).await.unwrap();

    let records = journal.list_activity().await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, ActivityStatus::Reverted);
    assert_eq!(record.tx_hash, None);
    assert_eq!(
        record.mobile_action_id,
        Correlated::Value(mobile_action_id.to_string())
    );
    assert_eq!(record.signer_request_id, Correlated::Value("req-1".to_string()));
    assert!(record.revert_reason.as_deref().unwrap().contains("Insufficient balance"));

    let raw = store.get(JOURNAL_KEY).await.unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert!(stored[0].get("txHash").is_none());
    assert_eq!(stored[0]["signerRequestId"], "req-1");
}

#[tokio::test]
async fn accepted_but_unbroadcast_action_is_journaled_without_tx_hash() {
    let router = Router::new().route(
        "/v1/actions/execute",
        post(|| async {
            Json(json!({
                "signerRequestId": "req-1",
                "txHash": null,
                "revertReason": "Insufficient balance"
            }))
        }),
    );
    let Some(base) = serve(router).await else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("store.json")));
    let journal = ActivityJournal::new(store.clone());
    let action = transfer_action();
    let mobile_action_id = MobileActionId::generate();

    let err = orchestrator(&base)
        .execute(
            ExecutionRequest::new(&action, mobile_action_id.clone(), SignerMode::Remote),
            None,
        )
        .await
        .unwrap_err();
    match &err {
        ExecutionError::Signer {
            source: SignerError::NotBroadcast { reason },
            ..
        } => assert_eq!(reason, "Insufficient balance"),
        other => panic!("unexpected error: {other:?}"),
    }

    let entry = NewActivity::from_execution_error(&action, SignerMode::Remote, &err)
        .expect("failure carries a correlation chain");
    journal.append_activity(entry).await.unwrap();

    let records = journal.list_activity().await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.tx_hash, None);
    assert_eq!(record.status, ActivityStatus::Reverted);
    assert_eq!(
        record.mobile_action_id,
        Correlated::Value(mobile_action_id.to_string())
    );
    assert_eq!(record.signer_request_id, Correlated::Value("req-1".to_string()));
    assert!(record.revert_reason.as_deref().unwrap().contains("Insufficient balance"));

    let raw = store.get(JOURNAL_KEY).await.unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert!(stored[0].get("txHash").is_none());
    assert_eq!(stored[0]["mobileActionId"], mobile_action_id.to_string());
    assert_eq!(stored[0]["signerRequestId"], "req-1");
}

#[tokio::test]
async fn successful_remote_execution_round_trips_through_audit_export() {
    let router = Router::new().route(
        "/v1/actions/execute",
        post(|| async {
            Json(json!({
                "signerRequestId": "req-2",
                "txHash": "0xabc",
                "executionStatus": "SUCCEEDED"
            }))
        }),
    );
    let Some(base) = serve(router).await else {
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("store.json")));
    // A record written before correlation ids existed.
    store
        .set(
            JOURNAL_KEY,
            r#"[{"id":"legacy","createdAt":"2024-06-01T00:00:00Z","kind":"transfer",
                 "summary":"old","txHash":"0x1","status":"succeeded"}]"#,
        )
        .await
        .unwrap();
    let journal = ActivityJournal::new(store);
    let action = transfer_action();

    let outcome = orchestrator(&base)
        .execute(
            ExecutionRequest::new(&action, MobileActionId::generate(), SignerMode::Remote)
                .with_sponsorship(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.tx_hash, Some(Felt::from(0xabcu64)));
    assert_eq!(outcome.signer_request_id.as_deref(), Some("req-2"));

    journal
        .append_activity(NewActivity::from_outcome(&action, &outcome))
        .await
        .unwrap();

    let bundle = build_audit_bundle(
        &journal,
        "remote",
        AuditAccount {
            address: Some("0x1234".to_string()),
            network: Network::Sepolia,
        },
    )
    .await
    .unwrap();
    assert_eq!(bundle.activity.len(), 2);
    assert_eq!(bundle.activity[0].status, ActivityStatus::Succeeded);

    let json = serde_json::to_value(&bundle).unwrap();
    assert_eq!(json["schemaVersion"], 1);
    assert_eq!(json["account"]["network"], "sepolia");
    assert_eq!(json["activity"][0]["signerRequestId"], "req-2");
    let legacy = &json["activity"][1];
    assert_eq!(legacy["id"], "legacy");
    assert!(legacy.get("mobileActionId").is_none());
    assert!(legacy.get("signerRequestId").is_none());
}

#[tokio::test]
async fn policy_denial_never_reaches_the_signer() {
    // Nothing listens here; a network call would fail with a connection error.
    let mut action = transfer_action();
    action.policy.valid_until = Utc::now() - chrono::Duration::minutes(1);

    let err = orchestrator("http://127.0.0.1:9")
        .execute(
            ExecutionRequest::new(&action, MobileActionId::generate(), SignerMode::Remote),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::PolicyDenied { .. }));
}
