//! Action execution orchestrator.
//!
//! One entry point for both signer modes. The caller supplies a fresh
//! [`MobileActionId`] before anything touches the network; the id anchors the
//! [`CorrelationChain`] that survives into the outcome, or into the error on
//! failure, so every attempt stays auditable.

pub mod action;
pub mod signer;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, SignerError};
use crate::net::CancelSignal;
use crate::paymaster::check_sponsorship_eligibility;
use crate::starknet::Felt;

pub use self::action::{Action, ActionKind, Amount, PolicySnapshot, TokenRef};
pub use self::signer::{
    HttpSigningService, LocalSigner, LocalSubmission, RemoteSignFailure, RemoteSignRequest,
    RemoteSignResponse, SigningService,
};

/// Client-generated correlation anchor for one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MobileActionId(String);

impl MobileActionId {
    const PREFIX: &'static str = "mact_";

    /// Fresh id from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(format!("{}{}", Self::PREFIX, hex::encode(bytes)))
    }

    /// Wrap a caller-supplied id. Blank ids are rejected.
    pub fn parse(raw: &str) -> Result<Self, ExecutionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExecutionError::MissingActionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MobileActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerMode {
    Local,
    Remote,
}

impl SignerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for SignerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation ids linking an attempt across client, signer and chain.
///
/// `tx_hash` is only set after a successful broadcast; `signer_request_id`
/// is only set in remote mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationChain {
    pub mobile_action_id: MobileActionId,
    pub signer_request_id: Option<String>,
    pub tx_hash: Option<Felt>,
}

impl CorrelationChain {
    fn new(mobile_action_id: MobileActionId) -> Self {
        Self {
            mobile_action_id,
            signer_request_id: None,
            tx_hash: None,
        }
    }
}

/// Uniform result across signer modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub signer_mode: SignerMode,
    pub mobile_action_id: MobileActionId,
    pub signer_request_id: Option<String>,
    pub tx_hash: Option<Felt>,
    pub execution_status: Option<String>,
    pub revert_reason: Option<String>,
}

/// Inputs for one execution attempt.
#[derive(Debug, Clone)]
pub struct ExecutionRequest<'a> {
    pub action: &'a Action,
    pub mobile_action_id: MobileActionId,
    pub mode: SignerMode,
    /// Padded on-chain session allowlist; every call must target one of them.
    pub session_targets: Option<Vec<String>>,
    /// Deny the action unless it is eligible for gas sponsorship.
    pub require_sponsorship: bool,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(action: &'a Action, mobile_action_id: MobileActionId, mode: SignerMode) -> Self {
        Self {
            action,
            mobile_action_id,
            mode,
            session_targets: None,
            require_sponsorship: false,
        }
    }

    pub fn with_session_targets(mut self, slots: Vec<String>) -> Self {
        self.session_targets = Some(slots);
        self
    }

    pub fn with_sponsorship(mut self) -> Self {
        self.require_sponsorship = true;
        self
    }
}

struct RemoteSigner {
    service: Arc<dyn SigningService>,
    requester: String,
}

enum Dispatch<'a> {
    Local(&'a dyn LocalSigner),
    Remote(&'a RemoteSigner),
}

/// Claimed ids remembered per orchestrator by default.
pub const DEFAULT_CLAIMED_ID_WINDOW: usize = 65_536;

/// Most recently claimed ids, oldest evicted first.
struct ClaimedIds {
    capacity: usize,
    order: VecDeque<MobileActionId>,
    seen: HashSet<MobileActionId>,
}

impl ClaimedIds {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// False when `id` is still inside the window.
    fn insert(&mut self, id: &MobileActionId) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.order.push_back(id.clone());
        self.seen.insert(id.clone());
        true
    }
}

/// Runs prepared actions through the configured signer.
///
/// Duplicate ids are rejected within a window of the most recent
/// [`DEFAULT_CLAIMED_ID_WINDOW`] claims, so memory stays bounded for
/// long-lived orchestrators. Generated ids carry 128 random bits; an id older
/// than the window is only seen again if a caller replays it.
pub struct ActionOrchestrator {
    local: Option<Arc<dyn LocalSigner>>,
    remote: Option<RemoteSigner>,
    claimed: Mutex<ClaimedIds>,
}

impl Default for ActionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionOrchestrator {
    pub fn new() -> Self {
        Self {
            local: None,
            remote: None,
            claimed: Mutex::new(ClaimedIds::new(DEFAULT_CLAIMED_ID_WINDOW)),
        }
    }

    /// Remember at most `capacity` claimed ids (minimum one).
    pub fn with_claimed_id_window(mut self, capacity: usize) -> Self {
        self.claimed = Mutex::new(ClaimedIds::new(capacity));
        self
    }

    pub fn with_local_signer(mut self, signer: Arc<dyn LocalSigner>) -> Self {
        self.local = Some(signer);
        self
    }

    pub fn with_remote_signer(
        mut self,
        service: Arc<dyn SigningService>,
        requester: impl Into<String>,
    ) -> Self {
        self.remote = Some(RemoteSigner {
            service,
            requester: requester.into(),
        });
        self
    }

    fn dispatch_for(&self, mode: SignerMode) -> Option<Dispatch<'_>> {
        match mode {
            SignerMode::Local => self.local.as_ref().map(|signer| Dispatch::Local(signer.as_ref())),
            SignerMode::Remote => self.remote.as_ref().map(Dispatch::Remote),
        }
    }

    /// Claim an id. Reuse inside the window is rejected.
    fn claim(&self, id: &MobileActionId) -> Result<(), ExecutionError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(id) {
            return Err(ExecutionError::DuplicateActionId(id.to_string()));
        }
        Ok(())
    }

    /// Execute one attempt. Failures carry the partial correlation chain.
    pub async fn execute(
        &self,
        request: ExecutionRequest<'_>,
        cancel: Option<&CancelSignal>,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let ExecutionRequest {
            action,
            mobile_action_id,
            mode,
            session_targets,
            require_sponsorship,
        } = request;

        // A missing signer is a configuration error and leaves the id unclaimed.
        let Some(dispatch) = self.dispatch_for(mode) else {
            tracing::warn!(
                mobile_action_id = %mobile_action_id,
                signer_mode = mode.as_str(),
                "signer is not configured"
            );
            return Err(ExecutionError::SignerNotConfigured {
                chain: CorrelationChain::new(mobile_action_id),
                mode,
            });
        };
        self.claim(&mobile_action_id)?;
        let chain = CorrelationChain::new(mobile_action_id);

        {
            let span = tracing::info_span!(
                "execute_action",
                mobile_action_id = %chain.mobile_action_id,
                signer_mode = mode.as_str(),
                kind = action.kind.as_str(),
            );
            let _enter = span.enter();

            if let Err(reason) = action.check_policy(Utc::now(), session_targets.as_deref()) {
                tracing::warn!(%reason, "action denied by policy");
                return Err(ExecutionError::PolicyDenied { chain, reason });
            }
            if require_sponsorship {
                let decision =
                    check_sponsorship_eligibility(action.kind.as_str(), &action.entrypoints());
                if !decision.eligible {
                    tracing::warn!(reason = %decision.reason, "action not eligible for sponsorship");
                    return Err(ExecutionError::PolicyDenied {
                        chain,
                        reason: decision.reason,
                    });
                }
            }
        }

        match dispatch {
            Dispatch::Local(signer) => execute_local(signer, action, chain).await,
            Dispatch::Remote(remote) => execute_remote(remote, action, chain, cancel).await,
        }
    }
}

async fn execute_local(
    signer: &dyn LocalSigner,
    action: &Action,
    mut chain: CorrelationChain,
) -> Result<ExecutionOutcome, ExecutionError> {
    match signer.sign_and_broadcast(action).await {
        Ok(submission) => {
            chain.tx_hash = Some(submission.tx_hash);
            tracing::info!(
                mobile_action_id = %chain.mobile_action_id,
                tx_hash = %submission.tx_hash,
                "local signer broadcast action"
            );
            Ok(ExecutionOutcome {
                signer_mode: SignerMode::Local,
                mobile_action_id: chain.mobile_action_id,
                signer_request_id: None,
                tx_hash: Some(submission.tx_hash),
                execution_status: None,
                revert_reason: None,
            })
        }
        Err(source) => {
            tracing::warn!(
                mobile_action_id = %chain.mobile_action_id,
                error = %source,
                "local signer failed"
            );
            Err(ExecutionError::Signer { chain, source })
        }
    }
}

async fn execute_remote(
    remote: &RemoteSigner,
    action: &Action,
    mut chain: CorrelationChain,
    cancel: Option<&CancelSignal>,
) -> Result<ExecutionOutcome, ExecutionError> {
    let request = RemoteSignRequest {
        action,
        mobile_action_id: chain.mobile_action_id.as_str(),
        requester: &remote.requester,
    };
    let response = match remote.service.execute(&request, cancel).await {
        Ok(response) => response,
        Err(failure) => {
            chain.signer_request_id = failure.signer_request_id;
            tracing::warn!(
                mobile_action_id = %chain.mobile_action_id,
                signer_request_id = chain.signer_request_id.as_deref().unwrap_or("-"),
                error = %failure.error,
                "remote signer failed"
            );
            return Err(ExecutionError::Signer {
                chain,
                source: failure.error,
            });
        }
    };

    chain.signer_request_id = response.signer_request_id;
    let Some(tx_hash) = response.tx_hash else {
        let reason = response
            .revert_reason
            .or(response.error)
            .unwrap_or_else(|| "signing service did not broadcast the action".to_string());
        tracing::warn!(
            mobile_action_id = %chain.mobile_action_id,
            signer_request_id = chain.signer_request_id.as_deref().unwrap_or("-"),
            %reason,
            "remote signer returned no transaction"
        );
        return Err(ExecutionError::Signer {
            chain,
            source: SignerError::NotBroadcast { reason },
        });
    };

    chain.tx_hash = Some(tx_hash);
    tracing::info!(
        mobile_action_id = %chain.mobile_action_id,
        signer_request_id = chain.signer_request_id.as_deref().unwrap_or("-"),
        tx_hash = %tx_hash,
        "remote signer broadcast action"
    );
    Ok(ExecutionOutcome {
        signer_mode: SignerMode::Remote,
        mobile_action_id: chain.mobile_action_id,
        signer_request_id: chain.signer_request_id,
        tx_hash: Some(tx_hash),
        execution_status: response.execution_status,
        revert_reason: response.revert_reason,
    })
}
