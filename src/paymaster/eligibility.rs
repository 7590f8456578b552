//! Local gas-sponsorship eligibility rules.

use serde::{Deserialize, Serialize};

/// Action kinds the paymaster will sponsor.
pub const SPONSORABLE_ACTION_KINDS: &[&str] = &[
    "transfer",
    "swap",
    "session_key_register",
    "session_key_revoke",
];

/// Entrypoints that are never sponsored, whatever the action kind.
pub const BLOCKED_ENTRYPOINTS: &[&str] = &["upgrade", "set_implementation", "emergency_revoke_all"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub reason: String,
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

/// Decide whether an action may use gas sponsorship.
///
/// The blocked-entrypoint check always runs and wins over an allowed kind.
pub fn check_sponsorship_eligibility<S: AsRef<str>>(
    action_kind: &str,
    entrypoints: &[S],
) -> EligibilityDecision {
    let blocked: Vec<String> = entrypoints
        .iter()
        .map(|e| normalize(e.as_ref()))
        .filter(|e| BLOCKED_ENTRYPOINTS.contains(&e.as_str()))
        .collect();
    if !blocked.is_empty() {
        return EligibilityDecision {
            eligible: false,
            reason: format!("blocked entrypoint: {}", blocked.join(", ")),
        };
    }

    let kind = normalize(action_kind);
    if !SPONSORABLE_ACTION_KINDS.contains(&kind.as_str()) {
        return EligibilityDecision {
            eligible: false,
            reason: format!("action kind '{kind}' is not sponsorable"),
        };
    }

    EligibilityDecision {
        eligible: true,
        reason: format!("{kind} is eligible for sponsorship"),
    }
}
