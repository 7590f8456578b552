//! Prepared actions and their policy snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::policy::{label_for_address, unpad_targets};
use crate::starknet::{Call, Felt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Transfer,
    Swap,
    SessionKeyRegister,
    SessionKeyRevoke,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Swap => "swap",
            Self::SessionKeyRegister => "session_key_register",
            Self::SessionKeyRevoke => "session_key_revoke",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub symbol: String,
    pub address: Felt,
    pub decimals: u8,
}

/// Amount in display units alongside its base-unit integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    #[serde(with = "rust_decimal::serde::str")]
    pub display: Decimal,
    /// Base units as a decimal string; may exceed `u64`.
    pub base_units: String,
}

impl Amount {
    /// Scale a display amount by `10^decimals`, truncating sub-unit dust.
    pub fn from_display(display: Decimal, decimals: u8) -> Result<Self, CodecError> {
        if display.is_sign_negative() {
            return Err(CodecError::InvalidFelt(display.to_string()));
        }
        if decimals > 28 {
            return Err(CodecError::Overflow { max: 128 });
        }
        let scale = Decimal::from_i128_with_scale(10i128.pow(u32::from(decimals)), 0);
        let base = display
            .checked_mul(scale)
            .and_then(|v| v.trunc().to_u128())
            .ok_or(CodecError::Overflow { max: 128 })?;
        Ok(Self {
            display,
            base_units: base.to_string(),
        })
    }

    /// `(low, high)` felts of the base-unit `u256`.
    pub fn to_u256_calldata(&self) -> Result<[Felt; 2], CodecError> {
        let value: u128 = self
            .base_units
            .parse()
            .map_err(|_| CodecError::InvalidFelt(self.base_units.clone()))?;
        Ok([Felt::from_u128(value), Felt::ZERO])
    }
}

/// Session limits captured when the action was prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySnapshot {
    #[serde(with = "rust_decimal::serde::str")]
    pub spending_limit: Decimal,
    pub valid_until: DateTime<Utc>,
}

/// An action ready for signing. Immutable once prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub kind: ActionKind,
    pub token: TokenRef,
    pub amount: Amount,
    pub target: Felt,
    pub calls: Vec<Call>,
    pub policy: PolicySnapshot,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Action {
    /// Entrypoint names across every call, used for sponsorship checks.
    pub fn entrypoints(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.entrypoint.as_str()).collect()
    }

    /// One-line human summary for the activity journal.
    pub fn summary(&self) -> String {
        let target = label_for_address(&self.target.to_fixed_hex());
        match self.kind {
            ActionKind::Transfer => format!(
                "Transfer {} {} to {target}",
                self.amount.display.normalize(),
                self.token.symbol
            ),
            ActionKind::Swap => format!(
                "Swap {} {} via {target}",
                self.amount.display.normalize(),
                self.token.symbol
            ),
            ActionKind::SessionKeyRegister => format!("Register session key on {target}"),
            ActionKind::SessionKeyRevoke => format!("Revoke session key on {target}"),
        }
    }

    /// Check the action against its policy snapshot and, optionally, a padded
    /// session target allowlist. Returns the denial reason on violation.
    pub fn check_policy<S: AsRef<str>>(
        &self,
        now: DateTime<Utc>,
        session_targets: Option<&[S]>,
    ) -> Result<(), String> {
        if now >= self.policy.valid_until {
            return Err(format!(
                "session policy expired at {}",
                self.policy.valid_until.to_rfc3339()
            ));
        }
        if self.amount.display > self.policy.spending_limit {
            return Err(format!(
                "amount {} {} exceeds spending limit {}",
                self.amount.display.normalize(),
                self.token.symbol,
                self.policy.spending_limit.normalize()
            ));
        }
        if let Some(slots) = session_targets {
            let allowed: Vec<Felt> = unpad_targets(slots)
                .iter()
                .filter_map(|a| Felt::from_hex(a).ok())
                .collect();
            for call in &self.calls {
                if !allowed.contains(&call.contract_address) {
                    return Err(format!(
                        "target {} is not in the session allowlist",
                        label_for_address(&call.contract_address.to_fixed_hex())
                    ));
                }
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::fixtures::{small_transfer, transfer};
    use super::*;
    use crate::policy::pad_targets;
    use crate::policy::presets::{ETH_TOKEN, STRK_TOKEN};

    #[test]
    fn base_units_scale_by_decimals() {
        let amount = Amount::from_display(dec!(1.5), 18).unwrap();
        assert_eq!(amount.base_units, "1500000000000000000");
        let usdc = Amount::from_display(dec!(12.3456789), 6).unwrap();
        assert_eq!(usdc.base_units, "12345678");
        assert!(Amount::from_display(dec!(-1), 6).is_err());
    }

    #[test]
    fn policy_allows_action_within_limits() {
        let action = small_transfer();
        let slots = pad_targets(&[ETH_TOKEN]);
        assert_eq!(action.check_policy(Utc::now(), Some(&slots[..])), Ok(()));
        assert_eq!(action.check_policy::<&str>(Utc::now(), None), Ok(()));
    }

    #[test]
    fn policy_denies_over_limit_expired_and_foreign_target() {
        let over = transfer(dec!(2), dec!(1));
        let reason = over.check_policy::<&str>(Utc::now(), None).unwrap_err();
        assert!(reason.contains("exceeds spending limit"));

        let action = small_transfer();
        let later = action.policy.valid_until + Duration::seconds(1);
        assert!(action.check_policy::<&str>(later, None).unwrap_err().contains("expired"));

        let slots = pad_targets(&[STRK_TOKEN]);
        let reason = action.check_policy(Utc::now(), Some(&slots[..])).unwrap_err();
        assert!(reason.contains("not in the session allowlist"));
    }

    #[test]
    fn summary_uses_labels_and_normalized_amounts() {
        let action = transfer(dec!(0.50), dec!(1));
        assert!(action.summary().starts_with("Transfer 0.5 ETH to 0x"));
        assert_eq!(action.entrypoints(), vec!["transfer"]);
    }

    #[test]
    fn action_json_shape_is_camel_case() {
        let json = serde_json::to_value(small_transfer()).unwrap();
        assert_eq!(json["kind"], "transfer");
        assert_eq!(json["amount"]["display"], "0.5");
        assert!(json["policy"]["spendingLimit"].is_string());
        assert!(json["policy"]["validUntil"].is_string());
    }
}
