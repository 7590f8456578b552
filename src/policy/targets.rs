//! Fixed four-slot session policy target list.

use crate::starknet::Felt;

/// Number of target slots in the on-chain session policy.
pub const SLOT_COUNT: usize = 4;

/// Canonical zero-address sentinel written into unused slots.
pub const ZERO_ADDRESS: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Pad a target list to exactly [`SLOT_COUNT`] slots.
///
/// Inputs longer than four entries are truncated to the first four; callers
/// validate length before building a policy.
pub fn pad_targets<S: AsRef<str>>(targets: &[S]) -> [String; SLOT_COUNT] {
    if targets.len() > SLOT_COUNT {
        tracing::debug!(
            provided = targets.len(),
            "session policy targets truncated to {SLOT_COUNT} slots"
        );
    }
    std::array::from_fn(|i| {
        targets
            .get(i)
            .map(|t| t.as_ref().to_string())
            .unwrap_or_else(|| ZERO_ADDRESS.to_string())
    })
}

/// Drop every zero-address slot, preserving order.
pub fn unpad_targets<S: AsRef<str>>(slots: &[S]) -> Vec<String> {
    slots
        .iter()
        .map(AsRef::as_ref)
        .filter(|slot| !is_zero_address(slot))
        .map(str::to_string)
        .collect()
}

/// True for `0x000…0` (any length), `0x0`, or any other spelling of numeric zero.
pub fn is_zero_address(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(ZERO_ADDRESS) || trimmed == "0x0" || trimmed == "0" {
        return true;
    }
    Felt::from_hex(trimmed).is_ok_and(|felt| felt.is_zero())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const A: &str = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7";
    const B: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";
    const C: &str = "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";
    const D: &str = "0x04270219d365d6b017231b52e92b3fb5d7c8378b05e9abc97724537a80e93b0f";

    #[test]
    fn pad_always_yields_four_slots() {
        let padded = pad_targets(&[A]);
        assert_eq!(padded.len(), SLOT_COUNT);
        assert_eq!(padded[0], A);
        assert!(padded[1..].iter().all(|slot| slot == ZERO_ADDRESS));

        let empty: [&str; 0] = [];
        assert!(pad_targets(&empty).iter().all(|slot| slot == ZERO_ADDRESS));
    }

    #[test]
    fn pad_truncates_to_first_four() {
        let padded = pad_targets(&[A, B, C, D, "0x1234"]);
        assert_eq!(padded, [A, B, C, D].map(String::from));
    }

    #[test]
    fn unpad_inverts_pad_for_every_length() {
        let all = [A, B, C, D];
        for len in 0..=SLOT_COUNT {
            let input: Vec<String> = all[..len].iter().map(|s| s.to_string()).collect();
            assert_eq!(unpad_targets(&pad_targets(&input)), input);
        }
    }

    #[test]
    fn unpad_accepts_every_zero_spelling() {
        let slots = [A, "0x0", "0x00000", B];
        assert_eq!(unpad_targets(&slots), vec![A.to_string(), B.to_string()]);
        assert!(is_zero_address("0X0000000000000000000000000000000000000000000000000000000000000000"));
        assert!(!is_zero_address("0x1"));
        assert!(!is_zero_address("not-an-address"));
    }
}
