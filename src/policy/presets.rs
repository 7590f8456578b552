//! Known session policy presets and address labels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::starknet::{Felt, Network};

pub const ETH_TOKEN: &str = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7";
pub const STRK_TOKEN: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";
pub const USDC_TOKEN_MAINNET: &str =
    "0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8";
pub const USDC_TOKEN_SEPOLIA: &str =
    "0x053b40a647cedfca6ca84f542a0fe36736031905a9639a7f19a3c1e66bfd5080";
pub const AVNU_ROUTER_MAINNET: &str =
    "0x04270219d365d6b017231b52e92b3fb5d7c8378b05e9abc97724537a80e93b0f";
pub const AVNU_ROUTER_SEPOLIA: &str =
    "0x02c56e8b00dbe2a71e57472685378fc8988bba947e9a99b26a00fade2b4fe7c2";

/// Well-known contracts with display labels.
const KNOWN_LABELS: &[(&str, &str)] = &[
    (ETH_TOKEN, "ETH"),
    (STRK_TOKEN, "STRK"),
    (USDC_TOKEN_MAINNET, "USDC"),
    (USDC_TOKEN_SEPOLIA, "USDC"),
    (AVNU_ROUTER_MAINNET, "AVNU Router"),
    (AVNU_ROUTER_SEPOLIA, "AVNU Router"),
];

/// Session policy preset classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    /// Token transfers only.
    Transfers,
    /// Swaps through the AVNU router plus the tokens it spends.
    Swaps,
    /// AVNU router only.
    AvnuOnly,
    Custom,
}

impl PolicyPreset {
    /// Presets with a fixed address set, in detection order.
    pub const KNOWN: [PolicyPreset; 3] = [Self::Transfers, Self::Swaps, Self::AvnuOnly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfers => "transfers",
            Self::Swaps => "swaps",
            Self::AvnuOnly => "avnu_only",
            Self::Custom => "custom",
        }
    }

    /// Resolve the preset's target set for `network`. `Custom` has none.
    pub fn resolve(self, network: Network) -> Vec<&'static str> {
        let (usdc, router) = match network {
            Network::Mainnet => (USDC_TOKEN_MAINNET, AVNU_ROUTER_MAINNET),
            Network::Sepolia => (USDC_TOKEN_SEPOLIA, AVNU_ROUTER_SEPOLIA),
        };
        match self {
            Self::Transfers => vec![ETH_TOKEN, STRK_TOKEN, usdc],
            Self::Swaps => vec![router, ETH_TOKEN, STRK_TOKEN, usdc],
            Self::AvnuOnly => vec![router],
            Self::Custom => Vec::new(),
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase an address; felts are widened to their fixed 64-digit form so
/// `0x49d…` and `0x049d…` compare equal.
fn normalize_address(raw: &str) -> String {
    match Felt::from_hex(raw) {
        Ok(felt) => felt.to_fixed_hex(),
        Err(_) => raw.trim().to_ascii_lowercase(),
    }
}

fn normalized_sorted<S: AsRef<str>>(addresses: &[S]) -> Vec<String> {
    let mut out: Vec<String> = addresses
        .iter()
        .map(|a| normalize_address(a.as_ref()))
        .collect();
    out.sort();
    out
}

/// Classify a target set against the known presets for `network`.
pub fn detect_preset<S: AsRef<str>>(addresses: &[S], network: Network) -> PolicyPreset {
    if addresses.is_empty() {
        return PolicyPreset::Transfers;
    }
    let candidate = normalized_sorted(addresses);
    PolicyPreset::KNOWN
        .into_iter()
        .find(|preset| normalized_sorted(&preset.resolve(network)) == candidate)
        .unwrap_or(PolicyPreset::Custom)
}

/// Human label for an address: well-known name, else `0x12345678…abcdef`.
pub fn label_for_address(address: &str) -> String {
    let normalized = normalize_address(address);
    if let Some((_, label)) = KNOWN_LABELS
        .iter()
        .find(|(known, _)| normalize_address(known) == normalized)
    {
        return (*label).to_string();
    }

    let trimmed = address.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 16 {
        return trimmed.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_preset_detects_itself_on_every_network() {
        for network in Network::ALL {
            for preset in PolicyPreset::KNOWN {
                let mut addresses = preset.resolve(network);
                addresses.reverse();
                assert_eq!(detect_preset(&addresses, network), preset, "{preset} on {network}");
            }
        }
    }

    #[test]
    fn empty_is_transfers_and_unknown_is_custom() {
        let empty: [&str; 0] = [];
        assert_eq!(detect_preset(&empty, Network::Mainnet), PolicyPreset::Transfers);
        assert_eq!(
            detect_preset(&["0x1234", "0xabcd"], Network::Sepolia),
            PolicyPreset::Custom
        );
    }

    #[test]
    fn detection_ignores_case_and_leading_zeros() {
        let addresses = [
            "0x49D36570D4E46F48E99674BD3FCC84644DDD6B96F7C741B1562B82F9E004DC7",
            STRK_TOKEN,
            USDC_TOKEN_SEPOLIA,
        ];
        assert_eq!(detect_preset(&addresses, Network::Sepolia), PolicyPreset::Transfers);
        assert_eq!(detect_preset(&addresses, Network::Mainnet), PolicyPreset::Custom);
    }

    #[test]
    fn labels_known_and_unknown_addresses() {
        assert_eq!(label_for_address(&ETH_TOKEN.to_uppercase().replace("0X", "0x")), "ETH");
        assert_eq!(label_for_address(AVNU_ROUTER_SEPOLIA), "AVNU Router");
        assert_eq!(
            label_for_address("0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"),
            "0x01234567…abcdef"
        );
        assert_eq!(label_for_address("0x1234"), "0x1234");
    }
}
