//! Starknet field element.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::CodecError;

/// Field prime `2^251 + 17 * 2^192 + 1`, big-endian.
const FIELD_PRIME: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// A Starknet felt stored as 32 big-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Felt([u8; 32]);

impl Felt {
    pub const ZERO: Felt = Felt([0u8; 32]);
    pub const ONE: Felt = Felt::from_u128(1);

    pub const fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        let src = value.to_be_bytes();
        let mut i = 0;
        while i < 16 {
            bytes[16 + i] = src[i];
            i += 1;
        }
        Felt(bytes)
    }

    /// Build from up to 32 big-endian bytes, rejecting values outside the field.
    pub fn from_bytes_be(raw: &[u8]) -> Result<Self, CodecError> {
        if raw.len() > 32 {
            return Err(CodecError::Overflow { max: 252 });
        }
        let mut bytes = [0u8; 32];
        bytes[32 - raw.len()..].copy_from_slice(raw);
        if bytes >= FIELD_PRIME {
            return Err(CodecError::Overflow { max: 252 });
        }
        Ok(Felt(bytes))
    }

    /// Parse a `0x`-prefixed (or bare) hex string of up to 64 digits.
    pub fn from_hex(raw: &str) -> Result<Self, CodecError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 64 {
            return Err(CodecError::InvalidFelt(raw.to_string()));
        }
        let padded = format!("{digits:0>64}");
        let decoded =
            hex::decode(padded).map_err(|_| CodecError::InvalidFelt(raw.to_string()))?;
        Self::from_bytes_be(&decoded).map_err(|_| CodecError::InvalidFelt(raw.to_string()))
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Value as `u128`, when it fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }

    pub fn to_u64(&self) -> Option<u64> {
        self.to_u128().and_then(|v| u64::try_from(v).ok())
    }

    /// Minimal lowercase hex, `0x0` for zero.
    pub fn to_hex(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{trimmed}")
        }
    }

    /// Zero-padded 64-digit lowercase hex.
    pub fn to_fixed_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Entry point selector: Keccak-256 of the name masked to 250 bits.
    pub fn selector(name: &str) -> Self {
        let mut digest: [u8; 32] = Keccak256::digest(name.as_bytes()).into();
        digest[0] &= 0x03;
        Felt(digest)
    }

    /// Cairo short string: up to 31 ASCII bytes packed big-endian.
    pub fn from_short_string(value: &str) -> Result<Self, CodecError> {
        if !value.is_ascii() {
            return Err(CodecError::InvalidFelt(value.to_string()));
        }
        if value.len() > 31 {
            return Err(CodecError::Overflow { max: 31 });
        }
        Self::from_bytes_be(value.as_bytes())
    }

    /// Inverse of [`Felt::from_short_string`]; leading zero bytes are skipped.
    pub fn to_short_string(&self) -> Result<String, CodecError> {
        let bytes: Vec<u8> = self.0.iter().copied().skip_while(|b| *b == 0).collect();
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Felt {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt::from_u128(u128::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt::from_u128(value)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Felt::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
