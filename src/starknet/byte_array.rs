//! Length-prefixed on-chain string codec.
//!
//! Layout: `[word_count, word_0 .. word_{n-1}, pending_word, pending_len]`
//! where every full word packs 31 bytes big-endian and the pending word holds
//! the trailing `pending_len` (< 31) bytes.

use crate::error::CodecError;
use crate::starknet::Felt;

/// Bytes packed into one full word.
pub const BYTES_PER_WORD: usize = 31;

/// Encode a string into its felt representation.
pub fn encode_byte_array(value: &str) -> Vec<Felt> {
    let bytes = value.as_bytes();
    let chunks = bytes.chunks_exact(BYTES_PER_WORD);
    let pending = chunks.remainder();

    let mut felts = Vec::with_capacity(3 + bytes.len() / BYTES_PER_WORD);
    felts.push(Felt::from((bytes.len() / BYTES_PER_WORD) as u64));
    for chunk in chunks {
        felts.push(pack_word(chunk));
    }
    felts.push(pack_word(pending));
    felts.push(Felt::from(pending.len() as u64));
    felts
}

/// Decode a full felt slice into a string.
pub fn decode_byte_array(felts: &[Felt]) -> Result<String, CodecError> {
    decode_byte_array_prefix(felts).map(|(value, _)| value)
}

/// Decode a byte array from the front of `felts`, returning the string and
/// the number of felts consumed.
pub fn decode_byte_array_prefix(felts: &[Felt]) -> Result<(String, usize), CodecError> {
    let word_count = felts
        .first()
        .ok_or(CodecError::Truncated {
            expected: 3,
            actual: 0,
        })?
        .to_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(CodecError::Overflow { max: 64 })?;

    let expected = word_count
        .checked_add(3)
        .ok_or(CodecError::Overflow { max: 64 })?;
    if felts.len() < expected {
        return Err(CodecError::Truncated {
            expected,
            actual: felts.len(),
        });
    }

    let mut bytes = Vec::with_capacity(word_count * BYTES_PER_WORD + BYTES_PER_WORD);
    for word in &felts[1..=word_count] {
        unpack_full_word(word, &mut bytes);
    }

    let pending_word = &felts[word_count + 1];
    let pending_len_felt = &felts[word_count + 2];
    let pending_len = pending_len_felt
        .to_u64()
        .ok_or(CodecError::Overflow { max: 64 })?;
    if pending_len >= BYTES_PER_WORD as u64 {
        return Err(CodecError::PendingLength(pending_len));
    }
    let raw = pending_word.to_bytes_be();
    bytes.extend_from_slice(&raw[32 - pending_len as usize..]);

    let value = String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
    Ok((value, expected))
}

fn pack_word(chunk: &[u8]) -> Felt {
    // A 31-byte chunk is always below the field prime.
    Felt::from_bytes_be(chunk).unwrap_or(Felt::ZERO)
}

/// Full words hold their 31 bytes after the leading pad byte and stop
/// early at a zero byte.
fn unpack_full_word(word: &Felt, out: &mut Vec<u8>) {
    let raw = word.to_bytes_be();
    out.extend(raw[32 - BYTES_PER_WORD..].iter().take_while(|b| **b != 0).copied());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn round_trip(value: &str) {
        let encoded = encode_byte_array(value);
        assert_eq!(decode_byte_array(&encoded).unwrap(), value);
    }

    #[test]
    fn empty_string_round_trips() {
        let encoded = encode_byte_array("");
        assert_eq!(encoded, vec![Felt::ZERO, Felt::ZERO, Felt::ZERO]);
        round_trip("");
    }

    #[test]
    fn short_string_uses_pending_word() {
        let encoded = encode_byte_array("hello");
        assert_eq!(
            encoded,
            vec![
                Felt::ZERO,
                Felt::from_hex("0x68656c6c6f").unwrap(),
                Felt::from(5u64)
            ]
        );
        round_trip("agent-name");
    }

    #[test]
    fn exactly_one_word_round_trips() {
        let value = "abcdefghijklmnopqrstuvwxyz01234";
        assert_eq!(value.len(), BYTES_PER_WORD);
        let encoded = encode_byte_array(value);
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded[0], Felt::ONE);
        assert_eq!(encoded[3], Felt::ZERO);
        round_trip(value);
    }

    #[test]
    fn full_word_stops_at_leading_zero_byte() {
        let value = format!("\0{}", "a".repeat(30));
        let encoded = encode_byte_array(&value);
        assert_eq!(encoded[0], Felt::ONE);
        assert_eq!(decode_byte_array(&encoded).unwrap(), "");

        let value = format!("ab\0{}", "c".repeat(28));
        let encoded = encode_byte_array(&value);
        assert_eq!(decode_byte_array(&encoded).unwrap(), "ab");
    }

    #[test]
    fn multi_word_string_round_trips() {
        let value = "a".repeat(65);
        let encoded = encode_byte_array(&value);
        assert_eq!(encoded[0], Felt::from(2u64));
        assert_eq!(encoded.last(), Some(&Felt::from(3u64)));
        round_trip(&value);
        round_trip("starkclaw session policy metadata value ✓ with unicode");
    }

    #[test]
    fn prefix_decode_reports_consumed_felts() {
        let mut felts = encode_byte_array("name");
        felts.push(Felt::from(99u64));
        let (value, consumed) = decode_byte_array_prefix(&felts).unwrap();
        assert_eq!(value, "name");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn rejects_truncated_and_bad_pending_length() {
        assert_eq!(
            decode_byte_array(&[Felt::from(2u64), Felt::ZERO]),
            Err(CodecError::Truncated {
                expected: 5,
                actual: 2
            })
        );
        assert_eq!(
            decode_byte_array(&[Felt::ZERO, Felt::ZERO, Felt::from(31u64)]),
            Err(CodecError::PendingLength(31))
        );
        assert!(decode_byte_array(&[]).is_err());
    }
}
