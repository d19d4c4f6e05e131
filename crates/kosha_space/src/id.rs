//! I define the opaque sortable id type used for all
//! aggregates in a kosha space.
//!

use std::{fmt::Display, str::FromStr};

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Base62 alphabet, in ascending ascii order, so that encoded
/// ids sort lexicographically in the same order as their raw
/// bytes.
const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encoded length of an id.
pub const ENCODED_LEN: usize = 27;

/// Raw payload length: 4 bytes of big-endian epoch seconds,
/// followed by 16 random bytes.
const RAW_LEN: usize = 20;

/// Seconds between the unix epoch and the id epoch
/// (2014-05-13T16:53:20Z). Offsetting extends the usable range
/// of the 32-bit timestamp component.
const EPOCH_OFFSET_SECS: u64 = 1_400_000_000;

/// An opaque identifier: 27 characters of base62, encoding a
/// 32-bit timestamp followed by 128 random bits.
///
/// Ids generated later compare greater, both as raw bytes and
/// in their encoded form, so listings sorted by id are
/// time-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpaqueId([u8; RAW_LEN]);

/// An error in parsing an [`OpaqueId`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidIdError {
    /// Id has invalid length.
    #[error("Id must be exactly {ENCODED_LEN} characters, got {0}.")]
    InvalidLength(usize),

    /// Id has a character outside the base62 alphabet.
    #[error("Id contains a character outside the base62 alphabet.")]
    InvalidCharacter,

    /// Id value overflows the raw payload.
    #[error("Id value is out of range.")]
    OutOfRange,
}

impl OpaqueId {
    /// Generate a new id for the current instant.
    pub fn generate() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("System clock must be past the unix epoch.")
            .as_secs();
        Self::generate_at_epoch_secs(now)
    }

    /// Generate a new id with given unix timestamp seconds.
    pub fn generate_at_epoch_secs(unix_secs: u64) -> Self {
        let ts = unix_secs.saturating_sub(EPOCH_OFFSET_SECS) as u32;
        let mut raw = [0u8; RAW_LEN];
        raw[..4].copy_from_slice(&ts.to_be_bytes());
        rand::thread_rng().fill_bytes(&mut raw[4..]);
        Self(raw)
    }

    /// Get the shard prefix of this id: its first two encoded
    /// characters.
    pub fn shard(&self) -> String {
        self.to_string()[..2].to_owned()
    }

    /// Construct an id from its raw payload bytes. Intended
    /// for adapters that derive deterministic ids from
    /// external names.
    #[inline]
    pub fn from_raw(raw: [u8; 20]) -> Self {
        Self(raw)
    }

    /// Raw payload bytes of this id.
    #[inline]
    pub fn as_raw(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Display for OpaqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Base62 encode the 160-bit payload, most significant
        // digit first, zero-padded to the fixed width.
        let mut digits = [0u8; ENCODED_LEN];
        let mut scratch = self.0;

        for digit in digits.iter_mut().rev() {
            // Long division of the big-endian byte string by 62.
            let mut remainder: u32 = 0;
            for byte in scratch.iter_mut() {
                let acc = (remainder << 8) | (*byte as u32);
                *byte = (acc / 62) as u8;
                remainder = acc % 62;
            }
            *digit = ALPHABET[remainder as usize];
        }

        f.write_str(std::str::from_utf8(&digits).expect("Alphabet is ascii."))
    }
}

impl FromStr for OpaqueId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ENCODED_LEN {
            return Err(InvalidIdError::InvalidLength(s.len()));
        }

        let mut raw = [0u8; RAW_LEN];
        for c in s.bytes() {
            let digit = ALPHABET
                .iter()
                .position(|a| *a == c)
                .ok_or(InvalidIdError::InvalidCharacter)? as u32;

            // raw = raw * 62 + digit.
            let mut carry = digit;
            for byte in raw.iter_mut().rev() {
                let acc = (*byte as u32) * 62 + carry;
                *byte = (acc & 0xff) as u8;
                carry = acc >> 8;
            }
            if carry != 0 {
                return Err(InvalidIdError::OutOfRange);
            }
        }
        Ok(Self(raw))
    }
}

impl Serialize for OpaqueId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
