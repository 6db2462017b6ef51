//! Identifiers for posts and users.
//!
//! A [`PostId`] is 12 opaque bytes laid out so that byte order follows
//! creation order: a big-endian Unix timestamp in seconds, five bytes that
//! are random per process, and a three-byte counter. It is both the primary
//! key of a post and the anchor carried by page tokens.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_ID_LEN: usize = 12;

const COUNTER_MASK: u32 = 0x00FF_FFFF;
/// Seeds stay in the lower half so a process can mint millions of ids in one
/// second before the counter wraps.
const SEED_MASK: u32 = 0x007F_FFFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier is not valid base64: {0}")]
    Encoding(String),
    #[error("identifier is not valid hex: {0}")]
    Hex(String),
    #[error("identifier must be {POST_ID_LEN} bytes, got {0}")]
    Length(usize),
    #[error("user identifier must not be blank")]
    BlankUser,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId([u8; POST_ID_LEN]);

struct ProcessSeed {
    random: [u8; 5],
    counter: AtomicU32,
}

fn process_seed() -> &'static ProcessSeed {
    static SEED: OnceLock<ProcessSeed> = OnceLock::new();
    SEED.get_or_init(|| ProcessSeed {
        random: rand::random(),
        counter: AtomicU32::new(rand::random::<u32>() & SEED_MASK),
    })
}

impl PostId {
    /// Allocate a fresh identifier stamped with the current time.
    pub fn generate() -> Self {
        Self::generate_at(OffsetDateTime::now_utc())
    }

    /// Allocate a fresh identifier stamped with `at`.
    pub fn generate_at(at: OffsetDateTime) -> Self {
        let seed = process_seed();
        let seconds = at.unix_timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        let counter = seed.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;

        let mut bytes = [0u8; POST_ID_LEN];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&seed.random);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; POST_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let array: [u8; POST_ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdError::Length(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; POST_ID_LEN] {
        &self.0
    }

    /// URL-safe textual form used for public ids and page tokens.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn decode(token: &str) -> Result<Self, IdError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|err| IdError::Encoding(err.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex form used for job arguments.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, IdError> {
        let bytes = hex::decode(value).map_err(|err| IdError::Hex(err.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostId({})", self.to_hex())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// Opaque user identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(IdError::BlankUser);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
