//! Deterministic block identifiers.
//!
//! The raw identifier of block `i` is `i` rendered as a zero-padded
//! six-digit decimal string. On the wire it travels as the standard base64
//! encoding of that string: always 8 characters, alphanumeric only (base64
//! of three ASCII digits never produces `+`, `/` or padding), so it needs no
//! escaping in a query string.
//!
//! Every id of one object has the same length, which the service requires,
//! and ordering ids by their raw form is ordering by block index.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ProtocolError;
use crate::constants::MAX_BLOCK_COUNT;

/// Width of the raw decimal identifier.
pub const BLOCK_ID_WIDTH: usize = 6;

/// Identifier of one uploaded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    index: u32,
}

impl BlockId {
    /// Derives the id for `index`.
    pub fn new(index: u32) -> Result<Self, ProtocolError> {
        if u64::from(index) >= MAX_BLOCK_COUNT {
            return Err(ProtocolError::BlockIndexOutOfRange(index));
        }
        Ok(Self { index })
    }

    /// Block index this id was derived from.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Raw fixed-width identifier (before base64).
    pub fn raw(&self) -> String {
        format!("{:0width$}", self.index, width = BLOCK_ID_WIDTH)
    }

    /// Wire form sent as `blockid` and listed in the commit body.
    pub fn encoded(&self) -> String {
        STANDARD.encode(self.raw())
    }

    /// Parses a wire-form id produced by [`encoded`](Self::encoded).
    pub fn from_encoded(encoded: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidBlockId(encoded.to_string());

        let raw = STANDARD.decode(encoded).map_err(|_| invalid())?;
        if raw.len() != BLOCK_ID_WIDTH || !raw.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let raw = std::str::from_utf8(&raw).map_err(|_| invalid())?;
        let index: u32 = raw.parse().map_err(|_| invalid())?;
        Self::new(index)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded())
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded())
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockId::from_encoded(&s).map_err(serde::de::Error::custom)
    }
}
