use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::ulid;

/// Monotonic 128-bit document identifier. On the wire it is a 26-character
/// Crockford base32 ULID string; internally it is kept as a plain `u128` so
/// posting lists can sort and compare it cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u128);

impl DocId {
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", ulid::encode(self.0))
    }
}

impl FromStr for DocId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::decode(s)
            .map(DocId)
            .ok_or_else(|| Error::new(ErrorKind::IndexGet, format!("malformed doc id: {}", s)))
    }
}

/// A document as stored in a segment's doc table: opaque text plus its
/// post-tokenization token count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub length: u32,
}

/// Returned by `Index::get`.
#[derive(Debug, Clone)]
pub struct DocumentView {
    pub content: String,
    pub length: u32,
}
