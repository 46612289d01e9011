//! partkv-common: shared types for the partkv workspace.
//!
//! Provides node identities, the cell/value/row data model, and the
//! [`RangeRequest`] type with the orderings every merge in the coordinator
//! relies on.

pub mod range;
pub mod types;

pub use range::{RangeError, RangeRequest, RangeRequestBuilder};
pub use types::{Cell, ColumnSelection, RowResult, Value};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Number of bytes in a node identifier.
pub const ID_BYTES: usize = 20;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// A 160-bit identifier naming one backend storage node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId([u8; ID_BYTES]);

impl NodeId {
    /// The all-zeros identifier.
    pub const ZERO: Self = Self([0u8; ID_BYTES]);

    /// Create a `NodeId` from raw bytes.
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    /// Create a `NodeId` by SHA-1 hashing arbitrary data (typically the node name).
    pub fn from_sha1(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        let mut bytes = [0u8; ID_BYTES];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 4 bytes are enough to tell nodes apart in logs
        write!(f, "{}…", hex::encode(&self.0[..4]))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
