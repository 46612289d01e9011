//! Errors surfaced by the coordinator.

use crate::replica_client::ReplicaError;
use partkv_common::RangeError;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("read quorum not reached: need {needed}, got {got}")]
    InsufficientReads { needed: usize, got: usize },
    #[error("write quorum not reached: need {needed}, got {got}")]
    InsufficientWrites { needed: usize, got: usize },
    #[error("delete not acknowledged by every replica: need {needed}, got {got}")]
    DeleteIncomplete { needed: usize, got: usize },
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),
    #[error("replicas disagree: {0}")]
    InsufficientConsistency(String),
    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("replica error: {0}")]
    Replica(#[from] ReplicaError),
    #[error("invalid configuration: {0}")]
    Config(#[from] partkv_config::ConfigError),
    #[error("coordinator has been shut down")]
    ShutDown,
}

impl KvError {
    /// Label used for the quorum failure metric, if this is a quorum failure.
    pub fn quorum_kind(&self) -> Option<&'static str> {
        match self {
            KvError::InsufficientReads { .. } => Some("insufficient_reads"),
            KvError::InsufficientWrites { .. } => Some("insufficient_writes"),
            KvError::DeleteIncomplete { .. } => Some("delete_incomplete"),
            KvError::InsufficientConsistency(_) => Some("insufficient_consistency"),
            _ => None,
        }
    }
}

impl From<RangeError> for KvError {
    fn from(e: RangeError) -> Self {
        KvError::InvalidRange(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_kind_labels() {
        assert_eq!(
            KvError::InsufficientReads { needed: 2, got: 1 }.quorum_kind(),
            Some("insufficient_reads")
        );
        assert_eq!(
            KvError::DeleteIncomplete { needed: 3, got: 2 }.quorum_kind(),
            Some("delete_incomplete")
        );
        assert_eq!(KvError::ShutDown.quorum_kind(), None);
        assert_eq!(KvError::NotImplemented("x").quorum_kind(), None);
    }

    #[test]
    fn test_display_mentions_counts() {
        let msg = KvError::InsufficientWrites { needed: 2, got: 1 }.to_string();
        assert!(msg.contains("need 2"), "{}", msg);
        assert!(msg.contains("got 1"), "{}", msg);
    }

    #[test]
    fn test_range_error_converts() {
        let e: KvError = RangeError::StartAfterEnd.into();
        assert!(matches!(e, KvError::InvalidRange(_)));
    }
}
