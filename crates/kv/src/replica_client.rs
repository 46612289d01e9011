//! Abstraction over per-node storage calls.
//!
//! The coordinator never talks to a node directly: every read, write and
//! range stream goes through a [`ReplicaClient`] addressed by [`NodeInfo`].
//! The in-process implementation lives in [`crate::memory`].

use crate::node_info::NodeInfo;
use partkv_common::{Cell, ColumnSelection, RangeRequest, RowResult, Value};
use partkv_storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    #[error("RPC failed: {0}")]
    RpcFailed(String),
    #[error("timeout")]
    Timeout,
    #[error("cell already exists")]
    KeyAlreadyExists,
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("value of {size} bytes exceeds table limit of {max}")]
    ValueTooLarge { size: usize, max: usize },
}

impl From<StorageError> for ReplicaError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::TableNotFound(t) => ReplicaError::TableNotFound(t),
            StorageError::ValueTooLarge { size, max } => ReplicaError::ValueTooLarge { size, max },
            StorageError::KeyAlreadyExists => ReplicaError::KeyAlreadyExists,
        }
    }
}

/// An ordered stream of rows from one node for one sub-range.
///
/// Rows arrive in the request's iteration order. `close` releases the
/// node-side resources; callers invoke it exactly once.
#[async_trait::async_trait]
pub trait RowStream: Send {
    async fn next_row(&mut self) -> Result<Option<RowResult<Value>>, ReplicaError>;

    fn close(&mut self);
}

pub type BoxRowStream = Box<dyn RowStream>;

/// Transport for node-local storage calls.
#[async_trait::async_trait]
pub trait ReplicaClient: Send + Sync + 'static {
    /// Newest version of `cell` with timestamp `<= timestamp`.
    async fn replica_get(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<Option<Value>, ReplicaError>;

    /// Newest visible version of every selected cell in `rows`.
    async fn replica_get_rows(
        &self,
        target: &NodeInfo,
        table: &str,
        rows: &[Vec<u8>],
        columns: &ColumnSelection,
        timestamp: u64,
    ) -> Result<Vec<(Cell, Value)>, ReplicaError>;

    async fn replica_put(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        value: &Value,
    ) -> Result<(), ReplicaError>;

    /// Write `contents` unless the node already holds any version of `cell`.
    ///
    /// Fails with [`ReplicaError::KeyAlreadyExists`] when it does.
    async fn replica_put_unless_exists(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        contents: &[u8],
    ) -> Result<(), ReplicaError>;

    /// Remove the single `(cell, timestamp)` version.
    async fn replica_delete(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<(), ReplicaError>;

    /// Open a row stream over `range` as of `timestamp`.
    async fn replica_get_range(
        &self,
        target: &NodeInfo,
        table: &str,
        range: &RangeRequest,
        timestamp: u64,
    ) -> Result<BoxRowStream, ReplicaError>;

    async fn replica_create_table(
        &self,
        target: &NodeInfo,
        table: &str,
        max_value_size: usize,
    ) -> Result<(), ReplicaError>;

    async fn replica_drop_table(&self, target: &NodeInfo, table: &str) -> Result<(), ReplicaError>;
}
