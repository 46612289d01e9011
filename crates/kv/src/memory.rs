//! In-process [`ReplicaClient`] backed by one [`StorageEngine`] per node.
//!
//! Node calls are dispatched through a shared registry keyed by node id.
//! Range streams snapshot the node's rows at open time and count their own
//! open/close calls so tests can check stream lifetimes.

use crate::node_info::NodeInfo;
use crate::replica_client::{BoxRowStream, ReplicaClient, ReplicaError, RowStream};
use partkv_common::{Cell, ColumnSelection, NodeId, RangeRequest, RowResult, Value};
use partkv_storage::StorageEngine;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Timestamp used by `put_unless_exists` writes.
pub const PUT_UNLESS_EXISTS_TIMESTAMP: u64 = 0;

pub type NodeRegistry = Arc<RwLock<HashMap<NodeId, Arc<RwLock<StorageEngine>>>>>;

/// Counters for range streams handed out by one client.
#[derive(Debug, Default)]
pub struct StreamTracker {
    opened: AtomicUsize,
    close_calls: AtomicUsize,
    dropped_open: AtomicUsize,
}

impl StreamTracker {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Total `close` calls, including repeated ones.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Streams dropped without ever being closed.
    pub fn dropped_open(&self) -> usize {
        self.dropped_open.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct InMemReplicaClient {
    registry: NodeRegistry,
    streams: Arc<StreamTracker>,
}

impl Default for InMemReplicaClient {
    fn default() -> Self {
        Self::new(NodeRegistry::default())
    }
}

impl InMemReplicaClient {
    /// A client over an existing registry; clients built from the same
    /// registry see the same nodes.
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            streams: Arc::new(StreamTracker::default()),
        }
    }

    /// Register an empty store for `node` and return it.
    pub async fn add_node(&self, node: &NodeInfo) -> Arc<RwLock<StorageEngine>> {
        let storage = Arc::new(RwLock::new(StorageEngine::new()));
        self.registry.write().await.insert(node.id, storage.clone());
        storage
    }

    /// The store registered for `node_id`, if any.
    pub async fn storage(&self, node_id: &NodeId) -> Option<Arc<RwLock<StorageEngine>>> {
        self.registry.read().await.get(node_id).cloned()
    }

    pub fn stream_tracker(&self) -> Arc<StreamTracker> {
        self.streams.clone()
    }

    async fn node(&self, target: &NodeInfo) -> Result<Arc<RwLock<StorageEngine>>, ReplicaError> {
        self.registry
            .read()
            .await
            .get(&target.id)
            .cloned()
            .ok_or_else(|| ReplicaError::RpcFailed(format!("node {} not in registry", target)))
    }
}

#[async_trait::async_trait]
impl ReplicaClient for InMemReplicaClient {
    async fn replica_get(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<Option<Value>, ReplicaError> {
        let storage = self.node(target).await?;
        let s = storage.read().await;
        Ok(s.get(table, cell, timestamp)?)
    }

    async fn replica_get_rows(
        &self,
        target: &NodeInfo,
        table: &str,
        rows: &[Vec<u8>],
        columns: &ColumnSelection,
        timestamp: u64,
    ) -> Result<Vec<(Cell, Value)>, ReplicaError> {
        let storage = self.node(target).await?;
        let s = storage.read().await;
        let mut out = Vec::new();
        for row in rows {
            out.extend(s.get_row(table, row, columns, timestamp)?);
        }
        Ok(out)
    }

    async fn replica_put(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        value: &Value,
    ) -> Result<(), ReplicaError> {
        let storage = self.node(target).await?;
        let mut s = storage.write().await;
        s.put(table, cell.clone(), value.contents.clone(), value.timestamp)?;
        Ok(())
    }

    async fn replica_put_unless_exists(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        contents: &[u8],
    ) -> Result<(), ReplicaError> {
        let storage = self.node(target).await?;
        let mut s = storage.write().await;
        s.put_unless_exists(
            table,
            cell.clone(),
            contents.to_vec(),
            PUT_UNLESS_EXISTS_TIMESTAMP,
        )?;
        Ok(())
    }

    async fn replica_delete(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<(), ReplicaError> {
        let storage = self.node(target).await?;
        let mut s = storage.write().await;
        s.delete(table, cell, timestamp)?;
        Ok(())
    }

    async fn replica_get_range(
        &self,
        target: &NodeInfo,
        table: &str,
        range: &RangeRequest,
        timestamp: u64,
    ) -> Result<BoxRowStream, ReplicaError> {
        let storage = self.node(target).await?;
        let rows = storage.read().await.scan(table, range, timestamp)?;
        self.streams.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemRowStream {
            rows: rows.into(),
            closed: false,
            tracker: self.streams.clone(),
        }))
    }

    async fn replica_create_table(
        &self,
        target: &NodeInfo,
        table: &str,
        max_value_size: usize,
    ) -> Result<(), ReplicaError> {
        let storage = self.node(target).await?;
        storage.write().await.create_table(table, max_value_size);
        Ok(())
    }

    async fn replica_drop_table(&self, target: &NodeInfo, table: &str) -> Result<(), ReplicaError> {
        let storage = self.node(target).await?;
        storage.write().await.drop_table(table);
        Ok(())
    }
}

/// Row stream over a snapshot taken when the stream was opened.
struct MemRowStream {
    rows: VecDeque<RowResult<Value>>,
    closed: bool,
    tracker: Arc<StreamTracker>,
}

#[async_trait::async_trait]
impl RowStream for MemRowStream {
    async fn next_row(&mut self) -> Result<Option<RowResult<Value>>, ReplicaError> {
        if self.closed {
            return Err(ReplicaError::RpcFailed("stream already closed".into()));
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) {
        self.tracker.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.rows.clear();
    }
}

impl Drop for MemRowStream {
    fn drop(&mut self) {
        if !self.closed {
            self.tracker.dropped_open.fetch_add(1, Ordering::SeqCst);
        }
    }
}
