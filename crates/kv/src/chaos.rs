//! Chaos injection wrapper for [`ReplicaClient`].
//!
//! [`ChaosReplicaClient`] wraps any `R: ReplicaClient` and injects
//! configurable failures: random errors, per-node failures, latency, and
//! range streams that break after a fixed number of rows.

use crate::node_info::NodeInfo;
use crate::replica_client::{BoxRowStream, ReplicaClient, ReplicaError, RowStream};
use partkv_common::{Cell, ColumnSelection, NodeId, RangeRequest, RowResult, Value};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Configuration for replica chaos injection.
#[derive(Debug, Clone)]
pub struct ChaosReplicaConfig {
    /// Probability of returning an error \[0.0, 1.0\].
    pub failure_rate: f64,
    /// Fixed latency injected before forwarding.
    pub latency: Duration,
    /// Random additional latency in \[0, jitter\].
    pub jitter: Duration,
}

impl Default for ChaosReplicaConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

/// A [`ReplicaClient`] wrapper that injects chaos (failures, latency, per-node blocks).
pub struct ChaosReplicaClient<R: ReplicaClient> {
    inner: Arc<R>,
    config: Arc<RwLock<ChaosReplicaConfig>>,
    /// Nodes that are explicitly marked as failed.
    failed_nodes: Arc<RwLock<HashSet<NodeId>>>,
    /// Nodes whose range streams fail after this many rows.
    broken_streams: Arc<RwLock<HashMap<NodeId, usize>>>,
    /// Nodes that pause for a fixed time before every call.
    slow_nodes: Arc<RwLock<HashMap<NodeId, Duration>>>,
}

impl<R: ReplicaClient> std::fmt::Debug for ChaosReplicaClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosReplicaClient").finish_non_exhaustive()
    }
}

impl<R: ReplicaClient> ChaosReplicaClient<R> {
    pub fn new(inner: R, config: ChaosReplicaConfig) -> Self {
        Self::wrap(Arc::new(inner), config)
    }

    /// Wrap a client that is shared with other owners.
    pub fn wrap(inner: Arc<R>, config: ChaosReplicaConfig) -> Self {
        Self {
            inner,
            config: Arc::new(RwLock::new(config)),
            failed_nodes: Arc::new(RwLock::new(HashSet::new())),
            broken_streams: Arc::new(RwLock::new(HashMap::new())),
            slow_nodes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    /// Mark a node as permanently failed (until recovered).
    pub async fn fail_node(&self, node_id: NodeId) {
        self.failed_nodes.write().await.insert(node_id);
    }

    /// Remove a node from the failed set and clear its other faults.
    pub async fn recover_node(&self, node_id: NodeId) {
        self.failed_nodes.write().await.remove(&node_id);
        self.broken_streams.write().await.remove(&node_id);
        self.slow_nodes.write().await.remove(&node_id);
    }

    /// Dynamically update the random failure rate.
    pub async fn set_failure_rate(&self, rate: f64) {
        self.config.write().await.failure_rate = rate;
    }

    /// Make range streams from `node_id` fail after yielding `rows` rows.
    pub async fn break_streams_after(&self, node_id: NodeId, rows: usize) {
        self.broken_streams.write().await.insert(node_id, rows);
    }

    /// Delay every call to `node_id` by `delay`.
    pub async fn slow_node(&self, node_id: NodeId, delay: Duration) {
        self.slow_nodes.write().await.insert(node_id, delay);
    }

    /// Apply chaos checks: returns Err if the request should fail.
    async fn maybe_fail(&self, target: &NodeInfo) -> Result<(), ReplicaError> {
        // Check explicit node failures
        {
            let failed = self.failed_nodes.read().await;
            if failed.contains(&target.id) {
                return Err(ReplicaError::RpcFailed(
                    "chaos: node marked as failed".into(),
                ));
            }
        }

        let node_delay = self
            .slow_nodes
            .read()
            .await
            .get(&target.id)
            .copied()
            .unwrap_or(Duration::ZERO);

        // Read config
        let (delay, failure_rate) = {
            let config = self.config.read().await;
            let jitter_ms = if config.jitter.is_zero() {
                0
            } else {
                rand::thread_rng().gen_range(0..=config.jitter.as_millis() as u64)
            };
            let delay = config.latency + node_delay + Duration::from_millis(jitter_ms);
            (delay, config.failure_rate)
        };

        // Inject latency
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        // Random failure
        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate.min(1.0)) {
            return Err(ReplicaError::RpcFailed("chaos: random failure".into()));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: ReplicaClient> ReplicaClient for ChaosReplicaClient<R> {
    async fn replica_get(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<Option<Value>, ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner.replica_get(target, table, cell, timestamp).await
    }

    async fn replica_get_rows(
        &self,
        target: &NodeInfo,
        table: &str,
        rows: &[Vec<u8>],
        columns: &ColumnSelection,
        timestamp: u64,
    ) -> Result<Vec<(Cell, Value)>, ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner
            .replica_get_rows(target, table, rows, columns, timestamp)
            .await
    }

    async fn replica_put(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        value: &Value,
    ) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner.replica_put(target, table, cell, value).await
    }

    async fn replica_put_unless_exists(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        contents: &[u8],
    ) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner
            .replica_put_unless_exists(target, table, cell, contents)
            .await
    }

    async fn replica_delete(
        &self,
        target: &NodeInfo,
        table: &str,
        cell: &Cell,
        timestamp: u64,
    ) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner
            .replica_delete(target, table, cell, timestamp)
            .await
    }

    async fn replica_get_range(
        &self,
        target: &NodeInfo,
        table: &str,
        range: &RangeRequest,
        timestamp: u64,
    ) -> Result<BoxRowStream, ReplicaError> {
        self.maybe_fail(target).await?;
        let stream = self
            .inner
            .replica_get_range(target, table, range, timestamp)
            .await?;
        let fail_after = self.broken_streams.read().await.get(&target.id).copied();
        Ok(match fail_after {
            Some(rows) => Box::new(BrokenRowStream {
                inner: stream,
                remaining: rows,
            }),
            None => stream,
        })
    }

    async fn replica_create_table(
        &self,
        target: &NodeInfo,
        table: &str,
        max_value_size: usize,
    ) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner
            .replica_create_table(target, table, max_value_size)
            .await
    }

    async fn replica_drop_table(&self, target: &NodeInfo, table: &str) -> Result<(), ReplicaError> {
        self.maybe_fail(target).await?;
        self.inner.replica_drop_table(target, table).await
    }
}

/// Forwards `remaining` rows, then fails every later read.
struct BrokenRowStream {
    inner: BoxRowStream,
    remaining: usize,
}

#[async_trait::async_trait]
impl RowStream for BrokenRowStream {
    async fn next_row(&mut self) -> Result<Option<RowResult<Value>>, ReplicaError> {
        if self.remaining == 0 {
            return Err(ReplicaError::RpcFailed("chaos: stream broken".into()));
        }
        self.remaining -= 1;
        self.inner.next_row().await
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

// ────────────────────────── Tests ──────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemReplicaClient;

    fn target(name: &str) -> NodeInfo {
        NodeInfo::from_name(name)
    }

    async fn chaos_with(nodes: &[&str]) -> ChaosReplicaClient<InMemReplicaClient> {
        let inner = InMemReplicaClient::default();
        for name in nodes {
            let node = target(name);
            inner.add_node(&node).await;
            inner.replica_create_table(&node, "t", 1024).await.unwrap();
        }
        ChaosReplicaClient::new(inner, ChaosReplicaConfig::default())
    }

    fn cell() -> Cell {
        Cell::new("row", "col")
    }

    #[tokio::test]
    async fn test_chaos_replica_passthrough() {
        let chaos = chaos_with(&["node1"]).await;
        let t = target("node1");
        let v = Value::new("val", 1);
        assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_ok());
        assert_eq!(chaos.replica_get(&t, "t", &cell(), 1).await.unwrap(), Some(v));
    }

    #[tokio::test]
    async fn test_chaos_replica_fail_node() {
        let chaos = chaos_with(&["node1", "node2"]).await;
        let t = target("node1");
        let v = Value::new("val", 1);

        chaos.fail_node(t.id).await;
        assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_err());
        assert!(chaos.replica_get(&t, "t", &cell(), 1).await.is_err());

        // Other nodes still work
        let t2 = target("node2");
        assert!(chaos.replica_put(&t2, "t", &cell(), &v).await.is_ok());
    }

    #[tokio::test]
    async fn test_chaos_replica_recover_node() {
        let chaos = chaos_with(&["node1"]).await;
        let t = target("node1");
        let v = Value::new("val", 1);

        chaos.fail_node(t.id).await;
        assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_err());

        chaos.recover_node(t.id).await;
        assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_ok());
    }

    #[tokio::test]
    async fn test_chaos_replica_random_failure() {
        let inner = InMemReplicaClient::default();
        let t = target("node1");
        inner.add_node(&t).await;
        inner.replica_create_table(&t, "t", 1024).await.unwrap();
        let config = ChaosReplicaConfig {
            failure_rate: 1.0,
            ..Default::default()
        };
        let chaos = ChaosReplicaClient::new(inner, config);
        let v = Value::new("val", 1);

        for _ in 0..10 {
            assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_err());
        }

        // Set back to 0
        chaos.set_failure_rate(0.0).await;
        assert!(chaos.replica_put(&t, "t", &cell(), &v).await.is_ok());
    }

    #[tokio::test]
    async fn test_broken_stream_fails_after_rows() {
        let chaos = chaos_with(&["node1"]).await;
        let t = target("node1");
        for row in ["a", "b", "c"] {
            chaos
                .replica_put(&t, "t", &Cell::new(row, "c"), &Value::new("v", 1))
                .await
                .unwrap();
        }
        chaos.break_streams_after(t.id, 2).await;

        let mut stream = chaos
            .replica_get_range(&t, "t", &RangeRequest::all(), 1)
            .await
            .unwrap();
        assert!(stream.next_row().await.unwrap().is_some());
        assert!(stream.next_row().await.unwrap().is_some());
        assert!(stream.next_row().await.is_err());
        stream.close();

        let tracker = chaos.inner().stream_tracker();
        assert_eq!(tracker.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_node_delays_calls() {
        let chaos = chaos_with(&["node1"]).await;
        let t = target("node1");
        chaos.slow_node(t.id, Duration::from_millis(30)).await;

        let start = tokio::time::Instant::now();
        chaos.replica_get(&t, "t", &cell(), 1).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
