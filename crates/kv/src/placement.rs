//! Static range placement: ordered split points over a fixed node ring.
//!
//! `k` split points cut the row space into `k + 1` contiguous partitions.
//! Partition `i` covers `[split[i-1], split[i])` and is replicated on nodes
//! `i, i+1, .., i+n-1` of the ring (mod ring size).

use crate::error::KvError;
use crate::node_info::NodeInfo;
use crate::partition_map::PartitionMap;
use crate::replica_client::ReplicaClient;
use partkv_common::RangeRequest;
use partkv_config::{ConfigError, PartitionSettings};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Index of the partition holding `row`.
pub fn partition_index(split_points: &[Vec<u8>], row: &[u8]) -> usize {
    split_points.partition_point(|split| split.as_slice() <= row)
}

/// The `n` ring nodes replicating partition `index`.
pub fn replica_nodes(ring: &[NodeInfo], index: usize, n: usize) -> Vec<NodeInfo> {
    if ring.is_empty() {
        return Vec::new();
    }
    (0..n.min(ring.len()))
        .map(|k| ring[(index + k) % ring.len()].clone())
        .collect()
}

/// Ascending bounds of partition `index`.
fn partition_bounds(split_points: &[Vec<u8>], index: usize) -> (Bound<&[u8]>, Bound<&[u8]>) {
    let lower = match index {
        0 => Bound::Unbounded,
        i => Bound::Included(split_points[i - 1].as_slice()),
    };
    let upper = match split_points.get(index) {
        Some(split) => Bound::Excluded(split.as_slice()),
        None => Bound::Unbounded,
    };
    (lower, upper)
}

/// Reference [`PartitionMap`] with a fixed layout.
///
/// Table creation and drop are pushed to every node in the ring through the
/// replica client; table metadata is held in the map itself.
pub struct StaticPartitionMap<R: ReplicaClient> {
    ring: Vec<NodeInfo>,
    split_points: Vec<Vec<u8>>,
    n: usize,
    client: Arc<R>,
    tables: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl<R: ReplicaClient> std::fmt::Debug for StaticPartitionMap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPartitionMap")
            .field("ring", &self.ring)
            .field("partitions", &(self.split_points.len() + 1))
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}

impl<R: ReplicaClient> StaticPartitionMap<R> {
    /// Build a map over `ring` with ascending `split_points`.
    pub fn new(
        ring: Vec<NodeInfo>,
        split_points: Vec<Vec<u8>>,
        n: usize,
        client: Arc<R>,
    ) -> Result<Self, KvError> {
        if ring.is_empty() {
            return Err(ConfigError::Invalid("partition map needs at least one node".into()).into());
        }
        if split_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(
                ConfigError::Invalid("split points must be strictly ascending".into()).into(),
            );
        }
        Ok(Self {
            ring,
            split_points,
            n,
            client,
            tables: RwLock::new(BTreeMap::new()),
        })
    }

    /// Build a map from the `partition` section of the config.
    pub fn from_settings(
        settings: &PartitionSettings,
        n: usize,
        client: Arc<R>,
    ) -> Result<Self, KvError> {
        let ring = settings.nodes.iter().map(NodeInfo::from_name).collect();
        let splits = settings
            .split_points
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect();
        Self::new(ring, splits, n, client)
    }

    pub fn ring(&self) -> &[NodeInfo] {
        &self.ring
    }

    pub fn partition_count(&self) -> usize {
        self.split_points.len() + 1
    }

    fn owners(&self, row: &[u8]) -> Vec<NodeInfo> {
        replica_nodes(&self.ring, partition_index(&self.split_points, row), self.n)
    }
}

#[async_trait::async_trait]
impl<R: ReplicaClient> PartitionMap for StaticPartitionMap<R> {
    fn services_for_read(&self, _table: &str, row: &[u8]) -> Result<Vec<NodeInfo>, KvError> {
        Ok(self.owners(row))
    }

    fn services_for_write(&self, _table: &str, row: &[u8]) -> Result<Vec<NodeInfo>, KvError> {
        Ok(self.owners(row))
    }

    fn services_for_range_read(
        &self,
        _table: &str,
        range: &RangeRequest,
    ) -> Result<Vec<(RangeRequest, Vec<NodeInfo>)>, KvError> {
        let mut pieces: Vec<_> = (0..self.partition_count())
            .filter_map(|i| {
                let (lower, upper) = partition_bounds(&self.split_points, i);
                range
                    .intersect(lower, upper)
                    .map(|piece| (piece, replica_nodes(&self.ring, i, self.n)))
            })
            .collect();
        if range.is_reversed() {
            pieces.reverse();
        }
        Ok(pieces)
    }

    async fn add_table(&self, table: &str, max_value_size: usize) -> Result<(), KvError> {
        let calls = self.ring.iter().map(|node| {
            let client = self.client.clone();
            async move {
                client
                    .replica_create_table(node, table, max_value_size)
                    .await
                    .map_err(|e| (node, e))
            }
        });
        let failures: Vec<_> = futures::future::join_all(calls)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if let Some((node, e)) = failures.first() {
            tracing::warn!(
                "create table '{}' failed on {} of {} nodes (first: {}: {})",
                table,
                failures.len(),
                self.ring.len(),
                node,
                e
            );
            return Err(KvError::InsufficientConsistency(format!(
                "create table '{}' failed on {}: {}",
                table, node, e
            )));
        }

        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default();
        tracing::info!("created table '{}' on {} nodes", table, self.ring.len());
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), KvError> {
        let calls = self.ring.iter().map(|node| {
            let client = self.client.clone();
            async move {
                client
                    .replica_drop_table(node, table)
                    .await
                    .map_err(|e| (node, e))
            }
        });
        let failures: Vec<_> = futures::future::join_all(calls)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if let Some((node, e)) = failures.first() {
            tracing::warn!(
                "drop table '{}' failed on {} of {} nodes",
                table,
                failures.len(),
                self.ring.len()
            );
            return Err(KvError::InsufficientConsistency(format!(
                "drop table '{}' failed on {}: {}",
                table, node, e
            )));
        }

        self.tables.write().await.remove(table);
        tracing::info!("dropped table '{}'", table);
        Ok(())
    }

    async fn table_metadata(&self, table: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.tables.read().await.get(table).cloned())
    }

    async fn store_table_metadata(&self, table: &str, metadata: Vec<u8>) -> Result<(), KvError> {
        match self.tables.write().await.get_mut(table) {
            Some(slot) => {
                *slot = metadata;
                Ok(())
            }
            None => Err(KvError::TableNotFound(table.to_string())),
        }
    }

    async fn all_table_names(&self) -> Result<Vec<String>, KvError> {
        Ok(self.tables.read().await.keys().cloned().collect())
    }

    async fn tables_metadata(&self) -> Result<BTreeMap<String, Vec<u8>>, KvError> {
        Ok(self.tables.read().await.clone())
    }

    async fn tear_down(&self) -> Result<(), KvError> {
        let tables = self.tables.read().await.len();
        tracing::info!(
            "tearing down partition map ({} nodes, {} tables)",
            self.ring.len(),
            tables
        );
        Ok(())
    }
}
