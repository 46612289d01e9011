//! KV coordinator: quorum reads and writes over a partitioned, replicated table space.
//!
//! For every operation the coordinator:
//! 1. Asks the partition map which nodes own the key or range
//! 2. Sends node calls in parallel through the fan-out executor
//! 3. Counts successes against R (reads), W (writes) or every replica (deletes)
//! 4. Merges responses, keeping the max-timestamp value per cell
//!
//! Range reads return a lazy [`RangeScan`] instead of materialized rows.

use crate::cursor::PeekingCursor;
use crate::error::KvError;
use crate::executor::FanOutExecutor;
use crate::node_info::NodeInfo;
use crate::partition_map::PartitionMap;
use crate::placement::StaticPartitionMap;
use crate::range_scan::{RangeScan, SubRangeMerge};
use crate::replica_client::{BoxRowStream, ReplicaClient, ReplicaError};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use partkv_common::{Cell, ColumnSelection, RangeRequest, RowResult, Value};
use partkv_config::{CoordinatorConfig, QuorumSettings};
use partkv_metrics::{metrics, record_quorum_failure, start_op_timer};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Quorum and replication configuration.
#[derive(Debug, Clone)]
pub struct QuorumConfig {
    /// Replication factor (N).
    pub n: usize,
    /// Read quorum (R).
    pub r: usize,
    /// Write quorum (W).
    pub w: usize,
    /// Per-call read deadline.
    pub read_timeout: Duration,
    /// Per-call write deadline.
    pub write_timeout: Duration,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            n: 3,
            r: 2,
            w: 2,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&QuorumSettings> for QuorumConfig {
    fn from(q: &QuorumSettings) -> Self {
        Self {
            n: q.n,
            r: q.r,
            w: q.w,
            read_timeout: Duration::from_millis(q.read_timeout_ms),
            write_timeout: Duration::from_millis(q.write_timeout_ms),
        }
    }
}

type Response<T> = (NodeInfo, Result<T, ReplicaError>);
type Pending<T> = FuturesUnordered<JoinHandle<Result<Response<T>, KvError>>>;

/// A range stream open attempt: (sub-range index, position in its node list, node, result).
type StreamOpen = (usize, usize, NodeInfo, Result<BoxRowStream, ReplicaError>);

/// Partitioned, replicated KV coordinator.
///
/// Generic over `R: ReplicaClient` for testability; the partition map is a
/// trait object so routing can be swapped without touching the coordinator.
pub struct KvCoordinator<R: ReplicaClient> {
    partition_map: Arc<dyn PartitionMap>,
    replica_client: Arc<R>,
    executor: FanOutExecutor,
    config: QuorumConfig,
}

impl<R: ReplicaClient> std::fmt::Debug for KvCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvCoordinator")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl<R: ReplicaClient> KvCoordinator<R> {
    pub fn new(
        partition_map: Arc<dyn PartitionMap>,
        replica_client: Arc<R>,
        executor: FanOutExecutor,
        config: QuorumConfig,
    ) -> Self {
        Self {
            partition_map,
            replica_client,
            executor,
            config,
        }
    }

    /// Build a coordinator over a [`StaticPartitionMap`] described by `config`.
    pub fn from_config(config: &CoordinatorConfig, replica_client: Arc<R>) -> Result<Self, KvError> {
        config.validate()?;
        let map = StaticPartitionMap::from_settings(
            &config.partition,
            config.quorum.n,
            replica_client.clone(),
        )?;
        Ok(Self::new(
            Arc::new(map),
            replica_client,
            FanOutExecutor::new(config.executor.worker_permits),
            QuorumConfig::from(&config.quorum),
        ))
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    pub fn executor(&self) -> &FanOutExecutor {
        &self.executor
    }

    pub fn partition_map(&self) -> &Arc<dyn PartitionMap> {
        &self.partition_map
    }

    // -----------------------------------------------------------------------
    // Point reads
    // -----------------------------------------------------------------------

    /// Read the latest value (timestamp `<=` the bound) of each cell.
    ///
    /// Cells with no visible value on any responding replica are omitted.
    pub async fn get(
        &self,
        table: &str,
        cells: &BTreeMap<Cell, u64>,
    ) -> Result<BTreeMap<Cell, Value>, KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("get");

        let reads = cells.iter().map(|(cell, ts)| async move {
            self.get_cell(table, cell, *ts)
                .await
                .map(|value| value.map(|v| (cell.clone(), v)))
        });
        let found = futures::future::try_join_all(reads).await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// Timestamp of the latest value of each cell, as seen by a read quorum.
    pub async fn get_latest_timestamps(
        &self,
        table: &str,
        cells: &BTreeMap<Cell, u64>,
    ) -> Result<BTreeMap<Cell, u64>, KvError> {
        Ok(self
            .get(table, cells)
            .await?
            .into_iter()
            .map(|(cell, value)| (cell, value.timestamp))
            .collect())
    }

    /// Quorum read of one cell: the max-timestamp value over every replica
    /// that answered before the deadline.
    async fn get_cell(&self, table: &str, cell: &Cell, ts: u64) -> Result<Option<Value>, KvError> {
        metrics().gets.inc();
        let nodes = self.partition_map.services_for_read(table, &cell.row)?;
        let deadline = Instant::now() + self.config.read_timeout;

        let mut pending = self.spawn_each(&nodes, |client, node| {
            let table = table.to_string();
            let cell = cell.clone();
            async move { client.replica_get(&node, &table, &cell, ts).await }
        });

        let mut latest: Option<Value> = None;
        let mut successes = 0usize;
        while let Some((node, result)) = next_response(&mut pending, deadline).await {
            match result {
                Ok(value) => {
                    successes += 1;
                    if let Some(v) = value {
                        latest = Some(Value::newest(latest.take(), v));
                    }
                }
                Err(e) => log_node_failure("get", &node, &e),
            }
        }

        if successes < self.config.r {
            return Err(quorum_failure(KvError::InsufficientReads {
                needed: self.config.r,
                got: successes,
            }));
        }
        Ok(latest)
    }

    /// Read whole rows (restricted to `columns`).
    ///
    /// Every returned cell must have been reported by at least R replicas;
    /// the check runs once, after all rows have been fetched.
    pub async fn get_rows(
        &self,
        table: &str,
        rows: &[Vec<u8>],
        columns: &ColumnSelection,
        ts: u64,
    ) -> Result<Vec<RowResult<Value>>, KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("get_rows");

        let unique: BTreeSet<&Vec<u8>> = rows.iter().collect();
        let mut seen: BTreeMap<Cell, (Value, usize)> = BTreeMap::new();

        for row in unique {
            metrics().gets.inc();
            let nodes = self.partition_map.services_for_read(table, row)?;
            let deadline = Instant::now() + self.config.read_timeout;
            let mut pending = self.spawn_each(&nodes, |client, node| {
                let table = table.to_string();
                let rows = vec![row.clone()];
                let columns = columns.clone();
                async move {
                    client
                        .replica_get_rows(&node, &table, &rows, &columns, ts)
                        .await
                }
            });

            while let Some((node, result)) = next_response(&mut pending, deadline).await {
                match result {
                    Ok(cells) => {
                        for (cell, value) in cells {
                            match seen.remove(&cell) {
                                Some((current, count)) => {
                                    seen.insert(cell, (Value::newest(Some(current), value), count + 1));
                                }
                                None => {
                                    seen.insert(cell, (value, 1));
                                }
                            }
                        }
                    }
                    Err(e) => log_node_failure("get_rows", &node, &e),
                }
            }
        }

        if let Some((cell, (_, count))) = seen
            .iter()
            .filter(|(_, (_, count))| *count < self.config.r)
            .min_by_key(|(_, (_, count))| *count)
        {
            tracing::debug!("cell {} read from only {} replicas", describe(cell), count);
            return Err(quorum_failure(KvError::InsufficientReads {
                needed: self.config.r,
                got: *count,
            }));
        }

        Ok(group_rows(seen))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write every cell at timestamp `ts`.
    ///
    /// Cells are written one after another; the first cell to miss its
    /// write quorum aborts the call and earlier cells stay written.
    pub async fn put(
        &self,
        table: &str,
        values: &BTreeMap<Cell, Vec<u8>>,
        ts: u64,
    ) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("put");
        for (cell, contents) in values {
            self.put_cell(table, cell, Value::new(contents.clone(), ts))
                .await?;
        }
        Ok(())
    }

    /// Write cells that each carry their own timestamp.
    pub async fn put_with_timestamps(
        &self,
        table: &str,
        values: &[(Cell, Value)],
    ) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("put");
        for (cell, value) in values {
            self.put_cell(table, cell, value.clone()).await?;
        }
        Ok(())
    }

    /// `put` applied to several tables in turn.
    pub async fn multi_put(
        &self,
        values: &BTreeMap<String, BTreeMap<Cell, Vec<u8>>>,
        ts: u64,
    ) -> Result<(), KvError> {
        for (table, cells) in values {
            self.put(table, cells, ts).await?;
        }
        Ok(())
    }

    /// Fan one write out to the write set and wait for W acks.
    async fn put_cell(&self, table: &str, cell: &Cell, value: Value) -> Result<(), KvError> {
        metrics().puts.inc();
        let nodes = self.partition_map.services_for_write(table, &cell.row)?;
        let deadline = Instant::now() + self.config.write_timeout;
        let value = Arc::new(value);

        let mut pending = self.spawn_each(&nodes, |client, node| {
            let table = table.to_string();
            let cell = cell.clone();
            let value = value.clone();
            async move { client.replica_put(&node, &table, &cell, &value).await }
        });

        let w = self.config.w;
        let mut acks = 0usize;
        while acks < w {
            let Some((node, result)) = next_response(&mut pending, deadline).await else {
                break;
            };
            match result {
                Ok(()) => acks += 1,
                Err(e) => log_node_failure("put", &node, &e),
            }
        }

        if acks < w {
            return Err(quorum_failure(KvError::InsufficientWrites {
                needed: w,
                got: acks,
            }));
        }
        Ok(())
    }

    /// Write each cell only where it does not exist yet.
    ///
    /// Every replica checks for itself. If any replica already holds the
    /// cell the call fails with `KeyAlreadyExists`, even when others accepted
    /// the write.
    pub async fn put_unless_exists(
        &self,
        table: &str,
        values: &BTreeMap<Cell, Vec<u8>>,
    ) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("put_unless_exists");

        for (cell, contents) in values {
            metrics().puts.inc();
            let nodes = self.partition_map.services_for_write(table, &cell.row)?;
            let deadline = Instant::now() + self.config.write_timeout;
            let contents = Arc::new(contents.clone());

            let mut pending = self.spawn_each(&nodes, |client, node| {
                let table = table.to_string();
                let cell = cell.clone();
                let contents = contents.clone();
                async move {
                    client
                        .replica_put_unless_exists(&node, &table, &cell, &contents)
                        .await
                }
            });

            let mut acks = 0usize;
            let mut exists = false;
            while let Some((node, result)) = next_response(&mut pending, deadline).await {
                match result {
                    Ok(()) => acks += 1,
                    Err(ReplicaError::KeyAlreadyExists) => exists = true,
                    Err(e) => log_node_failure("put_unless_exists", &node, &e),
                }
            }

            if exists {
                return Err(KvError::KeyAlreadyExists(format!(
                    "{} in table '{}'",
                    describe(cell),
                    table
                )));
            }
            if acks < self.config.w {
                return Err(quorum_failure(KvError::InsufficientWrites {
                    needed: self.config.w,
                    got: acks,
                }));
            }
        }
        Ok(())
    }

    /// Remove `(cell, timestamp)` versions. Every replica in the write set
    /// must acknowledge each delete.
    pub async fn delete(&self, table: &str, cells: &[(Cell, u64)]) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("delete");

        for (cell, ts) in cells {
            metrics().deletes.inc();
            let ts = *ts;
            let nodes = self.partition_map.services_for_write(table, &cell.row)?;
            let deadline = Instant::now() + self.config.write_timeout;

            let mut pending = self.spawn_each(&nodes, |client, node| {
                let table = table.to_string();
                let cell = cell.clone();
                async move { client.replica_delete(&node, &table, &cell, ts).await }
            });

            let mut acks = 0usize;
            while let Some((node, result)) = next_response(&mut pending, deadline).await {
                match result {
                    Ok(()) => acks += 1,
                    Err(e) => log_node_failure("delete", &node, &e),
                }
            }

            if acks < nodes.len() {
                return Err(quorum_failure(KvError::DeleteIncomplete {
                    needed: nodes.len(),
                    got: acks,
                }));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Range reads
    // -----------------------------------------------------------------------

    /// Open a merged scan over `range` as of `ts`.
    ///
    /// One node stream is opened per (sub-range, replica). Every sub-range
    /// needs at least R open streams; otherwise the streams that did open are
    /// closed and the call fails with `InsufficientReads`.
    pub async fn get_range(
        &self,
        table: &str,
        range: RangeRequest,
        ts: u64,
    ) -> Result<RangeScan, KvError> {
        self.executor.ensure_running()?;
        let _timer = start_op_timer("get_range");
        metrics().range_scans.inc();

        if range.is_empty() {
            return Ok(RangeScan::empty());
        }

        let mut pieces = self.partition_map.services_for_range_read(table, &range)?;
        pieces.sort_by(|a, b| a.0.compare_start(&b.0));

        let deadline = Instant::now() + self.config.read_timeout;
        let mut pending = PendingOpens::default();
        for (idx, (piece, nodes)) in pieces.iter().enumerate() {
            for (pos, node) in nodes.iter().enumerate() {
                let client = self.replica_client.clone();
                let node = node.clone();
                let table = table.to_string();
                let piece = piece.clone();
                pending.calls.push(self.executor.spawn(async move {
                    let opened = client.replica_get_range(&node, &table, &piece, ts).await;
                    (idx, pos, node, opened)
                }));
            }
        }

        let mut opened: Vec<Vec<(usize, PeekingCursor)>> =
            pieces.iter().map(|_| Vec::new()).collect();
        loop {
            match tokio::time::timeout_at(deadline, pending.calls.next()).await {
                Ok(Some(Ok(Ok((idx, pos, node, result))))) => match result {
                    Ok(stream) => {
                        metrics().streams_opened.inc();
                        opened[idx].push((pos, PeekingCursor::new(node, stream)));
                    }
                    Err(e) => log_node_failure("get_range", &node, &e),
                },
                Ok(Some(Ok(Err(e)))) => tracing::debug!("range open task not run: {}", e),
                Ok(Some(Err(e))) => tracing::debug!("range open task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!(
                        "range open deadline passed with {} calls pending",
                        pending.calls.len()
                    );
                    break;
                }
            }
        }
        drop(pending);

        if let Some(short) = opened.iter().map(Vec::len).filter(|&n| n < self.config.r).min() {
            // Dropping the cursors closes every stream that did open.
            drop(opened);
            return Err(quorum_failure(KvError::InsufficientReads {
                needed: self.config.r,
                got: short,
            }));
        }

        let subranges = pieces
            .into_iter()
            .zip(opened)
            .map(|((piece, _), mut cursors)| {
                cursors.sort_by_key(|(pos, _)| *pos);
                SubRangeMerge::new(piece, cursors.into_iter().map(|(_, c)| c).collect())
            })
            .collect();
        Ok(RangeScan::new(subranges))
    }

    pub async fn get_range_with_history(
        &self,
        _table: &str,
        _range: RangeRequest,
        _ts: u64,
    ) -> Result<RangeScan, KvError> {
        Err(KvError::NotImplemented("get_range_with_history"))
    }

    pub async fn get_range_of_timestamps(
        &self,
        _table: &str,
        _range: RangeRequest,
        _ts: u64,
    ) -> Result<RangeScan, KvError> {
        Err(KvError::NotImplemented("get_range_of_timestamps"))
    }

    pub async fn get_first_batch_for_ranges(
        &self,
        _table: &str,
        _ranges: &[RangeRequest],
        _ts: u64,
    ) -> Result<Vec<Vec<RowResult<Value>>>, KvError> {
        Err(KvError::NotImplemented("get_first_batch_for_ranges"))
    }

    pub async fn add_garbage_collection_sentinel_values(
        &self,
        _table: &str,
        _cells: &[Cell],
    ) -> Result<(), KvError> {
        Err(KvError::NotImplemented("add_garbage_collection_sentinel_values"))
    }

    pub async fn get_all_timestamps(
        &self,
        _table: &str,
        _cells: &BTreeSet<Cell>,
        _ts: u64,
    ) -> Result<BTreeMap<Cell, Vec<u64>>, KvError> {
        Err(KvError::NotImplemented("get_all_timestamps"))
    }

    pub async fn compact_internally(&self, _table: &str) -> Result<(), KvError> {
        Err(KvError::NotImplemented("compact_internally"))
    }

    pub async fn truncate_table(&self, _table: &str) -> Result<(), KvError> {
        Err(KvError::NotImplemented("truncate_table"))
    }

    pub async fn truncate_tables(&self, _tables: &[String]) -> Result<(), KvError> {
        Err(KvError::NotImplemented("truncate_tables"))
    }

    // -----------------------------------------------------------------------
    // Tables and metadata
    // -----------------------------------------------------------------------

    pub async fn create_table(&self, table: &str, max_value_size: usize) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        self.partition_map.add_table(table, max_value_size).await
    }

    pub async fn create_tables(&self, tables: &BTreeMap<String, usize>) -> Result<(), KvError> {
        for (table, max_value_size) in tables {
            self.create_table(table, *max_value_size).await?;
        }
        Ok(())
    }

    pub async fn drop_table(&self, table: &str) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        self.partition_map.drop_table(table).await
    }

    pub async fn get_all_table_names(&self) -> Result<Vec<String>, KvError> {
        self.executor.ensure_running()?;
        self.partition_map.all_table_names().await
    }

    /// Metadata stored for `table`; empty when none was stored.
    pub async fn get_metadata_for_table(&self, table: &str) -> Result<Vec<u8>, KvError> {
        self.executor.ensure_running()?;
        Ok(self
            .partition_map
            .table_metadata(table)
            .await?
            .unwrap_or_default())
    }

    pub async fn put_metadata_for_table(&self, table: &str, metadata: Vec<u8>) -> Result<(), KvError> {
        self.executor.ensure_running()?;
        self.partition_map.store_table_metadata(table, metadata).await
    }

    pub async fn get_metadata_for_tables(&self) -> Result<BTreeMap<String, Vec<u8>>, KvError> {
        self.executor.ensure_running()?;
        self.partition_map.tables_metadata().await
    }

    pub async fn put_metadata_for_tables(
        &self,
        metadata: BTreeMap<String, Vec<u8>>,
    ) -> Result<(), KvError> {
        for (table, bytes) in metadata {
            self.put_metadata_for_table(&table, bytes).await?;
        }
        Ok(())
    }

    /// Tear down the partition map and stop the fan-out executor.
    ///
    /// Every later data operation fails with `ShutDown`.
    pub async fn teardown(&self) -> Result<(), KvError> {
        if self.executor.is_shut_down() {
            return Ok(());
        }
        let result = self.partition_map.tear_down().await;
        self.executor.shutdown();
        result
    }

    // -----------------------------------------------------------------------
    // Internal: fan-out
    // -----------------------------------------------------------------------

    /// Spawn `call` once per node on the executor.
    fn spawn_each<T, F, Fut>(&self, nodes: &[NodeInfo], call: F) -> Pending<T>
    where
        F: Fn(Arc<R>, NodeInfo) -> Fut,
        Fut: Future<Output = Result<T, ReplicaError>> + Send + 'static,
        T: Send + 'static,
    {
        nodes
            .iter()
            .map(|node| {
                let fut = call(self.replica_client.clone(), node.clone());
                let node = node.clone();
                self.executor.spawn(async move { (node, fut.await) })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Next node response that arrives before `deadline`.
///
/// Tasks that panicked or never ran are skipped and count as failures.
async fn next_response<T>(pending: &mut Pending<T>, deadline: Instant) -> Option<Response<T>> {
    loop {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some(Ok(Ok(response)))) => return Some(response),
            Ok(Some(Ok(Err(e)))) => tracing::debug!("node call not run: {}", e),
            Ok(Some(Err(e))) => tracing::debug!("node call task failed: {}", e),
            Ok(None) => return None,
            Err(_) => {
                if !pending.is_empty() {
                    tracing::debug!("deadline passed with {} node calls pending", pending.len());
                }
                return None;
            }
        }
    }
}

/// Range open calls still in flight.
///
/// Whatever is left when this is dropped, after the deadline or because the
/// caller abandoned `get_range`, is handed to a background task that closes
/// each stream as it arrives.
#[derive(Default)]
struct PendingOpens {
    calls: FuturesUnordered<JoinHandle<Result<StreamOpen, KvError>>>,
}

impl Drop for PendingOpens {
    fn drop(&mut self) {
        if self.calls.is_empty() {
            return;
        }
        let calls = std::mem::take(&mut self.calls);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => release_late_streams(&handle, calls),
            Err(_) => tracing::warn!(
                "no runtime to release {} pending range opens",
                calls.len()
            ),
        }
    }
}

/// Close streams from open calls that finish after the coordinator gave up on them.
fn release_late_streams(
    handle: &tokio::runtime::Handle,
    mut pending: FuturesUnordered<JoinHandle<Result<StreamOpen, KvError>>>,
) {
    handle.spawn(async move {
        while let Some(joined) = pending.next().await {
            if let Ok(Ok((_, _, node, Ok(mut stream)))) = joined {
                metrics().streams_opened.inc();
                stream.close();
                metrics().streams_closed.inc();
                tracing::debug!("closed late range stream from {}", node);
            }
        }
    });
}

fn log_node_failure(op: &str, node: &NodeInfo, err: &ReplicaError) {
    tracing::debug!("{} on {} failed: {}", op, node, err);
}

fn quorum_failure(err: KvError) -> KvError {
    if let Some(kind) = err.quorum_kind() {
        record_quorum_failure(kind);
    }
    tracing::warn!("{}", err);
    err
}

fn describe(cell: &Cell) -> String {
    format!(
        "{}/{}",
        String::from_utf8_lossy(&cell.row),
        String::from_utf8_lossy(&cell.column)
    )
}

/// Fold row-major cells into one `RowResult` per row.
fn group_rows(cells: BTreeMap<Cell, (Value, usize)>) -> Vec<RowResult<Value>> {
    let mut rows: Vec<RowResult<Value>> = Vec::new();
    let mut current: Option<(Vec<u8>, BTreeMap<Vec<u8>, Value>)> = None;
    for (cell, (value, _)) in cells {
        match &mut current {
            Some((row, columns)) if *row == cell.row => {
                columns.insert(cell.column, value);
            }
            _ => {
                if let Some((row, columns)) = current.take() {
                    rows.push(RowResult::new(row, columns));
                }
                current = Some((cell.row, BTreeMap::from([(cell.column, value)])));
            }
        }
    }
    if let Some((row, columns)) = current {
        rows.push(RowResult::new(row, columns));
    }
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
