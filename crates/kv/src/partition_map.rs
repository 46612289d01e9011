//! Routing port: who owns a key or range, and table lifecycle.
//!
//! The coordinator holds an `Arc<dyn PartitionMap>` and asks it for node
//! sets on every call; node handles are never cached across calls.

use crate::error::KvError;
use crate::node_info::NodeInfo;
use partkv_common::RangeRequest;
use std::collections::BTreeMap;

#[async_trait::async_trait]
pub trait PartitionMap: Send + Sync + 'static {
    /// Nodes to read `row` of `table` from.
    fn services_for_read(&self, table: &str, row: &[u8]) -> Result<Vec<NodeInfo>, KvError>;

    /// Nodes to write `row` of `table` to.
    fn services_for_write(&self, table: &str, row: &[u8]) -> Result<Vec<NodeInfo>, KvError>;

    /// Split `range` into disjoint sub-ranges, each with the nodes that own it.
    ///
    /// Every row of `range` falls in exactly one returned sub-range.
    fn services_for_range_read(
        &self,
        table: &str,
        range: &RangeRequest,
    ) -> Result<Vec<(RangeRequest, Vec<NodeInfo>)>, KvError>;

    async fn add_table(&self, table: &str, max_value_size: usize) -> Result<(), KvError>;

    async fn drop_table(&self, table: &str) -> Result<(), KvError>;

    /// Opaque metadata stored for `table`, if any.
    async fn table_metadata(&self, table: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Replace the metadata of an existing table; unknown tables fail with
    /// `TableNotFound`.
    async fn store_table_metadata(&self, table: &str, metadata: Vec<u8>) -> Result<(), KvError>;

    async fn all_table_names(&self) -> Result<Vec<String>, KvError>;

    async fn tables_metadata(&self) -> Result<BTreeMap<String, Vec<u8>>, KvError>;

    async fn tear_down(&self) -> Result<(), KvError>;
}
