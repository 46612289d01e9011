//! Partitioned, replicated KV coordination layer.
//!
//! Provides: routing through a pluggable partition map, tunable quorums
//! (N/R/W), max-timestamp reconciliation of replica responses, and a lazy
//! k-way range merge over per-node streams.

pub mod chaos;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod memory;
pub mod node_info;
pub mod partition_map;
pub mod placement;
pub mod range_scan;
pub mod replica_client;

pub use coordinator::{KvCoordinator, QuorumConfig};
pub use error::KvError;
pub use executor::FanOutExecutor;
pub use node_info::NodeInfo;
pub use partition_map::PartitionMap;
pub use range_scan::RangeScan;
pub use replica_client::{BoxRowStream, ReplicaClient, ReplicaError, RowStream};
