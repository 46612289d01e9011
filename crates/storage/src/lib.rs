//! Reference node storage for partkv: an in-memory multi-version cell store.
//!
//! Cells keep every version keyed by logical timestamp; reads at a bound see
//! the newest version at or below it.

pub mod engine;
pub mod memtable;

pub use engine::{StorageEngine, StorageError};
pub use memtable::CellTable;
