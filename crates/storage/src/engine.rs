//! Storage engine: the tables held by one reference node.
//!
//! Each table is a [`CellTable`] plus the maximum value size it was
//! created with. All operations are synchronous; the async boundary is at
//! the caller (the replica client).

use crate::memtable::CellTable;
use partkv_common::{Cell, ColumnSelection, RangeRequest, RowResult, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("value of {size} bytes exceeds table limit of {max}")]
    ValueTooLarge { size: usize, max: usize },
    #[error("cell already exists")]
    KeyAlreadyExists,
}

#[derive(Debug)]
struct TableState {
    max_value_size: usize,
    cells: CellTable,
}

/// All tables stored on one node.
#[derive(Debug, Default)]
pub struct StorageEngine {
    tables: HashMap<String, TableState>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table. Creating an existing table keeps its data and
    /// updates the value size limit.
    pub fn create_table(&mut self, name: &str, max_value_size: usize) {
        match self.tables.get_mut(name) {
            Some(state) => state.max_value_size = max_value_size,
            None => {
                self.tables.insert(
                    name.to_string(),
                    TableState {
                        max_value_size,
                        cells: CellTable::new(),
                    },
                );
                tracing::debug!("created table '{}' (max value {} bytes)", name, max_value_size);
            }
        }
    }

    /// Drop a table and all of its data. Dropping a missing table is a no-op.
    pub fn drop_table(&mut self, name: &str) {
        if self.tables.remove(name).is_some() {
            tracing::debug!("dropped table '{}'", name);
        }
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn get(&self, table: &str, cell: &Cell, bound: u64) -> Result<Option<Value>, StorageError> {
        Ok(self.table(table)?.cells.get(cell, bound))
    }

    pub fn get_row(
        &self,
        table: &str,
        row: &[u8],
        columns: &ColumnSelection,
        bound: u64,
    ) -> Result<Vec<(Cell, Value)>, StorageError> {
        Ok(self.table(table)?.cells.get_row(row, columns, bound))
    }

    pub fn put(
        &mut self,
        table: &str,
        cell: Cell,
        contents: Vec<u8>,
        timestamp: u64,
    ) -> Result<(), StorageError> {
        let state = self.table_mut(table)?;
        check_size(state, &contents)?;
        state.cells.put(cell, timestamp, contents);
        Ok(())
    }

    /// Write only if no version of the cell exists yet.
    pub fn put_unless_exists(
        &mut self,
        table: &str,
        cell: Cell,
        contents: Vec<u8>,
        timestamp: u64,
    ) -> Result<(), StorageError> {
        let state = self.table_mut(table)?;
        check_size(state, &contents)?;
        if state.cells.contains(&cell) {
            return Err(StorageError::KeyAlreadyExists);
        }
        state.cells.put(cell, timestamp, contents);
        Ok(())
    }

    /// Remove one version. Deleting a missing version succeeds.
    pub fn delete(&mut self, table: &str, cell: &Cell, timestamp: u64) -> Result<(), StorageError> {
        self.table_mut(table)?.cells.delete(cell, timestamp);
        Ok(())
    }

    pub fn scan(
        &self,
        table: &str,
        range: &RangeRequest,
        bound: u64,
    ) -> Result<Vec<RowResult<Value>>, StorageError> {
        Ok(self.table(table)?.cells.scan(range, bound))
    }

    /// Number of distinct cells in a table (0 if missing).
    pub fn cell_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |s| s.cells.len())
    }

    /// Total versions in a table (0 if missing).
    pub fn version_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |s| s.cells.total_versions())
    }

    fn table(&self, name: &str) -> Result<&TableState, StorageError> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableState, StorageError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }
}

fn check_size(state: &TableState, contents: &[u8]) -> Result<(), StorageError> {
    if contents.len() > state.max_value_size {
        return Err(StorageError::ValueTooLarge {
            size: contents.len(),
            max: state.max_value_size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        let mut e = StorageEngine::new();
        e.create_table("t", 1024);
        e
    }

    #[test]
    fn test_engine_put_get() {
        let mut e = engine();
        e.put("t", Cell::new("r", "c"), b"v1".to_vec(), 3).unwrap();
        let v = e.get("t", &Cell::new("r", "c"), 3).unwrap().unwrap();
        assert_eq!(v, Value::new("v1", 3));
        assert_eq!(e.get("t", &Cell::new("r", "c"), 2).unwrap(), None);
    }

    #[test]
    fn test_missing_table() {
        let mut e = StorageEngine::new();
        let err = e.put("nope", Cell::new("r", "c"), vec![], 1).unwrap_err();
        assert_eq!(err, StorageError::TableNotFound("nope".into()));
        assert!(e.get("nope", &Cell::new("r", "c"), 1).is_err());
    }

    #[test]
    fn test_value_size_limit() {
        let mut e = StorageEngine::new();
        e.create_table("small", 4);
        e.put("small", Cell::new("r", "c"), b"1234".to_vec(), 1).unwrap();
        let err = e
            .put("small", Cell::new("r", "c"), b"12345".to_vec(), 2)
            .unwrap_err();
        assert_eq!(err, StorageError::ValueTooLarge { size: 5, max: 4 });
    }

    #[test]
    fn test_put_unless_exists() {
        let mut e = engine();
        let cell = Cell::new("r", "c");
        e.put_unless_exists("t", cell.clone(), b"first".to_vec(), 0)
            .unwrap();
        let err = e
            .put_unless_exists("t", cell.clone(), b"second".to_vec(), 0)
            .unwrap_err();
        assert_eq!(err, StorageError::KeyAlreadyExists);
        assert_eq!(e.get("t", &cell, 0).unwrap().unwrap().contents, b"first");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut e = engine();
        let cell = Cell::new("r", "c");
        e.put("t", cell.clone(), b"v".to_vec(), 1).unwrap();
        e.delete("t", &cell, 1).unwrap();
        e.delete("t", &cell, 1).unwrap();
        assert_eq!(e.get("t", &cell, 10).unwrap(), None);
    }

    #[test]
    fn test_create_existing_table_keeps_data() {
        let mut e = engine();
        e.put("t", Cell::new("r", "c"), b"v".to_vec(), 1).unwrap();
        e.create_table("t", 2048);
        assert_eq!(e.cell_count("t"), 1);
    }

    #[test]
    fn test_drop_table() {
        let mut e = engine();
        e.put("t", Cell::new("r", "c"), b"v".to_vec(), 1).unwrap();
        e.drop_table("t");
        assert!(!e.has_table("t"));
        assert_eq!(e.version_count("t"), 0);
        e.drop_table("t");
    }

    #[test]
    fn test_scan() {
        let mut e = engine();
        for row in ["a", "b", "c"] {
            e.put("t", Cell::new(row, "c"), row.as_bytes().to_vec(), 1)
                .unwrap();
        }
        let rows = e.scan("t", &RangeRequest::all(), 1).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].row(), b"c");
    }
}
