//! Cell, value and row types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single addressable storage location: `(row, column)`.
///
/// The derived ordering is row-major, then column, both lexicographic by byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: Vec<u8>,
    pub column: Vec<u8>,
}

impl Cell {
    pub fn new(row: impl Into<Vec<u8>>, column: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            column: column.into(),
        }
    }
}

/// A versioned payload stored at a cell.
///
/// `timestamp` is a logical version id handed out by the layers above,
/// not wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value {
    pub contents: Vec<u8>,
    pub timestamp: u64,
}

impl Value {
    pub fn new(contents: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Self {
            contents: contents.into(),
            timestamp,
        }
    }

    /// Keep whichever of `current` and `candidate` carries the larger timestamp.
    ///
    /// On a tie the existing value wins, so folding is stable.
    pub fn newest(current: Option<Value>, candidate: Value) -> Value {
        match current {
            Some(existing) if existing.timestamp >= candidate.timestamp => existing,
            _ => candidate,
        }
    }
}

/// Which columns a row read should return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    #[default]
    All,
    Only(BTreeSet<Vec<u8>>),
}

impl ColumnSelection {
    pub fn only<I, C>(columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, column: &[u8]) -> bool {
        match self {
            Self::All => true,
            Self::Only(columns) => columns.contains(column),
        }
    }
}

/// All visible columns of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult<V> {
    row: Vec<u8>,
    columns: BTreeMap<Vec<u8>, V>,
}

impl<V> RowResult<V> {
    pub fn new(row: impl Into<Vec<u8>>, columns: BTreeMap<Vec<u8>, V>) -> Self {
        Self {
            row: row.into(),
            columns,
        }
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn columns(&self) -> &BTreeMap<Vec<u8>, V> {
        &self.columns
    }

    pub fn into_columns(self) -> BTreeMap<Vec<u8>, V> {
        self.columns
    }

    pub fn get(&self, column: &[u8]) -> Option<&V> {
        self.columns.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate the row as `(Cell, &V)` pairs in column order.
    pub fn cells(&self) -> impl Iterator<Item = (Cell, &V)> + '_ {
        self.columns
            .iter()
            .map(move |(col, v)| (Cell::new(self.row.clone(), col.clone()), v))
    }
}

impl RowResult<Value> {
    /// Fold another copy of the same row into this one, keeping the
    /// max-timestamp value per column.
    ///
    /// Both results must describe the same row.
    pub fn absorb_latest(&mut self, other: RowResult<Value>) {
        debug_assert_eq!(self.row, other.row, "absorb_latest across different rows");
        for (column, candidate) in other.columns {
            let current = self.columns.remove(&column);
            self.columns
                .insert(column, Value::newest(current, candidate));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_ordering_is_row_major() {
        let mut cells = vec![
            Cell::new("b", "a"),
            Cell::new("a", "z"),
            Cell::new("a", "b"),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![Cell::new("a", "b"), Cell::new("a", "z"), Cell::new("b", "a")]
        );
    }

    #[test]
    fn test_newest_prefers_larger_timestamp() {
        let old = Value::new("old", 3);
        let new = Value::new("new", 9);
        assert_eq!(Value::newest(Some(old.clone()), new.clone()), new);
        assert_eq!(Value::newest(Some(new.clone()), old), new);
        assert_eq!(Value::newest(None, new.clone()), new);
    }

    #[test]
    fn test_absorb_latest_keeps_newest_per_column() {
        let mut a = RowResult::new(
            "m",
            BTreeMap::from([
                (b"x".to_vec(), Value::new("val1", 5)),
                (b"y".to_vec(), Value::new("y-new", 8)),
            ]),
        );
        let b = RowResult::new(
            "m",
            BTreeMap::from([
                (b"x".to_vec(), Value::new("val2", 7)),
                (b"y".to_vec(), Value::new("y-old", 2)),
                (b"z".to_vec(), Value::new("z", 1)),
            ]),
        );
        a.absorb_latest(b);
        assert_eq!(a.get(b"x").unwrap().contents, b"val2");
        assert_eq!(a.get(b"y").unwrap().contents, b"y-new");
        assert_eq!(a.get(b"z").unwrap().timestamp, 1);
        assert_eq!(a.columns().len(), 3);
    }

    #[test]
    fn test_column_selection() {
        let sel = ColumnSelection::only(["a", "c"]);
        assert!(sel.contains(b"a"));
        assert!(!sel.contains(b"b"));
        assert!(ColumnSelection::All.contains(b"anything"));
    }

    #[test]
    fn test_row_cells() {
        let row = RowResult::new(
            "r1",
            BTreeMap::from([(b"c1".to_vec(), 1u8), (b"c2".to_vec(), 2u8)]),
        );
        let cells: Vec<Cell> = row.cells().map(|(c, _)| c).collect();
        assert_eq!(cells, vec![Cell::new("r1", "c1"), Cell::new("r1", "c2")]);
    }
}
