//! In-memory multi-version cell table.
//!
//! Every cell keeps all of its versions keyed by timestamp. Reads at a bound
//! see the newest version whose timestamp is `<=` the bound.

use partkv_common::{Cell, ColumnSelection, RangeRequest, RowResult, Value};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Cells of one table, each mapping timestamp -> contents.
#[derive(Debug, Default)]
pub struct CellTable {
    cells: BTreeMap<Cell, BTreeMap<u64, Vec<u8>>>,
}

impl CellTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest version of `cell` visible at `bound`.
    pub fn get(&self, cell: &Cell, bound: u64) -> Option<Value> {
        self.cells
            .get(cell)?
            .range(..=bound)
            .next_back()
            .map(|(ts, contents)| Value::new(contents.clone(), *ts))
    }

    /// Newest visible version of every selected column in `row`.
    pub fn get_row(&self, row: &[u8], columns: &ColumnSelection, bound: u64) -> Vec<(Cell, Value)> {
        let start = Cell::new(row, Vec::new());
        self.cells
            .range(start..)
            .take_while(|(cell, _)| cell.row == row)
            .filter(|(cell, _)| columns.contains(&cell.column))
            .filter_map(|(cell, versions)| {
                versions
                    .range(..=bound)
                    .next_back()
                    .map(|(ts, contents)| (cell.clone(), Value::new(contents.clone(), *ts)))
            })
            .collect()
    }

    /// Write one version. Rewriting the same timestamp replaces it.
    pub fn put(&mut self, cell: Cell, timestamp: u64, contents: Vec<u8>) {
        self.cells.entry(cell).or_default().insert(timestamp, contents);
    }

    /// Whether any version of the cell exists.
    pub fn contains(&self, cell: &Cell) -> bool {
        self.cells.get(cell).is_some_and(|v| !v.is_empty())
    }

    /// Remove one `(cell, timestamp)` version. Returns whether it existed.
    pub fn delete(&mut self, cell: &Cell, timestamp: u64) -> bool {
        let Some(versions) = self.cells.get_mut(cell) else {
            return false;
        };
        let removed = versions.remove(&timestamp).is_some();
        if versions.is_empty() {
            self.cells.remove(cell);
        }
        removed
    }

    /// Materialize the rows of `range` visible at `bound`, in iteration order.
    ///
    /// Rows with no visible selected column are skipped.
    pub fn scan(&self, range: &RangeRequest, bound: u64) -> Vec<RowResult<Value>> {
        let start = match range.lower() {
            Bound::Unbounded => Bound::Unbounded,
            Bound::Included(r) | Bound::Excluded(r) => Bound::Included(Cell::new(r, Vec::new())),
        };

        let mut rows: Vec<RowResult<Value>> = Vec::new();
        let mut current: Option<(Vec<u8>, BTreeMap<Vec<u8>, Value>)> = None;

        for (cell, versions) in self.cells.range((start, Bound::Unbounded)) {
            if past_upper(range.upper(), &cell.row) {
                break;
            }
            if !range.contains(&cell.row) || !range.columns().contains(&cell.column) {
                continue;
            }
            let Some((ts, contents)) = versions.range(..=bound).next_back() else {
                continue;
            };

            match &mut current {
                Some((row, columns)) if *row == cell.row => {
                    columns.insert(cell.column.clone(), Value::new(contents.clone(), *ts));
                }
                _ => {
                    if let Some((row, columns)) = current.take() {
                        rows.push(RowResult::new(row, columns));
                    }
                    let mut columns = BTreeMap::new();
                    columns.insert(cell.column.clone(), Value::new(contents.clone(), *ts));
                    current = Some((cell.row.clone(), columns));
                }
            }
        }
        if let Some((row, columns)) = current {
            rows.push(RowResult::new(row, columns));
        }

        if range.is_reversed() {
            rows.reverse();
        }
        rows
    }

    /// Number of distinct cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total number of versions across all cells.
    pub fn total_versions(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }
}

fn past_upper(upper: Bound<&[u8]>, row: &[u8]) -> bool {
    match upper {
        Bound::Unbounded => false,
        Bound::Included(u) => row > u,
        Bound::Excluded(u) => row >= u,
    }
}
