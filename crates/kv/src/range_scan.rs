//! Lazy merge of per-node range streams into one ordered, deduplicated scan.
//!
//! A scan is a sequence of disjoint sub-ranges drained one after another in
//! iteration order. Inside a sub-range every replica contributes a
//! [`PeekingCursor`]; a binary heap keyed on the cursors' next row performs
//! the k-way merge. Replicas return the same row several times, so a final
//! combiner folds consecutive equal rows into one, keeping the newest value
//! of each column.

use crate::cursor::PeekingCursor;
use crate::error::KvError;
use crate::replica_client::ReplicaError;
use futures::Stream;
use partkv_common::{RangeRequest, RowResult, Value};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

// ---------------------------------------------------------------------------
// Heap entries
// ---------------------------------------------------------------------------

/// The next row of one cursor. Ordered so the heap top is the row that
/// comes first in iteration order; ties go to the lower cursor index.
#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    row: Vec<u8>,
    cursor: usize,
    reversed: bool,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_row = if self.reversed {
            self.row.cmp(&other.row)
        } else {
            other.row.cmp(&self.row)
        };
        by_row.then_with(|| other.cursor.cmp(&self.cursor))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Sub-range merge
// ---------------------------------------------------------------------------

/// K-way merge of every replica cursor opened for one sub-range.
#[derive(Debug)]
pub struct SubRangeMerge {
    range: RangeRequest,
    cursors: Vec<PeekingCursor>,
    heap: BinaryHeap<HeapEntry>,
    primed: bool,
}

impl SubRangeMerge {
    pub fn new(range: RangeRequest, cursors: Vec<PeekingCursor>) -> Self {
        Self {
            range,
            cursors,
            heap: BinaryHeap::new(),
            primed: false,
        }
    }

    /// Next row across all replicas, duplicates included.
    pub async fn next_row(&mut self) -> Result<Option<RowResult<Value>>, ReplicaError> {
        if !self.primed {
            for idx in 0..self.cursors.len() {
                self.push_head(idx).await?;
            }
            self.primed = true;
        }

        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        let row = self.cursors[entry.cursor].take();
        self.push_head(entry.cursor).await?;
        Ok(row)
    }

    async fn push_head(&mut self, idx: usize) -> Result<(), ReplicaError> {
        let reversed = self.range.is_reversed();
        let cursor = &mut self.cursors[idx];
        let head = match cursor.peek().await {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!("range stream from {} failed: {}", cursor.node(), e);
                return Err(e);
            }
        };
        if let Some(next) = head {
            self.heap.push(HeapEntry {
                row: next.row().to_vec(),
                cursor: idx,
                reversed,
            });
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.heap.clear();
        for cursor in &mut self.cursors {
            cursor.close();
        }
    }
}

// ---------------------------------------------------------------------------
// RangeScan
// ---------------------------------------------------------------------------

/// A forward-only, closable scan returned by
/// [`KvCoordinator::get_range`](crate::coordinator::KvCoordinator::get_range).
///
/// Dropping the scan closes every node stream it still holds.
#[derive(Debug)]
pub struct RangeScan {
    subranges: VecDeque<SubRangeMerge>,
    pending: Option<RowResult<Value>>,
    closed: bool,
}

impl RangeScan {
    /// Sub-ranges must already be in the order they are to be drained.
    pub fn new(subranges: Vec<SubRangeMerge>) -> Self {
        Self {
            subranges: subranges.into(),
            pending: None,
            closed: false,
        }
    }

    /// A scan that yields nothing.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Next merged row, or `None` when the range is exhausted or closed.
    ///
    /// A node failure closes the scan before the error is returned.
    pub async fn next_row(&mut self) -> Result<Option<RowResult<Value>>, KvError> {
        if self.closed {
            return Ok(None);
        }
        loop {
            match self.next_raw().await {
                Err(e) => {
                    tracing::debug!("range scan failed mid-stream: {}", e);
                    self.close();
                    return Err(KvError::Replica(e));
                }
                Ok(Some(row)) => match self.pending.as_mut() {
                    Some(current) if current.row() == row.row() => current.absorb_latest(row),
                    _ => {
                        if let Some(done) = self.pending.replace(row) {
                            return Ok(Some(done));
                        }
                    }
                },
                Ok(None) => {
                    let last = self.pending.take();
                    if last.is_none() {
                        self.close();
                    }
                    return Ok(last);
                }
            }
        }
    }

    async fn next_raw(&mut self) -> Result<Option<RowResult<Value>>, ReplicaError> {
        while let Some(front) = self.subranges.front_mut() {
            if let Some(row) = front.next_row().await? {
                return Ok(Some(row));
            }
            front.close();
            self.subranges.pop_front();
        }
        Ok(None)
    }

    /// Release every node stream. Safe to call repeatedly.
    pub fn close(&mut self) {
        for sub in &mut self.subranges {
            sub.close();
        }
        self.subranges.clear();
        self.pending = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain the rest of the scan into memory.
    pub async fn collect_rows(mut self) -> Result<Vec<RowResult<Value>>, KvError> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Adapt the scan into a [`Stream`]. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<RowResult<Value>, KvError>> + Send {
        futures::stream::unfold(self, |mut scan| async move {
            match scan.next_row().await {
                Ok(Some(row)) => Some((Ok(row), scan)),
                Ok(None) => None,
                Err(e) => Some((Err(e), scan)),
            }
        })
    }
}

impl Drop for RangeScan {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
