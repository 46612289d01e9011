//! Range requests and the bound orderings used when splitting and merging them.
//!
//! A request is stored as an ascending `[lower, upper]` pair of
//! [`Bound`]s plus a `reversed` flag. Callers build it in iteration order
//! ("start inclusive, end exclusive"): for a reversed request the start is
//! the inclusive *upper* bound and the end the exclusive *lower* bound.
//! Keeping explicit bounds lets a partition map cut a request into exactly
//! disjoint pieces in either direction.

use crate::types::ColumnSelection;
use std::cmp::Ordering;
use std::ops::Bound;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range start must not come after end in iteration order")]
    StartAfterEnd,
}

/// A request for an ordered span of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    columns: ColumnSelection,
    reversed: bool,
    batch_hint: Option<usize>,
}

impl RangeRequest {
    /// Every row, ascending, all columns.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            columns: ColumnSelection::All,
            reversed: false,
            batch_hint: None,
        }
    }

    pub fn builder() -> RangeRequestBuilder {
        RangeRequestBuilder::default()
    }

    pub fn lower(&self) -> Bound<&[u8]> {
        as_slice_bound(&self.lower)
    }

    pub fn upper(&self) -> Bound<&[u8]> {
        as_slice_bound(&self.upper)
    }

    pub fn columns(&self) -> &ColumnSelection {
        &self.columns
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn batch_hint(&self) -> Option<usize> {
        self.batch_hint
    }

    pub fn contains(&self, row: &[u8]) -> bool {
        let above = match self.lower() {
            Bound::Unbounded => true,
            Bound::Included(l) => row >= l,
            Bound::Excluded(l) => row > l,
        };
        let below = match self.upper() {
            Bound::Unbounded => true,
            Bound::Included(u) => row <= u,
            Bound::Excluded(u) => row < u,
        };
        above && below
    }

    /// True when no row can satisfy both bounds.
    pub fn is_empty(&self) -> bool {
        bounds_empty(self.lower(), self.upper())
    }

    /// Order two requests by where they start iterating.
    ///
    /// Ascending requests sort by lower bound ascending; reversed requests
    /// sort by upper bound descending, so sub-ranges of one request come
    /// out in the order they must be drained.
    pub fn compare_start(&self, other: &RangeRequest) -> Ordering {
        if self.reversed {
            compare_upper(other.upper(), self.upper())
        } else {
            compare_lower(self.lower(), other.lower())
        }
    }

    /// Restrict this request to the ascending interval `[lower, upper]`.
    ///
    /// Returns `None` when the intersection is empty. Columns, direction and
    /// batch hint carry over.
    pub fn intersect(&self, lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> Option<RangeRequest> {
        let new_lower = if compare_lower(self.lower(), lower) == Ordering::Less {
            lower
        } else {
            self.lower()
        };
        let new_upper = if compare_upper(self.upper(), upper) == Ordering::Greater {
            upper
        } else {
            self.upper()
        };
        if bounds_empty(new_lower, new_upper) {
            return None;
        }
        Some(RangeRequest {
            lower: to_owned_bound(new_lower),
            upper: to_owned_bound(new_upper),
            columns: self.columns.clone(),
            reversed: self.reversed,
            batch_hint: self.batch_hint,
        })
    }
}

/// Builder for [`RangeRequest`], taking bounds in iteration order.
#[derive(Debug, Default, Clone)]
pub struct RangeRequestBuilder {
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    columns: ColumnSelection,
    reversed: bool,
    batch_hint: Option<usize>,
}

impl RangeRequestBuilder {
    /// Inclusive start row (in iteration order).
    pub fn start(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.start = Some(row.into());
        self
    }

    /// Exclusive end row (in iteration order).
    pub fn end(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.end = Some(row.into());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = columns;
        self
    }

    pub fn batch_hint(mut self, hint: usize) -> Self {
        self.batch_hint = Some(hint);
        self
    }

    pub fn build(self) -> Result<RangeRequest, RangeError> {
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            let out_of_order = if self.reversed {
                start < end
            } else {
                start > end
            };
            if out_of_order {
                return Err(RangeError::StartAfterEnd);
            }
        }

        let start = self.start.map_or(Bound::Unbounded, Bound::Included);
        let end = self.end.map_or(Bound::Unbounded, Bound::Excluded);
        let (lower, upper) = if self.reversed {
            (end, start)
        } else {
            (start, end)
        };

        Ok(RangeRequest {
            lower,
            upper,
            columns: self.columns,
            reversed: self.reversed,
            batch_hint: self.batch_hint,
        })
    }
}

// ---------------------------------------------------------------------------
// Bound helpers
// ---------------------------------------------------------------------------

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn to_owned_bound(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Order lower bounds by how many rows they admit: `Unbounded` is the
/// smallest, and `Included(k)` sorts before `Excluded(k)`.
pub fn compare_lower(a: Bound<&[u8]>, b: Bound<&[u8]>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Order upper bounds: `Unbounded` is the largest, and `Excluded(k)` sorts
/// before `Included(k)`.
pub fn compare_upper(a: Bound<&[u8]>, b: Bound<&[u8]>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(x), Bound::Included(y)) | (Bound::Excluded(x), Bound::Excluded(y)) => {
            x.cmp(y)
        }
        (Bound::Included(x), Bound::Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Bound::Excluded(x), Bound::Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

fn bounds_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        // Nothing sorts below the empty key.
        (_, Bound::Excluded(u)) if u.is_empty() => true,
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u))
        | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inc(k: &str) -> Bound<&[u8]> {
        Bound::Included(k.as_bytes())
    }

    fn exc(k: &str) -> Bound<&[u8]> {
        Bound::Excluded(k.as_bytes())
    }

    fn forward(start: &str, end: &str) -> RangeRequest {
        RangeRequest::builder().start(start).end(end).build().unwrap()
    }

    fn reversed(start: &str, end: &str) -> RangeRequest {
        RangeRequest::builder()
            .start(start)
            .end(end)
            .reversed()
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_out_of_order() {
        let err = RangeRequest::builder().start("z").end("a").build();
        assert_eq!(err, Err(RangeError::StartAfterEnd));

        let err = RangeRequest::builder()
            .start("a")
            .end("z")
            .reversed()
            .build();
        assert_eq!(err, Err(RangeError::StartAfterEnd));
    }

    #[test]
    fn test_contains_forward_and_reversed() {
        let fwd = forward("b", "d");
        assert!(!fwd.contains(b"a"));
        assert!(fwd.contains(b"b"));
        assert!(fwd.contains(b"c"));
        assert!(!fwd.contains(b"d"));

        // Reversed: start "d" inclusive, end "b" exclusive.
        let rev = reversed("d", "b");
        assert!(rev.contains(b"d"));
        assert!(rev.contains(b"c"));
        assert!(!rev.contains(b"b"));
    }

    #[test]
    fn test_equal_start_end_is_empty() {
        assert!(forward("k", "k").is_empty());
        assert!(!forward("a", "b").is_empty());
        assert!(!RangeRequest::all().is_empty());
    }

    #[test]
    fn test_intersect_forward() {
        let req = forward("c", "x");
        let piece = req
            .intersect(inc("a"), exc("m"))
            .unwrap();
        assert_eq!(piece.lower(), Bound::Included(&b"c"[..]));
        assert_eq!(piece.upper(), Bound::Excluded(&b"m"[..]));

        assert!(req
            .intersect(inc("x"), Bound::Unbounded)
            .is_none());
    }

    #[test]
    fn test_intersect_reversed_keeps_pieces_disjoint() {
        // Partitions [.., "m") and ["m", ..) cut a reversed scan from "z" down to "a".
        let req = reversed("z", "a");
        let high = req
            .intersect(inc("m"), Bound::Unbounded)
            .unwrap();
        let low = req
            .intersect(Bound::Unbounded, exc("m"))
            .unwrap();
        assert!(high.contains(b"m"));
        assert!(!low.contains(b"m"));
        assert!(high.is_reversed() && low.is_reversed());
        assert_eq!(high.compare_start(&low), Ordering::Less);
    }

    #[test]
    fn test_compare_start_forward() {
        let a = RangeRequest::all()
            .intersect(Bound::Unbounded, exc("m"))
            .unwrap();
        let b = RangeRequest::all()
            .intersect(inc("m"), Bound::Unbounded)
            .unwrap();
        assert_eq!(a.compare_start(&b), Ordering::Less);
        assert_eq!(b.compare_start(&a), Ordering::Greater);
    }

    #[test]
    fn test_bound_comparators() {
        assert_eq!(
            compare_lower(inc("k"), exc("k")),
            Ordering::Less
        );
        assert_eq!(
            compare_upper(inc("k"), exc("k")),
            Ordering::Greater
        );
        assert_eq!(
            compare_lower(Bound::Unbounded, inc("")),
            Ordering::Less
        );
        assert_eq!(
            compare_upper(Bound::Unbounded, inc("zzz")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_empty_key_exclusive_upper_is_empty() {
        let req = RangeRequest::builder().end("").build().unwrap();
        assert!(req.is_empty());
    }
}
