//! Peeking cursor over one node's row stream.

use crate::node_info::NodeInfo;
use crate::replica_client::{BoxRowStream, ReplicaError};
use partkv_common::{RowResult, Value};

/// Owns one node stream and buffers at most one row ahead.
///
/// The stream is closed exactly once: when it runs dry, on `close`, or on
/// drop, whichever comes first.
pub struct PeekingCursor {
    node: NodeInfo,
    stream: Option<BoxRowStream>,
    peeked: Option<RowResult<Value>>,
}

impl std::fmt::Debug for PeekingCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeekingCursor")
            .field("node", &self.node)
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl PeekingCursor {
    pub fn new(node: NodeInfo, stream: BoxRowStream) -> Self {
        Self {
            node,
            stream: Some(stream),
            peeked: None,
        }
    }

    pub fn node(&self) -> &NodeInfo {
        &self.node
    }

    /// Load the next row into the peek slot if it is empty.
    ///
    /// Returns the buffered row, or `None` once the stream is exhausted.
    pub async fn peek(&mut self) -> Result<Option<&RowResult<Value>>, ReplicaError> {
        if self.peeked.is_none() {
            if let Some(stream) = self.stream.as_mut() {
                match stream.next_row().await? {
                    Some(row) => self.peeked = Some(row),
                    None => self.close(),
                }
            }
        }
        Ok(self.peeked.as_ref())
    }

    /// Take the buffered row, leaving the slot empty.
    pub fn take(&mut self) -> Option<RowResult<Value>> {
        self.peeked.take()
    }

    /// Release the node stream. Later calls are no-ops.
    pub fn close(&mut self) {
        self.peeked = None;
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            partkv_metrics::metrics().streams_closed.inc();
            tracing::trace!("closed range stream on {}", self.node);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for PeekingCursor {
    fn drop(&mut self) {
        self.close();
    }
}
