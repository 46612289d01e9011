//! Handle for one backend storage node.

use partkv_common::NodeId;
use std::fmt;

/// Descriptor for a storage node, as handed out by the partition map.
///
/// Carries no connection state; node calls go through a
/// [`ReplicaClient`](crate::replica_client::ReplicaClient) addressed by it.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    /// The node's 160-bit identifier.
    pub id: NodeId,
    /// Human-readable name (used in logs and errors).
    pub name: String,
}

impl NodeInfo {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Create a `NodeInfo` whose id is the SHA-1 of its name.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: NodeId::from_sha1(name.as_bytes()),
            name,
        }
    }
}

impl PartialEq for NodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeInfo {}

impl std::hash::Hash for NodeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_is_deterministic() {
        let a = NodeInfo::from_name("node-a");
        let b = NodeInfo::from_name("node-a");
        assert_eq!(a, b);
        assert_eq!(a.id, NodeId::from_sha1(b"node-a"));
    }

    #[test]
    fn test_equality_ignores_name() {
        let id = NodeId::from_sha1(b"x");
        assert_eq!(NodeInfo::new(id, "one"), NodeInfo::new(id, "two"));
    }

    #[test]
    fn test_display_includes_name() {
        let n = NodeInfo::from_name("alpha");
        assert!(n.to_string().starts_with("alpha ("));
    }
}
