use crate::error::{PgasError, Result};
use crate::types::{GroupId, NodeId, WORLD_GROUP};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Cluster-wide group naming, kept on the coordinator node.
///
/// Hands out group ids and remembers which node masters each named group.
#[derive(Debug)]
pub(crate) struct Directory {
    names: Mutex<HashMap<String, (GroupId, NodeId)>>,
    next_id: AtomicU32,
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            names: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(WORLD_GROUP + 1),
        }
    }
}

impl Directory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, creating it with `requester_node` as master if absent.
    pub(crate) fn resolve(&self, name: &str, requester_node: NodeId) -> Result<(GroupId, NodeId)> {
        let mut names = self
            .names
            .lock()
            .map_err(|_| PgasError::LockPoisoned("group directory"))?;
        if let Some(&entry) = names.get(name) {
            return Ok(entry);
        }
        let id = self.reserve(1);
        names.insert(name.to_string(), (id, requester_node));
        tracing::debug!(name, group = id, master = requester_node, "group created");
        Ok((id, requester_node))
    }

    /// Reserve `count` consecutive ids and return the first.
    pub(crate) fn reserve(&self, count: u32) -> GroupId {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }
}
