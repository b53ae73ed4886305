use crate::error::{PgasError, Result};
use crate::types::{NodeId, ThreadId};

/// Static assignment of global thread ids to physical nodes.
///
/// Threads are numbered node-major: the threads of node 0 come first, then
/// those of node 1, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    thread_nodes: Vec<NodeId>,
    node_count: u32,
}

impl Placement {
    /// `threads_per_node[n]` logical threads run on node `n`.
    pub fn from_layout(threads_per_node: &[u32]) -> Self {
        let thread_nodes = threads_per_node
            .iter()
            .enumerate()
            .flat_map(|(node, &count)| std::iter::repeat_n(node as NodeId, count as usize))
            .collect();
        Self {
            thread_nodes,
            node_count: threads_per_node.len() as u32,
        }
    }

    pub fn thread_count(&self) -> u32 {
        self.thread_nodes.len() as u32
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Physical node hosting `thread`.
    pub fn node_of(&self, thread: ThreadId) -> Result<NodeId> {
        self.thread_nodes
            .get(thread as usize)
            .copied()
            .ok_or(PgasError::UnknownThread { thread })
    }

    /// Threads hosted on `node`, ascending.
    pub fn threads_on(&self, node: NodeId) -> Vec<ThreadId> {
        self.thread_nodes
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == node)
            .map(|(t, _)| t as ThreadId)
            .collect()
    }

    /// Every thread of the cluster, ascending.
    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        0..self.thread_count()
    }
}
