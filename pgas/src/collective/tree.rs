use crate::types::NodeId;
use std::collections::HashMap;

/// Complete binary tree over the physical nodes hosting a group's members.
///
/// Nodes are placed in order of first appearance in the group's rank
/// ordering, so the node hosting rank 0 is the root. Position `i` has parent
/// `(i - 1) / 2` and children `2i + 1`, `2i + 2`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommunicationTree {
    nodes: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

impl CommunicationTree {
    /// Build the tree from the physical node of every member, in rank order.
    /// Duplicates are collapsed.
    pub fn new(member_nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut nodes = Vec::new();
        let mut positions = HashMap::new();
        for node in member_nodes {
            if !positions.contains_key(&node) {
                positions.insert(node, nodes.len());
                nodes.push(node);
            }
        }
        Self { nodes, positions }
    }

    /// Distinct nodes in tree order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.positions.contains_key(&node)
    }

    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.positions.get(&node).copied()
    }

    /// Parent of `node`, or `None` for the root and for nodes outside the tree.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        match self.position(node)? {
            0 => None,
            pos => Some(self.nodes[(pos - 1) / 2]),
        }
    }

    /// Direct children of `node` (empty for leaves and unknown nodes).
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(pos) = self.position(node) else {
            return Vec::new();
        };
        [2 * pos + 1, 2 * pos + 2]
            .into_iter()
            .filter_map(|c| self.nodes.get(c).copied())
            .collect()
    }

    /// `node` and every node reachable below it.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let Some(pos) = self.position(node) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![pos];
        while let Some(p) = stack.pop() {
            out.push(self.nodes[p]);
            for c in [2 * p + 2, 2 * p + 1] {
                if c < self.nodes.len() {
                    stack.push(c);
                }
            }
        }
        out
    }

    /// The child of `from` whose subtree contains `target`, if any.
    pub fn child_towards(&self, from: NodeId, target: NodeId) -> Option<NodeId> {
        let from_pos = self.position(from)?;
        let mut pos = self.position(target)?;
        while pos > from_pos {
            let parent = (pos - 1) / 2;
            if parent == from_pos {
                return Some(self.nodes[pos]);
            }
            pos = parent;
        }
        None
    }
}
