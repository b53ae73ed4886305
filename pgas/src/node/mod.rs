//! Per-node runtime state shared by the node's logical threads and its
//! message handlers.

mod dispatch;
pub mod placement;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;

use crate::collective::operators::OperatorRegistry;
use crate::collective::registry::{RequestKey, RequestRegistry};
use crate::config::PgasConfig;
use crate::error::{PgasError, Result};
use crate::group::directory::Directory;
use crate::group::join::PendingJoin;
use crate::group::{GroupInner, GroupView};
use crate::protocol::PgasMessage;
use crate::transport::Transport;
use crate::types::{GroupId, NodeId, ThreadId, WORLD_GROUP};
use placement::Placement;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use storage::Storage;

/// Everything one physical node knows.
pub struct NodeContext {
    node_id: NodeId,
    config: PgasConfig,
    placement: Arc<Placement>,
    transport: Arc<dyn Transport>,
    operators: Arc<OperatorRegistry>,
    storages: HashMap<ThreadId, Arc<Storage>>,
    groups: RwLock<HashMap<GroupId, Arc<GroupInner>>>,
    /// Only consulted on the coordinator.
    directory: Directory,
    pub(crate) joins: RequestRegistry<RequestKey, PendingJoin>,
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("node_id", &self.node_id)
            .field("threads", &self.storages.len())
            .finish_non_exhaustive()
    }
}

impl NodeContext {
    /// Build node `transport.node_id()` with storage for its hosted threads
    /// and its instance of the world group.
    pub fn new(
        config: PgasConfig,
        placement: Arc<Placement>,
        transport: Arc<dyn Transport>,
        operators: Arc<OperatorRegistry>,
    ) -> Result<Self> {
        let node_id = transport.node_id();
        if node_id >= placement.node_count() {
            return Err(PgasError::UnknownNode { node: node_id });
        }
        let storages = placement
            .threads_on(node_id)
            .into_iter()
            .map(|t| (t, Arc::new(Storage::new())))
            .collect();

        let world_view = GroupView::new(placement.threads().collect(), None, &placement)?;
        let world = GroupInner::new(WORLD_GROUP, None, 0, world_view, node_id);
        let groups = HashMap::from([(WORLD_GROUP, Arc::new(world))]);

        Ok(Self {
            node_id,
            config,
            placement,
            transport,
            operators,
            storages,
            groups: RwLock::new(groups),
            directory: Directory::new(),
            joins: RequestRegistry::new(),
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn config(&self) -> &PgasConfig {
        &self.config
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub(crate) fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub(crate) fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn node_of(&self, thread: ThreadId) -> Result<NodeId> {
        self.placement.node_of(thread)
    }

    /// Whether `thread` runs on this node.
    pub fn hosts(&self, thread: ThreadId) -> bool {
        self.storages.contains_key(&thread)
    }

    /// Threads hosted on this node, ascending.
    pub fn local_threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<_> = self.storages.keys().copied().collect();
        threads.sort_unstable();
        threads
    }

    pub fn storage(&self, thread: ThreadId) -> Result<&Arc<Storage>> {
        self.storages
            .get(&thread)
            .ok_or(PgasError::UnknownThread { thread })
    }

    pub fn send(&self, dest: NodeId, msg: PgasMessage) -> Result<()> {
        tracing::trace!(from = self.node_id, to = dest, ?msg, "send");
        self.transport.send(dest, &msg)
    }

    pub(crate) fn group(&self, id: GroupId) -> Result<Arc<GroupInner>> {
        self.groups
            .read()
            .map_err(|_| PgasError::LockPoisoned("group table"))?
            .get(&id)
            .cloned()
            .ok_or(PgasError::UnknownGroup {
                group: id,
                node: self.node_id,
            })
    }

    /// The local instance of group `id`, inserting `make()` if absent.
    pub(crate) fn group_or_insert(
        &self,
        id: GroupId,
        make: impl FnOnce() -> GroupInner,
    ) -> Result<Arc<GroupInner>> {
        let mut groups = self
            .groups
            .write()
            .map_err(|_| PgasError::LockPoisoned("group table"))?;
        Ok(Arc::clone(
            groups.entry(id).or_insert_with(|| Arc::new(make())),
        ))
    }
}
