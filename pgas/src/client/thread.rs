use crate::client::Group;
use crate::collective::future::PgasFuture;
use crate::element::Element;
use crate::error::{PgasError, Result};
use crate::group::join;
use crate::node::NodeContext;
use crate::types::{GroupId, NodeId, ThreadId, WORLD_GROUP};
use std::sync::Arc;

/// Handle of one logical thread, passed to the thread's body by
/// [`LocalCluster::run`](crate::LocalCluster::run).
#[derive(Clone)]
pub struct PgasThread {
    ctx: Arc<NodeContext>,
    id: ThreadId,
}

impl std::fmt::Debug for PgasThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgasThread")
            .field("id", &self.id)
            .field("node", &self.ctx.node_id())
            .finish()
    }
}

impl PgasThread {
    pub(crate) fn new(ctx: Arc<NodeContext>, id: ThreadId) -> Self {
        Self { ctx, id }
    }

    /// Global thread id.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Physical node running this thread.
    pub fn node(&self) -> NodeId {
        self.ctx.node_id()
    }

    pub fn thread_count(&self) -> u32 {
        self.ctx.placement().thread_count()
    }

    pub fn node_count(&self) -> u32 {
        self.ctx.placement().node_count()
    }

    /// The group of all threads, ranked by global id.
    pub fn world(&self) -> Result<Group> {
        self.group(WORLD_GROUP)
    }

    /// Handle of a group this thread belongs to.
    pub fn group(&self, id: GroupId) -> Result<Group> {
        let inner = self.ctx.group(id)?;
        if inner.view()?.rank_of(self.id).is_none() {
            return Err(PgasError::NotAMember {
                thread: self.id,
                group: id,
            });
        }
        Ok(Group::new(Arc::clone(&self.ctx), self.id, inner))
    }

    /// Declare a shared variable of this thread.
    pub fn declare(&self, name: &str) -> Result<()> {
        self.ctx.storage(self.id)?.declare(name)
    }

    /// Set a declared variable of this thread.
    pub fn put<T: Element>(&self, name: &str, value: &T) -> Result<()> {
        self.ctx.storage(self.id)?.put(name, value.to_bytes())
    }

    /// Read a variable of this thread.
    pub fn get<T: Element>(&self, name: &str) -> Result<T> {
        T::from_bytes(&self.ctx.storage(self.id)?.get(name)?)
    }

    /// Join the group called `name`, creating it if nobody has yet.
    ///
    /// Ranks are handed out in the order the master admits members. Joining
    /// a group twice returns the existing rank.
    pub fn join_group(&self, name: &str) -> PgasFuture<Group> {
        join::join_group(&self.ctx, self.id, name)
    }
}
