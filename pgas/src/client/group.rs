use crate::collective::future::PgasFuture;
use crate::collective::operators::Reducer;
use crate::collective::{barrier, broadcast, collect, gather, reduce, scatter};
use crate::element::Element;
use crate::error::{PgasError, Result};
use crate::group::{GroupInner, split};
use crate::node::NodeContext;
use crate::types::{GroupId, NodeId, Rank, ThreadId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A logical thread's handle on one of its groups.
///
/// Every operation returns a [`PgasFuture`] and never blocks; call `get` on
/// the future to wait. Collective operations that name a variable act on
/// that variable in every member's storage.
#[derive(Clone)]
pub struct Group {
    ctx: Arc<NodeContext>,
    thread: ThreadId,
    inner: Arc<GroupInner>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.inner.id())
            .field("name", &self.inner.name())
            .field("thread", &self.thread)
            .finish()
    }
}

impl Group {
    pub(crate) fn new(ctx: Arc<NodeContext>, thread: ThreadId, inner: Arc<GroupInner>) -> Self {
        Self { ctx, thread, inner }
    }

    pub fn id(&self) -> GroupId {
        self.inner.id()
    }

    /// Name the group was joined under; `None` for the world group and
    /// groups created by [`split`](Self::split).
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Node that allocated the group.
    pub fn master(&self) -> NodeId {
        self.inner.master()
    }

    /// Number of members as currently known on this node.
    pub fn size(&self) -> u32 {
        self.inner.view().map(|v| v.size()).unwrap_or(0)
    }

    pub fn members(&self) -> Result<Vec<ThreadId>> {
        Ok(self.inner.view()?.members().to_vec())
    }

    /// Rank of the owning thread.
    pub fn my_rank(&self) -> Result<Rank> {
        self.inner
            .view()?
            .rank_of(self.thread)
            .ok_or(PgasError::NotAMember {
                thread: self.thread,
                group: self.inner.id(),
            })
    }

    /// Global id of the member at `rank`.
    pub fn thread_at(&self, rank: Rank) -> Result<ThreadId> {
        self.inner.view()?.thread_at(rank)
    }

    /// Completes once every member has entered the same barrier round.
    pub fn barrier(&self) -> PgasFuture<()> {
        barrier::barrier(&self.ctx, &self.inner, self.thread)
    }

    pub fn broadcast<T: Element>(&self, variable: &str, value: &T) -> PgasFuture<()> {
        broadcast::broadcast(
            &self.ctx,
            &self.inner,
            self.thread,
            variable,
            value.to_bytes(),
        )
    }

    pub fn reduce<T: Element>(&self, variable: &str, reducer: Reducer) -> PgasFuture<T> {
        reduce::reduce(&self.ctx, &self.inner, self.thread, variable, reducer)
    }

    /// Mutable reduction through the collector registered under `collector`.
    pub fn collect<O: Element>(&self, variable: &str, collector: u16) -> PgasFuture<O> {
        collect::collect(&self.ctx, &self.inner, self.thread, variable, collector)
    }

    pub fn gather<T: Element>(&self, variable: &str) -> PgasFuture<BTreeMap<Rank, T>> {
        gather::gather(&self.ctx, &self.inner, self.thread, variable)
    }

    pub fn scatter<T: Element>(
        &self,
        variable: &str,
        values: impl IntoIterator<Item = (Rank, T)>,
    ) -> PgasFuture<()> {
        scatter::scatter(&self.ctx, &self.inner, self.thread, variable, values)
    }

    /// Partition the group. Members passing the same `split_key` end up in
    /// the same new group, ranked by `ordering_key` and then by their rank
    /// here. Every member must call this.
    pub fn split(&self, split_key: u32, ordering_key: u32) -> PgasFuture<Group> {
        split::split(&self.ctx, &self.inner, self.thread, split_key, ordering_key)
    }
}
