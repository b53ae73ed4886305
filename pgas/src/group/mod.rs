//! Groups: membership, communication tree, and the per-group tables of
//! pending operations.

pub(crate) mod directory;
pub(crate) mod join;
pub(crate) mod split;

use crate::collective::barrier::SyncState;
use crate::collective::registry::{RequestKey, RequestRegistry};
use crate::collective::state::CollectiveState;
use crate::collective::tree::CommunicationTree;
use crate::error::{PgasError, Result};
use crate::node::placement::Placement;
use crate::protocol::OpKind;
use crate::types::{GroupId, NodeId, Rank, ThreadId};
use join::JoinState;
use split::SplitState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// A snapshot of a group's membership.
///
/// `members[rank]` is the global thread id at that rank. The tree is built
/// from the nodes of the members in rank order, optionally preceded by an
/// anchor node that then becomes the root.
#[derive(Debug, Clone, Default)]
pub struct GroupView {
    members: Vec<ThreadId>,
    member_nodes: Vec<NodeId>,
    tree: CommunicationTree,
}

impl GroupView {
    pub fn new(
        members: Vec<ThreadId>,
        anchor: Option<NodeId>,
        placement: &Placement,
    ) -> Result<Self> {
        let member_nodes = members
            .iter()
            .map(|&t| placement.node_of(t))
            .collect::<Result<Vec<_>>>()?;
        let tree = CommunicationTree::new(anchor.into_iter().chain(member_nodes.iter().copied()));
        Ok(Self {
            members,
            member_nodes,
            tree,
        })
    }

    pub fn members(&self) -> &[ThreadId] {
        &self.members
    }

    pub fn size(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn tree(&self) -> &CommunicationTree {
        &self.tree
    }

    pub fn thread_at(&self, rank: Rank) -> Result<ThreadId> {
        self.members
            .get(rank as usize)
            .copied()
            .ok_or(PgasError::InvalidRank {
                rank,
                size: self.size(),
            })
    }

    pub fn rank_of(&self, thread: ThreadId) -> Option<Rank> {
        self.members
            .iter()
            .position(|&t| t == thread)
            .map(|r| r as Rank)
    }

    pub fn node_of_rank(&self, rank: Rank) -> Option<NodeId> {
        self.member_nodes.get(rank as usize).copied()
    }

    /// `(rank, thread)` of every member hosted on `node`, in rank order.
    pub fn local_members(&self, node: NodeId) -> Vec<(Rank, ThreadId)> {
        self.members
            .iter()
            .zip(&self.member_nodes)
            .enumerate()
            .filter(|&(_, (_, &n))| n == node)
            .map(|(rank, (&thread, _))| (rank as Rank, thread))
            .collect()
    }
}

/// Per-thread round counters for the group-wide synchronizations.
///
/// Every member calls barrier and split in the same sequence, so the n-th
/// call of each thread carries round n.
#[derive(Debug, Default)]
pub(crate) struct Rounds {
    barrier: AtomicU64,
    split: AtomicU64,
}

impl Rounds {
    pub(crate) fn next_barrier(&self) -> u64 {
        self.barrier.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_split(&self) -> u64 {
        self.split.fetch_add(1, Ordering::Relaxed)
    }
}

/// Node-local state of one group.
pub(crate) struct GroupInner {
    id: GroupId,
    name: Option<String>,
    master: NodeId,
    view: RwLock<Arc<GroupView>>,
    /// Where fan-in goes. Starts as the tree parent and is taken over from
    /// whoever delivered a membership update.
    parent: RwLock<Option<NodeId>>,
    rounds: Mutex<HashMap<ThreadId, Arc<Rounds>>>,
    join_lock: Mutex<()>,

    pub(crate) barriers: RequestRegistry<u64, SyncState>,
    pub(crate) splits: RequestRegistry<u64, SplitState>,
    pub(crate) joins: RequestRegistry<RequestKey, JoinState>,
    broadcasts: RequestRegistry<RequestKey, CollectiveState>,
    reduces: RequestRegistry<RequestKey, CollectiveState>,
    collects: RequestRegistry<RequestKey, CollectiveState>,
    gathers: RequestRegistry<RequestKey, CollectiveState>,
    scatters: RequestRegistry<RequestKey, CollectiveState>,
}

impl std::fmt::Debug for GroupInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupInner")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

impl GroupInner {
    /// Local instance of group `id` on node `me`, with the tree parent taken
    /// from `view`.
    pub(crate) fn new(
        id: GroupId,
        name: Option<String>,
        master: NodeId,
        view: GroupView,
        me: NodeId,
    ) -> Self {
        let parent = view.tree().parent(me);
        Self {
            id,
            name,
            master,
            view: RwLock::new(Arc::new(view)),
            parent: RwLock::new(parent),
            rounds: Mutex::new(HashMap::new()),
            join_lock: Mutex::new(()),
            barriers: RequestRegistry::new(),
            splits: RequestRegistry::new(),
            joins: RequestRegistry::new(),
            broadcasts: RequestRegistry::new(),
            reduces: RequestRegistry::new(),
            collects: RequestRegistry::new(),
            gathers: RequestRegistry::new(),
            scatters: RequestRegistry::new(),
        }
    }

    pub(crate) fn id(&self) -> GroupId {
        self.id
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn master(&self) -> NodeId {
        self.master
    }

    pub(crate) fn view(&self) -> Result<Arc<GroupView>> {
        self.view
            .read()
            .map(|v| Arc::clone(&v))
            .map_err(|_| PgasError::LockPoisoned("group view"))
    }

    /// Install `view` if it has more members than the current one. Returns
    /// whether it was installed.
    ///
    /// Membership only grows, so a longer view is always the newer one even
    /// when updates arrive out of order.
    pub(crate) fn install_view(&self, view: GroupView) -> Result<bool> {
        let mut current = self
            .view
            .write()
            .map_err(|_| PgasError::LockPoisoned("group view"))?;
        if view.size() <= current.size() {
            return Ok(false);
        }
        *current = Arc::new(view);
        Ok(true)
    }

    pub(crate) fn parent(&self) -> Result<Option<NodeId>> {
        self.parent
            .read()
            .map(|p| *p)
            .map_err(|_| PgasError::LockPoisoned("group parent"))
    }

    /// Make `parent` the fan-in target. Returns the previous parent when a
    /// different one was already set.
    pub(crate) fn adopt_parent(&self, parent: NodeId) -> Result<Option<NodeId>> {
        let mut slot = self
            .parent
            .write()
            .map_err(|_| PgasError::LockPoisoned("group parent"))?;
        match *slot {
            Some(current) if current == parent => Ok(None),
            previous => {
                *slot = Some(parent);
                Ok(previous)
            }
        }
    }

    pub(crate) fn rounds(&self, thread: ThreadId) -> Result<Arc<Rounds>> {
        let mut rounds = self
            .rounds
            .lock()
            .map_err(|_| PgasError::LockPoisoned("group rounds"))?;
        Ok(Arc::clone(rounds.entry(thread).or_default()))
    }

    /// Serializes membership changes at the master.
    pub(crate) fn join_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.join_lock
            .lock()
            .map_err(|_| PgasError::LockPoisoned("group join"))
    }

    pub(crate) fn requests(&self, kind: OpKind) -> &RequestRegistry<RequestKey, CollectiveState> {
        match kind {
            OpKind::Broadcast => &self.broadcasts,
            OpKind::Reduce => &self.reduces,
            OpKind::Collect => &self.collects,
            OpKind::Gather => &self.gathers,
            OpKind::Scatter => &self.scatters,
        }
    }
}
