//! Joining a named group.
//!
//! The joining thread's node asks the coordinator for the group's id and
//! master, creating the group on first use. The master appends the thread to
//! the membership and fans the new member list out over the grown tree; each
//! subtree confirms once it has installed it, and the master then answers the
//! joining node with the new rank. A child that cannot be reached counts as
//! confirmed with a failure, which travels up with the confirmations and
//! fails the join.

use crate::client::Group;
use crate::collective::future::PgasFuture;
use crate::collective::registry::{Countdown, RequestKey};
use crate::error::{Failure, PgasError, Result, describe_failures};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::PgasMessage;
use crate::types::{COORDINATOR, GroupId, NodeId, Rank, RequestNum, ThreadId};
use crossbeam_queue::SegQueue;
use std::sync::Arc;

/// A join waiting for its answer on the joining thread's node.
pub(crate) struct PendingJoin {
    name: String,
    future: PgasFuture<Group>,
}

/// One node's part of distributing a membership update.
pub(crate) struct JoinState {
    countdown: Countdown,
    /// Where to confirm. `None` on the master.
    parent: Option<NodeId>,
    /// Node of the joining thread; set on the master only.
    reply_to: Option<NodeId>,
    rank: Rank,
    failures: SegQueue<Failure>,
}

impl JoinState {
    fn new(children: usize, parent: Option<NodeId>, reply_to: Option<NodeId>, rank: Rank) -> Self {
        Self {
            countdown: Countdown::new(children + 1),
            parent,
            reply_to,
            rank,
            failures: SegQueue::new(),
        }
    }

    fn take_failures(&self) -> Vec<Failure> {
        std::iter::from_fn(|| self.failures.pop()).collect()
    }
}

/// Make `thread` a member of the group called `name`.
pub(crate) fn join_group(ctx: &NodeContext, thread: ThreadId, name: &str) -> PgasFuture<Group> {
    let future = PgasFuture::new();
    let pending = PendingJoin {
        name: name.to_string(),
        future: future.clone(),
    };
    let sent = ctx.joins.create(thread, |_| pending).and_then(|(request_num, _)| {
        tracing::debug!(node = ctx.node_id(), thread, name, "joining group");
        ctx.send(
            COORDINATOR,
            PgasMessage::GroupQuery {
                request_num,
                requester: thread,
                name: name.to_string(),
            },
        )
        .inspect_err(|_| {
            let _ = ctx.joins.remove((request_num, thread));
        })
    });
    if let Err(e) = sent {
        future.signal_exception(PgasError::JoinFailed {
            name: name.to_string(),
            reason: e.to_string(),
        });
    }
    future
}

/// Coordinator: resolve the name and answer with id and master.
pub(crate) fn on_query(
    ctx: &NodeContext,
    sender: NodeId,
    request_num: RequestNum,
    requester: ThreadId,
    name: String,
) -> Result<()> {
    let (group_id, master) = ctx.directory().resolve(&name, ctx.node_of(requester)?)?;
    ctx.send(
        sender,
        PgasMessage::GroupQueryAnswer {
            request_num,
            requester,
            group_id,
            master,
            name,
        },
    )
}

/// Joining node: forward the request to the master.
pub(crate) fn on_query_answer(
    ctx: &NodeContext,
    request_num: RequestNum,
    requester: ThreadId,
    group_id: GroupId,
    master: NodeId,
    name: String,
) -> Result<()> {
    ctx.send(
        master,
        PgasMessage::GroupJoinRequest {
            request_num,
            requester,
            group_id,
            name,
        },
    )
}

/// Master: admit `requester` and distribute the new membership.
pub(crate) fn on_join_request(
    ctx: &NodeContext,
    sender: NodeId,
    request_num: RequestNum,
    requester: ThreadId,
    group_id: GroupId,
    name: String,
) -> Result<()> {
    let me = ctx.node_id();
    let group = ctx.group_or_insert(group_id, || {
        GroupInner::new(group_id, Some(name.clone()), me, GroupView::default(), me)
    })?;
    let key = (request_num, requester);

    let (state, members, children) = {
        let _guard = group.join_lock()?;
        let mut members = group.view()?.members().to_vec();
        let rank = match members.iter().position(|&t| t == requester) {
            Some(r) => r,
            None => {
                members.push(requester);
                members.len() - 1
            }
        } as Rank;
        let view = GroupView::new(members.clone(), Some(me), ctx.placement())?;
        let children = view.tree().children(me);
        group.install_view(view)?;
        let state = group.joins.get_or_create(key, || {
            JoinState::new(children.len(), None, Some(sender), rank)
        })?;
        (state, members, children)
    };
    tracing::debug!(
        node = me,
        group = group_id,
        thread = requester,
        rank = state.rank,
        size = members.len(),
        "member admitted"
    );

    for failure in inform(ctx, &group, key, &name, me, &members, &children) {
        state.failures.push(failure);
        settle(ctx, &group, key, &state)?;
    }
    settle(ctx, &group, key, &state)
}

/// Any node of the grown tree: install the membership and pass it on.
#[allow(clippy::too_many_arguments)]
pub(crate) fn on_inform(
    ctx: &NodeContext,
    sender: NodeId,
    request_num: RequestNum,
    requester: ThreadId,
    group_id: GroupId,
    name: String,
    master: NodeId,
    members: Vec<ThreadId>,
) -> Result<()> {
    let me = ctx.node_id();
    let view = GroupView::new(members.clone(), Some(master), ctx.placement())?;
    let children = view.tree().children(me);
    let group = ctx.group_or_insert(group_id, || {
        GroupInner::new(group_id, Some(name.clone()), master, GroupView::default(), me)
    })?;
    group.install_view(view)?;
    if let Some(previous) = group.adopt_parent(sender)? {
        tracing::warn!(
            node = me,
            group = group_id,
            previous,
            parent = sender,
            "join: membership update from a different parent"
        );
    }

    let key = (request_num, requester);
    let state = group.joins.get_or_create(key, || {
        JoinState::new(children.len(), Some(sender), None, 0)
    })?;
    for failure in inform(ctx, &group, key, &name, master, &members, &children) {
        state.failures.push(failure);
        settle(ctx, &group, key, &state)?;
    }
    settle(ctx, &group, key, &state)
}

/// A child subtree has installed the membership of `key`, except where
/// `failures` say otherwise.
pub(crate) fn on_confirm(
    ctx: &NodeContext,
    group: &GroupInner,
    key: RequestKey,
    failures: Vec<Failure>,
) -> Result<()> {
    let Some(state) = group.joins.get(key)? else {
        tracing::warn!(
            node = ctx.node_id(),
            group = group.id(),
            request = key.0,
            "join: confirmation for unknown request"
        );
        return Ok(());
    };
    for failure in failures {
        state.failures.push(failure);
    }
    settle(ctx, group, key, &state)
}

/// Joining node: hand the caller its group handle.
pub(crate) fn on_response(
    ctx: &Arc<NodeContext>,
    key: RequestKey,
    group_id: GroupId,
    rank: Rank,
    failures: Vec<Failure>,
) -> Result<()> {
    let (request_num, thread) = key;
    let Some(pending) = ctx.joins.remove(key)? else {
        tracing::warn!(node = ctx.node_id(), request = request_num, "join: response for unknown request");
        return Ok(());
    };
    if !failures.is_empty() {
        tracing::warn!(
            node = ctx.node_id(),
            group = group_id,
            thread,
            failures = failures.len(),
            "join: membership update incomplete"
        );
        pending.future.signal_exception(PgasError::JoinFailed {
            name: pending.name.clone(),
            reason: describe_failures(&failures),
        });
        return Ok(());
    }
    tracing::debug!(node = ctx.node_id(), group = group_id, thread, rank, "group joined");
    let outcome = ctx
        .group(group_id)
        .map(|inner| Group::new(Arc::clone(ctx), thread, inner))
        .map_err(|e| PgasError::JoinFailed {
            name: pending.name.clone(),
            reason: e.to_string(),
        });
    pending.future.complete(outcome);
    Ok(())
}

/// Send the membership to `children`. Returns one failure per child that
/// could not be reached.
fn inform(
    ctx: &NodeContext,
    group: &GroupInner,
    key: RequestKey,
    name: &str,
    master: NodeId,
    members: &[ThreadId],
    children: &[NodeId],
) -> Vec<Failure> {
    let mut failed = Vec::new();
    for &child in children {
        let msg = PgasMessage::GroupJoinInform {
            request_num: key.0,
            requester: key.1,
            group_id: group.id(),
            name: name.to_string(),
            master,
            members: members.to_vec(),
        };
        if let Err(e) = ctx.send(child, msg) {
            tracing::error!(node = ctx.node_id(), child, group = group.id(), "join: inform failed: {e}");
            failed.push(Failure::from_error(ctx.node_id(), None, &e));
        }
    }
    failed
}

/// Count one confirmation, reporting upwards once all are in.
fn settle(ctx: &NodeContext, group: &GroupInner, key: RequestKey, state: &JoinState) -> Result<()> {
    if state.countdown.tick() {
        finish(ctx, group, key, state)?;
    }
    Ok(())
}

fn finish(ctx: &NodeContext, group: &GroupInner, key: RequestKey, state: &JoinState) -> Result<()> {
    group.joins.remove(key)?;
    let (request_num, requester) = key;
    let failures = state.take_failures();
    match (state.parent, state.reply_to) {
        (Some(parent), _) => ctx.send(
            parent,
            PgasMessage::GroupJoinConfirm {
                request_num,
                requester,
                group_id: group.id(),
                failures,
            },
        ),
        (None, Some(node)) => ctx.send(
            node,
            PgasMessage::GroupJoinResponse {
                request_num,
                requester,
                group_id: group.id(),
                rank: state.rank,
                failures,
            },
        ),
        (None, None) => Err(PgasError::Runtime(format!(
            "join request {request_num} of thread {requester} has nowhere to report"
        ))),
    }
}
