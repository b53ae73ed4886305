//! Splitting a group into disjoint sub-groups.
//!
//! Every member calls split with a split key and an ordering key. The
//! requests are gathered up the tree to the root, which reserves one fresh
//! group id per distinct split key at the coordinator and sends the
//! assignment down. Each node instantiates the new groups it takes part in
//! and reports ready; once the whole tree is ready the root releases the
//! callers. A subtree the assignment cannot reach counts as ready with a
//! failure, and every caller's split then fails with it.

use crate::client::Group;
use crate::collective::future::PgasFuture;
use crate::collective::registry::Countdown;
use crate::error::{Failure, PgasError, Result};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{PgasMessage, SplitEntry, SplitGroup};
use crate::types::{COORDINATOR, GroupId, NodeId, ThreadId};
use crossbeam_queue::SegQueue;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// One node's part of one split round.
pub(crate) struct SplitState {
    /// Local members still to call split.
    arrivals: Countdown,
    /// Child subtrees still to report, plus the local members as one.
    requests: Countdown,
    /// Child subtrees still to instantiate, plus this node.
    ready: Countdown,
    entries: Mutex<Vec<SplitEntry>>,
    waiters: Mutex<Vec<(ThreadId, PgasFuture<Group>)>>,
    assigned: Mutex<HashMap<ThreadId, GroupId>>,
    failures: SegQueue<Failure>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| PgasError::LockPoisoned("split state"))
}

impl SplitState {
    fn new(local_members: usize, children: usize) -> Self {
        Self {
            arrivals: Countdown::new(local_members),
            requests: Countdown::new(children + usize::from(local_members > 0)),
            ready: Countdown::new(children + 1),
            entries: Mutex::new(Vec::new()),
            waiters: Mutex::new(Vec::new()),
            assigned: Mutex::new(HashMap::new()),
            failures: SegQueue::new(),
        }
    }

    fn take_failures(&self) -> Vec<Failure> {
        std::iter::from_fn(|| self.failures.pop()).collect()
    }
}

/// Group the entries by split key.
///
/// New groups are numbered from `first_id` in ascending split-key order.
/// Members are ordered by ordering key, ties broken by rank in the old
/// group.
pub(crate) fn assign(entries: &[SplitEntry], first_id: GroupId) -> Vec<SplitGroup> {
    let mut by_key: BTreeMap<u32, Vec<&SplitEntry>> = BTreeMap::new();
    for e in entries {
        by_key.entry(e.split_key).or_default().push(e);
    }
    by_key
        .into_values()
        .zip(first_id..)
        .map(|(mut members, group_id)| {
            members.sort_by_key(|e| (e.ordering_key, e.rank));
            SplitGroup {
                group_id,
                members: members.into_iter().map(|e| e.thread).collect(),
            }
        })
        .collect()
}

fn distinct_keys(entries: &[SplitEntry]) -> u32 {
    let mut keys: Vec<u32> = entries.iter().map(|e| e.split_key).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len() as u32
}

/// Enter the next split round of `thread` in `group`.
pub(crate) fn split(
    ctx: &NodeContext,
    group: &GroupInner,
    thread: ThreadId,
    split_key: u32,
    ordering_key: u32,
) -> PgasFuture<Group> {
    enter(ctx, group, thread, split_key, ordering_key).unwrap_or_else(PgasFuture::failed)
}

fn enter(
    ctx: &NodeContext,
    group: &GroupInner,
    thread: ThreadId,
    split_key: u32,
    ordering_key: u32,
) -> Result<PgasFuture<Group>> {
    let rank = group.view()?.rank_of(thread).ok_or(PgasError::NotAMember {
        thread,
        group: group.id(),
    })?;
    let round = group.rounds(thread)?.next_split();
    let state = split_state(ctx, group, round)?;

    let future = PgasFuture::new();
    lock(&state.waiters)?.push((thread, future.clone()));
    lock(&state.entries)?.push(SplitEntry {
        thread,
        rank,
        split_key,
        ordering_key,
    });
    if state.arrivals.tick() && state.requests.tick() {
        gathered(ctx, group, round, &state)?;
    }
    Ok(future)
}

fn split_state(ctx: &NodeContext, group: &GroupInner, round: u64) -> Result<Arc<SplitState>> {
    let me = ctx.node_id();
    let view = group.view()?;
    group.splits.get_or_create(round, || {
        SplitState::new(view.local_members(me).len(), view.tree().children(me).len())
    })
}

/// Entries of a child subtree.
pub(crate) fn on_request(
    ctx: &NodeContext,
    group: &GroupInner,
    round: u64,
    entries: Vec<SplitEntry>,
) -> Result<()> {
    let state = split_state(ctx, group, round)?;
    lock(&state.entries)?.extend(entries);
    if state.requests.tick() {
        gathered(ctx, group, round, &state)?;
    }
    Ok(())
}

/// All entries of this subtree are in.
fn gathered(ctx: &NodeContext, group: &GroupInner, round: u64, state: &SplitState) -> Result<()> {
    let group_id = group.id();
    match group.parent()? {
        Some(parent) => {
            let entries = std::mem::take(&mut *lock(&state.entries)?);
            ctx.send(
                parent,
                PgasMessage::SplitRequest {
                    group_id,
                    round,
                    entries,
                },
            )
        }
        None => {
            // The root keeps the entries until ids are reserved.
            let count = distinct_keys(&lock(&state.entries)?);
            ctx.send(
                COORDINATOR,
                PgasMessage::SplitQuery {
                    group_id,
                    round,
                    count,
                },
            )
        }
    }
}

/// Coordinator: reserve `count` fresh ids.
pub(crate) fn on_query(
    ctx: &NodeContext,
    sender: NodeId,
    group_id: GroupId,
    round: u64,
    count: u32,
) -> Result<()> {
    let first_id = ctx.directory().reserve(count);
    ctx.send(
        sender,
        PgasMessage::SplitAnswer {
            group_id,
            round,
            first_id,
        },
    )
}

/// Root: ids are reserved, compute and distribute the assignment.
pub(crate) fn on_answer(
    ctx: &NodeContext,
    group: &GroupInner,
    round: u64,
    first_id: GroupId,
) -> Result<()> {
    let state = split_state(ctx, group, round)?;
    let entries = std::mem::take(&mut *lock(&state.entries)?);
    let groups = assign(&entries, first_id);
    tracing::debug!(
        node = ctx.node_id(),
        group = group.id(),
        round,
        groups = groups.len(),
        "split assigned"
    );
    on_assign(ctx, group, round, groups)
}

/// Instantiate the new groups this node takes part in.
pub(crate) fn on_assign(
    ctx: &NodeContext,
    group: &GroupInner,
    round: u64,
    groups: Vec<SplitGroup>,
) -> Result<()> {
    let me = ctx.node_id();
    let state = split_state(ctx, group, round)?;
    for child in group.view()?.tree().children(me) {
        let sent = ctx.send(
            child,
            PgasMessage::SplitAssign {
                group_id: group.id(),
                round,
                groups: groups.clone(),
            },
        );
        if let Err(e) = sent {
            tracing::error!(node = me, child, group = group.id(), round, "split: assignment failed: {e}");
            state.failures.push(Failure::from_error(me, None, &e));
            // This node's own tick is still outstanding.
            state.ready.tick();
        }
    }

    for sg in groups {
        let view = GroupView::new(sg.members, None, ctx.placement())?;
        if !view.tree().contains(me) {
            continue;
        }
        {
            let mut assigned = lock(&state.assigned)?;
            for &t in view.members() {
                if ctx.hosts(t) {
                    assigned.insert(t, sg.group_id);
                }
            }
        }
        let master = view.tree().root().unwrap_or(me);
        ctx.group_or_insert(sg.group_id, || {
            GroupInner::new(sg.group_id, None, master, view, me)
        })?;
    }

    if state.ready.tick() {
        subtree_ready(ctx, group, round, &state)?;
    }
    Ok(())
}

/// A child subtree has instantiated its groups, except where `failures`
/// say otherwise.
pub(crate) fn on_ready(
    ctx: &NodeContext,
    group: &GroupInner,
    round: u64,
    failures: Vec<Failure>,
) -> Result<()> {
    let state = split_state(ctx, group, round)?;
    for failure in failures {
        state.failures.push(failure);
    }
    if state.ready.tick() {
        subtree_ready(ctx, group, round, &state)?;
    }
    Ok(())
}

fn subtree_ready(ctx: &NodeContext, group: &GroupInner, round: u64, state: &SplitState) -> Result<()> {
    let failures = state.take_failures();
    match group.parent()? {
        Some(parent) => ctx.send(
            parent,
            PgasMessage::SplitReady {
                group_id: group.id(),
                round,
                failures,
            },
        ),
        None => {
            let group_id = group.id();
            tracing::debug!(
                node = ctx.node_id(),
                group = group_id,
                round,
                failures = failures.len(),
                "split ready"
            );
            ctx.send(
                ctx.node_id(),
                PgasMessage::SplitGo {
                    group_id,
                    round,
                    failures,
                },
            )
        }
    }
}

/// Release the callers of `round` here and below. Non-empty `failures` fail
/// every caller.
pub(crate) fn on_go(
    ctx: &Arc<NodeContext>,
    group: &GroupInner,
    round: u64,
    failures: Vec<Failure>,
) -> Result<()> {
    let me = ctx.node_id();
    for child in group.view()?.tree().children(me) {
        let sent = ctx.send(
            child,
            PgasMessage::SplitGo {
                group_id: group.id(),
                round,
                failures: failures.clone(),
            },
        );
        if let Err(e) = sent {
            tracing::error!(node = me, child, group = group.id(), round, "split: release failed: {e}");
        }
    }

    let Some(state) = group.splits.remove(round)? else {
        tracing::warn!(node = me, group = group.id(), round, "split: release for unknown round");
        return Ok(());
    };
    let assigned = std::mem::take(&mut *lock(&state.assigned)?);
    let waiters = std::mem::take(&mut *lock(&state.waiters)?);
    for (thread, future) in waiters {
        if !failures.is_empty() {
            future.signal_exception(PgasError::collective("split", failures.clone()));
            continue;
        }
        let outcome = assigned
            .get(&thread)
            .ok_or_else(|| PgasError::Runtime(format!("thread {thread} missing from split assignment")))
            .and_then(|&id| ctx.group(id))
            .map(|inner| Group::new(Arc::clone(ctx), thread, inner));
        future.complete(outcome);
    }
    Ok(())
}
