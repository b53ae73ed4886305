use crate::collective::future::PgasFuture;
use crate::collective::registry::Countdown;
use crate::error::{PgasError, Result};
use crate::group::GroupInner;
use crate::node::NodeContext;
use crate::protocol::PgasMessage;
use crate::types::ThreadId;
use std::sync::Arc;

/// One node's part of one barrier round.
pub(crate) struct SyncState {
    /// Local members still to arrive.
    arrivals: Countdown,
    /// Children still to report, plus the local members as one.
    countdown: Countdown,
    future: PgasFuture<()>,
}

impl SyncState {
    fn new(local_members: usize, children: usize) -> Self {
        Self {
            arrivals: Countdown::new(local_members),
            countdown: Countdown::new(children + usize::from(local_members > 0)),
            future: PgasFuture::new(),
        }
    }
}

/// Enter the next barrier round of `thread` in `group`.
///
/// Local arrivals are counted on the node; once all local members and all
/// child subtrees have arrived, the node reports to its parent. The root
/// releases the round down the tree.
pub(crate) fn barrier(ctx: &NodeContext, group: &GroupInner, thread: ThreadId) -> PgasFuture<()> {
    enter(ctx, group, thread).unwrap_or_else(PgasFuture::failed)
}

fn enter(ctx: &NodeContext, group: &GroupInner, thread: ThreadId) -> Result<PgasFuture<()>> {
    if group.view()?.rank_of(thread).is_none() {
        return Err(PgasError::NotAMember {
            thread,
            group: group.id(),
        });
    }
    let round = group.rounds(thread)?.next_barrier();
    let state = sync_state(ctx, group, round)?;
    let future = state.future.clone();
    if state.arrivals.tick() && state.countdown.tick() {
        arrived(ctx, group, round)?;
    }
    Ok(future)
}

fn sync_state(ctx: &NodeContext, group: &GroupInner, round: u64) -> Result<Arc<SyncState>> {
    let me = ctx.node_id();
    let view = group.view()?;
    group.barriers.get_or_create(round, || {
        SyncState::new(view.local_members(me).len(), view.tree().children(me).len())
    })
}

/// A child subtree reached `round`.
pub(crate) fn on_arrive(ctx: &NodeContext, group: &GroupInner, round: u64) -> Result<()> {
    let state = sync_state(ctx, group, round)?;
    if state.countdown.tick() {
        arrived(ctx, group, round)?;
    }
    Ok(())
}

fn arrived(ctx: &NodeContext, group: &GroupInner, round: u64) -> Result<()> {
    match group.parent()? {
        Some(parent) => ctx.send(
            parent,
            PgasMessage::BarrierArrive {
                group_id: group.id(),
                round,
            },
        ),
        None => {
            tracing::debug!(node = ctx.node_id(), group = group.id(), round, "barrier complete");
            on_go(ctx, group, round)
        }
    }
}

/// Release `round` here and below.
pub(crate) fn on_go(ctx: &NodeContext, group: &GroupInner, round: u64) -> Result<()> {
    match group.barriers.remove(round)? {
        Some(state) => {
            state.future.signal_done(());
        }
        None => tracing::warn!(
            node = ctx.node_id(),
            group = group.id(),
            round,
            "barrier: release for unknown round"
        ),
    }
    let children = group.view()?.tree().children(ctx.node_id());
    for child in children {
        let sent = ctx.send(
            child,
            PgasMessage::BarrierGo {
                group_id: group.id(),
                round,
            },
        );
        if let Err(e) = sent {
            tracing::error!(node = ctx.node_id(), child, group = group.id(), round, "barrier: release failed: {e}");
        }
    }
    Ok(())
}
