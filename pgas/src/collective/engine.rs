//! Down/up protocol shared by the single-initiator collectives.
//!
//! An operation enters the group's tree at the root, either directly when
//! the initiator's node is the root or through a `Request`. Every tree node
//! forwards it to its children, applies it to its local members, and waits
//! for one contribution per child plus its own. The subtree result goes up
//! to the parent; the root delivers the final result to the initiator's
//! node. Failures travel the same path and replace the result.

use crate::collective::future::PgasFuture;
use crate::collective::state::{Aggregate, CollectiveState, Completion, outcome};
use crate::collective::{broadcast, collect, gather, reduce, scatter};
use crate::error::{Failure, PgasError, Result};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, OpKind, Operation, PgasMessage, RequestHeader};
use crate::types::{NodeId, Rank, ThreadId};
use std::sync::Arc;

/// Start `op` on behalf of `requester` and return the future that
/// `decode` completes from the final contribution.
pub(crate) fn launch<T, F>(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    op: Result<Operation>,
    decode: F,
) -> PgasFuture<T>
where
    T: Send + 'static,
    F: FnOnce(Contribution) -> Result<T> + Send + 'static,
{
    let op = match op {
        Ok(op) => op,
        Err(e) => return PgasFuture::failed(e),
    };
    let future = PgasFuture::new();
    let waiter = future.clone();
    let completion: Completion = Box::new(move |result| {
        waiter.complete(result.and_then(decode));
    });
    if let Err(e) = start(ctx, group, requester, op, completion) {
        future.signal_exception(e);
    }
    future
}

fn start(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    op: Operation,
    completion: Completion,
) -> Result<()> {
    let me = ctx.node_id();
    let view = group.view()?;
    if view.rank_of(requester).is_none() {
        return Err(PgasError::NotAMember {
            thread: requester,
            group: group.id(),
        });
    }
    let root = view.tree().root().ok_or(PgasError::UnknownGroup {
        group: group.id(),
        node: me,
    })?;

    let kind = op.kind();
    let children = view.tree().children(me).len();
    let registry = group.requests(kind);
    let (request_num, _) = registry.create(requester, |num| {
        CollectiveState::with_completion(num, requester, children, completion)
    })?;
    let header = RequestHeader {
        group_id: group.id(),
        request_num,
        requester,
    };
    tracing::debug!(
        node = me,
        group = group.id(),
        request = request_num,
        requester,
        op = kind.name(),
        "collective started"
    );

    let entered = if root == me {
        down(ctx, group, header, op)
    } else {
        ctx.send(root, PgasMessage::Request { header, op })
    };
    if let Err(e) = entered {
        registry.remove(header.key())?;
        return Err(e);
    }
    Ok(())
}

/// An operation arrives from the initiator (at the root) or from the parent.
pub(crate) fn down(
    ctx: &NodeContext,
    group: &GroupInner,
    header: RequestHeader,
    op: Operation,
) -> Result<()> {
    let me = ctx.node_id();
    let view = group.view()?;
    let kind = op.kind();
    let children = view.tree().children(me);
    let state = group.requests(kind).get_or_create(header.key(), || {
        CollectiveState::new(header.request_num, header.requester, children.len())
    })?;
    state.set_aggregate(aggregate_of(&op));

    // Fan out first so the subtrees work while the local effect is applied.
    for &child in &children {
        let child_op = match &op {
            Operation::Scatter { variable, values } => scatter::route(&view, child, variable, values),
            other => other.clone(),
        };
        if let Err(e) = ctx.send(child, PgasMessage::Down { header, op: child_op }) {
            tracing::warn!(node = me, child, "collective: forwarding failed: {e}");
            state.record(child, None, vec![Failure::from_error(me, None, &e)]);
            if state.notify() {
                complete(ctx, group, header, kind, &state)?;
            }
        }
    }

    match apply_local(ctx, &view, &op) {
        Ok(contribution) => state.record(me, Some(contribution), Vec::new()),
        Err(failures) => state.record(me, None, failures),
    }
    if state.notify() {
        complete(ctx, group, header, kind, &state)?;
    }
    Ok(())
}

/// A child's subtree result.
pub(crate) fn on_up(
    ctx: &NodeContext,
    sender: NodeId,
    group: &GroupInner,
    header: RequestHeader,
    kind: OpKind,
    contribution: Option<Contribution>,
    failures: Vec<Failure>,
) -> Result<()> {
    let children = group.view()?.tree().children(ctx.node_id()).len();
    let state = group.requests(kind).get_or_create(header.key(), || {
        CollectiveState::new(header.request_num, header.requester, children)
    })?;
    state.record(sender, contribution, failures);
    if state.notify() {
        complete(ctx, group, header, kind, &state)?;
    }
    Ok(())
}

/// The final result, on the initiator's node.
pub(crate) fn on_response(
    group: &GroupInner,
    header: RequestHeader,
    kind: OpKind,
    contribution: Option<Contribution>,
    failures: Vec<Failure>,
) -> Result<()> {
    match group.requests(kind).remove(header.key())? {
        Some(state) => {
            state.finish(outcome(kind.name(), contribution, failures));
        }
        None => tracing::warn!(
            group = group.id(),
            request = header.request_num,
            requester = header.requester,
            "collective: response for unknown request"
        ),
    }
    Ok(())
}

/// All notifications are in: merge and pass the result on.
fn complete(
    ctx: &NodeContext,
    group: &GroupInner,
    header: RequestHeader,
    kind: OpKind,
    state: &Arc<CollectiveState>,
) -> Result<()> {
    let me = ctx.node_id();
    let mut failures = state.take_failures();
    let mut contribution = None;
    if failures.is_empty() {
        match merge(ctx, &*group.view()?, state) {
            Ok(c) => contribution = Some(c),
            Err(e) => failures.push(Failure::from_error(me, None, &e)),
        }
    }

    let registry = group.requests(kind);
    if let Some(parent) = group.parent()? {
        // The initiator's node keeps the state to receive the response.
        if !ctx.hosts(header.requester) {
            registry.remove(header.key())?;
        }
        return ctx.send(
            parent,
            PgasMessage::Up {
                header,
                kind,
                contribution,
                failures,
            },
        );
    }

    let finished = match (state.aggregate(), &contribution) {
        (Some(Aggregate::Collect(id)), Some(Contribution::Value(acc))) => {
            Some(ctx.operators().collector(id).and_then(|c| c.finish(acc)))
        }
        _ => None,
    };
    match finished {
        Some(Ok(out)) => contribution = Some(Contribution::Value(out)),
        Some(Err(e)) => {
            contribution = None;
            failures.push(Failure::from_error(me, None, &e));
        }
        None => {}
    }

    registry.remove(header.key())?;
    tracing::debug!(
        node = me,
        group = group.id(),
        request = header.request_num,
        op = kind.name(),
        failures = failures.len(),
        "collective finished"
    );
    let requester_node = ctx.node_of(header.requester)?;
    if requester_node == me {
        state.finish(outcome(kind.name(), contribution, failures));
        Ok(())
    } else {
        ctx.send(
            requester_node,
            PgasMessage::Response {
                header,
                kind,
                contribution,
                failures,
            },
        )
    }
}

fn aggregate_of(op: &Operation) -> Aggregate {
    match op {
        Operation::Broadcast { .. } | Operation::Scatter { .. } => Aggregate::Acknowledge,
        Operation::Reduce { reducer, .. } => Aggregate::Reduce(*reducer),
        Operation::Collect { collector, .. } => Aggregate::Collect(*collector),
        Operation::Gather { .. } => Aggregate::Gather,
    }
}

/// Apply `op` to the members hosted here and produce this node's own
/// contribution.
fn apply_local(
    ctx: &NodeContext,
    view: &GroupView,
    op: &Operation,
) -> std::result::Result<Contribution, Vec<Failure>> {
    match op {
        Operation::Broadcast { variable, value } => broadcast::apply(ctx, view, variable, value),
        Operation::Reduce { variable, reducer } => reduce::local(ctx, view, variable, *reducer),
        Operation::Collect {
            variable,
            collector,
        } => collect::local(ctx, view, variable, *collector),
        Operation::Gather { variable } => gather::local(ctx, view, variable),
        Operation::Scatter { variable, values } => scatter::apply(ctx, view, variable, values),
    }
}

/// Combine the partial results: the local one first, then the children in
/// tree order, so the result does not depend on arrival order.
fn merge(ctx: &NodeContext, view: &GroupView, state: &CollectiveState) -> Result<Contribution> {
    let aggregate = state.aggregate().ok_or_else(|| {
        PgasError::Runtime(format!(
            "request {} completed before its operation arrived",
            state.request_num()
        ))
    })?;
    let mut partials = state.take_partials();
    partials.sort_by_key(|(from, _)| view.tree().position(*from).unwrap_or(usize::MAX));
    let partials = partials.into_iter().map(|(_, c)| c);

    match aggregate {
        Aggregate::Acknowledge => Ok(Contribution::Done),
        Aggregate::Reduce(spec) => reduce::merge(ctx.operators(), spec, partials),
        Aggregate::Collect(id) => collect::merge(ctx.operators(), id, partials),
        Aggregate::Gather => Ok(gather::merge(partials)),
    }
}

/// Read `variable` of every member hosted here, in rank order. Each member
/// whose read fails contributes a failure instead.
pub(crate) fn read_members(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
) -> std::result::Result<Vec<(Rank, Vec<u8>)>, Vec<Failure>> {
    let me = ctx.node_id();
    let mut values = Vec::new();
    let mut failures = Vec::new();
    for (rank, thread) in view.local_members(me) {
        match ctx.storage(thread).and_then(|s| s.get(variable)) {
            Ok(bytes) => values.push((rank, bytes)),
            Err(e) => failures.push(Failure::from_error(me, Some(thread), &e)),
        }
    }
    if failures.is_empty() {
        Ok(values)
    } else {
        Err(failures)
    }
}

/// Decoders from the final contribution to the initiator's result.
pub(crate) mod decode {
    use crate::element::Element;
    use crate::error::{PgasError, Result};
    use crate::protocol::Contribution;
    use crate::types::Rank;
    use std::collections::BTreeMap;

    pub(crate) fn unit(_: Contribution) -> Result<()> {
        Ok(())
    }

    pub(crate) fn value<T: Element>(c: Contribution) -> Result<T> {
        match c {
            Contribution::Value(bytes) => T::from_bytes(&bytes),
            other => Err(unexpected("a value", &other)),
        }
    }

    pub(crate) fn entries<T: Element>(c: Contribution) -> Result<BTreeMap<Rank, T>> {
        match c {
            Contribution::Entries(entries) => entries
                .into_iter()
                .map(|(rank, bytes)| Ok((rank, T::from_bytes(&bytes)?)))
                .collect(),
            other => Err(unexpected("ranked entries", &other)),
        }
    }

    fn unexpected(wanted: &str, got: &Contribution) -> PgasError {
        PgasError::DecodeFailed(format!("expected {wanted}, got {got:?}"))
    }
}
