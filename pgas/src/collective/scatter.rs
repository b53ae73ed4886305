use crate::collective::engine::{decode, launch};
use crate::collective::future::PgasFuture;
use crate::element::Element;
use crate::error::{Failure, PgasError};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, Operation};
use crate::types::{NodeId, Rank, ThreadId};

/// Store `values[rank]` into `variable` of the member at each rank. Ranks
/// not present in `values` are left untouched.
pub(crate) fn scatter<T: Element>(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    variable: &str,
    values: impl IntoIterator<Item = (Rank, T)>,
) -> PgasFuture<()> {
    let op = Operation::Scatter {
        variable: variable.to_string(),
        values: values
            .into_iter()
            .map(|(rank, v)| (rank, v.to_bytes()))
            .collect(),
    };
    launch(ctx, group, requester, Ok(op), decode::unit)
}

/// The part of the operation destined for `child`'s subtree.
pub(super) fn route(
    view: &GroupView,
    child: NodeId,
    variable: &str,
    values: &[(Rank, Vec<u8>)],
) -> Operation {
    let subtree = view.tree().subtree(child);
    let values = values
        .iter()
        .filter(|(rank, _)| {
            view.node_of_rank(*rank)
                .is_some_and(|node| subtree.contains(&node))
        })
        .cloned()
        .collect();
    Operation::Scatter {
        variable: variable.to_string(),
        values,
    }
}

/// Write the entries of the members hosted here. Entries for ranks outside
/// the group fail; entries bound for a child subtree were already forwarded.
pub(super) fn apply(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
    values: &[(Rank, Vec<u8>)],
) -> Result<Contribution, Vec<Failure>> {
    let me = ctx.node_id();
    let mut failures = Vec::new();
    for (rank, bytes) in values {
        let rank = *rank;
        match view.node_of_rank(rank) {
            Some(node) if node == me => {
                let thread = view.thread_at(rank).ok();
                let written = view
                    .thread_at(rank)
                    .and_then(|t| ctx.storage(t)?.put(variable, bytes.clone()));
                if let Err(e) = written {
                    failures.push(Failure::from_error(me, thread, &e));
                }
            }
            Some(node) if view.tree().child_towards(me, node).is_some() => {}
            _ => failures.push(Failure::from_error(
                me,
                None,
                &PgasError::InvalidRank {
                    rank,
                    size: view.size(),
                },
            )),
        }
    }
    if failures.is_empty() {
        Ok(Contribution::Done)
    } else {
        Err(failures)
    }
}
