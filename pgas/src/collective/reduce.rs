use crate::collective::engine::{decode, launch, read_members};
use crate::collective::future::PgasFuture;
use crate::collective::operators::{OperatorRegistry, Reducer};
use crate::element::Element;
use crate::error::{Failure, Result};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, Operation, ReducerSpec};
use crate::types::ThreadId;

/// Combine `variable` of every member with `reducer`, in rank order within
/// each node and tree order across nodes.
pub(crate) fn reduce<T: Element>(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    variable: &str,
    reducer: Reducer,
) -> PgasFuture<T> {
    let op = reducer.spec::<T>().and_then(|spec| {
        ctx.operators().check_reducer(spec)?;
        Ok(Operation::Reduce {
            variable: variable.to_string(),
            reducer: spec,
        })
    });
    launch(ctx, group, requester, op, decode::value::<T>)
}

/// Reduce the values of the members hosted here. A node without members
/// contributes nothing.
pub(super) fn local(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
    spec: ReducerSpec,
) -> std::result::Result<Contribution, Vec<Failure>> {
    let values = read_members(ctx, view, variable)?;
    fold(ctx.operators(), spec, values.into_iter().map(|(_, v)| v))
        .map_err(|e| vec![Failure::from_error(ctx.node_id(), None, &e)])
}

pub(super) fn merge(
    operators: &OperatorRegistry,
    spec: ReducerSpec,
    partials: impl Iterator<Item = Contribution>,
) -> Result<Contribution> {
    fold(
        operators,
        spec,
        partials.filter_map(|c| match c {
            Contribution::Value(v) => Some(v),
            _ => None,
        }),
    )
}

fn fold(
    operators: &OperatorRegistry,
    spec: ReducerSpec,
    mut values: impl Iterator<Item = Vec<u8>>,
) -> Result<Contribution> {
    let Some(mut acc) = values.next() else {
        return Ok(Contribution::Done);
    };
    for v in values {
        operators.reduce(spec, &mut acc, &v)?;
    }
    Ok(Contribution::Value(acc))
}
