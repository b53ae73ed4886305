use crate::collective::engine::{decode, launch, read_members};
use crate::collective::future::PgasFuture;
use crate::collective::operators::OperatorRegistry;
use crate::element::Element;
use crate::error::{Failure, PgasError, Result};
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, Operation};
use crate::types::ThreadId;

/// Fold `variable` of every member through the collector registered under
/// `collector`; the result is the collector's finished output.
pub(crate) fn collect<O: Element>(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    variable: &str,
    collector: u16,
) -> PgasFuture<O> {
    let op = ctx.operators().collector(collector).map(|_| Operation::Collect {
        variable: variable.to_string(),
        collector,
    });
    launch(ctx, group, requester, op, decode::value::<O>)
}

/// Accumulate the members hosted here into a fresh accumulator.
pub(super) fn local(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
    collector: u16,
) -> std::result::Result<Contribution, Vec<Failure>> {
    let me = ctx.node_id();
    let values = read_members(ctx, view, variable)?;
    let accumulate = || -> Result<Vec<u8>> {
        let c = ctx.operators().collector(collector)?;
        values
            .iter()
            .try_fold(c.supply()?, |acc, (_, item)| c.accumulate(&acc, item))
    };
    accumulate()
        .map(Contribution::Value)
        .map_err(|e| vec![Failure::from_error(me, None, &e)])
}

pub(super) fn merge(
    operators: &OperatorRegistry,
    collector: u16,
    partials: impl Iterator<Item = Contribution>,
) -> Result<Contribution> {
    let c = operators.collector(collector)?;
    let mut accs = partials.filter_map(|p| match p {
        Contribution::Value(v) => Some(v),
        _ => None,
    });
    let first = accs
        .next()
        .ok_or_else(|| PgasError::Runtime("collect: no accumulator to merge".into()))?;
    accs.try_fold(first, |acc, other| c.combine(&acc, &other))
        .map(Contribution::Value)
}
