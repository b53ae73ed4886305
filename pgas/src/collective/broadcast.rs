use crate::collective::engine::{decode, launch};
use crate::collective::future::PgasFuture;
use crate::error::Failure;
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, Operation};
use crate::types::ThreadId;

/// Store `value` into `variable` of every member of the group.
pub(crate) fn broadcast(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    variable: &str,
    value: Vec<u8>,
) -> PgasFuture<()> {
    let op = Operation::Broadcast {
        variable: variable.to_string(),
        value,
    };
    launch(ctx, group, requester, Ok(op), decode::unit)
}

/// Write the value into the members hosted here.
pub(super) fn apply(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
    value: &[u8],
) -> Result<Contribution, Vec<Failure>> {
    let me = ctx.node_id();
    let failures: Vec<Failure> = view
        .local_members(me)
        .into_iter()
        .filter_map(|(_, thread)| {
            ctx.storage(thread)
                .and_then(|s| s.put(variable, value.to_vec()))
                .err()
                .map(|e| Failure::from_error(me, Some(thread), &e))
        })
        .collect();
    if failures.is_empty() {
        Ok(Contribution::Done)
    } else {
        Err(failures)
    }
}
