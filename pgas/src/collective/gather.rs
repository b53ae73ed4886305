use crate::collective::engine::{decode, launch, read_members};
use crate::collective::future::PgasFuture;
use crate::element::Element;
use crate::error::Failure;
use crate::group::{GroupInner, GroupView};
use crate::node::NodeContext;
use crate::protocol::{Contribution, Operation};
use crate::types::{Rank, ThreadId};
use std::collections::BTreeMap;

/// Collect `variable` of every member, keyed by group rank.
pub(crate) fn gather<T: Element>(
    ctx: &NodeContext,
    group: &GroupInner,
    requester: ThreadId,
    variable: &str,
) -> PgasFuture<BTreeMap<Rank, T>> {
    let op = Operation::Gather {
        variable: variable.to_string(),
    };
    launch(ctx, group, requester, Ok(op), decode::entries::<T>)
}

pub(super) fn local(
    ctx: &NodeContext,
    view: &GroupView,
    variable: &str,
) -> Result<Contribution, Vec<Failure>> {
    read_members(ctx, view, variable).map(Contribution::Entries)
}

/// Union of the subtrees' entries, ordered by rank.
pub(super) fn merge(partials: impl Iterator<Item = Contribution>) -> Contribution {
    let mut entries: Vec<(Rank, Vec<u8>)> = partials
        .flat_map(|p| match p {
            Contribution::Entries(e) => e,
            _ => Vec::new(),
        })
        .collect();
    entries.sort_by_key(|(rank, _)| *rank);
    Contribution::Entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_orders_by_rank() {
        let partials = vec![
            Contribution::Entries(vec![(2, vec![2]), (0, vec![0])]),
            Contribution::Entries(vec![(1, vec![1])]),
            Contribution::Done,
        ];
        assert_eq!(
            merge(partials.into_iter()),
            Contribution::Entries(vec![(0, vec![0]), (1, vec![1]), (2, vec![2])])
        );
    }
}
