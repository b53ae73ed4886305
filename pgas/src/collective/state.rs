use crate::collective::registry::Countdown;
use crate::error::{Failure, PgasError, Result};
use crate::protocol::{Contribution, ReducerSpec};
use crate::types::{NodeId, RequestNum, ThreadId};
use crossbeam_queue::SegQueue;
use std::sync::{Mutex, OnceLock};

/// Delivers the final outcome to the initiating thread's future.
pub(crate) type Completion = Box<dyn FnOnce(Result<Contribution>) + Send>;

/// How partial results of a subtree are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aggregate {
    /// Nothing to merge (broadcast, scatter).
    Acknowledge,
    Reduce(ReducerSpec),
    Collect(u16),
    Gather,
}

/// One node's view of a single collective request.
///
/// Created by whichever event reaches the node first: the initiator's call,
/// the operation coming down, or a child's contribution coming up. The
/// countdown expects the local contribution plus one per child.
pub(crate) struct CollectiveState {
    request_num: RequestNum,
    requester: ThreadId,
    countdown: Countdown,
    aggregate: OnceLock<Aggregate>,
    partials: SegQueue<(NodeId, Contribution)>,
    failures: SegQueue<Failure>,
    completion: Mutex<Option<Completion>>,
}

impl std::fmt::Debug for CollectiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectiveState")
            .field("request_num", &self.request_num)
            .field("requester", &self.requester)
            .field("remaining", &self.countdown.remaining())
            .finish_non_exhaustive()
    }
}

impl CollectiveState {
    pub(crate) fn new(request_num: RequestNum, requester: ThreadId, children: usize) -> Self {
        Self {
            request_num,
            requester,
            countdown: Countdown::new(children + 1),
            aggregate: OnceLock::new(),
            partials: SegQueue::new(),
            failures: SegQueue::new(),
            completion: Mutex::new(None),
        }
    }

    /// State on the initiator's node, which also owns the completion.
    pub(crate) fn with_completion(
        request_num: RequestNum,
        requester: ThreadId,
        children: usize,
        completion: Completion,
    ) -> Self {
        let state = Self::new(request_num, requester, children);
        if let Ok(mut slot) = state.completion.lock() {
            *slot = Some(completion);
        }
        state
    }

    pub(crate) fn request_num(&self) -> RequestNum {
        self.request_num
    }

    pub(crate) fn set_aggregate(&self, aggregate: Aggregate) {
        let _ = self.aggregate.set(aggregate);
    }

    pub(crate) fn aggregate(&self) -> Option<Aggregate> {
        self.aggregate.get().copied()
    }

    /// Record what `from` reported. Failures win over the contribution.
    pub(crate) fn record(
        &self,
        from: NodeId,
        contribution: Option<Contribution>,
        failures: Vec<Failure>,
    ) {
        if failures.is_empty() {
            if let Some(c) = contribution {
                self.partials.push((from, c));
            }
        } else {
            for f in failures {
                self.failures.push(f);
            }
        }
    }

    /// Count one notification; `true` exactly once, when all are in.
    pub(crate) fn notify(&self) -> bool {
        self.countdown.tick()
    }

    pub(crate) fn take_partials(&self) -> Vec<(NodeId, Contribution)> {
        std::iter::from_fn(|| self.partials.pop()).collect()
    }

    pub(crate) fn take_failures(&self) -> Vec<Failure> {
        std::iter::from_fn(|| self.failures.pop()).collect()
    }

    /// Hand `outcome` to the completion, if this state has one. Returns
    /// whether a completion ran.
    pub(crate) fn finish(&self, outcome: Result<Contribution>) -> bool {
        let completion = match self.completion.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match completion {
            Some(complete) => {
                complete(outcome);
                true
            }
            None => {
                tracing::warn!(
                    request = self.request_num,
                    requester = self.requester,
                    "collective finished without a waiter"
                );
                false
            }
        }
    }
}

/// Final outcome for the initiator, from what reached the tree root.
pub(crate) fn outcome(
    operation: &'static str,
    contribution: Option<Contribution>,
    failures: Vec<Failure>,
) -> Result<Contribution> {
    if !failures.is_empty() {
        return Err(PgasError::collective(operation, failures));
    }
    contribution.ok_or_else(|| PgasError::Runtime(format!("{operation} finished without a result")))
}
