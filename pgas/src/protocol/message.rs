use crate::error::Failure;
use crate::types::{DataType, GroupId, NodeId, Rank, ReduceOp, RequestNum, ThreadId};

/// Identifies one collective request in flight.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub group_id: GroupId,
    pub request_num: RequestNum,
    /// Global id of the thread that issued the operation.
    pub requester: ThreadId,
}

impl RequestHeader {
    pub fn key(&self) -> (RequestNum, ThreadId) {
        (self.request_num, self.requester)
    }
}

/// Kinds of single-initiator collectives driven by the down/up engine.
#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum OpKind {
    Broadcast,
    Reduce,
    Collect,
    Gather,
    Scatter,
}

impl OpKind {
    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Broadcast => "broadcast",
            OpKind::Reduce => "reduce",
            OpKind::Collect => "collect",
            OpKind::Gather => "gather",
            OpKind::Scatter => "scatter",
        }
    }
}

/// How a reduce combines two values.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducerSpec {
    /// Element-wise built-in operation over `dtype` elements.
    Builtin { op: ReduceOp, dtype: DataType },
    /// A reducer registered under `id` on every node.
    Custom { id: u16 },
}

/// Payload of a request travelling down the tree.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum Operation {
    Broadcast { variable: String, value: Vec<u8> },
    Reduce { variable: String, reducer: ReducerSpec },
    Collect { variable: String, collector: u16 },
    Gather { variable: String },
    /// Values keyed by group rank. Only the entries routed through the
    /// receiving subtree are carried.
    Scatter { variable: String, values: Vec<(Rank, Vec<u8>)> },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Broadcast { .. } => OpKind::Broadcast,
            Operation::Reduce { .. } => OpKind::Reduce,
            Operation::Collect { .. } => OpKind::Collect,
            Operation::Gather { .. } => OpKind::Gather,
            Operation::Scatter { .. } => OpKind::Scatter,
        }
    }

    pub fn variable(&self) -> &str {
        match self {
            Operation::Broadcast { variable, .. }
            | Operation::Reduce { variable, .. }
            | Operation::Collect { variable, .. }
            | Operation::Gather { variable }
            | Operation::Scatter { variable, .. } => variable,
        }
    }
}

/// Aggregated result of a subtree travelling up the tree.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum Contribution {
    /// Pure acknowledgement (broadcast, scatter).
    Done,
    /// A single combined value (reduce, collect accumulator or result).
    Value(Vec<u8>),
    /// Values keyed by group rank (gather).
    Entries(Vec<(Rank, Vec<u8>)>),
}

/// One thread's split request.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitEntry {
    pub thread: ThreadId,
    /// Rank in the group being split.
    pub rank: Rank,
    pub split_key: u32,
    pub ordering_key: u32,
}

/// A sub-group produced by a split: new id and members in rank order.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SplitGroup {
    pub group_id: GroupId,
    pub members: Vec<ThreadId>,
}

/// Every message exchanged between nodes.
///
/// The set is closed; the node dispatcher matches on it exhaustively.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum PgasMessage {
    /// Barrier fan-in: the sender's subtree has reached `round`.
    BarrierArrive { group_id: GroupId, round: u64 },
    /// Barrier fan-out: everyone reached `round`, release.
    BarrierGo { group_id: GroupId, round: u64 },

    /// A requester that is not the tree root hands the operation to the root.
    Request { header: RequestHeader, op: Operation },
    /// Fan-out of an operation from parent to child.
    Down { header: RequestHeader, op: Operation },
    /// Fan-in of a subtree's contribution, or of its failures.
    Up {
        header: RequestHeader,
        kind: OpKind,
        contribution: Option<Contribution>,
        failures: Vec<Failure>,
    },
    /// Final result from the tree root to the requester's node.
    Response {
        header: RequestHeader,
        kind: OpKind,
        contribution: Option<Contribution>,
        failures: Vec<Failure>,
    },

    /// Resolve a group name at the coordinator, creating the group if needed.
    GroupQuery {
        request_num: RequestNum,
        requester: ThreadId,
        name: String,
    },
    GroupQueryAnswer {
        request_num: RequestNum,
        requester: ThreadId,
        group_id: GroupId,
        master: NodeId,
        name: String,
    },
    /// Ask the group master to admit `requester`.
    GroupJoinRequest {
        request_num: RequestNum,
        requester: ThreadId,
        group_id: GroupId,
        name: String,
    },
    /// Updated membership, fanned out over the grown tree.
    GroupJoinInform {
        request_num: RequestNum,
        requester: ThreadId,
        group_id: GroupId,
        name: String,
        master: NodeId,
        members: Vec<ThreadId>,
    },
    /// A subtree has installed the updated membership. `failures` name the
    /// nodes below that could not be informed.
    GroupJoinConfirm {
        request_num: RequestNum,
        requester: ThreadId,
        group_id: GroupId,
        failures: Vec<Failure>,
    },
    /// Final answer from the master to the joining thread's node. The join
    /// failed if `failures` is not empty.
    GroupJoinResponse {
        request_num: RequestNum,
        requester: ThreadId,
        group_id: GroupId,
        rank: Rank,
        failures: Vec<Failure>,
    },

    /// Split fan-in: the entries of the sender's subtree.
    SplitRequest {
        group_id: GroupId,
        round: u64,
        entries: Vec<SplitEntry>,
    },
    /// Reserve `count` fresh group ids at the coordinator.
    SplitQuery {
        group_id: GroupId,
        round: u64,
        count: u32,
    },
    SplitAnswer {
        group_id: GroupId,
        round: u64,
        first_id: GroupId,
    },
    /// Split fan-out: the complete assignment.
    SplitAssign {
        group_id: GroupId,
        round: u64,
        groups: Vec<SplitGroup>,
    },
    /// The sender's subtree has instantiated its new groups, except for the
    /// parts named in `failures`.
    SplitReady {
        group_id: GroupId,
        round: u64,
        failures: Vec<Failure>,
    },
    /// Everyone is ready; new groups may be used unless `failures` is not
    /// empty.
    SplitGo {
        group_id: GroupId,
        round: u64,
        failures: Vec<Failure>,
    },
}
