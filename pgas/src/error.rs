use crate::types::{DataType, GroupId, NodeId, Rank, ReduceOp, ThreadId};

pub type Result<T> = std::result::Result<T, PgasError>;

/// An exception raised by one contributor to a collective operation.
///
/// This is the wire form of an error: it travels inside up and response
/// messages so the initiator can report every failure in the tree.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Node on which the failure was observed.
    pub node: NodeId,
    /// Logical thread whose contribution failed, if the failure is per-thread.
    pub thread: Option<ThreadId>,
    pub message: String,
}

impl Failure {
    pub fn new(node: NodeId, thread: Option<ThreadId>, message: impl Into<String>) -> Self {
        Self {
            node,
            thread,
            message: message.into(),
        }
    }

    /// Capture a local application error for `thread` on `node`.
    pub fn from_error(node: NodeId, thread: Option<ThreadId>, err: &PgasError) -> Self {
        Self::new(node, thread, err.to_string())
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.thread {
            Some(t) => write!(f, "thread {t} on node {}: {}", self.node, self.message),
            None => write!(f, "node {}: {}", self.node, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PgasError {
    #[error("group {group} is not known on node {node}")]
    UnknownGroup { group: GroupId, node: NodeId },

    #[error("thread {thread} is not part of the cluster")]
    UnknownThread { thread: ThreadId },

    #[error("node {node} is not part of the cluster")]
    UnknownNode { node: NodeId },

    #[error("invalid rank {rank}: group size is {size}")]
    InvalidRank { rank: Rank, size: u32 },

    #[error("thread {thread} is not a member of group {group}")]
    NotAMember { thread: ThreadId, group: GroupId },

    #[error("variable '{name}' is not declared")]
    UnknownVariable { name: String },

    #[error("variable '{name}' has no value")]
    VariableUnset { name: String },

    #[error("no {kind} registered with id {id}")]
    UnknownOperator { kind: &'static str, id: u16 },

    #[error("{kind} {id} panicked: {message}")]
    OperatorPanicked {
        kind: &'static str,
        id: u16,
        message: String,
    },

    #[error("built-in {op} is not defined for {type_name}")]
    NoBuiltinReducer {
        op: ReduceOp,
        type_name: &'static str,
    },

    #[error("unsupported data type: {dtype:?} for operation {op}")]
    UnsupportedDType { dtype: DataType, op: &'static str },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("node {node} is unreachable")]
    PeerDisconnected { node: NodeId },

    #[error("operation did not complete within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{operation} failed: {}", describe_failures(.failures))]
    CollectiveFailed {
        operation: &'static str,
        failures: Vec<Failure>,
    },

    #[error("joining group '{name}' failed: {reason}")]
    JoinFailed { name: String, reason: String },

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("logical thread {thread} panicked: {message}")]
    ThreadPanicked { thread: ThreadId, message: String },

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn describe_failures(failures: &[Failure]) -> String {
    match failures {
        [] => "no cause recorded".to_string(),
        [cause] => cause.to_string(),
        [cause, rest @ ..] => format!("{cause} (+{} suppressed)", rest.len()),
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl PgasError {
    /// Build the error delivered to the initiator of a failed collective.
    pub fn collective(operation: &'static str, failures: Vec<Failure>) -> Self {
        Self::CollectiveFailed {
            operation,
            failures,
        }
    }

    /// The primary cause of a failed collective.
    pub fn cause(&self) -> Option<&Failure> {
        match self {
            Self::CollectiveFailed { failures, .. } => failures.first(),
            _ => None,
        }
    }

    /// Failures attached behind the primary cause.
    pub fn suppressed(&self) -> &[Failure] {
        match self {
            Self::CollectiveFailed { failures, .. } if !failures.is_empty() => &failures[1..],
            _ => &[],
        }
    }

    /// Every failure of a collective, cause first.
    pub fn failures(&self) -> &[Failure] {
        match self {
            Self::CollectiveFailed { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
