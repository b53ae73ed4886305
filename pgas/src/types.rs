/// Identifier of a physical node (one OS process) in the cluster.
///
/// Dense, assigned at bootstrap. Node 0 is the coordinator.
pub type NodeId = u32;

/// Global id of a logical thread, unique across the whole cluster.
pub type ThreadId = u32;

/// Identifier of a group of logical threads. The world group is 0.
pub type GroupId = u32;

/// Rank of a thread within a group (0-indexed, group-relative).
pub type Rank = u32;

/// Request number allocated by a request registry.
pub type RequestNum = u64;

/// The node that owns the group-name directory and allocates group ids.
pub const COORDINATOR: NodeId = 0;

/// The implicit group containing every thread.
pub const WORLD_GROUP: GroupId = 0;

/// Current protocol version carried in every frame header.
pub const PROTOCOL_VERSION: u16 = 1;

/// Element types understood by the built-in reducers.
#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I8 = 2,
    I32 = 3,
    I64 = 4,
    U8 = 5,
    U32 = 6,
    U64 = 7,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
            DataType::I8 | DataType::U8 => 1,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I8 => "i8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in element-wise reduction operations.
#[derive(
    rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum ReduceOp {
    Sum,
    Prod,
    Min,
    Max,
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
        }
    }
}
