pub mod client;
pub mod collective;
pub mod config;
pub mod element;
pub mod error;
pub(crate) mod group;
pub mod node;
pub mod protocol;
pub(crate) mod reduce;
pub mod transport;
pub mod types;

pub use client::{ClusterBuilder, Group, LocalCluster, PgasThread};
pub use collective::{Collector, CommunicationTree, OperatorRegistry, PgasFuture, Reducer};
pub use config::PgasConfig;
pub use element::Element;
pub use error::{Failure, PgasError, Result};
pub use protocol::PgasMessage;
pub use transport::{LocalFabric, Transport};
pub use types::{DataType, GroupId, NodeId, Rank, ReduceOp, ThreadId};
