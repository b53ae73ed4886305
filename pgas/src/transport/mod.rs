//! Message delivery between nodes.

pub mod fabric;
pub(crate) mod router;

pub use fabric::{Frame, LocalEndpoint, LocalFabric};

use crate::error::Result;
use crate::protocol::PgasMessage;
use crate::types::NodeId;

/// Outbound side of a node's connection to the cluster.
///
/// Sends are fire-and-forget: no ordering is promised between messages, and
/// a successful return only means the frame was handed to the fabric.
pub trait Transport: Send + Sync {
    /// This endpoint's node.
    fn node_id(&self) -> NodeId;

    fn send(&self, dest: NodeId, msg: &PgasMessage) -> Result<()>;
}
