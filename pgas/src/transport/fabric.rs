use crate::error::{PgasError, Result};
use crate::protocol::{PgasMessage, encode_message};
use crate::transport::Transport;
use crate::types::NodeId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// An encoded message in flight, tagged with the sending node.
#[derive(Debug)]
pub struct Frame {
    pub sender: NodeId,
    pub bytes: Vec<u8>,
}

/// In-process interconnect: one unbounded inbox per node.
///
/// Every message is encoded to its wire form on send and decoded by the
/// receiving node's loop, exactly as it would be over a network.
#[derive(Debug)]
pub struct LocalFabric {
    inboxes: Vec<mpsc::UnboundedSender<Frame>>,
}

impl LocalFabric {
    /// Create a fabric for `nodes` nodes and return the inbox receivers,
    /// indexed by node id.
    pub fn new(nodes: u32) -> (Arc<Self>, Vec<mpsc::UnboundedReceiver<Frame>>) {
        let (inboxes, receivers) = (0..nodes).map(|_| mpsc::unbounded_channel()).unzip();
        (Arc::new(Self { inboxes }), receivers)
    }

    pub fn node_count(&self) -> u32 {
        self.inboxes.len() as u32
    }

    /// The sending endpoint for `node`.
    pub fn endpoint(self: &Arc<Self>, node: NodeId) -> LocalEndpoint {
        LocalEndpoint {
            node,
            fabric: Arc::clone(self),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    node: NodeId,
    fabric: Arc<LocalFabric>,
}

impl Transport for LocalEndpoint {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn send(&self, dest: NodeId, msg: &PgasMessage) -> Result<()> {
        let inbox = self
            .fabric
            .inboxes
            .get(dest as usize)
            .ok_or(PgasError::UnknownNode { node: dest })?;
        let bytes = encode_message(msg)?;
        inbox
            .send(Frame {
                sender: self.node,
                bytes,
            })
            .map_err(|_| PgasError::PeerDisconnected { node: dest })
    }
}
