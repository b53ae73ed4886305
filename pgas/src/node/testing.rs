//! A node wired to a transport that records what it sends, for driving
//! message handlers one step at a time.

use crate::collective::operators::OperatorRegistry;
use crate::config::PgasConfig;
use crate::error::{PgasError, Result};
use crate::node::NodeContext;
use crate::node::placement::Placement;
use crate::protocol::PgasMessage;
use crate::transport::Transport;
use crate::types::NodeId;
use std::sync::{Arc, Mutex};

type Refuse = Box<dyn Fn(NodeId, &PgasMessage) -> bool + Send + Sync>;

pub(crate) struct RecordingTransport {
    node: NodeId,
    refuse: Refuse,
    sent: Mutex<Vec<(NodeId, PgasMessage)>>,
}

impl RecordingTransport {
    pub(crate) fn new(node: NodeId) -> Arc<Self> {
        Self::refusing(node, |_, _| false)
    }

    /// Sends for which `refuse` holds fail as if the peer had gone away.
    pub(crate) fn refusing(
        node: NodeId,
        refuse: impl Fn(NodeId, &PgasMessage) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            node,
            refuse: Box::new(refuse),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Everything sent so far, oldest first.
    pub(crate) fn take(&self) -> Vec<(NodeId, PgasMessage)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Transport for RecordingTransport {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn send(&self, dest: NodeId, msg: &PgasMessage) -> Result<()> {
        if (self.refuse)(dest, msg) {
            return Err(PgasError::PeerDisconnected { node: dest });
        }
        self.sent.lock().unwrap().push((dest, msg.clone()));
        Ok(())
    }
}

/// Node `transport.node_id()` of a cluster with `layout` threads per node.
pub(crate) fn node(
    layout: &[u32],
    transport: &Arc<RecordingTransport>,
    operators: OperatorRegistry,
) -> Arc<NodeContext> {
    let transport: Arc<dyn Transport> = transport.clone();
    Arc::new(
        NodeContext::new(
            PgasConfig::default(),
            Arc::new(Placement::from_layout(layout)),
            transport,
            Arc::new(operators),
        )
        .unwrap(),
    )
}
