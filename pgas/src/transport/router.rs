use crate::node::NodeContext;
use crate::protocol::decode_message;
use crate::transport::Frame;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;

/// Spawn the receive loop of one node.
///
/// Each frame is decoded and handed to its own handler task, so handlers of
/// one node run concurrently and in no particular order. Handlers on a
/// bounded lane wait for one of `max_concurrent_handlers` slots; other
/// lanes run at once, so barrier and group traffic never queues behind
/// collective payloads. Undecodable frames are dropped.
pub(crate) fn spawn_receive_loop(
    runtime: &Handle,
    ctx: Arc<NodeContext>,
    inbox: mpsc::UnboundedReceiver<Frame>,
) -> JoinHandle<()> {
    runtime.spawn(receive_loop(ctx, inbox))
}

async fn receive_loop(ctx: Arc<NodeContext>, mut inbox: mpsc::UnboundedReceiver<Frame>) {
    let node = ctx.node_id();
    let max_frame = ctx.config().max_frame_bytes;
    let semaphore = Arc::new(Semaphore::new(ctx.config().max_concurrent_handlers));

    while let Some(frame) = inbox.recv().await {
        let (header, msg) = match decode_message(&frame.bytes, max_frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(node, sender = frame.sender, "router: dropping frame: {e}");
                continue;
            }
        };
        tracing::trace!(node, sender = frame.sender, lane = ?header.lane, "router: frame");

        let ctx = Arc::clone(&ctx);
        let slots = header.lane.is_bounded().then(|| Arc::clone(&semaphore));
        tokio::spawn(async move {
            let _permit = match slots {
                Some(slots) => match slots.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            ctx.on_receive(frame.sender, msg);
        });
    }

    tracing::debug!(node, "router: inbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::barrier;
    use crate::collective::operators::OperatorRegistry;
    use crate::config::PgasConfig;
    use crate::node::placement::Placement;
    use crate::node::testing::RecordingTransport;
    use crate::protocol::{OpKind, PgasMessage, RequestHeader, encode_message};
    use crate::types::{NodeId, WORLD_GROUP};
    use std::time::Duration;

    fn frame(sender: NodeId, msg: &PgasMessage) -> Frame {
        Frame {
            sender,
            bytes: encode_message(msg).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_control_traffic_bypasses_handler_limit() {
        // No collective slots at all: collective frames wait forever.
        let config = PgasConfig {
            max_concurrent_handlers: 0,
            ..PgasConfig::default()
        };
        let transport = RecordingTransport::new(1);
        let ctx = Arc::new(
            NodeContext::new(
                config,
                Arc::new(Placement::from_layout(&[1, 1])),
                transport.clone(),
                Arc::new(OperatorRegistry::new()),
            )
            .unwrap(),
        );
        let world = ctx.group(WORLD_GROUP).unwrap();
        let released = barrier::barrier(&ctx, &world, 1);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_receive_loop(&Handle::current(), Arc::clone(&ctx), rx);
        let header = RequestHeader {
            group_id: WORLD_GROUP,
            request_num: 0,
            requester: 0,
        };
        tx.send(frame(
            0,
            &PgasMessage::Up {
                header,
                kind: OpKind::Gather,
                contribution: None,
                failures: vec![],
            },
        ))
        .unwrap();
        tx.send(frame(
            0,
            &PgasMessage::BarrierGo {
                group_id: WORLD_GROUP,
                round: 0,
            },
        ))
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), released.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(world.requests(OpKind::Gather).is_empty());

        drop(tx);
        handle.await.unwrap();
    }
}
