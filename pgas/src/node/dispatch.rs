use crate::collective::{barrier, engine};
use crate::error::Result;
use crate::group::{join, split};
use crate::node::NodeContext;
use crate::protocol::PgasMessage;
use crate::types::NodeId;
use std::sync::Arc;

impl NodeContext {
    /// Handle one message from `sender`.
    ///
    /// Handlers never propagate errors to the fabric; a failing handler is
    /// logged and the message is dropped.
    pub fn on_receive(self: &Arc<Self>, sender: NodeId, msg: PgasMessage) {
        tracing::trace!(node = self.node_id(), sender, ?msg, "receive");
        if let Err(e) = self.dispatch(sender, msg) {
            tracing::error!(node = self.node_id(), sender, "handler failed: {e}");
        }
    }

    fn dispatch(self: &Arc<Self>, sender: NodeId, msg: PgasMessage) -> Result<()> {
        match msg {
            PgasMessage::BarrierArrive { group_id, round } => {
                barrier::on_arrive(self, &*self.group(group_id)?, round)
            }
            PgasMessage::BarrierGo { group_id, round } => {
                barrier::on_go(self, &*self.group(group_id)?, round)
            }

            PgasMessage::Request { header, op } | PgasMessage::Down { header, op } => {
                engine::down(self, &*self.group(header.group_id)?, header, op)
            }
            PgasMessage::Up {
                header,
                kind,
                contribution,
                failures,
            } => engine::on_up(
                self,
                sender,
                &*self.group(header.group_id)?,
                header,
                kind,
                contribution,
                failures,
            ),
            PgasMessage::Response {
                header,
                kind,
                contribution,
                failures,
            } => engine::on_response(
                &*self.group(header.group_id)?,
                header,
                kind,
                contribution,
                failures,
            ),

            PgasMessage::GroupQuery {
                request_num,
                requester,
                name,
            } => join::on_query(self, sender, request_num, requester, name),
            PgasMessage::GroupQueryAnswer {
                request_num,
                requester,
                group_id,
                master,
                name,
            } => join::on_query_answer(self, request_num, requester, group_id, master, name),
            PgasMessage::GroupJoinRequest {
                request_num,
                requester,
                group_id,
                name,
            } => join::on_join_request(self, sender, request_num, requester, group_id, name),
            PgasMessage::GroupJoinInform {
                request_num,
                requester,
                group_id,
                name,
                master,
                members,
            } => join::on_inform(
                self,
                sender,
                request_num,
                requester,
                group_id,
                name,
                master,
                members,
            ),
            PgasMessage::GroupJoinConfirm {
                request_num,
                requester,
                group_id,
                failures,
            } => join::on_confirm(
                self,
                &*self.group(group_id)?,
                (request_num, requester),
                failures,
            ),
            PgasMessage::GroupJoinResponse {
                request_num,
                requester,
                group_id,
                rank,
                failures,
            } => join::on_response(self, (request_num, requester), group_id, rank, failures),

            PgasMessage::SplitRequest {
                group_id,
                round,
                entries,
            } => split::on_request(self, &*self.group(group_id)?, round, entries),
            PgasMessage::SplitQuery {
                group_id,
                round,
                count,
            } => split::on_query(self, sender, group_id, round, count),
            PgasMessage::SplitAnswer {
                group_id,
                round,
                first_id,
            } => split::on_answer(self, &*self.group(group_id)?, round, first_id),
            PgasMessage::SplitAssign {
                group_id,
                round,
                groups,
            } => split::on_assign(self, &*self.group(group_id)?, round, groups),
            PgasMessage::SplitReady {
                group_id,
                round,
                failures,
            } => split::on_ready(self, &*self.group(group_id)?, round, failures),
            PgasMessage::SplitGo {
                group_id,
                round,
                failures,
            } => split::on_go(self, &*self.group(group_id)?, round, failures),
        }
    }
}
