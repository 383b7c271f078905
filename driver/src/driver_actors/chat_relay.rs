use actix::prelude::*;
use colored::Color;
use common::constants::COUNTERPART_REPLIES;
use common::logger::Logger;
use common::messages::chat_messages::{InboundChat, OutboundChat};
use common::utils::random_index;
use std::time::Duration;

use crate::driver_actors::session::DriverSession;
use crate::messages::internal_messages::RegisterSession;

/// Simulated counterpart messaging channel.
///
/// Every outbound driver message is answered after a fixed delay with a
/// canned acknowledgement, standing in for a real bidirectional relay. This
/// auto-reply is a simulation artifact: a production deployment replaces
/// this actor with the real transport and the session keeps working, since
/// the session already validates inbound order ids on its own.
pub struct ChatRelay {
    /// Session the replies are pushed to, wired up after both actors start.
    pub session: Option<Addr<DriverSession>>,
    /// Delay before the counterpart acknowledges a message.
    pub reply_delay: Duration,
    pub logger: Logger,
}

impl ChatRelay {
    pub fn new(reply_delay: Duration) -> Self {
        Self {
            session: None,
            reply_delay,
            logger: Logger::new("ChatRelay", Color::Blue),
        }
    }
}

impl Actor for ChatRelay {
    type Context = Context<Self>;
}

impl Handler<RegisterSession> for ChatRelay {
    type Result = ();

    fn handle(&mut self, msg: RegisterSession, _ctx: &mut Self::Context) -> Self::Result {
        self.session = Some(msg.session);
    }
}

impl Handler<OutboundChat> for ChatRelay {
    type Result = ();

    fn handle(&mut self, msg: OutboundChat, ctx: &mut Self::Context) -> Self::Result {
        self.logger.info(format!(
            "Relaying message for order {} to customer {}.",
            msg.order_id, msg.counterpart_id
        ));
        let OutboundChat {
            order_id,
            counterpart_id,
            ..
        } = msg;
        ctx.run_later(self.reply_delay, move |act, _ctx| {
            let reply = COUNTERPART_REPLIES[random_index(COUNTERPART_REPLIES.len())];
            match &act.session {
                Some(session) => session.do_send(InboundChat {
                    order_id,
                    sender: counterpart_id,
                    body: reply.to_string(),
                }),
                None => act
                    .logger
                    .warn("No session registered, dropping counterpart reply."),
            }
        });
    }
}
