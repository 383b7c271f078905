use actix::prelude::*;

/// Message carrying a driver-authored chat line out to the counterpart.
///
/// ## Contents
/// - `order_id`: the active order whose thread the line belongs to.
/// - `counterpart_id`: the customer on the other end.
/// - `body`: the message text.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OutboundChat {
    pub order_id: String,
    pub counterpart_id: String,
    pub body: String,
}

/// Message carrying a counterpart-authored chat line into the session.
///
/// ## Purpose
/// The session appends it to the thread only while `order_id` still names
/// the current active order; replies to a completed or abandoned order are
/// dropped.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct InboundChat {
    pub order_id: String,
    pub sender: String,
    pub body: String,
}
