use actix::prelude::*;

use crate::driver_actors::session::DriverSession;

/// Message wiring the chat relay to the session it pushes replies into.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RegisterSession {
    pub session: Addr<DriverSession>,
}

/// Console command to accept an offer by id. The session resolves the id
/// against the offers currently on the table.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AcceptOfferCommand {
    pub request_id: String,
}

/// Console command to print a summary of the session.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct ShowStatus;
