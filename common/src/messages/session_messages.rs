use actix::prelude::*;

use crate::errors::SessionError;
use crate::types::dtos::{DeliveryRequest, SessionSnapshot};
use crate::types::vehicle::VehicleType;

/// Message sent to flip the driver between offline and online.
///
/// ## Purpose
/// Offline drivers go online and start a shift; online drivers go offline
/// and end it. A busy driver going offline is the emergency reset: the
/// active order is abandoned and the shift cleared.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct ToggleOnline;

/// Message sent to change the driver's vehicle preference.
///
/// ## Purpose
/// Applies only while the driver is not busy; otherwise a no-op.
///
/// ## Contents
/// - `vehicle`: the vehicle to switch to.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct SetVehicle {
    pub vehicle: VehicleType,
}

/// Message sent to accept one of the currently offered delivery requests.
///
/// ## Purpose
/// Creates the active order and makes the session busy. Callers are expected
/// to pass an offer they are currently showing; expiry is not re-checked
/// here, so accepting an offer that lapsed a moment ago is tolerated.
///
/// ## Contents
/// - `request`: the offer being accepted, as shown to the driver.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct AcceptOffer {
    pub request: DeliveryRequest,
}

/// Message sent to decline one of the currently offered delivery requests.
///
/// ## Purpose
/// Removes the matching offer from the candidate set. Unknown ids are
/// ignored; declining twice is a no-op the second time.
///
/// ## Contents
/// - `request_id`: the ID of the offer being declined.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct DeclineOffer {
    pub request_id: String,
}

/// Message sent when the driver reports arriving at the pickup shop.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct ArrivedAtShop;

/// Message sent when the driver confirms the pickup, moving the active
/// order from the pickup phase to the dropoff phase.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct ConfirmPickup;

/// Message sent when the driver hands the order to the customer.
///
/// ## Purpose
/// Destroys the active order and its chat thread and returns the driver to
/// online, so further offers arrive without re-toggling the shift.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct CompleteOrder;

/// Message sent when the driver writes into the active order's chat thread.
///
/// ## Contents
/// - `body`: the message text; empty text is ignored.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), SessionError>")]
pub struct SendChatMessage {
    pub body: String,
}

/// Message sent to read the current session state.
#[derive(Message, Debug, Clone)]
#[rtype(result = "SessionSnapshot")]
pub struct GetSnapshot;
