use actix::prelude::*;

use crate::types::dtos::DeliveryRequest;

/// Message sent to ask the dispatcher for the current offer candidates.
///
/// ## Purpose
/// Answered with the offers still open for this driver; expired and already
/// assigned offers are filtered out by the dispatcher.
///
/// ## Contents
/// - `driver_id`: the driver requesting offers.
#[derive(Message, Debug, Clone)]
#[rtype(result = "Vec<DeliveryRequest>")]
pub struct FetchOffers {
    pub driver_id: String,
}

/// Message carrying a fresh offer list back into the session.
///
/// ## Purpose
/// Replaces the incoming request queue wholesale while the driver is still
/// eligible; dropped otherwise, so a refresh that raced a state change can
/// never resurrect offers.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OffersUpdate {
    pub offers: Vec<DeliveryRequest>,
}

/// Message notifying the dispatcher that the driver accepted an offer.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OfferAccepted {
    pub driver_id: String,
    pub request_id: String,
}

/// Message notifying the dispatcher that the driver declined an offer.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OfferDeclined {
    pub driver_id: String,
    pub request_id: String,
}

/// Message notifying the dispatcher that an in-progress order was abandoned
/// by the emergency reset, so the system of record can reassign it instead
/// of believing it is still being delivered.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OrderAbandoned {
    pub driver_id: String,
    pub order_id: String,
}

/// Message notifying the dispatcher that an order reached its customer.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct OrderDelivered {
    pub driver_id: String,
    pub order_id: String,
}
