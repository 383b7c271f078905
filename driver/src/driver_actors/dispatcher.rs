use actix::prelude::*;
use chrono::TimeDelta;
use colored::Color;
use common::clock::Clock;
use common::constants::OFFER_TTL_SECS;
use common::logger::Logger;
use common::messages::dispatch_messages::{
    FetchOffers, OfferAccepted, OfferDeclined, OrderAbandoned, OrderDelivered,
};
use common::types::dtos::{CustomerInfo, DeliveryRequest, OrderItem, ShopInfo};
use std::collections::HashMap;
use std::sync::Arc;

/// Simulated dispatch service: the offer feed and the assignment system of
/// record rolled into one in-process actor.
///
/// # Responsibilities
/// - Answers `FetchOffers` with the offers still open (unexpired and not
///   assigned to anyone).
/// - Records accept/decline/abandon/delivered notifications as the system
///   of record would; unknown ids are benign races and only get logged.
///
/// A real deployment swaps this actor for clients of the real dispatch and
/// assignment services; the session does not change.
pub struct Dispatcher {
    /// Offers currently published.
    pub offers: Vec<DeliveryRequest>,
    /// Orders currently assigned: order id -> driver id.
    pub assigned: HashMap<String, String>,
    /// Time source for expiry filtering.
    pub clock: Arc<dyn Clock>,
    /// Logger for dispatch events.
    pub logger: Logger,
}

impl Dispatcher {
    /// Creates a dispatcher seeded with the sample offer catalog.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let offers = sample_offers(&*clock);
        Self::with_offers(offers, clock)
    }

    /// Creates a dispatcher publishing exactly the given offers.
    pub fn with_offers(offers: Vec<DeliveryRequest>, clock: Arc<dyn Clock>) -> Self {
        Self {
            offers,
            assigned: HashMap::new(),
            clock,
            logger: Logger::new("Dispatcher", Color::Magenta),
        }
    }
}

impl Actor for Dispatcher {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        self.logger
            .info(format!("Dispatcher started with {} open offers.", self.offers.len()));
    }
}

impl Handler<FetchOffers> for Dispatcher {
    type Result = MessageResult<FetchOffers>;

    fn handle(&mut self, msg: FetchOffers, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let offers: Vec<DeliveryRequest> = self
            .offers
            .iter()
            .filter(|offer| offer.expires_at > now && !self.assigned.contains_key(&offer.id))
            .cloned()
            .collect();
        self.logger.info(format!(
            "Sending {} open offers to driver {}.",
            offers.len(),
            msg.driver_id
        ));
        MessageResult(offers)
    }
}

impl Handler<OfferAccepted> for Dispatcher {
    type Result = ();

    fn handle(&mut self, msg: OfferAccepted, _ctx: &mut Self::Context) -> Self::Result {
        if !self.offers.iter().any(|offer| offer.id == msg.request_id) {
            // Acceptance of an offer that already lapsed; tolerated.
            self.logger.warn(format!(
                "Driver {} accepted offer {} which is no longer published.",
                msg.driver_id, msg.request_id
            ));
        }
        self.logger.info(format!(
            "Offer {} assigned to driver {}.",
            msg.request_id, msg.driver_id
        ));
        self.assigned.insert(msg.request_id, msg.driver_id);
    }
}

impl Handler<OfferDeclined> for Dispatcher {
    type Result = ();

    fn handle(&mut self, msg: OfferDeclined, _ctx: &mut Self::Context) -> Self::Result {
        let before = self.offers.len();
        self.offers.retain(|offer| offer.id != msg.request_id);
        if self.offers.len() < before {
            self.logger.info(format!(
                "Offer {} declined by driver {}, withdrawn.",
                msg.request_id, msg.driver_id
            ));
        } else {
            self.logger.warn(format!(
                "Decline for unknown offer {}, ignoring.",
                msg.request_id
            ));
        }
    }
}

impl Handler<OrderAbandoned> for Dispatcher {
    type Result = ();

    fn handle(&mut self, msg: OrderAbandoned, _ctx: &mut Self::Context) -> Self::Result {
        if self.assigned.remove(&msg.order_id).is_some() {
            self.logger.warn(format!(
                "Order {} abandoned by driver {}, flagged for reassignment.",
                msg.order_id, msg.driver_id
            ));
        } else {
            self.logger.warn(format!(
                "Abandon notice for unknown order {}, ignoring.",
                msg.order_id
            ));
        }
    }
}

impl Handler<OrderDelivered> for Dispatcher {
    type Result = ();

    fn handle(&mut self, msg: OrderDelivered, _ctx: &mut Self::Context) -> Self::Result {
        self.assigned.remove(&msg.order_id);
        self.offers.retain(|offer| offer.id != msg.order_id);
        self.logger.info(format!(
            "Order {} delivered by driver {}.",
            msg.order_id, msg.driver_id
        ));
    }
}

/// Seed catalog shown to a freshly online driver.
pub fn sample_offers(clock: &dyn Clock) -> Vec<DeliveryRequest> {
    let now = clock.now();
    let expires_at = now + TimeDelta::seconds(OFFER_TTL_SECS);
    vec![
        DeliveryRequest {
            id: "1".to_string(),
            shop: ShopInfo {
                name: "Burger Palace".to_string(),
                address: "12 Market St".to_string(),
                distance_km: 1.2,
            },
            items: vec![
                OrderItem {
                    id: "i1".to_string(),
                    name: "Classic Burger".to_string(),
                    quantity: 2,
                },
                OrderItem {
                    id: "i2".to_string(),
                    name: "Fries".to_string(),
                    quantity: 1,
                },
            ],
            customer: CustomerInfo {
                id: "c1".to_string(),
                name: "Alice Johnson".to_string(),
                address: "34 Elm St".to_string(),
                notes: Some("Ring the bell twice".to_string()),
                phone: Some("555-0134".to_string()),
            },
            delivery_distance_km: 2.4,
            estimated_pickup_min: 10,
            estimated_delivery_min: 25,
            expires_at,
            created_at: now,
        },
        DeliveryRequest {
            id: "2".to_string(),
            shop: ShopInfo {
                name: "Pizza Heaven".to_string(),
                address: "89 Main Ave".to_string(),
                distance_km: 0.8,
            },
            items: vec![
                OrderItem {
                    id: "i3".to_string(),
                    name: "Margherita".to_string(),
                    quantity: 1,
                },
                OrderItem {
                    id: "i4".to_string(),
                    name: "Garlic Bread".to_string(),
                    quantity: 2,
                },
            ],
            customer: CustomerInfo {
                id: "c2".to_string(),
                name: "Bob Smith".to_string(),
                address: "56 Oak Rd".to_string(),
                notes: None,
                phone: None,
            },
            delivery_distance_km: 3.1,
            estimated_pickup_min: 8,
            estimated_delivery_min: 30,
            expires_at,
            created_at: now,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::clock::FixedClock;

    #[test]
    fn sample_offers_expire_one_minute_after_creation() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let offers = sample_offers(&FixedClock(now));

        let ids: Vec<&str> = offers.iter().map(|offer| offer.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(offers[0].shop.name, "Burger Palace");
        assert_eq!(offers[1].shop.name, "Pizza Heaven");
        for offer in &offers {
            assert_eq!(offer.created_at, now);
            assert_eq!(offer.expires_at, now + TimeDelta::seconds(OFFER_TTL_SECS));
        }
    }
}
