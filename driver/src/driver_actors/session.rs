use actix::fut::wrap_future;
use actix::prelude::*;
use chrono::{DateTime, Utc};
use colored::Color;
use common::clock::Clock;
use common::constants::{
    ACTIVE_ORDER_KEY, OFFER_POLL_INTERVAL, PICKUP_RANGE_DELAY, SHIFT_STARTED_AT_KEY, STATUS_KEY,
    VEHICLE_KEY,
};
use common::errors::SessionError;
use common::logger::Logger;
use common::messages::chat_messages::{InboundChat, OutboundChat};
use common::messages::dispatch_messages::{
    FetchOffers, OfferAccepted, OfferDeclined, OffersUpdate, OrderAbandoned, OrderDelivered,
};
use common::messages::session_messages::{
    AcceptOffer, ArrivedAtShop, CompleteOrder, ConfirmPickup, DeclineOffer, GetSnapshot,
    SendChatMessage, SetVehicle, ToggleOnline,
};
use common::types::driver_status::DriverStatus;
use common::types::dtos::{ActiveOrder, ChatMessage, DeliveryRequest, SessionSnapshot};
use common::types::order_phase::OrderPhase;
use common::types::vehicle::VehicleType;
use common::utils;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::driver_actors::chat_relay::ChatRelay;
use crate::driver_actors::dispatcher::Dispatcher;
use crate::messages::internal_messages::{AcceptOfferCommand, ShowStatus};
use crate::session_store::SessionStore;

/// Timer durations injected into the session, so tests run on millisecond
/// delays instead of wall-clock seconds.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Interval between offer feed refreshes while online and free.
    pub offer_poll_interval: Duration,
    /// Delay before the proximity signal confirms pickup range.
    pub pickup_range_delay: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            offer_poll_interval: OFFER_POLL_INTERVAL,
            pickup_range_delay: PICKUP_RANGE_DELAY,
        }
    }
}

/// The `DriverSession` actor owns the whole driver-side session state
/// machine: online/offline/busy status, the vehicle preference, shift
/// timing, the queue of incoming offers, the single active order and its
/// pickup/dropoff lifecycle, and the chat thread tied to that order.
///
/// # Responsibilities
/// - Executes every driver command and keeps the status/order/shift
///   invariants (`Busy` exactly when an active order exists, a shift stamp
///   exactly when not offline).
/// - Persists status, vehicle, shift start and active order through the
///   `SessionStore` on every mutation, and restores them on startup,
///   failing open to defaults on corrupt entries.
/// - Drives the offer feed while eligible and evicts offers at expiry.
/// - Schedules the pickup-range confirmation and validates every delayed
///   effect against the order it was scheduled for before applying it.
pub struct DriverSession {
    /// ID of the driver this session belongs to.
    pub driver_id: String,
    /// Current availability of the driver.
    pub status: DriverStatus,
    /// Current vehicle preference.
    pub vehicle: VehicleType,
    /// Instant the running shift started, if one is running.
    pub shift_started_at: Option<DateTime<Utc>>,
    /// Offers currently on the table. Non-empty only while online and free.
    pub incoming_requests: Vec<DeliveryRequest>,
    /// The order being executed, if any.
    pub active_order: Option<ActiveOrder>,
    /// Chat thread tied to the active order.
    pub messages: Vec<ChatMessage>,
    /// Durable store the session state is persisted to.
    pub store: Arc<dyn SessionStore>,
    /// Address of the dispatch service.
    pub dispatcher: Addr<Dispatcher>,
    /// Address of the messaging channel.
    pub chat: Addr<ChatRelay>,
    /// Time source for stamps and deadlines.
    pub clock: Arc<dyn Clock>,
    /// Timer durations.
    pub timing: SessionTiming,
    /// Handle of the running offer feed interval.
    pub feed_timer: Option<SpawnHandle>,
    /// Expiry timers of the offers on the table, by offer id.
    pub offer_timers: HashMap<String, SpawnHandle>,
    /// Handle of the pending pickup-range confirmation.
    pub pickup_range_timer: Option<SpawnHandle>,
    /// Logger for session events.
    pub logger: Logger,
}

impl DriverSession {
    /// Rebuilds a session from the durable store.
    ///
    /// Absent or unreadable entries fall back to their defaults (offline,
    /// bike, no shift, no order) without failing startup; an in-flight
    /// order lost this way is still known to the dispatch backend. After
    /// the field-wise load the combination is repaired so the invariants
    /// hold: the order slot decides busyness, and a non-offline session
    /// without a readable shift stamp restarts the shift from the restore
    /// clock.
    pub fn restore(
        driver_id: impl Into<String>,
        store: Arc<dyn SessionStore>,
        dispatcher: Addr<Dispatcher>,
        chat: Addr<ChatRelay>,
        clock: Arc<dyn Clock>,
        timing: SessionTiming,
    ) -> Self {
        let driver_id = driver_id.into();
        let logger = Logger::new(format!("Session {}", driver_id), Color::Cyan);

        let mut status =
            read_entry(&*store, STATUS_KEY, &logger).unwrap_or(DriverStatus::Offline);
        let vehicle = read_entry(&*store, VEHICLE_KEY, &logger).unwrap_or(VehicleType::Bike);
        let mut shift_started_at: Option<DateTime<Utc>> =
            read_entry(&*store, SHIFT_STARTED_AT_KEY, &logger);
        let active_order: Option<ActiveOrder> = read_entry(&*store, ACTIVE_ORDER_KEY, &logger);

        if active_order.is_some() && status != DriverStatus::Busy {
            logger.warn(format!(
                "Recovered an active order with status {}, forcing busy.",
                status
            ));
            status = DriverStatus::Busy;
        } else if active_order.is_none() && status == DriverStatus::Busy {
            logger.warn("Recovered busy status with no readable order, falling back to online.");
            status = DriverStatus::Online;
        }

        if status == DriverStatus::Offline {
            if shift_started_at.take().is_some() {
                logger.warn("Recovered a shift stamp while offline, clearing it.");
            }
        } else if shift_started_at.is_none() {
            logger.warn("Recovered an open shift with no start stamp, re-stamping from now.");
            shift_started_at = Some(clock.now());
        }

        Self {
            driver_id,
            status,
            vehicle,
            shift_started_at,
            incoming_requests: Vec::new(),
            active_order,
            messages: Vec::new(),
            store,
            dispatcher,
            chat,
            clock,
            timing,
            feed_timer: None,
            offer_timers: HashMap::new(),
            pickup_range_timer: None,
            logger,
        }
    }

    /// Rewrites the full persisted set: status and vehicle always, shift
    /// start and active order as entries that are removed when empty.
    fn try_persist(&self) -> Result<(), SessionError> {
        self.store
            .set(STATUS_KEY, &serde_json::to_string(&self.status)?)?;
        self.store
            .set(VEHICLE_KEY, &serde_json::to_string(&self.vehicle)?)?;
        match &self.shift_started_at {
            Some(started_at) => self
                .store
                .set(SHIFT_STARTED_AT_KEY, &serde_json::to_string(started_at)?)?,
            None => self.store.remove(SHIFT_STARTED_AT_KEY)?,
        }
        match &self.active_order {
            Some(order) => self
                .store
                .set(ACTIVE_ORDER_KEY, &serde_json::to_string(order)?)?,
            None => self.store.remove(ACTIVE_ORDER_KEY)?,
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), SessionError> {
        let result = self.try_persist();
        if let Err(err) = &result {
            self.logger.error(format!("{}", err));
        }
        result
    }

    /// Starts the offer feed: one immediate fetch plus the refresh interval.
    fn start_offer_feed(&mut self, ctx: &mut Context<Self>) {
        if self.feed_timer.is_some() {
            return;
        }
        self.request_offers(ctx);
        let handle = ctx.run_interval(self.timing.offer_poll_interval, |act, ctx| {
            act.request_offers(ctx)
        });
        self.feed_timer = Some(handle);
    }

    /// Tears the feed down and drops every offer with its expiry timer. No
    /// stale offer may ever show up after the eligible state was left.
    fn stop_offer_feed(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.feed_timer.take() {
            ctx.cancel_future(handle);
        }
        self.clear_offers(ctx);
    }

    fn clear_offers(&mut self, ctx: &mut Context<Self>) {
        for (_, handle) in self.offer_timers.drain() {
            ctx.cancel_future(handle);
        }
        self.incoming_requests.clear();
    }

    /// Asks the dispatcher for the current candidates, if still eligible.
    fn request_offers(&mut self, ctx: &mut Context<Self>) {
        if self.status != DriverStatus::Online || self.active_order.is_some() {
            return;
        }
        let dispatcher = self.dispatcher.clone();
        let driver_id = self.driver_id.clone();
        let self_addr = ctx.address();
        ctx.spawn(wrap_future(async move {
            if let Ok(offers) = dispatcher.send(FetchOffers { driver_id }).await {
                self_addr.do_send(OffersUpdate { offers });
            }
        }));
    }

    /// Schedules the one-shot proximity confirmation for `order_id`. The
    /// callback re-checks that this order is still current and still in the
    /// pickup phase before touching it.
    fn schedule_pickup_range(&mut self, ctx: &mut Context<Self>, order_id: String) {
        if let Some(handle) = self.pickup_range_timer.take() {
            ctx.cancel_future(handle);
        }
        let handle = ctx.run_later(self.timing.pickup_range_delay, move |act, _ctx| {
            act.pickup_range_timer = None;
            let confirmed = match act.active_order.as_mut() {
                Some(order)
                    if order.id == order_id
                        && order.phase == OrderPhase::Pickup
                        && !order.is_within_pickup_range =>
                {
                    order.is_within_pickup_range = true;
                    true
                }
                _ => false,
            };
            if confirmed {
                act.logger.info(format!(
                    "Order {} is within pickup range, pickup can be confirmed.",
                    order_id
                ));
                let _ = act.persist();
            } else {
                act.logger.warn(format!(
                    "Pickup range signal for order {} ignored, order no longer current.",
                    order_id
                ));
            }
        });
        self.pickup_range_timer = Some(handle);
    }

    /// Drops the active order together with everything scoped to it: the
    /// pending pickup-range timer and the chat thread.
    fn destroy_active_order(&mut self, ctx: &mut Context<Self>) -> Option<ActiveOrder> {
        if let Some(handle) = self.pickup_range_timer.take() {
            ctx.cancel_future(handle);
        }
        self.messages.clear();
        self.active_order.take()
    }

    /// Shared accept path for `AcceptOffer` and the console command.
    fn accept_request(
        &mut self,
        request: DeliveryRequest,
        ctx: &mut Context<Self>,
    ) -> Result<(), SessionError> {
        if self.status != DriverStatus::Online || self.active_order.is_some() {
            self.logger.warn(format!(
                "Cannot accept offer {} right now, current status: {}.",
                request.id, self.status
            ));
            return Ok(());
        }
        // Every other pending offer is implicitly discarded: one job at a time.
        self.stop_offer_feed(ctx);
        self.dispatcher.do_send(OfferAccepted {
            driver_id: self.driver_id.clone(),
            request_id: request.id.clone(),
        });
        self.logger.info(format!(
            "Accepted offer {} from {}, heading to pickup.",
            request.id, request.shop.name
        ));
        self.active_order = Some(ActiveOrder::from_request(request));
        self.status = DriverStatus::Busy;
        self.messages.clear();
        self.persist()
    }
}

/// Parses one persisted entry, failing open: unreadable store or corrupt
/// value both come back as `None` with a warning.
fn read_entry<T: DeserializeOwned>(
    store: &dyn SessionStore,
    key: &str,
    logger: &Logger,
) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                logger.warn(format!("Discarding corrupt `{}` entry: {}", key, err));
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            logger.warn(format!("Could not read `{}` entry: {}", key, err));
            None
        }
    }
}

impl Actor for DriverSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.logger.info(format!(
            "Session restored: status={}, vehicle={}, active_order={:?}.",
            self.status,
            self.vehicle,
            self.active_order.as_ref().map(|order| order.id.clone())
        ));
        // Sync the store with the restored (possibly repaired) state so the
        // persisted and in-memory views agree from the first command on.
        let _ = self.persist();

        if self.status == DriverStatus::Online && self.active_order.is_none() {
            self.start_offer_feed(ctx);
        }
        // An order restored mid-arrival still owes its proximity signal.
        let pending_range = match &self.active_order {
            Some(order)
                if order.phase == OrderPhase::Pickup
                    && order.arrived_at_shop_at.is_some()
                    && !order.is_within_pickup_range =>
            {
                Some(order.id.clone())
            }
            _ => None,
        };
        if let Some(order_id) = pending_range {
            self.schedule_pickup_range(ctx, order_id);
        }
    }
}

impl Handler<ToggleOnline> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, _msg: ToggleOnline, ctx: &mut Self::Context) -> Self::Result {
        match self.status {
            DriverStatus::Offline => {
                self.status = DriverStatus::Online;
                self.shift_started_at = Some(self.clock.now());
                self.logger.info("Going online, shift started.");
                self.start_offer_feed(ctx);
            }
            DriverStatus::Online => {
                self.status = DriverStatus::Offline;
                self.shift_started_at = None;
                self.stop_offer_feed(ctx);
                self.logger.info("Going offline, shift ended.");
            }
            DriverStatus::Busy => {
                // Emergency reset for a stuck session: going offline
                // mid-order abandons it.
                self.logger
                    .warn("Going offline while busy, abandoning the active order.");
                if let Some(order) = self.destroy_active_order(ctx) {
                    self.dispatcher.do_send(OrderAbandoned {
                        driver_id: self.driver_id.clone(),
                        order_id: order.id,
                    });
                }
                self.stop_offer_feed(ctx);
                self.status = DriverStatus::Offline;
                self.shift_started_at = None;
            }
        }
        self.persist()
    }
}

impl Handler<SetVehicle> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: SetVehicle, _ctx: &mut Self::Context) -> Self::Result {
        if self.status == DriverStatus::Busy {
            self.logger
                .warn("Vehicle cannot change mid-order, keeping the current one.");
            return Ok(());
        }
        self.vehicle = msg.vehicle;
        self.logger
            .info(format!("Vehicle set to {}.", self.vehicle));
        self.persist()
    }
}

impl Handler<AcceptOffer> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: AcceptOffer, ctx: &mut Self::Context) -> Self::Result {
        self.accept_request(msg.request, ctx)
    }
}

impl Handler<DeclineOffer> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: DeclineOffer, ctx: &mut Self::Context) -> Self::Result {
        let before = self.incoming_requests.len();
        self.incoming_requests
            .retain(|offer| offer.id != msg.request_id);
        if self.incoming_requests.len() == before {
            self.logger.info(format!(
                "Decline for offer {} not currently shown, ignoring.",
                msg.request_id
            ));
            return Ok(());
        }
        if let Some(handle) = self.offer_timers.remove(&msg.request_id) {
            ctx.cancel_future(handle);
        }
        self.dispatcher.do_send(OfferDeclined {
            driver_id: self.driver_id.clone(),
            request_id: msg.request_id.clone(),
        });
        self.logger
            .info(format!("Declined offer {}.", msg.request_id));
        Ok(())
    }
}

impl Handler<ArrivedAtShop> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, _msg: ArrivedAtShop, ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let order_id = match self.active_order.as_mut() {
            Some(order)
                if order.phase == OrderPhase::Pickup && order.arrived_at_shop_at.is_none() =>
            {
                order.arrived_at_shop_at = Some(now);
                order.id.clone()
            }
            _ => {
                self.logger
                    .warn("Arrival can only be reported once, en route to the shop.");
                return Ok(());
            }
        };
        self.logger.info(format!(
            "Arrived at the shop for order {}, waiting for pickup range.",
            order_id
        ));
        self.schedule_pickup_range(ctx, order_id);
        self.persist()
    }
}

impl Handler<ConfirmPickup> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, _msg: ConfirmPickup, ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let order_id = match self.active_order.as_mut() {
            Some(order) if order.phase == OrderPhase::Pickup => {
                order.picked_up_at = Some(now);
                order.phase = OrderPhase::Dropoff;
                order.id.clone()
            }
            _ => {
                self.logger
                    .warn("No order waiting for pickup, nothing to confirm.");
                return Ok(());
            }
        };
        // The proximity signal is moot once the order moves on.
        if let Some(handle) = self.pickup_range_timer.take() {
            ctx.cancel_future(handle);
        }
        self.logger.info(format!(
            "Order {} picked up, heading to the customer.",
            order_id
        ));
        self.persist()
    }
}

impl Handler<CompleteOrder> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, _msg: CompleteOrder, ctx: &mut Self::Context) -> Self::Result {
        match self.destroy_active_order(ctx) {
            Some(order) => {
                self.dispatcher.do_send(OrderDelivered {
                    driver_id: self.driver_id.clone(),
                    order_id: order.id.clone(),
                });
                self.logger.info(format!(
                    "Order {} delivered to {}, back online.",
                    order.id, order.customer.name
                ));
                // The driver stays available: the shift keeps running and
                // offers come back without re-toggling.
                self.status = DriverStatus::Online;
                self.start_offer_feed(ctx);
                self.persist()
            }
            None => {
                self.logger.warn("No active order to complete.");
                Ok(())
            }
        }
    }
}

impl Handler<SendChatMessage> for DriverSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: SendChatMessage, _ctx: &mut Self::Context) -> Self::Result {
        let body = msg.body.trim();
        if body.is_empty() {
            self.logger.warn("Empty chat message dropped.");
            return Ok(());
        }
        let (order_id, counterpart_id) = match &self.active_order {
            Some(order) => (order.id.clone(), order.customer.id.clone()),
            None => {
                self.logger
                    .warn("No active order, chat message dropped.");
                return Ok(());
            }
        };
        self.messages.push(ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender: self.driver_id.clone(),
            body: body.to_string(),
            sent_at: self.clock.now(),
            from_driver: true,
        });
        self.chat.do_send(OutboundChat {
            order_id,
            counterpart_id,
            body: body.to_string(),
        });
        Ok(())
    }
}

impl Handler<InboundChat> for DriverSession {
    type Result = ();

    fn handle(&mut self, msg: InboundChat, _ctx: &mut Self::Context) -> Self::Result {
        match &self.active_order {
            Some(order) if order.id == msg.order_id => {
                self.logger
                    .info(format!("{}: {}", msg.sender, msg.body));
                self.messages.push(ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    sender: msg.sender,
                    body: msg.body,
                    sent_at: self.clock.now(),
                    from_driver: false,
                });
            }
            _ => self.logger.warn(format!(
                "Chat reply for order {} arrived after its thread closed, dropped.",
                msg.order_id
            )),
        }
    }
}

impl Handler<OffersUpdate> for DriverSession {
    type Result = ();

    fn handle(&mut self, msg: OffersUpdate, ctx: &mut Self::Context) -> Self::Result {
        // A refresh that raced a state change must not resurrect offers.
        if self.status != DriverStatus::Online || self.active_order.is_some() {
            return;
        }
        self.clear_offers(ctx);
        let now = self.clock.now();
        self.incoming_requests = msg
            .offers
            .into_iter()
            .filter(|offer| offer.expires_at > now)
            .collect();
        let deadlines: Vec<(String, DateTime<Utc>)> = self
            .incoming_requests
            .iter()
            .map(|offer| (offer.id.clone(), offer.expires_at))
            .collect();
        for (offer_id, expires_at) in deadlines {
            let evict_id = offer_id.clone();
            let handle = ctx.run_later(utils::until(expires_at, now), move |act, _ctx| {
                act.offer_timers.remove(&evict_id);
                let before = act.incoming_requests.len();
                act.incoming_requests.retain(|offer| offer.id != evict_id);
                if act.incoming_requests.len() < before {
                    act.logger
                        .info(format!("Offer {} expired unanswered, dropped.", evict_id));
                }
            });
            self.offer_timers.insert(offer_id, handle);
        }
    }
}

impl Handler<GetSnapshot> for DriverSession {
    type Result = MessageResult<GetSnapshot>;

    fn handle(&mut self, _msg: GetSnapshot, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        MessageResult(SessionSnapshot {
            driver_id: self.driver_id.clone(),
            status: self.status,
            vehicle: self.vehicle,
            shift_started_at: self.shift_started_at,
            shift_elapsed_secs: self
                .shift_started_at
                .map(|started_at| (now - started_at).num_seconds()),
            incoming_requests: self.incoming_requests.clone(),
            active_order: self.active_order.clone(),
            messages: self.messages.clone(),
        })
    }
}

impl Handler<AcceptOfferCommand> for DriverSession {
    type Result = ();

    fn handle(&mut self, msg: AcceptOfferCommand, ctx: &mut Self::Context) -> Self::Result {
        match self
            .incoming_requests
            .iter()
            .find(|offer| offer.id == msg.request_id)
            .cloned()
        {
            Some(request) => {
                let _ = self.accept_request(request, ctx);
            }
            None => self.logger.warn(format!(
                "Offer {} is not on the table, ignoring.",
                msg.request_id
            )),
        }
    }
}

impl Handler<ShowStatus> for DriverSession {
    type Result = ();

    fn handle(&mut self, _msg: ShowStatus, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.logger.info(format!(
            "Status: {} | Vehicle: {}",
            self.status, self.vehicle
        ));
        if let Some(started_at) = self.shift_started_at {
            self.logger.info(format!(
                "Shift elapsed: {}",
                utils::format_elapsed((now - started_at).num_seconds())
            ));
        }
        for offer in &self.incoming_requests {
            self.logger.info(format!(
                "Offer {}: {} -> {} ({} item(s), expires in {}s)",
                offer.id,
                offer.shop.name,
                offer.customer.address,
                offer.items.len(),
                (offer.expires_at - now).num_seconds()
            ));
        }
        if let Some(order) = &self.active_order {
            self.logger.info(format!(
                "Active order {} [{}] from {}, in pickup range: {}",
                order.id, order.phase, order.shop.name, order.is_within_pickup_range
            ));
        }
        for message in &self.messages {
            self.logger
                .info(format!("[chat] {}: {}", message.sender, message.body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver_actors::dispatcher::sample_offers;
    use crate::messages::internal_messages::RegisterSession;
    use crate::session_store::MemorySessionStore;
    use chrono::TimeDelta;
    use common::clock::SystemClock;
    use common::types::dtos::{CustomerInfo, OrderItem, ShopInfo};
    use tokio::time::sleep;

    fn test_timing() -> SessionTiming {
        SessionTiming {
            offer_poll_interval: Duration::from_millis(25),
            pickup_range_delay: Duration::from_millis(60),
        }
    }

    fn offer_with_ttl(id: &str, shop_name: &str, ttl_ms: i64) -> DeliveryRequest {
        let now = Utc::now();
        DeliveryRequest {
            id: id.to_string(),
            shop: ShopInfo {
                name: shop_name.to_string(),
                address: "1 Test St".to_string(),
                distance_km: 1.0,
            },
            items: vec![OrderItem {
                id: format!("{}-i1", id),
                name: "Combo".to_string(),
                quantity: 1,
            }],
            customer: CustomerInfo {
                id: format!("{}-c", id),
                name: "Test Customer".to_string(),
                address: "2 Test Ave".to_string(),
                notes: None,
                phone: None,
            },
            delivery_distance_km: 2.0,
            estimated_pickup_min: 5,
            estimated_delivery_min: 15,
            expires_at: now + TimeDelta::milliseconds(ttl_ms),
            created_at: now,
        }
    }

    struct Harness {
        session: Addr<DriverSession>,
        store: Arc<MemorySessionStore>,
    }

    fn start_with_offers(offers: Vec<DeliveryRequest>) -> Harness {
        let store = Arc::new(MemorySessionStore::new());
        start_on_store(store, offers)
    }

    fn start_on_store(store: Arc<MemorySessionStore>, offers: Vec<DeliveryRequest>) -> Harness {
        start_custom(store, offers, test_timing())
    }

    fn start_custom(
        store: Arc<MemorySessionStore>,
        offers: Vec<DeliveryRequest>,
        timing: SessionTiming,
    ) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let dispatcher = Dispatcher::with_offers(offers, clock.clone()).start();
        let chat = ChatRelay::new(Duration::from_millis(60)).start();
        let session = DriverSession::restore(
            "driver_1",
            store.clone(),
            dispatcher,
            chat.clone(),
            clock,
            timing,
        )
        .start();
        chat.do_send(RegisterSession {
            session: session.clone(),
        });
        Harness { session, store }
    }

    fn start_session() -> Harness {
        let clock = SystemClock;
        start_with_offers(sample_offers(&clock))
    }

    async fn snapshot(session: &Addr<DriverSession>) -> SessionSnapshot {
        session.send(GetSnapshot).await.unwrap()
    }

    /// Brings the session online and waits for the first feed refresh.
    async fn go_online(session: &Addr<DriverSession>) {
        session.send(ToggleOnline).await.unwrap().unwrap();
        sleep(Duration::from_millis(50)).await;
    }

    /// Accepts the offer with the given id out of the current snapshot.
    async fn accept(session: &Addr<DriverSession>, offer_id: &str) {
        let snap = snapshot(session).await;
        let request = snap
            .incoming_requests
            .iter()
            .find(|offer| offer.id == offer_id)
            .expect("offer should be on the table")
            .clone();
        session
            .send(AcceptOffer { request })
            .await
            .unwrap()
            .unwrap();
    }

    #[actix_rt::test]
    async fn going_online_starts_shift_and_populates_offers() {
        let h = start_session();
        go_online(&h.session).await;

        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Online);
        assert!(snap.shift_started_at.is_some());
        let shops: Vec<&str> = snap
            .incoming_requests
            .iter()
            .map(|offer| offer.shop.name.as_str())
            .collect();
        assert_eq!(shops, vec!["Burger Palace", "Pizza Heaven"]);
    }

    #[actix_rt::test]
    async fn going_offline_clears_shift_and_offers() {
        let h = start_session();
        go_online(&h.session).await;
        h.session.send(ToggleOnline).await.unwrap().unwrap();

        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Offline);
        assert!(snap.shift_started_at.is_none());
        assert!(snap.incoming_requests.is_empty());
        // No stale refresh may repopulate the queue after going offline.
        sleep(Duration::from_millis(80)).await;
        assert!(snapshot(&h.session).await.incoming_requests.is_empty());
    }

    #[actix_rt::test]
    async fn accepting_an_offer_makes_the_session_busy() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;

        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Busy);
        assert!(snap.incoming_requests.is_empty());
        let order = snap.active_order.expect("an active order should exist");
        assert_eq!(order.phase, OrderPhase::Pickup);
        assert_eq!(order.shop.name, "Burger Palace");
        assert!(!order.is_within_pickup_range);

        // Offers stay suppressed while busy, even across refresh intervals.
        sleep(Duration::from_millis(80)).await;
        assert!(snapshot(&h.session).await.incoming_requests.is_empty());
    }

    #[actix_rt::test]
    async fn arrival_is_stamped_and_pickup_range_confirms_later() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session.send(ArrivedAtShop).await.unwrap().unwrap();

        let order = snapshot(&h.session).await.active_order.unwrap();
        assert!(order.arrived_at_shop_at.is_some());
        assert!(!order.is_within_pickup_range);

        sleep(Duration::from_millis(120)).await;
        let order = snapshot(&h.session).await.active_order.unwrap();
        assert!(order.is_within_pickup_range);
    }

    #[actix_rt::test]
    async fn pickup_moves_to_dropoff_and_completion_frees_the_driver() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session.send(ArrivedAtShop).await.unwrap().unwrap();
        sleep(Duration::from_millis(120)).await;

        h.session.send(ConfirmPickup).await.unwrap().unwrap();
        let order = snapshot(&h.session).await.active_order.unwrap();
        assert_eq!(order.phase, OrderPhase::Dropoff);
        assert!(order.picked_up_at.is_some());

        h.session.send(CompleteOrder).await.unwrap().unwrap();
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Online);
        assert!(snap.active_order.is_none());
        assert!(snap.messages.is_empty());
        // Back online means offers flow again without re-toggling.
        sleep(Duration::from_millis(80)).await;
        assert!(!snapshot(&h.session).await.incoming_requests.is_empty());
    }

    #[actix_rt::test]
    async fn pickup_phase_is_monotonic() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "2").await;
        h.session.send(ConfirmPickup).await.unwrap().unwrap();
        let first = snapshot(&h.session).await.active_order.unwrap();

        // A second confirmation changes nothing.
        h.session.send(ConfirmPickup).await.unwrap().unwrap();
        let second = snapshot(&h.session).await.active_order.unwrap();
        assert_eq!(second.phase, OrderPhase::Dropoff);
        assert_eq!(second.picked_up_at, first.picked_up_at);
    }

    #[actix_rt::test]
    async fn chat_gets_a_counterpart_reply_after_the_delay() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session
            .send(SendChatMessage {
                body: "On my way".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let snap = snapshot(&h.session).await;
        assert_eq!(snap.messages.len(), 1);
        assert!(snap.messages[0].from_driver);
        assert_eq!(snap.messages[0].body, "On my way");

        sleep(Duration::from_millis(120)).await;
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.messages.len(), 2);
        assert!(!snap.messages[1].from_driver);
        assert_eq!(snap.messages[1].sender, "c1");
    }

    #[actix_rt::test]
    async fn counterpart_reply_is_dropped_when_the_order_completed_first() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session
            .send(SendChatMessage {
                body: "Almost there".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        h.session.send(CompleteOrder).await.unwrap().unwrap();

        sleep(Duration::from_millis(150)).await;
        let snap = snapshot(&h.session).await;
        assert!(snap.messages.is_empty());
        assert!(snap.active_order.is_none());
    }

    #[actix_rt::test]
    async fn declining_twice_is_a_noop_the_second_time() {
        // A slow poll keeps refreshes out of the picture while asserting.
        let clock = SystemClock;
        let h = start_custom(
            Arc::new(MemorySessionStore::new()),
            sample_offers(&clock),
            SessionTiming {
                offer_poll_interval: Duration::from_millis(400),
                pickup_range_delay: Duration::from_millis(60),
            },
        );
        go_online(&h.session).await;

        h.session
            .send(DeclineOffer {
                request_id: "2".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.incoming_requests.len(), 1);
        assert_eq!(snap.incoming_requests[0].id, "1");

        h.session
            .send(DeclineOffer {
                request_id: "2".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.incoming_requests.len(), 1);
        assert_eq!(snap.incoming_requests[0].id, "1");
    }

    #[actix_rt::test]
    async fn accept_then_complete_outruns_every_pending_timer() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session.send(ArrivedAtShop).await.unwrap().unwrap();
        h.session
            .send(SendChatMessage {
                body: "Here already".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        h.session.send(CompleteOrder).await.unwrap().unwrap();

        // Let the pickup-range and reply timers elapse; neither may leave a
        // trace on the now-destroyed order.
        sleep(Duration::from_millis(200)).await;
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Online);
        assert!(snap.active_order.is_none());
        assert!(snap.messages.is_empty());
    }

    #[actix_rt::test]
    async fn busy_to_offline_resets_the_whole_session() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;

        h.session.send(ToggleOnline).await.unwrap().unwrap();
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Offline);
        assert!(snap.shift_started_at.is_none());
        assert!(snap.active_order.is_none());
        assert!(snap.messages.is_empty());
        // The persisted entries are removed, not tombstoned.
        assert_eq!(h.store.entry(ACTIVE_ORDER_KEY), None);
        assert_eq!(h.store.entry(SHIFT_STARTED_AT_KEY), None);
        assert_eq!(h.store.entry(STATUS_KEY), Some("\"Offline\"".to_string()));
    }

    #[actix_rt::test]
    async fn busy_exactly_when_an_order_exists() {
        let h = start_session();
        let assert_invariant = |snap: &SessionSnapshot| {
            assert_eq!(
                snap.status == DriverStatus::Busy,
                snap.active_order.is_some()
            );
            if !snap.incoming_requests.is_empty() {
                assert_eq!(snap.status, DriverStatus::Online);
                assert!(snap.active_order.is_none());
            }
        };

        assert_invariant(&snapshot(&h.session).await);
        go_online(&h.session).await;
        assert_invariant(&snapshot(&h.session).await);
        accept(&h.session, "1").await;
        assert_invariant(&snapshot(&h.session).await);
        h.session.send(CompleteOrder).await.unwrap().unwrap();
        assert_invariant(&snapshot(&h.session).await);
    }

    #[actix_rt::test]
    async fn vehicle_is_locked_while_busy() {
        let h = start_session();
        h.session
            .send(SetVehicle {
                vehicle: VehicleType::Car,
            })
            .await
            .unwrap()
            .unwrap();
        go_online(&h.session).await;
        accept(&h.session, "1").await;

        h.session
            .send(SetVehicle {
                vehicle: VehicleType::Scooter,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot(&h.session).await.vehicle, VehicleType::Car);
    }

    #[actix_rt::test]
    async fn offers_are_evicted_at_expiry() {
        let h = start_with_offers(vec![offer_with_ttl("9", "Sushi Bar", 90)]);
        go_online(&h.session).await;
        assert_eq!(snapshot(&h.session).await.incoming_requests.len(), 1);

        sleep(Duration::from_millis(120)).await;
        assert!(snapshot(&h.session).await.incoming_requests.is_empty());
    }

    #[actix_rt::test]
    async fn store_failures_surface_but_state_still_updates() {
        let h = start_session();
        h.store.fail_writes(true);

        let result = h.session.send(ToggleOnline).await.unwrap();
        assert!(matches!(result, Err(SessionError::Store(_))));
        // The in-memory state took the optimistic update anyway.
        assert_eq!(snapshot(&h.session).await.status, DriverStatus::Online);
    }

    #[actix_rt::test]
    async fn session_round_trips_through_the_store() {
        let h = start_session();
        h.session
            .send(SetVehicle {
                vehicle: VehicleType::Scooter,
            })
            .await
            .unwrap()
            .unwrap();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        let before = snapshot(&h.session).await;

        // A new session over the same store sees the same observable state.
        let restored = start_on_store(h.store.clone(), Vec::new());
        let after = snapshot(&restored.session).await;
        assert_eq!(after.status, before.status);
        assert_eq!(after.vehicle, before.vehicle);
        assert_eq!(after.shift_started_at, before.shift_started_at);
        assert_eq!(after.active_order, before.active_order);
    }

    #[actix_rt::test]
    async fn corrupt_persisted_order_fails_open_to_online() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(STATUS_KEY, "\"Busy\"").unwrap();
        store
            .set(SHIFT_STARTED_AT_KEY, "\"2026-08-06T09:00:00Z\"")
            .unwrap();
        store.set(ACTIVE_ORDER_KEY, "definitely not json").unwrap();

        let h = start_on_store(store, Vec::new());
        let snap = snapshot(&h.session).await;
        assert_eq!(snap.status, DriverStatus::Online);
        assert!(snap.active_order.is_none());
        assert!(snap.shift_started_at.is_some());
    }

    #[actix_rt::test]
    async fn restore_resumes_a_pending_pickup_range_wait() {
        let h = start_session();
        go_online(&h.session).await;
        accept(&h.session, "1").await;
        h.session.send(ArrivedAtShop).await.unwrap().unwrap();
        // Restart before the proximity signal fires.
        let restored = start_on_store(h.store.clone(), Vec::new());

        sleep(Duration::from_millis(120)).await;
        let order = snapshot(&restored.session).await.active_order.unwrap();
        assert!(order.is_within_pickup_range);
    }
}
