use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::driver_status::DriverStatus;
use crate::types::order_phase::OrderPhase;
use crate::types::vehicle::VehicleType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopInfo {
    /// Display name of the pickup shop.
    pub name: String,
    /// Street address of the shop.
    pub address: String,
    /// Distance from the driver to the shop, in kilometers.
    pub distance_km: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// ID of the item within the order.
    pub id: String,
    /// Display name of the item.
    pub name: String,
    /// Units ordered.
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerInfo {
    /// ID of the customer.
    pub id: String,
    /// Display name of the customer.
    pub name: String,
    /// Delivery address.
    pub address: String,
    /// Free-form delivery notes, if the customer left any.
    pub notes: Option<String>,
    /// Contact phone, if shared.
    pub phone: Option<String>,
}

/// An unaccepted candidate job offered to an available driver. Offers are
/// ephemeral: they exist only while the driver is online with no active
/// order, and an offer not acted on by `expires_at` is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// ID of the offered job.
    pub id: String,
    /// Pickup shop.
    pub shop: ShopInfo,
    /// Items to carry.
    pub items: Vec<OrderItem>,
    /// Customer receiving the order.
    pub customer: CustomerInfo,
    /// Distance from the shop to the customer, in kilometers.
    pub delivery_distance_km: f32,
    /// Estimated minutes until pickup.
    pub estimated_pickup_min: u32,
    /// Estimated minutes until delivery.
    pub estimated_delivery_min: u32,
    /// Instant at which the unanswered offer lapses.
    pub expires_at: DateTime<Utc>,
    /// Instant at which the offer was created.
    pub created_at: DateTime<Utc>,
}

impl Eq for DeliveryRequest {}

impl PartialEq for DeliveryRequest {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for DeliveryRequest {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The single job a driver is currently executing. At most one exists per
/// driver; its presence is what makes the session busy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveOrder {
    /// ID of the order (same as the accepted offer's id).
    pub id: String,
    /// Current phase: pickup, then dropoff.
    pub phase: OrderPhase,
    /// Pickup shop.
    pub shop: ShopInfo,
    /// Items to carry.
    pub items: Vec<OrderItem>,
    /// Customer receiving the order.
    pub customer: CustomerInfo,
    /// Instant the driver reported arriving at the shop, if reported.
    pub arrived_at_shop_at: Option<DateTime<Utc>>,
    /// Instant the driver confirmed the pickup, if confirmed.
    pub picked_up_at: Option<DateTime<Utc>>,
    /// Whether the proximity signal has confirmed the driver is in pickup
    /// range. Gates enabling the pickup confirmation control.
    pub is_within_pickup_range: bool,
}

impl ActiveOrder {
    /// Builds the active order created by accepting `request`.
    pub fn from_request(request: DeliveryRequest) -> Self {
        Self {
            id: request.id,
            phase: OrderPhase::Pickup,
            shop: request.shop,
            items: request.items,
            customer: request.customer,
            arrived_at_shop_at: None,
            picked_up_at: None,
            is_within_pickup_range: false,
        }
    }
}

/// One entry of the chat thread tied to the active order. The thread is
/// transient: it is cleared whenever the active order is destroyed and is
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// ID of the message.
    pub id: String,
    /// ID of whoever authored the message.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// Instant the message was appended to the thread.
    pub sent_at: DateTime<Utc>,
    /// True when the driver authored the message, false for the counterpart.
    pub from_driver: bool,
}

/// Read-only view of the whole session, for consoles and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub driver_id: String,
    pub status: DriverStatus,
    pub vehicle: VehicleType,
    pub shift_started_at: Option<DateTime<Utc>>,
    /// Seconds since the shift started, when one is running.
    pub shift_elapsed_secs: Option<i64>,
    pub incoming_requests: Vec<DeliveryRequest>,
    pub active_order: Option<ActiveOrder>,
    pub messages: Vec<ChatMessage>,
}
