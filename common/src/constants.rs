use std::time::Duration;

// Fixed keys of the durable session store.
pub const STATUS_KEY: &str = "driver_status";
pub const VEHICLE_KEY: &str = "driver_vehicle";
pub const SHIFT_STARTED_AT_KEY: &str = "shift_started_at";
pub const ACTIVE_ORDER_KEY: &str = "active_order";

const PICKUP_RANGE_DELAY_SECS: u64 = 3;
const CHAT_REPLY_DELAY_SECS: u64 = 2;
const OFFER_POLL_INTERVAL_SECS: u64 = 5;

/// Delay before the proximity signal confirms the driver is in pickup range.
pub const PICKUP_RANGE_DELAY: Duration = Duration::from_secs(PICKUP_RANGE_DELAY_SECS);
/// Delay before the simulated counterpart acknowledges a chat message.
pub const CHAT_REPLY_DELAY: Duration = Duration::from_secs(CHAT_REPLY_DELAY_SECS);
/// Interval between offer feed refreshes while online and free.
pub const OFFER_POLL_INTERVAL: Duration = Duration::from_secs(OFFER_POLL_INTERVAL_SECS);

/// Seconds an offer stays open before it expires unanswered.
pub const OFFER_TTL_SECS: i64 = 60;

/// Canned acknowledgements sent back by the simulated counterpart.
pub const COUNTERPART_REPLIES: [&str; 3] = [
    "Ok, thank you!",
    "Great, see you soon!",
    "Perfect, I'll be waiting.",
];
