use serde::{Deserialize, Serialize};
use std::fmt;

/// Enum representing where an active order stands. Pickup is the initial
/// phase; Dropoff is only reached through an explicit pickup confirmation
/// and there is no way back.
#[derive(Debug, Clone, Serialize, Deserialize, Copy, PartialEq, Eq)]
pub enum OrderPhase {
    /// En route to (or at) the shop
    Pickup,
    /// En route to (or at) the customer
    Dropoff,
}

impl fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPhase::Pickup => write!(f, "Pickup"),
            OrderPhase::Dropoff => write!(f, "Dropoff"),
        }
    }
}
