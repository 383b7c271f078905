use serde::{Deserialize, Serialize};
use std::fmt;

/// Enum representing the availability of a driver session
#[derive(Debug, Clone, Serialize, Deserialize, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// No shift active, no offers shown
    Offline,
    /// Shift active, eligible to receive offers
    Online,
    /// Exactly one order in progress, offers suppressed
    Busy,
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverStatus::Offline => write!(f, "Offline"),
            DriverStatus::Online => write!(f, "Online"),
            DriverStatus::Busy => write!(f, "Busy"),
        }
    }
}
