use serde::{Deserialize, Serialize};
use std::fmt;

/// Enum representing the vehicle a driver works with. Selectable while not
/// busy and persisted as a preference.
#[derive(Debug, Clone, Serialize, Deserialize, Copy, PartialEq, Eq)]
pub enum VehicleType {
    Bike,
    Car,
    Scooter,
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleType::Bike => write!(f, "Bike"),
            VehicleType::Car => write!(f, "Car"),
            VehicleType::Scooter => write!(f, "Scooter"),
        }
    }
}
