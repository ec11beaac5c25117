//! Ride-related types
//!
//! A ride is a driver's offered trip. Seat counts and status are changed only
//! by the ride inventory and the booking workflow.

use super::ids::{RideId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Lifecycle status of a ride
///
/// `Open -> Full -> InProgress -> Completed`, with `Full -> Open` when seats
/// are released and `Cancelled` reachable from `Open` or `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RideStatus {
    Open,
    Full,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Whether seats may still be reserved or released on the ride
    pub fn accepts_bookings(self) -> bool {
        matches!(self, RideStatus::Open | RideStatus::Full)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RideStatus::Open => "OPEN",
            RideStatus::Full => "FULL",
            RideStatus::InProgress => "IN_PROGRESS",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Where a ride goes and where passengers meet the driver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    pub meeting_point: Option<String>,
    pub drop_point: Option<String>,
}

impl Route {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Route {
            origin: origin.into(),
            destination: destination.into(),
            meeting_point: None,
            drop_point: None,
        }
    }
}

/// A driver's published trip
#[derive(Debug, Clone, PartialEq)]
pub struct Ride {
    pub id: RideId,

    /// Owning driver
    pub driver: UserId,

    pub route: Route,

    pub departure: DateTime<Utc>,

    /// Capacity fixed at creation
    pub total_seats: u32,

    /// Free seats, `0 <= available_seats <= total_seats`
    pub available_seats: u32,

    /// Token price of one seat
    pub price_per_seat: Decimal,

    pub status: RideStatus,

    pub created_at: DateTime<Utc>,
}

impl Ride {
    /// Seats already sold to approved bookings
    pub fn seats_taken(&self) -> u32 {
        self.total_seats - self.available_seats
    }
}
