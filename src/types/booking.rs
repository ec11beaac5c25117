//! Booking-related types

use super::ids::{BookingId, RideId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Status of a seat request
///
/// ```text
/// PendingApproval ──accept──> Approved ──ride complete──> Completed
///        │                        │
///        ├──reject──> Rejected    └──ride cancel──> Cancelled
///        └──cancel──> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    PendingApproval,
    Approved,
    Completed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Rejected | BookingStatus::Cancelled
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::PendingApproval => "PENDING_APPROVAL",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// One passenger's seat request against one ride
///
/// `total_price` is frozen at request time and never recomputed, even if the
/// ride price would change.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: BookingId,
    pub ride: RideId,
    pub passenger: UserId,
    pub seats: u32,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BookingStatus::PendingApproval, false)]
    #[case(BookingStatus::Approved, false)]
    #[case(BookingStatus::Completed, true)]
    #[case(BookingStatus::Rejected, true)]
    #[case(BookingStatus::Cancelled, true)]
    fn test_is_terminal(#[case] status: BookingStatus, #[case] expected: bool) {
        assert_eq!(status.is_terminal(), expected);
    }
}
