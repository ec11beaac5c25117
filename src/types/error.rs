//! Error types for the ride-pool settlement engine
//!
//! This module defines every error a marketplace operation can raise.
//! Errors carry the identifiers and amounts involved so that callers and logs
//! can explain a rejection without re-reading state.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: user, wallet, ride or booking absent
//! - **Authorization Errors**: actor is not the ride's driver or the booking's passenger,
//!   or the actor's account is not active
//! - **Business Rule Errors**: invalid transition, insufficient funds, not enough seats,
//!   self-booking, invalid schedule
//! - **Input Errors**: malformed amounts and commands
//! - **Internal Errors**: arithmetic overflow, storage misuse, file I/O and CSV parsing

use crate::types::booking::BookingStatus;
use crate::types::ids::{BookingId, RideId, UserId};
use crate::types::ride::RideStatus;
use crate::types::user::AccountStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Main error type for the marketplace core
///
/// Every operation of the wallet ledger, ride inventory and booking workflow
/// returns this type. An error raised inside a unit of work aborts it; the
/// same value is handed back to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketplaceError {
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// The referenced user is not known to the identity subsystem
    #[error("User {user} not found")]
    UserNotFound {
        /// User ID
        user: UserId,
    },

    /// The referenced user has no wallet
    #[error("Wallet for user {user} not found")]
    WalletNotFound {
        /// Owner of the missing wallet
        user: UserId,
    },

    /// The referenced ride does not exist
    #[error("Ride {ride} not found")]
    RideNotFound {
        /// Ride ID
        ride: RideId,
    },

    /// The referenced booking does not exist
    #[error("Booking {booking} not found")]
    BookingNotFound {
        /// Booking ID
        booking: BookingId,
    },

    /// The actor is not allowed to perform the action on the target
    #[error("User {actor} is not allowed to {action}")]
    Unauthorized {
        /// Acting user
        actor: UserId,
        /// Attempted action, e.g. "accept booking 4"
        action: String,
    },

    /// The actor's account is suspended or banned
    #[error("Account {user} is {status}")]
    AccountInactive {
        /// Acting user
        user: UserId,
        /// Current account status
        status: AccountStatus,
    },

    /// The operation is not valid from the entity's current status
    #[error("Cannot {action} {entity} in status {from}")]
    InvalidTransition {
        /// Entity description, e.g. "booking 3"
        entity: String,
        /// Current status of the entity
        from: String,
        /// Attempted action
        action: String,
    },

    /// Available balance does not cover the requested amount
    #[error("Insufficient funds for user {user}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Wallet owner
        user: UserId,
        /// Available balance
        available: Decimal,
        /// Requested amount
        requested: Decimal,
    },

    /// Blocked balance does not cover a release or capture
    #[error("Insufficient blocked funds for {operation} on user {user}: blocked {blocked}, requested {requested}")]
    InsufficientBlockedFunds {
        /// Wallet owner
        user: UserId,
        /// Blocked balance
        blocked: Decimal,
        /// Requested amount
        requested: Decimal,
        /// Operation that failed
        operation: String,
    },

    /// The ride has fewer free seats than requested
    #[error("Not enough seats on ride {ride}: available {available}, requested {requested}")]
    NotEnoughSeats {
        /// Ride ID
        ride: RideId,
        /// Seats currently available
        available: u32,
        /// Seats requested
        requested: u32,
    },

    /// A driver tried to book a seat on their own ride
    #[error("User {user} cannot book their own ride {ride}")]
    SelfBookingForbidden {
        /// Ride ID
        ride: RideId,
        /// Driver who attempted the booking
        user: UserId,
    },

    /// The ride departure is not strictly in the future
    #[error("Departure {departure} is not after {now}")]
    InvalidSchedule {
        /// Requested departure
        departure: DateTime<Utc>,
        /// Current time according to the engine clock
        now: DateTime<Utc>,
    },

    /// A token amount is non-positive, negative or too precise
    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
        /// Why it was rejected
        reason: String,
    },

    /// A command failed validation before reaching the workflow
    #[error("Invalid command: {message}")]
    InvalidCommand {
        /// Description of the validation failure
        message: String,
    },

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// User whose balance or booking was involved
        user: UserId,
    },

    /// The unit of work was used in a way the store does not allow
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the misuse
        message: String,
    },
}

/// Stable classification of [`MarketplaceError`] for callers
///
/// Callers map kinds to their own status vocabulary; [`ErrorKind::status_code`]
/// gives the HTTP-equivalent used by the replay tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidTransition,
    InsufficientFunds,
    NotEnoughSeats,
    SelfBookingForbidden,
    InvalidSchedule,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    /// HTTP-equivalent status code for this kind
    ///
    /// Not-found maps to 404, authorization to 403, business-rule and input
    /// violations to 400 and internal failures to 500.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Unauthorized => 403,
            ErrorKind::InvalidTransition
            | ErrorKind::InsufficientFunds
            | ErrorKind::NotEnoughSeats
            | ErrorKind::SelfBookingForbidden
            | ErrorKind::InvalidSchedule
            | ErrorKind::InvalidInput => 400,
            ErrorKind::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::NotEnoughSeats => "not_enough_seats",
            ErrorKind::SelfBookingForbidden => "self_booking_forbidden",
            ErrorKind::InvalidSchedule => "invalid_schedule",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

// Conversion from io::Error to MarketplaceError
impl From<std::io::Error> for MarketplaceError {
    fn from(error: std::io::Error) -> Self {
        MarketplaceError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to MarketplaceError
impl From<csv::Error> for MarketplaceError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        MarketplaceError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl MarketplaceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketplaceError::UserNotFound { .. }
            | MarketplaceError::WalletNotFound { .. }
            | MarketplaceError::RideNotFound { .. }
            | MarketplaceError::BookingNotFound { .. } => ErrorKind::NotFound,
            MarketplaceError::Unauthorized { .. } | MarketplaceError::AccountInactive { .. } => {
                ErrorKind::Unauthorized
            }
            MarketplaceError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            MarketplaceError::InsufficientFunds { .. }
            | MarketplaceError::InsufficientBlockedFunds { .. } => ErrorKind::InsufficientFunds,
            MarketplaceError::NotEnoughSeats { .. } => ErrorKind::NotEnoughSeats,
            MarketplaceError::SelfBookingForbidden { .. } => ErrorKind::SelfBookingForbidden,
            MarketplaceError::InvalidSchedule { .. } => ErrorKind::InvalidSchedule,
            MarketplaceError::InvalidAmount { .. }
            | MarketplaceError::InvalidCommand { .. }
            | MarketplaceError::ParseError { .. } => ErrorKind::InvalidInput,
            MarketplaceError::FileNotFound { .. }
            | MarketplaceError::IoError { .. }
            | MarketplaceError::ArithmeticOverflow { .. }
            | MarketplaceError::Storage { .. } => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status code, shorthand for `self.kind().status_code()`
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Create an Unauthorized error
    pub fn unauthorized(actor: UserId, action: impl Into<String>) -> Self {
        MarketplaceError::Unauthorized {
            actor,
            action: action.into(),
        }
    }

    /// Create an InvalidTransition error for a booking
    pub fn booking_transition(booking: BookingId, from: BookingStatus, action: &str) -> Self {
        MarketplaceError::InvalidTransition {
            entity: format!("booking {}", booking),
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    /// Create an InvalidTransition error for a ride
    pub fn ride_transition(ride: RideId, from: RideStatus, action: &str) -> Self {
        MarketplaceError::InvalidTransition {
            entity: format!("ride {}", ride),
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, available: Decimal, requested: Decimal) -> Self {
        MarketplaceError::InsufficientFunds {
            user,
            available,
            requested,
        }
    }

    /// Create an InsufficientBlockedFunds error
    pub fn insufficient_blocked_funds(
        user: UserId,
        blocked: Decimal,
        requested: Decimal,
        operation: &str,
    ) -> Self {
        MarketplaceError::InsufficientBlockedFunds {
            user,
            blocked,
            requested,
            operation: operation.to_string(),
        }
    }

    /// Create a NotEnoughSeats error
    pub fn not_enough_seats(ride: RideId, available: u32, requested: u32) -> Self {
        MarketplaceError::NotEnoughSeats {
            ride,
            available,
            requested,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        MarketplaceError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidCommand error
    pub fn invalid_command(message: impl Into<String>) -> Self {
        MarketplaceError::InvalidCommand {
            message: message.into(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        MarketplaceError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        MarketplaceError::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::file_not_found(
        MarketplaceError::FileNotFound { path: "script.csv".to_string() },
        "File not found: script.csv"
    )]
    #[case::parse_error_with_line(
        MarketplaceError::ParseError { line: Some(7), message: "Invalid field".to_string() },
        "CSV parse error at line 7: Invalid field"
    )]
    #[case::parse_error_without_line(
        MarketplaceError::ParseError { line: None, message: "Invalid field".to_string() },
        "CSV parse error: Invalid field"
    )]
    #[case::ride_not_found(MarketplaceError::RideNotFound { ride: 9 }, "Ride 9 not found")]
    #[case::insufficient_funds(
        MarketplaceError::insufficient_funds(3, Decimal::new(500, 2), Decimal::new(2000, 2)),
        "Insufficient funds for user 3: available 5.00, requested 20.00"
    )]
    #[case::not_enough_seats(
        MarketplaceError::not_enough_seats(1, 1, 2),
        "Not enough seats on ride 1: available 1, requested 2"
    )]
    #[case::self_booking(
        MarketplaceError::SelfBookingForbidden { ride: 4, user: 2 },
        "User 2 cannot book their own ride 4"
    )]
    #[case::booking_transition(
        MarketplaceError::booking_transition(5, BookingStatus::Rejected, "accept"),
        "Cannot accept booking 5 in status REJECTED"
    )]
    #[case::account_inactive(
        MarketplaceError::AccountInactive { user: 8, status: AccountStatus::Banned },
        "Account 8 is BANNED"
    )]
    fn test_error_display(#[case] error: MarketplaceError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::user(MarketplaceError::UserNotFound { user: 1 }, ErrorKind::NotFound, 404)]
    #[case::booking(MarketplaceError::BookingNotFound { booking: 1 }, ErrorKind::NotFound, 404)]
    #[case::unauthorized(MarketplaceError::unauthorized(1, "accept booking 2"), ErrorKind::Unauthorized, 403)]
    #[case::inactive(
        MarketplaceError::AccountInactive { user: 1, status: AccountStatus::Suspended },
        ErrorKind::Unauthorized,
        403
    )]
    #[case::transition(
        MarketplaceError::ride_transition(1, RideStatus::Completed, "start"),
        ErrorKind::InvalidTransition,
        400
    )]
    #[case::blocked(
        MarketplaceError::insufficient_blocked_funds(1, Decimal::ZERO, Decimal::ONE, "release"),
        ErrorKind::InsufficientFunds,
        400
    )]
    #[case::seats(MarketplaceError::not_enough_seats(1, 0, 1), ErrorKind::NotEnoughSeats, 400)]
    #[case::amount(MarketplaceError::invalid_amount(Decimal::ZERO, "must be positive"), ErrorKind::InvalidInput, 400)]
    #[case::overflow(MarketplaceError::arithmetic_overflow("deposit", 1), ErrorKind::Internal, 500)]
    fn test_error_kind_and_status(
        #[case] error: MarketplaceError,
        #[case] kind: ErrorKind,
        #[case] status: u16,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.status_code(), status);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: MarketplaceError = io_error.into();
        assert!(matches!(error, MarketplaceError::IoError { .. }));
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}
