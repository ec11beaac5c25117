//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `ids`: Identifier aliases
//! - `user`: Users, roles and account status
//! - `wallet`: Wallets, balances and ledger entries
//! - `ride`: Rides and their lifecycle status
//! - `booking`: Bookings and their state machine status
//! - `command`: Typed commands per operation
//! - `error`: Error types for the marketplace core

pub mod booking;
pub mod command;
pub mod error;
pub mod ids;
pub mod ride;
pub mod user;
pub mod wallet;

pub use booking::{Booking, BookingStatus};
pub use command::{
    AcceptBookingCommand, CancelBookingCommand, Command, CreateRideCommand, DepositCommand,
    RegisterUserCommand, RejectBookingCommand, RequestBookingCommand, RideActionCommand,
    SetUserStatusCommand, WithdrawCommand,
};
pub use error::{ErrorKind, MarketplaceError};
pub use ids::{BookingId, EntryId, RideId, UserId};
pub use ride::{Ride, RideStatus, Route};
pub use user::{AccountStatus, Reputation, Role, User};
pub use wallet::{Balance, EntryKind, LedgerEntry, Wallet, TOKEN_SCALE};
