//! Ride-Pool Engine Library
//! # Overview
//!
//! This library implements the settlement core of a ride-pooling
//! marketplace: drivers publish rides, passengers request seats, drivers
//! accept or reject requests, and a token wallet settles payment atomically
//! with acceptance.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (User, Wallet, Ride, Booking, commands, errors)
//! - [`store`] - In-memory store with row-locked units of work
//! - [`core`] - Business logic components:
//!   - [`core::wallet_ledger`] - Balances, fund holds and the ledger
//!   - [`core::ride_inventory`] - Seat capacity and ride lifecycle
//!   - [`core::booking_workflow`] - Booking state machine
//!   - [`core::notifier`] - Post-commit notifications
//!   - [`core::marketplace`] - Facade and command dispatch
//! - [`io`] - CSV script reading and wallet output
//! - [`replay`] - Script replay on a multi-threaded runtime
//! - [`cli`] - CLI arguments parsing and log setup
//!
//! # Booking Flow
//!
//! - **Request**: creates a pending booking with a frozen price; no seats or
//!   funds are taken
//! - **Accept**: reserves seats, blocks the passenger's funds and captures
//!   them to the driver in one unit of work
//! - **Reject / Cancel**: closes a pending booking; nothing to return
//! - **Complete ride**: completes every approved booking of the ride
//! - **Cancel ride**: cancels open bookings and refunds approved ones
//!
//! # Wallet States
//!
//! Each wallet maintains:
//! - `available`: Funds that can be spent or withdrawn
//! - `blocked`: Funds held for a pending obligation
//! - `total`: Sum of available and blocked funds

pub mod cli;
pub mod core;
pub mod io;
pub mod replay;
pub mod store;
pub mod types;

pub use core::{BookingWorkflow, Marketplace, RideInventory, WalletLedger};
pub use io::write_wallets_csv;
pub use store::{Store, UnitOfWork};
pub use types::{
    Booking, BookingId, BookingStatus, Command, MarketplaceError, Ride, RideId, RideStatus,
    UserId, Wallet,
};
