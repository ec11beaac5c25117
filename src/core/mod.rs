//! Core business logic module
//!
//! This module contains the marketplace components:
//! - `wallet_ledger` - Wallet balances, fund holds and the append-only ledger
//! - `ride_inventory` - Seat capacity and ride lifecycle
//! - `booking_workflow` - Booking state machine coordinating seats and funds
//! - `notifier` - Post-commit notification dispatch
//! - `marketplace` - Facade wiring the components over one store

pub mod booking_workflow;
pub mod marketplace;
pub mod notifier;
pub mod ride_inventory;
pub mod wallet_ledger;

pub use booking_workflow::BookingWorkflow;
pub use marketplace::{Marketplace, Outcome};
pub use notifier::{
    DeliveryError, Notification, NotificationKind, NotificationSink, NotificationWorker, Notifier,
    TracingSink,
};
pub use ride_inventory::RideInventory;
pub use wallet_ledger::WalletLedger;
