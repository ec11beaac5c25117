//! Marketplace facade
//!
//! This module provides the `Marketplace` struct, which wires the wallet
//! ledger, ride inventory and booking workflow over one shared [`Store`] and
//! one [`Notifier`]. It exposes the identity contract and a dispatcher that
//! runs any typed [`Command`].
//!
//! # Architecture
//!
//! ```text
//! Marketplace
//!     ├── Arc<Store>        (shared state, units of work)
//!     ├── WalletLedger      (balances and ledger entries)
//!     ├── RideInventory     (seats and ride lifecycle)
//!     └── BookingWorkflow   (booking state machine)
//! ```
//!
//! The marketplace is cheap to clone; clones share the store.

use crate::core::booking_workflow::BookingWorkflow;
use crate::core::notifier::{NotificationSink, NotificationWorker, Notifier};
use crate::core::ride_inventory::RideInventory;
use crate::core::wallet_ledger::WalletLedger;
use crate::store::Store;
use crate::types::{
    Booking, Command, MarketplaceError, RegisterUserCommand, Ride, Role, SetUserStatusCommand,
    User, UserId, Wallet,
};
use std::sync::Arc;
use tracing::{debug, info};

/// What a dispatched command produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    User(User),
    Wallet(Wallet),
    Ride(Ride),
    Booking(Booking),
}

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<Store>,
    ledger: WalletLedger,
    rides: RideInventory,
    bookings: BookingWorkflow,
}

impl Marketplace {
    /// Build the marketplace components over `store`, publishing to `notifier`
    pub fn new(store: Arc<Store>, notifier: Notifier) -> Self {
        let ledger = WalletLedger::new(Arc::clone(&store));
        let rides = RideInventory::new(Arc::clone(&store), ledger.clone(), notifier.clone());
        let bookings = BookingWorkflow::new(
            Arc::clone(&store),
            ledger.clone(),
            rides.clone(),
            notifier,
        );
        Self {
            store,
            ledger,
            rides,
            bookings,
        }
    }

    /// Build the marketplace with a fresh notification channel into `sink`
    ///
    /// The returned worker must be run (typically spawned) for notifications
    /// to be delivered.
    pub fn with_sink(store: Arc<Store>, sink: Arc<dyn NotificationSink>) -> (Self, NotificationWorker) {
        let (notifier, worker) = Notifier::channel(sink);
        (Self::new(store, notifier), worker)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    pub fn rides(&self) -> &RideInventory {
        &self.rides
    }

    pub fn bookings(&self) -> &BookingWorkflow {
        &self.bookings
    }

    // ---------------------------------------------------------------------
    // Identity contract
    // ---------------------------------------------------------------------

    /// Register a new active user
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidCommand` if the id is taken or the name is blank
    pub fn register_user(&self, cmd: RegisterUserCommand) -> Result<User, MarketplaceError> {
        if cmd.name.trim().is_empty() {
            return Err(MarketplaceError::invalid_command("user name is required"));
        }
        if self.store.user(cmd.user).is_some() {
            return Err(MarketplaceError::invalid_command(format!(
                "user {} is already registered",
                cmd.user
            )));
        }

        let mut user = User::new(cmd.user, cmd.name);
        if cmd.driver {
            user = user.with_role(Role::Driver);
        }
        self.store.put_user(user.clone());
        info!(user = user.id, driver = cmd.driver, "user registered");
        Ok(user)
    }

    /// Suspend, ban or reactivate a user
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user is unknown
    pub fn set_user_status(&self, cmd: SetUserStatusCommand) -> Result<User, MarketplaceError> {
        let user = self.store.set_user_status(cmd.user, cmd.status)?;
        info!(user = user.id, status = %user.status, "user status changed");
        Ok(user)
    }

    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user is unknown
    pub fn user(&self, user: UserId) -> Result<User, MarketplaceError> {
        self.store
            .user(user)
            .ok_or(MarketplaceError::UserNotFound { user })
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Run one command to completion
    ///
    /// # Errors
    ///
    /// Whatever the underlying operation returns, unchanged.
    pub async fn execute(&self, command: Command) -> Result<Outcome, MarketplaceError> {
        debug!(op = command.name(), "executing command");
        match command {
            Command::RegisterUser(cmd) => self.register_user(cmd).map(Outcome::User),
            Command::SetUserStatus(cmd) => self.set_user_status(cmd).map(Outcome::User),
            Command::Deposit(cmd) => {
                cmd.validate()?;
                self.ledger
                    .deposit_funds(cmd.user, cmd.amount)
                    .await
                    .map(Outcome::Wallet)
            }
            Command::Withdraw(cmd) => {
                cmd.validate()?;
                self.ledger
                    .withdraw_funds(cmd.user, cmd.amount)
                    .await
                    .map(Outcome::Wallet)
            }
            Command::CreateRide(cmd) => self.rides.create(cmd).await.map(Outcome::Ride),
            Command::RequestBooking(cmd) => self.bookings.request(cmd).await.map(Outcome::Booking),
            Command::AcceptBooking(cmd) => self.bookings.accept(cmd).await.map(Outcome::Booking),
            Command::RejectBooking(cmd) => self.bookings.reject(cmd).await.map(Outcome::Booking),
            Command::CancelBooking(cmd) => self.bookings.cancel(cmd).await.map(Outcome::Booking),
            Command::StartRide(cmd) => self.rides.start(cmd).await.map(Outcome::Ride),
            Command::CompleteRide(cmd) => self.rides.complete(cmd).await.map(Outcome::Ride),
            Command::CancelRide(cmd) => self.rides.cancel(cmd).await.map(Outcome::Ride),
        }
    }

    /// Committed wallets sorted by user id
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets = self.store.wallets();
        wallets.sort_by_key(|wallet| wallet.user);
        wallets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notifier::TracingSink;
    use crate::store::FixedClock;
    use crate::types::{
        AcceptBookingCommand, AccountStatus, BookingStatus, CreateRideCommand, DepositCommand,
        RequestBookingCommand, Route,
    };
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn marketplace() -> Marketplace {
        let clock = Arc::new(FixedClock::at_date(2030, 1, 1).unwrap());
        let store = Arc::new(Store::with_clock(clock));
        let (marketplace, _worker) = Marketplace::with_sink(store, Arc::new(TracingSink));
        marketplace
    }

    fn register(name: &str, user: UserId, driver: bool) -> Command {
        Command::RegisterUser(RegisterUserCommand {
            user,
            name: name.to_string(),
            driver,
        })
    }

    #[tokio::test]
    async fn test_register_user_twice() {
        let m = marketplace();
        let user = m.register_user(RegisterUserCommand {
            user: 1,
            name: "Ines".to_string(),
            driver: true,
        });
        assert!(user.unwrap().has_role(Role::Driver));

        let again = m.execute(register("Ines", 1, false)).await;
        assert!(matches!(again, Err(MarketplaceError::InvalidCommand { .. })));
    }

    #[tokio::test]
    async fn test_set_status_unknown_user() {
        let m = marketplace();
        let result = m.set_user_status(SetUserStatusCommand {
            user: 5,
            status: AccountStatus::Banned,
        });
        assert_eq!(result, Err(MarketplaceError::UserNotFound { user: 5 }));
    }

    #[tokio::test]
    async fn test_execute_full_booking_flow() {
        let m = marketplace();
        m.execute(register("driver", 1, true)).await.unwrap();
        m.execute(register("rider", 2, false)).await.unwrap();
        m.execute(Command::Deposit(DepositCommand {
            user: 2,
            amount: Decimal::new(100, 0),
        }))
        .await
        .unwrap();

        let departure = m.store().now() + Duration::days(1);
        let ride = match m
            .execute(Command::CreateRide(CreateRideCommand {
                driver: 1,
                route: Route::new("Oslo", "Bergen"),
                departure,
                seats: 2,
                price_per_seat: Decimal::new(25, 0),
            }))
            .await
            .unwrap()
        {
            Outcome::Ride(ride) => ride,
            other => panic!("expected a ride, got {:?}", other),
        };

        let booking = match m
            .execute(Command::RequestBooking(RequestBookingCommand {
                ride: ride.id,
                passenger: 2,
                seats: 2,
            }))
            .await
            .unwrap()
        {
            Outcome::Booking(booking) => booking,
            other => panic!("expected a booking, got {:?}", other),
        };

        let accepted = m
            .execute(Command::AcceptBooking(AcceptBookingCommand {
                booking: booking.id,
                acting_driver: 1,
            }))
            .await
            .unwrap();
        assert!(matches!(
            accepted,
            Outcome::Booking(Booking {
                status: BookingStatus::Approved,
                ..
            })
        ));

        let balances: Vec<(UserId, Decimal)> = m
            .wallets()
            .iter()
            .map(|wallet| (wallet.user, wallet.available))
            .collect();
        assert_eq!(
            balances,
            vec![(1, Decimal::new(50, 0)), (2, Decimal::new(50, 0))]
        );
    }

    #[tokio::test]
    async fn test_execute_validates_deposit() {
        let m = marketplace();
        m.execute(register("rider", 2, false)).await.unwrap();

        let result = m
            .execute(Command::Deposit(DepositCommand {
                user: 2,
                amount: Decimal::new(-1, 0),
            }))
            .await;
        assert!(matches!(result, Err(MarketplaceError::InvalidAmount { .. })));
    }
}
