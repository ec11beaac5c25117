//! Ride inventory: seat capacity and ride lifecycle
//!
//! This module provides the `RideInventory` struct, which owns the ride rows.
//! Seat counts only change through [`RideInventory::reserve_seats`] and
//! [`RideInventory::release_seats`], both of which run inside the caller's
//! unit of work with the ride row locked.
//!
//! # Ride Lifecycle
//!
//! ```text
//! Open <──> Full ──> InProgress ──> Completed
//!   │         │
//!   └─────────┴──> Cancelled
//! ```
//!
//! `Open` and `Full` differ only in whether seats remain. Completing a ride
//! settles its approved bookings in the same unit of work; cancelling one
//! cancels its open bookings and refunds the approved ones.

use crate::core::booking_workflow::{cancel_for_ride, complete_for_ride};
use crate::core::notifier::{Notification, NotificationKind, Notifier};
use crate::core::wallet_ledger::WalletLedger;
use crate::store::{Store, UnitOfWork};
use crate::types::{
    CreateRideCommand, MarketplaceError, Ride, RideActionCommand, RideId, RideStatus, UserId,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Seat inventory and ride state transitions
#[derive(Clone)]
pub struct RideInventory {
    store: Arc<Store>,
    ledger: WalletLedger,
    notifier: Notifier,
}

impl RideInventory {
    pub fn new(store: Arc<Store>, ledger: WalletLedger, notifier: Notifier) -> Self {
        Self {
            store,
            ledger,
            notifier,
        }
    }

    /// Publish a new ride with every seat available
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidCommand` / `InvalidAmount` for a malformed command
    /// * `MarketplaceError::UserNotFound` / `AccountInactive` for the driver
    /// * `MarketplaceError::InvalidSchedule` if the departure is not in the future
    #[instrument(skip(self, cmd), fields(driver = cmd.driver))]
    pub async fn create(&self, cmd: CreateRideCommand) -> Result<Ride, MarketplaceError> {
        cmd.validate()?;
        self.store.active_user(cmd.driver)?;

        let now = self.store.now();
        if cmd.departure <= now {
            return Err(MarketplaceError::InvalidSchedule {
                departure: cmd.departure,
                now,
            });
        }

        let mut uow = self.store.begin();
        let created_at = uow.now();
        let ride = uow.insert_ride(|id| Ride {
            id,
            driver: cmd.driver,
            route: cmd.route,
            departure: cmd.departure,
            total_seats: cmd.seats,
            available_seats: cmd.seats,
            price_per_seat: cmd.price_per_seat,
            status: RideStatus::Open,
            created_at,
        });
        uow.commit();

        info!(ride = ride.id, seats = ride.total_seats, "ride created");
        Ok(ride)
    }

    /// Take `count` seats from a ride
    ///
    /// Locks the ride row if the unit of work does not hold it yet. Flips the
    /// ride to `Full` when the last seat goes.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::RideNotFound` if the ride does not exist
    /// * `MarketplaceError::InvalidTransition` unless the ride is `Open` or `Full`
    /// * `MarketplaceError::NotEnoughSeats` if fewer than `count` seats are free
    pub async fn reserve_seats(
        &self,
        uow: &mut UnitOfWork<'_>,
        ride: RideId,
        count: u32,
    ) -> Result<Ride, MarketplaceError> {
        if count == 0 {
            return Err(MarketplaceError::invalid_command(
                "cannot reserve zero seats",
            ));
        }
        let mut row = uow.lock_ride(ride).await?;

        if !row.status.accepts_bookings() {
            return Err(MarketplaceError::ride_transition(
                ride,
                row.status,
                "reserve seats on",
            ));
        }
        if row.available_seats < count {
            return Err(MarketplaceError::not_enough_seats(
                ride,
                row.available_seats,
                count,
            ));
        }

        row.available_seats -= count;
        if row.available_seats == 0 {
            row.status = RideStatus::Full;
        }
        uow.stage_ride(row.clone())?;
        Ok(row)
    }

    /// Give `count` seats back to a ride, reopening it if it was full
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::RideNotFound` if the ride does not exist
    /// * `MarketplaceError::InvalidTransition` unless the ride is `Open` or `Full`
    /// * `MarketplaceError::InvalidCommand` if the ride would exceed its capacity
    pub async fn release_seats(
        &self,
        uow: &mut UnitOfWork<'_>,
        ride: RideId,
        count: u32,
    ) -> Result<Ride, MarketplaceError> {
        let mut row = uow.lock_ride(ride).await?;

        if !row.status.accepts_bookings() {
            return Err(MarketplaceError::ride_transition(
                ride,
                row.status,
                "release seats on",
            ));
        }
        let available = row
            .available_seats
            .checked_add(count)
            .filter(|seats| *seats <= row.total_seats)
            .ok_or_else(|| {
                MarketplaceError::invalid_command(format!(
                    "releasing {} seats would exceed the {} seats of ride {}",
                    count, row.total_seats, ride
                ))
            })?;

        row.available_seats = available;
        if row.status == RideStatus::Full && available > 0 {
            row.status = RideStatus::Open;
        }
        uow.stage_ride(row.clone())?;
        Ok(row)
    }

    /// Lock a ride and check the acting driver owns it
    async fn lock_owned(
        &self,
        uow: &mut UnitOfWork<'_>,
        cmd: RideActionCommand,
        action: &str,
    ) -> Result<Ride, MarketplaceError> {
        let ride = uow.lock_ride(cmd.ride).await?;
        if ride.driver != cmd.acting_driver {
            return Err(MarketplaceError::unauthorized(
                cmd.acting_driver,
                format!("{} ride {}", action, cmd.ride),
            ));
        }
        Ok(ride)
    }

    /// Driver sets off; pending requests stay pending
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::Unauthorized` if the caller does not own the ride
    /// * `MarketplaceError::InvalidTransition` unless the ride is `Open` or `Full`
    #[instrument(skip(self), fields(ride = cmd.ride, driver = cmd.acting_driver))]
    pub async fn start(&self, cmd: RideActionCommand) -> Result<Ride, MarketplaceError> {
        self.store.active_user(cmd.acting_driver)?;

        let mut uow = self.store.begin();
        let mut ride = self.lock_owned(&mut uow, cmd, "start").await?;
        if !ride.status.accepts_bookings() {
            return Err(MarketplaceError::ride_transition(
                ride.id,
                ride.status,
                "start",
            ));
        }

        ride.status = RideStatus::InProgress;
        uow.stage_ride(ride.clone())?;
        uow.commit();

        info!("ride started");
        Ok(ride)
    }

    /// Finish a ride and complete its approved bookings in one unit of work
    ///
    /// A second call fails with `InvalidTransition`, so bookings are never
    /// settled twice.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::Unauthorized` if the caller does not own the ride
    /// * `MarketplaceError::InvalidTransition` unless the ride is `InProgress`
    #[instrument(skip(self), fields(ride = cmd.ride, driver = cmd.acting_driver))]
    pub async fn complete(&self, cmd: RideActionCommand) -> Result<Ride, MarketplaceError> {
        self.store.active_user(cmd.acting_driver)?;

        let mut uow = self.store.begin();
        let mut ride = self.lock_owned(&mut uow, cmd, "complete").await?;
        if ride.status != RideStatus::InProgress {
            return Err(MarketplaceError::ride_transition(
                ride.id,
                ride.status,
                "complete",
            ));
        }

        ride.status = RideStatus::Completed;
        uow.stage_ride(ride.clone())?;
        let completed = complete_for_ride(&mut uow, ride.id).await?;
        uow.commit();

        info!(bookings = completed.len(), "ride completed");
        self.notifier.publish_all(completed.iter().map(|booking| {
            Notification::new(
                NotificationKind::RideCompleted,
                booking.passenger,
                ride.id,
                Some(booking.id),
                format!("Ride {} has been completed", ride.id),
            )
        }));
        Ok(ride)
    }

    /// Cancel a ride that has not started
    ///
    /// Pending bookings are cancelled; approved bookings are cancelled and
    /// their payment is refunded by the driver. If any refund cannot be
    /// covered nothing changes.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::Unauthorized` if the caller does not own the ride
    /// * `MarketplaceError::InvalidTransition` unless the ride is `Open` or `Full`
    /// * `MarketplaceError::InsufficientFunds` if the driver cannot cover a refund
    #[instrument(skip(self), fields(ride = cmd.ride, driver = cmd.acting_driver))]
    pub async fn cancel(&self, cmd: RideActionCommand) -> Result<Ride, MarketplaceError> {
        let mut uow = self.store.begin();
        let mut ride = self.lock_owned(&mut uow, cmd, "cancel").await?;
        if !ride.status.accepts_bookings() {
            return Err(MarketplaceError::ride_transition(
                ride.id,
                ride.status,
                "cancel",
            ));
        }

        ride.status = RideStatus::Cancelled;
        uow.stage_ride(ride.clone())?;
        let cancelled = cancel_for_ride(&self.ledger, &mut uow, &ride).await?;
        uow.commit();

        info!(bookings = cancelled.len(), "ride cancelled");
        self.notifier.publish_all(cancelled.iter().map(|booking| {
            Notification::new(
                NotificationKind::RideCancelled,
                booking.passenger,
                ride.id,
                Some(booking.id),
                format!("Ride {} has been cancelled by the driver", ride.id),
            )
        }));
        Ok(ride)
    }

    /// # Errors
    ///
    /// * `MarketplaceError::RideNotFound` if the ride does not exist
    pub fn get(&self, ride: RideId) -> Result<Ride, MarketplaceError> {
        self.store
            .ride(ride)
            .ok_or(MarketplaceError::RideNotFound { ride })
    }

    /// Rides still taking requests with free seats, earliest departure first
    pub fn list_open(&self) -> Vec<Ride> {
        let mut rides = self.store.rides_where(|ride| ride.status == RideStatus::Open);
        rides.sort_by_key(|ride| (ride.departure, ride.id));
        rides
    }

    /// Every ride of a driver, earliest departure first
    pub fn list_by_driver(&self, driver: UserId) -> Vec<Ride> {
        let mut rides = self.store.rides_where(|ride| ride.driver == driver);
        rides.sort_by_key(|ride| (ride.departure, ride.id));
        rides
    }
}
