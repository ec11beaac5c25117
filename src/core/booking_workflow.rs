//! Booking workflow: the request → accept/reject → complete state machine
//!
//! This module provides the `BookingWorkflow` struct, which coordinates the
//! wallet ledger and the ride inventory for every booking transition. Each
//! transition runs in a unit of work of its own and either commits every
//! change (booking, seats, wallets, ledger entries) or none of them.
//!
//! # State Machine
//!
//! ```text
//! PendingApproval ──accept──> Approved ──ride complete──> Completed
//!        │                        │
//!        ├──reject──> Rejected    └──ride cancel──> Cancelled (refunded)
//!        └──cancel / ride cancel──> Cancelled
//! ```
//!
//! # Funds Timing
//!
//! Requesting a seat neither blocks funds nor takes seats. Acceptance reserves
//! the seats, blocks the passenger's funds and captures them to the driver in
//! one unit of work, so a passenger who cannot pay leaves the booking pending
//! and the ride untouched.
//!
//! # Lock Order
//!
//! Transitions read a booking snapshot without locking to learn its ride,
//! then lock the ride, then the booking (re-reading it), then wallets in
//! ascending user id.

use crate::core::notifier::{Notification, NotificationKind, Notifier};
use crate::core::ride_inventory::RideInventory;
use crate::core::wallet_ledger::WalletLedger;
use crate::store::{Store, UnitOfWork};
use crate::types::{
    AcceptBookingCommand, Booking, BookingId, BookingStatus, CancelBookingCommand,
    MarketplaceError, RejectBookingCommand, RequestBookingCommand, Ride, RideId, UserId,
};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Booking state transitions over the shared store
#[derive(Clone)]
pub struct BookingWorkflow {
    store: Arc<Store>,
    ledger: WalletLedger,
    rides: RideInventory,
    notifier: Notifier,
}

impl BookingWorkflow {
    pub fn new(
        store: Arc<Store>,
        ledger: WalletLedger,
        rides: RideInventory,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            ledger,
            rides,
            notifier,
        }
    }

    /// Ask for seats on a ride
    ///
    /// The booking is created `PendingApproval` with its price frozen. Seats
    /// are checked here only to turn away requests that cannot fit; the
    /// authoritative check happens on acceptance.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidCommand` if no seats are requested
    /// * `MarketplaceError::UserNotFound` / `AccountInactive` for the passenger
    /// * `MarketplaceError::RideNotFound` if the ride does not exist
    /// * `MarketplaceError::SelfBookingForbidden` if the passenger drives the ride
    /// * `MarketplaceError::InvalidTransition` unless the ride is `Open` or `Full`
    /// * `MarketplaceError::NotEnoughSeats` if the ride has fewer free seats
    #[instrument(skip(self), fields(ride = cmd.ride, passenger = cmd.passenger))]
    pub async fn request(&self, cmd: RequestBookingCommand) -> Result<Booking, MarketplaceError> {
        cmd.validate()?;
        self.store.active_user(cmd.passenger)?;

        let mut uow = self.store.begin();
        let ride = uow.lock_ride(cmd.ride).await?;

        if ride.driver == cmd.passenger {
            return Err(MarketplaceError::SelfBookingForbidden {
                ride: ride.id,
                user: cmd.passenger,
            });
        }
        if !ride.status.accepts_bookings() {
            return Err(MarketplaceError::ride_transition(
                ride.id,
                ride.status,
                "request seats on",
            ));
        }
        if ride.available_seats < cmd.seats {
            return Err(MarketplaceError::not_enough_seats(
                ride.id,
                ride.available_seats,
                cmd.seats,
            ));
        }

        let total_price = ride
            .price_per_seat
            .checked_mul(Decimal::from(cmd.seats))
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("price", cmd.passenger))?;

        let now = uow.now();
        let booking = uow.insert_booking(|id| Booking {
            id,
            ride: ride.id,
            passenger: cmd.passenger,
            seats: cmd.seats,
            total_price,
            status: BookingStatus::PendingApproval,
            created_at: now,
            updated_at: now,
        });
        uow.commit();

        info!(booking = booking.id, %total_price, "booking requested");
        self.notifier.publish(Notification::new(
            NotificationKind::BookingRequested,
            ride.driver,
            ride.id,
            Some(booking.id),
            format!(
                "Passenger {} requested {} seat(s) on ride {}",
                booking.passenger, booking.seats, ride.id
            ),
        ));
        Ok(booking)
    }

    /// Lock the ride and the booking of a driver decision
    ///
    /// Returns both rows after checking the acting driver owns the ride, is
    /// active, and the booking is still pending.
    async fn load_for_driver(
        &self,
        uow: &mut UnitOfWork<'_>,
        booking: BookingId,
        acting_driver: UserId,
        action: &str,
    ) -> Result<(Ride, Booking), MarketplaceError> {
        let snapshot = self
            .store
            .booking(booking)
            .ok_or(MarketplaceError::BookingNotFound { booking })?;

        let ride = uow.lock_ride(snapshot.ride).await?;
        let booking = uow.lock_booking(booking).await?;

        if ride.driver != acting_driver {
            return Err(MarketplaceError::unauthorized(
                acting_driver,
                format!("{} booking {}", action, booking.id),
            ));
        }
        self.store.active_user(acting_driver)?;
        if booking.status != BookingStatus::PendingApproval {
            return Err(MarketplaceError::booking_transition(
                booking.id,
                booking.status,
                action,
            ));
        }
        Ok((ride, booking))
    }

    /// Driver approves a pending booking and gets paid
    ///
    /// Reserves the seats, then blocks and captures the passenger's funds. Any
    /// failure leaves the booking pending with seats and wallets unchanged.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::BookingNotFound` if the booking does not exist
    /// * `MarketplaceError::Unauthorized` if the caller does not drive the ride
    /// * `MarketplaceError::InvalidTransition` if the booking is not pending or
    ///   the ride no longer takes bookings
    /// * `MarketplaceError::NotEnoughSeats` if the seats are gone
    /// * `MarketplaceError::InsufficientFunds` if the passenger cannot pay
    #[instrument(skip(self), fields(booking = cmd.booking, driver = cmd.acting_driver))]
    pub async fn accept(&self, cmd: AcceptBookingCommand) -> Result<Booking, MarketplaceError> {
        let mut uow = self.store.begin();
        let (ride, mut booking) = self
            .load_for_driver(&mut uow, cmd.booking, cmd.acting_driver, "accept")
            .await?;

        self.rides
            .reserve_seats(&mut uow, ride.id, booking.seats)
            .await?;

        if booking.total_price > Decimal::ZERO {
            let description = format!("Booking {} on ride {}", booking.id, ride.id);
            uow.lock_wallets(&[booking.passenger, ride.driver]).await;
            self.ledger.get_or_create(&mut uow, booking.passenger).await?;
            self.ledger.get_or_create(&mut uow, ride.driver).await?;
            self.ledger
                .block_funds(&mut uow, booking.passenger, booking.total_price, &description)
                .await?;
            self.ledger
                .capture_funds(
                    &mut uow,
                    booking.passenger,
                    ride.driver,
                    booking.total_price,
                    &description,
                )
                .await?;
        }

        booking.status = BookingStatus::Approved;
        booking.updated_at = uow.now();
        uow.stage_booking(booking.clone())?;
        uow.commit();

        info!(total_price = %booking.total_price, "booking approved");
        self.notifier.publish(Notification::new(
            NotificationKind::BookingApproved,
            booking.passenger,
            ride.id,
            Some(booking.id),
            format!("Your booking on ride {} was approved", ride.id),
        ));
        Ok(booking)
    }

    /// Driver declines a pending booking
    ///
    /// Nothing was reserved at request time, so nothing is returned.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::BookingNotFound` if the booking does not exist
    /// * `MarketplaceError::Unauthorized` if the caller does not drive the ride
    /// * `MarketplaceError::InvalidTransition` if the booking is not pending
    #[instrument(skip(self), fields(booking = cmd.booking, driver = cmd.acting_driver))]
    pub async fn reject(&self, cmd: RejectBookingCommand) -> Result<Booking, MarketplaceError> {
        let mut uow = self.store.begin();
        let (ride, mut booking) = self
            .load_for_driver(&mut uow, cmd.booking, cmd.acting_driver, "reject")
            .await?;

        booking.status = BookingStatus::Rejected;
        booking.updated_at = uow.now();
        uow.stage_booking(booking.clone())?;
        uow.commit();

        info!("booking rejected");
        self.notifier.publish(Notification::new(
            NotificationKind::BookingRejected,
            booking.passenger,
            ride.id,
            Some(booking.id),
            format!("Your booking on ride {} was rejected", ride.id),
        ));
        Ok(booking)
    }

    /// Passenger withdraws a booking that is still pending
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::BookingNotFound` if the booking does not exist
    /// * `MarketplaceError::Unauthorized` if the caller is not the passenger
    /// * `MarketplaceError::InvalidTransition` if the booking is not pending
    #[instrument(skip(self), fields(booking = cmd.booking, passenger = cmd.acting_passenger))]
    pub async fn cancel(&self, cmd: CancelBookingCommand) -> Result<Booking, MarketplaceError> {
        let snapshot = self.get(cmd.booking)?;

        let mut uow = self.store.begin();
        let ride = uow.lock_ride(snapshot.ride).await?;
        let mut booking = uow.lock_booking(cmd.booking).await?;

        if booking.passenger != cmd.acting_passenger {
            return Err(MarketplaceError::unauthorized(
                cmd.acting_passenger,
                format!("cancel booking {}", booking.id),
            ));
        }
        if booking.status != BookingStatus::PendingApproval {
            return Err(MarketplaceError::booking_transition(
                booking.id,
                booking.status,
                "cancel",
            ));
        }

        booking.status = BookingStatus::Cancelled;
        booking.updated_at = uow.now();
        uow.stage_booking(booking.clone())?;
        uow.commit();

        info!("booking cancelled by passenger");
        self.notifier.publish(Notification::new(
            NotificationKind::BookingCancelled,
            ride.driver,
            ride.id,
            Some(booking.id),
            format!(
                "Passenger {} cancelled their request on ride {}",
                booking.passenger, ride.id
            ),
        ));
        Ok(booking)
    }

    /// Complete every approved booking of a ride inside the caller's unit of work
    pub async fn complete_for_ride(
        &self,
        uow: &mut UnitOfWork<'_>,
        ride: RideId,
    ) -> Result<Vec<Booking>, MarketplaceError> {
        complete_for_ride(uow, ride).await
    }

    /// Cancel every open booking of a ride inside the caller's unit of work
    pub async fn cancel_for_ride(
        &self,
        uow: &mut UnitOfWork<'_>,
        ride: &Ride,
    ) -> Result<Vec<Booking>, MarketplaceError> {
        cancel_for_ride(&self.ledger, uow, ride).await
    }

    /// # Errors
    ///
    /// * `MarketplaceError::BookingNotFound` if the booking does not exist
    pub fn get(&self, booking: BookingId) -> Result<Booking, MarketplaceError> {
        self.store
            .booking(booking)
            .ok_or(MarketplaceError::BookingNotFound { booking })
    }

    /// Bookings made by a passenger, newest first
    pub fn list_for_passenger(&self, passenger: UserId) -> Vec<Booking> {
        newest_first(
            self.store
                .bookings_where(|booking| booking.passenger == passenger),
        )
    }

    /// Bookings on any ride the driver owns, newest first
    pub fn list_for_driver(&self, driver: UserId) -> Vec<Booking> {
        let rides: HashSet<RideId> = self
            .store
            .rides_where(|ride| ride.driver == driver)
            .into_iter()
            .map(|ride| ride.id)
            .collect();
        newest_first(
            self.store
                .bookings_where(|booking| rides.contains(&booking.ride)),
        )
    }
}

fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    bookings
}

/// Move every `Approved` booking of `ride` to `Completed`
///
/// The caller must hold the ride lock. Bookings that are already completed
/// are filtered out, so running it twice changes nothing the second time.
pub async fn complete_for_ride(
    uow: &mut UnitOfWork<'_>,
    ride: RideId,
) -> Result<Vec<Booking>, MarketplaceError> {
    let approved =
        uow.booking_ids_for_ride(ride, |booking| booking.status == BookingStatus::Approved);

    let mut completed = Vec::with_capacity(approved.len());
    for id in approved {
        let mut booking = uow.lock_booking(id).await?;
        booking.status = BookingStatus::Completed;
        booking.updated_at = uow.now();
        uow.stage_booking(booking.clone())?;
        completed.push(booking);
    }
    Ok(completed)
}

/// Cancel every pending or approved booking of `ride`, refunding approved ones
///
/// The caller must hold the ride lock. All booking rows are locked before any
/// wallet so the lock order holds. Refunds are paid by the driver.
pub async fn cancel_for_ride(
    ledger: &WalletLedger,
    uow: &mut UnitOfWork<'_>,
    ride: &Ride,
) -> Result<Vec<Booking>, MarketplaceError> {
    let open = uow.booking_ids_for_ride(ride.id, |booking| {
        matches!(
            booking.status,
            BookingStatus::PendingApproval | BookingStatus::Approved
        )
    });

    let mut bookings = Vec::with_capacity(open.len());
    for id in open {
        bookings.push(uow.lock_booking(id).await?);
    }

    let mut payers: Vec<UserId> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Approved && b.total_price > Decimal::ZERO)
        .map(|b| b.passenger)
        .collect();
    if !payers.is_empty() {
        payers.push(ride.driver);
        uow.lock_wallets(&payers).await;
    }

    let now = uow.now();
    for booking in &mut bookings {
        if booking.status == BookingStatus::Approved && booking.total_price > Decimal::ZERO {
            ledger
                .refund_payment(
                    uow,
                    ride.driver,
                    booking.passenger,
                    booking.total_price,
                    &format!("Refund of booking {} on cancelled ride {}", booking.id, ride.id),
                )
                .await?;
        }
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = now;
        uow.stage_booking(booking.clone())?;
    }
    Ok(bookings)
}
