//! Typed commands accepted by the marketplace
//!
//! Every operation has its own command struct carrying exactly the fields it
//! needs. `validate` checks the shape of a command (positive counts, well-formed
//! amounts, non-blank strings) before it enters a unit of work; state-dependent
//! rules are checked by the workflow itself.

use super::error::MarketplaceError;
use super::ids::{BookingId, RideId, UserId};
use super::ride::Route;
use super::user::AccountStatus;
use super::wallet::{validate_amount, validate_price};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Register a user with the identity subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterUserCommand {
    pub user: UserId,
    pub name: String,
    /// Also grant the driver role
    pub driver: bool,
}

/// Change a user's moderation status
#[derive(Debug, Clone, PartialEq)]
pub struct SetUserStatusCommand {
    pub user: UserId,
    pub status: AccountStatus,
}

/// Add funds to a wallet
#[derive(Debug, Clone, PartialEq)]
pub struct DepositCommand {
    pub user: UserId,
    pub amount: Decimal,
}

impl DepositCommand {
    pub fn validate(&self) -> Result<(), MarketplaceError> {
        validate_amount(self.amount).map(|_| ())
    }
}

/// Take funds out of a wallet
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawCommand {
    pub user: UserId,
    pub amount: Decimal,
}

impl WithdrawCommand {
    pub fn validate(&self) -> Result<(), MarketplaceError> {
        validate_amount(self.amount).map(|_| ())
    }
}

/// Publish a ride
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRideCommand {
    pub driver: UserId,
    pub route: Route,
    pub departure: DateTime<Utc>,
    pub seats: u32,
    pub price_per_seat: Decimal,
}

impl CreateRideCommand {
    /// Check seat count, price and route
    ///
    /// The departure is checked against the engine clock by the ride
    /// inventory, not here.
    pub fn validate(&self) -> Result<(), MarketplaceError> {
        if self.seats == 0 {
            return Err(MarketplaceError::invalid_command(
                "a ride needs at least one seat",
            ));
        }
        validate_price(self.price_per_seat)?;
        if self.route.origin.trim().is_empty() || self.route.destination.trim().is_empty() {
            return Err(MarketplaceError::invalid_command(
                "origin and destination are required",
            ));
        }
        Ok(())
    }
}

/// Ask for seats on a ride
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBookingCommand {
    pub ride: RideId,
    pub passenger: UserId,
    pub seats: u32,
}

impl RequestBookingCommand {
    pub fn validate(&self) -> Result<(), MarketplaceError> {
        if self.seats == 0 {
            return Err(MarketplaceError::invalid_command(
                "at least one seat must be requested",
            ));
        }
        Ok(())
    }
}

/// Driver approves a pending booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptBookingCommand {
    pub booking: BookingId,
    pub acting_driver: UserId,
}

/// Driver declines a pending booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectBookingCommand {
    pub booking: BookingId,
    pub acting_driver: UserId,
}

/// Passenger withdraws a pending booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelBookingCommand {
    pub booking: BookingId,
    pub acting_passenger: UserId,
}

/// Driver action on one of their rides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RideActionCommand {
    pub ride: RideId,
    pub acting_driver: UserId,
}

/// Any command the marketplace can dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RegisterUser(RegisterUserCommand),
    SetUserStatus(SetUserStatusCommand),
    Deposit(DepositCommand),
    Withdraw(WithdrawCommand),
    CreateRide(CreateRideCommand),
    RequestBooking(RequestBookingCommand),
    AcceptBooking(AcceptBookingCommand),
    RejectBooking(RejectBookingCommand),
    CancelBooking(CancelBookingCommand),
    StartRide(RideActionCommand),
    CompleteRide(RideActionCommand),
    CancelRide(RideActionCommand),
}

impl Command {
    /// Short operation name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterUser(_) => "register",
            Command::SetUserStatus(_) => "set_status",
            Command::Deposit(_) => "deposit",
            Command::Withdraw(_) => "withdraw",
            Command::CreateRide(_) => "publish",
            Command::RequestBooking(_) => "request",
            Command::AcceptBooking(_) => "accept",
            Command::RejectBooking(_) => "reject",
            Command::CancelBooking(_) => "cancel_booking",
            Command::StartRide(_) => "start",
            Command::CompleteRide(_) => "complete",
            Command::CancelRide(_) => "cancel_ride",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn ride_command(seats: u32, price: Decimal, origin: &str) -> CreateRideCommand {
        CreateRideCommand {
            driver: 1,
            route: Route::new(origin, "Valparaiso"),
            departure: Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap(),
            seats,
            price_per_seat: price,
        }
    }

    #[rstest]
    #[case::valid(ride_command(3, Decimal::new(1000, 2), "Santiago"), true)]
    #[case::free_ride(ride_command(3, Decimal::ZERO, "Santiago"), true)]
    #[case::no_seats(ride_command(0, Decimal::new(1000, 2), "Santiago"), false)]
    #[case::negative_price(ride_command(3, Decimal::new(-1, 0), "Santiago"), false)]
    #[case::blank_origin(ride_command(3, Decimal::new(1000, 2), "  "), false)]
    fn test_create_ride_validation(#[case] command: CreateRideCommand, #[case] valid: bool) {
        assert_eq!(command.validate().is_ok(), valid);
    }

    #[test]
    fn test_request_needs_a_seat() {
        let command = RequestBookingCommand {
            ride: 1,
            passenger: 2,
            seats: 0,
        };
        assert!(matches!(
            command.validate(),
            Err(MarketplaceError::InvalidCommand { .. })
        ));
    }

    #[rstest]
    #[case(Decimal::new(5000, 2), true)]
    #[case(Decimal::ZERO, false)]
    #[case(Decimal::new(1, 3), false)]
    fn test_deposit_validation(#[case] amount: Decimal, #[case] valid: bool) {
        let command = DepositCommand { user: 1, amount };
        assert_eq!(command.validate().is_ok(), valid);
    }
}
