//! CSV format handling for replay scripts and wallet output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `ScriptRecord` structure for deserialization
//! - Conversion from script records to typed [`Command`]s
//! - Wallet output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Script Format
//!
//! ```text
//! op,actor,ride,booking,seats,amount,departure,origin,destination
//! register,1,,,,,,,
//! deposit,2,,,,100.00,,,
//! publish,1,,,3,10.00,2099-01-01T08:00:00Z,Lyon,Grenoble
//! request,2,1,,2,,,,
//! accept,1,,1,,,,,
//! ```

use crate::types::{
    AcceptBookingCommand, AccountStatus, BookingId, CancelBookingCommand, Command,
    CreateRideCommand, DepositCommand, MarketplaceError, RegisterUserCommand,
    RejectBookingCommand, RequestBookingCommand, RideActionCommand, RideId, Route,
    SetUserStatusCommand, UserId, Wallet, WithdrawCommand,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// One line of a replay script
///
/// Only `op` and `actor` are always required; which other columns an op needs
/// is checked by [`convert_script_record`].
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct ScriptRecord {
    pub op: String,
    pub actor: UserId,
    pub ride: Option<RideId>,
    pub booking: Option<BookingId>,
    pub seats: Option<u32>,
    pub amount: Option<String>,
    pub departure: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
}

fn required<T>(value: Option<T>, column: &str, op: &str) -> Result<T, MarketplaceError> {
    value.ok_or_else(|| {
        MarketplaceError::invalid_command(format!("'{}' requires the {} column", op, column))
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn parse_amount(value: Option<String>, op: &str) -> Result<Decimal, MarketplaceError> {
    let raw = required(non_blank(value), "amount", op)?;
    Decimal::from_str(raw.trim()).map_err(|_| {
        MarketplaceError::invalid_command(format!("Invalid amount '{}' for '{}'", raw, op))
    })
}

fn parse_departure(value: Option<String>, op: &str) -> Result<DateTime<Utc>, MarketplaceError> {
    let raw = required(non_blank(value), "departure", op)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|departure| departure.with_timezone(&Utc))
        .map_err(|e| {
            MarketplaceError::invalid_command(format!("Invalid departure '{}': {}", raw, e))
        })
}

/// Convert a ScriptRecord to a typed Command
///
/// Op names are case insensitive. Columns an op does not use are ignored.
///
/// # Errors
///
/// * `MarketplaceError::InvalidCommand` for an unknown op, a missing column or
///   an unparsable amount or departure
pub fn convert_script_record(record: ScriptRecord) -> Result<Command, MarketplaceError> {
    let op = record.op.trim().to_lowercase();
    let actor = record.actor;

    let ride_action = |ride: Option<RideId>| -> Result<RideActionCommand, MarketplaceError> {
        Ok(RideActionCommand {
            ride: required(ride, "ride", &op)?,
            acting_driver: actor,
        })
    };

    let command = match op.as_str() {
        "register" => Command::RegisterUser(RegisterUserCommand {
            user: actor,
            name: format!("user-{}", actor),
            driver: false,
        }),
        "suspend" | "activate" | "ban" => Command::SetUserStatus(SetUserStatusCommand {
            user: actor,
            status: match op.as_str() {
                "suspend" => AccountStatus::Suspended,
                "ban" => AccountStatus::Banned,
                _ => AccountStatus::Active,
            },
        }),
        "deposit" => Command::Deposit(DepositCommand {
            user: actor,
            amount: parse_amount(record.amount, &op)?,
        }),
        "withdraw" => Command::Withdraw(WithdrawCommand {
            user: actor,
            amount: parse_amount(record.amount, &op)?,
        }),
        "publish" => Command::CreateRide(CreateRideCommand {
            driver: actor,
            route: Route::new(
                required(non_blank(record.origin), "origin", &op)?,
                required(non_blank(record.destination), "destination", &op)?,
            ),
            departure: parse_departure(record.departure, &op)?,
            seats: required(record.seats, "seats", &op)?,
            price_per_seat: parse_amount(record.amount, &op)?,
        }),
        "request" => Command::RequestBooking(RequestBookingCommand {
            ride: required(record.ride, "ride", &op)?,
            passenger: actor,
            seats: required(record.seats, "seats", &op)?,
        }),
        "accept" => Command::AcceptBooking(AcceptBookingCommand {
            booking: required(record.booking, "booking", &op)?,
            acting_driver: actor,
        }),
        "reject" => Command::RejectBooking(RejectBookingCommand {
            booking: required(record.booking, "booking", &op)?,
            acting_driver: actor,
        }),
        "cancel_booking" => Command::CancelBooking(CancelBookingCommand {
            booking: required(record.booking, "booking", &op)?,
            acting_passenger: actor,
        }),
        "start" => Command::StartRide(ride_action(record.ride)?),
        "complete" => Command::CompleteRide(ride_action(record.ride)?),
        "cancel_ride" => Command::CancelRide(ride_action(record.ride)?),
        _ => {
            return Err(MarketplaceError::invalid_command(format!(
                "Unknown op '{}' for user {}",
                record.op, actor
            )))
        }
    };
    Ok(command)
}

/// Write wallet balances to CSV format
///
/// Writes wallets in CSV format with columns: user, available, blocked, total.
/// Wallets are sorted by user ID for deterministic output and amounts are
/// printed with two decimal places.
///
/// # Errors
///
/// * `MarketplaceError::IoError` if a write error occurred
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), MarketplaceError> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);
    writer.write_record(["user", "available", "blocked", "total"])?;

    let mut sorted = wallets.to_vec();
    sorted.sort_by_key(|wallet| wallet.user);

    for wallet in sorted {
        writer.write_record(&[
            wallet.user.to_string(),
            format!("{:.2}", wallet.available),
            format!("{:.2}", wallet.blocked),
            format!("{:.2}", wallet.total()),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
