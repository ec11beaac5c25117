//! Identifier types shared by every marketplace entity

/// User identifier, assigned by the identity subsystem
pub type UserId = u32;

/// Ride identifier, assigned by the store on creation
pub type RideId = u32;

/// Booking identifier, assigned by the store on creation
pub type BookingId = u32;

/// Ledger entry identifier, assigned by the store on commit
pub type EntryId = u64;
