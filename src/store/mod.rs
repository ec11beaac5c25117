//! In-memory relational store with transactional units of work
//!
//! The store holds the marketplace's persisted state: users, wallets, rides,
//! bookings and the append-only ledger. Wallets, rides and bookings are
//! [`Table`]s with pessimistic row locks; all of their mutations go through a
//! [`UnitOfWork`] obtained from [`Store::begin`].
//!
//! # Architecture
//!
//! ```text
//! Store
//!     ├── users    DashMap<UserId, User>        (identity subsystem, not transactional)
//!     ├── wallets  Table<UserId, Wallet>        (row-locked)
//!     ├── rides    Table<RideId, Ride>          (row-locked)
//!     ├── bookings Table<BookingId, Booking>    (row-locked)
//!     └── ledger   DashMap<EntryId, LedgerEntry> (append-only, written on commit)
//! ```
//!
//! # Visibility
//!
//! Committed rows are published one at a time on commit. A reader outside any
//! unit of work always sees committed row values, but may observe a commit
//! that is halfway published across rows.

pub mod clock;
pub mod table;
pub mod unit_of_work;

pub use clock::FixedClock;
pub use table::Table;
pub use unit_of_work::{RowKey, UnitOfWork};

use crate::types::{
    AccountStatus, BookingId, EntryId, LedgerEntry, MarketplaceError, RideId, User, UserId,
};
use crate::types::{Booking, Ride, Wallet};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mockable::{Clock, DefaultClock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Marketplace state shared by every component
pub struct Store {
    clock: SharedClock,

    users: DashMap<UserId, User>,
    pub(crate) wallets: Table<UserId, Wallet>,
    pub(crate) rides: Table<RideId, Ride>,
    pub(crate) bookings: Table<BookingId, Booking>,
    pub(crate) ledger: DashMap<EntryId, LedgerEntry>,

    ride_seq: AtomicU32,
    booking_seq: AtomicU32,
    entry_seq: AtomicU64,
    uow_seq: AtomicU64,
}

impl Store {
    /// Create an empty store using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Create an empty store using the given clock
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            clock,
            users: DashMap::new(),
            wallets: Table::new(),
            rides: Table::new(),
            bookings: Table::new(),
            ledger: DashMap::new(),
            ride_seq: AtomicU32::new(0),
            booking_seq: AtomicU32::new(0),
            entry_seq: AtomicU64::new(0),
            uow_seq: AtomicU64::new(0),
        }
    }

    /// Current time according to the store clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// Begin a unit of work
    pub fn begin(&self) -> UnitOfWork<'_> {
        let id = self.uow_seq.fetch_add(1, Ordering::Relaxed) + 1;
        UnitOfWork::new(self, id, self.now())
    }

    pub(crate) fn next_ride_id(&self) -> RideId {
        self.ride_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn next_booking_id(&self) -> BookingId {
        self.booking_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn next_entry_id(&self) -> EntryId {
        self.entry_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ---------------------------------------------------------------------
    // Identity contract
    // ---------------------------------------------------------------------

    /// Insert or replace a user record
    pub fn put_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|user| user.value().clone())
    }

    /// Change a user's account status
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user is unknown
    pub fn set_user_status(
        &self,
        id: UserId,
        status: AccountStatus,
    ) -> Result<User, MarketplaceError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(MarketplaceError::UserNotFound { user: id })?;
        user.status = status;
        Ok(user.value().clone())
    }

    /// Look up a user and require an active account
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user is unknown
    /// * `MarketplaceError::AccountInactive` if the account is suspended or banned
    pub fn active_user(&self, id: UserId) -> Result<User, MarketplaceError> {
        let user = self
            .user(id)
            .ok_or(MarketplaceError::UserNotFound { user: id })?;
        if !user.is_active() {
            return Err(MarketplaceError::AccountInactive {
                user: id,
                status: user.status,
            });
        }
        Ok(user)
    }

    // ---------------------------------------------------------------------
    // Committed reads
    // ---------------------------------------------------------------------

    pub fn wallet(&self, user: UserId) -> Option<Wallet> {
        self.wallets.get(&user)
    }

    pub fn wallets(&self) -> Vec<Wallet> {
        self.wallets.scan(|_| true)
    }

    pub fn ride(&self, id: RideId) -> Option<Ride> {
        self.rides.get(&id)
    }

    pub fn rides_where<F>(&self, predicate: F) -> Vec<Ride>
    where
        F: Fn(&Ride) -> bool,
    {
        self.rides.scan(predicate)
    }

    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.bookings.get(&id)
    }

    pub fn bookings_where<F>(&self, predicate: F) -> Vec<Booking>
    where
        F: Fn(&Booking) -> bool,
    {
        self.bookings.scan(predicate)
    }

    /// Committed ledger entries matching the predicate, oldest first
    pub fn entries_where<F>(&self, predicate: F) -> Vec<LedgerEntry>
    where
        F: Fn(&LedgerEntry) -> bool,
    {
        let mut entries: Vec<LedgerEntry> = self
            .ledger
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
