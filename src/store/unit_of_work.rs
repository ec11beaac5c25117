//! Unit of work: staged writes, row locks, commit and rollback
//!
//! A [`UnitOfWork`] is the explicit transaction handle passed to every wallet,
//! ride and booking mutation. It provides:
//!
//! - **Pessimistic row locks**: `lock_*` waits for the row's async mutex and
//!   keeps the owned guard until the unit of work ends. Locking a row twice in
//!   the same unit of work is a no-op.
//! - **Isolation**: mutations are staged privately. Reads through the unit of
//!   work see its own staged rows; everybody else sees committed rows only.
//! - **Atomicity**: [`UnitOfWork::commit`] publishes every staged row and
//!   ledger entry, then releases the locks. Dropping an uncommitted unit of
//!   work (or calling [`UnitOfWork::rollback`]) discards everything staged.
//!
//! # Lock Hierarchy
//!
//! Every transition acquires locks in the order
//! `ride -> booking(s) -> wallets (ascending user id)`.
//! Holding to this order is what keeps concurrent transitions deadlock free.

use crate::store::Store;
use crate::types::{
    Booking, BookingId, EntryKind, LedgerEntry, MarketplaceError, Ride, RideId, UserId, Wallet,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Identifies one lockable row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    Ride(RideId),
    Booking(BookingId),
    Wallet(UserId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Ride(id) => write!(f, "ride:{}", id),
            RowKey::Booking(id) => write!(f, "booking:{}", id),
            RowKey::Wallet(id) => write!(f, "wallet:{}", id),
        }
    }
}

/// Ledger entry staged inside a unit of work, numbered on commit
#[derive(Debug, Clone)]
struct PendingEntry {
    user: UserId,
    kind: EntryKind,
    amount: Decimal,
    description: String,
}

/// Explicit transaction handle over a [`Store`]
pub struct UnitOfWork<'s> {
    store: &'s Store,

    /// Sequence number, only used for log correlation
    id: u64,

    /// Transaction timestamp; every row written by this unit of work uses it
    started_at: DateTime<Utc>,

    /// Row locks held until the unit of work ends
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,

    /// Rows created by this unit of work; they need no lock to be staged
    inserted: HashSet<RowKey>,

    wallets: HashMap<UserId, Wallet>,
    rides: HashMap<RideId, Ride>,
    bookings: HashMap<BookingId, Booking>,
    entries: Vec<PendingEntry>,

    finished: bool,
}

impl<'s> UnitOfWork<'s> {
    pub(crate) fn new(store: &'s Store, id: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            store,
            id,
            started_at,
            guards: HashMap::new(),
            inserted: HashSet::new(),
            wallets: HashMap::new(),
            rides: HashMap::new(),
            bookings: HashMap::new(),
            entries: Vec::new(),
            finished: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Transaction timestamp
    pub fn now(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The store this unit of work runs against
    pub fn store(&self) -> &'s Store {
        self.store
    }

    /// Whether the unit of work currently holds the lock on `key`
    pub fn holds(&self, key: RowKey) -> bool {
        self.guards.contains_key(&key)
    }

    async fn acquire(&mut self, key: RowKey) {
        if self.guards.contains_key(&key) {
            return;
        }

        let handle = match key {
            RowKey::Ride(id) => self.store.rides.lock_handle(id),
            RowKey::Booking(id) => self.store.bookings.lock_handle(id),
            RowKey::Wallet(id) => self.store.wallets.lock_handle(id),
        };

        debug!(uow = self.id, row = %key, "acquiring row lock");
        let guard = handle.lock_owned().await;
        self.guards.insert(key, guard);
    }

    // ---------------------------------------------------------------------
    // Locked reads
    // ---------------------------------------------------------------------

    /// Lock a ride row and return its current value
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::RideNotFound` if no such ride exists. The lock is
    ///   still held until the unit of work ends.
    pub async fn lock_ride(&mut self, id: RideId) -> Result<Ride, MarketplaceError> {
        self.acquire(RowKey::Ride(id)).await;
        self.ride(id)
            .ok_or(MarketplaceError::RideNotFound { ride: id })
    }

    /// Lock a booking row and return its current value
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::BookingNotFound` if no such booking exists
    pub async fn lock_booking(&mut self, id: BookingId) -> Result<Booking, MarketplaceError> {
        self.acquire(RowKey::Booking(id)).await;
        self.booking(id)
            .ok_or(MarketplaceError::BookingNotFound { booking: id })
    }

    /// Lock a wallet row and return its current value, `None` if the user has
    /// no wallet yet
    ///
    /// The lock is taken even when the wallet does not exist, so a caller can
    /// create it without racing another unit of work.
    pub async fn lock_wallet(&mut self, user: UserId) -> Option<Wallet> {
        self.acquire(RowKey::Wallet(user)).await;
        self.wallet(user)
    }

    /// Lock several wallets in ascending user-id order
    pub async fn lock_wallets(&mut self, users: &[UserId]) {
        let mut ordered = users.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        for user in ordered {
            self.acquire(RowKey::Wallet(user)).await;
        }
    }

    // ---------------------------------------------------------------------
    // Unlocked reads (own staged rows first, then committed rows)
    // ---------------------------------------------------------------------

    pub fn ride(&self, id: RideId) -> Option<Ride> {
        self.rides
            .get(&id)
            .cloned()
            .or_else(|| self.store.rides.get(&id))
    }

    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.bookings
            .get(&id)
            .cloned()
            .or_else(|| self.store.bookings.get(&id))
    }

    pub fn wallet(&self, user: UserId) -> Option<Wallet> {
        self.wallets
            .get(&user)
            .cloned()
            .or_else(|| self.store.wallets.get(&user))
    }

    /// Ids of bookings on a ride whose status matches, as seen by this unit of work
    ///
    /// Callers hold the ride lock, which every booking transition on the ride
    /// also takes, so the set cannot change underneath them.
    pub fn booking_ids_for_ride<F>(&self, ride: RideId, predicate: F) -> Vec<BookingId>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut ids: Vec<BookingId> = self
            .store
            .bookings
            .scan(|booking| booking.ride == ride)
            .into_iter()
            .map(|booking| booking.id)
            .chain(
                self.bookings
                    .values()
                    .filter(|booking| booking.ride == ride)
                    .map(|booking| booking.id),
            )
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids.retain(|id| self.booking(*id).is_some_and(|booking| predicate(&booking)));
        ids
    }

    // ---------------------------------------------------------------------
    // Staged writes
    // ---------------------------------------------------------------------

    fn check_writable(&self, key: RowKey) -> Result<(), MarketplaceError> {
        if self.guards.contains_key(&key) || self.inserted.contains(&key) {
            Ok(())
        } else {
            Err(MarketplaceError::storage(format!(
                "unit of work {} wrote {} without locking it",
                self.id, key
            )))
        }
    }

    pub fn stage_ride(&mut self, ride: Ride) -> Result<(), MarketplaceError> {
        self.check_writable(RowKey::Ride(ride.id))?;
        self.rides.insert(ride.id, ride);
        Ok(())
    }

    pub fn stage_booking(&mut self, booking: Booking) -> Result<(), MarketplaceError> {
        self.check_writable(RowKey::Booking(booking.id))?;
        self.bookings.insert(booking.id, booking);
        Ok(())
    }

    pub fn stage_wallet(&mut self, wallet: Wallet) -> Result<(), MarketplaceError> {
        self.check_writable(RowKey::Wallet(wallet.user))?;
        self.wallets.insert(wallet.user, wallet);
        Ok(())
    }

    /// Stage a new ride under a freshly allocated id
    pub fn insert_ride<F>(&mut self, build: F) -> Ride
    where
        F: FnOnce(RideId) -> Ride,
    {
        let ride = build(self.store.next_ride_id());
        self.inserted.insert(RowKey::Ride(ride.id));
        self.rides.insert(ride.id, ride.clone());
        ride
    }

    /// Stage a new booking under a freshly allocated id
    pub fn insert_booking<F>(&mut self, build: F) -> Booking
    where
        F: FnOnce(BookingId) -> Booking,
    {
        let booking = build(self.store.next_booking_id());
        self.inserted.insert(RowKey::Booking(booking.id));
        self.bookings.insert(booking.id, booking.clone());
        booking
    }

    /// Stage a ledger entry; it becomes visible only if the unit of work commits
    pub fn append_entry(
        &mut self,
        user: UserId,
        kind: EntryKind,
        amount: Decimal,
        description: impl Into<String>,
    ) {
        self.entries.push(PendingEntry {
            user,
            kind,
            amount,
            description: description.into(),
        });
    }

    /// Number of ledger entries staged so far
    pub fn staged_entries(&self) -> usize {
        self.entries.len()
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    /// Publish every staged row and ledger entry, then release all locks
    ///
    /// Returns the committed ledger entries with their ids assigned.
    pub fn commit(mut self) -> Vec<LedgerEntry> {
        let store = self.store;

        for (_, wallet) in self.wallets.drain() {
            store.wallets.publish(wallet.user, wallet);
        }
        for (_, ride) in self.rides.drain() {
            store.rides.publish(ride.id, ride);
        }
        for (_, booking) in self.bookings.drain() {
            store.bookings.publish(booking.id, booking);
        }

        let committed: Vec<LedgerEntry> = self
            .entries
            .drain(..)
            .map(|pending| LedgerEntry {
                id: store.next_entry_id(),
                user: pending.user,
                kind: pending.kind,
                amount: pending.amount,
                description: pending.description,
                created_at: self.started_at,
            })
            .collect();
        for entry in &committed {
            store.ledger.insert(entry.id, entry.clone());
        }

        debug!(
            uow = self.id,
            rows = self.guards.len(),
            entries = committed.len(),
            "unit of work committed"
        );
        self.finished = true;
        committed
    }

    /// Discard everything staged and release all locks
    pub fn rollback(mut self) {
        debug!(uow = self.id, rows = self.guards.len(), "unit of work rolled back");
        self.finished = true;
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(uow = self.id, "unit of work dropped without commit, rolling back");
        }
    }
}

impl fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locked: Vec<String> = self.guards.keys().map(ToString::to_string).collect();
        locked.sort();
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("locked", &locked)
            .field("staged_entries", &self.entries.len())
            .finish()
    }
}
