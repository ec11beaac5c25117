//! Wallet and ledger types
//!
//! This module defines the per-user wallet, the balance snapshot handed to
//! callers, and the immutable ledger entry appended for every wallet mutation.
//! Token amounts use `rust_decimal::Decimal` with at most [`TOKEN_SCALE`]
//! decimal places.

use super::error::MarketplaceError;
use super::ids::{EntryId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Number of decimal places a token amount may carry
pub const TOKEN_SCALE: u32 = 2;

/// Per-user token wallet
///
/// `available` can be spent; `blocked` is earmarked for a pending obligation.
/// Both are never negative. Fields are only mutated by the wallet ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    /// Owner of the wallet
    pub user: UserId,

    /// Spendable funds
    pub available: Decimal,

    /// Funds held for a pending obligation, excluded from `available`
    pub blocked: Decimal,

    /// Last time a ledger operation touched this wallet
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a wallet with zero balances
    pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
        Wallet {
            user,
            available: Decimal::ZERO,
            blocked: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Sum of available and blocked funds
    pub fn total(&self) -> Decimal {
        self.available + self.blocked
    }

    pub fn balance(&self) -> Balance {
        Balance {
            available: self.available,
            blocked: self.blocked,
            total: self.total(),
        }
    }
}

/// Balance snapshot returned by `get_balance`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub available: Decimal,
    pub blocked: Decimal,
    pub total: Decimal,
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Funds added from outside the platform
    Deposit,
    /// Funds taken out of the platform
    Withdrawal,
    /// Funds moved from a passenger to a driver
    Payment,
    /// Funds returned after a reversed payment
    Refund,
    /// Funds blocked for, or released from, a pending obligation
    Reservation,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Withdrawal => "WITHDRAWAL",
            EntryKind::Payment => "PAYMENT",
            EntryKind::Refund => "REFUND",
            EntryKind::Reservation => "RESERVATION",
        };
        f.write_str(name)
    }
}

/// Immutable audit record of one wallet mutation
///
/// `Reservation` entries move funds inside one wallet: `-x` when `x` is
/// blocked, `+x` when a hold of `x` is released, so their sum is the negated
/// blocked balance. Every other kind carries the signed change of the owner's
/// total balance, so their sum is the wallet total.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Assigned when the unit of work commits
    pub id: EntryId,
    pub user: UserId,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Validate a strictly positive token amount
///
/// # Errors
///
/// * `MarketplaceError::InvalidAmount` if `amount <= 0` or it has more than
///   [`TOKEN_SCALE`] decimal places
pub fn validate_amount(amount: Decimal) -> Result<Decimal, MarketplaceError> {
    if amount <= Decimal::ZERO {
        return Err(MarketplaceError::invalid_amount(amount, "must be positive"));
    }
    validate_scale(amount)
}

/// Validate a non-negative token amount, e.g. a ride price
///
/// # Errors
///
/// * `MarketplaceError::InvalidAmount` if `amount < 0` or it is too precise
pub fn validate_price(amount: Decimal) -> Result<Decimal, MarketplaceError> {
    if amount < Decimal::ZERO {
        return Err(MarketplaceError::invalid_amount(
            amount,
            "must not be negative",
        ));
    }
    validate_scale(amount)
}

fn validate_scale(amount: Decimal) -> Result<Decimal, MarketplaceError> {
    if amount.normalize().scale() > TOKEN_SCALE {
        return Err(MarketplaceError::invalid_amount(
            amount,
            "at most 2 decimal places are allowed",
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_wallet_is_empty() {
        let wallet = Wallet::new(7, Utc::now());

        assert_eq!(wallet.user, 7);
        assert_eq!(wallet.available, Decimal::ZERO);
        assert_eq!(wallet.blocked, Decimal::ZERO);
        assert_eq!(wallet.total(), Decimal::ZERO);
    }

    #[test]
    fn test_balance_includes_blocked_funds() {
        let mut wallet = Wallet::new(1, Utc::now());
        wallet.available = Decimal::new(8000, 2);
        wallet.blocked = Decimal::new(2000, 2);

        let balance = wallet.balance();
        assert_eq!(balance.total, Decimal::new(10000, 2));
    }

    #[rstest]
    #[case::integer(Decimal::new(10, 0))]
    #[case::two_places(Decimal::new(1050, 2))]
    #[case::trailing_zeros(Decimal::new(100000, 4))]
    fn test_validate_amount_accepts(#[case] amount: Decimal) {
        assert_eq!(validate_amount(amount), Ok(amount));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-1, 0))]
    #[case::three_places(Decimal::new(1001, 3))]
    fn test_validate_amount_rejects(#[case] amount: Decimal) {
        assert!(matches!(
            validate_amount(amount),
            Err(MarketplaceError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_validate_price_allows_free_rides() {
        assert_eq!(validate_price(Decimal::ZERO), Ok(Decimal::ZERO));
        assert!(validate_price(Decimal::new(-5, 1)).is_err());
    }
}
