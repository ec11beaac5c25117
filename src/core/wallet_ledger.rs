//! Wallet ledger: balance operations with conservation guarantees
//!
//! This module provides the `WalletLedger` struct, the only component allowed
//! to change wallet balances. Every primitive runs inside a caller-supplied
//! [`UnitOfWork`], locks the wallet rows it touches and stages a ledger entry
//! next to the balance change, so the caller's commit or rollback governs
//! both.
//!
//! # Balance Rules
//!
//! - `available` and `blocked` never go negative
//! - `deposit` and the payee side of `capture_funds` are the only ways the
//!   total of a wallet grows
//! - `withdraw` and the payer side of `capture_funds` are the only ways it
//!   shrinks; `block_funds` and `release_funds` move funds within one wallet
//! - `capture_funds` is the only operation that moves funds between users;
//!   `refund_payment` reverses one
//!
//! All arithmetic is checked; an overflow aborts the operation.

use crate::store::{Store, UnitOfWork};
use crate::types::wallet::validate_amount;
use crate::types::{Balance, EntryKind, LedgerEntry, MarketplaceError, UserId, Wallet};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Wallet balance operations over a shared store
#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<Store>,
}

impl WalletLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // ---------------------------------------------------------------------
    // Primitives (caller-supplied unit of work)
    // ---------------------------------------------------------------------

    /// Get the user's wallet, creating an empty one if absent
    ///
    /// Locks the wallet row.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user does not exist
    pub async fn get_or_create(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
    ) -> Result<Wallet, MarketplaceError> {
        if let Some(wallet) = uow.lock_wallet(user).await {
            return Ok(wallet);
        }
        if uow.store().user(user).is_none() {
            return Err(MarketplaceError::UserNotFound { user });
        }

        let wallet = Wallet::new(user, uow.now());
        uow.stage_wallet(wallet.clone())?;
        Ok(wallet)
    }

    /// Lock an existing wallet
    async fn existing(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
    ) -> Result<Wallet, MarketplaceError> {
        uow.lock_wallet(user)
            .await
            .ok_or(MarketplaceError::WalletNotFound { user })
    }

    /// Add funds to the user's available balance
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::UserNotFound` if the user does not exist
    /// * `MarketplaceError::ArithmeticOverflow` if the balance would overflow
    pub async fn deposit(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet, MarketplaceError> {
        let amount = validate_amount(amount)?;
        let mut wallet = self.get_or_create(uow, user).await?;

        wallet.available = wallet
            .available
            .checked_add(amount)
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("deposit", user))?;
        wallet.updated_at = uow.now();

        uow.stage_wallet(wallet.clone())?;
        uow.append_entry(user, EntryKind::Deposit, amount, "Deposit funds");
        Ok(wallet)
    }

    /// Take funds out of the user's available balance
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::WalletNotFound` if the user has no wallet
    /// * `MarketplaceError::InsufficientFunds` if `available < amount`
    pub async fn withdraw(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet, MarketplaceError> {
        let amount = validate_amount(amount)?;
        let mut wallet = self.existing(uow, user).await?;

        if wallet.available < amount {
            return Err(MarketplaceError::insufficient_funds(
                user,
                wallet.available,
                amount,
            ));
        }
        wallet.available -= amount;
        wallet.updated_at = uow.now();

        uow.stage_wallet(wallet.clone())?;
        uow.append_entry(user, EntryKind::Withdrawal, -amount, "Withdraw funds");
        Ok(wallet)
    }

    /// Move funds from available to blocked
    ///
    /// No partial effect on failure.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::WalletNotFound` if the user has no wallet
    /// * `MarketplaceError::InsufficientFunds` if `available < amount`
    pub async fn block_funds(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<Wallet, MarketplaceError> {
        let amount = validate_amount(amount)?;
        let mut wallet = self.existing(uow, user).await?;

        if wallet.available < amount {
            return Err(MarketplaceError::insufficient_funds(
                user,
                wallet.available,
                amount,
            ));
        }
        wallet.available -= amount;
        wallet.blocked = wallet
            .blocked
            .checked_add(amount)
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("block", user))?;
        wallet.updated_at = uow.now();

        uow.stage_wallet(wallet.clone())?;
        uow.append_entry(user, EntryKind::Reservation, -amount, description);
        Ok(wallet)
    }

    /// Move funds from blocked back to available, undoing a hold
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::WalletNotFound` if the user has no wallet
    /// * `MarketplaceError::InsufficientBlockedFunds` if `blocked < amount`
    pub async fn release_funds(
        &self,
        uow: &mut UnitOfWork<'_>,
        user: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<Wallet, MarketplaceError> {
        let amount = validate_amount(amount)?;
        let mut wallet = self.existing(uow, user).await?;

        if wallet.blocked < amount {
            return Err(MarketplaceError::insufficient_blocked_funds(
                user,
                wallet.blocked,
                amount,
                "release",
            ));
        }
        wallet.blocked -= amount;
        wallet.available = wallet
            .available
            .checked_add(amount)
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("release", user))?;
        wallet.updated_at = uow.now();

        uow.stage_wallet(wallet.clone())?;
        uow.append_entry(user, EntryKind::Reservation, amount, description);
        Ok(wallet)
    }

    /// Transfer blocked funds of the payer to the payee's available balance
    ///
    /// Both wallets are locked in ascending user-id order before either is
    /// read.
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::InvalidCommand` if payer and payee are the same user
    /// * `MarketplaceError::WalletNotFound` if either wallet is missing
    /// * `MarketplaceError::InsufficientBlockedFunds` if the payer's hold does not cover `amount`
    pub async fn capture_funds(
        &self,
        uow: &mut UnitOfWork<'_>,
        payer: UserId,
        payee: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), MarketplaceError> {
        let amount = validate_amount(amount)?;
        if payer == payee {
            return Err(MarketplaceError::invalid_command(format!(
                "user {} cannot pay themselves",
                payer
            )));
        }

        uow.lock_wallets(&[payer, payee]).await;
        let mut payer_wallet = self.existing(uow, payer).await?;
        let mut payee_wallet = self.existing(uow, payee).await?;

        if payer_wallet.blocked < amount {
            return Err(MarketplaceError::insufficient_blocked_funds(
                payer,
                payer_wallet.blocked,
                amount,
                "capture",
            ));
        }
        payer_wallet.blocked -= amount;
        payee_wallet.available = payee_wallet
            .available
            .checked_add(amount)
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("capture", payee))?;
        payer_wallet.updated_at = uow.now();
        payee_wallet.updated_at = uow.now();

        uow.stage_wallet(payer_wallet)?;
        uow.stage_wallet(payee_wallet)?;
        uow.append_entry(payer, EntryKind::Payment, -amount, description);
        uow.append_entry(payee, EntryKind::Payment, amount, description);
        Ok(())
    }

    /// Reverse a captured payment: payee's available back to the payer
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::InvalidAmount` if `amount` is not a positive token amount
    /// * `MarketplaceError::WalletNotFound` if either wallet is missing
    /// * `MarketplaceError::InsufficientFunds` if the payee no longer holds `amount`
    pub async fn refund_payment(
        &self,
        uow: &mut UnitOfWork<'_>,
        payee: UserId,
        payer: UserId,
        amount: Decimal,
        description: &str,
    ) -> Result<(), MarketplaceError> {
        let amount = validate_amount(amount)?;
        if payer == payee {
            return Err(MarketplaceError::invalid_command(format!(
                "user {} cannot refund themselves",
                payer
            )));
        }

        uow.lock_wallets(&[payer, payee]).await;
        let mut payee_wallet = self.existing(uow, payee).await?;
        let mut payer_wallet = self.existing(uow, payer).await?;

        if payee_wallet.available < amount {
            return Err(MarketplaceError::insufficient_funds(
                payee,
                payee_wallet.available,
                amount,
            ));
        }
        payee_wallet.available -= amount;
        payer_wallet.available = payer_wallet
            .available
            .checked_add(amount)
            .ok_or_else(|| MarketplaceError::arithmetic_overflow("refund", payer))?;
        payee_wallet.updated_at = uow.now();
        payer_wallet.updated_at = uow.now();

        uow.stage_wallet(payee_wallet)?;
        uow.stage_wallet(payer_wallet)?;
        uow.append_entry(payee, EntryKind::Refund, -amount, description);
        uow.append_entry(payer, EntryKind::Refund, amount, description);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Standalone operations (own unit of work)
    // ---------------------------------------------------------------------

    /// Current balance of the user, creating an empty wallet if absent
    ///
    /// # Errors
    ///
    /// * `MarketplaceError::UserNotFound` if the user does not exist
    pub async fn get_balance(&self, user: UserId) -> Result<Balance, MarketplaceError> {
        if let Some(wallet) = self.store.wallet(user) {
            return Ok(wallet.balance());
        }

        let mut uow = self.store.begin();
        let wallet = self.get_or_create(&mut uow, user).await?;
        uow.commit();
        Ok(wallet.balance())
    }

    /// Deposit in a unit of work of its own
    pub async fn deposit_funds(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet, MarketplaceError> {
        let mut uow = self.store.begin();
        let wallet = self.deposit(&mut uow, user, amount).await?;
        uow.commit();
        info!(user, %amount, "deposit committed");
        Ok(wallet)
    }

    /// Withdraw in a unit of work of its own
    pub async fn withdraw_funds(
        &self,
        user: UserId,
        amount: Decimal,
    ) -> Result<Wallet, MarketplaceError> {
        let mut uow = self.store.begin();
        let wallet = self.withdraw(&mut uow, user, amount).await?;
        uow.commit();
        info!(user, %amount, "withdrawal committed");
        Ok(wallet)
    }

    /// Committed ledger entries of the user, newest first
    pub fn entries_for(&self, user: UserId) -> Vec<LedgerEntry> {
        let mut entries = self.store.entries_where(|entry| entry.user == user);
        entries.reverse();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;
    use rstest::rstest;

    fn setup(users: &[UserId]) -> (Arc<Store>, WalletLedger) {
        let store = Arc::new(Store::new());
        for &user in users {
            store.put_user(User::new(user, format!("user-{}", user)));
        }
        let ledger = WalletLedger::new(Arc::clone(&store));
        (store, ledger)
    }

    fn tokens(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[tokio::test]
    async fn test_get_or_create_creates_empty_wallet() {
        let (store, ledger) = setup(&[1]);

        let balance = ledger.get_balance(1).await.unwrap();

        assert_eq!(balance.available, Decimal::ZERO);
        assert_eq!(balance.blocked, Decimal::ZERO);
        assert!(store.wallet(1).is_some());
    }

    #[tokio::test]
    async fn test_get_or_create_unknown_user() {
        let (_, ledger) = setup(&[]);

        let result = ledger.get_balance(9).await;
        assert_eq!(result, Err(MarketplaceError::UserNotFound { user: 9 }));
    }

    #[tokio::test]
    async fn test_deposit_records_entry() {
        let (_, ledger) = setup(&[1]);

        let wallet = ledger.deposit_funds(1, tokens(10000)).await.unwrap();
        assert_eq!(wallet.available, tokens(10000));

        let entries = ledger.entries_for(1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Deposit);
        assert_eq!(entries[0].amount, tokens(10000));
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(tokens(-100))]
    #[case::too_precise(Decimal::new(1, 3))]
    #[tokio::test]
    async fn test_deposit_rejects_invalid_amounts(#[case] amount: Decimal) {
        let (store, ledger) = setup(&[1]);

        let result = ledger.deposit_funds(1, amount).await;
        assert!(matches!(result, Err(MarketplaceError::InvalidAmount { .. })));
        assert!(store.wallet(1).is_none());
    }

    #[tokio::test]
    async fn test_block_funds_moves_available_to_blocked() {
        let (store, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(10000)).await.unwrap();

        let mut uow = store.begin();
        let wallet = ledger
            .block_funds(&mut uow, 1, tokens(3000), "hold")
            .await
            .unwrap();
        uow.commit();

        assert_eq!(wallet.available, tokens(7000));
        assert_eq!(wallet.blocked, tokens(3000));
        assert_eq!(wallet.total(), tokens(10000));
    }

    #[tokio::test]
    async fn test_block_funds_insufficient_has_no_effect() {
        let (store, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(500)).await.unwrap();

        let mut uow = store.begin();
        let result = ledger.block_funds(&mut uow, 1, tokens(2000), "hold").await;
        assert_eq!(
            result,
            Err(MarketplaceError::insufficient_funds(1, tokens(500), tokens(2000)))
        );
        assert_eq!(uow.staged_entries(), 0);
        drop(uow);

        let balance = ledger.get_balance(1).await.unwrap();
        assert_eq!(balance.available, tokens(500));
        assert_eq!(balance.blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_release_funds_undoes_hold() {
        let (store, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(10000)).await.unwrap();

        let mut uow = store.begin();
        ledger
            .block_funds(&mut uow, 1, tokens(4000), "hold")
            .await
            .unwrap();
        let wallet = ledger
            .release_funds(&mut uow, 1, tokens(4000), "release")
            .await
            .unwrap();
        uow.commit();

        assert_eq!(wallet.available, tokens(10000));
        assert_eq!(wallet.blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_release_more_than_blocked_fails() {
        let (store, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(10000)).await.unwrap();

        let mut uow = store.begin();
        let result = ledger
            .release_funds(&mut uow, 1, tokens(100), "release")
            .await;

        assert_eq!(
            result,
            Err(MarketplaceError::insufficient_blocked_funds(
                1,
                Decimal::ZERO,
                tokens(100),
                "release"
            ))
        );
    }

    #[tokio::test]
    async fn test_capture_moves_funds_between_users() {
        let (store, ledger) = setup(&[1, 2]);
        ledger.deposit_funds(1, tokens(10000)).await.unwrap();
        ledger.get_balance(2).await.unwrap();

        let mut uow = store.begin();
        ledger
            .block_funds(&mut uow, 1, tokens(2000), "hold")
            .await
            .unwrap();
        ledger
            .capture_funds(&mut uow, 1, 2, tokens(2000), "ride payment")
            .await
            .unwrap();
        uow.commit();

        let payer = ledger.get_balance(1).await.unwrap();
        let payee = ledger.get_balance(2).await.unwrap();
        assert_eq!(payer.available, tokens(8000));
        assert_eq!(payer.blocked, Decimal::ZERO);
        assert_eq!(payee.available, tokens(2000));
        assert_eq!(payer.total + payee.total, tokens(10000));
    }

    #[tokio::test]
    async fn test_capture_missing_wallet() {
        let (store, ledger) = setup(&[1, 2]);
        ledger.deposit_funds(1, tokens(1000)).await.unwrap();

        let mut uow = store.begin();
        ledger
            .block_funds(&mut uow, 1, tokens(1000), "hold")
            .await
            .unwrap();
        let result = ledger
            .capture_funds(&mut uow, 1, 2, tokens(1000), "ride payment")
            .await;

        assert_eq!(result, Err(MarketplaceError::WalletNotFound { user: 2 }));
    }

    #[tokio::test]
    async fn test_capture_to_self_is_rejected() {
        let (store, ledger) = setup(&[1]);
        let mut uow = store.begin();

        let result = ledger
            .capture_funds(&mut uow, 1, 1, tokens(100), "self")
            .await;
        assert!(matches!(result, Err(MarketplaceError::InvalidCommand { .. })));
    }

    #[tokio::test]
    async fn test_refund_payment_requires_payee_funds() {
        let (store, ledger) = setup(&[1, 2]);
        ledger.deposit_funds(1, tokens(1000)).await.unwrap();
        ledger.get_balance(2).await.unwrap();

        let mut uow = store.begin();
        let result = ledger
            .refund_payment(&mut uow, 2, 1, tokens(500), "refund")
            .await;

        assert_eq!(
            result,
            Err(MarketplaceError::insufficient_funds(2, Decimal::ZERO, tokens(500)))
        );
    }

    #[tokio::test]
    async fn test_withdraw() {
        let (_, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(1000)).await.unwrap();

        let wallet = ledger.withdraw_funds(1, tokens(400)).await.unwrap();
        assert_eq!(wallet.available, tokens(600));

        let result = ledger.withdraw_funds(1, tokens(700)).await;
        assert!(matches!(
            result,
            Err(MarketplaceError::InsufficientFunds { .. })
        ));

        let kinds: Vec<EntryKind> = ledger.entries_for(1).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Withdrawal, EntryKind::Deposit]);
    }

    #[tokio::test]
    async fn test_rollback_discards_balance_changes() {
        let (store, ledger) = setup(&[1]);
        ledger.deposit_funds(1, tokens(1000)).await.unwrap();

        let mut uow = store.begin();
        ledger.deposit(&mut uow, 1, tokens(500)).await.unwrap();
        ledger
            .block_funds(&mut uow, 1, tokens(1200), "hold")
            .await
            .unwrap();
        uow.rollback();

        let balance = ledger.get_balance(1).await.unwrap();
        assert_eq!(balance.available, tokens(1000));
        assert_eq!(balance.blocked, Decimal::ZERO);
        assert_eq!(ledger.entries_for(1).len(), 1);
    }
}
