//! The concurrent ledger store.
//!
//! Accounts are created lazily on first use and guarded by per-account
//! mutexes held in a `DashMap` registry. Single-account operations lock
//! one account; transfers lock both accounts in ascending account-id
//! order, which makes concurrent transfers deadlock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use divvy_core::error::LedgerError;
use divvy_core::types::{AccountId, ChangeType, ProjectId};

use crate::account::{AccountState, PointsAccount};
use crate::entry::{replay, validate_delta, PointsLedgerEntry};

/// Concurrent points ledger with per-account serialization.
pub struct Ledger {
    accounts: DashMap<AccountId, Arc<Mutex<AccountState>>>,
    next_entry_id: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            next_entry_id: AtomicU64::new(1),
        }
    }

    /// Get or lazily create the state cell for an account.
    fn state(&self, account_id: AccountId) -> Arc<Mutex<AccountState>> {
        let entry = self.accounts.entry(account_id).or_default();
        Arc::clone(entry.value())
    }

    /// Validate and apply one ledger entry.
    ///
    /// The delta's sign must match the change type, and a debit must be
    /// covered by the account's available points; otherwise nothing is
    /// recorded.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidLedgerDelta`] on a sign mismatch or zero
    ///   delta
    /// - [`LedgerError::InsufficientPoints`] if the balance would go
    ///   negative
    pub fn apply_entry(
        &self,
        account_id: AccountId,
        change_type: ChangeType,
        points: Decimal,
        reason: &str,
        related_project_id: Option<ProjectId>,
        now: DateTime<Utc>,
    ) -> Result<PointsLedgerEntry, LedgerError> {
        validate_delta(change_type, points)?;
        let state = self.state(account_id);
        let mut guard = state.lock();
        self.apply_locked(
            &mut guard,
            account_id,
            change_type,
            points,
            reason,
            related_project_id,
            now,
        )
    }

    /// Move points between two accounts as one logical operation.
    ///
    /// Produces exactly two entries — transfer_out on the sender,
    /// transfer_in on the receiver — committed while both account locks
    /// are held: either both are recorded or neither. Locks are taken in
    /// ascending account-id order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidLedgerDelta`] if `points ≤ 0`
    /// - [`LedgerError::InvalidTransferTarget`] for a self-transfer
    /// - [`LedgerError::InsufficientPoints`] if the sender cannot cover
    ///   the debit; both balances are left unchanged
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        points: Decimal,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(PointsLedgerEntry, PointsLedgerEntry), LedgerError> {
        if points <= Decimal::ZERO {
            return Err(LedgerError::InvalidLedgerDelta {
                change_type: ChangeType::TransferOut,
                points,
            });
        }
        if from == to {
            return Err(LedgerError::InvalidTransferTarget(from));
        }

        let from_state = self.state(from);
        let to_state = self.state(to);
        let (mut sender, mut receiver) = if from < to {
            let s = from_state.lock();
            let r = to_state.lock();
            (s, r)
        } else {
            let r = to_state.lock();
            let s = from_state.lock();
            (s, r)
        };

        // The sender debit is the only fallible step; it commits nothing
        // on failure. The receiver credit cannot fail (points > 0 on a
        // balance that is ≥ 0 by invariant), so both entries commit or
        // neither does.
        let entry_out = self.apply_locked(
            &mut sender,
            from,
            ChangeType::TransferOut,
            -points,
            reason,
            None,
            now,
        )?;
        let entry_in = self.apply_locked(
            &mut receiver,
            to,
            ChangeType::TransferIn,
            points,
            reason,
            None,
            now,
        )?;
        Ok((entry_out, entry_in))
    }

    /// Credit several accounts in one batch (one entry each).
    ///
    /// Every amount is validated against the (credit) change type before
    /// any lock is taken; after validation each credit is infallible, so
    /// the batch always commits completely.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidLedgerDelta`] if the change type is not a
    /// credit or any amount is non-positive; nothing is recorded.
    pub fn credit_many(
        &self,
        credits: &[(AccountId, Decimal)],
        change_type: ChangeType,
        reason: &str,
        related_project_id: Option<ProjectId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PointsLedgerEntry>, LedgerError> {
        for &(_, amount) in credits {
            validate_delta(change_type, amount)?;
        }

        let mut entries = Vec::with_capacity(credits.len());
        for &(account_id, amount) in credits {
            let state = self.state(account_id);
            let mut guard = state.lock();
            let entry = self.apply_locked(
                &mut guard,
                account_id,
                change_type,
                amount,
                reason,
                related_project_id,
                now,
            )?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Snapshot of an account. Unknown accounts are reported as zeroed
    /// summaries rather than errors.
    pub fn summary(&self, account_id: AccountId) -> PointsAccount {
        let state = match self.accounts.get(&account_id) {
            Some(cell) => Arc::clone(cell.value()),
            None => {
                return PointsAccount {
                    account_id,
                    total_points: Decimal::ZERO,
                    available_points: Decimal::ZERO,
                    used_points: Decimal::ZERO,
                }
            }
        };
        let guard = state.lock();
        guard.summary(account_id)
    }

    /// The account's full entry history in application order.
    pub fn entries(&self, account_id: AccountId) -> Vec<PointsLedgerEntry> {
        let state = match self.accounts.get(&account_id) {
            Some(cell) => Arc::clone(cell.value()),
            None => return Vec::new(),
        };
        let guard = state.lock();
        guard.entries.clone()
    }

    /// Replay the account's history from zero and verify every stored
    /// `balance_after`. Returns the final balance.
    pub fn audit(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        replay(&self.entries(account_id))
    }

    fn apply_locked(
        &self,
        state: &mut AccountState,
        account_id: AccountId,
        change_type: ChangeType,
        points: Decimal,
        reason: &str,
        related_project_id: Option<ProjectId>,
        now: DateTime<Utc>,
    ) -> Result<PointsLedgerEntry, LedgerError> {
        let balance = state.last_balance();
        let balance_after = balance + points;
        if balance_after < Decimal::ZERO {
            return Err(LedgerError::InsufficientPoints {
                have: balance,
                need: points.abs(),
            });
        }

        let entry = PointsLedgerEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::Relaxed),
            account_id,
            change_type,
            points,
            reason: reason.to_string(),
            related_project_id,
            balance_after,
            created_at: now,
        };
        state.commit(entry.clone());
        Ok(entry)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn earn(ledger: &Ledger, account: u64, points: Decimal) -> PointsLedgerEntry {
        ledger
            .apply_entry(
                AccountId(account),
                ChangeType::Earn,
                points,
                "earn",
                None,
                now(),
            )
            .unwrap()
    }

    // ------------------------------------------------------------------
    // apply_entry
    // ------------------------------------------------------------------

    #[test]
    fn accounts_are_created_lazily() {
        let ledger = Ledger::new();
        let summary = ledger.summary(AccountId(1));
        assert_eq!(summary.available_points, dec!(0));

        earn(&ledger, 1, dec!(10));
        assert_eq!(ledger.summary(AccountId(1)).available_points, dec!(10));
    }

    #[test]
    fn sign_mismatch_rejected() {
        let ledger = Ledger::new();
        let err = ledger.apply_entry(
            AccountId(1),
            ChangeType::Earn,
            dec!(-5),
            "bad",
            None,
            now(),
        );
        assert!(matches!(err, Err(LedgerError::InvalidLedgerDelta { .. })));
        assert!(ledger.entries(AccountId(1)).is_empty());
    }

    #[test]
    fn balance_after_chains_from_previous_entry() {
        let ledger = Ledger::new();
        let a = earn(&ledger, 1, dec!(100));
        assert_eq!(a.balance_after, dec!(100));

        let b = ledger
            .apply_entry(AccountId(1), ChangeType::Spend, dec!(-30), "s", None, now())
            .unwrap();
        assert_eq!(b.balance_after, dec!(70));

        let c = earn(&ledger, 1, dec!(0.5));
        assert_eq!(c.balance_after, dec!(70.5));
    }

    #[test]
    fn spend_moves_points_to_used() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        ledger
            .apply_entry(AccountId(1), ChangeType::Spend, dec!(-30), "s", None, now())
            .unwrap();

        let summary = ledger.summary(AccountId(1));
        assert_eq!(summary.available_points, dec!(70));
        assert_eq!(summary.used_points, dec!(30));
        assert_eq!(summary.total_points, dec!(100));
    }

    #[test]
    fn penalty_shrinks_the_total() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        ledger
            .apply_entry(AccountId(1), ChangeType::Penalty, dec!(-40), "p", None, now())
            .unwrap();

        let summary = ledger.summary(AccountId(1));
        assert_eq!(summary.available_points, dec!(60));
        assert_eq!(summary.used_points, dec!(0));
        assert_eq!(summary.total_points, dec!(60));
    }

    #[test]
    fn refund_restores_spent_points() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        ledger
            .apply_entry(AccountId(1), ChangeType::Spend, dec!(-30), "s", None, now())
            .unwrap();
        ledger
            .apply_entry(AccountId(1), ChangeType::Refund, dec!(30), "r", None, now())
            .unwrap();

        let summary = ledger.summary(AccountId(1));
        assert_eq!(summary.available_points, dec!(100));
        assert_eq!(summary.used_points, dec!(0));
        assert_eq!(summary.total_points, dec!(100));
    }

    #[test]
    fn overspend_rejected_and_balance_unchanged() {
        // Spend of 120 against available 100.
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        let err = ledger.apply_entry(
            AccountId(1),
            ChangeType::Spend,
            dec!(-120),
            "overspend",
            None,
            now(),
        );
        assert_eq!(
            err,
            Err(LedgerError::InsufficientPoints {
                have: dec!(100),
                need: dec!(120),
            })
        );
        assert_eq!(ledger.summary(AccountId(1)).available_points, dec!(100));
        assert_eq!(ledger.entries(AccountId(1)).len(), 1);
    }

    #[test]
    fn entry_ids_are_unique_across_accounts() {
        let ledger = Ledger::new();
        let a = earn(&ledger, 1, dec!(1));
        let b = earn(&ledger, 2, dec!(1));
        let c = earn(&ledger, 1, dec!(1));
        assert!(a.id < b.id && b.id < c.id);
    }

    // ------------------------------------------------------------------
    // transfer
    // ------------------------------------------------------------------

    #[test]
    fn transfer_fifty_points() {
        // A has 100 available, B has 0.
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));

        let (out, inn) = ledger
            .transfer(AccountId(1), AccountId(2), dec!(50), "gift", now())
            .unwrap();

        assert_eq!(out.change_type, ChangeType::TransferOut);
        assert_eq!(out.points, dec!(-50));
        assert_eq!(out.balance_after, dec!(50));
        assert_eq!(inn.change_type, ChangeType::TransferIn);
        assert_eq!(inn.points, dec!(50));
        assert_eq!(inn.balance_after, dec!(50));

        assert_eq!(ledger.summary(AccountId(1)).available_points, dec!(50));
        assert_eq!(ledger.summary(AccountId(2)).available_points, dec!(50));
    }

    #[test]
    fn self_transfer_rejected() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        assert_eq!(
            ledger.transfer(AccountId(1), AccountId(1), dec!(10), "loop", now()),
            Err(LedgerError::InvalidTransferTarget(AccountId(1)))
        );
    }

    #[test]
    fn non_positive_transfer_rejected() {
        let ledger = Ledger::new();
        assert!(matches!(
            ledger.transfer(AccountId(1), AccountId(2), dec!(0), "zero", now()),
            Err(LedgerError::InvalidLedgerDelta { .. })
        ));
        assert!(ledger
            .transfer(AccountId(1), AccountId(2), dec!(-5), "neg", now())
            .is_err());
    }

    #[test]
    fn failed_transfer_leaves_both_balances_unchanged() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(40));
        earn(&ledger, 2, dec!(7));

        let err = ledger.transfer(AccountId(1), AccountId(2), dec!(41), "too much", now());
        assert!(matches!(err, Err(LedgerError::InsufficientPoints { .. })));

        assert_eq!(ledger.summary(AccountId(1)).available_points, dec!(40));
        assert_eq!(ledger.summary(AccountId(2)).available_points, dec!(7));
        assert_eq!(ledger.entries(AccountId(1)).len(), 1);
        assert_eq!(ledger.entries(AccountId(2)).len(), 1);
    }

    #[test]
    fn transfer_between_fresh_and_existing_accounts() {
        let ledger = Ledger::new();
        earn(&ledger, 9, dec!(10));
        // Receiver does not exist yet; transfer creates it.
        ledger
            .transfer(AccountId(9), AccountId(3), dec!(10), "bootstrap", now())
            .unwrap();
        assert_eq!(ledger.summary(AccountId(9)).available_points, dec!(0));
        assert_eq!(ledger.summary(AccountId(3)).available_points, dec!(10));
    }

    // ------------------------------------------------------------------
    // credit_many
    // ------------------------------------------------------------------

    #[test]
    fn credit_many_credits_every_account() {
        let ledger = Ledger::new();
        let entries = ledger
            .credit_many(
                &[
                    (AccountId(1), dec!(80)),
                    (AccountId(2), dec!(20)),
                ],
                ChangeType::Earn,
                "merit award",
                Some(ProjectId(7)),
                now(),
            )
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].related_project_id, Some(ProjectId(7)));
        assert_eq!(ledger.summary(AccountId(1)).available_points, dec!(80));
        assert_eq!(ledger.summary(AccountId(2)).available_points, dec!(20));
    }

    #[test]
    fn credit_many_rejects_debit_change_type() {
        let ledger = Ledger::new();
        let err = ledger.credit_many(
            &[(AccountId(1), dec!(10))],
            ChangeType::Spend,
            "bad",
            None,
            now(),
        );
        assert!(matches!(err, Err(LedgerError::InvalidLedgerDelta { .. })));
        assert!(ledger.entries(AccountId(1)).is_empty());
    }

    #[test]
    fn credit_many_validates_before_any_commit() {
        let ledger = Ledger::new();
        let err = ledger.credit_many(
            &[(AccountId(1), dec!(10)), (AccountId(2), dec!(0))],
            ChangeType::Reward,
            "mixed",
            None,
            now(),
        );
        assert!(err.is_err());
        assert!(ledger.entries(AccountId(1)).is_empty());
        assert!(ledger.entries(AccountId(2)).is_empty());
    }

    // ------------------------------------------------------------------
    // replay audit
    // ------------------------------------------------------------------

    #[test]
    fn replay_reproduces_history_after_mixed_operations() {
        let ledger = Ledger::new();
        earn(&ledger, 1, dec!(100));
        earn(&ledger, 2, dec!(25));
        ledger
            .apply_entry(AccountId(1), ChangeType::Spend, dec!(-12.5), "s", None, now())
            .unwrap();
        ledger
            .transfer(AccountId(1), AccountId(2), dec!(30), "t", now())
            .unwrap();
        ledger
            .apply_entry(AccountId(2), ChangeType::Penalty, dec!(-5), "p", None, now())
            .unwrap();
        // Include a rejected operation: it must not disturb the chain.
        let _ = ledger.apply_entry(
            AccountId(2),
            ChangeType::Spend,
            dec!(-1000),
            "rejected",
            None,
            now(),
        );

        assert_eq!(ledger.audit(AccountId(1)), Ok(dec!(57.5)));
        assert_eq!(ledger.audit(AccountId(2)), Ok(dec!(50)));
        assert_eq!(
            ledger.summary(AccountId(1)).available_points,
            ledger.audit(AccountId(1)).unwrap()
        );
    }
}
