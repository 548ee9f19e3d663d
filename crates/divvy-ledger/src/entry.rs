//! Ledger entries: signed deltas with chained balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use divvy_core::error::LedgerError;
use divvy_core::types::{AccountId, ChangeType, ProjectId};

/// An immutable, signed record of one points balance change.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PointsLedgerEntry {
    /// Sequence id assigned by the ledger, unique across accounts.
    pub id: u64,
    pub account_id: AccountId,
    pub change_type: ChangeType,
    /// Signed delta: positive for credits, negative for debits.
    pub points: Decimal,
    pub reason: String,
    pub related_project_id: Option<ProjectId>,
    /// The account's available points immediately after this entry
    /// applied, chained from the previous entry's `balance_after`.
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Check that a delta's sign matches its change type.
///
/// Credits (earn, transfer_in, reward, refund) must be strictly positive;
/// debits (spend, transfer_out, penalty) strictly negative. Zero deltas
/// carry no sign and are rejected.
pub fn validate_delta(change_type: ChangeType, points: Decimal) -> Result<(), LedgerError> {
    let valid = if change_type.is_credit() {
        points > Decimal::ZERO
    } else {
        points < Decimal::ZERO
    };
    if !valid {
        return Err(LedgerError::InvalidLedgerDelta { change_type, points });
    }
    Ok(())
}

/// Replay an account's entries from a zero balance, verifying every stored
/// `balance_after` along the way. Returns the final balance.
///
/// # Errors
///
/// [`LedgerError::ReplayMismatch`] at the first entry whose stored balance
/// diverges from the recomputed one.
pub fn replay(entries: &[PointsLedgerEntry]) -> Result<Decimal, LedgerError> {
    let mut balance = Decimal::ZERO;
    for entry in entries {
        balance += entry.points;
        if balance != entry.balance_after {
            return Err(LedgerError::ReplayMismatch {
                entry_id: entry.id,
                stored: entry.balance_after,
                replayed: balance,
            });
        }
    }
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn credit_types_require_positive_points() {
        assert!(validate_delta(ChangeType::Earn, dec!(10)).is_ok());
        assert!(validate_delta(ChangeType::Earn, dec!(-10)).is_err());
        assert!(validate_delta(ChangeType::Refund, dec!(0.01)).is_ok());
        assert!(validate_delta(ChangeType::TransferIn, dec!(-1)).is_err());
    }

    #[test]
    fn debit_types_require_negative_points() {
        assert!(validate_delta(ChangeType::Spend, dec!(-10)).is_ok());
        assert!(validate_delta(ChangeType::Spend, dec!(10)).is_err());
        assert!(validate_delta(ChangeType::Penalty, dec!(-0.5)).is_ok());
        assert!(validate_delta(ChangeType::TransferOut, dec!(5)).is_err());
    }

    #[test]
    fn zero_delta_rejected_for_any_type() {
        for change_type in [
            ChangeType::Earn,
            ChangeType::Spend,
            ChangeType::TransferIn,
            ChangeType::TransferOut,
            ChangeType::Reward,
            ChangeType::Penalty,
            ChangeType::Refund,
        ] {
            assert!(
                validate_delta(change_type, Decimal::ZERO).is_err(),
                "zero accepted for {change_type}"
            );
        }
    }

    fn entry(id: u64, points: Decimal, balance_after: Decimal) -> PointsLedgerEntry {
        PointsLedgerEntry {
            id,
            account_id: AccountId(1),
            change_type: if points > Decimal::ZERO {
                ChangeType::Earn
            } else {
                ChangeType::Spend
            },
            points,
            reason: "test".into(),
            related_project_id: None,
            balance_after,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn replay_reproduces_chained_balances() {
        let entries = vec![
            entry(1, dec!(100), dec!(100)),
            entry(2, dec!(-30), dec!(70)),
            entry(3, dec!(5.5), dec!(75.5)),
        ];
        assert_eq!(replay(&entries), Ok(dec!(75.5)));
    }

    #[test]
    fn replay_detects_divergence() {
        let entries = vec![
            entry(1, dec!(100), dec!(100)),
            entry(2, dec!(-30), dec!(71)),
        ];
        assert_eq!(
            replay(&entries),
            Err(LedgerError::ReplayMismatch {
                entry_id: 2,
                stored: dec!(71),
                replayed: dec!(70),
            })
        );
    }

    #[test]
    fn replay_of_empty_history_is_zero() {
        assert_eq!(replay(&[]), Ok(Decimal::ZERO));
    }
}
