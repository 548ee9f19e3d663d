//! Points account state and the public summary view.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use divvy_core::types::{AccountId, ChangeType};

use crate::entry::PointsLedgerEntry;

/// Public snapshot of one account.
///
/// `total_points = available_points + used_points` by construction:
/// spending moves points from available to used (they stay in the lifetime
/// total), while penalties and outbound transfers remove them entirely.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointsAccount {
    pub account_id: AccountId,
    pub total_points: Decimal,
    pub available_points: Decimal,
    pub used_points: Decimal,
}

/// Mutable per-account state, guarded by the store's per-account mutex.
#[derive(Debug, Default)]
pub(crate) struct AccountState {
    pub(crate) available: Decimal,
    pub(crate) used: Decimal,
    pub(crate) entries: Vec<PointsLedgerEntry>,
}

impl AccountState {
    /// The balance the next entry chains from: the last entry's
    /// `balance_after`, or 0 for a fresh account.
    pub(crate) fn last_balance(&self) -> Decimal {
        self.entries
            .last()
            .map(|e| e.balance_after)
            .unwrap_or(Decimal::ZERO)
    }

    /// Append a validated entry and update the summary aggregates.
    pub(crate) fn commit(&mut self, entry: PointsLedgerEntry) {
        self.available = entry.balance_after;
        match entry.change_type {
            ChangeType::Spend => self.used += entry.points.abs(),
            // A refund returns previously-spent points; used never goes
            // below zero even for a refund with no matching spend.
            ChangeType::Refund => {
                self.used = (self.used - entry.points).max(Decimal::ZERO);
            }
            _ => {}
        }
        self.entries.push(entry);
    }

    pub(crate) fn summary(&self, account_id: AccountId) -> PointsAccount {
        PointsAccount {
            account_id,
            total_points: self.available + self.used,
            available_points: self.available,
            used_points: self.used,
        }
    }
}
