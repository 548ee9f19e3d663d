//! Self-investment valuation and equity dilution math.
//!
//! An entity (user or project) holds a valuation representing 100%
//! ownership. A self-funded capital injection of `amount` raises the
//! valuation and dilutes the original holder:
//!
//! - `valuation_after = valuation_before + amount` (exact)
//! - `equity_after = valuation_before / valuation_after × 100`
//! - `investor_share = amount / valuation_after × 100`
//!
//! The investor and the diluted holder are the same entity in the
//! documented use case: self-dilution buys a higher baseline valuation at
//! the cost of relative ownership. `equity_after + investor_share == 100`
//! up to the precision of one decimal division.
//!
//! Pure algebra with one division; `valuation_after > 0` is guaranteed by
//! the preconditions (`valuation_before ≥ 0`, `amount > 0`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::FULL_EQUITY;
use crate::error::EquityError;
use crate::types::{EntityId, EntityType, VotingRoundId};

/// The 100%-ownership valuation baseline of an entity before a new
/// injection.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityValuation {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    /// Current valuation, ≥ 0.
    pub current_valuation: Decimal,
}

/// An immutable record of one self-funded capital injection.
///
/// Created atomically with the valuation update and (when configured) the
/// funding debit. Corrections require a new offsetting investment — never
/// an edit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SelfInvestment {
    /// Sequence id assigned at creation.
    pub id: u64,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub amount: Decimal,
    pub voting_round_id: VotingRoundId,
    pub valuation_before: Decimal,
    pub valuation_after: Decimal,
    /// Always 100: the holder owned everything before the injection.
    pub equity_before: Decimal,
    /// The original holder's stake after dilution, in percent.
    pub equity_after: Decimal,
    /// The new capital's stake, in percent.
    pub investor_share: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the pure dilution computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dilution {
    pub valuation_after: Decimal,
    pub equity_after: Decimal,
    pub investor_share: Decimal,
}

/// Compute post-investment valuation and ownership dilution.
///
/// # Errors
///
/// - [`EquityError::InvalidValuation`] if `valuation_before < 0`
/// - [`EquityError::InvestmentOutOfRange`] unless `0 < amount ≤ max_amount`
pub fn dilute(
    valuation_before: Decimal,
    amount: Decimal,
    max_amount: Decimal,
) -> Result<Dilution, EquityError> {
    if valuation_before < Decimal::ZERO {
        return Err(EquityError::InvalidValuation(valuation_before));
    }
    if amount <= Decimal::ZERO || amount > max_amount {
        return Err(EquityError::InvestmentOutOfRange {
            amount,
            max: max_amount,
        });
    }

    let valuation_after = valuation_before + amount;
    let equity_after = valuation_before / valuation_after * FULL_EQUITY;
    let investor_share = amount / valuation_after * FULL_EQUITY;

    Ok(Dilution {
        valuation_after,
        equity_after,
        investor_share,
    })
}
