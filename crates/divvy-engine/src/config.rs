//! Engine configuration.
//!
//! Deserializable so deployments can load it from any serde-backed config
//! source; every field has a documented default.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use divvy_core::constants::{DEFAULT_MAX_SELF_INVESTMENT, DEFAULT_VALUE_POOL};
use divvy_merit::AllocationTuning;

/// Where self-investments are funded from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    /// Debit the investor's points account; an uncovered debit fails the
    /// investment with `InsufficientBalance`.
    #[default]
    PointsBalance,
    /// Funded outside the points ledger (e.g. a separate currency
    /// system); no debit is recorded here.
    External,
}

/// Engine-wide settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Value pool distributed per work item unless a calculation
    /// overrides it.
    pub default_value_pool: Decimal,
    /// Ceiling for a single self-investment.
    pub max_self_investment: Decimal,
    /// Funding source for self-investments.
    pub funding: FundingSource,
    /// Allocation formula coefficients.
    pub tuning: AllocationTuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_value_pool: DEFAULT_VALUE_POOL,
            max_self_investment: DEFAULT_MAX_SELF_INVESTMENT,
            funding: FundingSource::default(),
            tuning: AllocationTuning::default(),
        }
    }
}
