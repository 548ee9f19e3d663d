//! Allocation method selection.
//!
//! The method is a function of participant count alone, decided at
//! calculation time and re-evaluated on every participant change while the
//! calculation is still draft.

use serde::{Deserialize, Serialize};
use std::fmt;

use divvy_core::constants::SMALL_GROUP_MAX;
use divvy_core::error::MeritError;

/// Which closed-form allocation formula applies to a participant set.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// Exactly one participant: the whole pool.
    Single,
    /// Two participants: proportional split with an imbalance factor.
    Duo,
    /// 3–10 participants: proportional split with role weights and a
    /// spread factor around the mean share.
    SmallGroup,
    /// More than 10 participants: logarithmic tail compression.
    LargeGroup,
}

impl AllocationMethod {
    /// Select the method for a participant count.
    ///
    /// # Errors
    ///
    /// [`MeritError::NoParticipants`] for a count of zero — a calculation
    /// with no participants is never created.
    pub fn for_count(count: usize) -> Result<Self, MeritError> {
        match count {
            0 => Err(MeritError::NoParticipants),
            1 => Ok(Self::Single),
            2 => Ok(Self::Duo),
            n if n <= SMALL_GROUP_MAX => Ok(Self::SmallGroup),
            _ => Ok(Self::LargeGroup),
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Single => "single",
            Self::Duo => "duo",
            Self::SmallGroup => "small_group",
            Self::LargeGroup => "large_group",
        };
        write!(f, "{s}")
    }
}
