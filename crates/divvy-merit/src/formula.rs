//! Closed-form allocation formulas, one named pure function per method.
//!
//! Every formula produces a raw merit vector that is then renormalized so
//! the final vector sums to the value pool exactly: each raw value is
//! scaled by `pool / Σraw`, and the sub-epsilon residue left over by
//! decimal division is assigned to the largest share (first index on
//! ties). Degenerate inputs (all contributions zero, or a raw vector that
//! collapses to zero) fall back to an equal split of the pool.
//!
//! Coefficients are named constants (see `divvy_core::constants`) carried
//! in [`AllocationTuning`] so deployments can adjust the spread behaviour
//! without touching the formulas:
//!
//! - **duo**: both sides scale by `1 + 0.1·|S1−S2|/max(S1,S2)`. The factor
//!   is identical for both participants, so renormalization cancels it and
//!   the final split is exactly proportional; the factor is kept visible
//!   in the raw vector for audit.
//! - **small group**: `rawᵢ = pool · sᵢ · Wᵢ · (1 + k·(sᵢ − 1/n))` with
//!   spread `k = 0.2` and per-participant role weights `Wᵢ` (default 1).
//!   Above-average shares are amplified, below-average shares dampened.
//! - **large group**: shares blend the proportional split with a
//!   logarithmic one (`Tᵢ = (1−β)·sᵢ + β·ln(1+Sᵢ)/Σln(1+Sⱼ)`, `β = 0.5`),
//!   then a smoothing factor `Bᵢ = 1 − γ·(Tᵢ − 1/n)` (`γ = 0.1`) pulls the
//!   blended share mildly toward the mean. Both steps compress a top-heavy
//!   tail while keeping merit strictly monotone in the contribution value.
//!
//! All arithmetic is `rust_decimal::Decimal`; no intermediate rounding.

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use divvy_core::constants::{
    DUO_IMBALANCE_WEIGHT, LARGE_GROUP_LOG_BLEND, LARGE_GROUP_SMOOTHING, SMALL_GROUP_SPREAD,
};
use divvy_core::error::MeritError;
use divvy_core::types::ParticipantId;

use crate::method::AllocationMethod;

/// One participant's input to an allocation: aggregated contribution value
/// plus an optional role weight (small-group formula only).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParticipantInput {
    pub participant_id: ParticipantId,
    /// Aggregated weighted contribution total, ≥ 0.
    pub contribution_value: Decimal,
    /// Role/position weight, ≥ 0. Defaults to 1; only the small-group
    /// formula consumes it.
    pub role_weight: Decimal,
}

impl ParticipantInput {
    /// Input with the default role weight of 1.
    pub fn new(participant_id: ParticipantId, contribution_value: Decimal) -> Self {
        Self {
            participant_id,
            contribution_value,
            role_weight: Decimal::ONE,
        }
    }

    pub fn with_role_weight(mut self, role_weight: Decimal) -> Self {
        self.role_weight = role_weight;
        self
    }
}

/// Formula coefficients. Defaults are the documented engine constants.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationTuning {
    pub duo_imbalance_weight: Decimal,
    pub small_group_spread: Decimal,
    pub large_group_log_blend: Decimal,
    pub large_group_smoothing: Decimal,
}

impl Default for AllocationTuning {
    fn default() -> Self {
        Self {
            duo_imbalance_weight: DUO_IMBALANCE_WEIGHT,
            small_group_spread: SMALL_GROUP_SPREAD,
            large_group_log_blend: LARGE_GROUP_LOG_BLEND,
            large_group_smoothing: LARGE_GROUP_SMOOTHING,
        }
    }
}

/// Validate inputs, select the method for the participant count, and
/// allocate the pool.
///
/// Returns the selected method and the merit vector, index-aligned with
/// `inputs`. The vector sums to `pool` exactly.
///
/// # Errors
///
/// - [`MeritError::NoParticipants`] for an empty input set
/// - [`MeritError::InvalidValuePool`] if `pool ≤ 0`
/// - [`MeritError::InvalidContributionValue`] for a negative contribution
/// - [`MeritError::InvalidRoleWeight`] for a negative role weight
pub fn allocate(
    inputs: &[ParticipantInput],
    pool: Decimal,
    tuning: &AllocationTuning,
) -> Result<(AllocationMethod, Vec<Decimal>), MeritError> {
    let method = AllocationMethod::for_count(inputs.len())?;
    if pool <= Decimal::ZERO {
        return Err(MeritError::InvalidValuePool(pool));
    }
    for input in inputs {
        if input.contribution_value < Decimal::ZERO {
            return Err(MeritError::InvalidContributionValue {
                participant: input.participant_id,
                value: input.contribution_value,
            });
        }
        if input.role_weight < Decimal::ZERO {
            return Err(MeritError::InvalidRoleWeight {
                participant: input.participant_id,
                value: input.role_weight,
            });
        }
    }

    let total: Decimal = inputs.iter().map(|i| i.contribution_value).sum();
    if total.is_zero() {
        // All contributions zero: equal split regardless of method.
        return Ok((method, equal_split(inputs.len(), pool)));
    }

    let merits = match method {
        AllocationMethod::Single => allocate_single(pool),
        AllocationMethod::Duo => allocate_duo(inputs, pool, tuning),
        AllocationMethod::SmallGroup => allocate_small_group(inputs, pool, tuning),
        AllocationMethod::LargeGroup => allocate_large_group(inputs, pool, tuning),
    };
    Ok((method, merits))
}

/// Single participant: the whole pool.
pub fn allocate_single(pool: Decimal) -> Vec<Decimal> {
    vec![pool]
}

/// Two participants: proportional shares scaled by the imbalance factor
/// `1 + w·|S1−S2|/max(S1,S2)`, then renormalized.
///
/// Callers must have validated the inputs and ruled out the all-zero case
/// ([`allocate`] is the validating entry point).
pub fn allocate_duo(
    inputs: &[ParticipantInput],
    pool: Decimal,
    tuning: &AllocationTuning,
) -> Vec<Decimal> {
    debug_assert_eq!(inputs.len(), 2);
    let s1 = inputs[0].contribution_value;
    let s2 = inputs[1].contribution_value;
    let total = s1 + s2;
    let max = s1.max(s2);

    let factor = Decimal::ONE + tuning.duo_imbalance_weight * (s1 - s2).abs() / max;
    let raw = vec![pool * (s1 / total) * factor, pool * (s2 / total) * factor];
    renormalize(raw, pool)
}

/// 3–10 participants: proportional shares with role weights and the
/// spread factor `1 + k·(sᵢ − 1/n)`, renormalized.
///
/// Callers must have validated the inputs and ruled out the all-zero case.
pub fn allocate_small_group(
    inputs: &[ParticipantInput],
    pool: Decimal,
    tuning: &AllocationTuning,
) -> Vec<Decimal> {
    let total: Decimal = inputs.iter().map(|i| i.contribution_value).sum();
    let mean_share = Decimal::ONE / Decimal::from(inputs.len() as u64);

    let raw = inputs
        .iter()
        .map(|input| {
            let share = input.contribution_value / total;
            let spread = Decimal::ONE + tuning.small_group_spread * (share - mean_share);
            pool * share * input.role_weight * spread
        })
        .collect();
    renormalize(raw, pool)
}

/// More than 10 participants: blend of proportional and logarithmic shares
/// with a smoothing factor, renormalized.
///
/// Callers must have validated the inputs and ruled out the all-zero case.
pub fn allocate_large_group(
    inputs: &[ParticipantInput],
    pool: Decimal,
    tuning: &AllocationTuning,
) -> Vec<Decimal> {
    let total: Decimal = inputs.iter().map(|i| i.contribution_value).sum();
    let mean_share = Decimal::ONE / Decimal::from(inputs.len() as u64);

    // ln(1+S) is 0 for a zero contribution; the all-zero case never
    // reaches here, so ln_total > 0.
    let logs: Vec<Decimal> = inputs
        .iter()
        .map(|i| (Decimal::ONE + i.contribution_value).ln())
        .collect();
    let ln_total: Decimal = logs.iter().sum();

    let blend = tuning.large_group_log_blend;
    let raw = inputs
        .iter()
        .zip(&logs)
        .map(|(input, log)| {
            let share = input.contribution_value / total;
            let log_share = *log / ln_total;
            let blended = (Decimal::ONE - blend) * share + blend * log_share;
            let smoothing =
                Decimal::ONE - tuning.large_group_smoothing * (blended - mean_share);
            pool * blended * smoothing
        })
        .collect();
    renormalize(raw, pool)
}

/// Equal split of the pool across `n` participants; the division residue
/// goes to the first share so the vector sums to `pool` exactly.
pub fn equal_split(n: usize, pool: Decimal) -> Vec<Decimal> {
    let count = Decimal::from(n as u64);
    let share = pool / count;
    let mut out = vec![share; n];
    out[0] += pool - share * count;
    out
}

/// Scale a raw vector so it sums to `pool` exactly.
///
/// Each value becomes `pool · raw / Σraw`; the residue left by decimal
/// division is assigned to the largest share (first index on ties). A raw
/// vector that sums to zero falls back to an equal split.
pub fn renormalize(raw: Vec<Decimal>, pool: Decimal) -> Vec<Decimal> {
    let sum: Decimal = raw.iter().sum();
    if sum.is_zero() {
        return equal_split(raw.len(), pool);
    }

    let mut out: Vec<Decimal> = raw.into_iter().map(|r| pool * r / sum).collect();
    let allocated: Decimal = out.iter().sum();
    let residue = pool - allocated;
    if !residue.is_zero() {
        let mut largest = 0;
        for (i, v) in out.iter().enumerate() {
            if *v > out[largest] {
                largest = i;
            }
        }
        out[largest] += residue;
    }
    out
}
