//! Engine constants. All score/point quantities are `Decimal`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Contribution ingestion bounds
// ---------------------------------------------------------------------------

/// Lowest accepted raw contribution score.
pub const MIN_RAW_SCORE: Decimal = dec!(0);
/// Highest accepted raw contribution score.
pub const MAX_RAW_SCORE: Decimal = dec!(100);
/// Lowest accepted record weight.
pub const MIN_RECORD_WEIGHT: Decimal = dec!(0);
/// Highest accepted record weight.
pub const MAX_RECORD_WEIGHT: Decimal = dec!(1);

// ---------------------------------------------------------------------------
// Merit allocation
// ---------------------------------------------------------------------------

/// Value pool distributed per finalized work item unless overridden.
pub const DEFAULT_VALUE_POOL: Decimal = dec!(100);

/// Duo imbalance coefficient: both participants' raw merit is scaled by
/// `1 + DUO_IMBALANCE_WEIGHT × |S1−S2| / max(S1,S2)`. The factor is equal
/// for both sides, so renormalization cancels it and the final split stays
/// proportional; the coefficient is kept visible in the raw vector.
pub const DUO_IMBALANCE_WEIGHT: Decimal = dec!(0.1);

/// Small-group spread coefficient `k` in `Aᵢ = 1 + k × (sᵢ − 1/n)`.
///
/// With `k = 0.2` and `n ≥ 3`, `Aᵢ ∈ [1 − k/n, 1 + k(1 − 1/n)]` stays
/// strictly positive and raw merit stays strictly monotone in the
/// contribution share.
pub const SMALL_GROUP_SPREAD: Decimal = dec!(0.2);

/// Large-group blend `β` between the proportional share and the
/// logarithmic share: `Tᵢ = (1−β)·sᵢ + β·ln(1+Sᵢ)/Σln(1+Sⱼ)`.
pub const LARGE_GROUP_LOG_BLEND: Decimal = dec!(0.5);

/// Large-group smoothing `γ` in `Bᵢ = 1 − γ × (Tᵢ − 1/n)`.
///
/// `γ = 0.1` pulls blended shares mildly toward the mean while keeping
/// `Tᵢ·Bᵢ` strictly increasing in `Tᵢ` (derivative `1 − 2γT + γ/n > 0`
/// for `γ ≤ 0.1`, `T ≤ 1`).
pub const LARGE_GROUP_SMOOTHING: Decimal = dec!(0.1);

/// Smallest participant count handled by the small-group formula.
pub const SMALL_GROUP_MIN: usize = 3;
/// Largest participant count handled by the small-group formula; larger
/// sets use the large-group formula.
pub const SMALL_GROUP_MAX: usize = 10;

/// Tolerance for percentage-sum assertions. Merit points themselves sum to
/// the pool exactly; percentages are derived by division and may carry a
/// sub-epsilon residue.
pub const MERIT_EPSILON: Decimal = dec!(0.000001);

// ---------------------------------------------------------------------------
// Equity / self-investment
// ---------------------------------------------------------------------------

/// Ceiling for a single self-investment unless configured otherwise.
pub const DEFAULT_MAX_SELF_INVESTMENT: Decimal = dec!(10.00);

/// 100% — the pre-dilution equity of the original holder.
pub const FULL_EQUITY: Decimal = dec!(100);
