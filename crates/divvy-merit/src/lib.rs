//! # divvy-merit — Merit calculation engine.
//!
//! Distributes a fixed value pool across a work item's participants
//! according to a group-size-dependent formula:
//!
//! - **Method selection** is deterministic on participant count
//!   (1 → single, 2 → duo, 3–10 → small group, >10 → large group) and
//!   re-evaluated whenever the participant set changes.
//! - **One named pure function per method**: proportional splits adjusted
//!   by an imbalance factor (duo), a spread factor around the mean share
//!   (small group), or a logarithmic tail compression (large group), each
//!   renormalized so the vector sums to the pool exactly.
//! - **Draft → finalized lifecycle**: a calculation is mutable only while
//!   draft; finalize is a guarded one-way transition, after which the
//!   participant vector is immutable forever.

pub mod calculation;
pub mod formula;
pub mod method;

pub use calculation::{CalculationState, MeritAward, MeritCalculation, MeritParticipant};
pub use formula::{AllocationTuning, ParticipantInput};
pub use method::AllocationMethod;
