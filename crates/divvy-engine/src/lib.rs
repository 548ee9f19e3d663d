//! # divvy-engine — Service facade for the Divvy compensation engine.
//!
//! Wires the contribution log, the per-work-item calculation registry,
//! entity valuations, and the points ledger behind the engine's public
//! operations. All state lives in the [`CompensationEngine`] value — no
//! process-wide singletons; callers share the engine explicitly (e.g.
//! behind an `Arc`) and every operation serializes per work item or per
//! account internally.

pub mod config;
pub mod deadline;
pub mod engine;

pub use config::{EngineConfig, FundingSource};
pub use deadline::Deadline;
pub use engine::{CompensationEngine, ParticipantEdit};
