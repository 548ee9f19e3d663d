//! # divvy-core
//! Foundation types for the Divvy compensation engine: typed identifiers,
//! contribution records and their append-only log, the contribution
//! aggregator, self-investment equity math, and the error taxonomy shared
//! by all Divvy crates.

pub mod constants;
pub mod contribution;
pub mod error;
pub mod types;
pub mod valuation;
