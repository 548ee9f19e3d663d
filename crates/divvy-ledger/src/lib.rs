//! # divvy-ledger — Points ledger store.
//!
//! Per-account point balances with an append-only history of signed
//! deltas:
//!
//! - **Sign discipline**: the sign of every entry is derived from its
//!   change type; mismatched or zero deltas are rejected.
//! - **Non-negative balances**: a debit that would drive available points
//!   below zero fails and is not recorded.
//! - **Chained balances**: every entry's `balance_after` is computed from
//!   the immediately-preceding entry's `balance_after` (or 0), never from
//!   a cached counter — replaying an account's history from zero
//!   reproduces every stored balance exactly.
//! - **Atomic transfers**: a two-account transfer takes both account
//!   locks in ascending account-id order and records both entries or
//!   neither.

pub mod account;
pub mod entry;
pub mod store;

pub use account::PointsAccount;
pub use entry::{replay, PointsLedgerEntry};
pub use store::Ledger;
