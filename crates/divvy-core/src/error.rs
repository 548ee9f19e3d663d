//! Error types for the Divvy engine.
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{AccountId, ChangeType, ParticipantId, WorkItemId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContributionError {
    #[error("invalid contribution value: {field} = {value} outside [{min}, {max}]")]
    InvalidContributionValue {
        field: &'static str,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeritError {
    #[error("no participants")] NoParticipants,
    #[error("calculation already finalized")] AlreadyFinalized,
    #[error("duplicate participant: {0}")] DuplicateParticipant(ParticipantId),
    #[error("unknown participant: {0}")] UnknownParticipant(ParticipantId),
    #[error("invalid contribution value for participant {participant}: {value}")]
    InvalidContributionValue { participant: ParticipantId, value: Decimal },
    #[error("invalid role weight for participant {participant}: {value}")]
    InvalidRoleWeight { participant: ParticipantId, value: Decimal },
    #[error("invalid value pool: {0}")] InvalidValuePool(Decimal),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid ledger delta: {change_type} entry with {points} points")]
    InvalidLedgerDelta { change_type: ChangeType, points: Decimal },
    #[error("insufficient points: have {have}, need {need}")]
    InsufficientPoints { have: Decimal, need: Decimal },
    #[error("invalid transfer target: account {0} cannot transfer to itself")]
    InvalidTransferTarget(AccountId),
    #[error("replay mismatch at entry {entry_id}: stored {stored}, replayed {replayed}")]
    ReplayMismatch { entry_id: u64, stored: Decimal, replayed: Decimal },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EquityError {
    #[error("investment out of range: {amount} (allowed 0 < amount <= {max})")]
    InvestmentOutOfRange { amount: Decimal, max: Decimal },
    #[error("invalid valuation: {0}")] InvalidValuation(Decimal),
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Decimal, need: Decimal },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)] Contribution(#[from] ContributionError),
    #[error(transparent)] Merit(#[from] MeritError),
    #[error(transparent)] Ledger(#[from] LedgerError),
    #[error(transparent)] Equity(#[from] EquityError),
    #[error("no calculation found for work item {0}")] NotFound(WorkItemId),
    #[error("calculation already exists for work item {0}")] CalculationExists(WorkItemId),
    #[error("concurrent modification: expected version {expected}, found {found}")]
    ConcurrentModification { expected: u64, found: u64 },
    #[error("deadline exceeded before mutation")] DeadlineExceeded,
}
