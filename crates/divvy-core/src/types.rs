//! Core domain types: identifiers, contribution records, ledger change types.
//!
//! All score and point quantities are `rust_decimal::Decimal` — totals keep
//! full decimal precision, and rounding happens only at presentation
//! boundaries. All timestamps are `chrono::DateTime<Utc>`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of collaborative work (task) whose completion triggers merit
/// distribution.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct WorkItemId(pub u64);

/// A member taking part in a work item.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct ParticipantId(pub u64);

/// A points account. Accounts are keyed per user; the `Ord` impl defines
/// the global lock-acquisition order for multi-account operations.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct AccountId(pub u64);

/// A project, referenced from ledger entries that relate to project work.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct ProjectId(pub u64);

/// The voting round a self-investment was made in.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct VotingRoundId(pub u64);

/// An entity (user or project) holding a valuation.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct EntityId(pub u64);

macro_rules! impl_id_display {
    ($($t:ty),*) => {$(
        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    )*};
}

impl_id_display!(
    WorkItemId,
    ParticipantId,
    AccountId,
    ProjectId,
    VotingRoundId,
    EntityId
);

/// What kind of entity a valuation or investment belongs to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Project,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// The activity category a contribution record was observed in.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    /// Direct task work.
    TaskCompletion,
    /// A peer evaluation submitted about another participant.
    PeerEvaluation,
    /// Supporting work (reviews, coordination, unblocking others).
    ProjectSupport,
    /// Novel ideas or process improvements credited to a participant.
    Innovation,
}

/// An immutable record of one observed contribution.
///
/// Records are append-only: corrections are additional records, never edits
/// or deletions. A participant may have any number of records per work item.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContributionRecord {
    /// Sequence id assigned by the log.
    pub id: u64,
    pub work_item_id: WorkItemId,
    /// The participant being credited.
    pub contributor_id: ParticipantId,
    pub contribution_type: ContributionType,
    /// Raw score in `[0, 100]`.
    pub raw_score: Decimal,
    /// Weight in `[0, 1]` applied to the raw score when aggregating.
    pub weight: Decimal,
    /// The evaluator who recorded this contribution.
    pub recorder_id: ParticipantId,
    /// Optional free-text evidence reference.
    pub evidence: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Derived per-participant total for one work item. Not stored — computed
/// from the contribution log on demand.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParticipantContribution {
    pub work_item_id: WorkItemId,
    pub participant_id: ParticipantId,
    /// `Σ(raw_score × weight)` over the participant's records, full precision.
    pub total_weighted_score: Decimal,
    /// Number of records contributing to the total.
    pub record_count: usize,
}

/// Direction-bearing classification of a ledger entry.
///
/// The sign of an entry's points is derived from its change type; a
/// mismatched sign is rejected at the ledger boundary.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Earn,
    Spend,
    TransferIn,
    TransferOut,
    Reward,
    Penalty,
    Refund,
}

impl ChangeType {
    /// Whether entries of this type carry positive points.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Earn | Self::TransferIn | Self::Reward | Self::Refund
        )
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Earn => "earn",
            Self::Spend => "spend",
            Self::TransferIn => "transfer_in",
            Self::TransferOut => "transfer_out",
            Self::Reward => "reward",
            Self::Penalty => "penalty",
            Self::Refund => "refund",
        };
        write!(f, "{s}")
    }
}
