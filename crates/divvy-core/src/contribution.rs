//! Append-only contribution log and the per-work-item aggregator.
//!
//! The log stores every accepted [`ContributionRecord`] and maintains a
//! secondary index by work item for O(1) lookup of a work item's records.
//! Records are immutable once accepted; corrections are additional records.
//!
//! Out-of-range scores and weights are rejected at ingestion with
//! [`ContributionError::InvalidContributionValue`] — never silently clamped.
//!
//! Not thread-safe — callers should wrap the log in a `Mutex` or `RwLock`
//! if concurrent access is needed.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::constants::{MAX_RAW_SCORE, MAX_RECORD_WEIGHT, MIN_RAW_SCORE, MIN_RECORD_WEIGHT};
use crate::error::ContributionError;
use crate::types::{
    ContributionRecord, ContributionType, ParticipantContribution, ParticipantId, WorkItemId,
};

/// Input for one new contribution record, before the log assigns its id
/// and timestamp.
#[derive(Clone, Debug)]
pub struct NewContribution {
    pub work_item_id: WorkItemId,
    pub contributor_id: ParticipantId,
    pub contribution_type: ContributionType,
    pub raw_score: Decimal,
    pub weight: Decimal,
    pub recorder_id: ParticipantId,
    pub evidence: Option<String>,
}

/// Validate a raw score against the ingestion bounds `[0, 100]`.
pub fn validate_score(value: Decimal) -> Result<(), ContributionError> {
    if value < MIN_RAW_SCORE || value > MAX_RAW_SCORE {
        return Err(ContributionError::InvalidContributionValue {
            field: "raw_score",
            value,
            min: MIN_RAW_SCORE,
            max: MAX_RAW_SCORE,
        });
    }
    Ok(())
}

/// Validate a record weight against the ingestion bounds `[0, 1]`.
pub fn validate_weight(value: Decimal) -> Result<(), ContributionError> {
    if value < MIN_RECORD_WEIGHT || value > MAX_RECORD_WEIGHT {
        return Err(ContributionError::InvalidContributionValue {
            field: "weight",
            value,
            min: MIN_RECORD_WEIGHT,
            max: MAX_RECORD_WEIGHT,
        });
    }
    Ok(())
}

/// Append-only store of contribution records with a by-work-item index.
pub struct ContributionLog {
    /// All accepted records in insertion order.
    records: Vec<ContributionRecord>,
    /// Work item → indexes into `records`.
    by_work_item: HashMap<WorkItemId, Vec<usize>>,
    /// Next record sequence id.
    next_id: u64,
}

impl ContributionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            by_work_item: HashMap::new(),
            next_id: 1,
        }
    }

    /// Validate and append a new record.
    ///
    /// # Errors
    ///
    /// [`ContributionError::InvalidContributionValue`] if `raw_score` is
    /// outside `[0, 100]` or `weight` is outside `[0, 1]`. The record is
    /// not stored on rejection.
    pub fn record(
        &mut self,
        input: NewContribution,
        now: DateTime<Utc>,
    ) -> Result<&ContributionRecord, ContributionError> {
        validate_score(input.raw_score)?;
        validate_weight(input.weight)?;

        let record = ContributionRecord {
            id: self.next_id,
            work_item_id: input.work_item_id,
            contributor_id: input.contributor_id,
            contribution_type: input.contribution_type,
            raw_score: input.raw_score,
            weight: input.weight,
            recorder_id: input.recorder_id,
            evidence: input.evidence,
            created_at: now,
        };
        self.next_id += 1;

        let index = self.records.len();
        self.by_work_item
            .entry(record.work_item_id)
            .or_default()
            .push(index);
        self.records.push(record);
        Ok(&self.records[index])
    }

    /// All records for a work item, in insertion order.
    pub fn records_for(&self, work_item_id: WorkItemId) -> Vec<&ContributionRecord> {
        self.by_work_item
            .get(&work_item_id)
            .map(|indexes| indexes.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Aggregate a work item's records into per-participant weighted totals.
    ///
    /// `total = Σ(raw_score × weight)` over each participant's records, at
    /// full decimal precision. Returns an ordered map (ascending
    /// participant id); empty if the work item has no records. Pure
    /// read-aggregate — no side effects.
    pub fn aggregate(&self, work_item_id: WorkItemId) -> BTreeMap<ParticipantId, Decimal> {
        let mut totals = BTreeMap::new();
        for record in self.records_for(work_item_id) {
            let weighted = record.raw_score * record.weight;
            *totals.entry(record.contributor_id).or_insert(Decimal::ZERO) += weighted;
        }
        totals
    }

    /// Per-participant contribution summaries for a work item, ordered by
    /// ascending participant id.
    pub fn participant_contributions(
        &self,
        work_item_id: WorkItemId,
    ) -> Vec<ParticipantContribution> {
        let mut counts: BTreeMap<ParticipantId, usize> = BTreeMap::new();
        for record in self.records_for(work_item_id) {
            *counts.entry(record.contributor_id).or_insert(0) += 1;
        }
        let totals = self.aggregate(work_item_id);
        totals
            .into_iter()
            .map(|(participant_id, total_weighted_score)| ParticipantContribution {
                work_item_id,
                participant_id,
                total_weighted_score,
                record_count: counts.get(&participant_id).copied().unwrap_or(0),
            })
            .collect()
    }

    /// Total number of records in the log.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ContributionLog {
    fn default() -> Self {
        Self::new()
    }
}
