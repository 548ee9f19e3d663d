//! Merit calculation lifecycle: a two-state machine around the allocation
//! formulas.
//!
//! A calculation is created in `Draft` when a work item completes. While
//! draft, the participant set and contribution values may change; every
//! mutation re-selects the allocation method and recomputes the whole
//! merit vector from scratch — never incrementally, so repeated edits can
//! not drift. `Finalized` is terminal: the vector is immutable forever and
//! any further mutation fails with `AlreadyFinalized`.
//!
//! The `version` counter increments on every draft mutation and backs
//! optimistic concurrency at the service boundary (stale saves are
//! rejected).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use divvy_core::error::MeritError;
use divvy_core::types::{ParticipantId, WorkItemId};

use crate::formula::{allocate, AllocationTuning, ParticipantInput};
use crate::method::AllocationMethod;

/// One participant's slot in a calculation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MeritParticipant {
    pub participant_id: ParticipantId,
    /// Aggregated weighted contribution total.
    pub contribution_value: Decimal,
    /// Role/position weight (small-group formula).
    pub role_weight: Decimal,
    /// Absolute merit points allocated from the pool.
    pub merit_points: Decimal,
    /// `merit_points / total_value_pool × 100`.
    pub merit_percentage: Decimal,
}

/// Lifecycle state. `Finalized` is terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CalculationState {
    Draft,
    Finalized,
}

/// A finalized participant credit, handed to the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeritAward {
    pub participant_id: ParticipantId,
    pub merit_points: Decimal,
}

/// A merit calculation for one work item.
///
/// Participants are kept ordered by ascending participant id; the merit
/// vector sums to `total_value_pool` exactly (see
/// [`formula::renormalize`](crate::formula::renormalize)).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MeritCalculation {
    id: u64,
    work_item_id: WorkItemId,
    method: AllocationMethod,
    total_value_pool: Decimal,
    participants: Vec<MeritParticipant>,
    state: CalculationState,
    version: u64,
    calculated_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl MeritCalculation {
    /// Create a draft calculation and compute its initial merit vector.
    ///
    /// Inputs are sorted by participant id; duplicates are rejected.
    ///
    /// # Errors
    ///
    /// - [`MeritError::NoParticipants`] for an empty input set
    /// - [`MeritError::DuplicateParticipant`] for a repeated participant id
    /// - validation errors from [`allocate`]
    pub fn new(
        id: u64,
        work_item_id: WorkItemId,
        mut inputs: Vec<ParticipantInput>,
        total_value_pool: Decimal,
        tuning: &AllocationTuning,
        now: DateTime<Utc>,
    ) -> Result<Self, MeritError> {
        inputs.sort_by_key(|i| i.participant_id);
        for pair in inputs.windows(2) {
            if pair[0].participant_id == pair[1].participant_id {
                return Err(MeritError::DuplicateParticipant(pair[1].participant_id));
            }
        }

        let mut calc = Self {
            id,
            work_item_id,
            method: AllocationMethod::for_count(inputs.len())?,
            total_value_pool,
            participants: inputs
                .into_iter()
                .map(|input| MeritParticipant {
                    participant_id: input.participant_id,
                    contribution_value: input.contribution_value,
                    role_weight: input.role_weight,
                    merit_points: Decimal::ZERO,
                    merit_percentage: Decimal::ZERO,
                })
                .collect(),
            state: CalculationState::Draft,
            version: 0,
            calculated_at: now,
            finalized_at: None,
        };
        calc.recompute(tuning, now)?;
        Ok(calc)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn work_item_id(&self) -> WorkItemId {
        self.work_item_id
    }

    pub fn method(&self) -> AllocationMethod {
        self.method
    }

    pub fn total_value_pool(&self) -> Decimal {
        self.total_value_pool
    }

    /// Participants in ascending participant-id order.
    pub fn participants(&self) -> &[MeritParticipant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&MeritParticipant> {
        self.participants.iter().find(|p| p.participant_id == id)
    }

    pub fn state(&self) -> CalculationState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == CalculationState::Finalized
    }

    /// Optimistic-concurrency version, bumped on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn calculated_at(&self) -> DateTime<Utc> {
        self.calculated_at
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// The per-participant credits a finalize hands to the ledger.
    pub fn awards(&self) -> Vec<MeritAward> {
        self.participants
            .iter()
            .map(|p| MeritAward {
                participant_id: p.participant_id,
                merit_points: p.merit_points,
            })
            .collect()
    }

    /// Add a participant and recompute. Draft only.
    ///
    /// Method selection is re-evaluated: adding the third participant
    /// moves a duo calculation to the small-group formula, and so on.
    pub fn add_participant(
        &mut self,
        participant_id: ParticipantId,
        contribution_value: Decimal,
        role_weight: Decimal,
        tuning: &AllocationTuning,
        now: DateTime<Utc>,
    ) -> Result<(), MeritError> {
        self.ensure_draft()?;
        if self.participant(participant_id).is_some() {
            return Err(MeritError::DuplicateParticipant(participant_id));
        }
        let slot = MeritParticipant {
            participant_id,
            contribution_value,
            role_weight,
            merit_points: Decimal::ZERO,
            merit_percentage: Decimal::ZERO,
        };
        let at = self
            .participants
            .partition_point(|p| p.participant_id < participant_id);
        self.participants.insert(at, slot);
        if let Err(e) = self.recompute(tuning, now) {
            self.participants.remove(at);
            return Err(e);
        }
        Ok(())
    }

    /// Remove a participant and recompute. Draft only.
    ///
    /// Removing the last participant is rejected with
    /// [`MeritError::NoParticipants`]; a calculation never exists empty.
    pub fn remove_participant(
        &mut self,
        participant_id: ParticipantId,
        tuning: &AllocationTuning,
        now: DateTime<Utc>,
    ) -> Result<(), MeritError> {
        self.ensure_draft()?;
        let at = self
            .participants
            .iter()
            .position(|p| p.participant_id == participant_id)
            .ok_or(MeritError::UnknownParticipant(participant_id))?;
        if self.participants.len() == 1 {
            return Err(MeritError::NoParticipants);
        }
        self.participants.remove(at);
        self.recompute(tuning, now)
    }

    /// Update a participant's contribution value and recompute the whole
    /// vector from scratch. Draft only.
    pub fn set_contribution(
        &mut self,
        participant_id: ParticipantId,
        contribution_value: Decimal,
        tuning: &AllocationTuning,
        now: DateTime<Utc>,
    ) -> Result<(), MeritError> {
        self.ensure_draft()?;
        let at = self
            .participants
            .iter()
            .position(|p| p.participant_id == participant_id)
            .ok_or(MeritError::UnknownParticipant(participant_id))?;
        let previous = self.participants[at].contribution_value;
        self.participants[at].contribution_value = contribution_value;
        if let Err(e) = self.recompute(tuning, now) {
            self.participants[at].contribution_value = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Update a participant's role weight and recompute. Draft only.
    pub fn set_role_weight(
        &mut self,
        participant_id: ParticipantId,
        role_weight: Decimal,
        tuning: &AllocationTuning,
        now: DateTime<Utc>,
    ) -> Result<(), MeritError> {
        self.ensure_draft()?;
        let at = self
            .participants
            .iter()
            .position(|p| p.participant_id == participant_id)
            .ok_or(MeritError::UnknownParticipant(participant_id))?;
        let previous = self.participants[at].role_weight;
        self.participants[at].role_weight = role_weight;
        if let Err(e) = self.recompute(tuning, now) {
            self.participants[at].role_weight = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Transition draft → finalized. Terminal; the vector becomes
    /// immutable.
    ///
    /// # Errors
    ///
    /// [`MeritError::AlreadyFinalized`] on a second call; the merit vector
    /// is left untouched.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<(), MeritError> {
        self.ensure_draft()?;
        self.state = CalculationState::Finalized;
        self.finalized_at = Some(now);
        self.version += 1;
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), MeritError> {
        match self.state {
            CalculationState::Draft => Ok(()),
            CalculationState::Finalized => Err(MeritError::AlreadyFinalized),
        }
    }

    /// Re-select the method and rebuild the merit vector from the current
    /// participant set.
    fn recompute(&mut self, tuning: &AllocationTuning, now: DateTime<Utc>) -> Result<(), MeritError> {
        let inputs: Vec<ParticipantInput> = self
            .participants
            .iter()
            .map(|p| ParticipantInput {
                participant_id: p.participant_id,
                contribution_value: p.contribution_value,
                role_weight: p.role_weight,
            })
            .collect();

        let (method, merits) = allocate(&inputs, self.total_value_pool, tuning)?;
        self.method = method;
        for (slot, points) in self.participants.iter_mut().zip(merits) {
            slot.merit_points = points;
            slot.merit_percentage = points / self.total_value_pool * Decimal::ONE_HUNDRED;
        }
        self.calculated_at = now;
        self.version += 1;
        Ok(())
    }
}
