//! The compensation engine facade.
//!
//! One value owns the whole core state: the contribution log (wrapped in a
//! `RwLock`), the per-work-item calculation registry, entity valuations,
//! the self-investment record, and the points ledger. Mutations to a
//! single calculation are serialized by its registry mutex; account
//! mutations are serialized inside the ledger. Valuation updates lock the
//! valuation entry first and the funding account second — a one-way lock
//! hierarchy, so the two registries cannot deadlock against each other.
//!
//! Finalization is credit-then-flip under the calculation lock: the
//! ledger credits are applied first (validated upfront, so the batch
//! cannot partially fail) and the draft→finalized transition follows
//! immediately; a credit failure leaves the calculation in draft.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info};

use divvy_core::constants::FULL_EQUITY;
use divvy_core::contribution::{ContributionLog, NewContribution};
use divvy_core::error::{EngineError, EquityError, LedgerError, MeritError};
use divvy_core::types::{
    AccountId, ChangeType, ContributionRecord, EntityId, EntityType, ParticipantContribution,
    ParticipantId, ProjectId, VotingRoundId, WorkItemId,
};
use divvy_core::valuation::{dilute, EntityValuation, SelfInvestment};
use divvy_ledger::{Ledger, PointsAccount, PointsLedgerEntry};
use divvy_merit::{MeritCalculation, ParticipantInput};

use crate::config::{EngineConfig, FundingSource};
use crate::deadline::{check, Deadline};

/// One edit in a draft save: upsert a participant's contribution (and
/// optionally its role weight), or remove a participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticipantEdit {
    Upsert {
        participant_id: ParticipantId,
        contribution_value: Decimal,
        /// `None` keeps the existing weight (or 1 for a new participant).
        role_weight: Option<Decimal>,
    },
    Remove { participant_id: ParticipantId },
}

/// The compensation engine: contribution aggregation, merit calculation
/// lifecycle, equity dilution, and the points ledger behind one facade.
pub struct CompensationEngine {
    config: EngineConfig,
    contributions: RwLock<ContributionLog>,
    calculations: DashMap<WorkItemId, Arc<Mutex<MeritCalculation>>>,
    valuations: DashMap<(EntityType, EntityId), Arc<Mutex<Decimal>>>,
    investments: Mutex<Vec<SelfInvestment>>,
    ledger: Ledger,
    next_calculation_id: AtomicU64,
    next_investment_id: AtomicU64,
}

impl CompensationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            contributions: RwLock::new(ContributionLog::new()),
            calculations: DashMap::new(),
            valuations: DashMap::new(),
            investments: Mutex::new(Vec::new()),
            ledger: Ledger::new(),
            next_calculation_id: AtomicU64::new(1),
            next_investment_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Contribution records
    // ------------------------------------------------------------------

    /// Validate and append a contribution record.
    pub fn add_contribution_record(
        &self,
        input: NewContribution,
    ) -> Result<ContributionRecord, EngineError> {
        let mut log = self.contributions.write();
        let record = log.record(input, Utc::now())?.clone();
        debug!(
            record = record.id,
            work_item = %record.work_item_id,
            contributor = %record.contributor_id,
            "contribution recorded"
        );
        Ok(record)
    }

    /// Per-participant weighted totals for a work item, ascending by
    /// participant id.
    pub fn participant_contributions(
        &self,
        work_item_id: WorkItemId,
    ) -> Vec<ParticipantContribution> {
        self.contributions.read().participant_contributions(work_item_id)
    }

    /// The raw records for a work item, in insertion order.
    pub fn contribution_records(&self, work_item_id: WorkItemId) -> Vec<ContributionRecord> {
        self.contributions
            .read()
            .records_for(work_item_id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Merit calculation lifecycle
    // ------------------------------------------------------------------

    /// Create the draft calculation for a completed work item from its
    /// aggregated contributions.
    ///
    /// # Errors
    ///
    /// - [`MeritError::NoParticipants`] if the work item has no records
    /// - [`EngineError::CalculationExists`] if a calculation was already
    ///   begun for this work item
    pub fn begin_calculation(
        &self,
        work_item_id: WorkItemId,
        pool: Option<Decimal>,
    ) -> Result<MeritCalculation, EngineError> {
        let totals = self.contributions.read().aggregate(work_item_id);
        if totals.is_empty() {
            return Err(MeritError::NoParticipants.into());
        }
        let inputs: Vec<ParticipantInput> = totals
            .into_iter()
            .map(|(participant_id, value)| ParticipantInput::new(participant_id, value))
            .collect();

        let pool = pool.unwrap_or(self.config.default_value_pool);
        let id = self.next_calculation_id.fetch_add(1, Ordering::Relaxed);
        let calc =
            MeritCalculation::new(id, work_item_id, inputs, pool, &self.config.tuning, Utc::now())
                .map_err(EngineError::from)?;

        match self.calculations.entry(work_item_id) {
            Entry::Occupied(_) => Err(EngineError::CalculationExists(work_item_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(calc.clone())));
                info!(
                    work_item = %work_item_id,
                    method = %calc.method(),
                    participants = calc.participants().len(),
                    "merit calculation drafted"
                );
                Ok(calc)
            }
        }
    }

    /// Snapshot of the calculation for a work item.
    pub fn get_calculation(
        &self,
        work_item_id: WorkItemId,
    ) -> Result<MeritCalculation, EngineError> {
        let cell = self
            .calculations
            .get(&work_item_id)
            .ok_or(EngineError::NotFound(work_item_id))?;
        let arc = Arc::clone(cell.value());
        drop(cell);
        let guard = arc.lock();
        Ok(guard.clone())
    }

    /// Apply a batch of draft edits under optimistic concurrency.
    ///
    /// The whole batch is applied to a scratch copy and swapped in only if
    /// every edit succeeds — a rejected edit leaves the stored calculation
    /// untouched.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown work item
    /// - [`EngineError::ConcurrentModification`] if `expected_version`
    ///   does not match the stored version (safe to re-read and retry)
    /// - [`MeritError::AlreadyFinalized`] once finalized
    /// - validation errors from the merit formulas
    pub fn save_calculation(
        &self,
        work_item_id: WorkItemId,
        edits: &[ParticipantEdit],
        expected_version: u64,
        deadline: Option<Deadline>,
    ) -> Result<MeritCalculation, EngineError> {
        check(deadline)?;
        let cell = self
            .calculations
            .get(&work_item_id)
            .ok_or(EngineError::NotFound(work_item_id))?;
        let arc = Arc::clone(cell.value());
        drop(cell);
        let mut calc = arc.lock();

        if calc.is_finalized() {
            return Err(MeritError::AlreadyFinalized.into());
        }
        if calc.version() != expected_version {
            return Err(EngineError::ConcurrentModification {
                expected: expected_version,
                found: calc.version(),
            });
        }

        let now = Utc::now();
        let tuning = &self.config.tuning;
        let mut draft = calc.clone();
        for edit in edits {
            match *edit {
                ParticipantEdit::Upsert {
                    participant_id,
                    contribution_value,
                    role_weight,
                } => {
                    if draft.participant(participant_id).is_some() {
                        draft.set_contribution(participant_id, contribution_value, tuning, now)?;
                        if let Some(weight) = role_weight {
                            draft.set_role_weight(participant_id, weight, tuning, now)?;
                        }
                    } else {
                        draft.add_participant(
                            participant_id,
                            contribution_value,
                            role_weight.unwrap_or(Decimal::ONE),
                            tuning,
                            now,
                        )?;
                    }
                }
                ParticipantEdit::Remove { participant_id } => {
                    draft.remove_participant(participant_id, tuning, now)?;
                }
            }
        }

        *calc = draft;
        debug!(
            work_item = %work_item_id,
            version = calc.version(),
            "merit calculation saved"
        );
        Ok(calc.clone())
    }

    /// Finalize a draft calculation and credit each participant's merit
    /// points to the ledger, atomically with the state flip.
    ///
    /// One Earn entry is recorded per participant with positive merit
    /// points; zero-point participants produce no entry. A second call
    /// fails with [`MeritError::AlreadyFinalized`] and credits nothing.
    pub fn finalize_calculation(
        &self,
        work_item_id: WorkItemId,
        deadline: Option<Deadline>,
    ) -> Result<MeritCalculation, EngineError> {
        check(deadline)?;
        let cell = self
            .calculations
            .get(&work_item_id)
            .ok_or(EngineError::NotFound(work_item_id))?;
        let arc = Arc::clone(cell.value());
        drop(cell);
        let mut calc = arc.lock();

        if calc.is_finalized() {
            return Err(MeritError::AlreadyFinalized.into());
        }

        let credits: Vec<(AccountId, Decimal)> = calc
            .awards()
            .into_iter()
            .filter(|award| award.merit_points > Decimal::ZERO)
            .map(|award| (account_for(award.participant_id), award.merit_points))
            .collect();

        let now = Utc::now();
        let reason = format!("merit award for work item {work_item_id}");
        // Credits are validated before any commit; once they pass, the
        // batch cannot partially fail, so the flip below always follows a
        // fully-applied credit set.
        self.ledger
            .credit_many(&credits, ChangeType::Earn, &reason, None, now)?;
        calc.finalize(now)?;

        info!(
            work_item = %work_item_id,
            participants = calc.participants().len(),
            pool = %calc.total_value_pool(),
            "merit calculation finalized"
        );
        Ok(calc.clone())
    }

    // ------------------------------------------------------------------
    // Valuation / self-investment
    // ------------------------------------------------------------------

    /// Current valuation of an entity (0 for an unknown entity).
    pub fn valuation(&self, entity_type: EntityType, entity_id: EntityId) -> Decimal {
        self.valuations
            .get(&(entity_type, entity_id))
            .map(|cell| *cell.value().lock())
            .unwrap_or(Decimal::ZERO)
    }

    /// Full valuation record for an entity (zero baseline if unknown).
    pub fn entity_valuation(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> EntityValuation {
        EntityValuation {
            entity_type,
            entity_id,
            current_valuation: self.valuation(entity_type, entity_id),
        }
    }

    /// Set an entity's valuation baseline.
    pub fn set_valuation(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        valuation: Decimal,
    ) -> Result<(), EngineError> {
        if valuation < Decimal::ZERO {
            return Err(EquityError::InvalidValuation(valuation).into());
        }
        let cell = self.valuation_cell(entity_type, entity_id);
        *cell.lock() = valuation;
        Ok(())
    }

    /// Apply a self-funded capital injection: raise the entity's
    /// valuation, dilute the holder, debit the configured funding source,
    /// and record the investment immutably.
    ///
    /// # Errors
    ///
    /// - [`EquityError::InvestmentOutOfRange`] unless
    ///   `0 < amount ≤ max_self_investment`
    /// - [`EquityError::InsufficientBalance`] if the points-balance
    ///   funding debit is not covered; the valuation is left unchanged
    pub fn create_self_investment(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        amount: Decimal,
        voting_round_id: VotingRoundId,
        deadline: Option<Deadline>,
    ) -> Result<SelfInvestment, EngineError> {
        check(deadline)?;
        let cell = self.valuation_cell(entity_type, entity_id);
        let mut valuation = cell.lock();

        let outcome = dilute(*valuation, amount, self.config.max_self_investment)
            .map_err(EngineError::from)?;

        let now = Utc::now();
        if self.config.funding == FundingSource::PointsBalance {
            let account = AccountId(entity_id.0);
            self.ledger
                .apply_entry(
                    account,
                    ChangeType::Spend,
                    -amount,
                    "self-investment",
                    None,
                    now,
                )
                .map_err(|err| match err {
                    LedgerError::InsufficientPoints { have, need } => {
                        EngineError::Equity(EquityError::InsufficientBalance { have, need })
                    }
                    other => EngineError::Ledger(other),
                })?;
        }

        let investment = SelfInvestment {
            id: self.next_investment_id.fetch_add(1, Ordering::Relaxed),
            entity_type,
            entity_id,
            amount,
            voting_round_id,
            valuation_before: *valuation,
            valuation_after: outcome.valuation_after,
            equity_before: FULL_EQUITY,
            equity_after: outcome.equity_after,
            investor_share: outcome.investor_share,
            created_at: now,
        };
        *valuation = outcome.valuation_after;
        self.investments.lock().push(investment.clone());

        info!(
            entity = %entity_id,
            kind = %entity_type,
            amount = %amount,
            valuation = %investment.valuation_after,
            "self-investment applied"
        );
        Ok(investment)
    }

    /// All investments recorded for an entity, in creation order.
    pub fn investments_for(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Vec<SelfInvestment> {
        self.investments
            .lock()
            .iter()
            .filter(|i| i.entity_type == entity_type && i.entity_id == entity_id)
            .cloned()
            .collect()
    }

    fn valuation_cell(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
    ) -> Arc<Mutex<Decimal>> {
        let entry = self.valuations.entry((entity_type, entity_id)).or_default();
        Arc::clone(entry.value())
    }

    // ------------------------------------------------------------------
    // Ledger operations
    // ------------------------------------------------------------------

    pub fn apply_ledger_entry(
        &self,
        account_id: AccountId,
        change_type: ChangeType,
        points: Decimal,
        reason: &str,
        related_project_id: Option<ProjectId>,
        deadline: Option<Deadline>,
    ) -> Result<PointsLedgerEntry, EngineError> {
        check(deadline)?;
        let entry = self.ledger.apply_entry(
            account_id,
            change_type,
            points,
            reason,
            related_project_id,
            Utc::now(),
        )?;
        debug!(
            account = %account_id,
            change = %change_type,
            points = %points,
            balance = %entry.balance_after,
            "ledger entry applied"
        );
        Ok(entry)
    }

    pub fn transfer_points(
        &self,
        from: AccountId,
        to: AccountId,
        points: Decimal,
        reason: &str,
        deadline: Option<Deadline>,
    ) -> Result<(PointsLedgerEntry, PointsLedgerEntry), EngineError> {
        check(deadline)?;
        let pair = self.ledger.transfer(from, to, points, reason, Utc::now())?;
        info!(%from, %to, points = %points, "points transferred");
        Ok(pair)
    }

    pub fn account_summary(&self, account_id: AccountId) -> PointsAccount {
        self.ledger.summary(account_id)
    }

    pub fn account_entries(&self, account_id: AccountId) -> Vec<PointsLedgerEntry> {
        self.ledger.entries(account_id)
    }

    /// Replay an account's history from zero, verifying every stored
    /// balance.
    pub fn audit_account(&self, account_id: AccountId) -> Result<Decimal, EngineError> {
        Ok(self.ledger.audit(account_id)?)
    }
}

impl Default for CompensationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Points accounts are keyed by user id; participants are users, so the
/// mapping is the identity on the inner id.
fn account_for(participant: ParticipantId) -> AccountId {
    AccountId(participant.0)
}
