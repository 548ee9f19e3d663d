//! Shared test helpers for E2E and adversarial tests.

use rust_decimal::Decimal;

use divvy_core::contribution::NewContribution;
use divvy_core::types::{
    AccountId, ChangeType, ContributionType, ParticipantId, WorkItemId,
};
use divvy_engine::CompensationEngine;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A task-completion contribution with a fixed recorder.
pub fn contribution(
    work_item: u64,
    contributor: u64,
    score: Decimal,
    weight: Decimal,
) -> NewContribution {
    NewContribution {
        work_item_id: WorkItemId(work_item),
        contributor_id: ParticipantId(contributor),
        contribution_type: ContributionType::TaskCompletion,
        raw_score: score,
        weight,
        recorder_id: ParticipantId(1000),
        evidence: None,
    }
}

/// A peer-evaluation contribution from a specific recorder.
pub fn peer_evaluation(
    work_item: u64,
    contributor: u64,
    recorder: u64,
    score: Decimal,
    weight: Decimal,
) -> NewContribution {
    NewContribution {
        work_item_id: WorkItemId(work_item),
        contributor_id: ParticipantId(contributor),
        contribution_type: ContributionType::PeerEvaluation,
        raw_score: score,
        weight,
        recorder_id: ParticipantId(recorder),
        evidence: None,
    }
}

/// Seed an account with earned points.
pub fn seed_points(engine: &CompensationEngine, account: u64, amount: Decimal) {
    engine
        .apply_ledger_entry(
            AccountId(account),
            ChangeType::Earn,
            amount,
            "seed",
            None,
            None,
        )
        .expect("seeding points");
}

/// Sum of available points over a set of accounts.
pub fn total_available(engine: &CompensationEngine, accounts: &[u64]) -> Decimal {
    accounts
        .iter()
        .map(|&a| engine.account_summary(AccountId(a)).available_points)
        .sum()
}
