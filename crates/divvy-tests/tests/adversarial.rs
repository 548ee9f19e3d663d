//! Adversarial concurrency tests: interleaved transfers, finalize races,
//! optimistic-save conflicts, and overspend hammering.

use std::thread;

use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use divvy_core::error::EngineError;
use divvy_core::types::{AccountId, ChangeType, EntityId, EntityType, ParticipantId, VotingRoundId, WorkItemId};
use divvy_engine::{CompensationEngine, ParticipantEdit};
use divvy_tests::helpers::{contribution, seed_points, total_available};

#[test]
fn concurrent_transfers_conserve_the_total() {
    let engine = CompensationEngine::default();
    let accounts = [1u64, 2, 3, 4];
    for &a in &accounts {
        seed_points(&engine, a, dec!(250));
    }

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let mut rng = thread_rng();
                for _ in 0..50 {
                    let from = accounts[rng.gen_range(0..accounts.len())];
                    let to = accounts[rng.gen_range(0..accounts.len())];
                    if from == to {
                        continue;
                    }
                    let amount = Decimal::from(rng.gen_range(1u64..=20));
                    // Insufficient-balance failures are expected noise.
                    let _ = engine.transfer_points(
                        AccountId(from),
                        AccountId(to),
                        amount,
                        "stress",
                        None,
                    );
                }
            });
        }
    });

    assert_eq!(total_available(&engine, &accounts), dec!(1000));
    for &a in &accounts {
        let summary = engine.account_summary(AccountId(a));
        assert!(summary.available_points >= Decimal::ZERO);
        assert_eq!(
            engine.audit_account(AccountId(a)).unwrap(),
            summary.available_points,
            "replay diverged for account {a}"
        );
    }
}

#[test]
fn opposing_transfers_do_not_deadlock() {
    let engine = CompensationEngine::default();
    seed_points(&engine, 1, dec!(1000));
    seed_points(&engine, 2, dec!(1000));

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                let _ = engine.transfer_points(AccountId(1), AccountId(2), dec!(3), "ab", None);
            }
        });
        scope.spawn(|| {
            for _ in 0..200 {
                let _ = engine.transfer_points(AccountId(2), AccountId(1), dec!(3), "ba", None);
            }
        });
    });

    assert_eq!(total_available(&engine, &[1, 2]), dec!(2000));
    assert!(engine.audit_account(AccountId(1)).is_ok());
    assert!(engine.audit_account(AccountId(2)).is_ok());
}

#[test]
fn finalize_race_credits_exactly_once() {
    let engine = CompensationEngine::default();
    engine.add_contribution_record(contribution(1, 1, dec!(80), dec!(1))).unwrap();
    engine.add_contribution_record(contribution(1, 2, dec!(20), dec!(1))).unwrap();
    engine.begin_calculation(WorkItemId(1), None).unwrap();

    let outcomes: Vec<Result<_, EngineError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| engine.finalize_calculation(WorkItemId(1), None)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "finalize must succeed exactly once");

    assert_eq!(engine.account_entries(AccountId(1)).len(), 1);
    assert_eq!(engine.account_entries(AccountId(2)).len(), 1);
    assert_eq!(engine.account_summary(AccountId(1)).available_points, dec!(80));
    assert_eq!(engine.account_summary(AccountId(2)).available_points, dec!(20));
}

#[test]
fn conflicting_saves_admit_one_writer() {
    let engine = CompensationEngine::default();
    engine.add_contribution_record(contribution(1, 1, dec!(60), dec!(1))).unwrap();
    engine.add_contribution_record(contribution(1, 2, dec!(40), dec!(1))).unwrap();
    let draft = engine.begin_calculation(WorkItemId(1), None).unwrap();
    let version = draft.version();

    let engine = &engine;
    let outcomes: Vec<Result<_, EngineError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|i| {
                scope.spawn(move || {
                    engine.save_calculation(
                        WorkItemId(1),
                        &[ParticipantEdit::Upsert {
                            participant_id: ParticipantId(1),
                            contribution_value: Decimal::from(70 + i),
                            role_weight: None,
                        }],
                        version,
                        None,
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "stale save must be rejected");
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(EngineError::ConcurrentModification { .. })
    )));
}

#[test]
fn overspend_hammer_never_goes_negative() {
    let engine = CompensationEngine::default();
    seed_points(&engine, 1, dec!(100));

    let outcomes: Vec<bool> = thread::scope(|scope| {
        let handles: Vec<_> = (0..10)
            .map(|_| {
                scope.spawn(|| {
                    engine
                        .apply_ledger_entry(
                            AccountId(1),
                            ChangeType::Spend,
                            dec!(-15),
                            "hammer",
                            None,
                            None,
                        )
                        .is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // 6 × 15 = 90 fits into 100; the seventh spend would not.
    let successes = outcomes.iter().filter(|&&ok| ok).count();
    assert_eq!(successes, 6);

    let summary = engine.account_summary(AccountId(1));
    assert_eq!(summary.available_points, dec!(10));
    assert_eq!(summary.used_points, dec!(90));
    assert_eq!(summary.total_points, dec!(100));
    assert_eq!(engine.audit_account(AccountId(1)).unwrap(), dec!(10));
}

#[test]
fn concurrent_investments_chain_valuations() {
    let engine = CompensationEngine::default();
    seed_points(&engine, 5, dec!(100));
    engine.set_valuation(EntityType::User, EntityId(5), dec!(100)).unwrap();

    let engine = &engine;
    thread::scope(|scope| {
        for round in 1..=2u64 {
            scope.spawn(move || {
                engine
                    .create_self_investment(
                        EntityType::User,
                        EntityId(5),
                        dec!(5),
                        VotingRoundId(round),
                        None,
                    )
                    .unwrap();
            });
        }
    });

    assert_eq!(engine.valuation(EntityType::User, EntityId(5)), dec!(110));
    let investments = engine.investments_for(EntityType::User, EntityId(5));
    assert_eq!(investments.len(), 2);

    // The two investments serialized: one saw 100 → 105, the other 105 → 110.
    let mut befores: Vec<Decimal> = investments.iter().map(|i| i.valuation_before).collect();
    befores.sort();
    assert_eq!(befores, vec![dec!(100), dec!(105)]);
    assert_eq!(engine.account_summary(AccountId(5)).available_points, dec!(90));
}
