// Author: LMD Balancing Team
//! # Committee Sampling Tests
//!
//! Property-based checks that every epoch's committees partition the validator
//! set and that committee derivation is a pure function of `(base_seed, epoch)`.

use lmd_balancing_attack::{properties, CommitteeSchedule, ScenarioConfig};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Valid scenarios: `N` a multiple of `C`, `0 <= F <= N`
prop_compose! {
    fn arb_scenario()
                   (committees in 1u32..8, committee_size in 1u32..12)
                   (committees in Just(committees),
                    total in Just(committees * committee_size),
                    adversarial in 0..=committees * committee_size)
                   -> ScenarioConfig {
        ScenarioConfig::new()
            .with_committees_per_epoch(committees)
            .with_validators(total)
            .with_adversarial_count(adversarial)
    }
}

proptest! {
    #[test]
    fn test_epoch_committees_partition_all_validators(
        scenario in arb_scenario(),
        base_seed in any::<u64>(),
        epoch in 0u64..1_000,
    ) {
        let schedule = CommitteeSchedule::new(scenario, base_seed).unwrap();
        let committees = schedule.epoch_committees(epoch);
        prop_assert!(properties::committees_partition(&scenario, &committees));
    }

    #[test]
    fn test_per_slot_committees_partition_all_validators(
        scenario in arb_scenario(),
        base_seed in any::<u64>(),
        epoch in 0u64..1_000,
    ) {
        let schedule = CommitteeSchedule::new(scenario, base_seed).unwrap();
        let first = scenario.epoch_start_slot(epoch);
        let committees: Vec<_> = (first..first + scenario.slots_per_epoch())
            .map(|slot| schedule.committee_for_slot(slot))
            .collect();
        prop_assert!(properties::committees_partition(&scenario, &committees));

        let union: BTreeSet<_> = committees
            .iter()
            .flat_map(|committee| committee.members().iter().copied())
            .collect();
        prop_assert_eq!(union.len(), scenario.total_validators as usize);
    }

    #[test]
    fn test_committees_are_reproducible(
        scenario in arb_scenario(),
        base_seed in any::<u64>(),
        slot in 0u64..10_000,
    ) {
        let a = CommitteeSchedule::new(scenario, base_seed).unwrap();
        let b = CommitteeSchedule::new(scenario, base_seed).unwrap();
        prop_assert_eq!(a.committee_for_slot(slot), b.committee_for_slot(slot));
        prop_assert_eq!(a.proposer_for_slot(slot), a.committee_for_slot(slot).members()[0]);
    }
}

/// Committee fractions follow the adversarial id bound
#[test]
fn test_fractions_cover_committee() {
    let scenario = ScenarioConfig::new()
        .with_committees_per_epoch(8)
        .with_validators(800)
        .with_adversarial_count(40);
    let schedule = CommitteeSchedule::new(scenario, 42).unwrap();

    let mut adversarial_total = 0;
    for slot in 0..8 {
        let (adversarial, honest) = schedule.committee_fractions_for_slot(slot);
        assert_eq!(adversarial.len() + honest.len(), 100);
        assert!(adversarial.iter().all(|&id| scenario.is_adversarial(id)));
        assert!(honest.iter().all(|&id| scenario.is_honest(id)));
        adversarial_total += adversarial.len();
    }
    // one epoch places every adversarial validator exactly once
    assert_eq!(adversarial_total, 40);
}

/// Different epochs draw different shuffles
#[test]
fn test_epochs_reshuffle() {
    let schedule = CommitteeSchedule::new(ScenarioConfig::default(), 42).unwrap();
    assert_ne!(schedule.epoch_permutation(0), schedule.epoch_permutation(1));
}
