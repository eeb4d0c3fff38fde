//! # Attack Simulation Engine
//!
//! Drives the global latest-message view slot by slot and proves the tally
//! stays tied:
//!
//! - **Slot 0**: the equivocating proposer shows two conflicting blocks to two
//!   equal halves of the honest-voting set.
//! - **Slots 1..C**: the honest-voting set is split evenly again, and a swayer
//!   pair withheld from the previous slot is revealed, one vote per side.
//! - **Epoch 1 onward**: honest validators keep their latest vote; a swayer pair
//!   recruited from the same slot offset of epoch 0 flips sides each epoch.
//!
//! Before each reveal the engine certifies, on throwaway copies of the vote
//! state, that each swayer alone would make its side strictly lead. Any broken
//! expectation is a fatal [`AttackError`] naming the slot.

use crate::{
    AttackError, AttackResult, Committee, CommitteeSchedule, EpochNumber, RoleSet, Side,
    SlotNumber, Tally, ValidatorId, Vote, VoteState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Swayers revealed in one slot, keyed by the side each votes for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SwayerPair {
    pub left: ValidatorId,
    pub right: ValidatorId,
}

/// Result of one slot transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotOutcome {
    pub slot: SlotNumber,
    pub epoch: EpochNumber,
    pub tally: Tally,
    /// `None` in slot 0, where the proposer's equivocation splits the vote
    pub swayers: Option<SwayerPair>,
}

/// Final state of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRun {
    pub votes: VoteState,
    pub outcomes: Vec<SlotOutcome>,
}

/// Leading side in each certification view: the left swayer revealed alone,
/// then the right swayer revealed alone
pub fn sway_views(votes: &VoteState, pair: SwayerPair) -> (Option<Side>, Option<Side>) {
    let left_view = votes.with_vote(pair.left, Side::Left.vote());
    let right_view = votes.with_vote(pair.right, Side::Right.vote());
    (left_view.leading(), right_view.leading())
}

/// Slot-transition machine over a frozen schedule and role set
#[derive(Debug, Clone)]
pub struct AttackEngine<'a> {
    schedule: &'a CommitteeSchedule,
    roles: &'a RoleSet,
    epoch0: Vec<Committee>,
}

impl<'a> AttackEngine<'a> {
    pub fn new(schedule: &'a CommitteeSchedule, roles: &'a RoleSet) -> Self {
        Self {
            schedule,
            roles,
            epoch0: schedule.epoch_committees(0),
        }
    }

    /// Vote state before slot 0: nobody has voted
    pub fn initial_votes(&self) -> VoteState {
        VoteState::new(self.schedule.scenario().total_validators as usize)
    }

    /// Simulate slots `0..horizon` from a fresh vote state
    pub fn run(&self, horizon: SlotNumber) -> AttackResult<SimulationRun> {
        let scenario = self.schedule.scenario();
        let mut votes = self.initial_votes();
        let mut outcomes = Vec::new();

        let mut cached_epoch: Option<EpochNumber> = None;
        let mut committees: Vec<Committee> = Vec::new();

        for slot in 0..horizon {
            let (epoch, offset) = scenario.slot_to_epoch(slot);
            if cached_epoch != Some(epoch) {
                committees = if epoch == 0 {
                    self.epoch0.clone()
                } else {
                    self.schedule.epoch_committees(epoch)
                };
                cached_epoch = Some(epoch);
            }

            let outcome = self.apply_slot(&mut votes, slot, &committees[offset as usize])?;
            info!("slot {} balance: {}", slot, outcome.tally);
            outcomes.push(outcome);
        }

        Ok(SimulationRun { votes, outcomes })
    }

    /// Apply one slot, deriving its committee from the schedule
    pub fn step(&self, votes: &mut VoteState, slot: SlotNumber) -> AttackResult<SlotOutcome> {
        let committee = self.schedule.committee_for_slot(slot);
        self.apply_slot(votes, slot, &committee)
    }

    /// Apply one slot given its committee.
    ///
    /// Slots must be applied in increasing order starting at 0; the vote state
    /// carries everything earlier slots committed.
    pub fn apply_slot(
        &self,
        votes: &mut VoteState,
        slot: SlotNumber,
        committee: &Committee,
    ) -> AttackResult<SlotOutcome> {
        let (epoch, offset) = self.schedule.scenario().slot_to_epoch(slot);
        let honest = self.honest_set(committee);

        let swayers = if epoch == 0 {
            if offset > 0 {
                let source = &self.epoch0[offset as usize - 1];
                let pair = self.first_reveal(votes, slot, source, &self.roles.swayers_epoch0)?;
                self.certify(votes, slot, pair)?;
                self.split_evenly(votes, slot, &honest)?;
                self.reveal(votes, pair);
                Some(pair)
            } else {
                self.split_evenly(votes, slot, &honest)?;
                None
            }
        } else {
            self.keep_latest_votes(votes, slot, &honest)?;
            let source = &self.epoch0[offset as usize];
            let pair = if epoch == 1 {
                self.first_reveal(votes, slot, source, &self.roles.swayers_epoch1_plus)?
            } else {
                self.switch_sides(votes, slot, source)?
            };
            self.certify(votes, slot, pair)?;
            self.reveal(votes, pair);
            Some(pair)
        };

        let tally = votes.tally();
        if !tally.is_tied() {
            return Err(AttackError::TallyNotTied {
                slot,
                left: tally.left,
                right: tally.right,
            });
        }

        Ok(SlotOutcome {
            slot,
            epoch,
            tally,
            swayers,
        })
    }

    /// Honest members plus any fillers, ascending
    fn honest_set(&self, committee: &Committee) -> BTreeSet<ValidatorId> {
        let scenario = self.schedule.scenario();
        committee
            .members()
            .iter()
            .copied()
            .filter(|&id| scenario.is_honest(id) || self.roles.is_filler(id))
            .collect()
    }

    /// Lower half votes LEFT, upper half votes RIGHT
    fn split_evenly(
        &self,
        votes: &mut VoteState,
        slot: SlotNumber,
        honest: &BTreeSet<ValidatorId>,
    ) -> AttackResult<()> {
        if honest.len() % 2 == 1 {
            return Err(AttackError::OddHonestSet {
                slot,
                size: honest.len(),
            });
        }

        let half = honest.len() / 2;
        for (i, &id) in honest.iter().enumerate() {
            votes.record(id, if i < half { Vote::Left } else { Vote::Right });
        }
        Ok(())
    }

    /// Honest validators re-cast the vote they already hold
    fn keep_latest_votes(
        &self,
        votes: &mut VoteState,
        slot: SlotNumber,
        honest: &BTreeSet<ValidatorId>,
    ) -> AttackResult<()> {
        for &id in honest {
            let vote = votes.get(id);
            if vote.side().is_none() {
                return Err(AttackError::UnvotedHonestValidator {
                    slot,
                    validator: id,
                    vote,
                });
            }
            votes.record(id, vote);
        }
        Ok(())
    }

    /// The two reserved ids recruited from `source`, ascending
    fn reserved_pair(
        &self,
        slot: SlotNumber,
        source: &Committee,
        reserve: &BTreeSet<ValidatorId>,
    ) -> AttackResult<(ValidatorId, ValidatorId)> {
        let scenario = self.schedule.scenario();
        let mut found: Vec<ValidatorId> = source
            .members()
            .iter()
            .copied()
            .filter(|id| scenario.is_adversarial(*id) && reserve.contains(id))
            .collect();
        found.sort_unstable();

        match found.as_slice() {
            [first, second] => Ok((*first, *second)),
            _ => Err(AttackError::SwayerPairMissing {
                slot,
                source_slot: source.slot(),
                found: found.len(),
            }),
        }
    }

    /// Swayers that have never voted; the smaller id sways LEFT
    fn first_reveal(
        &self,
        votes: &VoteState,
        slot: SlotNumber,
        source: &Committee,
        reserve: &BTreeSet<ValidatorId>,
    ) -> AttackResult<SwayerPair> {
        let (first, second) = self.reserved_pair(slot, source, reserve)?;
        match (votes.get(first), votes.get(second)) {
            (Vote::Never, Vote::Never) => Ok(SwayerPair {
                left: first,
                right: second,
            }),
            (first_vote, second_vote) => Err(AttackError::UnexpectedSwayerVotes {
                slot,
                first,
                first_vote,
                second,
                second_vote,
            }),
        }
    }

    /// Swayers holding opposite votes; each flips to the side it does not hold
    fn switch_sides(
        &self,
        votes: &VoteState,
        slot: SlotNumber,
        source: &Committee,
    ) -> AttackResult<SwayerPair> {
        let (first, second) = self.reserved_pair(slot, source, &self.roles.swayers_epoch1_plus)?;
        let (first_vote, second_vote) = (votes.get(first), votes.get(second));
        match (first_vote.side(), second_vote.side()) {
            (Some(held), Some(other)) if other == held.opposite() => {
                Ok(match held.opposite() {
                    Side::Left => SwayerPair {
                        left: first,
                        right: second,
                    },
                    Side::Right => SwayerPair {
                        left: second,
                        right: first,
                    },
                })
            }
            _ => Err(AttackError::UnexpectedSwayerVotes {
                slot,
                first,
                first_vote,
                second,
                second_vote,
            }),
        }
    }

    fn certify(&self, votes: &VoteState, slot: SlotNumber, pair: SwayerPair) -> AttackResult<()> {
        let (left_view, right_view) = sway_views(votes, pair);
        if left_view != Some(Side::Left) {
            return Err(AttackError::SwayCertificationFailed {
                slot,
                swayer: pair.left,
                side: Side::Left,
            });
        }
        if right_view != Some(Side::Right) {
            return Err(AttackError::SwayCertificationFailed {
                slot,
                swayer: pair.right,
                side: Side::Right,
            });
        }
        debug!(
            "slot {}: swayer {} certified for {}, swayer {} for {}",
            slot,
            pair.left,
            Side::Left,
            pair.right,
            Side::Right
        );
        Ok(())
    }

    fn reveal(&self, votes: &mut VoteState, pair: SwayerPair) {
        votes.record(pair.left, Side::Left.vote());
        votes.record(pair.right, Side::Right.vote());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assign_roles, properties, utils, Feasibility, ScenarioConfig};

    fn feasible(scenario: ScenarioConfig) -> (CommitteeSchedule, RoleSet) {
        (1..1_000u64)
            .find_map(|seed| {
                let schedule = CommitteeSchedule::new(scenario, seed).unwrap();
                match assign_roles(&schedule).unwrap() {
                    Feasibility::Feasible(roles) => Some((schedule, roles)),
                    Feasibility::Infeasible(_) => None,
                }
            })
            .expect("feasible seed")
    }

    #[test]
    fn test_sway_views_on_tied_state() {
        let mut votes = VoteState::new(6);
        votes.record(0, Vote::Left);
        votes.record(1, Vote::Right);
        let views = sway_views(&votes, SwayerPair { left: 4, right: 5 });
        assert_eq!(views, (Some(Side::Left), Some(Side::Right)));

        // swayers already holding the side they reveal change nothing
        votes.record(4, Vote::Left);
        votes.record(5, Vote::Right);
        let views = sway_views(&votes, SwayerPair { left: 4, right: 5 });
        assert_eq!(views, (None, None));
    }

    #[test]
    fn test_slot_zero_splits_honest_set() {
        let (schedule, roles) = feasible(utils::small_scenario());
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();

        let outcome = engine.step(&mut votes, 0).unwrap();
        assert_eq!(outcome.swayers, None);
        assert!(outcome.tally.is_tied());
        assert_eq!(outcome.tally.left + outcome.tally.right, votes.voter_count());
        assert_eq!(votes.get(roles.proposer_slot0), Vote::Never);
    }

    #[test]
    fn test_epoch_zero_reveals_previous_slot_swayers() {
        let (schedule, roles) = feasible(utils::small_scenario());
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();
        engine.step(&mut votes, 0).unwrap();

        let before = votes.clone();
        let outcome = engine.step(&mut votes, 1).unwrap();
        let pair = outcome.swayers.expect("slot 1 reveals swayers");

        assert!(roles.swayers_epoch0.contains(&pair.left));
        assert!(roles.swayers_epoch0.contains(&pair.right));
        assert!(pair.left < pair.right);
        assert!(schedule.committee_for_slot(0).members().contains(&pair.left));
        assert!(properties::sway_certified(&before, pair));
        assert_eq!(votes.get(pair.left), Vote::Left);
        assert_eq!(votes.get(pair.right), Vote::Right);
    }

    #[test]
    fn test_later_swayers_alternate_sides() {
        let scenario = utils::small_scenario();
        let (schedule, roles) = feasible(scenario);
        let engine = AttackEngine::new(&schedule, &roles);
        let run = engine.run(12).unwrap();

        // slot 5 (epoch 1) and slot 9 (epoch 2) reuse the pair recruited in slot 1
        let first = run.outcomes[5].swayers.unwrap();
        let second = run.outcomes[9].swayers.unwrap();
        assert_eq!(first.left, second.right);
        assert_eq!(first.right, second.left);
        assert!(roles.swayers_epoch1_plus.contains(&first.left));
    }

    #[test]
    fn test_odd_honest_set_is_fatal() {
        let scenario = ScenarioConfig::new()
            .with_committees_per_epoch(1)
            .with_validators(5)
            .with_adversarial_count(2);
        let schedule = CommitteeSchedule::new(scenario, 1).unwrap();
        // no fillers recruited, so three honest validators cannot be split
        let roles = RoleSet {
            proposer_slot0: 0,
            swayers_epoch0: BTreeSet::new(),
            swayers_epoch1_plus: [1].into_iter().collect(),
            fillers_epoch0: BTreeSet::new(),
        };
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();
        assert!(matches!(
            engine.step(&mut votes, 0),
            Err(AttackError::OddHonestSet { slot: 0, size: 3 })
        ));
    }

    #[test]
    fn test_missing_swayer_pair_is_fatal() {
        let (schedule, mut roles) = feasible(utils::small_scenario());
        let dropped = *roles.swayers_epoch0.iter().next().unwrap();
        roles.swayers_epoch0.remove(&dropped);

        let engine = AttackEngine::new(&schedule, &roles);
        let err = engine.run(4).unwrap_err();
        assert!(matches!(err, AttackError::SwayerPairMissing { found: 1, .. }));
    }

    #[test]
    fn test_tilted_state_before_slot_zero_is_fatal() {
        let (schedule, roles) = feasible(utils::small_scenario());
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();

        // a vote outside the slot-0 committee survives the split
        let outsider = schedule.committee_for_slot(1).members()[0];
        votes.record(outsider, Vote::Left);

        let err = engine.step(&mut votes, 0).unwrap_err();
        match err {
            AttackError::TallyNotTied { slot, left, right } => {
                assert_eq!(slot, 0);
                assert_eq!(left, right + 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tilted_state_fails_certification() {
        let (schedule, roles) = feasible(utils::small_scenario());
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();
        engine.step(&mut votes, 0).unwrap();

        // LEFT already leads by one, so the RIGHT swayer alone only ties
        let outsider = schedule.committee_for_slot(3).members()[0];
        votes.record(outsider, Vote::Left);

        let err = engine.step(&mut votes, 1).unwrap_err();
        match err {
            AttackError::SwayCertificationFailed { slot, swayer, side } => {
                assert_eq!(slot, 1);
                assert_eq!(side, Side::Right);
                assert!(roles.swayers_epoch0.contains(&swayer));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_skipping_epoch_one_leaves_swayers_unvoted() {
        let scenario = utils::small_scenario();
        let (schedule, roles) = feasible(scenario);
        let engine = AttackEngine::new(&schedule, &roles);
        let mut votes = engine.initial_votes();
        for slot in 0..scenario.slots_per_epoch() {
            engine.step(&mut votes, slot).unwrap();
        }

        let slot = scenario.epoch_start_slot(2);
        let err = engine.step(&mut votes, slot).unwrap_err();
        match err {
            AttackError::UnexpectedSwayerVotes {
                slot: failed,
                first,
                first_vote,
                second,
                second_vote,
            } => {
                assert_eq!(failed, slot);
                assert!(first < second);
                assert!(roles.swayers_epoch1_plus.contains(&first));
                assert!(roles.swayers_epoch1_plus.contains(&second));
                assert_eq!((first_vote, second_vote), (Vote::Never, Vote::Never));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unvoted_validator_in_later_epoch_is_fatal() {
        let (schedule, roles) = feasible(utils::small_scenario());
        let engine = AttackEngine::new(&schedule, &roles);
        let slot = (4..8u64)
            .find(|&slot| !schedule.committee_fractions_for_slot(slot).1.is_empty())
            .expect("some epoch-1 committee has honest members");

        // skip epoch 0 entirely
        let mut votes = engine.initial_votes();
        let err = engine.step(&mut votes, slot).unwrap_err();
        assert!(matches!(
            err,
            AttackError::UnvotedHonestValidator { slot: failed, .. } if failed == slot
        ));
    }
}
