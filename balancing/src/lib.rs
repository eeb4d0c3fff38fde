//! # LMD Balancing Attack Simulator
//!
//! This library simulates a liveness (balancing) attack against a committee-based,
//! slot/epoch proof-of-stake protocol whose fork choice is driven by each validator's
//! latest message (LMD). Given a favorable committee sampling, a small adversarial
//! minority keeps the tally between two competing chains tied forever.
//!
//! ## Architecture
//!
//! - **Scenario**: the three integer parameters `C`, `N`, `F` and slot/epoch arithmetic
//! - **Schedule**: seeded per-epoch shuffles that slice into per-slot committees
//! - **Roles**: greedy recruitment of the equivocating proposer, swayers and fillers
//! - **Engine**: the slot-by-slot vote-state machine that certifies and keeps the tie
//! - **Driver**: seed search followed by a single engine run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lmd_balancing_attack::{driver, ScenarioConfig};
//!
//! let scenario = ScenarioConfig::new()
//!     .with_committees_per_epoch(4)
//!     .with_validators(40)
//!     .with_adversarial_count(24);
//!
//! let report = driver::run_attack(scenario, 42, 12, Some(1_000)).unwrap();
//! assert!(report.outcomes.iter().all(|outcome| outcome.tally.is_tied()));
//! ```

use serde::{Deserialize, Serialize};

pub mod driver;
pub mod engine;
pub mod roles;
pub mod scenario;
pub mod schedule;
pub mod votes;

pub use driver::{find_feasible_schedule, run_attack, FeasibleSchedule, RunReport};
pub use engine::{sway_views, AttackEngine, SimulationRun, SlotOutcome, SwayerPair};
pub use roles::{assign_roles, Feasibility, Infeasibility, RoleSet};
pub use scenario::ScenarioConfig;
pub use schedule::{Committee, CommitteeSchedule};
pub use votes::{Side, Tally, Vote, VoteState};

/// Validator identifier; ids below `F` are adversarial
pub type ValidatorId = u32;

/// Slot number, counted from genesis
pub type SlotNumber = u64;

/// Epoch number; an epoch is `C` consecutive slots sharing one shuffle
pub type EpochNumber = u64;

/// Fatal errors of the simulator.
///
/// Infeasible schedules are not errors: they are reported through
/// [`Feasibility::Infeasible`] and the driver resamples. Every variant below
/// means a broken guarantee of the role assignment or the engine and aborts
/// the run.
#[derive(Debug, thiserror::Error)]
pub enum AttackError {
    /// Scenario parameters violate `N mod C == 0` or the basic bounds
    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(String),

    /// The greedy pass recruited a wrong number of ids for a role
    #[error("role assignment recruited {actual} {role}, expected {expected}")]
    RoleCountMismatch {
        role: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A bounded seed search ran out of attempts
    #[error("no feasible schedule found within {attempts} attempts")]
    NoFeasibleSchedule { attempts: u64 },

    #[error("slot {slot}: honest-voting set has odd size {size}")]
    OddHonestSet { slot: SlotNumber, size: usize },

    #[error("slot {slot}: expected 2 reserved swayers in the committee of slot {source_slot}, found {found}")]
    SwayerPairMissing {
        slot: SlotNumber,
        source_slot: SlotNumber,
        found: usize,
    },

    #[error("slot {slot}: swayers {first} and {second} hold unexpected votes ({first_vote:?}, {second_vote:?})")]
    UnexpectedSwayerVotes {
        slot: SlotNumber,
        first: ValidatorId,
        first_vote: Vote,
        second: ValidatorId,
        second_vote: Vote,
    },

    #[error("slot {slot}: revealing swayer {swayer} does not make {side} lead")]
    SwayCertificationFailed {
        slot: SlotNumber,
        swayer: ValidatorId,
        side: Side,
    },

    #[error("slot {slot}: validator {validator} is expected to hold a vote but has {vote:?}")]
    UnvotedHonestValidator {
        slot: SlotNumber,
        validator: ValidatorId,
        vote: Vote,
    },

    #[error("slot {slot}: tally is not tied ({left}, {right})")]
    TallyNotTied {
        slot: SlotNumber,
        left: usize,
        right: usize,
    },

    #[error("failed to serialize run report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for simulator operations
pub type AttackResult<T> = Result<T, AttackError>;

/// Summary of one committee's role recruitment, used by [`properties`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitteeRoleCount {
    pub swayers_epoch0: usize,
    pub swayers_epoch1_plus: usize,
    pub fillers: usize,
}

/// Property checkers over the data model
pub mod properties {
    use super::*;
    use std::collections::BTreeSet;

    /// Committees of one epoch cover every validator exactly once
    pub fn committees_partition(scenario: &ScenarioConfig, committees: &[Committee]) -> bool {
        if committees.len() != scenario.committees_per_epoch as usize {
            return false;
        }
        let mut seen = vec![false; scenario.total_validators as usize];
        for committee in committees {
            if committee.len() != scenario.committee_size() {
                return false;
            }
            for &id in committee.members() {
                match seen.get_mut(id as usize) {
                    Some(slot) if !*slot => *slot = true,
                    _ => return false,
                }
            }
        }
        seen.into_iter().all(|covered| covered)
    }

    /// The four role sets share no validator
    pub fn roles_disjoint(roles: &RoleSet) -> bool {
        let sets: [&BTreeSet<ValidatorId>; 3] = [
            &roles.swayers_epoch0,
            &roles.swayers_epoch1_plus,
            &roles.fillers_epoch0,
        ];
        let total: usize = sets.iter().map(|set| set.len()).sum::<usize>() + 1;
        let mut union: BTreeSet<ValidatorId> = sets.iter().flat_map(|set| set.iter().copied()).collect();
        union.insert(roles.proposer_slot0);
        union.len() == total
    }

    /// Role sets have sizes `{1, 2(C-1), 2C, < C}`
    pub fn roles_sized(roles: &RoleSet, scenario: &ScenarioConfig) -> bool {
        let c = scenario.committees_per_epoch as usize;
        roles.swayers_epoch0.len() == 2 * (c - 1)
            && roles.swayers_epoch1_plus.len() == 2 * c
            && roles.fillers_epoch0.len() < c
    }

    /// Per epoch-0 committee, how many ids each role recruited from it
    pub fn role_counts(roles: &RoleSet, committee: &Committee) -> CommitteeRoleCount {
        let mut count = CommitteeRoleCount::default();
        for id in committee.members() {
            if roles.swayers_epoch0.contains(id) {
                count.swayers_epoch0 += 1;
            }
            if roles.swayers_epoch1_plus.contains(id) {
                count.swayers_epoch1_plus += 1;
            }
            if roles.fillers_epoch0.contains(id) {
                count.fillers += 1;
            }
        }
        count
    }

    /// Every role member is adversarial and was recruited from its own slot's committee
    pub fn roles_sourced_from_committees(roles: &RoleSet, schedule: &CommitteeSchedule) -> bool {
        let scenario = schedule.scenario();
        let committees = schedule.epoch_committees(0);
        let last = committees.len() - 1;

        let all_adversarial = roles
            .members()
            .all(|id| scenario.is_adversarial(id));
        let proposer_ok = committees[0].proposer() == roles.proposer_slot0;

        let per_committee_ok = committees.iter().enumerate().all(|(offset, committee)| {
            let count = role_counts(roles, committee);
            let expected_epoch0 = if offset < last { 2 } else { 0 };
            count.swayers_epoch0 == expected_epoch0
                && count.swayers_epoch1_plus == 2
                && count.fillers <= 1
        });

        all_adversarial && proposer_ok && per_committee_ok
    }

    /// LEFT and RIGHT hold the same number of latest votes
    pub fn tally_tied(votes: &VoteState) -> bool {
        votes.tally().is_tied()
    }

    /// Each swayer, revealed alone, makes its own side strictly lead
    pub fn sway_certified(votes: &VoteState, pair: SwayerPair) -> bool {
        sway_views(votes, pair) == (Some(Side::Left), Some(Side::Right))
    }
}

/// Reference scenarios for tests and demos
pub mod utils {
    use super::*;

    /// `C = 64, N = 12800, F = 640`
    pub fn default_scenario() -> ScenarioConfig {
        ScenarioConfig::default()
    }

    /// Small scenario whose committees are large enough to host every role
    pub fn small_scenario() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_committees_per_epoch(4)
            .with_validators(40)
            .with_adversarial_count(24)
    }

    /// `C = 4, N = 8, F = 4`: committees of two can never host slot 0's five adversarial seats
    pub fn cramped_scenario() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_committees_per_epoch(4)
            .with_validators(8)
            .with_adversarial_count(4)
    }

    /// Scenario without any adversary
    pub fn honest_scenario() -> ScenarioConfig {
        ScenarioConfig::new()
            .with_committees_per_epoch(4)
            .with_validators(40)
            .with_adversarial_count(0)
    }
}
