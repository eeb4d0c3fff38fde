//! Seed search and attack runs.
//!
//! Attempt `k` (counting from 1) samples the schedule seeded with
//! `base_seed + k`. The first feasible schedule is frozen and simulated once.

use crate::{
    assign_roles, AttackEngine, AttackError, AttackResult, CommitteeSchedule, Feasibility,
    RoleSet, ScenarioConfig, SlotNumber, SlotOutcome, Tally,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A schedule for which every role could be recruited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeasibleSchedule {
    pub schedule: CommitteeSchedule,
    pub roles: RoleSet,
    /// Attempts spent, including the successful one
    pub attempts: u64,
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub scenario: ScenarioConfig,
    /// Seed of the feasible schedule
    pub seed: u64,
    pub attempts: u64,
    pub roles: RoleSet,
    pub outcomes: Vec<SlotOutcome>,
    pub final_tally: Tally,
}

impl RunReport {
    pub fn to_json(&self) -> AttackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn slots_simulated(&self) -> usize {
        self.outcomes.len()
    }
}

fn attempt(
    scenario: ScenarioConfig,
    base_seed: u64,
    attempt: u64,
) -> AttackResult<Option<FeasibleSchedule>> {
    let schedule = CommitteeSchedule::new(scenario, base_seed.wrapping_add(attempt))?;
    Ok(match assign_roles(&schedule)? {
        Feasibility::Feasible(roles) => Some(FeasibleSchedule {
            schedule,
            roles,
            attempts: attempt,
        }),
        Feasibility::Infeasible(_) => None,
    })
}

/// Resample schedules until role assignment succeeds.
///
/// `max_attempts = None` searches forever.
pub fn find_feasible_schedule(
    scenario: ScenarioConfig,
    base_seed: u64,
    max_attempts: Option<u64>,
) -> AttackResult<FeasibleSchedule> {
    scenario.validate()?;

    let mut tries = 0u64;
    loop {
        tries += 1;
        if max_attempts.is_some_and(|max| tries > max) {
            return Err(AttackError::NoFeasibleSchedule { attempts: tries - 1 });
        }

        info!("{} try to find suitable epoch ...", tries);
        if let Some(found) = attempt(scenario, base_seed, tries)? {
            return Ok(found);
        }
    }
}

/// Like [`find_feasible_schedule`], evaluating `batch_size` seeds at a time in
/// parallel. The smallest feasible attempt of a batch wins, so the result is
/// the same as the sequential search.
#[cfg(feature = "parallel-search")]
pub fn find_feasible_schedule_parallel(
    scenario: ScenarioConfig,
    base_seed: u64,
    max_attempts: Option<u64>,
    batch_size: u64,
) -> AttackResult<FeasibleSchedule> {
    use rayon::prelude::*;

    scenario.validate()?;
    let batch_size = batch_size.max(1);

    let mut first = 1u64;
    loop {
        let mut last = first + batch_size - 1;
        if let Some(max) = max_attempts {
            if first > max {
                return Err(AttackError::NoFeasibleSchedule { attempts: max });
            }
            last = last.min(max);
        }

        info!("tries {} to {} to find suitable epoch ...", first, last);
        let batch = (0..(last - first + 1) as usize)
            .into_par_iter()
            .map(|i| attempt(scenario, base_seed, first + i as u64))
            .collect::<AttackResult<Vec<_>>>()?;

        if let Some(found) = batch.into_iter().flatten().next() {
            return Ok(found);
        }
        first = last + 1;
    }
}

fn search(
    scenario: ScenarioConfig,
    base_seed: u64,
    max_attempts: Option<u64>,
) -> AttackResult<FeasibleSchedule> {
    #[cfg(feature = "parallel-search")]
    {
        let batch_size = 4 * rayon::current_num_threads() as u64;
        find_feasible_schedule_parallel(scenario, base_seed, max_attempts, batch_size)
    }
    #[cfg(not(feature = "parallel-search"))]
    {
        find_feasible_schedule(scenario, base_seed, max_attempts)
    }
}

/// Find a feasible schedule and sustain the tie for `horizon` slots
pub fn run_attack(
    scenario: ScenarioConfig,
    base_seed: u64,
    horizon: SlotNumber,
    max_attempts: Option<u64>,
) -> AttackResult<RunReport> {
    let FeasibleSchedule {
        schedule,
        roles,
        attempts,
    } = search(scenario, base_seed, max_attempts)?;

    info!("adversarial proposer in slot 0: {}", roles.proposer_slot0);
    info!("swayers during epoch 0: {:?}", roles.swayers_epoch0);
    info!("swayers during epoch 1 (and beyond): {:?}", roles.swayers_epoch1_plus);
    info!("fillers during epoch 0: {:?}", roles.fillers_epoch0);

    let run = AttackEngine::new(&schedule, &roles).run(horizon)?;
    info!("liveness attack successful!");

    let report = RunReport {
        scenario,
        seed: schedule.base_seed(),
        attempts,
        roles,
        final_tally: run.votes.tally(),
        outcomes: run.outcomes,
    };
    debug!(
        "seed {} after {} attempts, {} slots simulated, final balance {}",
        report.seed,
        report.attempts,
        report.slots_simulated(),
        report.final_tally
    );
    Ok(report)
}
