//! # Role Assignment
//!
//! Recruits the adversarial validators the balancing attack needs from the
//! epoch-0 committees, in a single greedy pass without backtracking:
//!
//! - the slot-0 proposer, who equivocates and starts the two chains
//! - per slot, one filler if the honest members are odd in number
//! - per slot except the last, two swayers that split slot `s + 1` during epoch 0
//! - per slot, two swayers reused from epoch 1 onward
//!
//! Whenever ids are taken from a committee's adversarial members, the smallest
//! remaining ids are taken first, so the result is reproducible.

use crate::{AttackError, AttackResult, CommitteeSchedule, SlotNumber, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Adversarial validators recruited for each role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleSet {
    /// Equivocating proposer of slot 0
    pub proposer_slot0: ValidatorId,
    /// Two per slot `0..C-1`, released to split the following slot in epoch 0
    pub swayers_epoch0: BTreeSet<ValidatorId>,
    /// Two per slot `0..C`, released to split slots from epoch 1 onward
    pub swayers_epoch1_plus: BTreeSet<ValidatorId>,
    /// At most one per slot, voting with the honest validators
    pub fillers_epoch0: BTreeSet<ValidatorId>,
}

impl RoleSet {
    /// Every recruited id, role by role
    pub fn members(&self) -> impl Iterator<Item = ValidatorId> + '_ {
        std::iter::once(self.proposer_slot0)
            .chain(self.swayers_epoch0.iter().copied())
            .chain(self.swayers_epoch1_plus.iter().copied())
            .chain(self.fillers_epoch0.iter().copied())
    }

    pub fn is_filler(&self, id: ValidatorId) -> bool {
        self.fillers_epoch0.contains(&id)
    }
}

/// Resource the adversary ran out of
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Infeasibility {
    /// The slot-0 proposer is honest
    ProposerNotAdversarial { proposer: ValidatorId },
    /// No adversarial member left to even out the honest voters
    NoFiller { slot: SlotNumber },
    /// Fewer than two adversarial members left to split the next slot
    NoEpochZeroSwayers { slot: SlotNumber },
    /// Fewer than two adversarial members left for later epochs
    NoLaterEpochSwayers { slot: SlotNumber },
    /// Every slot of epoch 0 needed a filler
    TooManyFillers { fillers: usize },
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infeasibility::ProposerNotAdversarial { proposer } => {
                write!(f, "proposer {proposer} in slot 0 is not adversarial")
            }
            Infeasibility::NoFiller { slot } => write!(
                f,
                "insufficient adversarial vote in slot {slot} to fill up to an even number of honest voters"
            ),
            Infeasibility::NoEpochZeroSwayers { slot } => write!(
                f,
                "insufficient adversarial vote in slot {slot} to split honest voters in the next slot"
            ),
            Infeasibility::NoLaterEpochSwayers { slot } => write!(
                f,
                "insufficient adversarial vote in slot {slot} to split honest voters in the next epoch"
            ),
            Infeasibility::TooManyFillers { fillers } => {
                write!(f, "{fillers} fillers needed, every slot of epoch 0 has odd honest voters")
            }
        }
    }
}

/// Outcome of role assignment for one schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feasibility {
    Feasible(RoleSet),
    Infeasible(Infeasibility),
}

impl Feasibility {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Feasibility::Feasible(_))
    }

    pub fn roles(&self) -> Option<&RoleSet> {
        match self {
            Feasibility::Feasible(roles) => Some(roles),
            Feasibility::Infeasible(_) => None,
        }
    }
}

/// Take the `count` smallest ids, or `None` if there are not enough
fn take_smallest(pool: &mut BTreeSet<ValidatorId>, count: usize) -> Option<Vec<ValidatorId>> {
    if pool.len() < count {
        return None;
    }
    (0..count).map(|_| pool.pop_first()).collect()
}

/// Check whether the adversary can fill every role for this schedule.
///
/// Returns `Ok(Feasibility::Infeasible(_))` for an unlucky schedule; an `Err`
/// means the recruited counts contradict the greedy pass.
pub fn assign_roles(schedule: &CommitteeSchedule) -> AttackResult<Feasibility> {
    let scenario = schedule.scenario();
    let committees = schedule.epoch_committees(0);
    let c = committees.len();

    let proposer = committees[0].proposer();
    if !scenario.is_adversarial(proposer) {
        return Ok(infeasible(
            schedule,
            Infeasibility::ProposerNotAdversarial { proposer },
        ));
    }

    let mut swayers_epoch0 = BTreeSet::new();
    let mut swayers_epoch1_plus = BTreeSet::new();
    let mut fillers_epoch0 = BTreeSet::new();

    for (offset, committee) in committees.iter().enumerate() {
        let slot = committee.slot();
        let (mut adversarial, honest) = committee.fractions(scenario);
        if offset == 0 {
            // already equivocating, unavailable for other roles
            adversarial.remove(&proposer);
        }

        if honest.len() % 2 == 1 {
            match take_smallest(&mut adversarial, 1) {
                Some(filler) => fillers_epoch0.extend(filler),
                None => return Ok(infeasible(schedule, Infeasibility::NoFiller { slot })),
            }
        }

        if offset + 1 < c {
            match take_smallest(&mut adversarial, 2) {
                Some(pair) => swayers_epoch0.extend(pair),
                None => {
                    return Ok(infeasible(
                        schedule,
                        Infeasibility::NoEpochZeroSwayers { slot },
                    ))
                }
            }
        }

        match take_smallest(&mut adversarial, 2) {
            Some(pair) => swayers_epoch1_plus.extend(pair),
            None => {
                return Ok(infeasible(
                    schedule,
                    Infeasibility::NoLaterEpochSwayers { slot },
                ))
            }
        }

        debug!(
            "slot {}: {} adversarial members left unassigned",
            slot,
            adversarial.len()
        );
    }

    check_count("epoch-0 swayers", 2 * (c - 1), swayers_epoch0.len())?;
    check_count("epoch-1+ swayers", 2 * c, swayers_epoch1_plus.len())?;
    if fillers_epoch0.len() >= c {
        return Ok(infeasible(
            schedule,
            Infeasibility::TooManyFillers {
                fillers: fillers_epoch0.len(),
            },
        ));
    }

    Ok(Feasibility::Feasible(RoleSet {
        proposer_slot0: proposer,
        swayers_epoch0,
        swayers_epoch1_plus,
        fillers_epoch0,
    }))
}

fn infeasible(schedule: &CommitteeSchedule, reason: Infeasibility) -> Feasibility {
    info!(seed = schedule.base_seed(), " -> {}", reason);
    Feasibility::Infeasible(reason)
}

fn check_count(role: &'static str, expected: usize, actual: usize) -> AttackResult<()> {
    if expected != actual {
        return Err(AttackError::RoleCountMismatch {
            role,
            expected,
            actual,
        });
    }
    Ok(())
}

impl CommitteeSchedule {
    /// Whether [`assign_roles`] succeeds for this schedule
    pub fn is_attack_feasible(&self) -> AttackResult<bool> {
        Ok(assign_roles(self)?.is_feasible())
    }
}
