//! # Committee Schedule
//!
//! Deterministic per-slot committees. Each epoch draws one uniformly random
//! permutation of all validators from a ChaCha8 stream seeded with
//! `base_seed + epoch`, then slices it into `C` contiguous committees ordered by
//! slot offset. The generator is built fresh for every call, so committee
//! derivation is a pure function of `(base_seed, epoch)` and independent
//! schedules can be sampled from different threads.

use crate::{AttackResult, EpochNumber, ScenarioConfig, SlotNumber, ValidatorId};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Validators assigned to one slot; the first member proposes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Committee {
    slot: SlotNumber,
    members: Vec<ValidatorId>,
}

impl Committee {
    pub fn slot(&self) -> SlotNumber {
        self.slot
    }

    /// Members in shuffle order
    pub fn members(&self) -> &[ValidatorId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The slot's proposer. Committees are never empty for a validated scenario.
    pub fn proposer(&self) -> ValidatorId {
        self.members[0]
    }

    /// `(adversarial, honest)` members, each ascending
    pub fn fractions(&self, scenario: &ScenarioConfig) -> (BTreeSet<ValidatorId>, BTreeSet<ValidatorId>) {
        self.members
            .iter()
            .copied()
            .partition(|&id| scenario.is_adversarial(id))
    }
}

/// Seeded committee schedule for a scenario
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CommitteeSchedule {
    scenario: ScenarioConfig,
    base_seed: u64,
}

impl CommitteeSchedule {
    /// Create a schedule; fails if the scenario is invalid
    pub fn new(scenario: ScenarioConfig, base_seed: u64) -> AttackResult<Self> {
        scenario.validate()?;
        Ok(Self {
            scenario,
            base_seed,
        })
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// The epoch's shuffle of all validator ids
    pub fn epoch_permutation(&self, epoch: EpochNumber) -> Vec<ValidatorId> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.base_seed.wrapping_add(epoch));
        let mut permutation: Vec<ValidatorId> = self.scenario.all_validators().collect();
        permutation.shuffle(&mut rng);
        permutation
    }

    /// All `C` committees of an epoch from a single shuffle
    pub fn epoch_committees(&self, epoch: EpochNumber) -> Vec<Committee> {
        let first_slot = self.scenario.epoch_start_slot(epoch);
        self.epoch_permutation(epoch)
            .chunks(self.scenario.committee_size())
            .enumerate()
            .map(|(offset, members)| Committee {
                slot: first_slot + offset as u64,
                members: members.to_vec(),
            })
            .collect()
    }

    pub fn committee_for_slot(&self, slot: SlotNumber) -> Committee {
        let (epoch, offset) = self.scenario.slot_to_epoch(slot);
        let size = self.scenario.committee_size();
        let start = offset as usize * size;
        let permutation = self.epoch_permutation(epoch);
        Committee {
            slot,
            members: permutation[start..start + size].to_vec(),
        }
    }

    pub fn proposer_for_slot(&self, slot: SlotNumber) -> ValidatorId {
        self.committee_for_slot(slot).proposer()
    }

    /// `(adversarial, honest)` members of the slot's committee
    pub fn committee_fractions_for_slot(
        &self,
        slot: SlotNumber,
    ) -> (BTreeSet<ValidatorId>, BTreeSet<ValidatorId>) {
        self.committee_for_slot(slot).fractions(&self.scenario)
    }
}
