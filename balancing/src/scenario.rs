//! Scenario parameters and slot/epoch/committee arithmetic.

use crate::{AttackError, AttackResult, EpochNumber, SlotNumber, ValidatorId};
use serde::{Deserialize, Serialize};

/// Default number of committees (slots) per epoch
pub const DEFAULT_COMMITTEES_PER_EPOCH: u32 = 64;

/// Default validator population
pub const DEFAULT_TOTAL_VALIDATORS: u32 = 12_800;

/// Default adversarial population (5% of validators)
pub const DEFAULT_ADVERSARIAL_COUNT: u32 = 640;

/// Static parameters of the attack scenario.
///
/// Validators are identified by `0..N`; ids below `F` are adversarial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScenarioConfig {
    /// Committees per epoch (`C`), one committee per slot
    pub committees_per_epoch: u32,

    /// Total validators (`N`), must be a multiple of `C`
    pub total_validators: u32,

    /// Adversarial validators (`F`)
    pub adversarial_count: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioConfig {
    /// Create a configuration with the default scenario parameters
    pub fn new() -> Self {
        Self {
            committees_per_epoch: DEFAULT_COMMITTEES_PER_EPOCH,
            total_validators: DEFAULT_TOTAL_VALIDATORS,
            adversarial_count: DEFAULT_ADVERSARIAL_COUNT,
        }
    }

    /// Set the number of committees per epoch
    pub fn with_committees_per_epoch(mut self, committees: u32) -> Self {
        self.committees_per_epoch = committees;
        self
    }

    /// Set the total number of validators
    pub fn with_validators(mut self, count: u32) -> Self {
        self.total_validators = count;
        self
    }

    /// Set the number of adversarial validators
    pub fn with_adversarial_count(mut self, count: u32) -> Self {
        self.adversarial_count = count;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> AttackResult<()> {
        if self.committees_per_epoch == 0 {
            return Err(AttackError::InvalidConfig(
                "committees per epoch must be positive".to_string(),
            ));
        }

        if self.total_validators == 0 {
            return Err(AttackError::InvalidConfig(
                "validator count must be positive".to_string(),
            ));
        }

        if self.total_validators % self.committees_per_epoch != 0 {
            return Err(AttackError::InvalidConfig(format!(
                "{} validators cannot be split into {} equal committees",
                self.total_validators, self.committees_per_epoch
            )));
        }

        if self.adversarial_count > self.total_validators {
            return Err(AttackError::InvalidConfig(format!(
                "adversarial count {} exceeds validator count {}",
                self.adversarial_count, self.total_validators
            )));
        }

        Ok(())
    }

    /// Slots per epoch, equal to the number of committees
    pub fn slots_per_epoch(&self) -> u64 {
        u64::from(self.committees_per_epoch)
    }

    /// Split a slot into `(epoch, offset within epoch)`
    pub fn slot_to_epoch(&self, slot: SlotNumber) -> (EpochNumber, u32) {
        let c = self.slots_per_epoch();
        (slot / c, (slot % c) as u32)
    }

    /// First slot of an epoch
    pub fn epoch_start_slot(&self, epoch: EpochNumber) -> SlotNumber {
        epoch * self.slots_per_epoch()
    }

    pub fn committee_size(&self) -> usize {
        (self.total_validators / self.committees_per_epoch) as usize
    }

    pub fn is_adversarial(&self, id: ValidatorId) -> bool {
        id < self.adversarial_count
    }

    pub fn is_honest(&self, id: ValidatorId) -> bool {
        !self.is_adversarial(id)
    }

    /// Every validator id, ascending
    pub fn all_validators(&self) -> impl Iterator<Item = ValidatorId> {
        0..self.total_validators
    }
}
