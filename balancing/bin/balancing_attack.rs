// Author: LMD Balancing Team
//! Runs the balancing attack on the default scenario.
//!
//! Searches for a committee schedule in which the adversary can recruit every
//! role, then keeps the fork-choice tally tied for 100 epochs. A broken
//! invariant exits with an error naming the slot.
//!
//! Set `RUST_LOG=debug` to also see per-slot certification details.

use anyhow::Result;
use lmd_balancing_attack::{driver, ScenarioConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const COMMITTEES_PER_EPOCH: u32 = 64;
const TOTAL_VALIDATORS: u32 = 12_800;
const ADVERSARIAL_COUNT: u32 = 320 * 2;
const BASE_SEED: u64 = 42;
const EPOCHS_TO_SIMULATE: u64 = 100;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let scenario = ScenarioConfig::new()
        .with_committees_per_epoch(COMMITTEES_PER_EPOCH)
        .with_validators(TOTAL_VALIDATORS)
        .with_adversarial_count(ADVERSARIAL_COUNT);
    scenario.validate()?;

    let horizon = EPOCHS_TO_SIMULATE * scenario.slots_per_epoch();
    let report = driver::run_attack(scenario, BASE_SEED, horizon, None)?;

    info!(
        "tie held for {} slots with seed {} (found after {} tries)",
        report.slots_simulated(),
        report.seed,
        report.attempts
    );
    Ok(())
}
