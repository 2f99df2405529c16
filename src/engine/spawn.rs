//! Spawn controller: admits new customers at the entrance cell.
//!
//! A periodic timer in the engine loop attempts one spawn per period; a
//! one-shot staggered pair of deadlines seeds the first two customers shortly
//! after world init. Profile selection is uniform over the roster entries
//! that are neither banned nor already on the floor.

use log::{debug, info};
use rand::Rng;

use crate::api::RemoteProfile;
use crate::engine::actor::{default_roster, Customer, CustomerProfile};
use crate::engine::state::GameState;
use crate::world::ENTRANCE;

/// Chat-log line appended when every profile is banned or already present.
const NO_ELIGIBLE_LINE: &str = "（入店できそうな客はもういないようだ）";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(u32),
    EntranceBlocked,
    NoEligibleProfile,
}

pub struct SpawnController {
    roster: Vec<CustomerProfile>,
}

impl SpawnController {
    pub fn new() -> Self {
        Self {
            roster: default_roster(),
        }
    }

    pub fn with_roster(roster: Vec<CustomerProfile>) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &[CustomerProfile] {
        &self.roster
    }

    /// Profiles eligible to enter right now.
    fn eligible<'a>(&'a self, state: &GameState) -> Vec<&'a CustomerProfile> {
        self.roster
            .iter()
            .filter(|p| !state.is_banned(p.id) && state.customer(p.id).is_none())
            .collect()
    }

    /// Attempt one spawn at the entrance cell. A remote candidate record, if
    /// one was fetched in time, enriches the chosen roster profile; absent or
    /// partial records fall back to roster values and randomized defaults.
    pub fn try_spawn<R: Rng>(
        &self,
        state: &mut GameState,
        remote: Option<&RemoteProfile>,
        rng: &mut R,
    ) -> SpawnOutcome {
        let eligible = self.eligible(state);
        if eligible.is_empty() {
            info!("spawn skipped: no eligible customer profile");
            state.push_chat("", NO_ELIGIBLE_LINE);
            crate::metrics::inc_spawns_skipped();
            return SpawnOutcome::NoEligibleProfile;
        }
        if !state.is_walkable(ENTRANCE) {
            debug!("spawn skipped: entrance cell occupied");
            crate::metrics::inc_spawns_skipped();
            return SpawnOutcome::EntranceBlocked;
        }

        let mut profile = eligible[rng.gen_range(0..eligible.len())].clone();
        if let Some(remote) = remote {
            profile.merge_remote(remote, rng);
        }
        let id = profile.id;
        let name = profile.name.clone();
        let customer = Customer::new(profile, ENTRANCE);
        if !state.admit_customer(customer) {
            // Eligibility was checked above; only a concurrent occupancy
            // change can land here, and it is a plain skip.
            debug!("spawn admit refused for customer {}", id);
            crate::metrics::inc_spawns_skipped();
            return SpawnOutcome::EntranceBlocked;
        }
        info!("customer {} ({}) entered the arcade", id, name);
        crate::metrics::inc_customers_spawned();
        SpawnOutcome::Spawned(id)
    }
}

impl Default for SpawnController {
    fn default() -> Self {
        Self::new()
    }
}
