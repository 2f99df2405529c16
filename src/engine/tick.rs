//! Fixed-period movement simulation.
//!
//! One call advances every roaming customer by at most one cell. The engine
//! loop invokes this only while no dialogue session is open; skipped ticks
//! are dropped, never queued, so the world is provably frozen during
//! conversation.

use log::debug;
use rand::Rng;

use crate::config::GameConfig;
use crate::engine::state::GameState;
use crate::world::{Direction, Position, TileKind};

/// What happened during one tick, for logging and metrics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub moves: u32,
    pub coins_dropped: u32,
    pub coin_picked_up: Option<i64>,
    /// Customer elected to start calling for attention this tick, if any.
    pub new_caller: Option<u32>,
}

/// Advance the simulation by one tick.
///
/// Collision resolution works against the pre-tick snapshot of customer
/// positions, so outcomes do not depend on registry iteration order: nobody
/// can move into a cell another customer occupied at the start of the tick.
/// Cells accepted earlier in the same tick are also excluded, which keeps the
/// end-of-tick registry free of pairwise collisions.
///
/// `allow_calling` is false while the attention-seeking cooldown is running.
pub fn run_movement_tick<R: Rng>(
    state: &mut GameState,
    config: &GameConfig,
    allow_calling: bool,
    rng: &mut R,
) -> TickReport {
    let mut report = TickReport::default();

    let snapshot: Vec<Position> = state.customers().iter().map(|c| c.position).collect();
    let mut next = state.customers().to_vec();
    let mut claimed: Vec<Position> = Vec::with_capacity(next.len());
    let mut drops: Vec<Position> = Vec::new();

    for (idx, customer) in next.iter_mut().enumerate() {
        if customer.calling {
            claimed.push(customer.position);
            continue;
        }
        let dir = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
        let candidate = dir.step(customer.position);
        let blocked = !is_open_terrain(state, candidate)
            || candidate == state.player.position
            || snapshot
                .iter()
                .enumerate()
                .any(|(i, p)| i != idx && *p == candidate)
            || claimed.contains(&candidate);
        if blocked {
            claimed.push(customer.position);
            continue;
        }

        let vacated = customer.position;
        customer.position = candidate;
        claimed.push(candidate);
        report.moves += 1;

        if rng.gen_bool(config.coin_drop_chance) {
            drops.push(vacated);
        }
    }

    state.replace_customers(next);
    for pos in drops {
        state.drop_coin(pos, config.coin_amount);
        crate::metrics::inc_coins_dropped();
        report.coins_dropped += 1;
    }

    report.coin_picked_up = state.collect_coin_under_player();

    if allow_calling && !state.any_calling() {
        report.new_caller = elect_caller(state);
        if let Some(id) = report.new_caller {
            state.set_calling(id, true);
            debug!("customer {} is calling for attention", id);
        }
    }

    crate::metrics::inc_ticks_run();
    report
}

/// Terrain-and-machine check only; customer/player occupancy is handled by
/// the snapshot logic above.
fn is_open_terrain(state: &GameState, pos: Position) -> bool {
    match state.map().tile(pos) {
        None | Some(TileKind::Wall) => return false,
        Some(_) => {}
    }
    state.map().machine_at(pos).is_none()
}

/// Single-winner election: the first customer in registry order whose
/// position is orthogonally adjacent to any machine.
fn elect_caller(state: &GameState) -> Option<u32> {
    state
        .customers()
        .iter()
        .find(|c| state.map().machine_adjacent_to(c.position).is_some())
        .map(|c| c.id)
}
