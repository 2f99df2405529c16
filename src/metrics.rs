//! Minimal process-global counters for the simulation loop and API client.

use std::sync::atomic::{AtomicU64, Ordering};

static TICKS_RUN: AtomicU64 = AtomicU64::new(0);
static TICKS_SKIPPED_DIALOGUE: AtomicU64 = AtomicU64::new(0);
static CUSTOMERS_SPAWNED: AtomicU64 = AtomicU64::new(0);
static SPAWNS_SKIPPED: AtomicU64 = AtomicU64::new(0);
static COINS_DROPPED: AtomicU64 = AtomicU64::new(0);
static COINS_PICKED_UP: AtomicU64 = AtomicU64::new(0);
static API_REQUESTS: AtomicU64 = AtomicU64::new(0);
static API_FAILURES: AtomicU64 = AtomicU64::new(0);
static STALE_REPLIES_DROPPED: AtomicU64 = AtomicU64::new(0);

pub fn inc_ticks_run() {
    TICKS_RUN.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_ticks_skipped_dialogue() {
    TICKS_SKIPPED_DIALOGUE.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_customers_spawned() {
    CUSTOMERS_SPAWNED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_spawns_skipped() {
    SPAWNS_SKIPPED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_coins_dropped() {
    COINS_DROPPED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_coins_picked_up() {
    COINS_PICKED_UP.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_api_requests() {
    API_REQUESTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_api_failures() {
    API_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_stale_replies_dropped() {
    STALE_REPLIES_DROPPED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub ticks_run: u64,
    pub ticks_skipped_dialogue: u64,
    pub customers_spawned: u64,
    pub spawns_skipped: u64,
    pub coins_dropped: u64,
    pub coins_picked_up: u64,
    pub api_requests: u64,
    pub api_failures: u64,
    pub stale_replies_dropped: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        ticks_run: TICKS_RUN.load(Ordering::Relaxed),
        ticks_skipped_dialogue: TICKS_SKIPPED_DIALOGUE.load(Ordering::Relaxed),
        customers_spawned: CUSTOMERS_SPAWNED.load(Ordering::Relaxed),
        spawns_skipped: SPAWNS_SKIPPED.load(Ordering::Relaxed),
        coins_dropped: COINS_DROPPED.load(Ordering::Relaxed),
        coins_picked_up: COINS_PICKED_UP.load(Ordering::Relaxed),
        api_requests: API_REQUESTS.load(Ordering::Relaxed),
        api_failures: API_FAILURES.load(Ordering::Relaxed),
        stale_replies_dropped: STALE_REPLIES_DROPPED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = snapshot();
        inc_ticks_run();
        inc_coins_dropped();
        inc_coins_dropped();
        let after = snapshot();
        assert!(after.ticks_run >= before.ticks_run + 1);
        assert!(after.coins_dropped >= before.coins_dropped + 2);
    }
}
