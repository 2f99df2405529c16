//! Mutable game state: the player, the customer registry, dropped coins,
//! the banned set, and the chat history log.
//!
//! The registry has several mutating call sites (tick scheduler, spawn
//! controller, ban/kill outcomes). All multi-entity updates are applied as
//! whole-collection replacements rather than in-place edits; within one tick
//! every decision reads the same starting snapshot.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashSet;

use crate::engine::actor::{Customer, CustomerStatus};
use crate::world::{ArcadeMap, Direction, Position, TileKind, PLAYER_START};

#[derive(Debug, Clone)]
pub struct Player {
    pub position: Position,
    pub facing: Direction,
    pub wallet: i64,
}

/// Ephemeral currency pickup. Spawned when a customer vacates a cell,
/// consumed exactly once when the player stands on it.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedCoin {
    pub id: u64,
    pub position: Position,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub at: DateTime<Utc>,
    pub speaker: String,
    pub text: String,
}

pub struct GameState {
    map: ArcadeMap,
    pub player: Player,
    customers: Vec<Customer>,
    coins: Vec<DroppedCoin>,
    banned: HashSet<u32>,
    next_coin_id: u64,
    chat_log: Vec<ChatEntry>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            map: ArcadeMap::new(),
            player: Player {
                position: PLAYER_START,
                facing: Direction::Down,
                wallet: 0,
            },
            customers: Vec::new(),
            coins: Vec::new(),
            banned: HashSet::new(),
            next_coin_id: 1,
            chat_log: Vec::new(),
        }
    }

    pub fn map(&self) -> &ArcadeMap {
        &self.map
    }

    /// Walkability oracle. Bounds first, then terrain, then occupancy by
    /// machines, customers, and the player. Re-evaluated fresh on every call;
    /// out-of-bounds lookups are blocked, never an error.
    pub fn is_walkable(&self, pos: Position) -> bool {
        match self.map.tile(pos) {
            None | Some(TileKind::Wall) => return false,
            Some(_) => {}
        }
        if self.map.machine_at(pos).is_some() {
            return false;
        }
        if self.customers.iter().any(|c| c.position == pos) {
            return false;
        }
        if self.player.position == pos {
            return false;
        }
        true
    }

    // --- customer registry -------------------------------------------------

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn customer(&self, id: u32) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    pub fn customer_at(&self, pos: Position) -> Option<&Customer> {
        self.customers.iter().find(|c| c.position == pos)
    }

    /// Whole-collection replacement; the tick scheduler computes the next
    /// registry against a snapshot and swaps it in here.
    pub fn replace_customers(&mut self, next: Vec<Customer>) {
        self.customers = next;
    }

    /// Admit a customer. Refused (no-op, false) when the id is banned or
    /// already present, or the cell is occupied.
    pub fn admit_customer(&mut self, customer: Customer) -> bool {
        if self.banned.contains(&customer.id) {
            debug!("refusing admit: customer {} is banned", customer.id);
            return false;
        }
        if self.customer(customer.id).is_some() {
            debug!("refusing admit: customer {} already present", customer.id);
            return false;
        }
        if !self.is_walkable(customer.position) {
            return false;
        }
        self.customers.push(customer);
        true
    }

    /// Remove a customer from the floor (scripted death, ban eviction).
    /// Guarded no-op when the id is no longer present.
    pub fn remove_customer(&mut self, id: u32) -> bool {
        let before = self.customers.len();
        self.customers.retain(|c| c.id != id);
        let removed = self.customers.len() != before;
        if !removed {
            debug!("remove_customer: {} not present (no-op)", id);
        }
        removed
    }

    /// Ban an id for the rest of the session and evict if present.
    /// Idempotent: a second ban of the same id changes nothing.
    pub fn ban_customer(&mut self, id: u32) -> bool {
        let newly_banned = self.banned.insert(id);
        let evicted = self.remove_customer(id);
        newly_banned || evicted
    }

    pub fn is_banned(&self, id: u32) -> bool {
        self.banned.contains(&id)
    }

    pub fn banned_ids(&self) -> &HashSet<u32> {
        &self.banned
    }

    pub fn set_customer_status(&mut self, id: u32, status: CustomerStatus) -> bool {
        match self.customers.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.profile.status = status;
                true
            }
            None => false,
        }
    }

    /// Adjust a customer's wallet, returning the new total. No-op guard when
    /// the customer has left the floor.
    pub fn adjust_customer_wallet(&mut self, id: u32, delta: i64) -> Option<i64> {
        let c = self.customers.iter_mut().find(|c| c.id == id)?;
        c.profile.money = c.profile.money.saturating_add(delta);
        Some(c.profile.money)
    }

    pub fn any_calling(&self) -> bool {
        self.customers.iter().any(|c| c.calling)
    }

    pub fn set_calling(&mut self, id: u32, calling: bool) -> bool {
        match self.customers.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.calling = calling;
                true
            }
            None => false,
        }
    }

    pub fn clear_all_calling(&mut self) {
        for c in self.customers.iter_mut() {
            c.calling = false;
        }
    }

    // --- coins -------------------------------------------------------------

    pub fn coins(&self) -> &[DroppedCoin] {
        &self.coins
    }

    pub fn drop_coin(&mut self, position: Position, amount: i64) -> u64 {
        let id = self.next_coin_id;
        self.next_coin_id += 1;
        self.coins.push(DroppedCoin {
            id,
            position,
            amount,
        });
        id
    }

    /// Remove and return the coin at `pos`, if any. The removal is the only
    /// mutation, so a caller re-evaluating the same cell cannot collect the
    /// same coin twice.
    pub fn take_coin_at(&mut self, pos: Position) -> Option<DroppedCoin> {
        let idx = self.coins.iter().position(|c| c.position == pos)?;
        Some(self.coins.swap_remove(idx))
    }

    /// Collect any coin under the player into the wallet. Returns the amount
    /// picked up.
    pub fn collect_coin_under_player(&mut self) -> Option<i64> {
        let coin = self.take_coin_at(self.player.position)?;
        self.player.wallet = self.player.wallet.saturating_add(coin.amount);
        crate::metrics::inc_coins_picked_up();
        Some(coin.amount)
    }

    // --- player ------------------------------------------------------------

    /// Turn the player and step if the destination is walkable. Facing
    /// updates even when the step is blocked, matching how interaction
    /// targets the faced cell.
    pub fn move_player(&mut self, dir: Direction) -> bool {
        self.player.facing = dir;
        let dest = dir.step(self.player.position);
        if !self.is_walkable(dest) {
            return false;
        }
        self.player.position = dest;
        self.collect_coin_under_player();
        true
    }

    /// The cell the player would interact with.
    pub fn facing_cell(&self) -> Position {
        self.player.facing.step(self.player.position)
    }

    // --- chat log ----------------------------------------------------------

    pub fn push_chat(&mut self, speaker: &str, text: &str) {
        self.chat_log.push(ChatEntry {
            at: Utc::now(),
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    pub fn chat_log(&self) -> &[ChatEntry] {
        &self.chat_log
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
