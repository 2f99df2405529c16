//! The interaction / dialogue state machine.
//!
//! One explicit state enum replaces the dialogue-open, battle and player-turn
//! booleans of older revisions; invalid combinations are unrepresentable.
//! Remote work is expressed as [`ApiCall`] values returned to the engine loop
//! rather than performed here, and every call carries the session token
//! active at send time: a reply whose token no longer matches the live
//! session is discarded, so a cancelled conversation can never be revived by
//! a late response.

use log::debug;
use rand::Rng;
use uuid::Uuid;

use crate::api::{self, SpellEffect, SpellLookup};
use crate::engine::actor::CustomerStatus;
use crate::engine::state::GameState;
use crate::validation::{clamp_battle_text, normalize_input};
use crate::world::Position;

/// Reserved phrase that ends the game on the spot. Never reaches the network.
const DESTRUCTIVE_PHRASES: [&str; 3] = ["めがんて", "メガンテ", "megante"];

/// Reserved phrase that scrambles every customer to a random free cell.
const CHAOS_PHRASES: [&str; 3] = ["ぱるぷんて", "パルプンテ", "palpunte"];

/// Legacy crane-game override kept from the earliest revision: this exact
/// text wins the crane game outright when the player stands next to it.
const CRANE_OVERRIDE_TEXT: &str = "' OR 1=1; --";
const CRANE_GLYPH: &str = "🧸";

/// Shown while a remote request is in flight.
const WAITING_LINE: &str = "（・・・・・・）";

const DESTRUCTIVE_SCRIPT: [&str; 3] = [
    "メガンテをとなえた！",
    "大爆発が店内を飲み込んだ…",
    "ゲームセンターは跡形もなく消えた。",
];

const CHAOS_SCRIPT: [&str; 2] = [
    "パルプンテをとなえた！",
    "時空がねじれ、客たちが別の場所に投げ出された！",
];

const CRANE_VICTORY_SCRIPT: [&str; 3] = [
    "クレーンの制御が乗っ取られた！",
    "アルパカ人形がどさどさと落ちてくる！",
    "あなたの勝ちだ！",
];

const LETHAL_SCRIPT: [&str; 2] = ["まばゆい閃光！", "客は動かなくなった…"];
const SURVIVED_LINE: &str = "…効かなかったようだ。";
const CURSED_LINE: &str = "不気味な影がまとわりついた。呪われてしまったようだ…";
const GENERIC_EFFECT_LINE: &str = "何かが起きた気がする…";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// The destructive magic phrase was spoken; the game is over.
    GameOver,
    /// A ban is in flight: the parting line is showing, eviction pending.
    Banned { customer_id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    DialogueScripted,
    BattlePlayerTurn,
    Terminal(TerminalKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueTarget {
    Machine(u32),
    Customer(u32),
}

/// Remote work requested by a transition, performed by the engine loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Opening {
        token: Uuid,
        customer_id: u32,
        customer_name: String,
        machine_glyph: Option<String>,
    },
    Spell {
        token: Uuid,
        name: String,
    },
    Relay {
        token: Uuid,
        customer_id: u32,
        text: String,
    },
    Farewell {
        token: Uuid,
        customer_id: u32,
    },
    /// Best-effort persistence; carries no token because the local update
    /// already happened and no reply is ever applied.
    PersistWallet {
        customer_id: u32,
        total: i64,
    },
}

/// What a transition asks of the engine loop.
#[derive(Debug, PartialEq)]
pub enum FsmEvent {
    None,
    Request(ApiCall),
    /// The session ended and the attention cooldown should start.
    SessionClosed,
    GameOver,
}

#[derive(Debug, Clone)]
pub struct DialogueSession {
    pub token: Uuid,
    pub target: DialogueTarget,
    lines: Vec<String>,
    cursor: usize,
    battle: bool,
    /// Held while a remote request is outstanding; blocks submission and
    /// line advancement until the reply (or fallback) lands.
    turn_held: bool,
    /// Raw battle text awaiting spell-lookup resolution.
    pending_text: Option<String>,
    /// Glyph of the machine that provoked the addressed customer, if any.
    context_glyph: Option<String>,
}

impl DialogueSession {
    pub fn current_line(&self) -> Option<&str> {
        self.lines.get(self.cursor).map(|s| s.as_str())
    }

    pub fn has_next_line(&self) -> bool {
        self.cursor + 1 < self.lines.len()
    }

    pub fn is_battle(&self) -> bool {
        self.battle
    }

    pub fn is_waiting(&self) -> bool {
        self.turn_held
    }

    fn show(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.cursor = 0;
    }
}

pub struct InteractionFsm {
    state: InteractionState,
    session: Option<DialogueSession>,
}

impl InteractionFsm {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn session(&self) -> Option<&DialogueSession> {
        self.session.as_ref()
    }

    pub fn is_dialogue_open(&self) -> bool {
        !matches!(self.state, InteractionState::Idle)
    }

    /// Confirm action: open a session against the faced occupant, or advance
    /// the current one.
    pub fn interact(&mut self, state: &mut GameState) -> FsmEvent {
        match self.state {
            InteractionState::Idle => self.begin_interaction(state),
            InteractionState::DialogueScripted => self.advance_line(state),
            // Battle input arrives as text, and terminal outcomes run their
            // course on engine deadlines; confirm does nothing here.
            InteractionState::BattlePlayerTurn | InteractionState::Terminal(_) => FsmEvent::None,
        }
    }

    fn begin_interaction(&mut self, state: &mut GameState) -> FsmEvent {
        let target = state.facing_cell();
        if let Some(machine) = state.map().machine_at(target) {
            let machine_id = machine.id;
            let glyph = machine.glyph;
            let lines: Vec<String> = machine.script.iter().map(|s| s.to_string()).collect();
            for line in &lines {
                state.push_chat(glyph, line);
            }
            self.session = Some(DialogueSession {
                token: Uuid::new_v4(),
                target: DialogueTarget::Machine(machine_id),
                lines,
                cursor: 0,
                battle: false,
                turn_held: false,
                pending_text: None,
                context_glyph: None,
            });
            self.state = InteractionState::DialogueScripted;
            return FsmEvent::None;
        }
        if let Some(customer) = state.customer_at(target) {
            let customer_id = customer.id;
            let customer_name = customer.profile.name.clone();
            let glyph = state
                .map()
                .machine_adjacent_to(customer.position)
                .map(|m| m.glyph.to_string());
            state.set_calling(customer_id, false);
            let token = Uuid::new_v4();
            self.session = Some(DialogueSession {
                token,
                target: DialogueTarget::Customer(customer_id),
                lines: vec![WAITING_LINE.to_string()],
                cursor: 0,
                battle: true,
                turn_held: true,
                pending_text: None,
                context_glyph: glyph.clone(),
            });
            self.state = InteractionState::DialogueScripted;
            return FsmEvent::Request(ApiCall::Opening {
                token,
                customer_id,
                customer_name,
                machine_glyph: glyph,
            });
        }
        FsmEvent::None
    }

    fn advance_line(&mut self, state: &mut GameState) -> FsmEvent {
        let Some(session) = self.session.as_mut() else {
            debug!("advance with no session (no-op)");
            self.state = InteractionState::Idle;
            return FsmEvent::None;
        };
        if session.turn_held {
            return FsmEvent::None;
        }
        if session.has_next_line() {
            session.cursor += 1;
            return FsmEvent::None;
        }
        if session.battle {
            self.state = InteractionState::BattlePlayerTurn;
            return FsmEvent::None;
        }
        self.close_session(state)
    }

    /// Cancel action: conversational states return to Idle; terminal
    /// outcomes are not skippable.
    pub fn cancel(&mut self, state: &mut GameState) -> FsmEvent {
        match self.state {
            InteractionState::DialogueScripted | InteractionState::BattlePlayerTurn => {
                self.close_session(state)
            }
            InteractionState::Idle | InteractionState::Terminal(_) => FsmEvent::None,
        }
    }

    fn close_session(&mut self, state: &mut GameState) -> FsmEvent {
        state.clear_all_calling();
        self.session = None;
        self.state = InteractionState::Idle;
        FsmEvent::SessionClosed
    }

    /// Free-text battle submission. Dispatch order: reserved magic words
    /// (local, never networked), then remote spell lookup; the legacy crane
    /// override and the generic relay hang off the lookup result.
    pub fn submit_text<R: Rng>(
        &mut self,
        state: &mut GameState,
        raw: &str,
        rng: &mut R,
    ) -> FsmEvent {
        if self.state != InteractionState::BattlePlayerTurn {
            return FsmEvent::None;
        }
        let Some(session) = self.session.as_mut() else {
            return FsmEvent::None;
        };
        if session.turn_held {
            return FsmEvent::None;
        }

        let text = clamp_battle_text(raw);
        if text.is_empty() {
            return FsmEvent::None;
        }
        state.push_chat("あなた", &text);
        let normalized = normalize_input(&text);

        if DESTRUCTIVE_PHRASES.contains(&normalized.as_str()) {
            session.show(DESTRUCTIVE_SCRIPT.iter().map(|s| s.to_string()).collect());
            session.battle = false;
            for line in DESTRUCTIVE_SCRIPT {
                state.push_chat("！！！", line);
            }
            self.state = InteractionState::Terminal(TerminalKind::GameOver);
            return FsmEvent::GameOver;
        }

        if CHAOS_PHRASES.contains(&normalized.as_str()) {
            session.show(CHAOS_SCRIPT.iter().map(|s| s.to_string()).collect());
            self.state = InteractionState::DialogueScripted;
            scatter_customers(state, rng);
            return FsmEvent::None;
        }

        session.turn_held = true;
        session.pending_text = Some(text);
        let token = session.token;
        session.show(vec![WAITING_LINE.to_string()]);
        self.state = InteractionState::DialogueScripted;
        FsmEvent::Request(ApiCall::Spell {
            token,
            name: normalized,
        })
    }

    /// Ban command: request a parting line and hold the session in the
    /// banned-terminal state until the engine's farewell deadline fires.
    pub fn request_ban(&mut self, state: &mut GameState) -> FsmEvent {
        if !matches!(
            self.state,
            InteractionState::DialogueScripted | InteractionState::BattlePlayerTurn
        ) {
            return FsmEvent::None;
        }
        let Some(session) = self.session.as_mut() else {
            return FsmEvent::None;
        };
        let DialogueTarget::Customer(customer_id) = session.target else {
            debug!("ban ignored: machines cannot be banned");
            return FsmEvent::None;
        };
        if state.customer(customer_id).is_none() {
            // Addressed actor already gone; treat as a plain close.
            return self.close_session(state);
        }
        session.turn_held = true;
        session.show(vec![WAITING_LINE.to_string()]);
        let token = session.token;
        self.state = InteractionState::Terminal(TerminalKind::Banned { customer_id });
        FsmEvent::Request(ApiCall::Farewell { token, customer_id })
    }

    // --- reply application (all stale-token guarded) -----------------------

    fn live_session(&mut self, token: Uuid) -> Option<&mut DialogueSession> {
        let matched = self.session.as_mut().filter(|s| s.token == token);
        if matched.is_none() {
            crate::metrics::inc_stale_replies_dropped();
            debug!("discarding stale reply for session {}", token);
        }
        matched
    }

    /// Opening reply for a customer conversation; `None` selects the
    /// per-glyph scripted fallback.
    pub fn apply_opening(
        &mut self,
        state: &mut GameState,
        token: Uuid,
        lines: Option<Vec<String>>,
    ) {
        let Some(session) = self.live_session(token) else {
            return;
        };
        let lines = match lines {
            Some(lines) if !lines.is_empty() => lines,
            _ => vec![api::opening_fallback(session.context_glyph.as_deref())],
        };
        let speaker = speaker_label(state, session.target);
        for line in &lines {
            state.push_chat(&speaker, line);
        }
        session.show(lines);
        session.turn_held = false;
    }

    /// Spell-lookup resolution. `None` means the collaborator was
    /// unreachable; the local branches still run so offline play keeps
    /// working, but no relay is attempted.
    pub fn apply_spell(
        &mut self,
        state: &mut GameState,
        token: Uuid,
        result: Option<SpellLookup>,
    ) -> FsmEvent {
        let pending;
        let target;
        {
            let Some(session) = self.live_session(token) else {
                return FsmEvent::None;
            };
            pending = session.pending_text.take().unwrap_or_default();
            session.turn_held = false;
            target = session.target;
        }

        match result {
            Some(SpellLookup::Found(effect)) => self.apply_spell_effect(state, effect),
            Some(SpellLookup::NotFound) => {
                if self.crane_override_applies(state, &pending) {
                    return self.apply_crane_victory(state);
                }
                let DialogueTarget::Customer(customer_id) = target else {
                    return FsmEvent::None;
                };
                let Some(session) = self.session.as_mut() else {
                    return FsmEvent::None;
                };
                session.turn_held = true;
                session.show(vec![WAITING_LINE.to_string()]);
                FsmEvent::Request(ApiCall::Relay {
                    token,
                    customer_id,
                    text: pending,
                })
            }
            None => {
                if self.crane_override_applies(state, &pending) {
                    return self.apply_crane_victory(state);
                }
                let Some(session) = self.session.as_mut() else {
                    return FsmEvent::None;
                };
                session.show(vec![api::relay_fallback()]);
                self.state = InteractionState::DialogueScripted;
                FsmEvent::None
            }
        }
    }

    fn crane_override_applies(&self, state: &GameState, text: &str) -> bool {
        if text != CRANE_OVERRIDE_TEXT {
            return false;
        }
        player_adjacent_glyph(state) == Some(CRANE_GLYPH)
    }

    fn apply_crane_victory(&mut self, state: &mut GameState) -> FsmEvent {
        let Some(session) = self.session.as_mut() else {
            return FsmEvent::None;
        };
        session.show(CRANE_VICTORY_SCRIPT.iter().map(|s| s.to_string()).collect());
        session.battle = false;
        for line in CRANE_VICTORY_SCRIPT {
            state.push_chat(CRANE_GLYPH, line);
        }
        self.state = InteractionState::DialogueScripted;
        FsmEvent::None
    }

    fn apply_spell_effect(&mut self, state: &mut GameState, effect: SpellEffect) -> FsmEvent {
        let Some(session) = self.session.as_mut() else {
            return FsmEvent::None;
        };
        let DialogueTarget::Customer(customer_id) = session.target else {
            return FsmEvent::None;
        };
        match effect {
            SpellEffect::Lethal => {
                session.show(LETHAL_SCRIPT.iter().map(|s| s.to_string()).collect());
                session.battle = false;
                self.state = InteractionState::DialogueScripted;
                state.set_customer_status(customer_id, CustomerStatus::Dead);
                state.remove_customer(customer_id);
                FsmEvent::None
            }
            SpellEffect::Survived => {
                session.show(vec![SURVIVED_LINE.to_string()]);
                self.state = InteractionState::DialogueScripted;
                FsmEvent::None
            }
            SpellEffect::Cursed => {
                session.show(vec![CURSED_LINE.to_string()]);
                self.state = InteractionState::DialogueScripted;
                state.set_customer_status(customer_id, CustomerStatus::Cursed);
                FsmEvent::None
            }
            SpellEffect::Monetary(delta) => {
                session.show(vec![format!("財布が勝手に開いた！（{}G）", delta)]);
                self.state = InteractionState::DialogueScripted;
                match state.adjust_customer_wallet(customer_id, delta) {
                    Some(total) => FsmEvent::Request(ApiCall::PersistWallet { customer_id, total }),
                    None => FsmEvent::None,
                }
            }
            SpellEffect::Generic(text) => {
                let line = if text.trim().is_empty() {
                    GENERIC_EFFECT_LINE.to_string()
                } else {
                    text
                };
                session.show(vec![line]);
                self.state = InteractionState::DialogueScripted;
                FsmEvent::None
            }
        }
    }

    /// Relay reply; `None` selects the generic scripted fallback.
    pub fn apply_relay(&mut self, state: &mut GameState, token: Uuid, lines: Option<Vec<String>>) {
        let Some(session) = self.live_session(token) else {
            return;
        };
        let lines = match lines {
            Some(lines) if !lines.is_empty() => lines,
            _ => vec![api::relay_fallback()],
        };
        let speaker = speaker_label(state, session.target);
        for line in &lines {
            state.push_chat(&speaker, line);
        }
        session.show(lines);
        session.turn_held = false;
        self.state = InteractionState::DialogueScripted;
    }

    /// Parting line arrived (or fell back); the engine schedules the
    /// eviction deadline once this returns true.
    pub fn apply_farewell(
        &mut self,
        state: &mut GameState,
        token: Uuid,
        lines: Option<Vec<String>>,
    ) -> bool {
        let Some(session) = self.live_session(token) else {
            return false;
        };
        let line = lines
            .and_then(|mut l| if l.is_empty() { None } else { Some(l.remove(0)) })
            .unwrap_or_else(api::farewell_fallback);
        let speaker = speaker_label(state, session.target);
        state.push_chat(&speaker, &line);
        session.show(vec![line]);
        session.turn_held = false;
        true
    }

    /// Farewell deadline fired: evict, record the ban, return to Idle.
    pub fn complete_ban(&mut self, state: &mut GameState) -> FsmEvent {
        let InteractionState::Terminal(TerminalKind::Banned { customer_id }) = self.state else {
            return FsmEvent::None;
        };
        state.ban_customer(customer_id);
        debug!("customer {} banned and evicted", customer_id);
        self.close_session(state)
    }
}

impl Default for InteractionFsm {
    fn default() -> Self {
        Self::new()
    }
}

fn speaker_label(state: &GameState, target: DialogueTarget) -> String {
    match target {
        DialogueTarget::Machine(id) => state
            .map()
            .machines()
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.glyph.to_string())
            .unwrap_or_else(|| "？？？".to_string()),
        DialogueTarget::Customer(id) => state
            .customer(id)
            .map(|c| c.profile.name.clone())
            .unwrap_or_else(|| "？？？".to_string()),
    }
}

fn player_adjacent_glyph(state: &GameState) -> Option<&'static str> {
    state
        .map()
        .machine_adjacent_to(state.player.position)
        .map(|m| m.glyph)
}

/// Chaos phrase effect: every customer lands on a random free cell.
fn scatter_customers<R: Rng>(state: &mut GameState, rng: &mut R) {
    let mut next = state.customers().to_vec();
    let mut claimed: Vec<Position> = Vec::with_capacity(next.len());
    for customer in next.iter_mut() {
        for _ in 0..200 {
            let pos = Position::new(
                rng.gen_range(0..crate::world::MAP_WIDTH),
                rng.gen_range(0..crate::world::MAP_HEIGHT),
            );
            if state.is_walkable(pos) && !claimed.contains(&pos) {
                customer.position = pos;
                break;
            }
        }
        claimed.push(customer.position);
    }
    state.replace_customers(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actor::{Customer, CustomerProfile};
    use crate::world::Direction;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fsm_with_customer_faced(state: &mut GameState) -> InteractionFsm {
        // Player starts at (10,12); put the customer directly below and face it.
        let pos = Direction::Down.step(state.player.position);
        let customer = Customer::new(CustomerProfile::new(100, "ユウタ", 24, 3200, ""), pos);
        assert!(state.admit_customer(customer));
        state.player.facing = Direction::Down;
        InteractionFsm::new()
    }

    fn enter_battle(fsm: &mut InteractionFsm, state: &mut GameState) {
        let event = fsm.interact(state);
        let token = match event {
            FsmEvent::Request(ApiCall::Opening { token, .. }) => token,
            other => panic!("expected opening request, got {:?}", other),
        };
        fsm.apply_opening(state, token, Some(vec!["やあ".to_string()]));
        // Advance past the single opening line into the player's turn.
        assert_eq!(fsm.interact(state), FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::BattlePlayerTurn);
    }

    #[test]
    fn machine_interaction_plays_script_then_closes() {
        let mut state = GameState::new();
        // Stand under the information desk (9,6) and face up.
        state.player.position = Position::new(9, 7);
        state.player.facing = Direction::Up;
        let mut fsm = InteractionFsm::new();
        assert_eq!(fsm.interact(&mut state), FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::DialogueScripted);
        assert!(!fsm.session().unwrap().is_battle());
        assert_eq!(fsm.interact(&mut state), FsmEvent::None); // second line
        assert_eq!(fsm.interact(&mut state), FsmEvent::SessionClosed);
        assert_eq!(fsm.state(), InteractionState::Idle);
    }

    #[test]
    fn interact_into_empty_cell_is_noop() {
        let mut state = GameState::new();
        state.player.facing = Direction::Down;
        let mut fsm = InteractionFsm::new();
        assert_eq!(fsm.interact(&mut state), FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::Idle);
    }

    #[test]
    fn destructive_phrase_never_reaches_network() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let event = fsm.submit_text(&mut state, "  メガンテ ", &mut rng);
        assert_eq!(event, FsmEvent::GameOver);
        assert_eq!(
            fsm.state(),
            InteractionState::Terminal(TerminalKind::GameOver)
        );
    }

    #[test]
    fn destructive_phrase_case_insensitive_ascii() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            fsm.submit_text(&mut state, "MeGaNtE", &mut rng),
            FsmEvent::GameOver
        );
    }

    #[test]
    fn unmatched_text_requests_spell_lookup_first() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let event = fsm.submit_text(&mut state, "ファイアボール", &mut rng);
        match event {
            FsmEvent::Request(ApiCall::Spell { name, .. }) => {
                assert_eq!(name, "ファイアボール");
            }
            other => panic!("expected spell lookup, got {:?}", other),
        }
        assert!(fsm.session().unwrap().is_waiting());
    }

    #[test]
    fn submission_blocked_while_turn_held() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            fsm.submit_text(&mut state, "こんにちは", &mut rng),
            FsmEvent::Request(_)
        ));
        // A second submission while the lookup is in flight goes nowhere.
        assert_eq!(
            fsm.submit_text(&mut state, "もう一回", &mut rng),
            FsmEvent::None
        );
    }

    #[test]
    fn spell_not_found_falls_through_to_relay() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "こんにちは", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        let event = fsm.apply_spell(&mut state, token, Some(SpellLookup::NotFound));
        match event {
            FsmEvent::Request(ApiCall::Relay {
                text, customer_id, ..
            }) => {
                assert_eq!(text, "こんにちは");
                assert_eq!(customer_id, 100);
            }
            other => panic!("expected relay, got {:?}", other),
        }
    }

    #[test]
    fn transport_failure_degrades_to_scripted_line() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "こんにちは", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        let event = fsm.apply_spell(&mut state, token, None);
        assert_eq!(event, FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::DialogueScripted);
        assert!(fsm.session().unwrap().current_line().is_some());
        // Conversation continues; the loop never halts on a network error.
        assert_eq!(fsm.interact(&mut state), FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::BattlePlayerTurn);
    }

    #[test]
    fn lethal_effect_removes_customer() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "ザラキ", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        let event = fsm.apply_spell(
            &mut state,
            token,
            Some(SpellLookup::Found(SpellEffect::Lethal)),
        );
        assert_eq!(event, FsmEvent::None);
        assert!(state.customer(100).is_none());
        assert!(!fsm.session().unwrap().is_battle());
    }

    #[test]
    fn cursed_effect_tags_status_and_continues() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "のろい", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        fsm.apply_spell(
            &mut state,
            token,
            Some(SpellLookup::Found(SpellEffect::Cursed)),
        );
        assert_eq!(
            state.customer(100).unwrap().profile.status,
            CustomerStatus::Cursed
        );
        assert!(fsm.session().unwrap().is_battle());
    }

    #[test]
    fn monetary_effect_requests_persistence() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "ゴールドシャワー", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        let event = fsm.apply_spell(
            &mut state,
            token,
            Some(SpellLookup::Found(SpellEffect::Monetary(500))),
        );
        assert_eq!(
            event,
            FsmEvent::Request(ApiCall::PersistWallet {
                customer_id: 100,
                total: 3700,
            })
        );
        assert_eq!(state.customer(100).unwrap().profile.money, 3700);
    }

    #[test]
    fn stale_reply_is_discarded_after_cancel() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, "こんにちは", &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fsm.cancel(&mut state), FsmEvent::SessionClosed);
        assert_eq!(fsm.state(), InteractionState::Idle);
        // The late reply must not revive the dead session.
        let event = fsm.apply_spell(
            &mut state,
            token,
            Some(SpellLookup::Found(SpellEffect::Lethal)),
        );
        assert_eq!(event, FsmEvent::None);
        assert!(state.customer(100).is_some());
        assert_eq!(fsm.state(), InteractionState::Idle);
    }

    #[test]
    fn crane_override_wins_when_player_beside_crane() {
        let mut state = GameState::new();
        // Player next to the crane game at (12,3); customer on the far side.
        state.player.position = Position::new(12, 2);
        state.player.facing = Direction::Right;
        let customer = Customer::new(
            CustomerProfile::new(100, "ユウタ", 24, 3200, ""),
            Position::new(13, 2),
        );
        assert!(state.admit_customer(customer));
        let mut fsm = InteractionFsm::new();
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, CRANE_OVERRIDE_TEXT, &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        let event = fsm.apply_spell(&mut state, token, Some(SpellLookup::NotFound));
        assert_eq!(event, FsmEvent::None);
        let session = fsm.session().unwrap();
        assert!(!session.is_battle());
        assert_eq!(session.current_line(), Some(CRANE_VICTORY_SCRIPT[0]));
    }

    #[test]
    fn crane_override_requires_adjacency() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state); // player nowhere near the crane
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(1);
        let token = match fsm.submit_text(&mut state, CRANE_OVERRIDE_TEXT, &mut rng) {
            FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
            other => panic!("unexpected {:?}", other),
        };
        // Away from the crane the text is just another relayed message.
        let event = fsm.apply_spell(&mut state, token, Some(SpellLookup::NotFound));
        assert!(matches!(event, FsmEvent::Request(ApiCall::Relay { .. })));
    }

    #[test]
    fn ban_flow_evicts_after_farewell() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let event = fsm.request_ban(&mut state);
        let token = match event {
            FsmEvent::Request(ApiCall::Farewell { token, customer_id }) => {
                assert_eq!(customer_id, 100);
                token
            }
            other => panic!("expected farewell request, got {:?}", other),
        };
        assert!(matches!(
            fsm.state(),
            InteractionState::Terminal(TerminalKind::Banned { customer_id: 100 })
        ));
        assert!(fsm.apply_farewell(&mut state, token, None));
        assert_eq!(fsm.complete_ban(&mut state), FsmEvent::SessionClosed);
        assert_eq!(fsm.state(), InteractionState::Idle);
        assert!(state.customer(100).is_none());
        assert!(state.is_banned(100));
        // Banning again is a no-op.
        assert!(!state.ban_customer(100));
    }

    #[test]
    fn chaos_phrase_scatters_and_continues() {
        let mut state = GameState::new();
        let mut fsm = fsm_with_customer_faced(&mut state);
        enter_battle(&mut fsm, &mut state);
        let mut rng = StdRng::seed_from_u64(42);
        let event = fsm.submit_text(&mut state, "パルプンテ", &mut rng);
        assert_eq!(event, FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::DialogueScripted);
        // Narration plays, then the battle turn resumes.
        assert_eq!(fsm.interact(&mut state), FsmEvent::None);
        assert_eq!(fsm.interact(&mut state), FsmEvent::None);
        assert_eq!(fsm.state(), InteractionState::BattlePlayerTurn);
    }
}
