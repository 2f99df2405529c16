//! The simulation engine: a single-task event loop over player input, the
//! movement tick, spawn timers, and replies from the remote collaborator.
//!
//! All game state lives on this task; remote calls run as spawned tasks that
//! report back over an mpsc channel, each tagged with the dialogue-session
//! token that was active at send time. The loop applies replies through the
//! interaction state machine, which discards anything stale.

pub mod actor;
pub mod dialogue;
pub mod input;
pub mod spawn;
pub mod state;
pub mod tick;

use anyhow::Result;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::api::{NpcChatClient, RemoteProfile, SpellLookup};
use crate::config::Config;
use crate::engine::dialogue::{ApiCall, FsmEvent, InteractionFsm};
use crate::engine::input::Action;
use crate::engine::spawn::SpawnController;
use crate::engine::state::GameState;
use crate::logutil::escape_log;

/// Reply from a spawned request task, routed back into the engine loop.
#[derive(Debug)]
pub enum ApiReply {
    Session { token: Uuid, payload: ReplyPayload },
    Candidate(Option<RemoteProfile>),
}

#[derive(Debug)]
pub enum ReplyPayload {
    /// Opening/relay/farewell lines; `None` selects the scripted fallback.
    Opening(Option<Vec<String>>),
    Spell(Option<SpellLookup>),
    Relay(Option<Vec<String>>),
    Farewell(Option<Vec<String>>),
}

pub struct Engine {
    config: Config,
    state: GameState,
    fsm: InteractionFsm,
    spawner: SpawnController,
    rng: StdRng,
    api: Arc<NpcChatClient>,
    input_rx: mpsc::UnboundedReceiver<String>,
    reply_tx: mpsc::UnboundedSender<ApiReply>,
    reply_rx: mpsc::UnboundedReceiver<ApiReply>,
    /// Attention-seeking cooldown deadline; elections pause until it passes.
    call_cooldown_until: Option<Instant>,
    /// One-shot deadlines for the staggered initial seeding.
    initial_spawns: VecDeque<Instant>,
    /// Eviction deadline while a ban's parting line is on screen.
    farewell_deadline: Option<Instant>,
    headless: bool,
}

impl Engine {
    /// Build the engine and hand back the input channel the front end writes
    /// player lines into. A fixed `seed` makes the whole simulation
    /// deterministic.
    pub fn new(
        config: Config,
        seed: Option<u64>,
        headless: bool,
    ) -> (Self, mpsc::UnboundedSender<String>) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let api = Arc::new(NpcChatClient::new(config.api.clone()));
        let engine = Self {
            config,
            state: GameState::new(),
            fsm: InteractionFsm::new(),
            spawner: SpawnController::new(),
            rng,
            api,
            input_rx,
            reply_tx,
            reply_rx,
            call_cooldown_until: None,
            initial_spawns: VecDeque::new(),
            farewell_deadline: None,
            headless,
        };
        (engine, input_tx)
    }

    /// Run until the input channel closes. Returns the final game state so
    /// callers can report a summary.
    pub async fn run(mut self) -> Result<GameState> {
        let mut tick = tokio::time::interval(Duration::from_millis(self.config.game.tick_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut spawn_timer =
            tokio::time::interval(Duration::from_secs(self.config.game.spawn_interval_secs));
        spawn_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The periodic timers fire immediately on the first tick; burn those
        // so the world starts quiet.
        tick.tick().await;
        spawn_timer.tick().await;

        let now = Instant::now();
        let stagger = Duration::from_secs(self.config.game.initial_spawn_delay_secs);
        self.initial_spawns = VecDeque::from([now + stagger, now + stagger * 2]);

        info!(
            "arcade open: tick {}ms, spawn every {}s",
            self.config.game.tick_ms, self.config.game.spawn_interval_secs
        );
        self.render();

        loop {
            let initial_deadline = self.initial_spawns.front().copied();
            let farewell_deadline = self.farewell_deadline;
            tokio::select! {
                _ = tick.tick() => {
                    self.on_tick();
                }
                _ = spawn_timer.tick() => {
                    self.begin_spawn_attempt();
                }
                _ = sleep_until(initial_deadline.unwrap_or_else(Instant::now)),
                    if initial_deadline.is_some() =>
                {
                    self.initial_spawns.pop_front();
                    self.begin_spawn_attempt();
                }
                _ = sleep_until(farewell_deadline.unwrap_or_else(Instant::now)),
                    if farewell_deadline.is_some() =>
                {
                    self.farewell_deadline = None;
                    let event = self.fsm.complete_ban(&mut self.state);
                    self.handle_event(event);
                    self.render();
                }
                maybe_line = self.input_rx.recv() => {
                    match maybe_line {
                        Some(line) => {
                            if !self.on_input(&line) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                maybe_reply = self.reply_rx.recv() => {
                    if let Some(reply) = maybe_reply {
                        self.on_reply(reply);
                    }
                }
            }
        }

        info!("arcade closed");
        Ok(self.state)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    // --- timers ------------------------------------------------------------

    fn on_tick(&mut self) {
        // The world is frozen while any dialogue is open; skipped ticks are
        // dropped, not queued.
        if self.fsm.is_dialogue_open() {
            crate::metrics::inc_ticks_skipped_dialogue();
            return;
        }
        let allow_calling = self
            .call_cooldown_until
            .map_or(true, |until| Instant::now() >= until);
        if allow_calling {
            self.call_cooldown_until = None;
        }
        let report = tick::run_movement_tick(
            &mut self.state,
            &self.config.game,
            allow_calling,
            &mut self.rng,
        );
        if let Some(amount) = report.coin_picked_up {
            info!("picked up {}G (wallet: {}G)", amount, self.state.player.wallet);
        }
        if report.moves > 0 || report.new_caller.is_some() {
            self.render();
        }
    }

    /// Spawn path: ask the collaborator for a fresh candidate first when it
    /// is reachable; otherwise spawn straight from the roster.
    fn begin_spawn_attempt(&mut self) {
        if self.api.is_enabled() {
            let api = self.api.clone();
            let tx = self.reply_tx.clone();
            tokio::spawn(async move {
                let candidate = api.fetch_candidate_profile().await;
                let _ = tx.send(ApiReply::Candidate(candidate));
            });
        } else {
            self.finish_spawn_attempt(None);
        }
    }

    fn finish_spawn_attempt(&mut self, remote: Option<&RemoteProfile>) {
        let outcome = self.spawner.try_spawn(&mut self.state, remote, &mut self.rng);
        debug!("spawn attempt: {:?}", outcome);
        if matches!(outcome, spawn::SpawnOutcome::Spawned(_)) {
            self.render();
        }
    }

    // --- input -------------------------------------------------------------

    /// Returns false when the player quits.
    fn on_input(&mut self, line: &str) -> bool {
        let action = input::dispatch(line, self.fsm.state());
        match action {
            Action::Move(dir) => {
                if self.state.move_player(dir) && self.state.map().is_exit_tile(self.state.player.position) {
                    info!("player reached the exit");
                }
            }
            Action::Interact => {
                let event = self.fsm.interact(&mut self.state);
                self.handle_event(event);
            }
            Action::SubmitText(text) => {
                debug!("battle text: {}", escape_log(&text));
                let event = self.fsm.submit_text(&mut self.state, &text, &mut self.rng);
                self.handle_event(event);
            }
            Action::Cancel => {
                let event = self.fsm.cancel(&mut self.state);
                self.handle_event(event);
            }
            Action::Ban => {
                let event = self.fsm.request_ban(&mut self.state);
                self.handle_event(event);
            }
            Action::Quit => return false,
            Action::None => {}
        }
        self.render();
        true
    }

    // --- state machine plumbing --------------------------------------------

    fn handle_event(&mut self, event: FsmEvent) {
        match event {
            FsmEvent::None => {}
            FsmEvent::Request(call) => self.dispatch_call(call),
            FsmEvent::SessionClosed => {
                let cooldown = Duration::from_secs(self.config.game.call_cooldown_secs);
                self.call_cooldown_until = Some(Instant::now() + cooldown);
            }
            FsmEvent::GameOver => {
                warn!("the arcade was destroyed by a magic word");
            }
        }
    }

    fn dispatch_call(&mut self, call: ApiCall) {
        let api = self.api.clone();
        let tx = self.reply_tx.clone();
        match call {
            ApiCall::Opening {
                token,
                customer_id,
                customer_name,
                machine_glyph,
            } => {
                tokio::spawn(async move {
                    let lines = match api
                        .opening_line(customer_id, &customer_name, machine_glyph.as_deref())
                        .await
                    {
                        Ok(lines) => Some(lines),
                        Err(e) => {
                            warn!("opening line for customer {} failed: {}", customer_id, e);
                            None
                        }
                    };
                    let _ = tx.send(ApiReply::Session {
                        token,
                        payload: ReplyPayload::Opening(lines),
                    });
                });
            }
            ApiCall::Spell { token, name } => {
                tokio::spawn(async move {
                    let result = match api.lookup_spell(&name).await {
                        Ok(lookup) => Some(lookup),
                        Err(e) => {
                            warn!("spell lookup '{}' failed: {}", escape_log(&name), e);
                            None
                        }
                    };
                    let _ = tx.send(ApiReply::Session {
                        token,
                        payload: ReplyPayload::Spell(result),
                    });
                });
            }
            ApiCall::Relay {
                token,
                customer_id,
                text,
            } => {
                tokio::spawn(async move {
                    let lines = match api.relay_message(customer_id, &text).await {
                        Ok(lines) => Some(lines),
                        Err(e) => {
                            warn!("message relay to customer {} failed: {}", customer_id, e);
                            None
                        }
                    };
                    let _ = tx.send(ApiReply::Session {
                        token,
                        payload: ReplyPayload::Relay(lines),
                    });
                });
            }
            ApiCall::Farewell { token, customer_id } => {
                tokio::spawn(async move {
                    let lines = match api.farewell_line(customer_id).await {
                        Ok(lines) => Some(lines),
                        Err(e) => {
                            debug!("farewell line for customer {} failed: {}", customer_id, e);
                            None
                        }
                    };
                    let _ = tx.send(ApiReply::Session {
                        token,
                        payload: ReplyPayload::Farewell(lines),
                    });
                });
            }
            ApiCall::PersistWallet { customer_id, total } => {
                tokio::spawn(async move {
                    api.persist_wallet(customer_id, total).await;
                });
            }
        }
    }

    fn on_reply(&mut self, reply: ApiReply) {
        match reply {
            ApiReply::Session { token, payload } => match payload {
                ReplyPayload::Opening(lines) => {
                    self.fsm.apply_opening(&mut self.state, token, lines);
                }
                ReplyPayload::Spell(result) => {
                    let event = self.fsm.apply_spell(&mut self.state, token, result);
                    self.handle_event(event);
                }
                ReplyPayload::Relay(lines) => {
                    self.fsm.apply_relay(&mut self.state, token, lines);
                }
                ReplyPayload::Farewell(lines) => {
                    if self.fsm.apply_farewell(&mut self.state, token, lines) {
                        let delay = Duration::from_secs(self.config.game.farewell_delay_secs);
                        self.farewell_deadline = Some(Instant::now() + delay);
                    }
                }
            },
            ApiReply::Candidate(candidate) => {
                self.finish_spawn_attempt(candidate.as_ref());
            }
        }
        self.render();
    }

    fn render(&self) {
        if self.headless {
            return;
        }
        println!("{}", crate::render::render_frame(&self.state, &self.fsm));
    }
}
