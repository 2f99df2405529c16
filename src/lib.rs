//! # Arcadesim - a tile-grid arcade-center simulation
//!
//! Arcadesim recreates a small top-down "arcade center": the player walks a
//! fixed 20x15 floor, talks to stationary machines, and chats with roaming
//! customers whose lines come from a remote NPC-response service. The
//! simulation is tick-driven; conversations freeze the world while they run.
//!
//! ## Features
//!
//! - **Movement simulation**: a fixed-period tick wanders every customer one
//!   cell at a time against a shared pre-tick snapshot, so outcomes never
//!   depend on iteration order.
//! - **Dialogue state machine**: one explicit state enum covering free roam,
//!   scripted playback, the free-text battle turn, and terminal outcomes.
//! - **Remote chatter**: customer openings, replies, and "magic spell"
//!   lookups call an external service; every failure degrades to a scripted
//!   line so the fiction never breaks.
//! - **Session correlation**: outstanding requests carry the dialogue-session
//!   token; late replies for a cancelled conversation are discarded.
//! - **Configurable pacing**: tick period, spawn cadence, coin economics and
//!   cooldowns all come from `config.toml`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcadesim::config::Config;
//! use arcadesim::engine::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (engine, _input_tx) = Engine::new(config, None, false);
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - tick scheduler, interaction state machine, spawn controller
//! - [`world`] - immutable tile grid and machine roster
//! - [`api`] - remote NPC-response collaborator client
//! - [`config`] - configuration management and validation
//! - [`render`] - ASCII frame presentation
//! - [`validation`] - input normalization helpers

pub mod api;
pub mod config;
pub mod engine;
pub mod logutil;
pub mod metrics;
pub mod render;
pub mod validation;
pub mod world;
