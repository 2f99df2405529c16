//! Configuration management for the arcade simulation.
//!
//! All timing and probability constants of the simulation are configuration
//! fields rather than compile-time contracts: observed revisions of the game
//! disagreed on the exact values (spawn period anywhere from 12 to 90
//! seconds), so the engine reads everything from `[game]` and the test suite
//! parametrizes over these fields.
//!
//! Layout:
//!
//! - `[game]` - tick period, spawn cadence, coin economics, cooldowns
//! - `[api]` - remote NPC-response collaborator endpoint
//! - `[logging]` - level and optional log file
//!
//! Configuration is TOML on disk, loaded once at startup:
//!
//! ```rust,no_run
//! use arcadesim::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("tick every {} ms", config.game.tick_ms);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Simulation timing and probability parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Movement tick period in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Period between periodic spawn attempts, in seconds.
    #[serde(default = "default_spawn_interval_secs")]
    pub spawn_interval_secs: u64,
    /// Stagger between the two initial seeding spawns, in seconds.
    #[serde(default = "default_initial_spawn_delay_secs")]
    pub initial_spawn_delay_secs: u64,
    /// Cooldown after a dialogue closes before another customer may start
    /// calling for attention, in seconds.
    #[serde(default = "default_call_cooldown_secs")]
    pub call_cooldown_secs: u64,
    /// Probability (0.0..=1.0) that a successful customer move drops a coin
    /// at the vacated cell.
    #[serde(default = "default_coin_drop_chance")]
    pub coin_drop_chance: f64,
    /// Fixed amount carried by every dropped coin.
    #[serde(default = "default_coin_amount")]
    pub coin_amount: i64,
    /// How long a banned customer's parting line stays on screen before the
    /// customer is evicted, in seconds.
    #[serde(default = "default_farewell_delay_secs")]
    pub farewell_delay_secs: u64,
}

fn default_tick_ms() -> u64 {
    1000
}
fn default_spawn_interval_secs() -> u64 {
    12
}
fn default_initial_spawn_delay_secs() -> u64 {
    3
}
fn default_call_cooldown_secs() -> u64 {
    10
}
fn default_coin_drop_chance() -> f64 {
    0.03
}
fn default_coin_amount() -> i64 {
    100
}
fn default_farewell_delay_secs() -> u64 {
    3
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            spawn_interval_secs: default_spawn_interval_secs(),
            initial_spawn_delay_secs: default_initial_spawn_delay_secs(),
            call_cooldown_secs: default_call_cooldown_secs(),
            coin_drop_chance: default_coin_drop_chance(),
            coin_amount: default_coin_amount(),
            farewell_delay_secs: default_farewell_delay_secs(),
        }
    }
}

/// Remote NPC-response collaborator settings. The base URL is opaque to the
/// core; routes are the client's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the NPC-response service.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u32,
    /// Disable to run fully offline on scripted fallbacks.
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            timeout_seconds: 5,
            enabled: false, // Disabled by default until a backend is configured
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("arcadesim.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.game.tick_ms == 0 {
            return Err(anyhow!("game.tick_ms must be greater than zero"));
        }
        if self.game.spawn_interval_secs == 0 {
            return Err(anyhow!("game.spawn_interval_secs must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.game.coin_drop_chance) {
            return Err(anyhow!(
                "game.coin_drop_chance must be within 0.0..=1.0 (got {})",
                self.game.coin_drop_chance
            ));
        }
        if self.game.coin_amount <= 0 {
            return Err(anyhow!("game.coin_amount must be positive"));
        }
        if self.api.enabled && self.api.base_url.is_empty() {
            return Err(anyhow!("api.base_url must be set when api.enabled = true"));
        }
        Ok(())
    }
}
