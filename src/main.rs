//! Binary entrypoint for the arcadesim CLI.
//!
//! Commands:
//! - `start [--seed <n>] [--headless]` - run the simulation, reading player
//!   input line by line from stdin
//! - `init` - create a starter `config.toml`
//! - `status` - print the active configuration and counters
//!
//! See the library crate docs for module-level details: `arcadesim::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use arcadesim::config::Config;
use arcadesim::engine::Engine;

#[derive(Parser)]
#[command(name = "arcadesim")]
#[command(about = "A tile-grid arcade-center simulation with remote NPC chatter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the simulation
    Start {
        /// Fixed RNG seed for a deterministic run
        #[arg(long)]
        seed: Option<u64>,

        /// Suppress frame output (logs and chat only)
        #[arg(long)]
        headless: bool,
    },
    /// Initialize a new configuration file
    Init,
    /// Show the active configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { seed, headless } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting arcadesim v{}", env!("CARGO_PKG_VERSION"));
            if !config.api.enabled {
                info!("api disabled; running offline on scripted fallbacks");
            }

            let (engine, input_tx) = Engine::new(config, seed, headless);

            // Feed stdin lines into the engine; closing stdin ends the run.
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
            });

            let final_state = engine.run().await?;
            let snapshot = arcadesim::metrics::snapshot();
            println!(
                "閉店: 所持金 {}G / 客 {}人 / tick {}回 / spawn {}回",
                final_state.player.wallet,
                final_state.customers().len(),
                snapshot.ticks_run,
                snapshot.customers_spawned,
            );
        }
        Commands::Init => {
            info!("Initializing new arcadesim configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            println!("arcadesim v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "tick: {}ms  spawn: {}s  cooldown: {}s  coin: {}G @ {:.0}%",
                config.game.tick_ms,
                config.game.spawn_interval_secs,
                config.game.call_cooldown_secs,
                config.game.coin_amount,
                config.game.coin_drop_chance * 100.0,
            );
            println!(
                "api: {} ({})",
                if config.api.enabled { "enabled" } else { "disabled" },
                config.api.base_url
            );
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => match config.as_ref().map(|c| c.logging.level.as_str()) {
            Some("debug") => log::LevelFilter::Debug,
            Some("trace") => log::LevelFilter::Trace,
            Some("warn") => log::LevelFilter::Warn,
            _ => log::LevelFilter::Info,
        },
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            let write_mutex = mutex.clone();
            // Frames go to stdout; mirror logs there only on a real terminal
            // so piped runs stay clean.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
