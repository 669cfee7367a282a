//! `collenv-cli` – Collision Environment Command Line Interface
//!
//! Drives a [`CollisionEnvironment`] from a scene file instead of a live
//! tracker.  Every cycle it:
//!
//! 1. re-reads the scene into an in-memory transform buffer;
//! 2. snapshots the removal batch for the previous collision set;
//! 3. rebuilds the collision set;
//! 4. prints `{"cycle", "remove", "add"}` as one JSON line on stdout.
//!
//! Diagnostics go to stderr through `tracing`.  **Ctrl-C** stops the loop
//! after the current cycle.
//!
//! ```text
//! collenv [--config collenv.toml] [--scene scene.toml] [--once]
//! collenv init-config <path>
//! ```

mod scene;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use collenv_perception::TfBuffer;
use collenv_runtime::{CollisionEnvConfig, CollisionEnvironment, config};
use collenv_types::CollisionObject;

const DEFAULT_CONFIG_PATH: &str = "collenv.toml";
const DEFAULT_SCENE_PATH: &str = "scene.toml";

/// Longest uninterrupted sleep between shutdown checks.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Command line
// ─────────────────────────────────────────────────────────────────────────────

/// Collision environment from tracked frames.
#[derive(Debug, Parser)]
#[command(name = "collenv")]
#[command(version, about = "Publishes collision objects for the frames in a scene file")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Scene file, re-read every cycle
    #[arg(short = 's', long = "scene", default_value = DEFAULT_SCENE_PATH)]
    scene: PathBuf,

    /// Run a single cycle and exit
    #[arg(long = "once")]
    once: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Write the default configuration to PATH
    InitConfig {
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::InitConfig { path }) => match config::save_to(&CollisionEnvConfig::default(), &path) {
            Ok(()) => {
                eprintln!(
                    "  {} Config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        },
        None => {
            // ── Structured logging ────────────────────────────────────────
            let _guard = collenv_runtime::init_tracing("collenv");
            match run(&cli.config, &cli.scene, cli.once) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "collenv stopped");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Update loop
// ─────────────────────────────────────────────────────────────────────────────

fn run(config_path: &Path, scene_path: &Path, once: bool) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| e.to_string())?;
    print_banner(config_path, scene_path);

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping after this cycle …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    // The scene must be in the buffer before the environment primes itself.
    let tf = Arc::new(TfBuffer::with_cache_duration(
        cfg.frame_cache().map_err(|e| e.to_string())?,
    ));
    let mut applied = scene::load(scene_path)?;
    applied.apply(&tf);

    let poll_interval = cfg.poll_interval();
    let mut env =
        CollisionEnvironment::with_source(cfg, Arc::clone(&tf)).map_err(|e| e.to_string())?;

    let mut cycle: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();
        cycle += 1;

        match scene::load(scene_path) {
            Ok(next) => {
                let retracted = next.retract_missing(&applied, &tf);
                if retracted > 0 {
                    info!(retracted, "frames removed from scene");
                }
                next.apply(&tf);
                applied = next;
            }
            Err(e) => warn!(error = %e, "keeping previous scene"),
        }

        let remove = env.generate_removal_set();
        match env.tick(true) {
            Ok(outcome) => info!(
                cycle,
                published = outcome.published,
                surface = outcome.surface_available,
                objects = outcome.has_objects,
                "cycle complete"
            ),
            Err(e) => warn!(cycle, error = %e, "cycle failed"),
        }
        println!("{}", cycle_line(cycle, &remove, env.current_set())?);

        if once {
            break;
        }
        sleep_until(started + poll_interval, &shutdown);
    }

    info!(cycles = cycle, "collenv exiting");
    Ok(())
}

/// One stdout line: the removal batch for the previous set, then the new set.
fn cycle_line(cycle: u64, remove: &[CollisionObject], add: &[CollisionObject]) -> Result<String, String> {
    serde_json::to_string(&serde_json::json!({
        "cycle": cycle,
        "remove": remove,
        "add": add,
    }))
    .map_err(|e| format!("Failed to encode cycle output: {}", e))
}

fn sleep_until(deadline: Instant, shutdown: &AtomicBool) {
    loop {
        let now = Instant::now();
        if now >= deadline || shutdown.load(Ordering::SeqCst) {
            return;
        }
        std::thread::sleep((deadline - now).min(SHUTDOWN_CHECK));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(config_path: &Path, scene_path: &Path) {
    eprintln!();
    eprintln!("  {} {}",
        "collenv".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Collision environment from tracked frames");
    eprintln!("  config: {}", config_path.display().to_string().bold());
    eprintln!("  scene:  {}", scene_path.display().to_string().bold());
    eprintln!();
}
