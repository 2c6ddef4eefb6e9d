//! robosim CLI - headless scenario runner
//!
//! Validates scenarios, runs them with constant wheel commands and writes
//! state dumps as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use robosim_physics::{StateDump, World};
use robosim_scenario::{Scenario, WorldSettings};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "robosim")]
#[command(about = "Headless 2D robot simulator", long_about = None)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a scenario
    Check {
        /// Scenario file (.json or .toml)
        scenario: PathBuf,
    },
    /// Run a scenario with constant wheel commands
    Run {
        /// Scenario file (.json or .toml)
        scenario: PathBuf,
        /// Number of ticks
        #[arg(long, default_value_t = 600)]
        steps: u64,
        /// Tick length in seconds (default: the scenario timestep)
        #[arg(long)]
        dt: Option<f64>,
        /// Wheel command as NAME=FORCE, repeatable
        #[arg(short, long = "command", value_parser = parse_command)]
        commands: Vec<(String, f64)>,
        /// TOML file overriding world settings
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Record a state dump every K ticks
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        every: u64,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the example two-wheel scenario as JSON
    DumpDefault {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check { scenario } => {
            check(&scenario)?;
        }
        Commands::Run {
            scenario,
            steps,
            dt,
            commands,
            settings,
            every,
            output,
        } => {
            let mut scenario = load_scenario(&scenario)?;
            if let Some(path) = settings {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                scenario.world.settings = apply_overrides(&scenario.world.settings, &text)
                    .with_context(|| format!("applying {}", path.display()))?;
            }
            let dumps = run(&scenario, steps, dt, &commands, every)?;
            write_output(output.as_deref(), &serde_json::to_string_pretty(&dumps)?)?;
        }
        Commands::DumpDefault { output } => {
            let json = Scenario::differential_drive_example().to_json()?;
            write_output(output.as_deref(), &json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_command(s: &str) -> Result<(String, f64), String> {
    let (name, force) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=FORCE, got '{s}'"))?;
    let force: f64 = force
        .trim()
        .parse()
        .map_err(|e| format!("bad force in '{s}': {e}"))?;
    if name.trim().is_empty() {
        return Err(format!("missing actuator name in '{s}'"));
    }
    Ok((name.trim().to_string(), force))
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let scenario = match ext.to_lowercase().as_str() {
        "toml" => toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?,
        _ => Scenario::from_json(&text).with_context(|| format!("parsing {}", path.display()))?,
    };
    Ok(scenario)
}

/// Overlay the keys of a TOML table on top of `base`.
fn apply_overrides(base: &WorldSettings, text: &str) -> Result<WorldSettings> {
    let overrides: toml::Table = toml::from_str(text)?;
    let mut merged = toml::Table::try_from(base)?;
    for (key, value) in overrides {
        if !merged.contains_key(&key) {
            bail!("unknown setting '{key}'");
        }
        merged.insert(key, value);
    }
    let settings: WorldSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

fn check(path: &Path) -> Result<()> {
    let scenario = load_scenario(path)?;
    let world = World::from_scenario(&scenario)
        .with_context(|| format!("validating {}", path.display()))?;
    println!("{}: ok", path.display());
    println!("  bodies:    {}", world.bodies().count());
    println!("  joints:    {}", world.joints().len());
    println!("  actuators: {}", world.actuators().len());
    println!("  sensors:   {}", world.sensors().len());
    Ok(())
}

fn run(
    scenario: &Scenario,
    steps: u64,
    dt: Option<f64>,
    commands: &[(String, f64)],
    every: u64,
) -> Result<Vec<StateDump>> {
    let mut world = World::from_scenario(scenario)?;
    for (name, force) in commands {
        let Some(id) = world.actuator_id(name) else {
            bail!("no actuator named '{name}'");
        };
        world.set_actuator(id, *force)?;
    }

    let dt = dt.unwrap_or(world.settings().timestep);
    let mut dumps = Vec::new();
    for tick in 1..=steps {
        world.step(dt);
        if tick % every == 0 {
            dumps.push(world.state_dump());
        }
    }
    info!(steps, time = world.time(), dumps = dumps.len(), "run finished");
    Ok(dumps)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
