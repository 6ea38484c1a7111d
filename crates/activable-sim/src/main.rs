//! activable-sim: replay a scenario through the activable lifecycle engine.
//!
//! Reads a TOML scenario (kinds, activable config, owner profile and a
//! timeline of steps), applies each step at its instant and prints the
//! visible status of every configured item afterwards.
//!
//! ```
//! cargo run -p activable-sim -- --scenario crates/activable-sim/scenarios/daily_event.toml
//! ```
//!
//! Owner state can be carried between runs with `--load` / `--save`; a loaded
//! snapshot is reconciled against the scenario's config before replaying.

mod behavior;
mod owner;
mod replay;
mod scenario;

use std::path::{Path, PathBuf};

use activable_core::OwnerActivables;
use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{owner::SimOwner, replay::Simulation, scenario::Scenario};

#[derive(Parser)]
#[command(author, version, about = "Activable scenario replay")]
struct Cli {
  /// Path to the TOML scenario file.
  #[arg(short, long, default_value = "scenario.toml")]
  scenario: PathBuf,

  /// Load the owner's activable state from this JSON file first.
  #[arg(long)]
  load: Option<PathBuf>,

  /// Write the owner's activable state to this JSON file at the end.
  #[arg(long)]
  save: Option<PathBuf>,

  /// Print the engine's event log as JSON lines after each step.
  #[arg(long)]
  events: bool,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let scenario = Scenario::load(&cli.scenario)?;
  let registry = scenario.registry()?;
  let config = scenario.config(&registry)?;

  let Some(first) = scenario.steps.first() else {
    anyhow::bail!("scenario {} has no steps", cli.scenario.display());
  };

  let activables = match &cli.load {
    Some(path) => load_state(path)?,
    None => OwnerActivables::new(),
  };

  let owner = SimOwner::new(&registry, &scenario.owner, first.at);
  let mut sim = Simulation::new(&config, owner, activables);

  let (reports, adjusted) = sim.reconcile();
  for (kind, report) in &reports {
    tracing::info!(
      %kind,
      quarantined = report.quarantined.len(),
      restored = report.restored.len(),
      "reconciled loaded state"
    );
  }
  if !adjusted.is_empty() {
    tracing::info!(count = adjusted.len(), "adjusted loaded activations");
  }
  sim.owner().take_log();

  for step in &scenario.steps {
    let applied = sim.apply(step)?;
    println!(
      "{} {:?} {} -> {}",
      step.at,
      step.action,
      step.key(),
      if applied { "ok" } else { "refused" }
    );

    for entry in sim.owner().take_log() {
      if cli.events {
        let line =
          serde_json::to_string(&entry).context("failed to encode event")?;
        println!("  event {line}");
      }
    }

    for (key, status) in sim.statuses() {
      match status {
        Some(status) => println!("  {key}: {status}"),
        None => println!("  {key}: hidden"),
      }
    }
  }

  if let Some(path) = &cli.save {
    save_state(path, sim.activables())?;
    tracing::info!(path = %path.display(), "saved owner state");
  }

  Ok(())
}

fn load_state(path: &Path) -> anyhow::Result<OwnerActivables> {
  let json = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  OwnerActivables::from_json(&json)
    .with_context(|| format!("failed to parse owner state in {}", path.display()))
}

fn save_state(path: &Path, activables: &OwnerActivables) -> anyhow::Result<()> {
  let json = activables.to_json().context("failed to encode owner state")?;
  std::fs::write(path, json)
    .with_context(|| format!("failed to write {}", path.display()))
}
