//! Scenario files: the kinds and items to configure, the owner to simulate,
//! and a timeline of actions to replay.

use std::{path::Path, sync::Arc};

use activable_core::{
  ActivableConfig, ActivableId, ActivableInfo, ActivableKey, DebugPhase, KindId,
  params::{ConditionId, SegmentId},
  registry::{ActivableRegistry, KindRegistration},
  time::{Timestamp, duration_secs},
};
use anyhow::Context as _;
use chrono::Duration;
use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;

use crate::behavior::FinalizeBeforeRestart;

#[derive(Debug, Deserialize)]
pub struct Scenario {
  #[serde(default)]
  pub owner:      OwnerProfile,
  pub kinds:      Vec<KindSpec>,
  #[serde(default)]
  pub activables: Vec<ActivableInfo>,
  #[serde(default)]
  pub steps:      Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct KindSpec {
  pub id:                      KindId,
  #[serde(default)]
  pub display_name:            String,
  /// Refuse a new activation until the previous one is finalized.
  #[serde(default)]
  pub finalize_before_restart: bool,
}

#[derive(Debug, Deserialize)]
pub struct OwnerProfile {
  #[serde(default = "zero", with = "duration_secs")]
  pub utc_offset: Duration,
  #[serde(default)]
  pub segments:   Vec<SegmentId>,
  #[serde(default)]
  pub conditions: Vec<ConditionId>,
}

impl Default for OwnerProfile {
  fn default() -> Self {
    Self {
      utc_offset: Duration::zero(),
      segments:   Vec::new(),
      conditions: Vec::new(),
    }
  }
}

fn zero() -> Duration { Duration::zero() }

/// One action on one item at one instant.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
  pub at:            Timestamp,
  pub action:        Action,
  pub kind:          KindId,
  pub id:            ActivableId,
  /// For `end`.
  #[serde(default)]
  pub skip_cooldown: bool,
  /// For `debug_phase`. Absent hands the item back to its schedule.
  #[serde(default)]
  pub phase:         Option<DebugPhase>,
}

impl Step {
  pub fn key(&self) -> ActivableKey {
    ActivableKey { kind: self.kind.clone(), id: self.id.clone() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Start,
  ForceStart,
  Consume,
  ForceConsume,
  End,
  Adjust,
  Finalize,
  Extend,
  SoftFinalize,
  DebugPhase,
}

impl Scenario {
  /// Read a scenario from a TOML file, with `ACTIVABLE_`-prefixed environment
  /// variables layered on top.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let builder = config::Config::builder()
      .add_source(config::File::from(path))
      .add_source(config::Environment::with_prefix("ACTIVABLE"));
    Self::from_builder(builder)
      .with_context(|| format!("failed to load scenario {}", path.display()))
  }

  pub fn from_builder(
    builder: ConfigBuilder<DefaultState>,
  ) -> anyhow::Result<Self> {
    let scenario: Self = builder
      .build()
      .context("failed to read scenario")?
      .try_deserialize()
      .context("failed to deserialise scenario")?;

    if let Some(pair) = scenario.steps.windows(2).find(|w| w[1].at < w[0].at) {
      anyhow::bail!(
        "step at {} comes after a step at {}; steps must be in time order",
        pair[1].at,
        pair[0].at
      );
    }
    Ok(scenario)
  }

  pub fn registry(&self) -> anyhow::Result<ActivableRegistry> {
    let mut registry = ActivableRegistry::new();
    for spec in &self.kinds {
      let display_name = if spec.display_name.is_empty() {
        spec.id.0.clone()
      } else {
        spec.display_name.clone()
      };
      let mut registration = KindRegistration::new(spec.id.clone(), display_name);
      if spec.finalize_before_restart {
        registration = registration.with_behavior(Arc::new(FinalizeBeforeRestart));
      }
      registry
        .register(registration)
        .with_context(|| format!("failed to register kind {}", spec.id))?;
    }
    Ok(registry)
  }

  pub fn config(
    &self,
    registry: &ActivableRegistry,
  ) -> anyhow::Result<ActivableConfig> {
    ActivableConfig::from_infos(registry, self.activables.iter().cloned())
      .context("invalid activable config")
  }
}
