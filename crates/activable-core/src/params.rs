//! Immutable per-item configuration of an activable.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  cooldown::CooldownSpec,
  lifetime::LifetimeSpec,
  owner::ActivableOwner,
  schedule::Schedule,
  time::{Timestamp, check_duration, duration_secs},
};

/// Reference to a player segment, evaluated by the owner.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentId(pub String);

/// Reference to an additional player condition, evaluated by the owner.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConditionId(pub String);

impl From<&str> for SegmentId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<&str> for ConditionId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

fn yes() -> bool { true }

// ─── ActivableParams ─────────────────────────────────────────────────────────

/// Everything the state machine needs to know about an activable's config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivableParams {
  #[serde(default = "yes")]
  pub is_enabled:                  bool,
  /// The owner must match at least one of these. Empty matches everyone.
  #[serde(default)]
  pub segments:                    Vec<SegmentId>,
  /// The owner must satisfy all of these.
  #[serde(default)]
  pub conditions:                  Vec<ConditionId>,
  pub lifetime:                    LifetimeSpec,
  #[serde(default)]
  pub cooldown:                    CooldownSpec,
  /// A transient activable only counts as active while its conditions hold.
  #[serde(default)]
  pub is_transient:                bool,
  #[serde(default)]
  pub schedule:                    Option<Schedule>,
  #[serde(default)]
  pub max_activations:             Option<u32>,
  #[serde(default)]
  pub max_total_consumes:          Option<u32>,
  #[serde(default)]
  pub max_consumes_per_activation: Option<u32>,
  /// Whether in-flight activations follow config changes.
  #[serde(default = "yes")]
  pub allow_activation_adjustment: bool,
}

impl ActivableParams {
  pub fn new(lifetime: LifetimeSpec, cooldown: CooldownSpec) -> Result<Self> {
    let params = Self {
      is_enabled: true,
      segments: Vec::new(),
      conditions: Vec::new(),
      lifetime,
      cooldown,
      is_transient: false,
      schedule: None,
      max_activations: None,
      max_total_consumes: None,
      max_consumes_per_activation: None,
      allow_activation_adjustment: true,
    };
    params.validate()?;
    Ok(params)
  }

  pub fn with_schedule(mut self, schedule: Schedule) -> Self {
    self.schedule = Some(schedule);
    self
  }

  pub fn with_max_activations(mut self, max: u32) -> Self {
    self.max_activations = Some(max);
    self
  }

  pub fn with_max_total_consumes(mut self, max: u32) -> Self {
    self.max_total_consumes = Some(max);
    self
  }

  pub fn with_max_consumes_per_activation(mut self, max: u32) -> Self {
    self.max_consumes_per_activation = Some(max);
    self
  }

  pub fn with_segments(
    mut self,
    segments: impl IntoIterator<Item = SegmentId>,
  ) -> Self {
    self.segments = segments.into_iter().collect();
    self
  }

  pub fn with_conditions(
    mut self,
    conditions: impl IntoIterator<Item = ConditionId>,
  ) -> Self {
    self.conditions = conditions.into_iter().collect();
    self
  }

  pub fn transient(mut self) -> Self {
    self.is_transient = true;
    self
  }

  pub fn validate(&self) -> Result<()> {
    self.lifetime.validate()?;
    self.cooldown.validate()?;
    if let Some(schedule) = &self.schedule {
      schedule.validate()?;
    }
    Ok(())
  }

  /// Whether the owner may have this activable at `time`: enabled, inside a
  /// scheduled occasion, in a matching segment, and meeting every
  /// additional condition. Checks stop at the first failure.
  pub fn conditions_are_fulfilled_at<O: ActivableOwner + ?Sized>(
    &self,
    owner: &O,
    time: Timestamp,
  ) -> bool {
    if !self.is_enabled {
      return false;
    }
    if let Some(schedule) = &self.schedule
      && !schedule.is_enabled_at(owner.local_time_at(time))
    {
      return false;
    }
    if !self.segments.is_empty()
      && !self.segments.iter().any(|s| owner.segment_matches(s))
    {
      return false;
    }
    self.conditions.iter().all(|c| owner.condition_holds(c))
  }
}

// ─── Extensions ──────────────────────────────────────────────────────────────

/// Lets an activation be extended from its review phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionParams {
  /// How long each extension keeps the activation running.
  #[serde(with = "duration_secs")]
  pub extension_duration:            Duration,
  /// How long the review phase after an extension lasts.
  #[serde(with = "duration_secs")]
  pub extension_review_duration:     Duration,
  pub max_extensions_per_activation: u32,
}

impl ExtensionParams {
  pub fn new(
    extension_duration: Duration,
    extension_review_duration: Duration,
    max_extensions_per_activation: u32,
  ) -> Result<Self> {
    let params = Self {
      extension_duration,
      extension_review_duration,
      max_extensions_per_activation,
    };
    params.validate()?;
    Ok(params)
  }

  pub fn validate(&self) -> Result<()> {
    check_duration("extension_duration", self.extension_duration)?;
    check_duration("extension_review_duration", self.extension_review_duration)
  }
}
