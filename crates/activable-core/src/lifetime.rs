//! How long an activation lasts once started.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  schedule::{Schedule, ScheduleOccasion},
  time::{LocalTime, Timestamp, check_duration, duration_secs},
};

/// Lifetime policy of an activation.
///
/// Every derived timestamp is `None` when the activation never expires by
/// time alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifetimeSpec {
  /// Lasts a fixed duration from the moment it starts.
  Fixed {
    #[serde(with = "duration_secs")]
    duration: Duration,
  },
  /// Lasts until the end of the schedule occasion it started in.
  ScheduleBased,
  /// Lasts until ended explicitly or by consumption.
  Forever,
}

impl LifetimeSpec {
  pub fn fixed(duration: Duration) -> Result<Self> {
    let spec = Self::Fixed { duration };
    spec.validate()?;
    Ok(spec)
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Fixed { duration } => check_duration("lifetime.duration", *duration),
      Self::ScheduleBased | Self::Forever => Ok(()),
    }
  }

  pub fn is_schedule_based(&self) -> bool {
    matches!(self, Self::ScheduleBased)
  }

  pub fn expires_at(
    &self,
    start: LocalTime,
    schedule: Option<&Schedule>,
  ) -> Option<Timestamp> {
    match self {
      Self::Fixed { duration } => Some(start.time + *duration),
      Self::ScheduleBased => {
        occasion(start, schedule).map(|o| o.enabled_range.end)
      }
      Self::Forever => None,
    }
  }

  pub fn visibility_ends_at(
    &self,
    start: LocalTime,
    schedule: Option<&Schedule>,
  ) -> Option<Timestamp> {
    match self {
      Self::Fixed { duration } => Some(start.time + *duration),
      Self::ScheduleBased => {
        occasion(start, schedule).map(|o| o.visible_range.end)
      }
      Self::Forever => None,
    }
  }

  pub fn ending_soon_starts_at(
    &self,
    start: LocalTime,
    schedule: Option<&Schedule>,
  ) -> Option<Timestamp> {
    match self {
      Self::Fixed { duration } => Some(start.time + *duration),
      Self::ScheduleBased => {
        occasion(start, schedule).map(|o| o.ending_soon_starts_at)
      }
      Self::Forever => None,
    }
  }
}

fn occasion(
  start: LocalTime,
  schedule: Option<&Schedule>,
) -> Option<ScheduleOccasion> {
  schedule?.current_or_next_enabled_occasion(start)
}
