//! How long after an activation ends before another may start.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  schedule::Schedule,
  time::{LocalTime, Timestamp, check_duration, duration_secs},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CooldownSpec {
  /// Cooldown lasts a fixed duration after the activation ends.
  Fixed {
    #[serde(with = "duration_secs")]
    duration: Duration,
  },
  /// Cooldown lasts until the schedule occasion the activation started in
  /// has ended.
  ScheduleBased,
}

impl Default for CooldownSpec {
  fn default() -> Self { Self::Fixed { duration: Duration::zero() } }
}

impl CooldownSpec {
  pub fn fixed(duration: Duration) -> Result<Self> {
    let spec = Self::Fixed { duration };
    spec.validate()?;
    Ok(spec)
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Fixed { duration } => check_duration("cooldown.duration", *duration),
      Self::ScheduleBased => Ok(()),
    }
  }

  /// When the cooldown of an activation started at `start` and ending at
  /// `end` is over. Never earlier than `end`.
  pub fn cooldown_ends_at(
    &self,
    start: LocalTime,
    end: Timestamp,
    schedule: Option<&Schedule>,
  ) -> Timestamp {
    match self {
      Self::Fixed { duration } => end + *duration,
      Self::ScheduleBased => schedule
        .and_then(|s| s.current_or_next_enabled_occasion(start))
        .map_or(end, |occasion| occasion.enabled_range.end.max(end)),
    }
  }
}
