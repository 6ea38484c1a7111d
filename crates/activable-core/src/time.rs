//! Time primitives shared by schedules, policies and states.
//!
//! All instants are UTC. A [`LocalTime`] pairs an instant with the owner's
//! UTC offset so that local-mode schedules can be evaluated without the
//! engine ever reading a wall clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An absolute point in time.
pub type Timestamp = DateTime<Utc>;

// ─── Local time ──────────────────────────────────────────────────────────────

/// An absolute instant together with the UTC offset in effect for the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
  pub time:       Timestamp,
  pub utc_offset: Duration,
}

impl LocalTime {
  pub fn new(time: Timestamp, utc_offset: Duration) -> Self {
    Self { time, utc_offset }
  }

  /// A local time with a zero offset.
  pub fn utc(time: Timestamp) -> Self {
    Self { time, utc_offset: Duration::zero() }
  }
}

// ─── Ranges ──────────────────────────────────────────────────────────────────

/// A half-open range `[start, end)` of absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
  pub start: Timestamp,
  pub end:   Timestamp,
}

impl TimeRange {
  pub fn new(start: Timestamp, end: Timestamp) -> Self { Self { start, end } }

  pub fn contains(&self, time: Timestamp) -> bool {
    self.start <= time && time < self.end
  }
}

// ─── Config durations ────────────────────────────────────────────────────────

/// The longest duration a config value may hold. Timestamps derived from
/// config durations stay well inside chrono's range.
pub fn max_config_duration() -> Duration { Duration::days(36_500) }

/// Reject a configured duration that is negative or longer than
/// [`max_config_duration`].
pub(crate) fn check_duration(field: &'static str, value: Duration) -> Result<()> {
  if value < Duration::zero() {
    return Err(Error::NegativeDuration { field });
  }
  if value > max_config_duration() {
    return Err(Error::DurationOutOfRange { field });
  }
  Ok(())
}

// ─── Serde helpers ───────────────────────────────────────────────────────────

/// Serialises a [`Duration`] as a whole number of seconds.
pub mod duration_secs {
  use chrono::Duration;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(
    duration: &Duration,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(duration.num_seconds())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Duration, D::Error> {
    let secs = i64::deserialize(deserializer)?;
    Duration::try_seconds(secs)
      .ok_or_else(|| serde::de::Error::custom("duration out of range"))
  }
}

/// Like [`duration_secs`], for `Option<Duration>`.
pub mod option_duration_secs {
  use chrono::Duration;
  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match duration {
      Some(d) => serializer.serialize_some(&d.num_seconds()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<Duration>, D::Error> {
    Option::<i64>::deserialize(deserializer)?
      .map(|secs| {
        Duration::try_seconds(secs)
          .ok_or_else(|| serde::de::Error::custom("duration out of range"))
      })
      .transpose()
  }
}
