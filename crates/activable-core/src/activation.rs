//! A single occurrence of an activable being active.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::time::{LocalTime, Timestamp, duration_secs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
  /// Offset the schedule was evaluated with when this activation started.
  /// Zero when the activable has no schedule or its schedule is in UTC mode.
  #[serde(with = "duration_secs")]
  pub utc_offset:       Duration,
  pub started_at:       Timestamp,
  /// `None` while the activation runs until explicitly ended.
  pub end_at:           Option<Timestamp>,
  /// Ended by consumption or an explicit end rather than by expiry.
  #[serde(default)]
  pub ended_explicitly: bool,
  pub cooldown_end_at:  Option<Timestamp>,
  #[serde(default)]
  pub num_consumed:     u32,
  #[serde(default)]
  pub is_finalized:     bool,
}

impl Activation {
  pub fn new(
    started_at: Timestamp,
    utc_offset: Duration,
    end_at: Option<Timestamp>,
    cooldown_end_at: Option<Timestamp>,
  ) -> Self {
    Self {
      utc_offset,
      started_at,
      end_at,
      ended_explicitly: false,
      cooldown_end_at,
      num_consumed: 0,
      is_finalized: false,
    }
  }

  /// The start, in the local time the schedule saw.
  pub fn local_start(&self) -> LocalTime {
    LocalTime::new(self.started_at, self.utc_offset)
  }

  pub fn is_ongoing(&self, now: Timestamp) -> bool {
    self.end_at.is_none_or(|end| now < end)
  }

  pub fn is_in_cooldown(&self, now: Timestamp) -> bool {
    !self.is_ongoing(now) && self.cooldown_end_at.is_some_and(|end| now < end)
  }
}
