//! Recurring schedules and the occasions they produce.
//!
//! A schedule is evaluated at a [`LocalTime`] and yields the current or next
//! [`ScheduleOccasion`]: one concrete enabled window, surrounded by optional
//! preview and review windows. In [`ScheduleTimeMode::Local`] the schedule's
//! wall-clock times are read in the owner's local time; in
//! [`ScheduleTimeMode::Utc`] the owner's offset is ignored.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  time::{
    LocalTime, TimeRange, Timestamp, check_duration, duration_secs,
    option_duration_secs,
  },
};

/// How a schedule's wall-clock times map to absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleTimeMode {
  /// Times are in the owner's local time; occasions differ per UTC offset.
  #[default]
  Local,
  /// Times are absolute; every owner sees the same occasions.
  Utc,
}

// ─── Schedule ────────────────────────────────────────────────────────────────

/// A schedule with an enabled window of fixed length, optionally repeating
/// at a fixed period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
  #[serde(default)]
  pub time_mode:   ScheduleTimeMode,
  /// Wall-clock start of the first occasion.
  pub start:       NaiveDateTime,
  /// Length of each enabled window.
  #[serde(with = "duration_secs")]
  pub duration:    Duration,
  /// How long before the enabled window ends the "ending soon" phase begins.
  #[serde(default = "zero", with = "duration_secs")]
  pub ending_soon: Duration,
  #[serde(default = "zero", with = "duration_secs")]
  pub preview:     Duration,
  #[serde(default = "zero", with = "duration_secs")]
  pub review:      Duration,
  /// Period between consecutive occasion starts. `None` means one occasion.
  #[serde(default, with = "option_duration_secs")]
  pub recurrence:  Option<Duration>,
  /// Total number of occasions when recurring. `None` repeats forever.
  #[serde(default)]
  pub num_repeats: Option<u32>,
}

fn zero() -> Duration { Duration::zero() }

impl Schedule {
  /// A single, non-repeating occasion with no preview or review.
  pub fn once(
    time_mode: ScheduleTimeMode,
    start: NaiveDateTime,
    duration: Duration,
  ) -> Result<Self> {
    let schedule = Self {
      time_mode,
      start,
      duration,
      ending_soon: Duration::zero(),
      preview: Duration::zero(),
      review: Duration::zero(),
      recurrence: None,
      num_repeats: None,
    };
    schedule.validate()?;
    Ok(schedule)
  }

  pub fn with_windows(
    mut self,
    preview: Duration,
    review: Duration,
    ending_soon: Duration,
  ) -> Result<Self> {
    self.preview = preview;
    self.review = review;
    self.ending_soon = ending_soon;
    self.validate()?;
    Ok(self)
  }

  pub fn repeating(
    mut self,
    period: Duration,
    num_repeats: Option<u32>,
  ) -> Result<Self> {
    self.recurrence = Some(period);
    self.num_repeats = num_repeats;
    self.validate()?;
    Ok(self)
  }

  /// Reject schedules that cannot produce well-formed occasions.
  pub fn validate(&self) -> Result<()> {
    for (field, value) in [
      ("schedule.duration", self.duration),
      ("schedule.ending_soon", self.ending_soon),
      ("schedule.preview", self.preview),
      ("schedule.review", self.review),
    ] {
      check_duration(field, value)?;
    }
    if !(1..=9999).contains(&self.start.year()) {
      return Err(Error::InvalidSchedule(format!(
        "start year {} is outside 1..=9999",
        self.start.year()
      )));
    }
    if self.duration.is_zero() {
      return Err(Error::InvalidSchedule("duration must be positive".into()));
    }
    if let Some(period) = self.recurrence {
      check_duration("schedule.recurrence", period)?;
    }
    if let Some(period) = self.recurrence
      && period < self.duration
    {
      return Err(Error::InvalidSchedule(format!(
        "recurrence period {}s is shorter than duration {}s",
        period.num_seconds(),
        self.duration.num_seconds()
      )));
    }
    if self.num_repeats == Some(0) {
      return Err(Error::InvalidSchedule("num_repeats must be at least 1".into()));
    }
    Ok(())
  }

  /// The offset this schedule applies for an owner with `utc_offset`.
  pub fn effective_offset(&self, utc_offset: Duration) -> Duration {
    match self.time_mode {
      ScheduleTimeMode::Local => utc_offset,
      ScheduleTimeMode::Utc => Duration::zero(),
    }
  }

  /// The occasion whose enabled window contains `local`, or else the next
  /// one to start. `None` once the schedule has run out of occasions.
  pub fn current_or_next_enabled_occasion(
    &self,
    local: LocalTime,
  ) -> Option<ScheduleOccasion> {
    let offset = self.effective_offset(local.utc_offset);
    let now = (local.time + offset).naive_utc();

    let mut index = match self.recurrence {
      Some(period) if now >= self.start => {
        let elapsed = (now - self.start).num_milliseconds();
        elapsed / period.num_milliseconds().max(1)
      }
      _ => 0,
    };
    if now >= self.occasion_start(index) + self.duration {
      index += 1;
    }

    let limit = match self.recurrence {
      Some(_) => self.num_repeats.map(i64::from),
      None => Some(1),
    };
    if limit.is_some_and(|n| index >= n) {
      return None;
    }

    Some(self.occasion_at(index, offset))
  }

  /// Whether an enabled window contains `local`.
  pub fn is_enabled_at(&self, local: LocalTime) -> bool {
    self
      .current_or_next_enabled_occasion(local)
      .is_some_and(|occasion| occasion.enabled_range.contains(local.time))
  }

  fn occasion_start(&self, index: i64) -> NaiveDateTime {
    match self.recurrence {
      Some(period) => {
        self.start + Duration::milliseconds(period.num_milliseconds() * index)
      }
      None => self.start,
    }
  }

  fn occasion_at(&self, index: i64, offset: Duration) -> ScheduleOccasion {
    let start = self.occasion_start(index).and_utc() - offset;
    let end = start + self.duration;
    ScheduleOccasion {
      enabled_range:         TimeRange::new(start, end),
      visible_range:         TimeRange::new(
        start - self.preview,
        end + self.review,
      ),
      ending_soon_starts_at: (end - self.ending_soon).max(start),
    }
  }
}

// ─── Occasion ────────────────────────────────────────────────────────────────

/// One concrete enabled window of a schedule, in absolute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOccasion {
  pub enabled_range:         TimeRange,
  /// Enabled window widened by the preview and review windows.
  pub visible_range:         TimeRange,
  pub ending_soon_starts_at: Timestamp,
}

impl ScheduleOccasion {
  pub fn is_previewed_at(&self, time: Timestamp) -> bool {
    self.visible_range.start <= time && time < self.enabled_range.start
  }

  pub fn is_reviewed_at(&self, time: Timestamp) -> bool {
    self.enabled_range.end <= time && time < self.visible_range.end
  }
}
