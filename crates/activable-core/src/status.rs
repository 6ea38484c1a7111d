//! What an owner is shown about an activable, and the debug phase override.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{TimeRange, Timestamp};

/// A phase forced onto a state during development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugPhase {
  Preview,
  Active,
  EndingSoon,
  Review,
  Inactive,
}

impl DebugPhase {
  pub fn is_active(self) -> bool { matches!(self, Self::Active | Self::EndingSoon) }
}

/// The overriding phase a state carries while debug control is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugActivationState {
  pub phase: DebugPhase,
}

/// Timestamps of the activation shown as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveStatus {
  pub started_at:            Timestamp,
  pub ends_at:               Option<Timestamp>,
  pub ending_soon_starts_at: Option<Timestamp>,
  pub visibility_ends_at:    Option<Timestamp>,
}

/// The single phase an activable is presented in, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisibleStatus {
  Active(ActiveStatus),
  EndingSoon(ActiveStatus),
  InPreview {
    /// The upcoming enabled window, if a schedule resolves one.
    enabled_range: Option<TimeRange>,
  },
  InReview {
    ended_at:           Timestamp,
    visibility_ends_at: Option<Timestamp>,
  },
  /// Nothing is running but an activation could start right now.
  Tentative,
}

impl fmt::Display for VisibleStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Active(_) => f.write_str("active"),
      Self::EndingSoon(_) => f.write_str("ending soon"),
      Self::InPreview { .. } => f.write_str("in preview"),
      Self::InReview { .. } => f.write_str("in review"),
      Self::Tentative => f.write_str("tentative"),
    }
  }
}
