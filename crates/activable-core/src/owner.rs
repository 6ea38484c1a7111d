//! The seams between the engine and the entity that owns activable state.
//!
//! An owner (typically one player) supplies the current time, its UTC
//! offset, and the answers to segment and condition queries. It can also
//! expose kind-specific [`ActivableBehavior`], an [`ActivableListener`] for
//! notifications, and a sink for [`SimulationLogEntry`] diagnostics.

use chrono::Duration;
use serde::Serialize;

use crate::{
  info::{ActivableInfo, ActivableKey, KindId},
  params::{ConditionId, SegmentId},
  state::ActivableState,
  status::DebugPhase,
  time::{LocalTime, Timestamp},
};

pub trait ActivableOwner {
  fn current_time(&self) -> Timestamp;

  fn utc_offset(&self) -> Duration { Duration::zero() }

  fn local_time(&self) -> LocalTime {
    LocalTime::new(self.current_time(), self.utc_offset())
  }

  /// The owner's local time at some other instant, using its current offset.
  fn local_time_at(&self, time: Timestamp) -> LocalTime {
    LocalTime::new(time, self.utc_offset())
  }

  fn segment_matches(&self, segment: &SegmentId) -> bool;

  fn condition_holds(&self, condition: &ConditionId) -> bool;

  /// Kind-specific behaviour, or `None` if the kind has none.
  fn behavior(&self, _kind: &KindId) -> Option<&dyn ActivableBehavior> {
    None
  }

  /// Notification target for a kind, or `None` if it cannot be resolved.
  fn listener(&self, _kind: &KindId) -> Option<&dyn ActivableListener> {
    None
  }

  fn log(&self, _entry: SimulationLogEntry) {}
}

/// Kind-specific hooks into the state machine.
pub trait ActivableBehavior {
  /// Extra gate on starting an activation, checked after the built-in ones.
  fn can_start_activation(
    &self,
    _info: &ActivableInfo,
    _state: &ActivableState,
    _at: Timestamp,
  ) -> bool {
    true
  }

  fn on_finalize(&self, _info: &ActivableInfo, _state: &ActivableState) {}

  fn on_soft_finalize(&self, _info: &ActivableInfo, _state: &ActivableState) {}
}

/// Fire-and-forget notifications. Must not fail.
pub trait ActivableListener {
  fn activation_started(&self, _key: &ActivableKey) {}

  fn consumed(&self, _key: &ActivableKey) {}

  fn finalized(&self, _key: &ActivableKey) {}
}

/// A diagnostic event for the owner's simulation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationLogEntry {
  ActivationStarted {
    key:    ActivableKey,
    at:     Timestamp,
    end_at: Option<Timestamp>,
  },
  Consumed {
    key:          ActivableKey,
    at:           Timestamp,
    num_consumed: Option<u32>,
  },
  ActivationEnded {
    key:           ActivableKey,
    at:            Timestamp,
    skip_cooldown: bool,
  },
  ActivationAdjusted {
    key:             ActivableKey,
    end_at:          Option<Timestamp>,
    cooldown_end_at: Option<Timestamp>,
  },
  Finalized {
    key: ActivableKey,
  },
  Extended {
    key:    ActivableKey,
    end_at: Timestamp,
  },
  SoftFinalized {
    key: ActivableKey,
  },
  DebugPhaseSet {
    key:   ActivableKey,
    phase: Option<DebugPhase>,
  },
}
