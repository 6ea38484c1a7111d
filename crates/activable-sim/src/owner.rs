//! The simulated owner: a clock the replay advances, a fixed profile, and a
//! log that collects every engine event.

use std::{
  cell::{Cell, RefCell},
  collections::BTreeSet,
};

use activable_core::{
  ActivableBehavior, ActivableKey, ActivableListener, ActivableOwner, KindId,
  owner::SimulationLogEntry,
  params::{ConditionId, SegmentId},
  registry::ActivableRegistry,
  time::Timestamp,
};
use chrono::Duration;

use crate::scenario::OwnerProfile;

/// Reports notifications through `tracing`.
pub struct TracingListener;

impl ActivableListener for TracingListener {
  fn activation_started(&self, key: &ActivableKey) {
    tracing::info!(%key, "activation started");
  }

  fn consumed(&self, key: &ActivableKey) {
    tracing::info!(%key, "consumed");
  }

  fn finalized(&self, key: &ActivableKey) {
    tracing::info!(%key, "finalized");
  }
}

pub struct SimOwner<'a> {
  registry:   &'a ActivableRegistry,
  now:        Cell<Timestamp>,
  utc_offset: Duration,
  segments:   BTreeSet<SegmentId>,
  conditions: BTreeSet<ConditionId>,
  listener:   TracingListener,
  log:        RefCell<Vec<SimulationLogEntry>>,
}

impl<'a> SimOwner<'a> {
  pub fn new(
    registry: &'a ActivableRegistry,
    profile: &OwnerProfile,
    now: Timestamp,
  ) -> Self {
    Self {
      registry,
      now: Cell::new(now),
      utc_offset: profile.utc_offset,
      segments: profile.segments.iter().cloned().collect(),
      conditions: profile.conditions.iter().cloned().collect(),
      listener: TracingListener,
      log: RefCell::new(Vec::new()),
    }
  }

  pub fn set_time(&self, now: Timestamp) { self.now.set(now); }

  /// Everything logged since the last call.
  pub fn take_log(&self) -> Vec<SimulationLogEntry> {
    self.log.take()
  }
}

impl ActivableOwner for SimOwner<'_> {
  fn current_time(&self) -> Timestamp { self.now.get() }

  fn utc_offset(&self) -> Duration { self.utc_offset }

  fn segment_matches(&self, segment: &SegmentId) -> bool {
    self.segments.contains(segment)
  }

  fn condition_holds(&self, condition: &ConditionId) -> bool {
    self.conditions.contains(condition)
  }

  fn behavior(&self, kind: &KindId) -> Option<&dyn ActivableBehavior> {
    self.registry.behavior(kind)
  }

  fn listener(&self, kind: &KindId) -> Option<&dyn ActivableListener> {
    self.registry.get(kind).map(|_| &self.listener as &dyn ActivableListener)
  }

  fn log(&self, entry: SimulationLogEntry) { self.log.borrow_mut().push(entry); }
}
