//! Owner double shared by the unit tests.

use std::{
  cell::{Cell, RefCell},
  collections::BTreeSet,
};

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::{
  info::{ActivableInfo, ActivableKey, KindId},
  owner::{
    ActivableBehavior, ActivableListener, ActivableOwner, SimulationLogEntry,
  },
  params::{ConditionId, SegmentId},
  state::ActivableState,
  time::Timestamp,
};

pub fn at(h: u32, m: u32) -> Timestamp {
  Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn naive(h: u32, m: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 1, 1)
    .unwrap()
    .and_hms_opt(h, m, 0)
    .unwrap()
}

#[derive(Default)]
pub struct Recorder {
  pub started:   RefCell<Vec<ActivableKey>>,
  pub consumed:  RefCell<Vec<ActivableKey>>,
  pub finalized: RefCell<Vec<ActivableKey>>,
}

impl ActivableListener for Recorder {
  fn activation_started(&self, key: &ActivableKey) {
    self.started.borrow_mut().push(key.clone());
  }

  fn consumed(&self, key: &ActivableKey) {
    self.consumed.borrow_mut().push(key.clone());
  }

  fn finalized(&self, key: &ActivableKey) {
    self.finalized.borrow_mut().push(key.clone());
  }
}

pub struct TestOwner {
  now:                     Cell<Timestamp>,
  offset:                  Cell<Duration>,
  segments:                BTreeSet<SegmentId>,
  conditions:              BTreeSet<ConditionId>,
  veto_start:              bool,
  /// Kinds without a listener, to exercise unresolved notifications.
  unlistened:              BTreeSet<KindId>,
  pub recorder:            Recorder,
  pub finalize_hooks:      Cell<u32>,
  pub soft_finalize_hooks: Cell<u32>,
  pub log:                 RefCell<Vec<SimulationLogEntry>>,
}

impl TestOwner {
  pub fn new(now: Timestamp) -> Self {
    Self {
      now:                 Cell::new(now),
      offset:              Cell::new(Duration::zero()),
      segments:            BTreeSet::new(),
      conditions:          BTreeSet::new(),
      veto_start:          false,
      unlistened:          BTreeSet::new(),
      recorder:            Recorder::default(),
      finalize_hooks:      Cell::new(0),
      soft_finalize_hooks: Cell::new(0),
      log:                 RefCell::new(Vec::new()),
    }
  }

  pub fn in_segment(mut self, segment: &str) -> Self {
    self.segments.insert(segment.into());
    self
  }

  pub fn with_condition(mut self, condition: &str) -> Self {
    self.conditions.insert(condition.into());
    self
  }

  pub fn with_start_veto(mut self) -> Self {
    self.veto_start = true;
    self
  }

  pub fn without_listener_for(mut self, kind: &str) -> Self {
    self.unlistened.insert(kind.into());
    self
  }

  pub fn set_time(&self, now: Timestamp) { self.now.set(now); }

  pub fn set_offset(&self, offset: Duration) { self.offset.set(offset); }
}

impl ActivableOwner for TestOwner {
  fn current_time(&self) -> Timestamp { self.now.get() }

  fn utc_offset(&self) -> Duration { self.offset.get() }

  fn segment_matches(&self, segment: &SegmentId) -> bool {
    self.segments.contains(segment)
  }

  fn condition_holds(&self, condition: &ConditionId) -> bool {
    self.conditions.contains(condition)
  }

  fn behavior(&self, _kind: &KindId) -> Option<&dyn ActivableBehavior> {
    Some(self)
  }

  fn listener(&self, kind: &KindId) -> Option<&dyn ActivableListener> {
    if self.unlistened.contains(kind) {
      None
    } else {
      Some(&self.recorder)
    }
  }

  fn log(&self, entry: SimulationLogEntry) { self.log.borrow_mut().push(entry); }
}

impl ActivableBehavior for TestOwner {
  fn can_start_activation(
    &self,
    _info: &ActivableInfo,
    _state: &ActivableState,
    _at: Timestamp,
  ) -> bool {
    !self.veto_start
  }

  fn on_finalize(&self, _info: &ActivableInfo, _state: &ActivableState) {
    self.finalize_hooks.set(self.finalize_hooks.get() + 1);
  }

  fn on_soft_finalize(&self, _info: &ActivableInfo, _state: &ActivableState) {
    self.soft_finalize_hooks.set(self.soft_finalize_hooks.get() + 1);
  }
}
