//! Per-owner lifecycle state of one activable.
//!
//! An [`ActivableState`] remembers how often the activable has been
//! activated, consumed and finalized, plus the latest [`Activation`]. The
//! phase it is in (active, in review, in cooldown, inactive) is never stored;
//! it is derived from the latest activation, the current config and the
//! current time.
//!
//! Items with [`ExtensionParams`](crate::params::ExtensionParams) also track
//! [`ExtensionProgress`]: once an activation has been extended, its review
//! phase stops following the schedule and lasts a fixed time after the
//! extension ends.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
  activation::Activation,
  info::ActivableInfo,
  lifetime::LifetimeSpec,
  owner::{ActivableOwner, SimulationLogEntry},
  status::{DebugActivationState, DebugPhase},
  time::{LocalTime, Timestamp},
};

/// Extension bookkeeping for the latest activation. Reset whenever a new
/// activation starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionProgress {
  pub last_extension_started_at: Option<Timestamp>,
  pub num_extended:              u32,
  pub num_soft_finalized:        u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivableState {
  #[serde(default)]
  num_activated:      u32,
  #[serde(default)]
  total_num_consumed: u32,
  #[serde(default)]
  num_finalized:      u32,
  /// The ongoing activation if there is one, otherwise the last one.
  #[serde(default)]
  latest_activation:  Option<Activation>,
  #[serde(default)]
  debug:              Option<DebugActivationState>,
  #[serde(default)]
  extension:          ExtensionProgress,
}

impl ActivableState {
  pub fn new() -> Self { Self::default() }

  // ── Accessors ─────────────────────────────────────────────────────────

  pub fn num_activated(&self) -> u32 { self.num_activated }

  pub fn total_num_consumed(&self) -> u32 { self.total_num_consumed }

  pub fn num_finalized(&self) -> u32 { self.num_finalized }

  pub fn latest_activation(&self) -> Option<&Activation> {
    self.latest_activation.as_ref()
  }

  pub fn debug_phase(&self) -> Option<DebugPhase> {
    self.debug.map(|d| d.phase)
  }

  pub fn extension_progress(&self) -> &ExtensionProgress { &self.extension }

  // ── Phase queries ─────────────────────────────────────────────────────

  pub fn has_ongoing_activation(&self, now: Timestamp) -> bool {
    self.latest_activation.is_some_and(|a| a.is_ongoing(now))
  }

  pub fn is_in_cooldown(&self, now: Timestamp) -> bool {
    self.latest_activation.is_some_and(|a| a.is_in_cooldown(now))
  }

  /// Whether the lifetime limits on activations or consumes are used up.
  pub fn total_limits_are_reached(&self, info: &ActivableInfo) -> bool {
    let params = &info.params;
    params.max_activations.is_some_and(|max| self.num_activated >= max)
      || params
        .max_total_consumes
        .is_some_and(|max| self.total_num_consumed >= max)
  }

  /// Ongoing, and for transient items, still meeting the conditions.
  pub fn is_active<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if let Some(debug) = self.debug {
      return debug.phase.is_active();
    }
    let now = owner.current_time();
    self.has_ongoing_activation(now)
      && (!info.params.is_transient
        || info.params.conditions_are_fulfilled_at(owner, now))
  }

  pub fn is_in_review<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    let now = owner.current_time();
    let Some(activation) = self.latest_activation else {
      return false;
    };
    if activation.is_ongoing(now) {
      return false;
    }
    if let Some(debug) = self.debug {
      return debug.phase == DebugPhase::Review;
    }
    let Some(end_at) = activation.end_at else {
      return false;
    };

    if let Some(extension) = &info.extension
      && self.extension.num_extended > 0
    {
      return now < end_at + extension.extension_review_duration;
    }

    let Some(schedule) = &info.params.schedule else {
      return false;
    };
    if activation.ended_explicitly {
      return false;
    }
    // Fixed and forever lifetimes have no review phase.
    if !info.params.lifetime.is_schedule_based() {
      return false;
    }
    let Some(occasion) =
      schedule.current_or_next_enabled_occasion(activation.local_start())
    else {
      return false;
    };
    // The schedule moved forward past this activation.
    if end_at < occasion.enabled_range.start {
      return false;
    }
    occasion.is_reviewed_at(now)
  }

  /// Whether starting a new activation now would let the owner replay a
  /// local-time occasion by moving their UTC offset backwards.
  pub fn is_blocked_by_schedule_offset<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
    at: Timestamp,
  ) -> bool {
    let (Some(schedule), Some(latest)) =
      (&info.params.schedule, self.latest_activation)
    else {
      return false;
    };
    let Some(previous_end) = latest.end_at else {
      return false;
    };
    let offset = schedule.effective_offset(owner.utc_offset());
    at + offset < previous_end + latest.utc_offset
  }

  pub fn can_start_activation<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self.can_start_activation_at(info, owner, owner.current_time())
  }

  pub fn can_start_activation_at<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
    at: Timestamp,
  ) -> bool {
    // Phases under debug control only change by hand.
    if self.debug.is_some() {
      return false;
    }
    if self.total_limits_are_reached(info)
      || self.is_in_cooldown(at)
      || self.has_ongoing_activation(at)
      || self.is_blocked_by_schedule_offset(info, owner, at)
    {
      return false;
    }
    if let Some(behavior) = owner.behavior(&info.kind)
      && !behavior.can_start_activation(info, self, at)
    {
      return false;
    }
    info.params.conditions_are_fulfilled_at(owner, at)
  }

  pub fn can_consume<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self.is_active(info, owner)
  }

  pub fn can_be_finalized<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    let Some(activation) = self.latest_activation else {
      return false;
    };
    !activation.is_ongoing(owner.current_time())
      && !activation.is_finalized
      && !self.latest_activation_can_be_extended(info, owner)
  }

  pub fn latest_activation_can_be_extended<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    let Some(extension) = &info.extension else {
      return false;
    };
    self.is_in_review(info, owner)
      && self.extension.num_extended < extension.max_extensions_per_activation
  }

  /// One soft finalization is allowed per extension, plus one for the
  /// original end.
  pub fn can_be_soft_finalized<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self.latest_activation_can_be_extended(info, owner)
      && self.extension.num_soft_finalized < self.extension.num_extended + 1
  }

  /// When the latest activation stops being shown to the owner.
  pub fn visibility_ends_at(&self, info: &ActivableInfo) -> Option<Timestamp> {
    let activation = self.latest_activation?;
    if let Some(extension) = &info.extension
      && self.extension.num_extended > 0
    {
      return activation
        .end_at
        .map(|end| end + extension.extension_review_duration);
    }
    info
      .params
      .lifetime
      .visibility_ends_at(activation.local_start(), info.params.schedule.as_ref())
  }

  pub fn ending_soon_starts_at(&self, info: &ActivableInfo) -> Option<Timestamp> {
    let activation = self.latest_activation?;
    if info.extension.is_some() && self.extension.num_extended > 0 {
      return activation.end_at;
    }
    info.params.lifetime.ending_soon_starts_at(
      activation.local_start(),
      info.params.schedule.as_ref(),
    )
  }

  // ── Transitions ───────────────────────────────────────────────────────

  pub fn try_start_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if !self.can_start_activation(info, owner) {
      return false;
    }
    self.force_start_activation(info, owner);
    true
  }

  /// Start a new activation regardless of limits, cooldown or conditions.
  pub fn force_start_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    self.begin_activation(info, owner, &info.params.lifetime);
  }

  pub(crate) fn start_endless_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    self.begin_activation(info, owner, &LifetimeSpec::Forever);
  }

  fn begin_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
    lifetime: &LifetimeSpec,
  ) {
    let now = owner.current_time();
    let schedule = info.params.schedule.as_ref();
    let utc_offset = schedule.map_or(Duration::zero(), |s| {
      s.effective_offset(owner.utc_offset())
    });
    let start = LocalTime::new(now, utc_offset);
    let end_at = lifetime.expires_at(start, schedule);
    // Without an end there is nothing for a cooldown to follow yet.
    let cooldown_end_at = end_at
      .map(|end| info.params.cooldown.cooldown_ends_at(start, end, schedule));

    self.num_activated += 1;
    self.latest_activation =
      Some(Activation::new(now, utc_offset, end_at, cooldown_end_at));
    self.extension = ExtensionProgress::default();

    let key = info.key();
    tracing::debug!(%key, ?end_at, ?cooldown_end_at, "activation started");
    owner.log(SimulationLogEntry::ActivationStarted {
      key: key.clone(),
      at: now,
      end_at,
    });
    if let Some(listener) = owner.listener(&info.kind) {
      listener.activation_started(&key);
    }
  }

  pub fn try_consume<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if !self.can_consume(info, owner) {
      return false;
    }
    self.force_consume(info, owner);
    true
  }

  /// Count a consume. Ends the ongoing activation once a consume limit is
  /// reached.
  pub fn force_consume<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    let now = owner.current_time();
    let params = &info.params;
    self.total_num_consumed += 1;
    let total = self.total_num_consumed;

    let mut num_consumed = None;
    let mut limit_reached = false;
    if let Some(activation) = self.latest_activation.as_mut()
      && activation.is_ongoing(now)
    {
      activation.num_consumed += 1;
      num_consumed = Some(activation.num_consumed);
      limit_reached = params.max_total_consumes.is_some_and(|max| total >= max)
        || params
          .max_consumes_per_activation
          .is_some_and(|max| activation.num_consumed >= max);
    }

    let key = info.key();
    tracing::debug!(%key, total, ?num_consumed, "consumed");
    owner.log(SimulationLogEntry::Consumed {
      key: key.clone(),
      at: now,
      num_consumed,
    });

    if limit_reached {
      self.force_end_activation(info, owner, false);
    }

    if let Some(listener) = owner.listener(&info.kind) {
      listener.consumed(&key);
    }
  }

  /// End the ongoing activation now. Does nothing if none is ongoing.
  pub fn force_end_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
    skip_cooldown: bool,
  ) {
    let now = owner.current_time();
    let Some(mut activation) = self.latest_activation else {
      return;
    };
    if !activation.is_ongoing(now) {
      return;
    }

    activation.end_at = Some(now);
    activation.ended_explicitly = true;
    activation.cooldown_end_at = Some(if skip_cooldown {
      now
    } else {
      info.params.cooldown.cooldown_ends_at(
        activation.local_start(),
        now,
        info.params.schedule.as_ref(),
      )
    });
    self.latest_activation = Some(activation);

    let key = info.key();
    tracing::debug!(%key, skip_cooldown, "activation ended");
    owner.log(SimulationLogEntry::ActivationEnded {
      key,
      at: now,
      skip_cooldown,
    });
  }

  /// Bring the latest activation in line with the current config, e.g.
  /// after a config reload. The start time never moves. Returns whether
  /// anything changed.
  pub fn try_adjust_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if self.debug.is_some() || !info.params.allow_activation_adjustment {
      return false;
    }
    self.rederive_activation(info, owner)
  }

  /// Leave debug control. The synthetic activation the override left behind
  /// is re-derived from the real config, whether or not the item allows
  /// adjustment.
  pub(crate) fn clear_debug_phase<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self.debug = None;
    self.rederive_activation(info, owner)
  }

  fn rederive_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    let params = &info.params;
    let Some(activation) = self.latest_activation else {
      return false;
    };

    let now = owner.current_time();
    let schedule = params.schedule.as_ref();
    let start = activation.local_start();

    if activation.is_ongoing(now) {
      if !params.is_enabled {
        self.force_end_activation(info, owner, false);
        return true;
      }
      if schedule.is_some_and(|s| !s.is_enabled_at(start)) {
        self.force_end_activation(info, owner, true);
        return true;
      }
      let over_activated =
        params.max_activations.is_some_and(|max| self.num_activated > max);
      let over_consumed = params
        .max_total_consumes
        .is_some_and(|max| self.total_num_consumed >= max)
        || params
          .max_consumes_per_activation
          .is_some_and(|max| activation.num_consumed >= max);
      if over_activated || over_consumed {
        self.force_end_activation(info, owner, false);
        return true;
      }

      // Extended activations keep the end the extension gave them.
      let end_at = if self.extension.num_extended > 0 {
        activation.end_at
      } else {
        params.lifetime.expires_at(start, schedule)
      };
      let cooldown_end_at =
        end_at.map(|end| params.cooldown.cooldown_ends_at(start, end, schedule));
      return self.apply_adjustment(info, owner, end_at, cooldown_end_at);
    }

    if activation.is_in_cooldown(now)
      && let Some(end) = activation.end_at
    {
      let cooldown_end_at =
        Some(params.cooldown.cooldown_ends_at(start, end, schedule));
      return self.apply_adjustment(info, owner, activation.end_at, cooldown_end_at);
    }

    false
  }

  fn apply_adjustment<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
    end_at: Option<Timestamp>,
    cooldown_end_at: Option<Timestamp>,
  ) -> bool {
    let Some(mut activation) = self.latest_activation else {
      return false;
    };
    if activation.end_at == end_at && activation.cooldown_end_at == cooldown_end_at
    {
      return false;
    }
    activation.end_at = end_at;
    activation.cooldown_end_at = cooldown_end_at;
    self.latest_activation = Some(activation);

    let key = info.key();
    tracing::debug!(%key, ?end_at, ?cooldown_end_at, "activation adjusted");
    owner.log(SimulationLogEntry::ActivationAdjusted {
      key,
      end_at,
      cooldown_end_at,
    });
    true
  }

  pub fn try_finalize<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if !self.can_be_finalized(info, owner) {
      return false;
    }
    self.finalize_latest(info, owner);
    true
  }

  /// Mark the latest activation finalized and run the finalize hooks.
  pub(crate) fn finalize_latest<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    let Some(mut activation) = self.latest_activation else {
      return;
    };
    if activation.is_finalized {
      return;
    }
    activation.is_finalized = true;
    self.latest_activation = Some(activation);
    self.num_finalized += 1;

    let key = info.key();
    tracing::debug!(%key, num_finalized = self.num_finalized, "finalized");
    if let Some(behavior) = owner.behavior(&info.kind) {
      behavior.on_finalize(info, self);
    }
    if let Some(listener) = owner.listener(&info.kind) {
      listener.finalized(&key);
    }
    owner.log(SimulationLogEntry::Finalized { key });
  }

  /// Extend an activation that is in review. The new end is measured from
  /// now, and the cooldown is recomputed from the new end.
  pub fn try_extend_latest_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if !self.latest_activation_can_be_extended(info, owner) {
      return false;
    }
    let (Some(extension), Some(mut activation)) =
      (&info.extension, self.latest_activation)
    else {
      return false;
    };

    let now = owner.current_time();
    let end_at = now + extension.extension_duration;
    activation.end_at = Some(end_at);
    activation.cooldown_end_at = Some(info.params.cooldown.cooldown_ends_at(
      activation.local_start(),
      end_at,
      info.params.schedule.as_ref(),
    ));
    self.latest_activation = Some(activation);
    self.extension.last_extension_started_at = Some(now);
    self.extension.num_extended += 1;

    let key = info.key();
    tracing::debug!(
      %key,
      %end_at,
      num_extended = self.extension.num_extended,
      "activation extended"
    );
    owner.log(SimulationLogEntry::Extended { key, end_at });
    true
  }

  pub fn try_soft_finalize<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    if !self.can_be_soft_finalized(info, owner) {
      return false;
    }
    self.extension.num_soft_finalized += 1;

    let key = info.key();
    tracing::debug!(
      %key,
      num_soft_finalized = self.extension.num_soft_finalized,
      "soft finalized"
    );
    if let Some(behavior) = owner.behavior(&info.kind) {
      behavior.on_soft_finalize(info, self);
    }
    owner.log(SimulationLogEntry::SoftFinalized { key });
    true
  }

  pub(crate) fn set_debug_phase(&mut self, phase: Option<DebugPhase>) {
    self.debug = phase.map(|phase| DebugActivationState { phase });
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    cooldown::CooldownSpec,
    params::{ActivableParams, ExtensionParams},
    schedule::{Schedule, ScheduleTimeMode},
    test_support::{TestOwner, at, naive},
  };

  fn fixed_info(hours: i64) -> ActivableInfo {
    fixed_info_with(hours, |params| params)
  }

  fn fixed_info_with(
    hours: i64,
    configure: impl FnOnce(ActivableParams) -> ActivableParams,
  ) -> ActivableInfo {
    let params = ActivableParams::new(
      LifetimeSpec::fixed(Duration::hours(hours)).unwrap(),
      CooldownSpec::fixed(Duration::hours(1)).unwrap(),
    )
    .unwrap();
    ActivableInfo::new("offer", "starter_pack", configure(params))
  }

  /// Enabled 10:00–12:00 with a one hour review.
  fn scheduled_info() -> ActivableInfo {
    let schedule = Schedule::once(
      ScheduleTimeMode::Utc,
      naive(10, 0),
      Duration::hours(2),
    )
    .unwrap()
    .with_windows(Duration::hours(1), Duration::hours(1), Duration::minutes(30))
    .unwrap();
    let params = ActivableParams::new(
      LifetimeSpec::ScheduleBased,
      CooldownSpec::fixed(Duration::hours(1)).unwrap(),
    )
    .unwrap()
    .with_schedule(schedule);
    ActivableInfo::new("event", "weekend_rush", params)
  }

  fn extendable_info(max_extensions: u32) -> ActivableInfo {
    scheduled_info().with_extension(
      ExtensionParams::new(
        Duration::minutes(30),
        Duration::minutes(10),
        max_extensions,
      )
      .unwrap(),
    )
  }

  fn assert_latest_matches_count(state: &ActivableState) {
    assert_eq!(
      state.latest_activation().is_none(),
      state.num_activated() == 0
    );
  }

  // ── Starting ──────────────────────────────────────────────────────────

  #[test]
  fn fresh_state_has_no_activation() {
    let state = ActivableState::new();
    assert_latest_matches_count(&state);
    assert!(!state.has_ongoing_activation(at(10, 0)));
  }

  #[test]
  fn start_derives_end_and_cooldown() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(2);
    let mut state = ActivableState::new();

    assert!(state.try_start_activation(&info, &owner));
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.started_at, at(10, 0));
    assert_eq!(activation.end_at, Some(at(12, 0)));
    assert_eq!(activation.cooldown_end_at, Some(at(13, 0)));
    assert_eq!(state.num_activated(), 1);
    assert_latest_matches_count(&state);
    assert_eq!(owner.recorder.started.borrow().len(), 1);
  }

  #[test]
  fn forever_lifetime_has_no_cooldown_horizon() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(1);
    info.params.lifetime = LifetimeSpec::Forever;
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.end_at, None);
    assert_eq!(activation.cooldown_end_at, None);
  }

  #[test]
  fn new_activation_resets_per_activation_counters() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    state.force_consume(&info, &owner);
    state.force_consume(&info, &owner);

    owner.set_time(at(11, 0));
    assert!(state.try_finalize(&info, &owner));

    owner.set_time(at(13, 0));
    state.force_start_activation(&info, &owner);
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.num_consumed, 0);
    assert!(!activation.is_finalized);
    assert_eq!(state.total_num_consumed(), 2);
    assert_eq!(state.num_finalized(), 1);
  }

  #[test]
  fn cannot_start_while_ongoing_or_in_cooldown() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    assert!(state.try_start_activation(&info, &owner));
    assert!(!state.try_start_activation(&info, &owner));

    owner.set_time(at(11, 30));
    assert!(state.is_in_cooldown(at(11, 30)));
    assert!(!state.try_start_activation(&info, &owner));

    owner.set_time(at(12, 0));
    assert!(state.try_start_activation(&info, &owner));
    assert_eq!(state.num_activated(), 2);
  }

  #[test]
  fn max_activations_blocks_further_starts() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info_with(1, |p| p.with_max_activations(1));
    let mut state = ActivableState::new();
    assert!(state.try_start_activation(&info, &owner));

    owner.set_time(at(20, 0));
    assert!(state.total_limits_are_reached(&info));
    assert!(!state.try_start_activation(&info, &owner));
  }

  #[test]
  fn behavior_can_veto_start() {
    let owner = TestOwner::new(at(10, 0)).with_start_veto();
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    assert!(!state.try_start_activation(&info, &owner));
    assert_eq!(state.num_activated(), 0);
  }

  #[test]
  fn offset_rewind_cannot_replay_local_occasion() {
    let schedule = Schedule::once(
      ScheduleTimeMode::Local,
      naive(10, 0),
      Duration::hours(2),
    )
    .unwrap()
    .repeating(Duration::hours(3), None)
    .unwrap();
    let params = ActivableParams::new(
      LifetimeSpec::ScheduleBased,
      CooldownSpec::default(),
    )
    .unwrap()
    .with_schedule(schedule);
    let info = ActivableInfo::new("event", "local_event", params);

    // 10:00 local at UTC+0.
    let owner = TestOwner::new(at(10, 0));
    let mut state = ActivableState::new();
    assert!(state.try_start_activation(&info, &owner));
    assert_eq!(state.latest_activation().unwrap().end_at, Some(at(12, 0)));

    // Moving to UTC-1 at 12:30 UTC reads 11:30 local, inside the same
    // local occasion again.
    owner.set_time(at(12, 30));
    owner.set_offset(Duration::hours(-1));
    assert!(state.is_blocked_by_schedule_offset(&info, &owner, at(12, 30)));
    assert!(!state.try_start_activation(&info, &owner));

    // Next local occasion starts 13:00 local, 14:00 UTC.
    owner.set_time(at(14, 0));
    assert!(!state.is_blocked_by_schedule_offset(&info, &owner, at(14, 0)));
    assert!(state.try_start_activation(&info, &owner));
  }

  #[test]
  fn debug_override_blocks_automatic_start() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    state.set_debug_phase(Some(DebugPhase::Inactive));
    assert!(!state.can_start_activation(&info, &owner));
  }

  // ── Consuming ─────────────────────────────────────────────────────────

  #[test]
  fn single_consume_ends_activation_when_limit_is_one() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info_with(2, |p| p.with_max_consumes_per_activation(1));
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    owner.set_time(at(10, 30));
    assert!(state.try_consume(&info, &owner));

    let activation = state.latest_activation().unwrap();
    assert!(activation.ended_explicitly);
    assert_eq!(activation.end_at, Some(at(10, 30)));
    assert_eq!(activation.cooldown_end_at, Some(at(11, 30)));
    assert_eq!(activation.num_consumed, 1);
    assert!(!state.has_ongoing_activation(at(10, 30)));
    assert!(!state.try_consume(&info, &owner));
    assert_eq!(owner.recorder.consumed.borrow().len(), 1);
  }

  #[test]
  fn total_consume_limit_ends_activation() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info_with(2, |p| p.with_max_total_consumes(2));
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    state.force_consume(&info, &owner);
    assert!(state.has_ongoing_activation(at(10, 0)));
    state.force_consume(&info, &owner);
    assert!(!state.has_ongoing_activation(at(10, 0)));
    assert!(state.total_limits_are_reached(&info));
  }

  #[test]
  fn consume_without_activation_only_counts_total() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    state.force_consume(&info, &owner);
    assert_eq!(state.total_num_consumed(), 1);
    assert!(state.latest_activation().is_none());
  }

  #[test]
  fn transient_activation_is_inactive_without_conditions() {
    let info = {
      let mut info = fixed_info(2);
      info.params = info.params.with_conditions(["vip".into()]).transient();
      info
    };
    let owner = TestOwner::new(at(10, 0)).with_condition("vip");
    let mut state = ActivableState::new();
    assert!(state.try_start_activation(&info, &owner));
    assert!(state.is_active(&info, &owner));

    let lapsed = TestOwner::new(at(10, 30));
    assert!(state.has_ongoing_activation(at(10, 30)));
    assert!(!state.is_active(&info, &lapsed));
  }

  // ── Ending ────────────────────────────────────────────────────────────

  #[test]
  fn force_end_is_idempotent() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    owner.set_time(at(10, 15));
    state.force_end_activation(&info, &owner, false);
    let first = state.clone();

    owner.set_time(at(10, 45));
    state.force_end_activation(&info, &owner, true);
    assert_eq!(state, first);
  }

  #[test]
  fn force_end_can_skip_cooldown() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    state.force_end_activation(&info, &owner, true);

    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.cooldown_end_at, Some(at(10, 0)));
    assert!(!state.is_in_cooldown(at(10, 0)));
  }

  // ── Review ────────────────────────────────────────────────────────────

  #[test]
  fn natural_schedule_end_enters_review() {
    let owner = TestOwner::new(at(10, 30));
    let info = scheduled_info();
    let mut state = ActivableState::new();
    assert!(state.try_start_activation(&info, &owner));
    assert!(!state.is_in_review(&info, &owner));

    owner.set_time(at(12, 15));
    assert!(state.is_in_review(&info, &owner));
    owner.set_time(at(13, 0));
    assert!(!state.is_in_review(&info, &owner));
  }

  #[test]
  fn explicit_end_skips_review() {
    let owner = TestOwner::new(at(10, 30));
    let info = scheduled_info();
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    state.force_end_activation(&info, &owner, false);

    owner.set_time(at(12, 15));
    assert!(!state.is_in_review(&info, &owner));
  }

  #[test]
  fn fixed_lifetime_has_no_review() {
    let owner = TestOwner::new(at(10, 30));
    let mut info = scheduled_info();
    info.params.lifetime = LifetimeSpec::fixed(Duration::hours(1)).unwrap();
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    owner.set_time(at(12, 15));
    assert!(!state.is_in_review(&info, &owner));
  }

  #[test]
  fn review_does_not_apply_after_schedule_moved_forward() {
    let owner = TestOwner::new(at(10, 30));
    let mut info = scheduled_info();
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    // Reschedule to 13:00 after the activation started. The occasion seen
    // from the old start now begins after the activation ended.
    let moved = Schedule::once(
      ScheduleTimeMode::Utc,
      naive(13, 0),
      Duration::hours(2),
    )
    .unwrap()
    .with_windows(Duration::zero(), Duration::hours(1), Duration::zero())
    .unwrap();
    info.params.schedule = Some(moved);

    owner.set_time(at(12, 15));
    assert!(!state.is_in_review(&info, &owner));
  }

  // ── Adjusting ─────────────────────────────────────────────────────────

  #[test]
  fn adjust_ends_disabled_activation_once() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    info.params.is_enabled = false;
    owner.set_time(at(10, 30));
    assert!(state.try_adjust_activation(&info, &owner));
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.end_at, Some(at(10, 30)));
    assert_eq!(activation.cooldown_end_at, Some(at(11, 30)));

    assert!(!state.try_adjust_activation(&info, &owner));
  }

  #[test]
  fn adjust_ends_unscheduled_activation_without_cooldown() {
    let owner = TestOwner::new(at(10, 30));
    let mut info = scheduled_info();
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    let moved = Schedule::once(
      ScheduleTimeMode::Utc,
      naive(14, 0),
      Duration::hours(2),
    )
    .unwrap();
    info.params.schedule = Some(moved);
    owner.set_time(at(11, 0));

    assert!(state.try_adjust_activation(&info, &owner));
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.end_at, Some(at(11, 0)));
    assert_eq!(activation.cooldown_end_at, Some(at(11, 0)));
    assert!(!state.is_in_cooldown(at(11, 0)));
  }

  #[test]
  fn adjust_follows_lifetime_change() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    info.params.lifetime = LifetimeSpec::fixed(Duration::hours(3)).unwrap();
    owner.set_time(at(11, 0));
    assert!(state.try_adjust_activation(&info, &owner));
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.started_at, at(10, 0));
    assert_eq!(activation.end_at, Some(at(13, 0)));
    assert_eq!(activation.cooldown_end_at, Some(at(14, 0)));
    assert!(!state.try_adjust_activation(&info, &owner));
  }

  #[test]
  fn adjust_follows_cooldown_change() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(1);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    owner.set_time(at(11, 30));
    info.params.cooldown = CooldownSpec::fixed(Duration::hours(2)).unwrap();
    assert!(state.try_adjust_activation(&info, &owner));
    assert_eq!(
      state.latest_activation().unwrap().cooldown_end_at,
      Some(at(13, 0))
    );
  }

  #[test]
  fn adjust_ends_activation_over_new_activation_limit() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(1);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    owner.set_time(at(12, 0));
    state.force_start_activation(&info, &owner);

    info.params.max_activations = Some(1);
    assert!(state.try_adjust_activation(&info, &owner));
    assert!(!state.has_ongoing_activation(at(12, 0)));
  }

  fn assert_adjust_ends_over_consumed(reloaded: &ActivableInfo) {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    state.force_consume(&info, &owner);
    state.force_consume(&info, &owner);
    assert!(state.has_ongoing_activation(at(10, 0)));

    owner.set_time(at(10, 30));
    assert!(state.try_adjust_activation(reloaded, &owner));
    let activation = state.latest_activation().unwrap();
    assert!(activation.ended_explicitly);
    assert_eq!(activation.end_at, Some(at(10, 30)));
    assert_eq!(activation.cooldown_end_at, Some(at(11, 30)));
    assert!(!state.try_adjust_activation(reloaded, &owner));
  }

  #[test]
  fn adjust_ends_activation_over_new_per_activation_consume_limit() {
    assert_adjust_ends_over_consumed(&fixed_info_with(2, |p| {
      p.with_max_consumes_per_activation(2)
    }));
  }

  #[test]
  fn adjust_ends_activation_over_new_total_consume_limit() {
    assert_adjust_ends_over_consumed(&fixed_info_with(2, |p| {
      p.with_max_total_consumes(2)
    }));
  }

  #[test]
  fn clearing_debug_rederives_despite_opt_out() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(1);
    info.params.allow_activation_adjustment = false;
    let mut state = ActivableState::new();
    state.set_debug_phase(Some(DebugPhase::Active));
    state.start_endless_activation(&info, &owner);
    assert_eq!(state.latest_activation().unwrap().end_at, None);

    owner.set_time(at(10, 30));
    assert!(state.clear_debug_phase(&info, &owner));
    assert_eq!(state.debug_phase(), None);
    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.end_at, Some(at(11, 0)));
    assert_eq!(activation.cooldown_end_at, Some(at(12, 0)));
    assert!(!state.has_ongoing_activation(at(11, 0)));
  }

  #[test]
  fn adjust_respects_opt_out_and_debug() {
    let owner = TestOwner::new(at(10, 0));
    let mut info = fixed_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    info.params.is_enabled = false;

    info.params.allow_activation_adjustment = false;
    assert!(!state.try_adjust_activation(&info, &owner));

    info.params.allow_activation_adjustment = true;
    state.set_debug_phase(Some(DebugPhase::Active));
    assert!(!state.try_adjust_activation(&info, &owner));
    assert!(state.has_ongoing_activation(at(10, 0)));
  }

  // ── Finalizing ────────────────────────────────────────────────────────

  #[test]
  fn finalize_once_after_end() {
    let owner = TestOwner::new(at(10, 0));
    let info = fixed_info(1);
    let mut state = ActivableState::new();
    assert!(!state.try_finalize(&info, &owner));

    state.force_start_activation(&info, &owner);
    assert!(!state.try_finalize(&info, &owner));

    owner.set_time(at(11, 0));
    assert!(state.try_finalize(&info, &owner));
    assert!(!state.try_finalize(&info, &owner));
    assert_eq!(state.num_finalized(), 1);
    assert_eq!(owner.recorder.finalized.borrow().len(), 1);
    assert_eq!(owner.finalize_hooks.get(), 1);
  }

  // ── Extending ─────────────────────────────────────────────────────────

  #[test]
  fn extension_is_limited_per_activation() {
    let owner = TestOwner::new(at(10, 0));
    let info = extendable_info(1);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    // Not in review while running.
    assert!(!state.try_extend_latest_activation(&info, &owner));

    owner.set_time(at(12, 5));
    assert!(state.is_in_review(&info, &owner));
    assert!(!state.can_be_finalized(&info, &owner));
    assert!(state.try_extend_latest_activation(&info, &owner));

    let activation = state.latest_activation().unwrap();
    assert_eq!(activation.end_at, Some(at(12, 35)));
    assert_eq!(activation.cooldown_end_at, Some(at(13, 35)));
    assert_eq!(state.extension_progress().num_extended, 1);
    assert_eq!(
      state.extension_progress().last_extension_started_at,
      Some(at(12, 5))
    );

    // Review after the extension lasts ten minutes.
    owner.set_time(at(12, 40));
    assert!(state.is_in_review(&info, &owner));
    let before = state.clone();
    assert!(!state.try_extend_latest_activation(&info, &owner));
    assert_eq!(state, before);
    assert!(state.can_be_finalized(&info, &owner));

    owner.set_time(at(12, 45));
    assert!(!state.is_in_review(&info, &owner));
  }

  #[test]
  fn new_activation_resets_extension_progress() {
    let owner = TestOwner::new(at(10, 0));
    let info = extendable_info(2);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);
    owner.set_time(at(12, 5));
    assert!(state.try_extend_latest_activation(&info, &owner));
    owner.set_time(at(12, 36));
    assert!(state.try_soft_finalize(&info, &owner));

    state.force_start_activation(&info, &owner);
    assert_eq!(*state.extension_progress(), ExtensionProgress::default());
  }

  #[test]
  fn soft_finalize_allows_one_more_than_extensions() {
    let owner = TestOwner::new(at(10, 0));
    let info = extendable_info(3);
    let mut state = ActivableState::new();
    state.force_start_activation(&info, &owner);

    owner.set_time(at(12, 5));
    assert!(state.try_soft_finalize(&info, &owner));
    assert!(!state.try_soft_finalize(&info, &owner));

    assert!(state.try_extend_latest_activation(&info, &owner));
    owner.set_time(at(12, 36));
    assert!(state.try_soft_finalize(&info, &owner));
    assert!(!state.try_soft_finalize(&info, &owner));
    assert_eq!(state.extension_progress().num_soft_finalized, 2);
    assert_eq!(owner.soft_finalize_hooks.get(), 2);
  }
}
