//! Collections of activable states belonging to one owner.
//!
//! An [`ActivableSet`] holds the states of one kind. States are created the
//! first time an activation starts (or something is consumed), and are kept
//! for as long as the owner exists. States whose config item disappears are
//! moved to a separate quarantine map so that they survive until the config
//! comes back.

use std::collections::{BTreeMap, btree_map::Entry};

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  info::{
    ActivableConfig, ActivableId, ActivableInfo, ActivableKey, ActivableLibrary,
    ConfigResolver, KindId,
  },
  owner::{ActivableOwner, SimulationLogEntry},
  schedule::ScheduleOccasion,
  state::ActivableState,
  status::{ActiveStatus, DebugPhase, VisibleStatus},
  time::Timestamp,
};

/// What [`ActivableSet::organize_by_validity`] moved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
  /// Moved from the live map into quarantine.
  pub quarantined: Vec<ActivableId>,
  /// Moved from quarantine back into the live map.
  pub restored:    Vec<ActivableId>,
}

impl Reconciliation {
  pub fn is_empty(&self) -> bool {
    self.quarantined.is_empty() && self.restored.is_empty()
  }
}

// ─── ActivableSet ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivableSet {
  #[serde(default)]
  states:           BTreeMap<ActivableId, ActivableState>,
  /// States whose config item could not be resolved on load.
  #[serde(default)]
  erroneous_states: BTreeMap<ActivableId, ActivableState>,
}

impl ActivableSet {
  pub fn new() -> Self { Self::default() }

  pub fn try_get_state(&self, id: &ActivableId) -> Option<&ActivableState> {
    self.states.get(id)
  }

  pub fn try_get_state_mut(
    &mut self,
    id: &ActivableId,
  ) -> Option<&mut ActivableState> {
    self.states.get_mut(id)
  }

  pub fn get_or_create_state(
    &mut self,
    info: &ActivableInfo,
  ) -> &mut ActivableState {
    self.states.entry(info.id.clone()).or_default()
  }

  pub fn states(&self) -> impl Iterator<Item = (&ActivableId, &ActivableState)> {
    self.states.iter()
  }

  pub fn erroneous_states(
    &self,
  ) -> impl Iterator<Item = (&ActivableId, &ActivableState)> {
    self.erroneous_states.iter()
  }

  // ── Starting ──────────────────────────────────────────────────────────

  /// Without a state there is no history to disqualify the owner, so only
  /// the config conditions are checked.
  pub fn can_start_activation<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    match self.states.get(&info.id) {
      Some(state) => state.can_start_activation(info, owner),
      None => {
        let now = owner.current_time();
        let blocked = owner.behavior(&info.kind).is_some_and(|behavior| {
          !behavior.can_start_activation(info, &ActivableState::new(), now)
        });
        !blocked && info.params.conditions_are_fulfilled_at(owner, now)
      }
    }
  }

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

  pub fn force_start_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    self.get_or_create_state(info).force_start_activation(info, owner);
  }

  // ── Consuming and ending ──────────────────────────────────────────────

  pub fn try_consume<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get_mut(&info.id)
      .is_some_and(|state| state.try_consume(info, owner))
  }

  pub fn force_consume<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) {
    self.get_or_create_state(info).force_consume(info, owner);
  }

  pub fn force_end_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
    skip_cooldown: bool,
  ) {
    if let Some(state) = self.states.get_mut(&info.id) {
      state.force_end_activation(info, owner, skip_cooldown);
    }
  }

  pub fn try_adjust_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get_mut(&info.id)
      .is_some_and(|state| state.try_adjust_activation(info, owner))
  }

  pub fn try_finalize<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get_mut(&info.id)
      .is_some_and(|state| state.try_finalize(info, owner))
  }

  pub fn try_extend_latest_activation<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get_mut(&info.id)
      .is_some_and(|state| state.try_extend_latest_activation(info, owner))
  }

  pub fn try_soft_finalize<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get_mut(&info.id)
      .is_some_and(|state| state.try_soft_finalize(info, owner))
  }

  // ── Bulk operations ───────────────────────────────────────────────────

  /// Try to start each item; returns the ids that started.
  pub fn try_start_each<'a, O: ActivableOwner + ?Sized>(
    &mut self,
    infos: impl IntoIterator<Item = &'a ActivableInfo>,
    owner: &O,
  ) -> Vec<ActivableId> {
    infos
      .into_iter()
      .filter(|info| self.try_start_activation(info, owner))
      .map(|info| info.id.clone())
      .collect()
  }

  pub fn try_finalize_each<'a, O: ActivableOwner + ?Sized>(
    &mut self,
    infos: impl IntoIterator<Item = &'a ActivableInfo>,
    owner: &O,
  ) -> Vec<ActivableId> {
    infos
      .into_iter()
      .filter(|info| self.try_finalize(info, owner))
      .map(|info| info.id.clone())
      .collect()
  }

  pub fn try_adjust_each<'a, O: ActivableOwner + ?Sized>(
    &mut self,
    infos: impl IntoIterator<Item = &'a ActivableInfo>,
    owner: &O,
  ) -> Vec<ActivableId> {
    infos
      .into_iter()
      .filter(|info| self.try_adjust_activation(info, owner))
      .map(|info| info.id.clone())
      .collect()
  }

  /// End every ongoing activation among `infos`; returns the ids ended.
  pub fn force_end_each<'a, O: ActivableOwner + ?Sized>(
    &mut self,
    infos: impl IntoIterator<Item = &'a ActivableInfo>,
    owner: &O,
    skip_cooldown: bool,
  ) -> Vec<ActivableId> {
    let now = owner.current_time();
    infos
      .into_iter()
      .filter(|info| {
        let ongoing = self.has_ongoing_activation(info, now);
        self.force_end_activation(info, owner, skip_cooldown);
        ongoing
      })
      .map(|info| info.id.clone())
      .collect()
  }

  // ── Phase queries ─────────────────────────────────────────────────────

  pub fn has_ongoing_activation(
    &self,
    info: &ActivableInfo,
    now: Timestamp,
  ) -> bool {
    self
      .states
      .get(&info.id)
      .is_some_and(|state| state.has_ongoing_activation(now))
  }

  pub fn is_active<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get(&info.id)
      .is_some_and(|state| state.is_active(info, owner))
  }

  pub fn is_in_cooldown(&self, info: &ActivableInfo, now: Timestamp) -> bool {
    self
      .states
      .get(&info.id)
      .is_some_and(|state| state.is_in_cooldown(now))
  }

  pub fn is_in_review<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    self
      .states
      .get(&info.id)
      .is_some_and(|state| state.is_in_review(info, owner))
  }

  /// Whether the owner is shown the next scheduled occasion ahead of time:
  /// its preview window covers now, nothing is running or in review, and an
  /// activation could start when the occasion opens.
  pub fn is_in_preview<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> bool {
    let state = self.states.get(&info.id);
    if let Some(phase) = state.and_then(ActivableState::debug_phase) {
      return phase == DebugPhase::Preview;
    }
    let Some(occasion) = upcoming_occasion(info, owner) else {
      return false;
    };
    let now = owner.current_time();
    if !occasion.is_previewed_at(now) {
      return false;
    }

    let next_start = occasion.enabled_range.start;
    match state {
      Some(state) => {
        !state.has_ongoing_activation(now)
          && !state.is_in_review(info, owner)
          && state.can_start_activation_at(info, owner, next_start)
      }
      None => info.params.conditions_are_fulfilled_at(owner, next_start),
    }
  }

  /// The phase to present to the owner, in priority order: debug override,
  /// active (or ending soon), preview, review, tentative.
  pub fn try_get_visible_status<O: ActivableOwner + ?Sized>(
    &self,
    info: &ActivableInfo,
    owner: &O,
  ) -> Option<VisibleStatus> {
    let state = self.states.get(&info.id);
    if let Some(state) = state
      && let Some(phase) = state.debug_phase()
    {
      return debug_visible_status(info, owner, state, phase);
    }

    let now = owner.current_time();
    if let Some(state) = state
      && state.is_active(info, owner)
    {
      return active_status(info, state).map(|status| {
        if status.ending_soon_starts_at.is_some_and(|t| now >= t) {
          VisibleStatus::EndingSoon(status)
        } else {
          VisibleStatus::Active(status)
        }
      });
    }

    if self.is_in_preview(info, owner) {
      return Some(VisibleStatus::InPreview {
        enabled_range: upcoming_occasion(info, owner).map(|o| o.enabled_range),
      });
    }

    if let Some(state) = state
      && state.is_in_review(info, owner)
      && let Some(ended_at) = state.latest_activation().and_then(|a| a.end_at)
    {
      return Some(VisibleStatus::InReview {
        ended_at,
        visibility_ends_at: state.visibility_ends_at(info),
      });
    }

    if self.can_start_activation(info, owner) {
      return Some(VisibleStatus::Tentative);
    }
    None
  }

  // ── Debug override ────────────────────────────────────────────────────

  /// Put an item into `phase` by hand, or hand it back to its schedule with
  /// `None`. The latest activation is rewritten so that it stays consistent
  /// with the forced phase.
  pub fn debug_force_set_phase<O: ActivableOwner + ?Sized>(
    &mut self,
    info: &ActivableInfo,
    owner: &O,
    phase: Option<DebugPhase>,
  ) {
    let Some(phase) = phase else {
      if let Some(state) = self.states.get_mut(&info.id) {
        state.clear_debug_phase(info, owner);
        log_debug_phase(info, owner, None);
      }
      return;
    };

    let now = owner.current_time();
    let state = self.get_or_create_state(info);
    match phase {
      DebugPhase::Preview => state.force_end_activation(info, owner, true),
      DebugPhase::Active | DebugPhase::EndingSoon => {
        let reuse = state.debug_phase().is_some_and(DebugPhase::is_active)
          && state.has_ongoing_activation(now);
        if !reuse {
          state.force_end_activation(info, owner, true);
          state.finalize_latest(info, owner);
          state.start_endless_activation(info, owner);
        }
      }
      DebugPhase::Review | DebugPhase::Inactive => {
        if state.latest_activation().is_none() {
          state.start_endless_activation(info, owner);
        }
        state.force_end_activation(info, owner, true);
      }
    }
    state.set_debug_phase(Some(phase));
    log_debug_phase(info, owner, Some(phase));
  }

  // ── Reconciliation ────────────────────────────────────────────────────

  /// Move states whose config item no longer resolves into quarantine, and
  /// quarantined states whose item resolves again back into the live map.
  ///
  /// A live state always wins over a quarantined one with the same id.
  pub fn organize_by_validity<R: ConfigResolver + ?Sized>(
    &mut self,
    resolver: &R,
  ) -> Reconciliation {
    let mut report = Reconciliation::default();

    let orphaned: Vec<ActivableId> = self
      .states
      .keys()
      .filter(|id| resolver.resolve(id).is_none())
      .cloned()
      .collect();
    for id in orphaned {
      if let Some(state) = self.states.remove(&id) {
        tracing::warn!(%id, "activable config missing, quarantining state");
        self.erroneous_states.insert(id.clone(), state);
        report.quarantined.push(id);
      }
    }

    let restorable: Vec<ActivableId> = self
      .erroneous_states
      .keys()
      .filter(|id| resolver.resolve(id).is_some())
      .cloned()
      .collect();
    for id in restorable {
      let Some(state) = self.erroneous_states.remove(&id) else {
        continue;
      };
      match self.states.entry(id.clone()) {
        Entry::Vacant(entry) => {
          tracing::warn!(%id, "activable config restored, reviving state");
          entry.insert(state);
          report.restored.push(id);
        }
        Entry::Occupied(_) => {
          tracing::warn!(%id, "dropping quarantined duplicate of live state");
        }
      }
    }

    report
  }
}

fn upcoming_occasion<O: ActivableOwner + ?Sized>(
  info: &ActivableInfo,
  owner: &O,
) -> Option<ScheduleOccasion> {
  info
    .params
    .schedule
    .as_ref()?
    .current_or_next_enabled_occasion(owner.local_time())
}

fn active_status(
  info: &ActivableInfo,
  state: &ActivableState,
) -> Option<ActiveStatus> {
  let activation = state.latest_activation()?;
  Some(ActiveStatus {
    started_at:            activation.started_at,
    ends_at:               activation.end_at,
    ending_soon_starts_at: state.ending_soon_starts_at(info),
    visibility_ends_at:    state.visibility_ends_at(info),
  })
}

fn debug_visible_status<O: ActivableOwner + ?Sized>(
  info: &ActivableInfo,
  owner: &O,
  state: &ActivableState,
  phase: DebugPhase,
) -> Option<VisibleStatus> {
  match phase {
    DebugPhase::Preview => Some(VisibleStatus::InPreview {
      enabled_range: upcoming_occasion(info, owner).map(|o| o.enabled_range),
    }),
    DebugPhase::Active => active_status(info, state).map(VisibleStatus::Active),
    DebugPhase::EndingSoon => {
      active_status(info, state).map(VisibleStatus::EndingSoon)
    }
    DebugPhase::Review => Some(VisibleStatus::InReview {
      ended_at:           state
        .latest_activation()
        .and_then(|a| a.end_at)
        .unwrap_or_else(|| owner.current_time()),
      visibility_ends_at: None,
    }),
    DebugPhase::Inactive => None,
  }
}

fn log_debug_phase<O: ActivableOwner + ?Sized>(
  info: &ActivableInfo,
  owner: &O,
  phase: Option<DebugPhase>,
) {
  let key = info.key();
  tracing::debug!(%key, ?phase, "debug phase set");
  owner.log(SimulationLogEntry::DebugPhaseSet { key, phase });
}

// ─── OwnerActivables ─────────────────────────────────────────────────────────

/// Every activable set of one owner, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerActivables {
  sets: BTreeMap<KindId, ActivableSet>,
}

impl OwnerActivables {
  pub fn new() -> Self { Self::default() }

  /// Load a persisted snapshot. Call [`Self::organize_by_validity`]
  /// afterwards; the snapshot may predate the current config.
  pub fn from_json(json: &str) -> Result<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn set(&self, kind: &KindId) -> Option<&ActivableSet> {
    self.sets.get(kind)
  }

  /// The set for `kind`, created empty if the owner has none yet.
  pub fn set_mut(&mut self, kind: &KindId) -> &mut ActivableSet {
    self.sets.entry(kind.clone()).or_default()
  }

  pub fn sets(&self) -> impl Iterator<Item = (&KindId, &ActivableSet)> {
    self.sets.iter()
  }

  /// Reconcile every set against `config`. Sets of kinds missing from the
  /// config have all their states quarantined.
  pub fn organize_by_validity(
    &mut self,
    config: &ActivableConfig,
  ) -> BTreeMap<KindId, Reconciliation> {
    self
      .sets
      .iter_mut()
      .map(|(kind, set)| {
        let report = match config.library(kind) {
          Some(library) => set.organize_by_validity(library),
          None => set.organize_by_validity(&ActivableLibrary::empty(kind.clone())),
        };
        (kind.clone(), report)
      })
      .filter(|(_, report)| !report.is_empty())
      .collect()
  }

  /// Adjust every live state to `config`; returns the items that changed.
  pub fn try_adjust_all<O: ActivableOwner + ?Sized>(
    &mut self,
    config: &ActivableConfig,
    owner: &O,
  ) -> Vec<ActivableKey> {
    let mut adjusted = Vec::new();
    for (kind, set) in &mut self.sets {
      let Some(library) = config.library(kind) else {
        continue;
      };
      let infos = set
        .states
        .keys()
        .filter_map(|id| library.get(id))
        .collect::<Vec<_>>();
      adjusted.extend(
        set
          .try_adjust_each(infos, owner)
          .into_iter()
          .map(|id| ActivableKey { kind: kind.clone(), id }),
      );
    }
    adjusted
  }
}
