//! Drives an [`OwnerActivables`] through a scenario's timeline.

use std::collections::BTreeMap;

use activable_core::{
  ActivableConfig, ActivableKey, ActivableSet, KindId, OwnerActivables,
  VisibleStatus, set::Reconciliation,
};
use anyhow::Context as _;

use crate::{
  owner::SimOwner,
  scenario::{Action, Step},
};

pub struct Simulation<'a> {
  config:     &'a ActivableConfig,
  owner:      SimOwner<'a>,
  activables: OwnerActivables,
}

impl<'a> Simulation<'a> {
  pub fn new(
    config: &'a ActivableConfig,
    owner: SimOwner<'a>,
    activables: OwnerActivables,
  ) -> Self {
    Self { config, owner, activables }
  }

  pub fn owner(&self) -> &SimOwner<'a> { &self.owner }

  pub fn activables(&self) -> &OwnerActivables { &self.activables }

  /// Quarantine or restore loaded states against the config, then bring the
  /// live ones in line with it.
  pub fn reconcile(
    &mut self,
  ) -> (BTreeMap<KindId, Reconciliation>, Vec<ActivableKey>) {
    let reports = self.activables.organize_by_validity(self.config);
    let adjusted = self.activables.try_adjust_all(self.config, &self.owner);
    (reports, adjusted)
  }

  /// Advance the clock to the step and apply it. Returns whether the action
  /// took effect.
  pub fn apply(&mut self, step: &Step) -> anyhow::Result<bool> {
    let key = step.key();
    let info = self
      .config
      .resolve(&key)
      .with_context(|| format!("step refers to unknown activable {key}"))?;

    self.owner.set_time(step.at);
    let owner = &self.owner;
    let set = self.activables.set_mut(&step.kind);

    let applied = match step.action {
      Action::Start => set.try_start_activation(info, owner),
      Action::ForceStart => {
        set.force_start_activation(info, owner);
        true
      }
      Action::Consume => set.try_consume(info, owner),
      Action::ForceConsume => {
        set.force_consume(info, owner);
        true
      }
      Action::End => {
        !set
          .force_end_each([info], owner, step.skip_cooldown)
          .is_empty()
      }
      Action::Adjust => set.try_adjust_activation(info, owner),
      Action::Finalize => set.try_finalize(info, owner),
      Action::Extend => set.try_extend_latest_activation(info, owner),
      Action::SoftFinalize => set.try_soft_finalize(info, owner),
      Action::DebugPhase => {
        set.debug_force_set_phase(info, owner, step.phase);
        true
      }
    };
    Ok(applied)
  }

  /// The visible status of every configured item, in config order.
  pub fn statuses(&self) -> Vec<(ActivableKey, Option<VisibleStatus>)> {
    let empty = ActivableSet::new();
    self
      .config
      .libraries()
      .flat_map(|library| library.iter())
      .map(|info| {
        let set = self.activables.set(&info.kind).unwrap_or(&empty);
        (info.key(), set.try_get_visible_status(info, &self.owner))
      })
      .collect()
  }
}
