//! Kind behaviours the simulator can attach to registered kinds.

use activable_core::{ActivableBehavior, ActivableInfo, ActivableState, time::Timestamp};

/// Holds back a new activation until the owner has claimed (finalized) the
/// previous one, as offers with a reward screen do.
pub struct FinalizeBeforeRestart;

impl ActivableBehavior for FinalizeBeforeRestart {
  fn can_start_activation(
    &self,
    _info: &ActivableInfo,
    state: &ActivableState,
    _at: Timestamp,
  ) -> bool {
    state.latest_activation().is_none_or(|a| a.is_finalized)
  }

  fn on_finalize(&self, info: &ActivableInfo, state: &ActivableState) {
    tracing::info!(
      key = %info.key(),
      num_finalized = state.num_finalized(),
      "rewards claimed"
    );
  }
}
