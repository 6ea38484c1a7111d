//! The startup table of activable kinds.
//!
//! Every kind the game uses is registered once, by ordinary code, before any
//! config is loaded. Config items naming an unregistered kind are rejected,
//! and kind-specific behaviour is looked up here by owners.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{Error, Result, info::KindId, owner::ActivableBehavior};

/// One registered kind of activable.
#[derive(Clone)]
pub struct KindRegistration {
  pub kind:         KindId,
  pub display_name: String,
  behavior:         Option<Arc<dyn ActivableBehavior + Send + Sync>>,
}

impl KindRegistration {
  pub fn new(kind: impl Into<KindId>, display_name: impl Into<String>) -> Self {
    Self {
      kind:         kind.into(),
      display_name: display_name.into(),
      behavior:     None,
    }
  }

  pub fn with_behavior(
    mut self,
    behavior: Arc<dyn ActivableBehavior + Send + Sync>,
  ) -> Self {
    self.behavior = Some(behavior);
    self
  }

  pub fn behavior(&self) -> Option<&dyn ActivableBehavior> {
    self.behavior.as_deref().map(|b| b as &dyn ActivableBehavior)
  }
}

impl fmt::Debug for KindRegistration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KindRegistration")
      .field("kind", &self.kind)
      .field("display_name", &self.display_name)
      .field("has_behavior", &self.behavior.is_some())
      .finish()
  }
}

/// Kind id → registration.
#[derive(Debug, Clone, Default)]
pub struct ActivableRegistry {
  kinds: BTreeMap<KindId, KindRegistration>,
}

impl ActivableRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn register(&mut self, registration: KindRegistration) -> Result<()> {
    if self.kinds.contains_key(&registration.kind) {
      return Err(Error::DuplicateKind(registration.kind));
    }
    tracing::debug!(kind = %registration.kind, "registered activable kind");
    self.kinds.insert(registration.kind.clone(), registration);
    Ok(())
  }

  pub fn get(&self, kind: &KindId) -> Option<&KindRegistration> {
    self.kinds.get(kind)
  }

  pub fn kinds(&self) -> impl Iterator<Item = &KindId> { self.kinds.keys() }

  pub fn behavior(&self, kind: &KindId) -> Option<&dyn ActivableBehavior> {
    self.kinds.get(kind)?.behavior()
  }
}
