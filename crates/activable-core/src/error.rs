//! Error types for `activable-core`.
//!
//! Only config value objects fail. Gameplay operations report a refused
//! transition through their `bool` / `Option` return instead.

use thiserror::Error;

use crate::info::{ActivableId, KindId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("{field} must not be negative")]
  NegativeDuration { field: &'static str },

  #[error("{field} exceeds the longest supported duration")]
  DurationOutOfRange { field: &'static str },

  #[error("invalid schedule: {0}")]
  InvalidSchedule(String),

  #[error("duplicate activable {kind}/{id}")]
  DuplicateActivable { kind: KindId, id: ActivableId },

  #[error("activable kind registered twice: {0}")]
  DuplicateKind(KindId),

  #[error("activable kind is not registered: {0}")]
  UnknownKind(KindId),

  #[error("activable {id} belongs to kind {found}, expected {expected}")]
  KindMismatch {
    id:       ActivableId,
    expected: KindId,
    found:    KindId,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
