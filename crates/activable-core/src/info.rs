//! Config items and the libraries that resolve them by id.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  params::{ActivableParams, ExtensionParams},
  registry::ActivableRegistry,
};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Identifies a kind of activable, e.g. `"event"` or `"offer"`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KindId(pub String);

/// Identifies one activable within its kind.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActivableId(pub String);

impl fmt::Display for KindId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl fmt::Display for ActivableId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for KindId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<&str> for ActivableId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

/// Addresses an activable across kinds.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ActivableKey {
  pub kind: KindId,
  pub id:   ActivableId,
}

impl fmt::Display for ActivableKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.kind, self.id)
  }
}

// ─── ActivableInfo ───────────────────────────────────────────────────────────

/// One config item: an activable and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivableInfo {
  pub kind:         KindId,
  pub id:           ActivableId,
  #[serde(default)]
  pub display_name: String,
  pub params:       ActivableParams,
  /// Present when activations of this item can be extended from review.
  #[serde(default)]
  pub extension:    Option<ExtensionParams>,
}

impl ActivableInfo {
  pub fn new(
    kind: impl Into<KindId>,
    id: impl Into<ActivableId>,
    params: ActivableParams,
  ) -> Self {
    let id = id.into();
    Self {
      kind: kind.into(),
      display_name: id.0.clone(),
      id,
      params,
      extension: None,
    }
  }

  pub fn with_extension(mut self, extension: ExtensionParams) -> Self {
    self.extension = Some(extension);
    self
  }

  pub fn key(&self) -> ActivableKey {
    ActivableKey { kind: self.kind.clone(), id: self.id.clone() }
  }

  pub fn validate(&self) -> Result<()> {
    self.params.validate()?;
    if let Some(extension) = &self.extension {
      extension.validate()?;
    }
    Ok(())
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Resolves an activable id to its current config item.
pub trait ConfigResolver {
  fn resolve(&self, id: &ActivableId) -> Option<&ActivableInfo>;
}

impl ConfigResolver for BTreeMap<ActivableId, ActivableInfo> {
  fn resolve(&self, id: &ActivableId) -> Option<&ActivableInfo> { self.get(id) }
}

/// Validated config items of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivableLibrary {
  kind:  KindId,
  items: BTreeMap<ActivableId, ActivableInfo>,
}

impl ActivableLibrary {
  pub fn new(
    kind: KindId,
    infos: impl IntoIterator<Item = ActivableInfo>,
  ) -> Result<Self> {
    let mut items = BTreeMap::new();
    for info in infos {
      info.validate()?;
      if info.kind != kind {
        return Err(Error::KindMismatch {
          id:       info.id,
          expected: kind,
          found:    info.kind,
        });
      }
      if items.contains_key(&info.id) {
        return Err(Error::DuplicateActivable { kind, id: info.id });
      }
      items.insert(info.id.clone(), info);
    }
    Ok(Self { kind, items })
  }

  pub fn empty(kind: KindId) -> Self { Self { kind, items: BTreeMap::new() } }

  pub fn kind(&self) -> &KindId { &self.kind }

  pub fn get(&self, id: &ActivableId) -> Option<&ActivableInfo> {
    self.items.get(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ActivableInfo> {
    self.items.values()
  }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

impl ConfigResolver for ActivableLibrary {
  fn resolve(&self, id: &ActivableId) -> Option<&ActivableInfo> { self.get(id) }
}

/// The full activable config: one library per registered kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivableConfig {
  libraries: BTreeMap<KindId, ActivableLibrary>,
}

impl ActivableConfig {
  /// Group `infos` by kind. Every kind must be registered; registered kinds
  /// without items get an empty library.
  pub fn from_infos(
    registry: &ActivableRegistry,
    infos: impl IntoIterator<Item = ActivableInfo>,
  ) -> Result<Self> {
    let mut grouped: BTreeMap<KindId, Vec<ActivableInfo>> = registry
      .kinds()
      .map(|kind| (kind.clone(), Vec::new()))
      .collect();
    for info in infos {
      match grouped.get_mut(&info.kind) {
        Some(group) => group.push(info),
        None => return Err(Error::UnknownKind(info.kind)),
      }
    }

    let libraries = grouped
      .into_iter()
      .map(|(kind, infos)| {
        ActivableLibrary::new(kind.clone(), infos).map(|lib| (kind, lib))
      })
      .collect::<Result<_>>()?;
    Ok(Self { libraries })
  }

  pub fn library(&self, kind: &KindId) -> Option<&ActivableLibrary> {
    self.libraries.get(kind)
  }

  pub fn libraries(&self) -> impl Iterator<Item = &ActivableLibrary> {
    self.libraries.values()
  }

  pub fn resolve(&self, key: &ActivableKey) -> Option<&ActivableInfo> {
    self.libraries.get(&key.kind)?.get(&key.id)
  }
}
