//! Lifecycle engine for time-boxed, conditionally gated game features.
//!
//! An *activable* (an event, an offer, …) is configured once through an
//! [`ActivableInfo`] and tracked per owner through an [`ActivableState`]. The
//! state moves through preview, active, review and cooldown phases driven by
//! the owner's clock, the item's schedule and its limits.
//!
//! This crate is pure and synchronous. It never reads a clock, never blocks,
//! and holds no shared state; every operation takes the current time from an
//! [`ActivableOwner`].

pub mod activation;
pub mod cooldown;
pub mod error;
pub mod info;
pub mod lifetime;
pub mod owner;
pub mod params;
pub mod registry;
pub mod schedule;
pub mod set;
pub mod state;
pub mod status;
pub mod time;

pub use error::{Error, Result};
pub use info::{
  ActivableConfig, ActivableId, ActivableInfo, ActivableKey, ActivableLibrary,
  ConfigResolver, KindId,
};
pub use owner::{ActivableBehavior, ActivableListener, ActivableOwner};
pub use set::{ActivableSet, OwnerActivables};
pub use state::ActivableState;
pub use status::{DebugPhase, VisibleStatus};

#[cfg(test)]
mod test_support;
