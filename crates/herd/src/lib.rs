//! # Herd — A Reactive Entity-Component-System
//!
//! Herd stores per-entity component data, lets systems declare interest in
//! entities by component composition, and drives those systems once per
//! frame. Membership is tracked incrementally: adding or removing a component
//! re-checks only the touched entity against the groups that care.
//!
//! Start with `use herd::prelude::*`, register components on a
//! [`World`](ecs::World), add systems to a [`RootSystem`](ecs::RootSystem),
//! and call [`RootSystem::execute`](ecs::RootSystem::execute) every tick.
//!
//! Single-threaded by design: components need not be `Send` or `Sync`.

pub mod config;
pub mod ecs;
pub mod error;
pub mod prelude;
