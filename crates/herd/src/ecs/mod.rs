//! # Bitmask-Matched ECS
//!
//! Entities carry a component bitmask and a table of component instances.
//! Systems declare a [`Matcher`] over those bits, and the [`World`] keeps one
//! incrementally updated [`Group`] per distinct matcher so systems never scan
//! the whole entity set.
//!
//! ## Module Overview
//!
//! - [`bitmask`] — Growable `u64`-word component sets
//! - [`component`] — Registration, typed handles, per-type reuse pools
//! - [`entity`] — Monotonic entity ids and pooled records
//! - [`matcher`] — `all_of` / `any_of` / `exclude_of` / `only_of` rules
//! - [`group`] — Live matcher results plus enter/remove buffers
//! - [`world`] — Central container and change dispatch
//! - [`system`] — System trait, runners, and the root schedule

pub mod bitmask;
pub mod component;
pub mod entity;
pub mod group;
pub mod matcher;
pub mod system;
pub mod world;

pub use bitmask::Bitmask;
pub use component::{Component, ComponentId, ComponentKind, ComponentRegistry, ComponentType, Tag};
pub use entity::Entity;
pub use group::{EntitySet, Group, GroupId, GroupKind, ObserverId};
pub use matcher::{Matcher, Rule, RuleKind, all_of, any_of, exclude_of, only_of};
pub use system::{ExecuteVariant, Hooks, RootSystem, System, SystemGroup, SystemRunner};
#[cfg(feature = "diagnostics")]
pub use system::SystemTiming;
pub use world::World;
#[cfg(feature = "diagnostics")]
pub use world::EntityPoolStats;
