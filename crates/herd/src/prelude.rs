//! Convenience re-exports — `use herd::prelude::*` for the common items.

pub use crate::config::{AddPolicy, WorldConfig};
pub use crate::ecs::{
    Component, ComponentId, ComponentType, Entity, GroupKind, Hooks, Matcher, RootSystem, System,
    SystemGroup, Tag, World, all_of, any_of, exclude_of, only_of,
};
pub use crate::error::{EcsError, Result};
