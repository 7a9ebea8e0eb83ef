//! World configuration.
//!
//! [`WorldConfig`] is passed to [`World::with_config`](crate::ecs::World::with_config).
//! All fields have sensible defaults, so most hosts just call
//! [`World::new`](crate::ecs::World::new).
//!
//! With the `serde` feature the config can be loaded from JSON:
//!
//! ```ignore
//! let config = WorldConfig::from_json(r#"{ "add_policy": "Replace" }"#)?;
//! let world = World::with_config(config);
//! ```

/// What [`World::add`](crate::ecs::World::add) does when the entity already
/// has the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddPolicy {
    /// Leave the existing instance in place and return it.
    #[default]
    Keep,
    /// Remove the existing instance (firing its removal) and attach a fresh one.
    Replace,
}

/// Tunables for a [`World`](crate::ecs::World).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Default policy for adding a component that is already present.
    pub add_policy: AddPolicy,
    /// Log a warning for redundant operations (re-adding under `Keep`,
    /// destroying a dead entity, removing from a dead entity).
    pub warn_on_redundant: bool,
    /// Number of entity records to pre-allocate in the pool.
    pub entity_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            add_policy: AddPolicy::Keep,
            warn_on_redundant: true,
            entity_capacity: 0,
        }
    }
}

impl WorldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_policy(mut self, policy: AddPolicy) -> Self {
        self.add_policy = policy;
        self
    }

    pub fn warn_on_redundant(mut self, warn: bool) -> Self {
        self.warn_on_redundant = warn;
        self
    }

    pub fn entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::error::EcsError::Config(e.to_string()))
    }
}
