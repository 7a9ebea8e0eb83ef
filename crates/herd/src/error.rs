//! Error types.
//!
//! Only setup-time mistakes (bad registrations, matchers naming unknown
//! components) and misuse of a specific call surface here. Redundant runtime
//! operations, like destroying an entity twice, are logged with `log::warn!`
//! and degrade to a no-op instead.

use thiserror::Error;

use crate::ecs::{ComponentId, Entity};

/// Errors produced by the ECS.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: String },

    #[error("type of component '{name}' is already registered as '{existing}'")]
    DuplicateComponentType { name: String, existing: String },

    #[error("component id {id} is not registered")]
    UnregisteredComponent { id: ComponentId },

    #[error("matcher has no rules")]
    EmptyMatcher,

    #[error("component '{name}' has no factory; insert an instance instead")]
    NotConstructible { name: String },

    #[error("component '{name}' is a tag and carries no data (or a data component was used as a tag)")]
    WrongKind { name: String },

    #[error("handle type does not match the stored type of component '{name}'")]
    TypeMismatch { name: String },

    #[error("entity {entity} is not alive")]
    DeadEntity { entity: Entity },

    #[error("invalid world configuration: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EcsError>;
