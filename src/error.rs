// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use thiserror::Error;

use crate::component::ComponentId;
use crate::entity::Entity;

/// ECS error type
///
/// Registry and builder errors are programmer errors: they are returned so the
/// caller can propagate them, never defaulted. Lookups that routinely miss
/// (a dead entity, a missing component) return `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcsError {
    /// A Rust type was used as a component before being registered
    #[error("component type `{type_name}` was never registered")]
    UnregisteredType { type_name: &'static str },

    /// A component id that the registry never issued
    #[error("unknown component id {0}")]
    UnknownComponentId(ComponentId),

    /// Entity is dead or was never created
    #[error("entity {0} not found")]
    EntityNotFound(Entity),

    /// `set`/`build` called on a builder without `create_entity`
    #[error("entity builder used before create_entity()")]
    BuilderNotArmed,

    /// A mutable chunk query named the same component twice
    #[error("component {component} requested more than once in a mutable query")]
    AliasedQuery { component: ComponentId },

    /// Column type tag does not match the requested Rust type
    #[error("column {component} does not store `{expected}`")]
    TypeMismatch {
        component: ComponentId,
        expected: &'static str,
    },

    /// Storage layout may only change while an archetype holds no entities
    #[error("archetype storage cannot be initialized after entities were added")]
    ArchetypeNotEmpty,

    /// Configured archetype ceiling reached
    #[error("archetype limit exceeded ({limit})")]
    ArchetypeLimitExceeded { limit: usize },

    /// The 32-bit entity id space is used up
    #[error("entity id space exhausted")]
    EntityIdsExhausted,

    /// Invalid or unparsable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
