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

//! Fluent entity construction
//!
//! ```ignore
//! let player = world
//!     .builder()
//!     .create_entity()?
//!     .set(Position { x: 0.0, y: 0.0 })?
//!     .set(Health(100))?
//!     .build()?;
//! ```

use crate::component::Component;
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Builds one entity at a time on top of [`World::add_component`]
#[derive(Debug)]
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    entity: Option<Entity>,
}

impl<'w> EntityBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world, entity: None }
    }

    /// Start a new entity with no components and arm the builder
    pub fn create_entity(&mut self) -> Result<&mut Self> {
        let entity = self.world.create_entity(&[])?;
        self.entity = Some(entity);
        Ok(self)
    }

    /// Add or overwrite `T` on the armed entity
    pub fn set<T: Component>(&mut self, value: T) -> Result<&mut Self> {
        let entity = self.entity.ok_or(EcsError::BuilderNotArmed)?;
        self.world.add_component(entity, value)?;
        Ok(self)
    }

    /// Finish the current entity and disarm the builder
    pub fn build(&mut self) -> Result<Entity> {
        self.entity.take().ok_or(EcsError::BuilderNotArmed)
    }

    pub fn is_armed(&self) -> bool {
        self.entity.is_some()
    }

    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }
}
