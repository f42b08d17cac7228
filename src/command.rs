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

//! Deferred structural changes
//!
//! Systems queue creations, destructions and component changes here while
//! they iterate; the buffer is applied once the pass is over, so no archetype
//! changes shape underneath a running iteration.

#[cfg(feature = "profiling")]
use tracing::info_span;

use smallvec::SmallVec;

use crate::component::{Component, ComponentId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()>>;

/// Deferred command for world mutations
pub enum Command {
    /// Create an entity with zero-filled components
    CreateEntity(SmallVec<[ComponentId; 8]>),

    /// Destroy entity (no-op if already dead)
    DestroyEntity(Entity),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::CreateEntity(ids) => f.debug_tuple("CreateEntity").field(ids).finish(),
            Command::DestroyEntity(e) => f.debug_tuple("DestroyEntity").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
#[derive(Default, Debug)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Queue creation of an entity in the archetype for `components`
    pub fn create_entity(&mut self, components: &[ComponentId]) {
        self.commands
            .push(Command::CreateEntity(SmallVec::from_slice(components)));
    }

    /// Queue a closure that creates and populates entities
    pub fn spawn<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + 'static,
    {
        self.add(f);
    }

    /// Queue entity destruction
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.commands.push(Command::DestroyEntity(entity));
    }

    /// Queue a custom world mutation
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    /// Queue add component command.
    ///
    /// Skipped if the entity is dead by the time the buffer is applied.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        self.add(move |world| match world.add_component(entity, component) {
            Err(EcsError::EntityNotFound(_)) => {
                tracing::debug!(%entity, "deferred add_component skipped for dead entity");
                Ok(())
            }
            other => other,
        });
    }

    /// Queue remove component command
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.add(move |world| world.remove_component::<T>(entity));
    }

    /// Apply all commands to the world in queue order and clear the buffer.
    ///
    /// Stops at the first failing command; the rest are discarded.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("commands.apply", queued = self.commands.len()).entered();

        for command in self.commands.drain(..) {
            match command {
                Command::CreateEntity(ids) => {
                    world.create_entity(&ids)?;
                }
                Command::DestroyEntity(entity) => {
                    world.destroy_entity(entity);
                }
                Command::Custom(f) => {
                    f(world)?;
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
