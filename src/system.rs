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

//! Per-entity systems
//!
//! A [`System`] names the components it requires and a callback. Each
//! `execute` visits every entity whose archetype carries all of them.

use std::fmt;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, Signature};
use crate::command::CommandBuffer;
use crate::component::{ComponentId, ComponentRegistry, ComponentSet};
use crate::entity::Entity;
use crate::error::Result;
use crate::world::World;

/// Callback run once per matching entity
pub type SystemCallback = Box<dyn FnMut(Entity, &mut World, &mut CommandBuffer) -> Result<()>>;

/// Required components plus the behaviour to run on each match
pub struct System {
    name: String,
    required: Signature,
    callback: SystemCallback,
    commands: CommandBuffer,
}

impl System {
    /// Required ids may be given in any order
    pub fn new<I, F>(name: impl Into<String>, required: I, callback: F) -> Self
    where
        I: IntoIterator<Item = ComponentId>,
        F: FnMut(Entity, &mut World, &mut CommandBuffer) -> Result<()> + 'static,
    {
        Self {
            name: name.into(),
            required: Signature::new(required),
            callback: Box::new(callback),
            commands: CommandBuffer::new(),
        }
    }

    /// Build the requirement from a tuple of component types
    pub fn for_components<Q, F>(registry: &ComponentRegistry, name: impl Into<String>, callback: F) -> Result<Self>
    where
        Q: ComponentSet,
        F: FnMut(Entity, &mut World, &mut CommandBuffer) -> Result<()> + 'static,
    {
        let ids = Q::component_ids(registry)?;
        Ok(Self::new(name, ids, callback))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &Signature {
        &self.required
    }

    pub fn matches(&self, archetype: &Archetype) -> bool {
        archetype.signature().is_superset_of(&self.required)
    }

    /// Run the callback for every matching entity, then apply queued commands.
    ///
    /// Matching entities are gathered before the first callback runs. An
    /// entity is skipped if an earlier callback destroyed it or moved it out
    /// of the required set; entities created during the pass are not visited.
    /// Returns the number of callback invocations.
    pub fn execute(&mut self, world: &mut World) -> Result<usize> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("system.execute", system = %self.name).entered();

        let targets: Vec<Entity> = world
            .archetypes()
            .iter()
            .filter(|archetype| self.matches(archetype))
            .flat_map(|archetype| archetype.entities().iter().copied())
            .collect();

        let mut visited = 0;
        for entity in targets {
            let still_matches = world
                .archetype_of(entity)
                .is_some_and(|archetype| self.matches(archetype));
            if !still_matches {
                continue;
            }
            if let Err(err) = (self.callback)(entity, world, &mut self.commands) {
                tracing::warn!(system = %self.name, %entity, error = %err, "system callback failed");
                self.commands.clear();
                return Err(err);
            }
            visited += 1;
        }

        self.commands.apply(world)?;
        tracing::trace!(system = %self.name, visited, "system executed");
        Ok(visited)
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("queued_commands", &self.commands.len())
            .finish()
    }
}
