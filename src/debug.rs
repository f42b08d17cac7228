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

use crate::archetype::ArchetypeId;
use crate::entity::Entity;
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Get total entity count
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    /// One row per archetype, including empty ones
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        let registry = world.registry();

        let infos = world
            .archetypes()
            .iter()
            .map(|archetype| ArchetypeInfo {
                id: archetype.id(),
                signature: archetype.signature().key(),
                components: archetype
                    .component_ids()
                    .iter()
                    .map(|id| match registry.name_of(*id) {
                        Ok(name) => name.to_string(),
                        Err(_) => id.to_string(),
                    })
                    .collect(),
                entity_count: archetype.len(),
                component_bytes: archetype.columns().iter().map(|col| col.byte_len()).sum(),
            })
            .collect();
        infos
    }

    /// Emit the world summary at info level
    pub fn log_summary(world: &World) {
        tracing::info!(
            entities = Self::entity_count(world),
            archetypes = world.archetype_count(),
            "world summary"
        );
        for info in Self::archetype_summary(world) {
            tracing::info!(
                archetype = info.id,
                signature = %info.signature,
                components = ?info.components,
                entities = info.entity_count,
                bytes = info.component_bytes,
                "archetype"
            );
        }
    }

    /// Human readable description of one entity, `None` if it is dead
    pub fn describe_entity(world: &World, entity: Entity) -> Option<String> {
        let location = world.location(entity)?;
        let archetype = world.archetype(location.archetype_id)?;
        let registry = world.registry();
        let names: Vec<&str> = archetype
            .component_ids()
            .iter()
            .filter_map(|id| registry.name_of(*id).ok())
            .collect();

        Some(format!(
            "entity {entity}: archetype {} slot {} [{}]",
            location.archetype_id,
            location.slot,
            names.join(", ")
        ))
    }

    /// Verify the density and membership invariants, logging on failure
    pub fn check_integrity(world: &World) -> bool {
        let ok = world.is_consistent();
        if !ok {
            tracing::error!("world storage is inconsistent");
        }
        ok
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug)]
pub struct ArchetypeInfo {
    pub id: ArchetypeId,
    pub signature: String,
    pub components: Vec<String>,
    pub entity_count: usize,
    pub component_bytes: usize,
}
