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

//! World: central entity and archetype storage

use std::ptr::NonNull;

use ahash::AHashMap;
use parking_lot::RwLockReadGuard;
use rustc_hash::FxHashMap;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, Signature};
use crate::builder::EntityBuilder;
use crate::command::CommandBuffer;
use crate::component::{Component, ComponentId, ComponentRegistry, SharedRegistry};
use crate::config::WorldConfig;
use crate::entity::{Entity, EntityAllocator, EntityLocation};
use crate::error::{EcsError, Result};
use crate::query::{self, Chunk, ChunkMut, ChunkQuery};
use crate::system::System;

/// Archetype of entities with no components
const EMPTY_ARCHETYPE: ArchetypeId = 0;

/// Central ECS world
///
/// Owns every archetype and knows which archetype each live entity is in.
/// Adding or removing a component moves the entity to the archetype of its
/// new signature ("migration").
pub struct World {
    registry: SharedRegistry,
    config: WorldConfig,

    allocator: EntityAllocator,

    /// Live entity -> archetype holding it
    entity_index: FxHashMap<Entity, ArchetypeId>,

    /// All archetypes in the world
    archetypes: Vec<Archetype>,

    /// Canonical signature key ("1;5;7;") -> archetype
    archetype_index: AHashMap<String, ArchetypeId>,

    /// Cache for archetype transitions when adding/removing components
    transitions: AHashMap<(ArchetypeId, ComponentId, bool), ArchetypeId>,
}

impl World {
    /// Create a world over a shared registry with default configuration
    pub fn new(registry: SharedRegistry) -> Self {
        Self::build(registry, WorldConfig::default())
    }

    /// Create a world that owns `registry`
    pub fn from_registry(registry: ComponentRegistry) -> Self {
        Self::new(registry.into_shared())
    }

    pub fn with_config(registry: SharedRegistry, config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: SharedRegistry, config: WorldConfig) -> Self {
        let mut world = Self {
            registry,
            allocator: EntityAllocator::new(),
            entity_index: FxHashMap::default(),
            archetypes: Vec::with_capacity(config.initial_archetype_capacity),
            archetype_index: AHashMap::with_capacity(config.initial_archetype_capacity),
            transitions: AHashMap::with_capacity(config.initial_archetype_capacity * 2),
            config,
        };
        world.entity_index.reserve(world.config.initial_entity_capacity);
        world.bootstrap_empty_archetype();
        world
    }

    // Always at index 0 so empty entities never need a lookup
    fn bootstrap_empty_archetype(&mut self) {
        let empty = Signature::empty();
        self.archetype_index.insert(empty.key(), EMPTY_ARCHETYPE);
        self.archetypes.push(Archetype::new(EMPTY_ARCHETYPE, empty));
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read access to the component registry.
    ///
    /// Holds the shared registry's read lock until dropped; registering a
    /// component through another handle of the same [`SharedRegistry`] on
    /// this thread while the guard is alive deadlocks.
    pub fn registry(&self) -> RwLockReadGuard<'_, ComponentRegistry> {
        self.registry.read()
    }

    pub fn shared_registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Register `T` in this world's registry (idempotent)
    ///
    /// Takes `&mut self` so no [`registry`](Self::registry) guard of this
    /// world can still be alive.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentId {
        self.registry.write().register::<T>(name)
    }

    /// Id of a registered component type
    pub fn component_id<T: Component>(&self) -> Result<ComponentId> {
        self.registry.read().id_of::<T>()
    }

    /// Create an entity in the archetype for exactly `components`.
    ///
    /// Component values start zero-filled; follow up with `add_component`
    /// to give them real values.
    pub fn create_entity(&mut self, components: &[ComponentId]) -> Result<Entity> {
        let signature = Signature::new(components.iter().copied());
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.create_entity", components = signature.len()).entered();

        let archetype_id = self.get_or_create_archetype(&signature)?;
        let entity = self.allocator.allocate()?;
        self.archetypes[archetype_id].add_entity(entity);
        self.entity_index.insert(entity, archetype_id);

        tracing::trace!(%entity, signature = %signature, "created entity");
        Ok(entity)
    }

    /// Destroy `entity`; returns false if it was already dead
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        let Some(archetype_id) = self.entity_index.remove(&entity) else {
            return false;
        };
        self.archetypes[archetype_id].remove_entity(entity);
        tracing::trace!(%entity, "destroyed entity");
        true
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entity_index.contains_key(&entity)
    }

    /// Add (or overwrite) component `T` on `entity`.
    ///
    /// Overwriting happens in place. A new component type moves the entity
    /// to the archetype of its extended signature; every component it already
    /// had keeps its value.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let id = self.component_id::<T>()?;
        let current = *self
            .entity_index
            .get(&entity)
            .ok_or(EcsError::EntityNotFound(entity))?;

        if self.archetypes[current].has_component(id) {
            return self.write_component(current, entity, id, value);
        }

        let target = self.transition(current, id, true)?;
        self.migrate(entity, current, target)?;
        self.write_component(target, entity, id, value)
    }

    /// Remove component `T` from `entity`.
    ///
    /// No-op for dead entities and entities that lack `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<()> {
        let id = self.component_id::<T>()?;
        let Some(&current) = self.entity_index.get(&entity) else {
            return Ok(());
        };
        if !self.archetypes[current].has_component(id) {
            return Ok(());
        }

        let target = self.transition(current, id, false)?;
        self.migrate(entity, current, target)?;
        Ok(())
    }

    /// Get immutable reference to a component on an entity
    ///
    /// `Ok(None)` for dead entities and entities without `T`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<Option<&T>> {
        let id = self.component_id::<T>()?;
        Ok(self
            .entity_index
            .get(&entity)
            .and_then(|&archetype_id| self.archetypes[archetype_id].get::<T>(entity, id)))
    }

    /// Get mutable reference to a component on an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<Option<&mut T>> {
        let id = self.component_id::<T>()?;
        Ok(match self.entity_index.get(&entity) {
            Some(&archetype_id) => self.archetypes[archetype_id].get_mut::<T>(entity, id),
            None => None,
        })
    }

    /// Strict lookup: `EntityNotFound` when the entity is dead or lacks `T`
    pub fn component<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.get_component::<T>(entity)?
            .ok_or(EcsError::EntityNotFound(entity))
    }

    /// Strict mutable lookup, see [`component`](Self::component)
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        self.get_component_mut::<T>(entity)?
            .ok_or(EcsError::EntityNotFound(entity))
    }

    /// Check if entity has a specific component
    pub fn has_component<T: Component>(&self, entity: Entity) -> Result<bool> {
        let id = self.component_id::<T>()?;
        Ok(self.has_component_id(entity, id))
    }

    pub fn has_component_id(&self, entity: Entity, id: ComponentId) -> bool {
        self.archetype_of(entity)
            .is_some_and(|archetype| archetype.has_component(id))
    }

    /// Raw bytes of one component, for callers working with ids only.
    ///
    /// Valid until the next structural change to the entity's archetype.
    pub fn component_data(&self, entity: Entity, id: ComponentId) -> Option<NonNull<u8>> {
        self.archetype_of(entity)?.component_data(entity, id)
    }

    /// Every live entity (archetype order, then slot order)
    pub fn all_entities(&self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(self.entity_index.len());
        for archetype in &self.archetypes {
            entities.extend_from_slice(archetype.entities());
        }
        entities
    }

    pub fn entity_count(&self) -> usize {
        self.entity_index.len()
    }

    /// Get entity location
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let archetype_id = *self.entity_index.get(&entity)?;
        let slot = self.archetypes[archetype_id].slot_of(entity)?;
        Some(EntityLocation { archetype_id, slot })
    }

    pub fn archetype_of(&self, entity: Entity) -> Option<&Archetype> {
        let archetype_id = *self.entity_index.get(&entity)?;
        self.archetypes.get(archetype_id)
    }

    /// Get archetype by ID
    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Archetype stored under a signature, if it exists yet
    pub fn archetype_for(&self, signature: &Signature) -> Option<&Archetype> {
        let id = *self.archetype_index.get(&signature.key())?;
        self.archetypes.get(id)
    }

    /// Get all archetypes
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Fluent entity construction
    pub fn builder(&mut self) -> EntityBuilder<'_> {
        EntityBuilder::new(self)
    }

    /// Run every system once, in order (one frame)
    pub fn progress(&mut self, systems: &mut [System]) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.progress", systems = systems.len()).entered();

        for system in systems.iter_mut() {
            system.execute(self)?;
        }
        Ok(())
    }

    /// Apply and drain a command buffer
    pub fn flush_commands(&mut self, buffer: &mut CommandBuffer) -> Result<()> {
        buffer.apply(self)
    }

    /// Chunked read-only query; returns the number of entities visited
    pub fn query_chunks<Q, F>(&self, f: F) -> Result<usize>
    where
        Q: ChunkQuery,
        F: FnMut(Chunk<'_, Q>),
    {
        query::query_chunks::<Q, F>(self, f)
    }

    /// Chunked mutable query; returns the number of entities visited
    pub fn query_chunks_mut<Q, F>(&mut self, f: F) -> Result<usize>
    where
        Q: ChunkQuery,
        F: FnMut(ChunkMut<'_, Q>),
    {
        query::query_chunks_mut::<Q, F>(self, f)
    }

    /// Destroy every entity and archetype; the registry is kept.
    ///
    /// Entity ids keep counting up, so ids from before the reset stay dead.
    pub fn clear(&mut self) {
        self.entity_index.clear();
        self.archetypes.clear();
        self.archetype_index.clear();
        self.transitions.clear();
        self.bootstrap_empty_archetype();
        tracing::debug!("world cleared");
    }

    /// Entity index and every archetype agree (density + membership)
    pub fn is_consistent(&self) -> bool {
        let stored: usize = self.archetypes.iter().map(Archetype::len).sum();
        stored == self.entity_index.len()
            && self.archetypes.iter().all(Archetype::is_consistent)
            && self
                .entity_index
                .iter()
                .all(|(entity, &id)| self.archetypes.get(id).is_some_and(|a| a.contains(*entity)))
    }

    /// Get memory usage statistics
    pub fn memory_stats(&self) -> MemoryStats {
        let component_memory = self
            .archetypes
            .iter()
            .flat_map(|archetype| archetype.columns())
            .map(|column| column.byte_len())
            .sum();
        let entity_index_memory =
            self.entity_index.capacity() * std::mem::size_of::<(Entity, ArchetypeId)>();

        MemoryStats {
            entity_index_memory,
            component_memory,
            total_memory: component_memory + entity_index_memory,
        }
    }

    fn write_component<T: Component>(
        &mut self,
        archetype_id: ArchetypeId,
        entity: Entity,
        id: ComponentId,
        value: T,
    ) -> Result<()> {
        let archetype = &mut self.archetypes[archetype_id];
        let slot = archetype
            .slot_of(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let column = archetype
            .column_mut(id)
            .ok_or(EcsError::UnknownComponentId(id))?;
        column.write(slot, value)
    }

    /// Destination archetype when `id` is added to / removed from `from`
    fn transition(&mut self, from: ArchetypeId, id: ComponentId, adding: bool) -> Result<ArchetypeId> {
        if let Some(&to) = self.transitions.get(&(from, id, adding)) {
            return Ok(to);
        }

        let current = self.archetypes[from].signature();
        let signature = if adding {
            current.with(id)
        } else {
            current.without(id)
        };
        let to = self.get_or_create_archetype(&signature)?;
        if self.config.cache_transitions {
            self.transitions.insert((from, id, adding), to);
        }
        Ok(to)
    }

    /// Get or create archetype for a canonical signature
    fn get_or_create_archetype(&mut self, signature: &Signature) -> Result<ArchetypeId> {
        let key = signature.key();
        if let Some(&id) = self.archetype_index.get(&key) {
            return Ok(id);
        }

        if self.archetypes.len() >= self.config.max_archetypes {
            return Err(EcsError::ArchetypeLimitExceeded {
                limit: self.config.max_archetypes,
            });
        }

        let id = self.archetypes.len();
        let mut archetype = Archetype::new(id, signature.clone());
        {
            let registry = self.registry.read();
            for component in signature.ids() {
                archetype.initialize_component_storage(registry.info(*component)?)?;
            }
        }
        archetype.reserve_rows(self.config.archetype_row_reserve);

        // Push archetype FIRST so the index never names a missing archetype
        self.archetypes.push(archetype);
        self.archetype_index.insert(key, id);

        tracing::debug!(archetype = id, signature = %signature, "created archetype");
        Ok(id)
    }

    /// Move `entity` from archetype `from` to `to`.
    ///
    /// Components in both signatures are copied byte-for-byte, components
    /// only in `to` stay zero-filled, components only in `from` are dropped.
    /// Returns the entity's slot in `to`.
    fn migrate(&mut self, entity: Entity, from: ArchetypeId, to: ArchetypeId) -> Result<usize> {
        if from == to {
            return self.archetypes[to]
                .slot_of(entity)
                .ok_or(EcsError::EntityNotFound(entity));
        }

        // Access both archetypes safely using split_at_mut
        let (source, target) = if from < to {
            let (left, right) = self.archetypes.split_at_mut(to);
            (&mut left[from], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(from);
            (&mut right[0], &mut left[to])
        };

        let source_slot = source
            .slot_of(entity)
            .ok_or(EcsError::EntityNotFound(entity))?;
        let target_slot = target.add_entity(entity);
        source.copy_shared_into(source_slot, target, target_slot);
        source.remove_entity(entity);

        self.entity_index.insert(entity, to);
        tracing::trace!(%entity, from, to, "migrated entity");
        Ok(target_slot)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::from_registry(ComponentRegistry::new())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_index.len())
            .field("archetypes", &self.archetypes.len())
            .finish()
    }
}

/// Memory statistics for the world
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub entity_index_memory: usize,
    pub component_memory: usize,
    pub total_memory: usize,
}

#[cfg(test)]
mod tests {
    #![allow(dead_code)]
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Zeroable)]
    struct Health(i32);

    fn world() -> World {
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>("Position");
        registry.register::<Velocity>("Velocity");
        registry.register::<Health>("Health");
        World::from_registry(registry)
    }

    #[test]
    fn test_create_destroy() {
        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        assert!(world.is_alive(entity));
        assert_eq!(world.location(entity).unwrap().archetype_id, EMPTY_ARCHETYPE);

        assert!(world.destroy_entity(entity));
        assert!(!world.is_alive(entity));
        assert!(!world.destroy_entity(entity));
        assert!(world.is_consistent());
    }

    #[test]
    fn test_create_with_components_is_zeroed() {
        let mut world = world();
        let pos = world.component_id::<Position>().unwrap();
        let entity = world.create_entity(&[pos]).unwrap();
        assert_eq!(
            world.get_component::<Position>(entity).unwrap(),
            Some(&Position { x: 0.0, y: 0.0 })
        );
    }

    #[test]
    fn test_signature_order_shares_archetype() {
        let mut world = world();
        let pos = world.component_id::<Position>().unwrap();
        let vel = world.component_id::<Velocity>().unwrap();
        let a = world.create_entity(&[pos, vel]).unwrap();
        let b = world.create_entity(&[vel, pos]).unwrap();
        assert_eq!(
            world.location(a).unwrap().archetype_id,
            world.location(b).unwrap().archetype_id
        );
    }

    #[test]
    fn test_add_overwrites_in_place() {
        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        world.add_component(entity, Health(10)).unwrap();
        let archetypes = world.archetype_count();
        world.add_component(entity, Health(20)).unwrap();
        assert_eq!(world.archetype_count(), archetypes);
        assert_eq!(world.get_component::<Health>(entity).unwrap(), Some(&Health(20)));
    }

    #[test]
    fn test_remove_missing_component_is_noop() {
        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        world.remove_component::<Health>(entity).unwrap();
        assert!(world.is_alive(entity));

        world.destroy_entity(entity);
        world.remove_component::<Health>(entity).unwrap();
    }

    #[test]
    fn test_add_to_dead_entity_fails() {
        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        world.destroy_entity(entity);
        assert_eq!(
            world.add_component(entity, Health(1)),
            Err(EcsError::EntityNotFound(entity))
        );
    }

    #[test]
    fn test_unregistered_component_fails_fast() {
        #[derive(Clone, Copy, Zeroable)]
        struct Unknown;

        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        assert!(matches!(
            world.add_component(entity, Unknown),
            Err(EcsError::UnregisteredType { .. })
        ));
        assert!(world.get_component::<Unknown>(entity).is_err());
    }

    #[test]
    fn test_create_with_unknown_id_fails() {
        let mut world = world();
        let bogus = ComponentId(99);
        assert_eq!(world.create_entity(&[bogus]), Err(EcsError::UnknownComponentId(bogus)));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_transitions_are_cached() {
        let mut world = world();
        let a = world.create_entity(&[]).unwrap();
        let b = world.create_entity(&[]).unwrap();
        world.add_component(a, Health(1)).unwrap();
        let count = world.archetype_count();
        world.add_component(b, Health(2)).unwrap();
        assert_eq!(world.archetype_count(), count);
        assert_eq!(world.transitions.len(), 1);
    }

    #[test]
    fn test_archetype_limit() {
        let config = WorldConfig {
            max_archetypes: 2,
            ..WorldConfig::default()
        };
        let mut registry = ComponentRegistry::new();
        registry.register::<Position>("Position");
        registry.register::<Health>("Health");
        let mut world = World::with_config(registry.into_shared(), config).unwrap();

        let entity = world.create_entity(&[]).unwrap();
        world.add_component(entity, Position { x: 1.0, y: 1.0 }).unwrap();
        assert_eq!(
            world.add_component(entity, Health(3)),
            Err(EcsError::ArchetypeLimitExceeded { limit: 2 })
        );
        // Failed migration leaves the entity where it was
        assert_eq!(
            world.get_component::<Position>(entity).unwrap(),
            Some(&Position { x: 1.0, y: 1.0 })
        );
        assert!(world.is_consistent());
    }

    #[test]
    fn test_clear_keeps_registry() {
        let mut world = world();
        let entity = world.create_entity(&[]).unwrap();
        world.add_component(entity, Health(5)).unwrap();
        world.clear();

        assert!(!world.is_alive(entity));
        assert_eq!(world.archetype_count(), 1);
        assert!(world.component_id::<Health>().is_ok());

        let fresh = world.create_entity(&[]).unwrap();
        assert_ne!(fresh, entity);
    }

    #[test]
    fn test_memory_stats_track_component_bytes() {
        let mut world = world();
        let pos = world.component_id::<Position>().unwrap();
        for _ in 0..4 {
            world.create_entity(&[pos]).unwrap();
        }
        let stats = world.memory_stats();
        assert_eq!(stats.component_memory, 4 * std::mem::size_of::<Position>());
    }

    #[test]
    fn test_strict_component_lookup() {
        let mut world = world();
        let health = world.component_id::<Health>().unwrap();
        let entity = world.create_entity(&[health]).unwrap();
        world.add_component(entity, Health(7)).unwrap();

        assert_eq!(world.component::<Health>(entity), Ok(&Health(7)));
        world.component_mut::<Health>(entity).unwrap().0 += 1;
        assert_eq!(world.component::<Health>(entity), Ok(&Health(8)));

        // Alive but missing the component
        assert_eq!(
            world.component::<Position>(entity),
            Err(EcsError::EntityNotFound(entity))
        );

        world.destroy_entity(entity);
        assert_eq!(
            world.component::<Health>(entity),
            Err(EcsError::EntityNotFound(entity))
        );
        assert_eq!(
            world.component_mut::<Health>(entity).err(),
            Some(EcsError::EntityNotFound(entity))
        );
    }

    #[test]
    fn test_new_archetypes_have_every_column() {
        let mut world = world();
        let pos = world.component_id::<Position>().unwrap();
        let vel = world.component_id::<Velocity>().unwrap();
        let entity = world.create_entity(&[pos]).unwrap();
        world.add_component(entity, Velocity { dx: 1.0, dy: 0.0 }).unwrap();

        let archetype = world.archetype_of(entity).unwrap();
        assert!(archetype.is_initialized());
        assert_eq!(archetype.columns().len(), 2);
        assert!(archetype.column(pos).is_some_and(|col| col.is::<Position>()));
        assert!(archetype.column(vel).is_some_and(|col| col.is::<Velocity>()));
        assert!(world.archetypes().iter().all(Archetype::is_initialized));
    }

    #[test]
    fn test_register_through_world_is_visible_to_readers() {
        #[derive(Clone, Copy, Zeroable)]
        struct Late(u16);

        let mut world = world();
        let late = world.register_component::<Late>("Late");
        let registry = world.registry();
        assert_eq!(registry.id_of::<Late>(), Ok(late));
        assert_eq!(registry.name_of(late), Ok("Late"));
    }
}
