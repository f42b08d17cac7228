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

//! Component metadata and the component registry
//!
//! Every component type gets a dense runtime [`ComponentId`] when it is
//! registered. The registry records the size, alignment and a debug name for
//! each id; archetypes use that metadata to lay out their type-erased columns.
//!
//! Registration is append-only: an id, once issued, keeps its type and size
//! for the lifetime of the registry. Registering the same type twice returns
//! the id it already has.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};

use crate::error::{EcsError, Result};

/// Maximum number of components in a [`ComponentSet`] tuple
pub const MAX_SET_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components are plain values: copyable, valid when zero-filled, and free of
/// borrowed data. Bytes of a component may be moved between archetypes without
/// running any constructor or destructor.
pub trait Component: Copy + bytemuck::Zeroable + Send + Sync + 'static {}

/// Automatically implement Component for all valid types
impl<T: Copy + bytemuck::Zeroable + Send + Sync + 'static> Component for T {}

/// Dense runtime identifier of a registered component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata about a registered component type
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentId,
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Maps Rust types to component ids and their layout
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: AHashMap<TypeId, ComponentId>,
    infos: Vec<ComponentInfo>,
}

/// Registry shared between the application root and its worlds
pub type SharedRegistry = Arc<RwLock<ComponentRegistry>>;

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the registry for sharing with one or more worlds
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register `T` under `name` and return its id.
    ///
    /// Idempotent: a type that is already registered keeps its id, and a
    /// differing `name` is ignored.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentId {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            let info = &self.infos[existing.index()];
            if info.name != name {
                tracing::warn!(
                    component = %existing,
                    registered_as = %info.name,
                    requested = name,
                    "component type registered twice under different names"
                );
            }
            return existing;
        }

        let id = ComponentId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id,
            type_name: type_name::<T>(),
        });
        self.by_type.insert(type_id, id);

        tracing::debug!(component = %id, name, size = std::mem::size_of::<T>(), "registered component");
        id
    }

    /// Id of a registered type
    pub fn id_of<T: Component>(&self) -> Result<ComponentId> {
        self.id_of_type(TypeId::of::<T>(), type_name::<T>())
    }

    pub fn try_id_of<T: Component>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    pub(crate) fn id_of_type(&self, type_id: TypeId, type_name: &'static str) -> Result<ComponentId> {
        self.by_type
            .get(&type_id)
            .copied()
            .ok_or(EcsError::UnregisteredType { type_name })
    }

    /// Full metadata for an id
    pub fn info(&self, id: ComponentId) -> Result<&ComponentInfo> {
        self.infos
            .get(id.index())
            .ok_or(EcsError::UnknownComponentId(id))
    }

    /// Byte size of one instance
    pub fn size_of(&self, id: ComponentId) -> Result<usize> {
        self.info(id).map(|info| info.size)
    }

    /// Debug name supplied at registration
    pub fn name_of(&self, id: ComponentId) -> Result<&str> {
        self.info(id).map(|info| info.name.as_str())
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.index() < self.infos.len()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// All registered components in id order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }
}

/// A tuple of component types resolved to ids as a group
pub trait ComponentSet: 'static {
    /// Rust type ids, in tuple order
    fn type_ids() -> SmallVec<[TypeId; MAX_SET_COMPONENTS]>;

    /// Rust type names, in tuple order
    fn type_names() -> SmallVec<[&'static str; MAX_SET_COMPONENTS]>;

    /// Resolve every member to its component id, in tuple order
    fn component_ids(registry: &ComponentRegistry) -> Result<SmallVec<[ComponentId; MAX_SET_COMPONENTS]>> {
        Self::type_ids()
            .into_iter()
            .zip(Self::type_names())
            .map(|(type_id, name)| registry.id_of_type(type_id, name))
            .collect()
    }
}

macro_rules! impl_component_set {
    ($($T:ident),*) => {
        impl<$($T: Component),*> ComponentSet for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_SET_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn type_names() -> SmallVec<[&'static str; MAX_SET_COMPONENTS]> {
                smallvec![$(type_name::<$T>()),*]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
