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

//! Chunked queries over archetype columns
//!
//! A chunk query visits every non-empty archetype whose signature contains
//! all requested components and hands the callback the archetype's entity
//! list plus one dense slice per component, in the order the tuple names
//! them. Slice `i` of every column belongs to `entities[i]`.
//!
//! ```ignore
//! world.query_chunks_mut::<(Position, Velocity), _>(|chunk| {
//!     let (_, (positions, velocities)) = chunk.into_parts();
//!     for (p, v) in positions.iter_mut().zip(velocities.iter()) {
//!         p.x += v.x;
//!     }
//! })?;
//! ```
//!
//! The world stays borrowed for the whole walk, so structural changes from
//! inside the callback are rejected at compile time. Queue them on a
//! [`CommandBuffer`](crate::CommandBuffer) instead.

use std::ptr::NonNull;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, Signature};
use crate::component::{Component, ComponentId, ComponentSet};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Component tuple that can be viewed as parallel column slices
pub trait ChunkQuery: ComponentSet {
    /// Tuple of shared slices, one per component
    type Columns<'a>;

    /// Tuple of exclusive slices, one per component
    type ColumnsMut<'a>;

    /// # Safety
    ///
    /// `ptrs[i]` must be the base of a live column storing `len` values of the
    /// tuple's `i`th type, valid for reads for `'a`.
    unsafe fn columns_from_ptrs<'a>(ptrs: &[NonNull<u8>], len: usize) -> Self::Columns<'a>;

    /// # Safety
    ///
    /// As [`columns_from_ptrs`](Self::columns_from_ptrs), plus the columns
    /// must be pairwise distinct and not otherwise accessed for `'a`.
    unsafe fn columns_mut_from_ptrs<'a>(ptrs: &[NonNull<u8>], len: usize) -> Self::ColumnsMut<'a>;
}

macro_rules! impl_chunk_query {
    ($($T:ident $idx:tt),*) => {
        impl<$($T: Component),*> ChunkQuery for ($($T,)*) {
            type Columns<'a> = ($(&'a [$T],)*);
            type ColumnsMut<'a> = ($(&'a mut [$T],)*);

            unsafe fn columns_from_ptrs<'a>(ptrs: &[NonNull<u8>], len: usize) -> Self::Columns<'a> {
                unsafe { ($(std::slice::from_raw_parts(ptrs[$idx].cast::<$T>().as_ptr(), len),)*) }
            }

            unsafe fn columns_mut_from_ptrs<'a>(ptrs: &[NonNull<u8>], len: usize) -> Self::ColumnsMut<'a> {
                unsafe { ($(std::slice::from_raw_parts_mut(ptrs[$idx].cast::<$T>().as_ptr(), len),)*) }
            }
        }
    };
}

impl_chunk_query!(A 0);
impl_chunk_query!(A 0, B 1);
impl_chunk_query!(A 0, B 1, C 2);
impl_chunk_query!(A 0, B 1, C 2, D 3);
impl_chunk_query!(A 0, B 1, C 2, D 3, E 4);
impl_chunk_query!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_chunk_query!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_chunk_query!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Read-only view of one archetype
pub struct Chunk<'a, Q: ChunkQuery> {
    archetype: ArchetypeId,
    entities: &'a [Entity],
    columns: Q::Columns<'a>,
}

impl<'a, Q: ChunkQuery> Chunk<'a, Q> {
    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn columns(&self) -> &Q::Columns<'a> {
        &self.columns
    }

    pub fn into_parts(self) -> (&'a [Entity], Q::Columns<'a>) {
        (self.entities, self.columns)
    }
}

/// Mutable view of one archetype's columns
pub struct ChunkMut<'a, Q: ChunkQuery> {
    archetype: ArchetypeId,
    entities: &'a [Entity],
    columns: Q::ColumnsMut<'a>,
}

impl<'a, Q: ChunkQuery> ChunkMut<'a, Q> {
    pub fn archetype(&self) -> ArchetypeId {
        self.archetype
    }

    pub fn entities(&self) -> &'a [Entity] {
        self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn columns(&self) -> &Q::ColumnsMut<'a> {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut Q::ColumnsMut<'a> {
        &mut self.columns
    }

    pub fn into_parts(self) -> (&'a [Entity], Q::ColumnsMut<'a>) {
        (self.entities, self.columns)
    }
}

/// Archetypes worth visiting: non-empty supersets of `required`
fn is_candidate(archetype: &Archetype, required: &Signature) -> bool {
    !archetype.is_empty() && archetype.signature().is_superset_of(required)
}

fn check_columns<Q: ChunkQuery>(archetype: &Archetype, ids: &[ComponentId]) -> Result<()> {
    let type_ids = Q::type_ids();
    if archetype.columns_match(ids, &type_ids) {
        return Ok(());
    }
    let names = Q::type_names();
    let (component, expected) = ids
        .iter()
        .zip(type_ids.iter().zip(names))
        .find(|(id, (type_id, _))| archetype.column(**id).map(|col| col.type_id()) != Some(**type_id))
        .map(|(id, (_, name))| (*id, name))
        .unwrap_or((ids[0], Q::type_names()[0]));
    Err(EcsError::TypeMismatch { component, expected })
}

/// Visit every matching archetype with shared column slices.
///
/// Returns the number of entities covered.
pub fn query_chunks<Q, F>(world: &World, mut f: F) -> Result<usize>
where
    Q: ChunkQuery,
    F: FnMut(Chunk<'_, Q>),
{
    #[cfg(feature = "profiling")]
    let _span = info_span!("query_chunks", query = std::any::type_name::<Q>()).entered();

    let ids = Q::component_ids(&world.registry())?;
    let required = Signature::new(ids.iter().copied());

    let mut visited = 0;
    for archetype in world.archetypes() {
        if !is_candidate(archetype, &required) {
            continue;
        }
        check_columns::<Q>(archetype, &ids)?;
        let Some(ptrs) = archetype.column_ptrs(&ids) else {
            continue;
        };
        let len = archetype.len();
        // SAFETY: column types were checked above and `archetype` is borrowed
        // for the duration of the callback.
        let columns = unsafe { Q::columns_from_ptrs(&ptrs, len) };
        f(Chunk {
            archetype: archetype.id(),
            entities: archetype.entities(),
            columns,
        });
        visited += len;
    }
    Ok(visited)
}

/// Visit every matching archetype with exclusive column slices.
///
/// Naming one component twice is rejected with [`EcsError::AliasedQuery`].
pub fn query_chunks_mut<Q, F>(world: &mut World, mut f: F) -> Result<usize>
where
    Q: ChunkQuery,
    F: FnMut(ChunkMut<'_, Q>),
{
    #[cfg(feature = "profiling")]
    let _span = info_span!("query_chunks_mut", query = std::any::type_name::<Q>()).entered();

    let ids = Q::component_ids(&world.registry())?;
    if let Some(component) = ids
        .iter()
        .enumerate()
        .find(|(i, id)| ids[..*i].contains(*id))
        .map(|(_, id)| *id)
    {
        return Err(EcsError::AliasedQuery { component });
    }
    let required = Signature::new(ids.iter().copied());

    let mut visited = 0;
    for archetype in world.archetypes_mut().iter_mut() {
        if !is_candidate(archetype, &required) {
            continue;
        }
        check_columns::<Q>(archetype, &ids)?;
        let id = archetype.id();
        let Some((entities, ptrs)) = archetype.split_columns_mut(&ids) else {
            continue;
        };
        let len = entities.len();
        // SAFETY: ids are distinct, column types were checked above and the
        // archetype stays exclusively borrowed until the callback returns.
        let columns = unsafe { Q::columns_mut_from_ptrs(&ptrs, len) };
        f(ChunkMut {
            archetype: id,
            entities,
            columns,
        });
        visited += len;
    }
    Ok(visited)
}
