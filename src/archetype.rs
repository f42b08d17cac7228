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

//! Archetype storage with slot allocation and swap-remove
//!
//! # Safety
//!
//! Component data lives in type-erased [`ComponentColumn`] buffers. Every
//! column carries the `TypeId` of the component it was created for, and the
//! typed accessors (`as_slice`, `get`, `write`, ...) check that tag before
//! reinterpreting bytes. The raw pointer helpers used by chunk queries are
//! crate-private and only called after the same check.

use std::alloc::{self, Layout};
use std::any::{type_name, TypeId};
use std::fmt;
use std::ptr::{self, NonNull};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::{Component, ComponentId, ComponentInfo, MAX_SET_COMPONENTS};
use crate::entity::Entity;
use crate::error::{EcsError, Result};

/// Index of an archetype inside its world
pub type ArchetypeId = usize;

/// Sorted, duplicate-free set of component ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(SmallVec<[ComponentId; 8]>);

impl Signature {
    /// Canonicalize: `{B, A, B}` and `{A, B}` produce the same signature
    pub fn new<I: IntoIterator<Item = ComponentId>>(ids: I) -> Self {
        let mut ids: SmallVec<[ComponentId; 8]> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[ComponentId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    /// True when every id in `required` is also in `self`
    pub fn is_superset_of(&self, required: &Signature) -> bool {
        let mut mine = self.0.iter();
        'outer: for want in required.0.iter() {
            for have in mine.by_ref() {
                if have == want {
                    continue 'outer;
                }
                if have > want {
                    return false;
                }
            }
            return false;
        }
        true
    }

    pub fn with(&self, id: ComponentId) -> Signature {
        let mut ids = self.0.clone();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
        Signature(ids)
    }

    pub fn without(&self, id: ComponentId) -> Signature {
        let mut ids = self.0.clone();
        ids.retain(|other| *other != id);
        Signature(ids)
    }

    /// Canonical lookup key, e.g. `"1;5;7;"`
    pub fn key(&self) -> String {
        let mut key = String::with_capacity(self.0.len() * 3);
        for id in &self.0 {
            key.push_str(&id.to_string());
            key.push(';');
        }
        key
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromIterator<ComponentId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        Signature::new(iter)
    }
}

/// Type-erased, type-tagged column of one component
///
/// The buffer is allocated with the component's own alignment, so a slot
/// pointer can always be read as the tagged type. New slots are zero-filled.
pub struct ComponentColumn {
    component: ComponentId,
    type_id: TypeId,
    type_name: &'static str,
    data: NonNull<u8>,
    len: usize,
    capacity: usize,
    item_size: usize,
    item_align: usize,
}

// Columns hold bytes of `Component` values, which are `Send + Sync`.
unsafe impl Send for ComponentColumn {}
unsafe impl Sync for ComponentColumn {}

impl ComponentColumn {
    /// Create an empty column for the component described by `info`
    pub fn new(info: &ComponentInfo) -> Self {
        Self {
            component: info.id,
            type_id: info.type_id,
            type_name: info.type_name,
            data: Self::dangling(info.align),
            len: 0,
            capacity: 0,
            item_size: info.size,
            item_align: info.align,
        }
    }

    fn dangling(align: usize) -> NonNull<u8> {
        NonNull::new(align as *mut u8).unwrap_or(NonNull::dangling())
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes currently occupied by live slots
    pub fn byte_len(&self) -> usize {
        self.len * self.item_size
    }

    /// Whether this column stores `T`
    pub fn is<T: Component>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    fn layout_for(&self, capacity: usize) -> Option<Layout> {
        if self.item_size == 0 || capacity == 0 {
            return None;
        }
        Layout::from_size_align(self.item_size.checked_mul(capacity)?, self.item_align).ok()
    }

    /// Make room for `additional` more slots
    ///
    /// # Panics
    ///
    /// If the buffer size overflows `isize`, like `Vec::reserve`. Reaching that
    /// needs more rows than the address space can hold.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len.saturating_add(additional);
        if required <= self.capacity {
            return;
        }
        let new_capacity = required.max(self.capacity * 2).max(4);
        if self.item_size == 0 {
            self.capacity = new_capacity;
            return;
        }

        let Some(new_layout) = self.layout_for(new_capacity) else {
            panic!("column layout overflow for `{}`", self.type_name);
        };
        let new_data = unsafe {
            match self.layout_for(self.capacity) {
                Some(old_layout) => alloc::realloc(self.data.as_ptr(), old_layout, new_layout.size()),
                None => alloc::alloc(new_layout),
            }
        };
        self.data = match NonNull::new(new_data) {
            Some(data) => data,
            None => alloc::handle_alloc_error(new_layout),
        };
        self.capacity = new_capacity;
    }

    /// Append one zero-filled slot and return its index
    pub fn push_zeroed(&mut self) -> usize {
        self.reserve(1);
        let index = self.len;
        // SAFETY: `reserve` guarantees capacity for `index`.
        unsafe {
            ptr::write_bytes(self.ptr_at(index).as_ptr(), 0, self.item_size);
        }
        self.len += 1;
        index
    }

    /// Move the last slot into `index` and shrink by one.
    ///
    /// Returns false (and changes nothing) when `index` is past the end.
    pub fn swap_remove(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let last = self.len - 1;
        if index != last && self.item_size > 0 {
            // SAFETY: both indices are live and distinct, so the ranges don't overlap.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.ptr_at(last).as_ptr(),
                    self.ptr_at(index).as_ptr(),
                    self.item_size,
                );
            }
        }
        self.len = last;
        true
    }

    #[inline]
    fn ptr_at(&self, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.capacity.max(1) || self.item_size == 0);
        if self.item_size == 0 {
            return self.data;
        }
        // SAFETY: callers only pass indices within the allocation.
        unsafe { NonNull::new_unchecked(self.data.as_ptr().add(index * self.item_size)) }
    }

    /// Raw pointer to slot `index`, or `None` past the end
    pub fn get_ptr(&self, index: usize) -> Option<NonNull<u8>> {
        (index < self.len).then(|| self.ptr_at(index))
    }

    /// Base pointer of the buffer (aligned, possibly dangling when empty)
    pub(crate) fn base_ptr(&self) -> NonNull<u8> {
        self.data
    }

    /// Copy one slot's bytes from another column of the same component
    ///
    /// Mismatched columns or dead slots are skipped.
    pub(crate) fn copy_slot_from(&mut self, dst_index: usize, src: &ComponentColumn, src_index: usize) {
        let valid = self.type_id == src.type_id && dst_index < self.len && src_index < src.len;
        debug_assert!(valid, "invalid slot copy for `{}`", self.type_name);
        if !valid {
            return;
        }
        // SAFETY: distinct columns own distinct allocations; both slots are live.
        unsafe {
            ptr::copy_nonoverlapping(
                src.ptr_at(src_index).as_ptr(),
                self.ptr_at(dst_index).as_ptr(),
                self.item_size,
            );
        }
    }

    /// Typed view of every live slot
    pub fn as_slice<T: Component>(&self) -> Option<&[T]> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: type tag checked; buffer is aligned for T and `len` slots are initialized.
        Some(unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const T, self.len) })
    }

    pub fn as_mut_slice<T: Component>(&mut self) -> Option<&mut [T]> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: as above, plus exclusive access through `&mut self`.
        Some(unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr() as *mut T, self.len) })
    }

    pub fn get<T: Component>(&self, index: usize) -> Option<&T> {
        self.as_slice::<T>()?.get(index)
    }

    pub fn get_mut<T: Component>(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice::<T>()?.get_mut(index)
    }

    /// Overwrite slot `index` with `value`
    pub fn write<T: Component>(&mut self, index: usize, value: T) -> Result<()> {
        let component = self.component;
        let slot = self
            .get_mut::<T>(index)
            .ok_or(EcsError::TypeMismatch {
                component,
                expected: type_name::<T>(),
            })?;
        *slot = value;
        Ok(())
    }
}

impl Drop for ComponentColumn {
    fn drop(&mut self) {
        // Components are `Copy`, so only the allocation itself needs freeing.
        if let Some(layout) = self.layout_for(self.capacity) {
            unsafe { alloc::dealloc(self.data.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for ComponentColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentColumn")
            .field("component", &self.component)
            .field("type", &self.type_name)
            .field("len", &self.len)
            .field("item_size", &self.item_size)
            .finish()
    }
}

/// Archetype: Structure of Arrays storage
///
/// Holds every entity whose component set equals `signature` exactly. Slot
/// `i` of every column belongs to `entities[i]`; slots stay dense because
/// removal swaps the last slot into the hole.
#[derive(Debug)]
pub struct Archetype {
    id: ArchetypeId,
    signature: Signature,
    entities: Vec<Entity>,
    entity_to_slot: FxHashMap<Entity, usize>,
    columns: Vec<ComponentColumn>,
    column_indices: FxHashMap<ComponentId, usize>,
}

impl Archetype {
    /// Create an archetype for `signature` with no storage yet.
    ///
    /// Every component of the signature needs
    /// [`initialize_component_storage`](Self::initialize_component_storage)
    /// before the first entity is added.
    pub fn new(id: ArchetypeId, signature: Signature) -> Self {
        Self {
            id,
            columns: Vec::with_capacity(signature.len()),
            signature,
            entities: Vec::new(),
            entity_to_slot: FxHashMap::default(),
            column_indices: FxHashMap::default(),
        }
    }

    /// Establish the (empty) buffer for one component of the signature.
    ///
    /// Only valid before any entity has been added. Initializing a component
    /// twice with the same layout is a no-op; a different type or size for an
    /// existing column is rejected.
    pub fn initialize_component_storage(&mut self, info: &ComponentInfo) -> Result<()> {
        if !self.entities.is_empty() {
            return Err(EcsError::ArchetypeNotEmpty);
        }
        if !self.signature.contains(info.id) {
            return Err(EcsError::UnknownComponentId(info.id));
        }
        if let Some(existing) = self.column(info.id) {
            if existing.type_id() != info.type_id || existing.item_size() != info.size {
                return Err(EcsError::TypeMismatch {
                    component: info.id,
                    expected: info.type_name,
                });
            }
            return Ok(());
        }
        self.column_indices.insert(info.id, self.columns.len());
        self.columns.push(ComponentColumn::new(info));
        Ok(())
    }

    /// Every component of the signature has its column
    pub fn is_initialized(&self) -> bool {
        self.columns.len() == self.signature.len()
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn component_ids(&self) -> &[ComponentId] {
        self.signature.ids()
    }

    pub fn has_component(&self, id: ComponentId) -> bool {
        self.column_indices.contains_key(&id)
    }

    /// Get all entities
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entity_to_slot.contains_key(&entity)
    }

    pub fn slot_of(&self, entity: Entity) -> Option<usize> {
        self.entity_to_slot.get(&entity).copied()
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        self.entity_to_slot.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Append `entity` and grow every column by one zero-filled slot.
    ///
    /// Returns the new slot. Adding an entity that is already present returns
    /// its current slot untouched.
    pub fn add_entity(&mut self, entity: Entity) -> usize {
        if let Some(slot) = self.slot_of(entity) {
            return slot;
        }
        let slot = self.entities.len();
        self.entities.push(entity);
        self.entity_to_slot.insert(entity, slot);
        for column in &mut self.columns {
            column.push_zeroed();
        }
        slot
    }

    /// Swap-remove `entity`; returns false if it was not stored here
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.entity_to_slot.remove(&entity) else {
            return false;
        };
        let last = self.entities.len() - 1;
        self.entities.swap_remove(slot);
        for column in &mut self.columns {
            column.swap_remove(slot);
        }
        if slot != last {
            let moved = self.entities[slot];
            self.entity_to_slot.insert(moved, slot);
        }
        true
    }

    /// Raw bytes of one component of one entity.
    ///
    /// The pointer is invalidated by the next add/remove on this archetype.
    pub fn component_data(&self, entity: Entity, id: ComponentId) -> Option<NonNull<u8>> {
        let slot = self.slot_of(entity)?;
        self.column(id)?.get_ptr(slot)
    }

    pub fn get<T: Component>(&self, entity: Entity, id: ComponentId) -> Option<&T> {
        let slot = self.slot_of(entity)?;
        self.column(id)?.get::<T>(slot)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity, id: ComponentId) -> Option<&mut T> {
        let slot = self.slot_of(entity)?;
        self.column_mut(id)?.get_mut::<T>(slot)
    }

    /// All columns, in signature order
    pub fn columns(&self) -> &[ComponentColumn] {
        &self.columns
    }

    /// Get column immutably
    pub fn column(&self, id: ComponentId) -> Option<&ComponentColumn> {
        let idx = *self.column_indices.get(&id)?;
        self.columns.get(idx)
    }

    pub(crate) fn column_mut(&mut self, id: ComponentId) -> Option<&mut ComponentColumn> {
        let idx = *self.column_indices.get(&id)?;
        self.columns.get_mut(idx)
    }

    /// Whole column as a typed slice, index-aligned with `entities()`
    pub fn column_slice<T: Component>(&self, id: ComponentId) -> Option<&[T]> {
        self.column(id)?.as_slice::<T>()
    }

    pub fn column_slice_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut [T]> {
        self.column_mut(id)?.as_mut_slice::<T>()
    }

    /// True when every `(id, type)` pair names a column of that type
    pub(crate) fn columns_match(&self, ids: &[ComponentId], type_ids: &[TypeId]) -> bool {
        ids.len() == type_ids.len()
            && ids
                .iter()
                .zip(type_ids)
                .all(|(id, type_id)| self.column(*id).is_some_and(|col| col.type_id() == *type_id))
    }

    /// Base pointers of the named columns, in `ids` order
    pub(crate) fn column_ptrs(&self, ids: &[ComponentId]) -> Option<SmallVec<[NonNull<u8>; MAX_SET_COMPONENTS]>> {
        ids.iter().map(|id| self.column(*id).map(ComponentColumn::base_ptr)).collect()
    }

    /// Entity list plus mutable base pointers of the named columns.
    ///
    /// Callers must not request the same id twice.
    pub(crate) fn split_columns_mut(
        &mut self,
        ids: &[ComponentId],
    ) -> Option<(&[Entity], SmallVec<[NonNull<u8>; MAX_SET_COMPONENTS]>)> {
        let mut ptrs = SmallVec::new();
        for id in ids {
            let idx = *self.column_indices.get(id)?;
            ptrs.push(self.columns[idx].base_ptr());
        }
        Some((&self.entities, ptrs))
    }

    /// Copy every component both archetypes share from `src_slot` in `self`
    /// into `dst_slot` of `dst`
    pub(crate) fn copy_shared_into(&self, src_slot: usize, dst: &mut Archetype, dst_slot: usize) {
        for dst_column in &mut dst.columns {
            if let Some(src_column) = self.column(dst_column.component()) {
                dst_column.copy_slot_from(dst_slot, src_column, src_slot);
            }
        }
    }

    /// Density invariant: entity list, slot map and every column agree
    pub fn is_consistent(&self) -> bool {
        let n = self.entities.len();
        self.is_initialized()
            && n == self.entity_to_slot.len()
            && self.columns.iter().all(|col| col.len() == n && col.byte_len() == n * col.item_size())
            && self
                .entities
                .iter()
                .enumerate()
                .all(|(slot, e)| self.entity_to_slot.get(e) == Some(&slot))
    }
}
