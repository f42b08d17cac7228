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

//! Entity identifiers and location metadata.

use std::fmt;

use crate::archetype::ArchetypeId;
use crate::error::{EcsError, Result};

/// Opaque entity identifier.
///
/// Ids are handed out in increasing order starting at 1 and are never
/// recycled, so a stale id can never alias a newer entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    /// Raw id value
    pub fn id(self) -> u32 {
        self.0
    }

    /// Rebuild an entity from a raw id (diagnostics, tests)
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next unused id
    pub fn allocate(&mut self) -> Result<Entity> {
        let id = self.next;
        self.next = id.checked_add(1).ok_or(EcsError::EntityIdsExhausted)?;
        Ok(Entity(id))
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity location in archetype (archetype_id, slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: ArchetypeId,
    pub slot: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(alloc.allocated(), 2);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut alloc = EntityAllocator { next: u32::MAX - 1 };
        assert!(alloc.allocate().is_ok());
        assert_eq!(alloc.allocate(), Err(EcsError::EntityIdsExhausted));
    }
}
