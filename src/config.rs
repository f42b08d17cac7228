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

//! World configuration

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, Result};

/// Capacity hints and limits applied when a [`World`](crate::World) is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Pre-sized entity index
    pub initial_entity_capacity: usize,
    /// Pre-sized archetype table
    pub initial_archetype_capacity: usize,
    /// Rows reserved in every freshly created archetype
    pub archetype_row_reserve: usize,
    /// Hard ceiling on distinct archetypes (guards against signature explosion)
    pub max_archetypes: usize,
    /// Remember archetype transitions for add/remove
    pub cache_transitions: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 1024,
            initial_archetype_capacity: 64,
            archetype_row_reserve: 16,
            max_archetypes: 10_000,
            cache_transitions: true,
        }
    }
}

impl WorldConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_archetypes == 0 {
            return Err(EcsError::Config("max_archetypes must be at least 1".into()));
        }
        Ok(())
    }
}
