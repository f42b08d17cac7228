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

//! Secs - archetype-based Entity Component System
//!
//! Entities with the same component set share an archetype, which stores each
//! component in its own dense column. Adding or removing a component moves
//! the entity between archetypes. Behaviour runs either per entity through a
//! [`System`] or per archetype through [`World::query_chunks`].

pub mod archetype;
pub mod builder;
pub mod command;
pub mod component;
pub mod config;
pub mod debug;
pub mod entity;
pub mod error;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod query;
pub mod system;
pub mod world;


pub use archetype::*;
pub use builder::*;
pub use command::*;
pub use component::*;
pub use config::*;
pub use debug::*;
pub use entity::*;
pub use error::*;
pub use query::*;
pub use system::*;
pub use world::*;
