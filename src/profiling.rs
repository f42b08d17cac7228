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

//! # Profiling Guide
//!
//! Every structural operation logs through `tracing` (archetype creation at
//! `debug`, entity create/destroy/migrate at `trace`). With the `profiling`
//! feature the hot paths also open spans:
//!
//! - `world.create_entity`
//! - `world.progress`
//! - `system.execute`
//! - `commands.apply`
//! - `query_chunks` / `query_chunks_mut`
//!
//! ## Basic Usage
//!
//! ```toml
//! [dependencies]
//! secs = { version = "0.3", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! secs::profiling::init_stdout(tracing::Level::DEBUG)?;
//!
//! let mut world = World::from_registry(registry);
//! world.progress(&mut systems)?;
//! ```
//!
//! ## Writing traces to disk
//!
//! ```ignore
//! // Keep the guard alive for as long as events should be flushed
//! let _guard = secs::profiling::init_rolling_file("logs", "secs.json", tracing::Level::TRACE)?;
//! ```
//!
//! Profile in release mode; `trace` level on a large world is very chatty.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::{EcsError, Result};

fn install_failed(err: impl std::fmt::Display) -> EcsError {
    EcsError::Config(format!("failed to install tracing subscriber: {err}"))
}

/// Human readable events on stdout
pub fn init_stdout(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(install_failed)
}

/// One JSON object per event on stdout
pub fn init_json(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .try_init()
        .map_err(install_failed)
}

/// JSON events to a daily rotated file under `dir`.
///
/// Events are written on a background thread; dropping the returned guard
/// flushes them.
pub fn init_rolling_file(dir: impl AsRef<Path>, prefix: &str, level: Level) -> Result<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(dir, prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_max_level(level)
        .try_init()
        .map_err(install_failed)?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_an_error() {
        // Whichever test installs first wins; the second attempt must fail cleanly
        let _ = init_stdout(Level::WARN);
        assert!(matches!(init_json(Level::WARN), Err(EcsError::Config(_))));
    }
}
