// Copyright 2025 eraflo
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

//! Error types shared by every part of the crate.

use std::collections::TryReserveError;
use std::path::PathBuf;

use thiserror::Error;

/// A convenience alias for results produced by this crate.
pub type FanoutResult<T> = Result<T, FanoutError>;

/// Everything that can go wrong in `fanout-core`.
///
/// Subscriber panics are deliberately absent: they are contained inside
/// [`Event::publish`](crate::event::Event::publish) and routed to a
/// [`FaultPolicy`](crate::fault::FaultPolicy), never returned to the publisher.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// Building the next subscriber snapshot could not allocate its buffer.
    #[error("failed to allocate subscriber snapshot: {0}")]
    Allocation(#[from] TryReserveError),

    /// A configuration file could not be read or written.
    #[error("config file '{}': {source}", path.display())]
    Io {
        /// The file that was being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration document was not valid JSON for [`EventConfig`](crate::config::EventConfig).
    #[error("invalid event config: {0}")]
    Parse(#[from] serde_json::Error),
}
