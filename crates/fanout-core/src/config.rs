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

//! Serializable settings for channels and buses.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FanoutError, FanoutResult};
use crate::fault::FaultPolicy;

/// Serializable form of a [`FaultPolicy`]. Handlers are code-only and have no
/// configuration equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    /// Discard subscriber panics.
    #[default]
    Ignore,
    /// Report subscriber panics through `log::warn!`.
    Log,
}

impl From<FaultMode> for FaultPolicy {
    fn from(mode: FaultMode) -> Self {
        match mode {
            FaultMode::Ignore => FaultPolicy::Ignore,
            FaultMode::Log => FaultPolicy::Log,
        }
    }
}

/// Settings for an [`Event`](crate::event::Event) or
/// [`EventBus`](crate::event::EventBus).
///
/// Missing fields fall back to their defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// What channels do with a panicking subscriber.
    pub fault_mode: FaultMode,
    /// Initial capacity of a bus's topic map.
    pub topic_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            fault_mode: FaultMode::Ignore,
            topic_capacity: 16,
        }
    }
}

impl EventConfig {
    /// The fault policy described by this configuration.
    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_mode.into()
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> FanoutResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> FanoutResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| FanoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        log::debug!("Loaded event config from '{}': {config:?}", path.display());
        Ok(config)
    }

    /// Serialize configuration to pretty-printed JSON.
    pub fn to_json(&self) -> FanoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> FanoutResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|source| FanoutError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
