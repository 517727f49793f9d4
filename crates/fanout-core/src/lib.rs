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

//! # Fanout Core
//!
//! In-process, thread-safe publish/subscribe: a single typed channel
//! ([`Event`]), RAII subscription handles ([`Subscription`]) and a
//! topic-routed multiplexer ([`EventBus`]).
//!
//! ```rust
//! use fanout_core::{Event, EventBus};
//!
//! let ev = Event::<i32>::new();
//! let sub = ev.subscribe(|v: &i32| println!("got {v}"));
//! ev.publish(&5);
//! drop(sub);
//! assert_eq!(ev.subscriber_count(), 0);
//!
//! let bus = EventBus::<(String, i32)>::new();
//! let _cpu = bus.subscribe("cpu", |(s, v): &(String, i32)| println!("[cpu] {s} {v}"));
//! bus.publish("cpu", &("load".to_string(), 80));
//! assert_eq!(bus.subscriber_count("gpu"), 0);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod fault;
pub mod registry;

pub use config::{EventConfig, FaultMode};
pub use error::{FanoutError, FanoutResult};
pub use event::{Event, EventBus, Subscription};
pub use fault::{CallbackFault, FaultPolicy};
pub use registry::SubscriberId;
