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

//! Publish/subscribe primitives.
//!
//! - [`Event`] is a single typed channel. `publish` reads a lock-free
//!   copy-on-write snapshot of the subscribers and calls each in order.
//! - [`Subscription`] is the RAII handle returned by `subscribe`; dropping it
//!   unsubscribes, and it stays safe after the channel is gone.
//! - [`EventBus`] multiplexes many channels of one payload type by topic name.
//!
//! Every operation runs synchronously on the calling thread. Callbacks must be
//! `Send + Sync` because concurrent publishes may invoke the same callback from
//! several threads at once.

mod bus;
mod channel;
mod subscription;

pub use self::bus::EventBus;
pub use self::channel::Event;
pub use self::subscription::Subscription;
