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

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::config::EventConfig;
use crate::error::FanoutResult;
use crate::fault::{CallbackFault, FaultPolicy};
use crate::registry::{Snapshot, SubscriberId, SubscriberRegistry};

use super::Subscription;

/// A thread-safe, single-channel event broadcaster.
///
/// `Event<T>` delivers a `&T` to every subscriber, synchronously, on the
/// publishing thread. The subscriber set is a copy-on-write snapshot: `publish`
/// never locks, and `subscribe`/`unsubscribe` never disturb a publish already
/// in progress.
///
/// Cloning an `Event` creates a new handle to the **same** channel. The channel
/// lives as long as any clone does; [`Subscription`]s only hold weak references
/// to it.
///
/// Multi-argument events use a tuple payload:
///
/// ```rust
/// use fanout_core::event::Event;
///
/// let ev = Event::<(String, i32)>::new();
/// let _sub = ev.subscribe(|(name, value): &(String, i32)| println!("{name}: {value}"));
/// ev.publish(&("cpu".to_string(), 42));
/// ```
pub struct Event<T> {
    registry: Arc<SubscriberRegistry<T>>,
    label: Option<Arc<str>>,
    faults: FaultPolicy,
}

// Manual Clone: shares the same registry.
impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            label: self.label.clone(),
            faults: self.faults.clone(),
        }
    }
}

impl<T: 'static> Event<T> {
    /// Creates a channel with no subscribers and the default
    /// ([`FaultPolicy::Ignore`]) fault policy.
    pub fn new() -> Self {
        Self::build(None, FaultPolicy::default())
    }

    /// Creates a channel that routes subscriber panics to `policy`.
    pub fn with_fault_policy(policy: FaultPolicy) -> Self {
        Self::build(None, policy)
    }

    /// Creates a channel configured from an [`EventConfig`].
    pub fn from_config(config: &EventConfig) -> Self {
        Self::build(None, config.fault_policy())
    }

    /// Creates a labeled channel. The label shows up in log records and in
    /// [`CallbackFault::channel`]; the [`EventBus`](super::EventBus) uses the
    /// topic name.
    pub fn named(label: impl Into<Arc<str>>, policy: FaultPolicy) -> Self {
        Self::build(Some(label.into()), policy)
    }

    fn build(label: Option<Arc<str>>, faults: FaultPolicy) -> Self {
        let event = Self {
            registry: Arc::new(SubscriberRegistry::new()),
            label,
            faults,
        };
        log::debug!(
            "Event channel {} initialized with fault policy {:?}.",
            event.display_label(),
            event.faults
        );
        event
    }

    /// Adds a subscriber and returns the RAII handle that keeps it registered.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes the callback.
    ///
    /// ## Arguments
    /// * `callback` - Invoked with a reference to each published event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.registry.insert(Arc::new(callback));
        log::trace!("Subscriber {id} added to {}.", self.display_label());
        self.bind(id)
    }

    /// Like [`subscribe`](Self::subscribe), but reports a failure to allocate
    /// the next subscriber snapshot instead of aborting.
    pub fn try_subscribe<F>(&self, callback: F) -> FanoutResult<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.registry.try_insert(Arc::new(callback))?;
        log::trace!("Subscriber {id} added to {}.", self.display_label());
        Ok(self.bind(id))
    }

    /// Removes the subscriber with `id`.
    ///
    /// This is the low-level entry point; it is normally reached through
    /// [`Subscription::unsubscribe`] or by dropping the subscription.
    ///
    /// ## Returns
    /// `true` if the subscriber was present, `false` otherwise.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            log::trace!("Subscriber {id} removed from {}.", self.display_label());
        }
        removed
    }

    /// Like [`unsubscribe`](Self::unsubscribe), but reports a failure to
    /// allocate the next snapshot. The subscriber stays registered on error.
    pub fn try_unsubscribe(&self, id: SubscriberId) -> FanoutResult<bool> {
        let removed = self.registry.try_remove(id)?;
        if removed {
            log::trace!("Subscriber {id} removed from {}.", self.display_label());
        }
        Ok(removed)
    }

    /// Delivers `event` to every subscriber of the current snapshot, in
    /// subscription order.
    ///
    /// The subscriber set is captured once on entry. A subscriber added while
    /// this call runs is not invoked by it; a subscriber removed while this
    /// call runs is still invoked by it if it had not been reached yet.
    ///
    /// A panicking subscriber does not stop delivery to the others and does
    /// not unwind into the caller; the panic is handed to the channel's
    /// [`FaultPolicy`].
    pub fn publish(&self, event: &T) {
        let snapshot = self.registry.read();
        log::trace!(
            "Publishing to {} subscriber(s) on {}.",
            snapshot.len(),
            self.display_label()
        );

        for slot in snapshot.iter() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| slot.invoke(event))) {
                self.faults.report(CallbackFault::from_panic(
                    self.label.clone(),
                    slot.id(),
                    payload.as_ref(),
                ));
            }
        }
    }

    /// Number of subscribers in the current snapshot.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if the channel currently has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Removes every subscriber at once.
    ///
    /// Outstanding [`Subscription`]s stay valid objects; their `unsubscribe`
    /// simply returns `false` from now on.
    pub fn clear(&self) {
        self.registry.clear();
        log::debug!("Event channel {} cleared.", self.display_label());
    }

    /// The current subscriber snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.registry.read()
    }

    /// The channel's label, if it has one.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The policy applied to panicking subscribers.
    pub fn fault_policy(&self) -> &FaultPolicy {
        &self.faults
    }

    /// Returns `true` if both handles refer to the same channel.
    pub fn same_channel(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }

    fn bind(&self, id: SubscriberId) -> Subscription {
        let owner: Weak<SubscriberRegistry<T>> = Arc::downgrade(&self.registry);
        Subscription::bound(owner, id)
    }

    fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed>")
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("label", &self.label)
            .field("subscriber_count", &self.registry.len())
            .field("faults", &self.faults)
            .finish()
    }
}
