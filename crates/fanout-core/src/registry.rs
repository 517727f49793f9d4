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

//! Copy-on-write subscriber registry.
//!
//! A [`SubscriberRegistry`] keeps the current [`Snapshot`] of subscribers behind
//! an [`ArcSwap`]. Readers take the snapshot with a single atomic load and never
//! lock. Writers serialize on a small mutex, build a modified copy of the
//! snapshot and publish it with a single atomic store, so a reader always sees
//! either the old or the new snapshot in full.
//!
//! | Operation | Cost                         | Blocks         |
//! |-----------|------------------------------|----------------|
//! | `read()`  | O(1)                         | never          |
//! | `insert()`| O(S), S = subscribers        | other writers  |
//! | `remove()`| O(S)                         | other writers  |
//! | `clear()` | O(1)                         | other writers  |

use std::collections::TryReserveError;
use std::convert::Infallible;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

/// A subscriber callback, shared between every snapshot that contains it.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifies one subscription within a single channel.
///
/// Ids are handed out by a per-registry counter starting at 1 and are never
/// reused for the lifetime of that registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(NonZeroU64);

impl SubscriberId {
    pub(crate) const fn first() -> Self {
        Self(NonZeroU64::MIN)
    }

    /// Returns the raw id value (always nonzero).
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One registered subscriber: its id and its callback.
pub struct Slot<T> {
    id: SubscriberId,
    callback: Callback<T>,
}

// Manual Clone: cloning a slot only bumps the callback's refcount, T need not be Clone.
impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> Slot<T> {
    /// The id this slot was registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Invokes the callback with `event`.
    pub fn invoke(&self, event: &T) {
        (self.callback)(event)
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("id", &self.id).finish_non_exhaustive()
    }
}

/// An immutable, ordered view of the subscribers at one point in time.
///
/// Snapshots are never modified once published; the registry replaces them
/// wholesale.
pub struct Snapshot<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of subscribers in this snapshot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the snapshot holds no subscribers.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates the slots in subscription order.
    pub fn iter(&self) -> std::slice::Iter<'_, Slot<T>> {
        self.slots.iter()
    }

    /// Iterates the subscriber ids in subscription order.
    pub fn ids(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.slots.iter().map(Slot::id)
    }

    /// Returns `true` if a slot with `id` is present.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.slots.iter().any(|slot| slot.id == id)
    }
}

impl<'a, T> IntoIterator for &'a Snapshot<T> {
    type Item = &'a Slot<T>;
    type IntoIter = std::slice::Iter<'a, Slot<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

impl<T> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// Object-safe revocation seam used by [`Subscription`](crate::event::Subscription).
///
/// It lets a subscription hold a weak back-reference to its channel without
/// being generic over the channel's payload type.
pub(crate) trait Revoke: Send + Sync {
    fn revoke(&self, id: SubscriberId) -> bool;
}

/// The copy-on-write subscriber set behind every [`Event`](crate::event::Event).
pub struct SubscriberRegistry<T> {
    current: ArcSwap<Snapshot<T>>,
    /// Serializes writers and holds the next id to hand out.
    writer: Mutex<NonZeroU64>,
}

impl<T> SubscriberRegistry<T> {
    /// Creates a registry with an empty snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
            writer: Mutex::new(SubscriberId::first().0),
        }
    }

    /// Registers `callback` and returns its freshly allocated id.
    ///
    /// Allocation failure while copying the snapshot follows the global
    /// allocator's policy; use [`try_insert`](Self::try_insert) to observe it.
    pub fn insert(&self, callback: Callback<T>) -> SubscriberId {
        match self.insert_with(callback, |len| Ok::<_, Infallible>(Vec::with_capacity(len))) {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }

    /// Like [`insert`](Self::insert), but reports a failure to allocate the
    /// next snapshot instead of aborting. Nothing is published on failure and
    /// no id is consumed.
    pub fn try_insert(&self, callback: Callback<T>) -> Result<SubscriberId, TryReserveError> {
        self.insert_with(callback, try_alloc_slots)
    }

    /// Removes the slot with `id`, keeping the order of the others.
    ///
    /// Returns `false`, without publishing a new snapshot, if no such slot exists.
    pub fn remove(&self, id: SubscriberId) -> bool {
        match self.remove_with(id, |len| Ok::<_, Infallible>(Vec::with_capacity(len))) {
            Ok(removed) => removed,
            Err(never) => match never {},
        }
    }

    /// Like [`remove`](Self::remove), but reports allocation failure.
    pub fn try_remove(&self, id: SubscriberId) -> Result<bool, TryReserveError> {
        self.remove_with(id, try_alloc_slots)
    }

    /// Returns the current snapshot. Never locks and never blocks.
    pub fn read(&self) -> Arc<Snapshot<T>> {
        self.current.load_full()
    }

    /// Replaces the current snapshot with an empty one.
    pub fn clear(&self) {
        let previous = {
            let _writer = self.lock_writer();
            self.current.swap(Arc::new(Snapshot::empty()))
        };
        drop(previous);
    }

    /// Number of subscribers in the current snapshot.
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Returns `true` if the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    fn insert_with<E, A>(&self, callback: Callback<T>, alloc: A) -> Result<SubscriberId, E>
    where
        A: FnOnce(usize) -> Result<Vec<Slot<T>>, E>,
    {
        let mut next_id = self.lock_writer();
        let current = self.current.load();

        let mut slots = alloc(current.len() + 1)?;
        slots.extend_from_slice(&current.slots);

        let id = SubscriberId(*next_id);
        // Ids are never reused, so the counter refuses to wrap or saturate.
        *next_id = next_id
            .checked_add(1)
            .expect("subscriber id space exhausted");
        slots.push(Slot { id, callback });

        self.current.store(Arc::new(Snapshot { slots }));
        Ok(id)
    }

    fn remove_with<E, A>(&self, id: SubscriberId, alloc: A) -> Result<bool, E>
    where
        A: FnOnce(usize) -> Result<Vec<Slot<T>>, E>,
    {
        let previous = {
            let _writer = self.lock_writer();
            let current = self.current.load();
            if !current.contains(id) {
                return Ok(false);
            }

            let mut slots = alloc(current.len() - 1)?;
            slots.extend(current.iter().filter(|slot| slot.id != id).cloned());

            self.current.swap(Arc::new(Snapshot { slots }))
        };
        // The removed callback may own a Subscription to this registry, so its
        // last reference must go away after the writer lock is released.
        drop(previous);
        Ok(true)
    }

    // Callbacks never run under this lock, so a poisoned guard still protects
    // a consistent counter.
    fn lock_writer(&self) -> MutexGuard<'_, NonZeroU64> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("current", &*self.current.load())
            .finish_non_exhaustive()
    }
}

impl<T> Revoke for SubscriberRegistry<T> {
    fn revoke(&self, id: SubscriberId) -> bool {
        self.remove(id)
    }
}

fn try_alloc_slots<T>(len: usize) -> Result<Vec<Slot<T>>, TryReserveError> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(len)?;
    Ok(slots)
}
