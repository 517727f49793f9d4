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
use std::sync::Weak;

use crate::registry::{Revoke, SubscriberId};

struct Binding {
    owner: Weak<dyn Revoke>,
    id: SubscriberId,
}

/// RAII handle for one subscription.
///
/// A `Subscription` is returned by [`Event::subscribe`](super::Event::subscribe)
/// and [`EventBus::subscribe`](super::EventBus::subscribe). It holds only a weak
/// reference to its channel, so it never keeps the channel alive, and revoking
/// it after the channel is gone is a harmless no-op.
///
/// The handle is move-only. Dropping it unsubscribes; assigning a new
/// subscription over it drops, and therefore unsubscribes, the old one first.
#[must_use = "dropping a Subscription immediately unsubscribes its callback"]
#[derive(Default)]
pub struct Subscription {
    binding: Option<Binding>,
}

impl Subscription {
    pub(crate) fn bound(owner: Weak<dyn Revoke>, id: SubscriberId) -> Self {
        Self {
            binding: Some(Binding { owner, id }),
        }
    }

    /// Removes the subscriber from its channel and unbinds this handle.
    ///
    /// ## Returns
    /// `true` only for the call that actually removed the subscriber. Later
    /// calls, calls after the channel was dropped, and calls after the channel
    /// was cleared all return `false`.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(Binding { owner, id }) = self.binding.take() else {
            return false;
        };
        match owner.upgrade() {
            Some(channel) => channel.revoke(id),
            None => {
                log::trace!("Subscriber {id} outlived its channel; nothing to revoke.");
                false
            }
        }
    }

    /// Returns `true` while this handle is still bound.
    ///
    /// This is local bookkeeping: the subscriber may already be gone through
    /// another path such as [`Event::clear`](super::Event::clear).
    pub fn is_active(&self) -> bool {
        self.binding.is_some()
    }

    /// The id this handle is bound to, if any.
    pub fn id(&self) -> Option<SubscriberId> {
        self.binding.as_ref().map(|binding| binding.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(binding) => f
                .debug_struct("Subscription")
                .field("id", &binding.id)
                .field("channel_alive", &(binding.owner.strong_count() > 0))
                .finish(),
            None => f.write_str("Subscription(unbound)"),
        }
    }
}
