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

//! Containment of subscriber panics.
//!
//! [`Event::publish`](crate::event::Event::publish) runs every callback under
//! [`std::panic::catch_unwind`]. A panicking subscriber never stops delivery to
//! the subscribers after it and never unwinds into the publisher; instead the
//! panic is turned into a [`CallbackFault`] and handed to the channel's
//! [`FaultPolicy`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::registry::SubscriberId;

/// A user-supplied sink for subscriber faults.
pub type FaultHandler = Arc<dyn Fn(&CallbackFault) + Send + Sync>;

/// Describes one subscriber callback that panicked during a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFault {
    channel: Option<Arc<str>>,
    subscriber: SubscriberId,
    message: String,
}

impl CallbackFault {
    pub(crate) fn from_panic(
        channel: Option<Arc<str>>,
        subscriber: SubscriberId,
        payload: &(dyn Any + Send),
    ) -> Self {
        Self {
            channel,
            subscriber,
            message: panic_message(payload),
        }
    }

    /// The label of the channel the subscriber belonged to (the topic name for
    /// channels created by an [`EventBus`](crate::event::EventBus)).
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// The id of the subscriber whose callback panicked.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// The panic message, when the payload was a string.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CallbackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.channel {
            Some(channel) => write!(
                f,
                "subscriber {} on '{}' panicked: {}",
                self.subscriber, channel, self.message
            ),
            None => write!(f, "subscriber {} panicked: {}", self.subscriber, self.message),
        }
    }
}

/// What a channel does with a subscriber that panicked.
///
/// The default is [`FaultPolicy::Ignore`]: the fault is discarded and delivery
/// carries on.
#[derive(Clone, Default)]
pub enum FaultPolicy {
    /// Discard the fault.
    #[default]
    Ignore,
    /// Report the fault through `log::warn!`.
    Log,
    /// Forward the fault to a handler.
    Handler(FaultHandler),
}

impl FaultPolicy {
    /// Builds a [`FaultPolicy::Handler`] from a closure.
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&CallbackFault) + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(handler))
    }

    pub(crate) fn report(&self, fault: CallbackFault) {
        match self {
            FaultPolicy::Ignore => {}
            FaultPolicy::Log => log::warn!("{fault}"),
            FaultPolicy::Handler(handler) => {
                // The handler runs on the publisher's thread, so it gets the same
                // containment as the subscriber it is reporting on.
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&fault))) {
                    log::error!(
                        "Fault handler panicked while handling [{fault}]: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }
}

impl fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultPolicy::Ignore => f.write_str("Ignore"),
            FaultPolicy::Log => f.write_str("Log"),
            FaultPolicy::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn fault(message: &'static str) -> CallbackFault {
        CallbackFault::from_panic(Some(Arc::from("cpu")), SubscriberId::first(), &message)
    }

    #[test]
    fn panic_message_extracts_strings() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn display_includes_channel_and_subscriber() {
        let fault = fault("boom");
        assert_eq!(fault.to_string(), "subscriber #1 on 'cpu' panicked: boom");

        let unlabeled = CallbackFault::from_panic(None, SubscriberId::first(), &"boom");
        assert_eq!(unlabeled.to_string(), "subscriber #1 panicked: boom");
    }

    #[test]
    fn handler_policy_receives_fault() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let policy = FaultPolicy::handler(move |f| sink.lock().unwrap().push(f.clone()));

        policy.report(fault("boom"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].channel(), Some("cpu"));
        assert_eq!(seen[0].message(), "boom");
    }

    #[test]
    fn panicking_handler_is_contained() {
        let policy = FaultPolicy::handler(|_| panic!("handler failure"));
        policy.report(fault("boom"));
    }

    #[test]
    fn default_policy_is_ignore() {
        assert!(matches!(FaultPolicy::default(), FaultPolicy::Ignore));
        assert_eq!(format!("{:?}", FaultPolicy::handler(|_| {})), "Handler(..)");
    }
}
