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

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::EventConfig;
use crate::error::FanoutResult;
use crate::fault::FaultPolicy;

use super::{Event, Subscription};

/// Routes events to per-topic [`Event`] channels.
///
/// Channels are created lazily by the first [`subscribe`](Self::subscribe) to a
/// topic and then live as long as the bus, even with zero subscribers. The
/// topic map is guarded by a single mutex that is only held for lookup or
/// insertion; subscriber callbacks always run outside it, so publishing to one
/// topic never waits on another topic's subscribers.
pub struct EventBus<T> {
    channels: Mutex<HashMap<String, Event<T>>>,
    faults: FaultPolicy,
}

impl<T: 'static> EventBus<T> {
    /// Creates an empty bus whose channels ignore subscriber panics.
    ///
    /// ## Returns
    /// A new instance of the EventBus struct.
    pub fn new() -> Self {
        Self::build(0, FaultPolicy::default())
    }

    /// Creates an empty bus whose channels route subscriber panics to `policy`.
    pub fn with_fault_policy(policy: FaultPolicy) -> Self {
        Self::build(0, policy)
    }

    /// Creates an empty bus from an [`EventConfig`].
    pub fn from_config(config: &EventConfig) -> Self {
        Self::build(config.topic_capacity, config.fault_policy())
    }

    fn build(capacity: usize, faults: FaultPolicy) -> Self {
        log::info!("Topic EventBus initialized with fault policy {faults:?}.");
        Self {
            channels: Mutex::new(HashMap::with_capacity(capacity)),
            faults,
        }
    }

    /// Subscribes `callback` to `topic`, creating the topic's channel on first use.
    ///
    /// ## Arguments
    /// * `topic` - The routing key.
    /// * `callback` - Invoked with each event published to `topic`.
    ///
    /// ## Returns
    /// The RAII [`Subscription`] for the new subscriber.
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.channel_or_create(topic).subscribe(callback)
    }

    /// Like [`subscribe`](Self::subscribe), but reports a failure to allocate
    /// the channel's next subscriber snapshot. The topic is still created.
    pub fn try_subscribe<F>(&self, topic: &str, callback: F) -> FanoutResult<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.channel_or_create(topic).try_subscribe(callback)
    }

    /// Publishes `event` to every subscriber of `topic`.
    ///
    /// Publishing to an unknown topic does nothing and does not create it.
    ///
    /// ## Arguments
    /// * `topic` - The routing key.
    /// * `event` - The event to deliver.
    pub fn publish(&self, topic: &str, event: &T) {
        match self.channel(topic) {
            Some(channel) => channel.publish(event),
            None => log::trace!("No channel for topic '{topic}', dropping event."),
        }
    }

    /// Number of subscribers on `topic`; `0` if the topic does not exist.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock_channels()
            .get(topic)
            .map_or(0, Event::subscriber_count)
    }

    /// Returns `true` if `topic` has a channel.
    pub fn contains_topic(&self, topic: &str) -> bool {
        self.lock_channels().contains_key(topic)
    }

    /// Number of topics created so far.
    pub fn topic_count(&self) -> usize {
        self.lock_channels().len()
    }

    /// Names of all topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock_channels().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Returns a handle to the channel behind `topic`, without creating it.
    pub fn channel(&self, topic: &str) -> Option<Event<T>> {
        self.lock_channels().get(topic).cloned()
    }

    /// The fault policy handed to every channel this bus creates.
    pub fn fault_policy(&self) -> &FaultPolicy {
        &self.faults
    }

    fn channel_or_create(&self, topic: &str) -> Event<T> {
        let mut channels = self.lock_channels();
        if let Some(channel) = channels.get(topic) {
            return channel.clone();
        }

        log::debug!("Creating channel for topic '{topic}'.");
        let channel = Event::named(topic, self.faults.clone());
        channels.insert(topic.to_owned(), channel.clone());
        channel
    }

    // Only lookups and inserts run under this lock, so recovering a poisoned
    // guard never observes a half-updated map.
    fn lock_channels(&self) -> MutexGuard<'_, HashMap<String, Event<T>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("topics", &channels.len())
            .field("faults", &self.faults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    /// A local, self-contained payload for testing purposes.
    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        WindowResized { width: u32, height: u32 },
        KeyPressed { key_code: String },
    }

    fn dummy_key_event() -> TestEvent {
        TestEvent::KeyPressed {
            key_code: "Test".to_string(),
        }
    }

    fn collector(
        seen: &Arc<Mutex<Vec<TestEvent>>>,
    ) -> impl Fn(&TestEvent) + Send + Sync + 'static {
        let seen = Arc::clone(seen);
        move |ev: &TestEvent| seen.lock().unwrap().push(ev.clone())
    }

    #[test]
    fn event_bus_creation() {
        let bus = EventBus::<TestEvent>::new();
        assert_eq!(bus.topic_count(), 0);
        assert!(bus.topics().is_empty());
    }

    #[test]
    fn subscribe_creates_topic_lazily() {
        let bus = EventBus::<TestEvent>::new();
        assert!(!bus.contains_topic("input"));

        let _sub = bus.subscribe("input", |_: &TestEvent| {});

        assert!(bus.contains_topic("input"));
        assert_eq!(bus.subscriber_count("input"), 1);
        let label = bus
            .channel("input")
            .and_then(|ch| ch.label().map(str::to_owned));
        assert_eq!(label.as_deref(), Some("input"));
    }

    #[test]
    fn publish_routes_by_topic() {
        let bus = EventBus::<TestEvent>::new();
        let input = Arc::new(Mutex::new(Vec::new()));
        let window = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.subscribe("input", collector(&input));
        let _b = bus.subscribe("window", collector(&window));

        let resized = TestEvent::WindowResized {
            width: 1,
            height: 1,
        };
        bus.publish("input", &dummy_key_event());
        bus.publish("window", &resized);

        assert_eq!(*input.lock().unwrap(), vec![dummy_key_event()]);
        assert_eq!(*window.lock().unwrap(), vec![resized]);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::<TestEvent>::new();
        let _a = bus.subscribe("t1", |_: &TestEvent| {});
        let _b = bus.subscribe("t1", |_: &TestEvent| {});

        assert_eq!(bus.subscriber_count("t1"), 2);
        assert_eq!(bus.subscriber_count("t2"), 0);
    }

    #[test]
    fn unknown_topic_reads_never_create_it() {
        let bus = EventBus::<TestEvent>::new();

        bus.publish("ghost", &dummy_key_event());
        assert_eq!(bus.subscriber_count("ghost"), 0);
        assert!(bus.channel("ghost").is_none());

        assert!(!bus.contains_topic("ghost"));
        assert_eq!(bus.topic_count(), 0);
    }

    #[test]
    fn topic_survives_losing_all_subscribers() {
        let bus = EventBus::<TestEvent>::new();
        let sub = bus.subscribe("input", |_: &TestEvent| {});
        drop(sub);

        assert!(bus.contains_topic("input"));
        assert_eq!(bus.subscriber_count("input"), 0);
        assert_eq!(bus.topics(), vec!["input".to_string()]);
    }

    #[test]
    fn subscription_outliving_bus_is_inert() {
        let bus = EventBus::<TestEvent>::new();
        let mut sub = bus.subscribe("input", |_: &TestEvent| {});
        drop(bus);

        assert!(!sub.unsubscribe());
    }

    #[test]
    fn channels_inherit_bus_fault_policy() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let bus = EventBus::<TestEvent>::with_fault_policy(FaultPolicy::handler(move |fault| {
            sink.lock().unwrap().push(fault.channel().map(str::to_owned));
        }));
        let _bad = bus.subscribe("input", |_: &TestEvent| panic!("boom"));

        bus.publish("input", &dummy_key_event());

        assert_eq!(*faults.lock().unwrap(), vec![Some("input".to_string())]);
    }

    #[test]
    fn publish_from_thread() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = bus.subscribe("input", collector(&seen));

        let handle = {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                bus.publish("input", &dummy_key_event());
                log::trace!("Event published from spawned thread.");
            })
        };
        handle.join().expect("Thread join failed");

        assert_eq!(*seen.lock().unwrap(), vec![dummy_key_event()]);
    }

    #[test]
    fn concurrent_subscribes_create_each_topic_once() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let barrier = Arc::new(Barrier::new(8));
        let hits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bus = Arc::clone(&bus);
                let barrier = Arc::clone(&barrier);
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    barrier.wait();
                    let topic = if i % 2 == 0 { "even" } else { "odd" };
                    bus.subscribe(topic, move |_: &TestEvent| {
                        hits.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        let subs: Vec<Subscription> = handles
            .into_iter()
            .map(|h| h.join().expect("subscriber thread panicked"))
            .collect();

        assert_eq!(bus.topics(), vec!["even".to_string(), "odd".to_string()]);
        assert_eq!(bus.subscriber_count("even"), 4);
        assert_eq!(bus.subscriber_count("odd"), 4);

        bus.publish("even", &dummy_key_event());
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        drop(subs);
        assert_eq!(bus.subscriber_count("odd"), 0);
    }

    #[test]
    fn config_sizes_map_and_policy() {
        let config = EventConfig::from_json(r#"{ "fault_mode": "log", "topic_capacity": 4 }"#)
            .expect("valid config");
        let bus = EventBus::<TestEvent>::from_config(&config);

        assert!(matches!(bus.fault_policy(), FaultPolicy::Log));
        let _sub = bus.subscribe("input", |_: &TestEvent| {});
        assert!(matches!(
            bus.channel("input").map(|ch| ch.fault_policy().clone()),
            Some(FaultPolicy::Log)
        ));
    }
}
