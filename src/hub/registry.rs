//! Per-topic subscriber registry shared by one transport.
//!
//! Topics live in a sharded [`DashMap`], so connect/disconnect/publish on one
//! script never waits on another script's shard unless they hash together.
//! Shard guards are only held long enough to insert, remove or clone a
//! topic's member list; delivery always runs against a copied snapshot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sink::EventSink;

/// Opaque registration token for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(Uuid);

impl HandleId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Members = HashMap<HandleId, Arc<dyn EventSink>>;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers that accepted the frame.
    pub delivered: usize,
    /// Subscribers removed because delivery failed.
    pub evicted: Vec<HandleId>,
}

impl FanOut {
    pub fn attempted(&self) -> usize {
        self.delivered + self.evicted.len()
    }
}

/// Topic key → subscriber set for one transport.
pub struct TopicRegistry {
    /// Transport label used in log fields.
    name: &'static str,
    topics: DashMap<String, Members>,
}

impl TopicRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            topics: DashMap::new(),
        }
    }

    /// Register `sink` under `topic`, creating the topic entry on first use.
    pub fn subscribe(&self, topic: &str, sink: Arc<dyn EventSink>) -> HandleId {
        let handle = HandleId::new();
        let count = {
            let mut members = self.topics.entry(topic.to_owned()).or_default();
            members.insert(handle, sink);
            members.len()
        };

        tracing::debug!(
            transport = self.name,
            topic,
            %handle,
            subscribers = count,
            "subscriber registered"
        );
        handle
    }

    /// Remove `handle` from `topic`. Returns `false` if it was not registered.
    ///
    /// Idempotent; the topic entry is dropped once its last member leaves.
    pub fn unsubscribe(&self, topic: &str, handle: HandleId) -> bool {
        let removed = match self.topics.get_mut(topic) {
            Some(mut members) => members.remove(&handle).is_some(),
            None => false,
        };

        if removed {
            self.topics.remove_if(topic, |_, members| members.is_empty());
            tracing::debug!(transport = self.name, topic, %handle, "subscriber removed");
        }
        removed
    }

    /// Copy of the current members of `topic`; empty for unknown topics.
    pub fn snapshot(&self, topic: &str) -> Vec<(HandleId, Arc<dyn EventSink>)> {
        self.topics
            .get(topic)
            .map(|members| {
                members
                    .iter()
                    .map(|(handle, sink)| (*handle, Arc::clone(sink)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Deliver `frame` to every member of `topic` except `exclude`.
    ///
    /// Evict-on-failure: a member whose delivery fails is unsubscribed and the
    /// fan-out carries on with the rest. Failures never reach the caller.
    pub fn fan_out(&self, topic: &str, frame: Bytes, exclude: Option<HandleId>) -> FanOut {
        let mut report = FanOut::default();

        for (handle, sink) in self.snapshot(topic) {
            if Some(handle) == exclude {
                continue;
            }
            match sink.deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::debug!(
                        transport = self.name,
                        topic,
                        %handle,
                        error = %err,
                        "evicting subscriber after failed delivery"
                    );
                    self.unsubscribe(topic, handle);
                    report.evicted.push(handle);
                }
            }
        }

        report
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|m| m.len()).unwrap_or(0)
    }

    pub fn contains(&self, topic: &str, handle: HandleId) -> bool {
        self.topics
            .get(topic)
            .map(|m| m.contains_key(&handle))
            .unwrap_or(false)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("name", &self.name)
            .field("topics", &self.topics.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use parking_lot::Mutex;

    /// Sink that records frames, or fails every delivery.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub frames: Mutex<Vec<Bytes>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn received(&self) -> Vec<Bytes> {
            self.frames.lock().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Closed);
            }
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    #[test]
    fn test_snapshot_unknown_topic_is_empty() {
        let registry = TopicRegistry::new("test");
        assert!(registry.snapshot("missing").is_empty());
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let registry = TopicRegistry::new("test");
        let sink = Arc::new(RecordingSink::default());

        let handle = registry.subscribe("demo", sink);
        assert_eq!(registry.subscriber_count("demo"), 1);
        assert!(registry.contains("demo", handle));

        assert!(registry.unsubscribe("demo", handle));
        assert!(!registry.contains("demo", handle));
        assert_eq!(registry.topic_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = TopicRegistry::new("test");
        let handle = registry.subscribe("demo", Arc::new(RecordingSink::default()));

        assert!(registry.unsubscribe("demo", handle));
        assert!(!registry.unsubscribe("demo", handle));
        assert!(!registry.unsubscribe("other", handle));
    }

    #[test]
    fn test_topic_keys_are_case_sensitive() {
        let registry = TopicRegistry::new("test");
        registry.subscribe("Demo", Arc::new(RecordingSink::default()));

        assert_eq!(registry.subscriber_count("Demo"), 1);
        assert_eq!(registry.subscriber_count("demo"), 0);
    }

    #[test]
    fn test_fan_out_to_empty_topic_is_noop() {
        let registry = TopicRegistry::new("test");
        let report = registry.fan_out("nobody", Bytes::from_static(b"x"), None);
        assert_eq!(report, FanOut::default());
    }

    #[test]
    fn test_fan_out_evicts_failed_and_continues() {
        let registry = TopicRegistry::new("test");
        let bad = registry.subscribe("demo", Arc::new(RecordingSink::failing()));
        let good_sink = Arc::new(RecordingSink::default());
        let good = registry.subscribe("demo", good_sink.clone());

        let report = registry.fan_out("demo", Bytes::from_static(b"hello"), None);

        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![bad]);
        assert_eq!(good_sink.received(), vec![Bytes::from_static(b"hello")]);
        assert!(!registry.contains("demo", bad));
        assert!(registry.contains("demo", good));
    }

    #[test]
    fn test_fan_out_skips_excluded() {
        let registry = TopicRegistry::new("test");
        let sender_sink = Arc::new(RecordingSink::default());
        let sender = registry.subscribe("demo", sender_sink.clone());
        let peer_sink = Arc::new(RecordingSink::default());
        registry.subscribe("demo", peer_sink.clone());

        let report = registry.fan_out("demo", Bytes::from_static(b"m"), Some(sender));

        assert_eq!(report.attempted(), 1);
        assert!(sender_sink.received().is_empty());
        assert_eq!(peer_sink.received().len(), 1);
    }

    #[test]
    fn test_concurrent_subscribe_unsubscribe_publish() {
        let registry = Arc::new(TopicRegistry::new("test"));
        let mut threads = Vec::new();

        for i in 0..8 {
            let registry = Arc::clone(&registry);
            threads.push(std::thread::spawn(move || {
                let topic = if i % 2 == 0 { "even" } else { "odd" };
                for _ in 0..200 {
                    let handle = registry.subscribe(topic, Arc::new(RecordingSink::default()));
                    registry.fan_out(topic, Bytes::from_static(b"tick"), None);
                    assert!(registry.unsubscribe(topic, handle));
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(registry.topic_count(), 0);
    }
}
