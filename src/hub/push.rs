//! One-way push channel rendered as a server-sent event stream.
//!
//! Each subscription owns a bounded buffer of pre-framed `data: <json>\n\n`
//! chunks. Publishing is fire-and-forget: at most once, no replay for late
//! subscribers, and a subscriber that stops draining is evicted the first
//! time its buffer is full.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use super::registry::{FanOut, HandleId, TopicRegistry};
use super::sink::{ChannelSink, EventSink};
use crate::error::{HubError, HubResult};

pub const DEFAULT_BUFFER: usize = 64;

/// Render one event as a single SSE frame.
pub fn sse_frame(json: &str) -> Bytes {
    Bytes::from(format!("data: {}\n\n", json))
}

#[derive(Debug)]
pub struct PushChannel {
    registry: TopicRegistry,
    buffer: usize,
}

impl PushChannel {
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: TopicRegistry::new("push"),
            buffer,
        }
    }

    /// Open a subscription on `topic`.
    ///
    /// The returned stream stays registered until it is dropped, which is what
    /// happens when the HTTP layer notices the client went away.
    pub fn open_subscription(self: &Arc<Self>, topic: &str) -> PushSubscription {
        let (sink, rx) = ChannelSink::channel(self.buffer);
        let handle = self.registry.subscribe(topic, Arc::new(sink));

        tracing::info!(topic, %handle, "push subscriber connected");

        PushSubscription {
            rx,
            guard: Some(Unsubscribe {
                channel: Arc::clone(self),
                topic: topic.to_owned(),
                handle,
            }),
        }
    }

    /// Register a caller-provided sink.
    pub fn attach(&self, topic: &str, sink: Arc<dyn EventSink>) -> HandleId {
        self.registry.subscribe(topic, sink)
    }

    pub fn detach(&self, topic: &str, handle: HandleId) -> bool {
        self.registry.unsubscribe(topic, handle)
    }

    /// Publish `event` to every current subscriber of `topic`.
    ///
    /// Delivery failures evict the failing subscriber and are not reported as
    /// errors; the only error is an event that cannot be encoded.
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, event: &T) -> HubResult<FanOut> {
        let json = serde_json::to_string(event).map_err(HubError::Encode)?;
        let report = self.registry.fan_out(topic, sse_frame(&json), None);

        tracing::debug!(
            topic,
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "push event published"
        );
        Ok(report)
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.subscriber_count(topic)
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

struct Unsubscribe {
    channel: Arc<PushChannel>,
    topic: String,
    handle: HandleId,
}

/// Live push subscription: a stream of SSE frames for one topic.
pub struct PushSubscription {
    rx: mpsc::Receiver<Bytes>,
    guard: Option<Unsubscribe>,
}

impl PushSubscription {
    pub fn handle(&self) -> Option<HandleId> {
        self.guard.as_ref().map(|g| g.handle)
    }

    /// Wait for the next frame. `None` once the subscriber was evicted.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Unsubscribe now instead of on drop. Calling it twice is harmless.
    pub fn cancel(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.channel.detach(&guard.topic, guard.handle);
            tracing::info!(topic = %guard.topic, handle = %guard.handle, "push subscriber disconnected");
        }
        self.rx.close();
    }
}

impl Stream for PushSubscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
