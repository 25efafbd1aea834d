//! Bidirectional relay for live preview mirroring between editors.
//!
//! Payloads are opaque JSON. A message from one member is relayed to the
//! other members of the same topic; the sender does not get its own message
//! back unless `echo_to_sender` is enabled.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use super::push::DEFAULT_BUFFER;
use super::registry::{FanOut, HandleId, TopicRegistry};
use super::sink::ChannelSink;
use crate::error::{HubError, HubResult};

#[derive(Debug, Clone, Copy)]
pub struct DuplexConfig {
    /// Per-member outbound buffer, in messages.
    pub buffer: usize,
    /// Relay a message back to the member that sent it.
    pub echo_to_sender: bool,
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
            echo_to_sender: false,
        }
    }
}

#[derive(Debug)]
pub struct DuplexChannel {
    registry: TopicRegistry,
    config: DuplexConfig,
}

impl DuplexChannel {
    pub fn new(config: DuplexConfig) -> Self {
        Self {
            registry: TopicRegistry::new("duplex"),
            config,
        }
    }

    pub fn config(&self) -> DuplexConfig {
        self.config
    }

    /// Register a new member of `topic`.
    pub fn connect(self: &Arc<Self>, topic: &str) -> DuplexMember {
        let (sink, rx) = ChannelSink::channel(self.config.buffer);
        let handle = self.registry.subscribe(topic, Arc::new(sink));

        tracing::info!(topic, %handle, "duplex member connected");

        DuplexMember {
            channel: Arc::clone(self),
            topic: topic.to_owned(),
            handle,
            rx,
            connected: true,
        }
    }

    /// Relay one raw inbound message from `from` to the rest of `topic`.
    ///
    /// A payload that is not JSON fails only this call; the member stays
    /// connected. The value is re-encoded so every recipient gets the same
    /// compact text.
    pub fn on_message(&self, topic: &str, from: HandleId, raw: &str) -> HubResult<FanOut> {
        let value: Value = serde_json::from_str(raw).map_err(HubError::MalformedPayload)?;
        self.relay(topic, from, &value)
    }

    pub fn relay(&self, topic: &str, from: HandleId, value: &Value) -> HubResult<FanOut> {
        let text = serde_json::to_string(value).map_err(HubError::Encode)?;
        let exclude = (!self.config.echo_to_sender).then_some(from);
        let report = self.registry.fan_out(topic, Bytes::from(text), exclude);

        tracing::trace!(
            topic,
            from = %from,
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "duplex message relayed"
        );
        Ok(report)
    }

    /// Remove a member. Idempotent.
    pub fn on_disconnect(&self, topic: &str, handle: HandleId) -> bool {
        let removed = self.registry.unsubscribe(topic, handle);
        if removed {
            tracing::info!(topic, %handle, "duplex member disconnected");
        }
        removed
    }

    pub fn member_count(&self, topic: &str) -> usize {
        self.registry.subscriber_count(topic)
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }
}

impl Default for DuplexChannel {
    fn default() -> Self {
        Self::new(DuplexConfig::default())
    }
}

/// One live duplex connection.
///
/// Dropping the member disconnects it if [`DuplexMember::disconnect`] was not
/// called first.
pub struct DuplexMember {
    channel: Arc<DuplexChannel>,
    topic: String,
    handle: HandleId,
    rx: mpsc::Receiver<Bytes>,
    connected: bool,
}

impl DuplexMember {
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Relay a raw message from this member to its peers.
    pub fn send(&self, raw: &str) -> HubResult<FanOut> {
        self.channel.on_message(&self.topic, self.handle, raw)
    }

    /// Next message relayed to this member. `None` once evicted or disconnected.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    pub fn disconnect(&mut self) {
        if std::mem::replace(&mut self.connected, false) {
            self.channel.on_disconnect(&self.topic, self.handle);
            self.rx.close();
        }
    }
}

impl Drop for DuplexMember {
    fn drop(&mut self) {
        self.disconnect();
    }
}
