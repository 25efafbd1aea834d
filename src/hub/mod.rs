//! Real-time broadcast hub.
//!
//! Two independent transports share the same topic model (one topic per
//! script):
//!
//! - **push** ([`PushChannel`]): server → viewer control events over SSE
//!   (`next`, `prev`, `goto`, `reset`, `reload`, `focus`, or anything else);
//! - **duplex** ([`DuplexChannel`]): editor ↔ editor preview relay over a
//!   WebSocket.
//!
//! [`BroadcastHub`] wires requests and connections to the two managers. It
//! keeps no topic state of its own.

pub mod duplex;
pub mod event;
pub mod push;
pub mod registry;
pub mod sink;

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;

pub use duplex::{DuplexChannel, DuplexConfig, DuplexMember};
pub use event::ControlEvent;
pub use push::{PushChannel, PushSubscription};
pub use registry::{FanOut, HandleId, TopicRegistry};
pub use sink::{ChannelSink, EventSink};

use crate::config::HubConfig;
use crate::error::HubResult;

#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    push: Arc<PushChannel>,
    duplex: Arc<DuplexChannel>,
}

impl BroadcastHub {
    pub fn new(push: PushChannel, duplex: DuplexChannel) -> Self {
        Self {
            push: Arc::new(push),
            duplex: Arc::new(duplex),
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(
            PushChannel::new(config.subscriber_buffer),
            DuplexChannel::new(DuplexConfig {
                buffer: config.subscriber_buffer,
                echo_to_sender: config.echo_to_sender,
            }),
        )
    }

    pub fn push(&self) -> &Arc<PushChannel> {
        &self.push
    }

    pub fn duplex(&self) -> &Arc<DuplexChannel> {
        &self.duplex
    }

    /// Forward a control payload verbatim to the push subscribers of `topic`.
    pub fn control(&self, topic: &str, payload: &Value) -> HubResult<FanOut> {
        let event = ControlEvent::classify(payload);
        tracing::info!(topic, kind = event.kind().unwrap_or("?"), "control event");
        self.push.publish(topic, payload)
    }

    /// Tell viewers of `topic` that its content changed.
    pub fn reload(&self, topic: &str) -> HubResult<FanOut> {
        self.control(topic, &ControlEvent::Reload.to_value())
    }

    pub fn subscribe_events(&self, topic: &str) -> PushSubscription {
        self.push.open_subscription(topic)
    }

    /// Drive one duplex connection until either side goes away.
    ///
    /// Inbound text (or UTF-8 binary) frames are relayed to the topic's other
    /// members, and frames relayed to this member are written back out. The
    /// member is disconnected exactly once on every exit path: client close,
    /// transport error, failed write or eviction.
    pub async fn serve_duplex<S, E>(&self, topic: &str, socket: S)
    where
        S: Stream<Item = Result<Message, E>> + Sink<Message> + Send,
        E: Display + Send,
    {
        let mut member = self.duplex.connect(topic);
        let (mut sender, mut receiver) = socket.split();

        loop {
            tokio::select! {
                inbound = receiver.next() => match inbound {
                    Some(Ok(Message::Text(text))) => relay_inbound(&member, text.as_str()),
                    Some(Ok(Message::Binary(bin))) => match std::str::from_utf8(&bin) {
                        Ok(text) => relay_inbound(&member, text),
                        Err(_) => tracing::debug!(topic, handle = %member.handle(), "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Err(err)) => {
                        tracing::debug!(topic, handle = %member.handle(), error = %err, "duplex connection error");
                        break;
                    }
                },
                outbound = member.recv() => match outbound {
                    Some(frame) => {
                        let text = String::from_utf8_lossy(&frame).into_owned();
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(topic, handle = %member.handle(), "duplex member evicted");
                        break;
                    }
                },
            }
        }

        member.disconnect();
    }
}

fn relay_inbound(member: &DuplexMember, raw: &str) {
    if let Err(err) = member.send(raw) {
        tracing::debug!(
            topic = member.topic(),
            handle = %member.handle(),
            error = %err,
            "dropping inbound duplex message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_control_forwards_verbatim() {
        let hub = BroadcastHub::default();
        let mut viewer = hub.subscribe_events("demo");

        let payload = json!({"type": "next", "source": "agent"});
        hub.control("demo", &payload).unwrap();

        let frame = viewer.recv().await.unwrap();
        assert_eq!(
            frame,
            bytes::Bytes::from(format!("data: {}\n\n", payload))
        );
    }

    #[tokio::test]
    async fn test_reload_publishes_reload_event() {
        let hub = BroadcastHub::default();
        let mut viewer = hub.subscribe_events("demo");

        let report = hub.reload("demo").unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(
            viewer.recv().await.unwrap(),
            bytes::Bytes::from_static(b"data: {\"type\":\"reload\"}\n\n")
        );
    }

    #[tokio::test]
    async fn test_transports_are_independent() {
        let hub = BroadcastHub::default();
        let mut viewer = hub.subscribe_events("demo");
        let editor = hub.duplex().connect("demo");
        let _peer = hub.duplex().connect("demo");

        editor.send(r#"{"type":"preview","blocks":[]}"#).unwrap();
        assert_eq!(hub.push().subscriber_count("demo"), 1);
        assert!(futures::FutureExt::now_or_never(viewer.recv()).is_none());
    }

    #[test]
    fn test_from_config_applies_echo_setting() {
        let config = HubConfig {
            echo_to_sender: true,
            subscriber_buffer: 8,
            ..Default::default()
        };
        let hub = BroadcastHub::from_config(&config);
        assert!(hub.duplex().config().echo_to_sender);
        assert_eq!(hub.duplex().config().buffer, 8);
    }
}
