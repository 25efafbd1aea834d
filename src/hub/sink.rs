use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// Destination for frames fanned out to one subscriber.
///
/// Implementations must not block: the registry calls `deliver` for every
/// subscriber of a topic in turn, and a slow sink should report
/// [`DeliveryError::Lagging`] instead of stalling the others.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError>;
}

/// Bounded channel sink backing both push subscriptions and duplex members.
///
/// FIFO per subscriber, so sequential publishes arrive in call order.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink with room for `capacity` undelivered frames.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
