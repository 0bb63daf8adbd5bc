//! Acknowledgment and status output of the indexing sink.
//!
//! The host runtime hands every delivered record to the sink together with an
//! [`AckToken`]. The sink reports back through an [`OutputCollector`]: one
//! `ack` or `fail` per token, plus status events on [`STATUS_STREAM`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crawl_indexer_shared::{Metadata, Record, StatusEvent};

/// Name of the stream status events are emitted on.
pub const STATUS_STREAM: &str = "status";

/// Identifier the host assigns to one delivery of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(u64);

impl DeliveryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle back to the host's delivery tracking for one record.
///
/// Carries the url and metadata needed to emit the record's status event
/// after the record itself has been consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct AckToken {
    id: DeliveryId,
    url: String,
    metadata: Arc<Metadata>,
}

impl AckToken {
    pub fn new(id: DeliveryId, url: impl Into<String>, metadata: Arc<Metadata>) -> Self {
        Self {
            id,
            url: url.into(),
            metadata,
        }
    }

    /// Token for a delivered record, sharing the record's metadata.
    pub fn for_record(id: DeliveryId, record: &Record) -> Self {
        Self::new(id, record.url.clone(), Arc::clone(&record.metadata))
    }

    pub fn id(&self) -> DeliveryId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }
}

/// Output side of the host runtime, as seen by a sink.
///
/// The sink calls exactly one of `ack` / `fail` per token.
pub trait OutputCollector: Send + Sync {
    /// Emit an event on a named stream, anchored to the record it describes.
    fn emit(&self, stream: &str, anchor: &AckToken, event: StatusEvent);

    /// The record was handled; the host must not redeliver it.
    fn ack(&self, token: &AckToken);

    /// The record failed; the host may redeliver it.
    fn fail(&self, token: &AckToken);
}

/// Everything a [`ChannelCollector`] forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorMessage {
    Emit {
        stream: String,
        anchor: DeliveryId,
        event: StatusEvent,
    },
    Ack(AckToken),
    Fail(AckToken),
}

/// Collector that forwards acknowledgments and events over a tokio channel.
///
/// The channel is unbounded so reporting never blocks the sink; the receiver
/// is drained by the orchestrator.
#[derive(Debug, Clone)]
pub struct ChannelCollector {
    tx: mpsc::UnboundedSender<CollectorMessage>,
}

impl ChannelCollector {
    /// Create a collector and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CollectorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, message: CollectorMessage) {
        if let Err(e) = self.tx.send(message) {
            warn!(message = ?e.0, "Collector channel closed, dropping message");
        }
    }
}

impl OutputCollector for ChannelCollector {
    fn emit(&self, stream: &str, anchor: &AckToken, event: StatusEvent) {
        self.send(CollectorMessage::Emit {
            stream: stream.to_string(),
            anchor: anchor.id(),
            event,
        });
    }

    fn ack(&self, token: &AckToken) {
        self.send(CollectorMessage::Ack(token.clone()));
    }

    fn fail(&self, token: &AckToken) {
        self.send(CollectorMessage::Fail(token.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawl_indexer_shared::Status;

    #[test]
    fn test_token_shares_record_metadata() {
        let record = Record::new("https://example.com/", "x", Metadata::new());
        let token = AckToken::for_record(DeliveryId::new(7), &record);

        assert_eq!(token.id().get(), 7);
        assert_eq!(token.url(), "https://example.com/");
        assert!(Arc::ptr_eq(token.metadata(), &record.metadata));
    }

    #[tokio::test]
    async fn test_channel_collector_forwards_in_order() {
        let (collector, mut rx) = ChannelCollector::channel();
        let record = Record::new("https://example.com/", "x", Metadata::new());
        let token = AckToken::for_record(DeliveryId::new(1), &record);

        collector.emit(
            STATUS_STREAM,
            &token,
            StatusEvent::new(token.url(), Arc::clone(token.metadata()), Status::Fetched),
        );
        collector.ack(&token);

        match rx.recv().await.unwrap() {
            CollectorMessage::Emit { stream, anchor, event } => {
                assert_eq!(stream, STATUS_STREAM);
                assert_eq!(anchor, DeliveryId::new(1));
                assert_eq!(event.status, Status::Fetched);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), CollectorMessage::Ack(token));
    }

    #[test]
    fn test_send_after_receiver_dropped_does_not_panic() {
        let (collector, rx) = ChannelCollector::channel();
        drop(rx);

        let record = Record::empty("https://example.com/", Metadata::new());
        collector.fail(&AckToken::for_record(DeliveryId::new(1), &record));
    }
}
