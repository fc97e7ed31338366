//! Host event protocol.
//!
//! The pipeline reports progress and delivers results through a stream of
//! events. The host hands the pipeline a channel sender; a host that is not
//! interested (or has gone away) is tolerated; emission never fails the
//! pipeline.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// An event emitted toward the host application.
///
/// Serializes to the host's wire shape:
/// `{"type": "status", "data": {"description": ..., "done": ...}}` and
/// `{"type": "message", "data": {"description": ..., "content": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HostEvent {
    /// A progress notification for one pipeline stage.
    Status {
        /// Human-readable stage description.
        description: String,
        /// Whether the described stage has finished.
        done: bool,
    },
    /// Final content delivery (display document plus download links), or a
    /// structured error message in place of the success content.
    Message {
        /// Human-readable summary of the delivered content.
        description: String,
        /// The content itself, in host markdown.
        content: String,
    },
}

/// Sends [`HostEvent`]s to the host, tolerating an absent receiver.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<HostEvent>>,
}

impl EventSink {
    /// Creates a sink that forwards events to the given sender.
    pub fn new(tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a sink that discards all events.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Creates a connected sink together with its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Emits a status event.
    pub fn status(&self, description: impl Into<String>, done: bool) {
        self.emit(HostEvent::Status {
            description: description.into(),
            done,
        });
    }

    /// Emits a message event.
    pub fn message(&self, description: impl Into<String>, content: impl Into<String>) {
        self.emit(HostEvent::Message {
            description: description.into(),
            content: content.into(),
        });
    }

    fn emit(&self, event: HostEvent) {
        if let Some(ref tx) = self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("host event receiver dropped; discarding event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_wire_shape() {
        let event = HostEvent::Status {
            description: "Rendering 3d model...".to_string(),
            done: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "status",
                "data": {"description": "Rendering 3d model...", "done": false}
            })
        );
    }

    #[test]
    fn test_message_wire_shape() {
        let event = HostEvent::Message {
            description: "A 3d model".to_string(),
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["data"]["content"], "hello");
    }

    #[test]
    fn test_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.status("first", false);
        sink.status("first", true);
        sink.message("done", "content");

        assert_eq!(
            rx.try_recv().unwrap(),
            HostEvent::Status { description: "first".to_string(), done: false }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            HostEvent::Status { description: "first".to_string(), done: true }
        );
        assert!(matches!(rx.try_recv().unwrap(), HostEvent::Message { .. }));
    }

    #[test]
    fn test_disconnected_sink_is_silent() {
        let sink = EventSink::disconnected();
        sink.status("ignored", true);
        sink.message("ignored", "ignored");
    }

    #[test]
    fn test_dropped_receiver_is_tolerated() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.status("after drop", false);
    }
}
