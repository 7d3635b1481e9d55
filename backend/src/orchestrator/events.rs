//! Turn events
//!
//! Every write a turn makes to the session is mirrored as an event so the
//! HTTP layer can stream it to the client.

use crate::chat::models::Message;
use serde::Serialize;
use tokio::sync::mpsc;

/// One observable step of a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A message was appended to the session
    MessageAppended {
        /// Owning session
        session_id: String,
        /// The new message
        message: Message,
    },
    /// A streamed chunk was appended to a message
    Chunk {
        /// Owning session
        session_id: String,
        /// Target message
        message_id: String,
        /// Appended text
        text: String,
    },
    /// Content, media or download of a message changed
    MessageUpdated {
        /// Owning session
        session_id: String,
        /// The message after the write
        message: Message,
    },
    /// A message left the streaming state
    Settled {
        /// Owning session
        session_id: String,
        /// Settled message
        message_id: String,
    },
}

/// Destination for turn events; a closed receiver is ignored
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl EventSink {
    /// A sink and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Publish an event
    pub fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("Turn event receiver closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged_by_type() {
        let event = TurnEvent::Chunk {
            session_id: "s".to_string(),
            message_id: "m".to_string(),
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["message_id"], "m");
    }

    #[tokio::test]
    async fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(TurnEvent::Settled {
            session_id: "s".to_string(),
            message_id: "m".to_string(),
        });
        EventSink::discard().emit(TurnEvent::Settled {
            session_id: "s".to_string(),
            message_id: "m".to_string(),
        });
    }
}
