//! Transport message types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::TransportKind;

/// A decoded unit of input handed to the request handler, or the handler's reply.
///
/// The payload is opaque to the transport layer; its schema belongs to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    /// The raw payload.
    pub payload: Bytes,

    /// Where the message came from.
    pub metadata: TransportMessageMetadata,
}

impl TransportMessage {
    /// Creates a message with default metadata.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            metadata: TransportMessageMetadata::default(),
        }
    }

    /// Creates a message with the given metadata.
    pub fn with_metadata(payload: impl Into<Bytes>, metadata: TransportMessageMetadata) -> Self {
        Self {
            payload: payload.into(),
            metadata,
        }
    }

    /// Returns the size of the payload in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Payload as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Returns the content type of the message, if specified.
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type.as_deref()
    }
}

/// Metadata associated with a [`TransportMessage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessageMetadata {
    /// Binding that received the message.
    pub transport: Option<TransportKind>,

    /// MIME type of the payload (e.g. "application/json").
    pub content_type: Option<String>,

    /// Remote peer address, for network bindings.
    pub peer: Option<String>,

    /// Per-connection identifier (WebSocket connection id, SSE session id).
    pub session_id: Option<String>,
}

impl TransportMessageMetadata {
    /// Metadata for a message received by `transport`.
    pub fn from_transport(transport: TransportKind) -> Self {
        Self {
            transport: Some(transport),
            ..Default::default()
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the remote peer.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Set the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_accessors() {
        let msg = TransportMessage::with_metadata(
            "{\"id\":1}",
            TransportMessageMetadata::from_transport(TransportKind::Http)
                .with_content_type("application/json")
                .with_peer("127.0.0.1:5000"),
        );
        assert_eq!(msg.size(), 8);
        assert_eq!(msg.as_str(), Some("{\"id\":1}"));
        assert_eq!(msg.content_type(), Some("application/json"));
        assert_eq!(msg.metadata.transport, Some(TransportKind::Http));
    }

    #[test]
    fn test_non_utf8_payload() {
        let msg = TransportMessage::new(vec![0xff, 0xfe]);
        assert!(msg.as_str().is_none());
    }
}
