//! Typed Messages API stream events.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::sse::SseFrame;
use crate::types::content::MessageRole;

/// Streaming event types from the Anthropic Messages API
///
/// Event kinds this crate does not know decode to [`Event::Unknown`] so new
/// upstream events degrade to no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Message creation started
    MessageStart {
        /// The message envelope being built
        message: MessageStartPayload,
    },
    /// Content block started
    ContentBlockStart {
        /// Index of the content block
        #[serde(default)]
        index: usize,
        /// Initial content block data
        #[serde(default)]
        content_block: ContentBlockStartData,
    },
    /// Delta update for a content block
    ContentBlockDelta {
        /// Index of the content block being updated
        #[serde(default)]
        index: usize,
        /// The delta data
        delta: ContentBlockDeltaData,
    },
    /// Content block completed
    ContentBlockStop {
        /// Index of the completed content block
        #[serde(default)]
        index: usize,
        /// Trailing block fields (thinking signature)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_block: Option<ContentBlockStopData>,
    },
    /// Message metadata delta (`stop_reason`, usage)
    MessageDelta {
        /// Delta containing `stop_reason`
        #[serde(default)]
        delta: MessageDeltaPayload,
        /// Updated usage counters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<MessageDeltaUsage>,
    },
    /// Message streaming completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// Error reported by the service mid-stream
    Error {
        /// Error details
        error: EventError,
    },
    /// Any event type not listed above
    #[serde(other)]
    Unknown,
}

/// Payload for `message_start` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MessageStartPayload {
    /// Message ID
    pub id: String,
    /// Role (always "assistant" from the service)
    pub role: MessageRole,
    /// Model used
    pub model: String,
    /// Stop reason (None initially)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Stop sequence (None initially)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    /// Initial usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<MessageDeltaUsage>,
}

/// Content block type at start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockStartData {
    /// Text block
    Text {
        /// Initial text (usually empty string)
        #[serde(default)]
        text: String,
    },
    /// Extended thinking block
    Thinking {
        /// Initial reasoning text (usually empty string)
        #[serde(default)]
        thinking: String,
    },
    /// Tool use block
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Initial input (usually empty object)
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Block kinds this crate does not assemble
    #[serde(other)]
    Unknown,
}

impl Default for ContentBlockStartData {
    fn default() -> Self {
        Self::Text {
            text: String::new(),
        }
    }
}

/// Content block delta data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlockDeltaData {
    /// Text delta
    TextDelta {
        /// Text to append
        text: String,
    },
    /// Thinking delta
    ThinkingDelta {
        /// Reasoning text to append
        thinking: String,
    },
    /// JSON delta for tool input
    InputJsonDelta {
        /// Partial JSON to append
        partial_json: String,
    },
    /// Signature delta for a thinking block
    SignatureDelta {
        /// Signature text to append
        signature: String,
    },
    /// Catch-all for unknown/future delta types
    #[serde(other)]
    Unknown,
}

/// Trailing fields carried by `content_block_stop`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ContentBlockStopData {
    /// Final thinking signature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Message delta payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MessageDeltaPayload {
    /// Stop reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Stop sequence that triggered stop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

/// Usage counters carried by `message_start` and `message_delta`
///
/// Absent counters leave the accumulated value untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MessageDeltaUsage {
    /// Input tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    /// Output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    /// Cache creation input tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    /// Cache read input tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

/// Error details in error event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventError {
    /// Error type
    #[serde(rename = "type")]
    pub kind: String,
    /// Error message
    pub message: String,
}

impl Event {
    /// Parse an SSE frame into a typed Event
    ///
    /// The payload's `type` field decides the kind; the SSE `event:` name is
    /// used when the payload has none. An empty payload is treated as an
    /// object with only that type.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Decode`] if the payload is not a JSON object of
    /// the declared shape, and [`StreamError::MissingEventType`] if no type
    /// can be determined.
    pub fn from_frame(frame: &SseFrame) -> Result<Self, StreamError> {
        let label = frame.event.as_deref().unwrap_or("event");
        let decode_err = |source: serde_json::Error| StreamError::Decode {
            event: label.to_string(),
            source,
        };

        let mut value: serde_json::Value = if frame.data.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&frame.data).map_err(decode_err)?
        };

        let Some(object) = value.as_object_mut() else {
            return Err(decode_err(<serde_json::Error as serde::de::Error>::custom(
                "payload is not a JSON object",
            )));
        };

        let payload_type = object
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        match (payload_type.as_deref(), frame.event.as_deref()) {
            (Some(kind), Some(event)) if kind != event => {
                tracing::debug!(sse_event = %event, payload_type = %kind, "event name mismatch");
            }
            (Some(_), _) => {}
            (None, Some(event)) => {
                object.insert("type".into(), serde_json::Value::String(event.to_string()));
            }
            (None, None) => return Err(StreamError::MissingEventType),
        }

        serde_json::from_value(value).map_err(decode_err)
    }

    /// Wire name of the event kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Ping => "ping",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}
