use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// User message
    User,
    /// Assistant message
    #[default]
    Assistant,
}

/// A finished (or best-effort) content block of an assembled message
///
/// Serializes to the shape the Messages API accepts back as conversation
/// history, so a thinking block can be replayed with its signature intact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text {
        /// The full text
        #[serde(default)]
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// The full reasoning text
        #[serde(default)]
        thinking: String,
        /// Signature the service uses to verify replayed thinking
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool invocation
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Parsed tool arguments; `None` when they never arrived intact
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
}

impl ContentBlock {
    /// Text of a text block
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Reasoning text of a thinking block
    #[must_use]
    pub fn as_thinking(&self) -> Option<&str> {
        match self {
            Self::Thinking { thinking, .. } => Some(thinking),
            _ => None,
        }
    }
}

/// Incremental content handed to a [`DeltaConsumer`](crate::stream::DeltaConsumer)
///
/// Carries only the newly arrived fragment, never the accumulated total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// A text fragment
    Text {
        /// Index of the block the fragment belongs to
        index: usize,
        /// The fragment
        text: String,
    },
    /// A reasoning fragment
    Thinking {
        /// Index of the block the fragment belongs to
        index: usize,
        /// The fragment
        thinking: String,
    },
}

impl Delta {
    /// Block index this delta belongs to
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Text { index, .. } | Self::Thinking { index, .. } => *index,
        }
    }

    /// Text fragment, if this is a text delta
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Thinking { .. } => None,
        }
    }

    /// Reasoning fragment, if this is a thinking delta
    #[must_use]
    pub fn thinking(&self) -> Option<&str> {
        match self {
            Self::Thinking { thinking, .. } => Some(thinking),
            Self::Text { .. } => None,
        }
    }
}
