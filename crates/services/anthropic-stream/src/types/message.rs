use serde::{Deserialize, Serialize};

use super::content::{ContentBlock, MessageRole};

/// Token usage counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u64,
    /// Output tokens
    pub output_tokens: u64,
    /// Input tokens written to the prompt cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    /// Input tokens read from the prompt cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

/// An assembled assistant message
///
/// Produced by replaying a stream to completion, and equally the shape of a
/// non-streaming Messages API response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Message {
    /// Message ID
    pub id: String,
    /// Role of the message
    pub role: MessageRole,
    /// Model that produced the message
    pub model: String,
    /// Content blocks in index order
    pub content: Vec<ContentBlock>,
    /// Why generation stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Stop sequence that ended generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    /// Token usage
    pub usage: Usage,
}

impl Message {
    /// Concatenated text of all text blocks
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }
}
