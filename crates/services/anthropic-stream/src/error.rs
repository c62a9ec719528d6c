use thiserror::Error;

/// Errors produced while decoding a Messages API event stream.
///
/// Only [`StreamError::Transport`] and, in strict mode, the structural
/// variants end ingestion. Everything else is recorded in
/// [`StreamOutcome::errors`](crate::stream::StreamOutcome::errors) and the
/// stream keeps going.
#[derive(Debug, Error)]
pub enum StreamError {
    /// An SSE record could not be framed and was skipped
    #[error("SSE framing error: {reason}")]
    Framing {
        /// Why the record was dropped
        reason: String,
    },

    /// An event payload was not valid JSON for its declared type
    #[error("failed to decode {event} payload: {source}")]
    Decode {
        /// Event type the payload was decoded as
        event: String,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// A record carried neither an `event:` line nor a payload `type`
    #[error("SSE record has no event type")]
    MissingEventType,

    /// A delta or stop referenced a block that was never started
    #[error("{event} for unknown block index {index}")]
    UnknownBlockIndex {
        /// Block index referenced by the event
        index: usize,
        /// Event type that referenced it
        event: &'static str,
    },

    /// `content_block_start` named an index past the supported block count
    #[error("content block index {index} exceeds limit of {limit} blocks")]
    BlockIndexOutOfRange {
        /// Block index referenced by the event
        index: usize,
        /// Maximum number of blocks per message
        limit: usize,
    },

    /// `content_block_start` arrived twice for the same index
    #[error("content block {index} was already started")]
    BlockAlreadyStarted {
        /// Block index
        index: usize,
    },

    /// A delta or stop arrived after the block was stopped
    #[error("content block {index} is already closed")]
    BlockClosed {
        /// Block index
        index: usize,
    },

    /// Accumulated tool arguments were not valid JSON at block stop
    #[error("invalid tool input JSON for block {index}: {source}")]
    ToolInput {
        /// Block index of the tool call
        index: usize,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// The service sent an `error` event mid-stream
    #[error("API error event ({kind}): {message}")]
    Api {
        /// Error type reported by the service
        kind: String,
        /// Error message reported by the service
        message: String,
    },

    /// The byte source failed before the stream completed
    #[error("stream transport failed: {0}")]
    Transport(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StreamError {
    /// Whether the error concerns the block structure of the stream rather
    /// than its framing or encoding.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownBlockIndex { .. }
                | Self::BlockIndexOutOfRange { .. }
                | Self::BlockAlreadyStarted { .. }
                | Self::BlockClosed { .. }
                | Self::ToolInput { .. }
        )
    }
}

/// Convenience alias for results in this crate
pub type Result<T> = std::result::Result<T, StreamError>;
