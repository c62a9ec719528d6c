#![deny(clippy::all)]
#![deny(missing_docs)]

//! # `anthropic-stream`
//!
//! Incremental decoder for Anthropic Messages API streaming responses.
//!
//! Raw response bytes go in, arriving in arbitrary chunks. Text and reasoning
//! fragments come out as they are decoded. When the stream ends you get the
//! fully assembled [`Message`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use anthropic_stream::{Delta, StreamConfig, StreamDecoder, collect_response};
//!
//! # async fn example(response: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = StreamDecoder::new(StreamConfig::from_env()?).with_consumer(|delta: &Delta| {
//!     if let Some(text) = delta.text() {
//!         print!("{text}");
//!     }
//! });
//!
//! let outcome = collect_response(response, decoder).await?;
//! println!("\nstop reason: {:?}", outcome.message.stop_reason);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - [`sse`] frames bytes into records
//! - [`events`] decodes records into typed [`Event`]s
//! - [`accumulator`] folds events into a [`Message`]
//! - [`stream`] drives all three and forwards [`Delta`]s to a [`DeltaConsumer`]
//!
//! ## Error handling
//!
//! By default malformed events are logged, recorded in
//! [`StreamOutcome::errors`] and skipped. Enable strict mode with
//! [`StreamConfig::with_strict`] to abort on structural errors instead.

/// Folds events into an assembled message
pub mod accumulator;
/// Decoder configuration
pub mod config;
/// Error types
pub mod error;
/// Typed stream events
pub mod events;
/// Server-sent events framing
pub mod sse;
/// Stream drivers and delta consumers
pub mod stream;
/// Message, content block and delta types
pub mod types;

pub use crate::accumulator::{Accumulator, MAX_CONTENT_BLOCKS};
pub use crate::config::StreamConfig;
pub use crate::error::{Result, StreamError};
pub use crate::events::Event;
pub use crate::sse::{SSEDecoder, SseFrame};
#[cfg(feature = "http")]
pub use crate::stream::{collect_response, event_stream_from_response};
pub use crate::stream::{
    DeltaConsumer, EventStream, NoopConsumer, StreamDecoder, StreamOutcome, collect_stream,
    event_stream,
};
pub use crate::types::{ContentBlock, Delta, Message, MessageRole, Usage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::types::*;
    pub use crate::{DeltaConsumer, StreamConfig, StreamDecoder, StreamError, StreamOutcome};
}
