//! Stream drivers: bytes in, deltas out, a [`Message`] at the end.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use tracing::{trace, warn};

use crate::accumulator::Accumulator;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::events::Event;
use crate::sse::{SSEDecoder, SseFrame};
use crate::types::content::Delta;
use crate::types::message::Message;

/// Type alias for the event stream returned by [`event_stream`]
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, StreamError>> + Send + 'static>>;

/// Receives text and reasoning fragments as they are decoded
///
/// Called synchronously, once per fragment, before the next event is
/// processed. Never called for structural events or for tool-argument and
/// signature fragments.
pub trait DeltaConsumer {
    /// Handle one fragment
    fn on_delta(&mut self, delta: &Delta);
}

impl<F> DeltaConsumer for F
where
    F: FnMut(&Delta),
{
    fn on_delta(&mut self, delta: &Delta) {
        self(delta);
    }
}

/// Consumer that discards every delta
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConsumer;

impl DeltaConsumer for NoopConsumer {
    fn on_delta(&mut self, _delta: &Delta) {}
}

/// Result of decoding one stream
#[derive(Debug)]
pub struct StreamOutcome {
    /// The assembled message (best effort if the stream ended early)
    pub message: Message,
    /// Recoverable errors in the order they occurred
    pub errors: Vec<StreamError>,
    /// Whether `message_stop` was received
    pub completed: bool,
}

impl StreamOutcome {
    /// Completed without any recorded error
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.completed && self.errors.is_empty()
    }
}

/// Incremental decoder for one Messages API stream
///
/// Feed it raw body chunks as they arrive; each text or reasoning fragment is
/// handed to the consumer before `feed` returns.
///
/// ```
/// use anthropic_stream::{StreamConfig, StreamDecoder};
///
/// let mut out = String::new();
/// let mut decoder = StreamDecoder::new(StreamConfig::default())
///     .with_consumer(|d: &anthropic_stream::Delta| out.push_str(d.text().unwrap_or_default()));
/// decoder.feed(b"event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n")?;
/// decoder.feed(b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n")?;
/// let outcome = decoder.finish()?;
/// assert_eq!(outcome.message.text(), "Hi");
/// assert_eq!(out, "Hi");
/// # Ok::<(), anthropic_stream::StreamError>(())
/// ```
pub struct StreamDecoder<C = NoopConsumer> {
    config: StreamConfig,
    sse: SSEDecoder,
    accumulator: Accumulator,
    consumer: C,
    errors: Vec<StreamError>,
}

impl<C> std::fmt::Debug for StreamDecoder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("config", &self.config)
            .field("accumulator", &self.accumulator)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

impl StreamDecoder {
    /// Creates a decoder without a consumer
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            sse: SSEDecoder::with_limit(config.max_record_bytes()),
            config,
            accumulator: Accumulator::new(),
            consumer: NoopConsumer,
            errors: Vec::new(),
        }
    }
}

impl<C: DeltaConsumer> StreamDecoder<C> {
    /// Replaces the consumer
    #[must_use]
    pub fn with_consumer<D: DeltaConsumer>(self, consumer: D) -> StreamDecoder<D> {
        StreamDecoder {
            config: self.config,
            sse: self.sse,
            accumulator: self.accumulator,
            consumer,
            errors: self.errors,
        }
    }

    /// Feeds one chunk of the response body.
    ///
    /// # Errors
    ///
    /// Only in strict mode: returns the first structural error. In the
    /// default mode errors are recorded and decoding continues.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        for item in self.sse.decode(chunk) {
            match item {
                Ok(frame) => self.process_frame(&frame)?,
                Err(err) => self.record(err),
            }
        }
        Ok(())
    }

    /// Decodes and applies one already-framed SSE record.
    ///
    /// # Errors
    ///
    /// Same as [`feed`](Self::feed).
    pub fn process_frame(&mut self, frame: &SseFrame) -> Result<(), StreamError> {
        let event = match Event::from_frame(frame) {
            Ok(event) => event,
            Err(err) => {
                self.record(err);
                return Ok(());
            }
        };
        trace!(event = event.kind(), id = ?frame.id, "decoded stream event");

        match self.accumulator.apply(&event) {
            Ok(Some(delta)) => self.consumer.on_delta(&delta),
            Ok(None) => {}
            Err(err) if self.config.strict() && err.is_structural() => return Err(err),
            Err(err) => self.record(err),
        }
        Ok(())
    }

    /// Whether `message_stop` has been processed
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.accumulator.is_complete()
    }

    /// The accumulator holding the in-progress message
    #[must_use]
    pub const fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Errors recorded so far
    #[must_use]
    pub fn errors(&self) -> &[StreamError] {
        &self.errors
    }

    /// Ends the stream normally, flushing any unterminated final record.
    ///
    /// # Errors
    ///
    /// Same as [`feed`](Self::feed).
    pub fn finish(mut self) -> Result<StreamOutcome, StreamError> {
        if let Some(frame) = self.sse.flush() {
            self.process_frame(&frame)?;
        }
        self.take_framing_errors();
        Ok(self.into_outcome())
    }

    /// Ends the stream after a transport failure.
    ///
    /// Buffered partial data is discarded; the outcome carries what was
    /// assembled so far plus a [`StreamError::Transport`].
    #[must_use]
    pub fn abort(mut self, reason: impl Into<String>) -> StreamOutcome {
        self.record(StreamError::Transport(reason.into()));
        self.into_outcome()
    }

    fn into_outcome(self) -> StreamOutcome {
        let completed = self.accumulator.is_complete();
        StreamOutcome {
            message: self.accumulator.into_message(),
            errors: self.errors,
            completed,
        }
    }

    fn take_framing_errors(&mut self) {
        for err in self.sse.take_errors() {
            self.record(err);
        }
    }

    fn record(&mut self, err: StreamError) {
        warn!(error = %err, "skipping stream event");
        self.errors.push(err);
    }
}

/// Drives a decoder from an async byte stream until it ends.
///
/// Each chunk is fully decoded, consumer calls included, before the next one
/// is pulled. Stops pulling once `message_stop` has been seen. A failing
/// chunk ends decoding with [`StreamDecoder::abort`].
///
/// # Errors
///
/// Only in strict mode, see [`StreamDecoder::feed`].
pub async fn collect_stream<S, B, E, C>(
    stream: S,
    mut decoder: StreamDecoder<C>,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    C: DeltaConsumer,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => decoder.feed(bytes.as_ref())?,
            Err(e) => return Ok(decoder.abort(e.to_string())),
        }
        if decoder.is_complete() {
            break;
        }
    }
    decoder.finish()
}

/// Decodes a `reqwest` response body into a [`StreamOutcome`]
///
/// # Errors
///
/// Only in strict mode, see [`StreamDecoder::feed`].
#[cfg(feature = "http")]
pub async fn collect_response<C: DeltaConsumer>(
    response: reqwest::Response,
    decoder: StreamDecoder<C>,
) -> Result<StreamOutcome, StreamError> {
    collect_stream(response.bytes_stream(), decoder).await
}

/// Converts an async byte stream into a stream of typed events
///
/// Framing and decode errors are yielded in place and the stream continues;
/// a transport error is yielded last.
#[must_use]
pub fn event_stream<S, B, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(futures::stream::unfold(
        (
            Box::pin(byte_stream),
            SSEDecoder::new(),
            VecDeque::new(),
            false,
        ),
        |(mut stream, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (stream, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        let items = decoder.decode(chunk.as_ref());
                        enqueue(&mut pending, items);
                    }
                    Some(Err(e)) => {
                        done = true;
                        pending.push_back(Err(StreamError::Transport(e.to_string())));
                    }
                    None => {
                        done = true;
                        let mut items: Vec<_> = decoder.flush().into_iter().map(Ok).collect();
                        items.extend(decoder.take_errors().into_iter().map(Err));
                        enqueue(&mut pending, items);
                    }
                }
            }
        },
    ))
}

/// Event stream over a `reqwest` response body
///
/// The stream owns the response and will close the connection when dropped.
#[cfg(feature = "http")]
#[must_use]
pub fn event_stream_from_response(response: reqwest::Response) -> EventStream {
    event_stream(response.bytes_stream())
}

fn enqueue(
    pending: &mut VecDeque<Result<Event, StreamError>>,
    items: Vec<Result<SseFrame, StreamError>>,
) {
    pending.extend(
        items
            .into_iter()
            .map(|item| item.and_then(|frame| Event::from_frame(&frame))),
    );
}
