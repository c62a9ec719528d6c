//! Reassembly of stream events into a [`Message`].

use tracing::{debug, trace};

use crate::error::StreamError;
use crate::events::{
    ContentBlockDeltaData, ContentBlockStartData, ContentBlockStopData, Event, MessageDeltaUsage,
};
use crate::types::content::{ContentBlock, Delta};
use crate::types::message::{Message, Usage};

/// Highest number of content blocks one message may carry
pub const MAX_CONTENT_BLOCKS: usize = 4096;

/// Accumulates streaming events into a complete message
///
/// Blocks live in slots addressed by their stream index. Each slot is only
/// mutated between its own `content_block_start` and `content_block_stop`.
///
/// # Example
///
/// ```ignore
/// let mut acc = Accumulator::new();
/// while let Some(event) = events.next() {
///     if let Some(delta) = acc.apply(&event?)? {
///         print!("{}", delta.text().unwrap_or_default());
///     }
/// }
/// let message = acc.into_message();
/// ```
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    message: Message,
    slots: Vec<Option<Slot>>,
    complete: bool,
}

#[derive(Debug, Clone)]
struct Slot {
    block: BlockState,
    open: bool,
}

#[derive(Debug, Clone)]
enum BlockState {
    Text(String),
    Thinking {
        thinking: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        input: Option<serde_json::Value>,
        partial_json: Option<String>,
    },
    Opaque,
}

impl BlockState {
    fn from_start(data: &ContentBlockStartData) -> Self {
        match data {
            ContentBlockStartData::Text { text } => Self::Text(text.clone()),
            ContentBlockStartData::Thinking { thinking } => Self::Thinking {
                thinking: thinking.clone(),
                signature: None,
            },
            ContentBlockStartData::ToolUse { id, name, input } => Self::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: (!input.is_null()).then(|| input.clone()),
                partial_json: None,
            },
            ContentBlockStartData::Unknown => Self::Opaque,
        }
    }

    fn to_block(&self) -> Option<ContentBlock> {
        match self {
            Self::Text(text) => Some(ContentBlock::Text { text: text.clone() }),
            Self::Thinking {
                thinking,
                signature,
            } => Some(ContentBlock::Thinking {
                thinking: thinking.clone(),
                signature: signature.clone(),
            }),
            Self::ToolUse {
                id,
                name,
                input,
                partial_json,
            } => {
                // Unparsed argument text means the call never finished
                let input = match partial_json {
                    Some(buf) if !buf.is_empty() => None,
                    _ => input.clone(),
                };
                Some(ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input,
                })
            }
            Self::Opaque => None,
        }
    }
}

fn merge_usage(usage: &mut Usage, update: &MessageDeltaUsage) {
    if let Some(v) = update.input_tokens {
        usage.input_tokens = v;
    }
    if let Some(v) = update.output_tokens {
        usage.output_tokens = v;
    }
    if update.cache_creation_input_tokens.is_some() {
        usage.cache_creation_input_tokens = update.cache_creation_input_tokens;
    }
    if update.cache_read_input_tokens.is_some() {
        usage.cache_read_input_tokens = update.cache_read_input_tokens;
    }
}

impl Accumulator {
    /// Create a new accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event to the accumulator
    ///
    /// Returns the text or reasoning fragment the event carried, if any.
    /// Events after `message_stop` are ignored.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the event references a block that was
    /// never started or is already closed, or if a tool call's arguments are
    /// not valid JSON at block stop. The event's effect is abandoned; state
    /// from earlier events is kept. An `error` event is returned as
    /// [`StreamError::Api`].
    pub fn apply(&mut self, event: &Event) -> Result<Option<Delta>, StreamError> {
        if self.complete {
            trace!(event = event.kind(), "ignoring event after message_stop");
            return Ok(None);
        }

        match event {
            Event::MessageStart { message } => {
                self.message.id.clone_from(&message.id);
                self.message.model.clone_from(&message.model);
                self.message.role = message.role;
                self.message.stop_reason.clone_from(&message.stop_reason);
                self.message.stop_sequence.clone_from(&message.stop_sequence);
                self.message.usage = Usage::default();
                if let Some(usage) = &message.usage {
                    merge_usage(&mut self.message.usage, usage);
                }
            }
            Event::ContentBlockStart {
                index,
                content_block,
            } => self.start_block(*index, content_block)?,
            Event::ContentBlockDelta { index, delta } => return self.apply_delta(*index, delta),
            Event::ContentBlockStop {
                index,
                content_block,
            } => self.stop_block(*index, content_block.as_ref())?,
            Event::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.message.stop_reason.clone_from(&delta.stop_reason);
                }
                if delta.stop_sequence.is_some() {
                    self.message.stop_sequence.clone_from(&delta.stop_sequence);
                }
                if let Some(usage) = usage {
                    merge_usage(&mut self.message.usage, usage);
                }
            }
            Event::MessageStop => {
                self.complete = true;
            }
            Event::Ping => {}
            Event::Error { error } => {
                return Err(StreamError::Api {
                    kind: error.kind.clone(),
                    message: error.message.clone(),
                });
            }
            Event::Unknown => debug!("ignoring unrecognized stream event"),
        }

        Ok(None)
    }

    fn start_block(
        &mut self,
        index: usize,
        content_block: &ContentBlockStartData,
    ) -> Result<(), StreamError> {
        if index >= MAX_CONTENT_BLOCKS {
            return Err(StreamError::BlockIndexOutOfRange {
                index,
                limit: MAX_CONTENT_BLOCKS,
            });
        }
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = &mut self.slots[index];
        if slot.is_some() {
            return Err(StreamError::BlockAlreadyStarted { index });
        }
        if matches!(content_block, ContentBlockStartData::Unknown) {
            debug!(index, "ignoring unrecognized content block kind");
        }
        *slot = Some(Slot {
            block: BlockState::from_start(content_block),
            open: true,
        });
        Ok(())
    }

    fn open_slot(&mut self, index: usize, event: &'static str) -> Result<&mut Slot, StreamError> {
        match self.slots.get_mut(index).and_then(Option::as_mut) {
            None => Err(StreamError::UnknownBlockIndex { index, event }),
            Some(slot) if !slot.open => Err(StreamError::BlockClosed { index }),
            Some(slot) => Ok(slot),
        }
    }

    fn apply_delta(
        &mut self,
        index: usize,
        delta: &ContentBlockDeltaData,
    ) -> Result<Option<Delta>, StreamError> {
        let slot = self.open_slot(index, "content_block_delta")?;
        let emitted = match (&mut slot.block, delta) {
            (BlockState::Text(text), ContentBlockDeltaData::TextDelta { text: fragment }) => {
                text.push_str(fragment);
                Some(Delta::Text {
                    index,
                    text: fragment.clone(),
                })
            }
            (
                BlockState::Thinking { thinking, .. },
                ContentBlockDeltaData::ThinkingDelta { thinking: fragment },
            ) => {
                thinking.push_str(fragment);
                Some(Delta::Thinking {
                    index,
                    thinking: fragment.clone(),
                })
            }
            (
                BlockState::ToolUse { partial_json, .. },
                ContentBlockDeltaData::InputJsonDelta {
                    partial_json: fragment,
                },
            ) => {
                partial_json.get_or_insert_with(String::new).push_str(fragment);
                None
            }
            (
                BlockState::Thinking { signature, .. },
                ContentBlockDeltaData::SignatureDelta { signature: fragment },
            ) => {
                signature.get_or_insert_with(String::new).push_str(fragment);
                None
            }
            // Forward-compatible: ignore mismatched or unknown delta types
            _ => None,
        };
        Ok(emitted)
    }

    fn stop_block(
        &mut self,
        index: usize,
        trailer: Option<&ContentBlockStopData>,
    ) -> Result<(), StreamError> {
        let slot = self.open_slot(index, "content_block_stop")?;
        slot.open = false;
        match &mut slot.block {
            BlockState::ToolUse {
                input,
                partial_json,
                ..
            } => {
                if let Some(buf) = partial_json.take()
                    && !buf.is_empty()
                {
                    match serde_json::from_str(&buf) {
                        Ok(value) => *input = Some(value),
                        Err(source) => {
                            *input = None;
                            return Err(StreamError::ToolInput { index, source });
                        }
                    }
                }
            }
            BlockState::Thinking { signature, .. } => {
                if let Some(sig) = trailer.and_then(|t| t.signature.as_ref()) {
                    *signature = Some(sig.clone());
                }
            }
            BlockState::Text(_) | BlockState::Opaque => {}
        }
        Ok(())
    }

    /// Whether `message_stop` has been processed
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Get current accumulated text (convenience method)
    ///
    /// Returns concatenated text from all text blocks.
    #[must_use]
    pub fn current_text(&self) -> String {
        self.slots
            .iter()
            .flatten()
            .filter_map(|slot| match &slot.block {
                BlockState::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Get current accumulated reasoning text across all thinking blocks
    #[must_use]
    pub fn current_thinking(&self) -> String {
        self.slots
            .iter()
            .flatten()
            .filter_map(|slot| match &slot.block {
                BlockState::Thinking { thinking, .. } => Some(thinking.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Best-effort message assembled from the events seen so far
    ///
    /// Blocks appear in index order; indices that were never started and
    /// block kinds this crate does not assemble are omitted.
    #[must_use]
    pub fn snapshot(&self) -> Message {
        let mut message = self.message.clone();
        message.content = self
            .slots
            .iter()
            .flatten()
            .filter_map(|slot| slot.block.to_block())
            .collect();
        message
    }

    /// Consume the accumulator, returning the assembled message
    #[must_use]
    pub fn into_message(self) -> Message {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventError, MessageDeltaPayload, MessageStartPayload};
    use crate::types::content::MessageRole;

    fn start() -> Event {
        Event::MessageStart {
            message: MessageStartPayload {
                id: "msg_test".to_string(),
                role: MessageRole::Assistant,
                model: "claude".to_string(),
                stop_reason: None,
                stop_sequence: None,
                usage: Some(MessageDeltaUsage {
                    input_tokens: Some(10),
                    output_tokens: Some(1),
                    ..Default::default()
                }),
            },
        }
    }

    fn text_start(index: usize) -> Event {
        Event::ContentBlockStart {
            index,
            content_block: ContentBlockStartData::Text {
                text: String::new(),
            },
        }
    }

    fn text_delta(index: usize, text: &str) -> Event {
        Event::ContentBlockDelta {
            index,
            delta: ContentBlockDeltaData::TextDelta {
                text: text.to_string(),
            },
        }
    }

    fn stop(index: usize) -> Event {
        Event::ContentBlockStop {
            index,
            content_block: None,
        }
    }

    fn tool_start(index: usize) -> Event {
        Event::ContentBlockStart {
            index,
            content_block: ContentBlockStartData::ToolUse {
                id: "toolu_1".to_string(),
                name: "get_weather".to_string(),
                input: serde_json::json!({}),
            },
        }
    }

    fn json_delta(index: usize, partial: &str) -> Event {
        Event::ContentBlockDelta {
            index,
            delta: ContentBlockDeltaData::InputJsonDelta {
                partial_json: partial.to_string(),
            },
        }
    }

    #[test]
    fn text_blocks() {
        let mut acc = Accumulator::new();
        assert!(acc.apply(&start()).unwrap().is_none());
        assert!(acc.apply(&text_start(0)).unwrap().is_none());

        let d = acc.apply(&text_delta(0, "Hello, ")).unwrap().unwrap();
        assert_eq!(d.text(), Some("Hello, "));
        let d = acc.apply(&text_delta(0, "world!")).unwrap().unwrap();
        assert_eq!(d.text(), Some("world!"));
        assert_eq!(acc.current_text(), "Hello, world!");

        acc.apply(&stop(0)).unwrap();
        acc.apply(&Event::MessageDelta {
            delta: MessageDeltaPayload {
                stop_reason: Some("end_turn".to_string()),
                stop_sequence: None,
            },
            usage: Some(MessageDeltaUsage {
                output_tokens: Some(3),
                ..Default::default()
            }),
        })
        .unwrap();
        acc.apply(&Event::MessageStop).unwrap();
        assert!(acc.is_complete());

        let msg = acc.into_message();
        assert_eq!(msg.id, "msg_test");
        assert_eq!(
            msg.content,
            vec![ContentBlock::Text {
                text: "Hello, world!".into()
            }]
        );
        assert_eq!(msg.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(msg.usage.input_tokens, 10);
        assert_eq!(msg.usage.output_tokens, 3);
    }

    #[test]
    fn tool_use_input_json() {
        let mut acc = Accumulator::new();
        acc.apply(&start()).unwrap();
        acc.apply(&tool_start(0)).unwrap();
        assert!(acc.apply(&json_delta(0, r#"{"city":"#)).unwrap().is_none());
        assert!(acc.apply(&json_delta(0, r#""Paris"}"#)).unwrap().is_none());
        acc.apply(&stop(0)).unwrap();

        match &acc.snapshot().content[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "get_weather");
                assert_eq!(input.as_ref().unwrap()["city"], "Paris");
            }
            other => panic!("Expected ToolUse block, got {other:?}"),
        }
    }

    #[test]
    fn tool_use_without_arguments_keeps_initial_input() {
        let mut acc = Accumulator::new();
        acc.apply(&tool_start(0)).unwrap();
        acc.apply(&stop(0)).unwrap();
        assert!(matches!(
            &acc.snapshot().content[0],
            ContentBlock::ToolUse { input: Some(v), .. } if v == &serde_json::json!({})
        ));
    }

    #[test]
    fn tool_use_invalid_json_keeps_prior_blocks() {
        let mut acc = Accumulator::new();
        acc.apply(&start()).unwrap();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&text_delta(0, "before")).unwrap();
        acc.apply(&stop(0)).unwrap();
        acc.apply(&tool_start(1)).unwrap();
        acc.apply(&json_delta(1, r#"{"city": invalid"#)).unwrap();

        let err = acc.apply(&stop(1)).unwrap_err();
        assert!(matches!(err, StreamError::ToolInput { index: 1, .. }));
        assert!(err.to_string().contains("tool input JSON"));

        let msg = acc.snapshot();
        assert_eq!(msg.content[0].as_text(), Some("before"));
        assert!(matches!(
            &msg.content[1],
            ContentBlock::ToolUse { input: None, .. }
        ));
    }

    #[test]
    fn thinking_with_signature_on_stop() {
        let mut acc = Accumulator::new();
        acc.apply(&Event::ContentBlockStart {
            index: 0,
            content_block: ContentBlockStartData::Thinking {
                thinking: String::new(),
            },
        })
        .unwrap();
        for part in ["thin", "king"] {
            let d = acc
                .apply(&Event::ContentBlockDelta {
                    index: 0,
                    delta: ContentBlockDeltaData::ThinkingDelta {
                        thinking: part.to_string(),
                    },
                })
                .unwrap()
                .unwrap();
            assert_eq!(d.thinking(), Some(part));
        }
        acc.apply(&Event::ContentBlockStop {
            index: 0,
            content_block: Some(ContentBlockStopData {
                signature: Some("sig1".into()),
            }),
        })
        .unwrap();

        assert_eq!(acc.current_thinking(), "thinking");
        assert_eq!(
            acc.snapshot().content,
            vec![ContentBlock::Thinking {
                thinking: "thinking".into(),
                signature: Some("sig1".into())
            }]
        );
    }

    #[test]
    fn signature_deltas_accumulate_silently() {
        let mut acc = Accumulator::new();
        acc.apply(&Event::ContentBlockStart {
            index: 0,
            content_block: ContentBlockStartData::Thinking {
                thinking: String::new(),
            },
        })
        .unwrap();
        for part in ["Eq", "Qx"] {
            let out = acc
                .apply(&Event::ContentBlockDelta {
                    index: 0,
                    delta: ContentBlockDeltaData::SignatureDelta {
                        signature: part.to_string(),
                    },
                })
                .unwrap();
            assert!(out.is_none());
        }
        acc.apply(&stop(0)).unwrap();
        assert!(matches!(
            &acc.snapshot().content[0],
            ContentBlock::Thinking { signature: Some(s), .. } if s == "EqQx"
        ));
    }

    #[test]
    fn delta_invalid_index() {
        let mut acc = Accumulator::new();
        acc.apply(&start()).unwrap();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&text_delta(0, "kept")).unwrap();

        let err = acc.apply(&text_delta(1, "lost")).unwrap_err();
        assert!(err.to_string().contains("unknown block index"));
        assert_eq!(acc.current_text(), "kept");
    }

    #[test]
    fn start_index_past_limit_is_rejected() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&text_delta(0, "kept")).unwrap();

        for index in [MAX_CONTENT_BLOCKS, 4_000_000_000, usize::MAX] {
            let err = acc.apply(&text_start(index)).unwrap_err();
            assert!(matches!(err, StreamError::BlockIndexOutOfRange { .. }));
            assert!(err.is_structural());
        }
        acc.apply(&text_start(MAX_CONTENT_BLOCKS - 1)).unwrap();
        acc.apply(&text_delta(0, "!")).unwrap();
        assert_eq!(acc.current_text(), "kept!");
    }

    #[test]
    fn delta_after_stop_is_rejected() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&stop(0)).unwrap();
        let err = acc.apply(&text_delta(0, "late")).unwrap_err();
        assert!(matches!(err, StreamError::BlockClosed { index: 0 }));
        assert_eq!(acc.current_text(), "");
    }

    #[test]
    fn duplicate_start_keeps_first_variant() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(0)).unwrap();
        let err = acc.apply(&tool_start(0)).unwrap_err();
        assert!(matches!(err, StreamError::BlockAlreadyStarted { index: 0 }));
        assert!(acc.apply(&text_delta(0, "still text")).unwrap().is_some());
    }

    #[test]
    fn indices_address_slots_not_arrival_order() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(1)).unwrap();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&text_delta(1, "second")).unwrap();
        acc.apply(&text_delta(0, "first")).unwrap();
        acc.apply(&stop(0)).unwrap();
        acc.apply(&stop(1)).unwrap();
        let content = acc.snapshot().content;
        assert_eq!(content[0].as_text(), Some("first"));
        assert_eq!(content[1].as_text(), Some("second"));
    }

    #[test]
    fn mismatched_and_unknown_deltas_are_ignored() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(0)).unwrap();
        assert!(acc.apply(&json_delta(0, "{}")).unwrap().is_none());
        let out = acc
            .apply(&Event::ContentBlockDelta {
                index: 0,
                delta: ContentBlockDeltaData::Unknown,
            })
            .unwrap();
        assert!(out.is_none());
        assert_eq!(acc.current_text(), "");
    }

    #[test]
    fn unknown_block_kind_is_omitted() {
        let mut acc = Accumulator::new();
        acc.apply(&Event::ContentBlockStart {
            index: 0,
            content_block: ContentBlockStartData::Unknown,
        })
        .unwrap();
        acc.apply(&text_delta(0, "ignored")).unwrap();
        acc.apply(&stop(0)).unwrap();
        acc.apply(&text_start(1)).unwrap();
        acc.apply(&text_delta(1, "shown")).unwrap();
        let content = acc.snapshot().content;
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].as_text(), Some("shown"));
    }

    #[test]
    fn usage_overwrites_only_present_fields() {
        let mut acc = Accumulator::new();
        acc.apply(&start()).unwrap();
        acc.apply(&Event::MessageDelta {
            delta: MessageDeltaPayload::default(),
            usage: Some(MessageDeltaUsage {
                cache_read_input_tokens: Some(7),
                ..Default::default()
            }),
        })
        .unwrap();
        let usage = acc.snapshot().usage;
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 1);
        assert_eq!(usage.cache_read_input_tokens, Some(7));
    }

    #[test]
    fn events_after_message_stop_are_ignored() {
        let mut acc = Accumulator::new();
        acc.apply(&text_start(0)).unwrap();
        acc.apply(&Event::MessageStop).unwrap();
        assert!(acc.apply(&text_delta(0, "late")).unwrap().is_none());
        assert!(acc.apply(&text_delta(9, "late")).unwrap().is_none());
        assert_eq!(acc.current_text(), "");
    }

    #[test]
    fn ping_and_unknown_are_noops() {
        let mut acc = Accumulator::new();
        acc.apply(&start()).unwrap();
        assert!(acc.apply(&Event::Ping).unwrap().is_none());
        assert!(acc.apply(&Event::Unknown).unwrap().is_none());
        assert_eq!(acc.snapshot().id, "msg_test");
    }

    #[test]
    fn error_event_surfaces_as_api_error() {
        let mut acc = Accumulator::new();
        let err = acc
            .apply(&Event::Error {
                error: EventError {
                    kind: "overloaded_error".into(),
                    message: "Overloaded".into(),
                },
            })
            .unwrap_err();
        assert!(matches!(err, StreamError::Api { ref kind, .. } if kind == "overloaded_error"));
    }

    #[test]
    fn unfinished_tool_call_has_no_input() {
        let mut acc = Accumulator::new();
        acc.apply(&tool_start(0)).unwrap();
        acc.apply(&json_delta(0, r#"{"ci"#)).unwrap();
        assert!(matches!(
            &acc.snapshot().content[0],
            ContentBlock::ToolUse { input: None, .. }
        ));
    }
}
