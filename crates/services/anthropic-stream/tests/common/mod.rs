//! Builders for SSE bodies used across integration tests

#![expect(dead_code, reason = "each test binary uses a different subset of these builders")]

use serde_json::{Value, json};

/// One SSE record with an `event:` line and a JSON `data:` line
pub fn record(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

pub fn message_start(id: &str) -> String {
    record(
        "message_start",
        &json!({
            "type": "message_start",
            "message": {
                "id": id,
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-5",
                "content": [],
                "stop_reason": null,
                "stop_sequence": null,
                "usage": {"input_tokens": 12, "output_tokens": 1}
            }
        }),
    )
}

pub fn block_start(index: usize, content_block: &Value) -> String {
    record(
        "content_block_start",
        &json!({"type": "content_block_start", "index": index, "content_block": content_block}),
    )
}

pub fn text_start(index: usize) -> String {
    block_start(index, &json!({"type": "text", "text": ""}))
}

pub fn thinking_start(index: usize) -> String {
    block_start(index, &json!({"type": "thinking", "thinking": ""}))
}

pub fn tool_start(index: usize, id: &str, name: &str) -> String {
    block_start(
        index,
        &json!({"type": "tool_use", "id": id, "name": name, "input": {}}),
    )
}

pub fn delta(index: usize, delta: &Value) -> String {
    record(
        "content_block_delta",
        &json!({"type": "content_block_delta", "index": index, "delta": delta}),
    )
}

pub fn text_delta(index: usize, text: &str) -> String {
    delta(index, &json!({"type": "text_delta", "text": text}))
}

pub fn thinking_delta(index: usize, thinking: &str) -> String {
    delta(index, &json!({"type": "thinking_delta", "thinking": thinking}))
}

pub fn json_delta(index: usize, partial_json: &str) -> String {
    delta(
        index,
        &json!({"type": "input_json_delta", "partial_json": partial_json}),
    )
}

pub fn signature_delta(index: usize, signature: &str) -> String {
    delta(
        index,
        &json!({"type": "signature_delta", "signature": signature}),
    )
}

pub fn block_stop(index: usize) -> String {
    record(
        "content_block_stop",
        &json!({"type": "content_block_stop", "index": index}),
    )
}

pub fn block_stop_with_signature(index: usize, signature: &str) -> String {
    record(
        "content_block_stop",
        &json!({
            "type": "content_block_stop",
            "index": index,
            "content_block": {"signature": signature}
        }),
    )
}

pub fn message_delta(stop_reason: &str, output_tokens: u64) -> String {
    record(
        "message_delta",
        &json!({
            "type": "message_delta",
            "delta": {"stop_reason": stop_reason, "stop_sequence": null},
            "usage": {"output_tokens": output_tokens}
        }),
    )
}

pub fn ping() -> String {
    record("ping", &json!({"type": "ping"}))
}

pub fn message_stop() -> String {
    record("message_stop", &json!({"type": "message_stop"}))
}

/// A complete stream mixing reasoning, text and a tool call
pub fn mixed_stream() -> String {
    [
        message_start("msg_mixed"),
        thinking_start(0),
        thinking_delta(0, "Let me "),
        thinking_delta(0, "check."),
        signature_delta(0, "EqQBCgIYAh"),
        block_stop(0),
        ping(),
        text_start(1),
        text_delta(1, "Looking up "),
        text_delta(1, "the weather. ☀️"),
        block_stop(1),
        tool_start(2, "toolu_01", "get_weather"),
        json_delta(2, ""),
        json_delta(2, "{\"location\": \"San"),
        json_delta(2, " Francisco, CA\", \"unit\": \"c"),
        json_delta(2, "elsius\"}"),
        block_stop(2),
        message_delta("tool_use", 89),
        message_stop(),
    ]
    .concat()
}

/// Sets or removes an environment variable for the guard's lifetime.
///
/// Only use from tests marked `#[serial(env)]`.
pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, val: &str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: callers hold the `env` serial lock
        unsafe { std::env::set_var(key, val) };
        Self { key, prev }
    }

    pub fn remove(key: &'static str) -> Self {
        let prev = std::env::var(key).ok();
        // SAFETY: callers hold the `env` serial lock
        unsafe { std::env::remove_var(key) };
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: callers hold the `env` serial lock
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(self.key, v) },
            None => unsafe { std::env::remove_var(self.key) },
        }
    }
}
