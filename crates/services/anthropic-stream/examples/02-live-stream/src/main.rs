//! Live streaming example against the Messages API.
//!
//! This example demonstrates:
//! - Sending a streaming request with plain `reqwest`
//! - Printing text deltas as they arrive
//! - Collecting the assembled message once the stream ends
//!
//! Requires `ANTHROPIC_API_KEY`. `ANTHROPIC_HOST` and `ANTHROPIC_VERSION`
//! override the API base URL and version header.

use std::io::Write as _;

use anthropic_stream::{Delta, StreamConfig, StreamDecoder, collect_response};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")?;
    let host =
        std::env::var("ANTHROPIC_HOST").unwrap_or_else(|_| "https://api.anthropic.com".into());
    let version = std::env::var("ANTHROPIC_VERSION").unwrap_or_else(|_| "2023-06-01".into());

    let response = reqwest::Client::new()
        .post(format!("{host}/v1/messages"))
        .header("x-api-key", api_key)
        .header("anthropic-version", version)
        .json(&json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 256,
            "stream": true,
            "messages": [{"role": "user", "content": "Write a haiku about Rust"}]
        }))
        .send()
        .await?
        .error_for_status()?;

    println!("Streaming response:\n");
    let decoder = StreamDecoder::new(StreamConfig::from_env()?).with_consumer(|delta: &Delta| {
        if let Some(text) = delta.text() {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
    });
    let outcome = collect_response(response, decoder).await?;

    println!("\n\nStop reason: {:?}", outcome.message.stop_reason);
    println!(
        "Token usage: {} in / {} out",
        outcome.message.usage.input_tokens, outcome.message.usage.output_tokens
    );
    if !outcome.is_clean() {
        println!("Stream was not clean: {:?}", outcome.errors);
    }

    Ok(())
}
