//! Replays a captured SSE body through the decoder.
//!
//! This example demonstrates:
//! - Feeding a body in small chunks, as a network read would deliver it
//! - Printing text and reasoning deltas as they arrive
//! - Inspecting the assembled message and any recorded errors
//!
//! Usage: `cargo run -- [path/to/capture.sse] [chunk-size]`

use anthropic_stream::{ContentBlock, Delta, StreamConfig, StreamDecoder};

const SAMPLE: &str = include_str!("../capture.sse");

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let body = match args.next() {
        Some(path) => std::fs::read(path)?,
        None => SAMPLE.as_bytes().to_vec(),
    };
    let chunk_size: usize = args.next().map_or(Ok(64), |s| s.parse())?;

    let mut decoder = StreamDecoder::new(StreamConfig::from_env()?).with_consumer(|delta: &Delta| {
        match delta {
            Delta::Thinking { thinking, .. } => print!("\x1b[2m{thinking}\x1b[0m"),
            Delta::Text { text, .. } => print!("{text}"),
        }
    });
    for chunk in body.chunks(chunk_size.max(1)) {
        decoder.feed(chunk)?;
    }
    let outcome = decoder.finish()?;
    println!();

    println!("\nAssembled message {}:", outcome.message.id);
    for (i, block) in outcome.message.content.iter().enumerate() {
        match block {
            ContentBlock::Text { text } => println!("  [{i}] text: {text}"),
            ContentBlock::Thinking {
                thinking,
                signature,
            } => println!(
                "  [{i}] thinking ({} chars, signed: {})",
                thinking.len(),
                signature.is_some()
            ),
            ContentBlock::ToolUse { name, input, .. } => match input {
                Some(input) => println!("  [{i}] tool call: {name}({input})"),
                None => println!("  [{i}] tool call: {name} (arguments incomplete)"),
            },
        }
    }

    println!("\nStop reason: {:?}", outcome.message.stop_reason);
    println!("Token usage:");
    println!("  Input: {}", outcome.message.usage.input_tokens);
    println!("  Output: {}", outcome.message.usage.output_tokens);

    if !outcome.completed {
        println!("\nStream ended before message_stop");
    }
    for err in &outcome.errors {
        eprintln!("warning: {err}");
    }

    Ok(())
}
