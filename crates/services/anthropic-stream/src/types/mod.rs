//! Type definitions for assembled messages and incremental deltas

/// Content blocks, roles and deltas
pub mod content;
/// The assembled message and its usage counters
pub mod message;

pub use content::{ContentBlock, Delta, MessageRole};
pub use message::{Message, Usage};
