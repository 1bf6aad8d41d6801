//! Multi-account GitHub Copilot gateway.
//!
//! Exposes OpenAI- and Anthropic-compatible HTTP surfaces in front of the
//! Copilot chat backend. Each stored account gets a long-lived in-memory
//! instance holding a refreshable Copilot session token and a cached model
//! catalog; a pool key multiplexes client requests across running instances
//! under a round-robin or priority policy. Anthropic traffic is translated to
//! the OpenAI chat-completions dialect on the way in and back (incrementally
//! for SSE streams) on the way out.

pub mod console;
pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
pub mod proxy;
#[cfg(test)]
mod test_utils;

pub use error::{AppError, AppResult};
