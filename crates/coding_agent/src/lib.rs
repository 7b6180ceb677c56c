//! Sandboxed, tool-using coding agent.
//!
//! ## Provider bootstrap
//!
//! The backend is chosen with `CODING_AGENT_PROVIDER`:
//!
//! - `gemini` (default) talks to the Gemini `generateContent` API and requires
//!   `GEMINI_API_KEY`. `CODING_AGENT_MODEL` and `CODING_AGENT_GEMINI_BASE_URL`
//!   override the model and endpoint.
//! - `mock` answers from a deterministic script and needs no credentials.
//!
//! ## System instructions
//!
//! Set `CODING_AGENT_SYSTEM_INSTRUCTIONS` to replace the built-in prompt,
//! which introduces the four tools and the working-directory rule.
//!
//! ## Sandbox contract
//!
//! Every tool path is resolved against one canonical working directory.
//! Paths that escape it (via `..`, absolute overrides, or symlinks) are
//! rejected before any filesystem access, and the rejection is returned to
//! the model as an ordinary error result.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod instructions;
pub mod providers;
pub mod sandbox;
pub mod tools;

pub use agent::{Agent, AgentError, AgentEvent, AgentOutcome, AgentReport};
pub use config::AgentConfig;
pub use conversation::Conversation;
pub use dispatch::{Dispatcher, ToolName};
pub use sandbox::Sandbox;
pub use tools::{ToolCall, ToolError};
