//! Minimal provider-agnostic contract for one model round-trip.
//!
//! This crate defines the conversation history types replayed to a model,
//! the host-mediated tool-calling envelopes, and the [`ModelBackend`] trait
//! implemented by concrete providers. It excludes transport details and
//! loop orchestration.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde_json::{json, Map, Value};

/// Shared cancellation flag checked between agent iterations.
pub type CancelSignal = Arc<AtomicBool>;

/// String-keyed tool-call argument mapping.
pub type ToolArguments = Map<String, Value>;

/// Error returned while constructing/configuring a provider before any run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The backend could not produce a usable reply for a request.
///
/// This is the only failure that ends an agent loop early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model backend unavailable: {}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// Author of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Tool => "tool",
        }
    }
}

/// Tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: ToolArguments,
}

impl ToolCallRequest {
    /// Builds a request from a JSON object; non-object values yield empty arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            name: name.into(),
            args,
        }
    }
}

/// Outcome payload of one tool invocation: exactly one of result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Result(Value),
    Error(String),
}

/// Host tool call result handed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub payload: ToolPayload,
}

impl ToolResult {
    /// Constructs a successful tool result.
    #[must_use]
    pub fn success(tool_name: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: ToolPayload::Result(content.into()),
        }
    }

    /// Constructs a tool error result.
    #[must_use]
    pub fn error(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: ToolPayload::Error(message.into()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ToolPayload::Error(_))
    }

    /// Wire envelope: `{"Result": ...}` on success, `{"error": ...}` on failure.
    #[must_use]
    pub fn to_response(&self) -> Value {
        match &self.payload {
            ToolPayload::Result(value) => json!({ "Result": value }),
            ToolPayload::Error(message) => json!({ "error": message }),
        }
    }
}

/// One piece of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    ToolCall(ToolCallRequest),
    ToolResult(ToolResult),
}

impl Part {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Provider-neutral, model-facing history item.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    #[must_use]
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Model turn carrying only tool-call requests.
    #[must_use]
    pub fn model_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Model,
            parts: calls.into_iter().map(Part::ToolCall).collect(),
        }
    }

    /// Single tool turn bundling every result of one model turn.
    #[must_use]
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            parts: results.into_iter().map(Part::ToolResult).collect(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(Part::as_text)
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRequest> {
        self.parts.iter().filter_map(|part| match part {
            Part::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn tool_results_iter(&self) -> impl Iterator<Item = &ToolResult> {
        self.parts.iter().filter_map(|part| match part {
            Part::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// Generic host-mediated tool definition exposed to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Input for one model round-trip: the whole history plus fixed capabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub turns: Vec<Turn>,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub max_output_tokens: Option<u32>,
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

/// Reply to one model round-trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    /// Candidate contents in the order the backend produced them.
    pub candidates: Vec<Turn>,
    /// Canonical text field, when the backend reports one.
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    /// Reply with a single text candidate and matching canonical text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            candidates: vec![Turn::model_text(text.clone())],
            text: Some(text),
            usage: None,
        }
    }

    /// Reply with a single candidate requesting the given tool calls.
    #[must_use]
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            candidates: vec![Turn::model_tool_calls(calls)],
            text: None,
            usage: None,
        }
    }

    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// All tool-call requests across candidates, in order.
    #[must_use]
    pub fn requested_tool_calls(&self) -> Vec<ToolCallRequest> {
        self.candidates
            .iter()
            .flat_map(Turn::tool_calls)
            .cloned()
            .collect()
    }

    /// Best-effort final text: the canonical text when present and non-empty,
    /// otherwise every text part across candidates joined by newlines.
    #[must_use]
    pub fn final_text(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|text| !text.is_empty()) {
            return text.to_string();
        }

        self.candidates
            .iter()
            .flat_map(Turn::texts)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Immutable metadata describing a model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for one blocking model round-trip.
pub trait ModelBackend: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Sends the full request and returns the backend reply.
    ///
    /// An `Err` means nothing usable came back; callers treat it as fatal
    /// for the current run.
    fn generate(&self, request: &ModelRequest) -> Result<ModelReply, BackendError>;
}
