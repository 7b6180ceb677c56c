//! Transport-only Gemini API client primitives.
//!
//! This crate owns request building, wire payload shapes, retry policy and
//! error parsing for the `generateContent` endpoint. It contains no
//! conversation orchestration and no tool execution.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::GeminiApiClient;
pub use config::GeminiApiConfig;
pub use error::GeminiApiError;
pub use payload::{
    Candidate, Content, FunctionCall, FunctionDeclaration, FunctionResponse,
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part, Tool, UsageMetadata,
};
pub use url::generate_content_url;
