//! Gemini API-backed implementation of the shared `agent_provider` contract.
//!
//! This adapter translates provider-neutral conversation turns into
//! `generateContent` payloads and maps replies back into [`ModelReply`]s.

use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    BackendError, ModelBackend, ModelReply, ModelRequest, Part, ProviderInitError,
    ProviderProfile, Role, TokenUsage, ToolCallRequest, ToolDefinition, Turn,
};
use gemini_api::{
    Content, FunctionDeclaration, GeminiApiClient, GeminiApiConfig, GeminiApiError,
    GenerateContentRequest, GenerateContentResponse,
};

/// Stable provider identifier used by `coding_agent` startup selection.
pub const GEMINI_PROVIDER_ID: &str = "gemini";

/// Model used when the caller does not pick one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-001";

/// Runtime configuration for the Gemini provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl GeminiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_gemini_api_config(self) -> GeminiApiConfig {
        let mut config = GeminiApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait GenerateClient: Send + Sync {
    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiApiError>;
}

#[derive(Debug)]
struct DefaultGenerateClient {
    client: GeminiApiClient,
}

impl GenerateClient for DefaultGenerateClient {
    fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                GeminiApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(self.client.generate_content(model, request))
    }
}

/// `ModelBackend` adapter backed by `gemini_api` transport primitives.
pub struct GeminiProvider {
    model_id: String,
    client: Arc<dyn GenerateClient>,
}

impl GeminiProvider {
    /// Creates a provider using real Gemini API transport.
    pub fn new(config: GeminiProviderConfig) -> Result<Self, ProviderInitError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderInitError::new(
                "Failed to initialize gemini provider: API key is required",
            ));
        }

        let model_id = sanitize_model_id(&config.model_id);
        let client = Arc::new(DefaultGenerateClient {
            client: GeminiApiClient::new(config.into_gemini_api_config())
                .map_err(map_init_error)?,
        });

        Ok(Self { model_id, client })
    }

    #[cfg(test)]
    fn with_client_for_tests(model_id: &str, client: Arc<dyn GenerateClient>) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            client,
        }
    }
}

impl ModelBackend for GeminiProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: GEMINI_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn generate(&self, request: &ModelRequest) -> Result<ModelReply, BackendError> {
        let payload = build_generate_request(request);
        tracing::debug!(
            model = %self.model_id,
            turns = payload.contents.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .generate(&self.model_id, &payload)
            .map_err(|error| BackendError::new(format!("Gemini API request failed: {error}")))?;

        if let Some(reason) = response.block_reason() {
            tracing::warn!(reason, "prompt was blocked by the Gemini API");
        }

        Ok(reply_from_response(response))
    }
}

/// Maps a provider-neutral request onto the `generateContent` wire payload.
fn build_generate_request(request: &ModelRequest) -> GenerateContentRequest {
    let contents = request.turns.iter().map(content_from_turn).collect();

    GenerateContentRequest::new(contents)
        .with_system_instruction(request.instructions.clone())
        .with_function_declarations(request.tools.iter().map(declaration_from_tool).collect())
        .with_max_output_tokens(request.max_output_tokens)
}

fn content_from_turn(turn: &Turn) -> Content {
    // Gemini only accepts `user` and `model`; function responses travel as user content.
    let role = match turn.role {
        Role::Model => "model",
        Role::User | Role::Tool => "user",
    };

    let parts = turn
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => gemini_api::Part::text(text.clone()),
            Part::ToolCall(call) => gemini_api::Part::function_call(
                call.name.clone(),
                serde_json::Value::Object(call.args.clone()),
            ),
            Part::ToolResult(result) => {
                gemini_api::Part::function_response(result.tool_name.clone(), result.to_response())
            }
        })
        .collect();

    Content::new(role, parts)
}

fn declaration_from_tool(tool: &ToolDefinition) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(tool.parameters.clone()),
    }
}

fn reply_from_response(response: GenerateContentResponse) -> ModelReply {
    let text = response.text();
    let usage = response.usage_metadata.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_token_count,
        response_tokens: usage.candidates_token_count,
    });

    let candidates = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .map(turn_from_content)
        .collect();

    ModelReply {
        candidates,
        text,
        usage,
    }
}

fn turn_from_content(content: Content) -> Turn {
    let parts = content
        .parts
        .into_iter()
        .filter_map(|part| {
            if let Some(call) = part.function_call {
                return Some(Part::ToolCall(ToolCallRequest::new(call.name, call.args)));
            }
            part.visible_text().map(|text| Part::Text(text.to_string()))
        })
        .collect();

    Turn {
        role: Role::Model,
        parts,
    }
}

fn sanitize_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_GEMINI_MODEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: GeminiApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize gemini provider: {error}"))
}
