use std::sync::Arc;
use std::time::Duration;

use agent_provider::{ModelBackend, ProviderInitError};
use agent_provider_gemini::{GeminiProvider, GeminiProviderConfig, GEMINI_PROVIDER_ID};
use agent_provider_mock::{MockProvider, MOCK_PROVIDER_ID};

pub const DEFAULT_PROVIDER_ID: &str = GEMINI_PROVIDER_ID;
pub const PROVIDER_ENV_VAR: &str = "CODING_AGENT_PROVIDER";
pub const GEMINI_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_ENV_VAR: &str = "CODING_AGENT_MODEL";
pub const GEMINI_BASE_URL_ENV_VAR: &str = "CODING_AGENT_GEMINI_BASE_URL";

const GEMINI_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn provider_from_env() -> Result<Arc<dyn ModelBackend>, ProviderInitError> {
    provider_from_lookup(|key| std::env::var(key).ok())
}

fn provider_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn ModelBackend>, ProviderInitError> {
    let read = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let provider_id = read(PROVIDER_ENV_VAR).unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());

    match provider_id.as_str() {
        GEMINI_PROVIDER_ID => {
            let api_key = read(GEMINI_API_KEY_ENV_VAR).ok_or_else(|| {
                ProviderInitError::new(format!(
                    "Missing {GEMINI_API_KEY_ENV_VAR}; set it or choose {PROVIDER_ENV_VAR}={MOCK_PROVIDER_ID}"
                ))
            })?;

            let mut config = GeminiProviderConfig::new(api_key).with_timeout(GEMINI_REQUEST_TIMEOUT);
            if let Some(model_id) = read(MODEL_ENV_VAR) {
                config = config.with_model_id(model_id);
            }
            if let Some(base_url) = read(GEMINI_BASE_URL_ENV_VAR) {
                config = config.with_base_url(base_url);
            }

            Ok(Arc::new(GeminiProvider::new(config)?))
        }
        MOCK_PROVIDER_ID => {
            let mut provider = MockProvider::default();
            if let Some(model_id) = read(MODEL_ENV_VAR) {
                provider = provider.with_model_id(model_id);
            }
            Ok(Arc::new(provider))
        }
        unknown => Err(ProviderInitError::new(format!(
            "Unsupported provider '{unknown}'. Available providers: {GEMINI_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        ))),
    }
}
