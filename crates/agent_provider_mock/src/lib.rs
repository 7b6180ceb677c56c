//! Deterministic mock implementation of the shared `agent_provider` contract.
//!
//! Replies are scripted up front and handed out one per round-trip. This
//! crate contains no transport logic and is intended for local development
//! and loop-level integration testing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use agent_provider::{
    BackendError, ModelBackend, ModelReply, ModelRequest, ProviderProfile,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const DEFAULT_FALLBACK_TEXT: &str = "Mock run completed.";

/// What the mock does once every scripted reply has been consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum Exhausted {
    /// Keep answering with this reply.
    Repeat(ModelReply),
    /// Fail every further round-trip.
    Fail(String),
}

/// Scripted mock backend used by `coding_agent` tests and offline runs.
#[derive(Debug)]
pub struct MockProvider {
    model_id: String,
    script: Mutex<VecDeque<Result<ModelReply, BackendError>>>,
    exhausted: Exhausted,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockProvider {
    /// Creates a mock that returns `replies` in order, then a fixed final text.
    #[must_use]
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::with_script(replies.into_iter().map(Ok).collect())
    }

    /// Creates a mock from replies that may include backend failures.
    #[must_use]
    pub fn with_script(script: Vec<Result<ModelReply, BackendError>>) -> Self {
        Self {
            model_id: MOCK_PROVIDER_ID.to_string(),
            script: Mutex::new(script.into()),
            exhausted: Exhausted::Repeat(ModelReply::text(DEFAULT_FALLBACK_TEXT)),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn when_exhausted(mut self, exhausted: Exhausted) -> Self {
        self.exhausted = exhausted;
        self
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let trimmed = model_id.trim();
        if !trimmed.is_empty() {
            self.model_id = trimmed.to_string();
        }
        self
    }

    /// Requests observed so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn remaining_replies(&self) -> usize {
        lock_unpoisoned(&self.script).len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModelBackend for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn generate(&self, request: &ModelRequest) -> Result<ModelReply, BackendError> {
        lock_unpoisoned(&self.requests).push(request.clone());

        let next = lock_unpoisoned(&self.script).pop_front();
        match next {
            Some(reply) => reply,
            None => match &self.exhausted {
                Exhausted::Repeat(reply) => Ok(reply.clone()),
                Exhausted::Fail(message) => Err(BackendError::new(message.clone())),
            },
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use agent_provider::{ToolCallRequest, Turn};
    use serde_json::json;

    use super::*;

    fn request(prompt: &str) -> ModelRequest {
        ModelRequest {
            turns: vec![Turn::user_text(prompt)],
            instructions: "system instructions".to_string(),
            tools: Vec::new(),
            max_output_tokens: None,
        }
    }

    #[test]
    fn profile_exposes_explicit_mock_provider_identity() {
        let profile = MockProvider::default().profile();

        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
        assert_eq!(profile.model_id, "mock");
    }

    #[test]
    fn blank_model_id_keeps_default() {
        let profile = MockProvider::default().with_model_id("   ").profile();
        assert_eq!(profile.model_id, "mock");

        let profile = MockProvider::default().with_model_id(" alt ").profile();
        assert_eq!(profile.model_id, "alt");
    }

    #[test]
    fn scripted_replies_are_returned_in_order_then_fallback() {
        let provider = MockProvider::new(vec![
            ModelReply::tool_calls(vec![ToolCallRequest::new(
                "get_files_info",
                json!({}),
            )]),
            ModelReply::text("done"),
        ]);

        let first = provider.generate(&request("one")).expect("first reply");
        assert_eq!(first.requested_tool_calls().len(), 1);

        let second = provider.generate(&request("two")).expect("second reply");
        assert_eq!(second.final_text(), "done");
        assert_eq!(provider.remaining_replies(), 0);

        let third = provider.generate(&request("three")).expect("fallback reply");
        assert_eq!(third.final_text(), DEFAULT_FALLBACK_TEXT);
    }

    #[test]
    fn scripted_failures_surface_as_backend_errors() {
        let provider = MockProvider::with_script(vec![Err(BackendError::new("offline"))]);

        let error = provider
            .generate(&request("hello"))
            .expect_err("scripted failure should surface");
        assert_eq!(error.message(), "offline");
    }

    #[test]
    fn exhausted_fail_mode_rejects_further_requests() {
        let provider =
            MockProvider::new(Vec::new()).when_exhausted(Exhausted::Fail("drained".to_string()));

        let error = provider
            .generate(&request("hello"))
            .expect_err("exhausted mock should fail");
        assert_eq!(error.message(), "drained");
    }

    #[test]
    fn requests_are_recorded_with_full_history() {
        let provider = MockProvider::default();
        provider.generate(&request("first")).expect("reply");
        provider.generate(&request("second")).expect("reply");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].turns, vec![Turn::user_text("second")]);
    }
}
