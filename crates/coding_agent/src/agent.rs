//! The tool-using agent loop.
//!
//! One [`Agent::run`] drives a single conversation: the full history goes to
//! the model, requested tools are executed through the [`Dispatcher`], their
//! results are appended as one tool turn, and the cycle repeats until the
//! model answers with text, the backend fails, the iteration cap is reached,
//! or the caller cancels.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use agent_provider::{
    BackendError, CancelSignal, ModelBackend, ModelReply, ModelRequest, ProviderProfile,
    TokenUsage, ToolCallRequest, ToolDefinition, ToolResult,
};
use thiserror::Error;

use crate::config::AgentConfig;
use crate::conversation::Conversation;
use crate::dispatch::Dispatcher;
use crate::instructions::DEFAULT_SYSTEM_INSTRUCTIONS;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid working directory: {0}")]
    WorkingDirectory(#[source] ToolError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model stopped requesting tools. `text` is `None` for an empty answer.
    Completed { text: Option<String> },
    /// The backend returned nothing usable.
    Aborted { reason: String },
    /// The iteration cap was reached before the model produced an answer.
    IterationLimit,
    Cancelled,
}

impl AgentOutcome {
    pub fn final_text(&self) -> Option<&str> {
        match self {
            Self::Completed { text } => text.as_deref(),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    pub outcome: AgentOutcome,
    pub conversation: Conversation,
    /// Number of model round-trips performed.
    pub iterations: usize,
}

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    IterationStarted { iteration: usize },
    Usage { iteration: usize, usage: TokenUsage },
    ToolCall { request: ToolCallRequest },
    ToolResult { result: ToolResult },
    FinalText { text: String },
}

#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ProcessingTools(Vec<ToolCallRequest>),
    Done(Option<String>),
    Aborted(String),
}

pub struct Agent {
    backend: Arc<dyn ModelBackend>,
    config: AgentConfig,
    instructions: String,
}

impl Agent {
    pub fn new(backend: Arc<dyn ModelBackend>, config: AgentConfig) -> Self {
        Self {
            backend,
            config,
            instructions: DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
        }
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn profile(&self) -> ProviderProfile {
        self.backend.profile()
    }

    pub fn run(&self, prompt: &str, work_dir: &Path) -> Result<AgentReport, AgentError> {
        self.run_with(prompt, work_dir, None, &mut |_| {})
    }

    /// Runs one session rooted at `work_dir`.
    ///
    /// `cancel` is only checked between iterations; an in-flight model request
    /// or tool call always finishes first.
    pub fn run_with(
        &self,
        prompt: &str,
        work_dir: &Path,
        cancel: Option<&CancelSignal>,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentReport, AgentError> {
        let dispatcher =
            Dispatcher::new(work_dir, &self.config).map_err(AgentError::WorkingDirectory)?;

        let session = AgentSession {
            backend: self.backend.as_ref(),
            tools: dispatcher.tool_definitions(),
            dispatcher,
            conversation: Conversation::new(prompt),
            instructions: &self.instructions,
            config: &self.config,
            iterations: 0,
        };

        Ok(session.drive(cancel, on_event))
    }
}

struct AgentSession<'a> {
    backend: &'a dyn ModelBackend,
    dispatcher: Dispatcher,
    tools: Vec<ToolDefinition>,
    conversation: Conversation,
    instructions: &'a str,
    config: &'a AgentConfig,
    iterations: usize,
}

impl AgentSession<'_> {
    fn drive(
        mut self,
        cancel: Option<&CancelSignal>,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> AgentReport {
        let mut state = LoopState::AwaitingModel;

        let outcome = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if cancel.is_some_and(|cancel| cancel.load(Ordering::SeqCst)) {
                        tracing::info!(iterations = self.iterations, "run cancelled");
                        break AgentOutcome::Cancelled;
                    }

                    if self.iterations >= self.config.max_iters {
                        tracing::warn!(
                            max_iters = self.config.max_iters,
                            "iteration limit reached without a final answer"
                        );
                        break AgentOutcome::IterationLimit;
                    }

                    self.iterations += 1;
                    on_event(&AgentEvent::IterationStarted {
                        iteration: self.iterations,
                    });

                    match self.request_model() {
                        Ok(reply) => self.absorb_reply(reply, on_event),
                        Err(error) => LoopState::Aborted(error.to_string()),
                    }
                }
                LoopState::ProcessingTools(calls) => {
                    let results = calls
                        .iter()
                        .map(|call| {
                            on_event(&AgentEvent::ToolCall {
                                request: call.clone(),
                            });
                            let result = self.dispatcher.dispatch(call);
                            on_event(&AgentEvent::ToolResult {
                                result: result.clone(),
                            });
                            result
                        })
                        .collect();

                    self.conversation.push_tool_results(results);
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => break AgentOutcome::Completed { text },
                LoopState::Aborted(reason) => {
                    tracing::warn!(%reason, "run aborted");
                    break AgentOutcome::Aborted { reason };
                }
            };
        };

        AgentReport {
            outcome,
            conversation: self.conversation,
            iterations: self.iterations,
        }
    }

    fn request_model(&self) -> Result<ModelReply, BackendError> {
        let request = ModelRequest {
            turns: self.conversation.turns().to_vec(),
            instructions: self.instructions.to_string(),
            tools: self.tools.clone(),
            max_output_tokens: self.config.max_output_tokens,
        };

        tracing::debug!(
            iteration = self.iterations,
            turns = request.turns.len(),
            "requesting model reply"
        );
        self.backend.generate(&request)
    }

    fn absorb_reply(
        &mut self,
        reply: ModelReply,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> LoopState {
        if let Some(usage) = reply.usage {
            tracing::debug!(
                iteration = self.iterations,
                prompt_tokens = usage.prompt_tokens,
                response_tokens = usage.response_tokens,
                "token usage"
            );
            on_event(&AgentEvent::Usage {
                iteration: self.iterations,
                usage,
            });
        }

        let calls = reply.requested_tool_calls();
        let final_text = reply.final_text();

        for candidate in reply.candidates {
            self.conversation.push(candidate);
        }

        if !calls.is_empty() {
            return LoopState::ProcessingTools(calls);
        }

        if final_text.is_empty() {
            return LoopState::Done(None);
        }

        on_event(&AgentEvent::FinalText {
            text: final_text.clone(),
        });
        self.conversation.push_model_text(final_text.clone());
        LoopState::Done(Some(final_text))
    }
}
