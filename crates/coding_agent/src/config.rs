use std::time::Duration;

pub const DEFAULT_MAX_ITERS: usize = 20;
pub const DEFAULT_READ_MAX_CHARS: usize = 10_000;
pub const DEFAULT_TRUNCATION_MARGIN: usize = 20;
pub const DEFAULT_SCRIPT_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_SCRIPT_EXTENSION: &str = "py";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

pub const MAX_ITERS_ENV_VAR: &str = "CODING_AGENT_MAX_ITERS";
pub const READ_MAX_CHARS_ENV_VAR: &str = "CODING_AGENT_READ_MAX_CHARS";
pub const SCRIPT_TIMEOUT_ENV_VAR: &str = "CODING_AGENT_SCRIPT_TIMEOUT_SEC";
pub const INTERPRETER_ENV_VAR: &str = "CODING_AGENT_PYTHON";

/// Limits and knobs for one agent session.
///
/// Values are fixed for the lifetime of a run; nothing here is exposed to the
/// model as a tool argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_iters: usize,
    pub read_max_chars: usize,
    pub truncation_margin: usize,
    pub script_timeout: Duration,
    pub interpreter: String,
    pub script_extension: String,
    pub max_output_tokens: Option<u32>,
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
            read_max_chars: DEFAULT_READ_MAX_CHARS,
            truncation_margin: DEFAULT_TRUNCATION_MARGIN,
            script_timeout: Duration::from_secs(DEFAULT_SCRIPT_TIMEOUT_SEC),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
            max_output_tokens: Some(DEFAULT_MAX_OUTPUT_TOKENS),
            verbose: false,
        }
    }
}

impl AgentConfig {
    /// Defaults with overrides read from `CODING_AGENT_*` environment variables.
    ///
    /// Unset, blank, or unparsable values keep the default.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(max_iters) = read(MAX_ITERS_ENV_VAR).and_then(|v| parse_positive(&v)) {
            self.max_iters = max_iters as usize;
        }

        if let Some(chars) = read(READ_MAX_CHARS_ENV_VAR).and_then(|v| parse_positive(&v)) {
            self.read_max_chars = chars as usize;
        }

        if let Some(secs) = read(SCRIPT_TIMEOUT_ENV_VAR).and_then(|v| parse_positive(&v)) {
            self.script_timeout = Duration::from_secs(secs);
        }

        if let Some(interpreter) = read(INTERPRETER_ENV_VAR) {
            self.interpreter = interpreter;
        }

        self
    }

    #[must_use]
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    #[must_use]
    pub fn with_read_limits(mut self, max_chars: usize, margin: usize) -> Self {
        self.read_max_chars = max_chars;
        self.truncation_margin = margin;
        self
    }

    #[must_use]
    pub fn with_script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Runs scripts with `interpreter` and only accepts files ending in `.{extension}`.
    #[must_use]
    pub fn with_script_runner(
        mut self,
        interpreter: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        self.interpreter = interpreter.into();
        self.script_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Character count at or above which a read is reported as truncated.
    pub fn truncation_threshold(&self) -> usize {
        self.read_max_chars.saturating_sub(self.truncation_margin)
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value.parse::<u64>().ok().filter(|value| *value > 0)
}
