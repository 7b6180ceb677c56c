pub const SYSTEM_INSTRUCTIONS_ENV_VAR: &str = "CODING_AGENT_SYSTEM_INSTRUCTIONS";

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
You are a helpful AI coding assistant.

When the user asks a question or makes a request, call functions to help them.
You have access to the following functions:
1. get_files_info: Get information about files in a directory.
2. get_file_content: Get the content of a file.
3. write_file: Write content to a file.
4. run_python_file: Run a Python file and return its output.

All paths are relative to the working directory.
Do not specify the working directory in function calls; it is set automatically for security reasons.";

pub fn system_instructions_from_env() -> String {
    let from_env = std::env::var(SYSTEM_INSTRUCTIONS_ENV_VAR).ok();
    sanitize_system_instructions(from_env)
}

pub(crate) fn sanitize_system_instructions(raw: Option<String>) -> String {
    let Some(value) = raw else {
        return DEFAULT_SYSTEM_INSTRUCTIONS.to_string();
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        DEFAULT_SYSTEM_INSTRUCTIONS.to_string()
    } else {
        trimmed.to_string()
    }
}
