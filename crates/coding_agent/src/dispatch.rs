use std::fmt;
use std::path::Path;
use std::str::FromStr;

use agent_provider::{ToolArguments, ToolCallRequest, ToolDefinition, ToolResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AgentConfig;
use crate::tools::{BuiltinToolExecutor, ToolCall, ToolError, ToolExecutor};

/// Closed set of tools the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetFilesInfo,
    GetFileContent,
    WriteFile,
    RunPythonFile,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::GetFilesInfo,
        ToolName::GetFileContent,
        ToolName::WriteFile,
        ToolName::RunPythonFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetFilesInfo => "get_files_info",
            Self::GetFileContent => "get_file_content",
            Self::WriteFile => "write_file",
            Self::RunPythonFile => "run_python_file",
        }
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            Self::GetFilesInfo => (
                "Get information about files in a directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "The directory to list files from, relative to the working directory. If not provided, lists files in the working directory."
                        }
                    }
                }),
            ),
            Self::GetFileContent => (
                "Get the content of a file.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The path to the file, relative to the working directory."
                        }
                    },
                    "required": ["file_path"]
                }),
            ),
            Self::WriteFile => (
                "Overwrite an existing file or create a new one, creating missing parent directories first.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The path to the file, relative to the working directory."
                        },
                        "content": {
                            "type": "string",
                            "description": "The content to write to the file."
                        }
                    },
                    "required": ["file_path", "content"]
                }),
            ),
            Self::RunPythonFile => (
                "Run a Python (.py) file with optional command-line arguments and return its output.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "The path to the Python file, relative to the working directory."
                        },
                        "args": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "A list of command-line arguments to pass to the Python script."
                        }
                    },
                    "required": ["file_path"]
                }),
            ),
        };

        ToolDefinition {
            name: self.as_str().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }
}

/// Declarations sent with every model request.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.into_iter().map(ToolName::definition).collect()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GetFilesInfoArgs {
    #[serde(default)]
    directory: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GetFileContentArgs {
    file_path: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WriteFileArgs {
    file_path: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunPythonFileArgs {
    file_path: String,
    #[serde(default)]
    args: ScriptArgs,
}

/// `args` as sent by models: usually a list, occasionally a bare string.
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum ScriptArgs {
    #[default]
    None,
    List(Vec<String>),
    Single(String),
}

impl ScriptArgs {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::List(args) => args,
            Self::Single(arg) => vec![arg],
        }
    }
}

/// Parses a model request into a typed call.
pub fn parse_tool_call(request: &ToolCallRequest) -> Result<ToolCall, ToolError> {
    let tool: ToolName = request.name.parse()?;

    let call = match tool {
        ToolName::GetFilesInfo => {
            let args: GetFilesInfoArgs = parse_args(tool, &request.args)?;
            ToolCall::GetFilesInfo {
                directory: args.directory,
            }
        }
        ToolName::GetFileContent => {
            let args: GetFileContentArgs = parse_args(tool, &request.args)?;
            ToolCall::GetFileContent {
                file_path: args.file_path,
            }
        }
        ToolName::WriteFile => {
            let args: WriteFileArgs = parse_args(tool, &request.args)?;
            ToolCall::WriteFile {
                file_path: args.file_path,
                content: args.content,
            }
        }
        ToolName::RunPythonFile => {
            let args: RunPythonFileArgs = parse_args(tool, &request.args)?;
            ToolCall::RunPythonFile {
                file_path: args.file_path,
                args: args.args.into_vec(),
            }
        }
    };

    Ok(call)
}

fn parse_args<T: DeserializeOwned>(tool: ToolName, args: &ToolArguments) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|error| {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: error.to_string(),
        }
    })
}

/// Routes tool-call requests to an executor and turns every outcome into data.
#[derive(Debug)]
pub struct Dispatcher<E = BuiltinToolExecutor> {
    executor: E,
    verbose: bool,
}

impl Dispatcher<BuiltinToolExecutor> {
    pub fn new(workspace_root: impl AsRef<Path>, config: &AgentConfig) -> Result<Self, ToolError> {
        Ok(Self::with_executor(
            BuiltinToolExecutor::new(workspace_root, config)?,
            config.verbose,
        ))
    }
}

impl<E: ToolExecutor> Dispatcher<E> {
    pub fn with_executor(executor: E, verbose: bool) -> Self {
        Self { executor, verbose }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Executes one request. Never fails: errors come back as error results.
    pub fn dispatch(&self, request: &ToolCallRequest) -> ToolResult {
        if self.verbose {
            tracing::info!(
                tool = %request.name,
                args = %serde_json::Value::Object(request.args.clone()),
                "calling function"
            );
        }

        let outcome =
            parse_tool_call(request).and_then(|call| self.executor.execute(call));

        match outcome {
            Ok(output) => ToolResult::success(request.name.clone(), output.into_value()),
            Err(error) => {
                tracing::warn!(tool = %request.name, %error, "tool call failed");
                ToolResult::error(request.name.clone(), error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use agent_provider::ToolPayload;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tools::ToolOutput;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<ToolCall>>,
    }

    impl ToolExecutor for RecordingExecutor {
        fn execute(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
            self.calls.lock().expect("calls lock").push(call.clone());
            match call {
                ToolCall::GetFileContent { file_path } if file_path == "missing.txt" => {
                    Err(ToolError::NotAFile { path: file_path })
                }
                _ => Ok(ToolOutput::Text("ok".to_string())),
            }
        }
    }

    fn request(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new(name, args)
    }

    #[test]
    fn tool_names_round_trip_through_from_str() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().expect("known tool"), tool);
        }
    }

    #[test]
    fn definitions_cover_every_tool_in_order() {
        let names: Vec<String> = tool_definitions().into_iter().map(|def| def.name).collect();
        assert_eq!(
            names,
            vec![
                "get_files_info",
                "get_file_content",
                "write_file",
                "run_python_file"
            ]
        );

        let run = ToolName::RunPythonFile.definition();
        assert_eq!(run.parameters["required"], json!(["file_path"]));
    }

    #[test]
    fn script_args_accept_list_string_or_absence() {
        let call = parse_tool_call(&request(
            "run_python_file",
            json!({"file_path": "main.py", "args": ["3 + 5", "-v"]}),
        ))
        .expect("list args");
        assert_eq!(
            call,
            ToolCall::RunPythonFile {
                file_path: "main.py".to_string(),
                args: vec!["3 + 5".to_string(), "-v".to_string()],
            }
        );

        let call = parse_tool_call(&request(
            "run_python_file",
            json!({"file_path": "main.py", "args": "3 + 5"}),
        ))
        .expect("string arg");
        assert_eq!(
            call,
            ToolCall::RunPythonFile {
                file_path: "main.py".to_string(),
                args: vec!["3 + 5".to_string()],
            }
        );

        let call = parse_tool_call(&request("run_python_file", json!({"file_path": "main.py"})))
            .expect("no args");
        assert_eq!(
            call,
            ToolCall::RunPythonFile {
                file_path: "main.py".to_string(),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn missing_and_unexpected_arguments_are_invalid() {
        let error = parse_tool_call(&request("get_file_content", json!({})))
            .expect_err("file_path is required");
        assert!(matches!(error, ToolError::InvalidArguments { .. }));
        assert!(error.to_string().contains("file_path"), "{error}");

        let error = parse_tool_call(&request(
            "get_files_info",
            json!({"directory": ".", "recursive": true}),
        ))
        .expect_err("unknown field");
        assert!(error.to_string().contains("recursive"), "{error}");

        let error = parse_tool_call(&request("write_file", json!({"file_path": "a", "content": 5})))
            .expect_err("content must be a string");
        assert!(error.to_string().starts_with("Invalid arguments for write_file"));
    }

    #[test]
    fn unknown_tool_becomes_error_result_without_execution() {
        let dispatcher = Dispatcher::with_executor(RecordingExecutor::default(), false);

        let result = dispatcher.dispatch(&request("delete_everything", json!({})));

        assert_eq!(
            result,
            ToolResult::error("delete_everything", "Function delete_everything not recognized.")
        );
        assert!(dispatcher.executor().calls.lock().expect("calls lock").is_empty());
    }

    #[test]
    fn executor_errors_and_successes_are_wrapped_uniformly() {
        let dispatcher = Dispatcher::with_executor(RecordingExecutor::default(), true);

        let ok = dispatcher.dispatch(&request("get_file_content", json!({"file_path": "a.txt"})));
        assert_eq!(ok.payload, ToolPayload::Result(json!("ok")));
        assert_eq!(ok.to_response(), json!({"Result": "ok"}));

        let failed = dispatcher.dispatch(&request(
            "get_file_content",
            json!({"file_path": "missing.txt"}),
        ));
        assert_eq!(failed.tool_name, "get_file_content");
        assert_eq!(
            failed.to_response(),
            json!({"error": "\"missing.txt\" is not a regular file"})
        );
    }
}
