use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use wait_timeout::ChildExt;

use crate::config::AgentConfig;
use crate::sandbox::Sandbox;

pub const NO_OUTPUT_REPORT: &str = "No output produced.";

/// Failure kinds of a single tool invocation.
///
/// These never escape the dispatcher; they are handed back to the model as
/// error payloads.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Cannot access \"{path}\": it is outside the permitted working directory")]
    SandboxViolation { path: String },
    #[error("\"{path}\" is not a regular file")]
    NotAFile { path: String },
    #[error("\"{path}\" is not a directory")]
    NotADirectory { path: String },
    #[error("\"{path}\" is not a .{expected} file")]
    UnsupportedFileType { path: String, expected: String },
    #[error("Failed to {operation} \"{path}\": {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Execution of \"{path}\" timed out after {}s", timeout.as_secs_f64())]
    Timeout { path: String, timeout: Duration },
    #[error("Function {name} not recognized.")]
    UnknownTool { name: String },
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

impl ToolError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Typed tool invocation, parsed from a model request by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetFilesInfo {
        directory: Option<String>,
    },
    GetFileContent {
        file_path: String,
    },
    WriteFile {
        file_path: String,
        content: String,
    },
    RunPythonFile {
        file_path: String,
        args: Vec<String>,
    },
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Entries(Vec<FileEntry>),
    Text(String),
}

impl ToolOutput {
    pub fn into_value(self) -> Value {
        match self {
            Self::Text(text) => Value::String(text),
            Self::Entries(entries) => Value::Array(
                entries
                    .into_iter()
                    .map(|entry| {
                        serde_json::json!({
                            "name": entry.name,
                            "size": entry.size,
                            "is_dir": entry.is_dir,
                        })
                    })
                    .collect(),
            ),
        }
    }
}

pub trait ToolExecutor {
    fn execute(&self, call: ToolCall) -> Result<ToolOutput, ToolError>;
}

/// Filesystem and subprocess tools confined to one sandbox root.
#[derive(Debug, Clone)]
pub struct BuiltinToolExecutor {
    sandbox: Sandbox,
    read_max_chars: usize,
    truncation_threshold: usize,
    script_timeout: Duration,
    interpreter: String,
    script_extension: String,
}

impl BuiltinToolExecutor {
    pub fn new(workspace_root: impl AsRef<Path>, config: &AgentConfig) -> Result<Self, ToolError> {
        Ok(Self {
            sandbox: Sandbox::new(workspace_root)?,
            read_max_chars: config.read_max_chars,
            truncation_threshold: config.truncation_threshold(),
            script_timeout: config.script_timeout,
            interpreter: config.interpreter.clone(),
            script_extension: config.script_extension.clone(),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn get_files_info(&self, directory: Option<&str>) -> Result<Vec<FileEntry>, ToolError> {
        let resolved = self.sandbox.resolve(directory)?;
        if !resolved.is_dir() {
            return Err(ToolError::NotADirectory {
                path: directory.unwrap_or(".").to_string(),
            });
        }

        let reader =
            fs::read_dir(&resolved).map_err(|error| ToolError::io("list", &resolved, error))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|error| ToolError::io("list", &resolved, error))?;
            let path = entry.path();
            // Follow symlinks like a stat would, but still list dangling ones.
            let metadata = fs::metadata(&path)
                .or_else(|_| fs::symlink_metadata(&path))
                .map_err(|error| ToolError::io("inspect", &path, error))?;

            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                is_dir: metadata.is_dir(),
            });
        }

        Ok(entries)
    }

    pub fn get_file_content(&self, file_path: &str) -> Result<String, ToolError> {
        let resolved = self.sandbox.resolve(Some(file_path))?;
        if !resolved.is_file() {
            return Err(ToolError::NotAFile {
                path: file_path.to_string(),
            });
        }

        let mut content = read_char_prefix(&resolved, self.read_max_chars)
            .map_err(|error| ToolError::io("read", &resolved, error))?;

        let kept = content.chars().count();
        if kept >= self.truncation_threshold {
            content.push_str(&format!(
                "\n...FILE {file_path} TRUNCATED after {kept} characters..."
            ));
        }

        Ok(content)
    }

    pub fn write_file(&self, file_path: &str, content: &str) -> Result<String, ToolError> {
        let resolved = self.sandbox.resolve(Some(file_path))?;

        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| ToolError::io("create parent directories for", parent, error))?;

            let canonical_parent = parent
                .canonicalize()
                .map_err(|error| ToolError::io("resolve", parent, error))?;
            if !self.sandbox.contains(&canonical_parent) {
                return Err(ToolError::SandboxViolation {
                    path: file_path.to_string(),
                });
            }
        }

        fs::write(&resolved, content).map_err(|error| ToolError::io("write", &resolved, error))?;

        Ok(format!(
            "Successfully wrote to \"{file_path}\" ({} characters written)",
            content.chars().count()
        ))
    }

    pub fn run_python_file(&self, file_path: &str, args: &[String]) -> Result<String, ToolError> {
        let resolved = self.sandbox.resolve(Some(file_path))?;
        if !resolved.is_file() {
            return Err(ToolError::NotAFile {
                path: file_path.to_string(),
            });
        }

        let extension_matches = resolved
            .extension()
            .is_some_and(|extension| extension.to_str() == Some(self.script_extension.as_str()));
        if !extension_matches {
            return Err(ToolError::UnsupportedFileType {
                path: file_path.to_string(),
                expected: self.script_extension.clone(),
            });
        }

        let mut command = Command::new(&self.interpreter);
        command
            .arg(&resolved)
            .args(args)
            .current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut command);

        let deadline = Instant::now() + self.script_timeout;
        let mut child = command
            .spawn()
            .map_err(|error| ToolError::io("launch", &self.interpreter, error))?;
        let readers = PipeReaders::spawn(&mut child);

        let status = match child.wait_timeout(self.script_timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate_process_tree(&mut child);
                tracing::warn!(path = file_path, "script timed out; process group killed");
                return Err(self.script_timeout_error(file_path));
            }
            Err(error) => {
                terminate_process_tree(&mut child);
                return Err(ToolError::io("wait for", &resolved, error));
            }
        };

        // Background jobs left in the group would otherwise hold the pipes open.
        kill_process_group(child.id());

        let Some((stdout, stderr)) = readers.collect(deadline) else {
            tracing::warn!(
                path = file_path,
                "script output still open at deadline; a detached descendant holds it"
            );
            return Err(self.script_timeout_error(file_path));
        };

        Ok(format_run_report(&stdout, &stderr, status))
    }

    fn script_timeout_error(&self, file_path: &str) -> ToolError {
        ToolError::Timeout {
            path: file_path.to_string(),
            timeout: self.script_timeout,
        }
    }
}

impl ToolExecutor for BuiltinToolExecutor {
    fn execute(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        match call {
            ToolCall::GetFilesInfo { directory } => self
                .get_files_info(directory.as_deref())
                .map(ToolOutput::Entries),
            ToolCall::GetFileContent { file_path } => {
                self.get_file_content(&file_path).map(ToolOutput::Text)
            }
            ToolCall::WriteFile { file_path, content } => {
                self.write_file(&file_path, &content).map(ToolOutput::Text)
            }
            ToolCall::RunPythonFile { file_path, args } => self
                .run_python_file(&file_path, &args)
                .map(ToolOutput::Text),
        }
    }
}

/// Reads at most `max_chars` UTF-8 characters from the start of `path`.
fn read_char_prefix(path: &Path, max_chars: usize) -> io::Result<String> {
    let file = File::open(path)?;
    let byte_cap = (max_chars as u64).saturating_mul(4);

    let mut bytes = Vec::new();
    file.take(byte_cap).read_to_end(&mut bytes)?;

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => {
            let utf8_error = error.utf8_error();
            // Only a sequence cut short by the byte cap is tolerated.
            if utf8_error.error_len().is_some() {
                return Err(io::Error::new(io::ErrorKind::InvalidData, utf8_error));
            }

            let mut bytes = error.into_bytes();
            bytes.truncate(utf8_error.valid_up_to());
            String::from_utf8(bytes)
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?
        }
    };

    Ok(text.chars().take(max_chars).collect())
}

fn format_run_report(stdout: &[u8], stderr: &[u8], status: ExitStatus) -> String {
    let mut report = if stdout.is_empty() && stderr.is_empty() {
        NO_OUTPUT_REPORT.to_string()
    } else {
        format!(
            "STDOUT:\n{}STDERR:\n{}",
            String::from_utf8_lossy(stdout),
            String::from_utf8_lossy(stderr)
        )
    };

    match status.code() {
        Some(0) => {}
        Some(code) => report.push_str(&format!("\nProcess exited with code {code}")),
        None => report.push_str("\nProcess terminated by a signal"),
    }

    report
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Drains a child's stdout and stderr on detached threads.
///
/// A reader blocked on a pipe some escaped descendant still holds is simply
/// abandoned; it exits on its own once that descendant closes the pipe.
struct PipeReaders {
    receiver: Receiver<(Stream, Vec<u8>)>,
    pending: usize,
}

impl PipeReaders {
    fn spawn(child: &mut Child) -> Self {
        let (sender, receiver) = mpsc::channel();
        let mut pending = 0;

        if let Some(stdout) = child.stdout.take() {
            spawn_pipe_reader(Stream::Stdout, stdout, sender.clone());
            pending += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pipe_reader(Stream::Stderr, stderr, sender);
            pending += 1;
        }

        Self { receiver, pending }
    }

    /// Returns `(stdout, stderr)`, or `None` when a pipe is still open at `deadline`.
    fn collect(self, deadline: Instant) -> Option<(Vec<u8>, Vec<u8>)> {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        for _ in 0..self.pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining).ok()? {
                (Stream::Stdout, bytes) => stdout = bytes,
                (Stream::Stderr, bytes) => stderr = bytes,
            }
        }

        Some((stdout, stderr))
    }
}

fn spawn_pipe_reader(
    stream: Stream,
    mut pipe: impl Read + Send + 'static,
    sender: Sender<(Stream, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        let _ = sender.send((stream, bytes));
    });
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

/// SIGKILLs every process still in the group led by `leader`.
#[cfg(unix)]
fn kill_process_group(leader: u32) {
    if let Ok(pid) = libc::pid_t::try_from(leader) {
        // The child leads its own process group, so `-pid` addresses the whole tree.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: u32) {}

/// Kills the child and everything it spawned, then reaps the child.
fn terminate_process_tree(child: &mut Child) {
    kill_process_group(child.id());
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn read_char_prefix_stops_at_char_boundary() {
        let workspace = tempdir().expect("temp workspace");
        let path = workspace.path().join("wide.txt");
        fs::write(&path, "ééééé").expect("write fixture");

        assert_eq!(read_char_prefix(&path, 3).expect("read"), "ééé");
        assert_eq!(read_char_prefix(&path, 10).expect("read"), "ééééé");
    }

    #[test]
    fn read_char_prefix_rejects_invalid_utf8() {
        let workspace = tempdir().expect("temp workspace");
        let path = workspace.path().join("binary.bin");
        let mut file = File::create(&path).expect("create fixture");
        file.write_all(&[0x66, 0xff, 0xfe, 0x66]).expect("write fixture");

        let error = read_char_prefix(&path, 100).expect_err("invalid utf-8");
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[cfg(unix)]
    #[test]
    fn run_report_marks_non_zero_exit() {
        use std::os::unix::process::ExitStatusExt;

        let report = format_run_report(b"", b"boom\n", ExitStatus::from_raw(2 << 8));
        assert_eq!(report, "STDOUT:\nSTDERR:\nboom\n\nProcess exited with code 2");

        let report = format_run_report(b"", b"", ExitStatus::from_raw(0));
        assert_eq!(report, NO_OUTPUT_REPORT);
    }

    #[test]
    fn entries_convert_to_name_size_is_dir_objects() {
        let output = ToolOutput::Entries(vec![FileEntry {
            name: "a.txt".to_string(),
            size: 10,
            is_dir: false,
        }]);

        assert_eq!(
            output.into_value(),
            serde_json::json!([{"name": "a.txt", "size": 10, "is_dir": false}])
        );
    }
}
