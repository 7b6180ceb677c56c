use std::fs;

use agent_provider::{ToolCallRequest, ToolPayload, ToolResult};
use coding_agent::dispatch::tool_definitions;
use coding_agent::{AgentConfig, Dispatcher};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn listing_scenario_returns_one_file_and_one_directory() {
    let workspace = tempdir().expect("temp workspace");
    fs::write(workspace.path().join("a.txt"), "0123456789").expect("write a.txt");
    fs::create_dir(workspace.path().join("b")).expect("create b");
    let dispatcher = Dispatcher::new(workspace.path(), &AgentConfig::default()).expect("dispatcher");

    let result = dispatcher.dispatch(&ToolCallRequest::new("get_files_info", json!({})));

    let ToolPayload::Result(entries) = &result.payload else {
        panic!("listing should succeed: {result:?}");
    };
    let mut entries = entries.as_array().expect("array payload").clone();
    entries.sort_by_key(|entry| entry["name"].as_str().unwrap_or_default().to_string());

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], json!({"name": "a.txt", "size": 10, "is_dir": false}));
    assert_eq!(entries[1]["name"], "b");
    assert_eq!(entries[1]["is_dir"], true);
}

#[test]
fn write_outside_root_is_an_error_payload_and_creates_nothing() {
    let outer = tempdir().expect("outer temp dir");
    let workspace_root = outer.path().join("workspace");
    fs::create_dir_all(&workspace_root).expect("create workspace root");
    let dispatcher = Dispatcher::new(&workspace_root, &AgentConfig::default()).expect("dispatcher");

    let result = dispatcher.dispatch(&ToolCallRequest::new(
        "write_file",
        json!({"file_path": "../evil.txt", "content": "pwned"}),
    ));

    assert_eq!(
        result,
        ToolResult::error(
            "write_file",
            "Cannot access \"../evil.txt\": it is outside the permitted working directory"
        )
    );
    assert!(result.to_response().get("Result").is_none());
    assert!(!outer.path().join("evil.txt").exists());
}

#[test]
fn write_and_read_through_dispatcher_wrap_text_results() {
    let workspace = tempdir().expect("temp workspace");
    let dispatcher = Dispatcher::new(workspace.path(), &AgentConfig::default()).expect("dispatcher");

    let write = dispatcher.dispatch(&ToolCallRequest::new(
        "write_file",
        json!({"file_path": "lorem.txt", "content": "wait, this isn't lorem ipsum"}),
    ));
    assert_eq!(
        write.to_response(),
        json!({"Result": "Successfully wrote to \"lorem.txt\" (28 characters written)"})
    );

    let read = dispatcher.dispatch(&ToolCallRequest::new(
        "get_file_content",
        json!({"file_path": "lorem.txt"}),
    ));
    assert_eq!(
        read.to_response(),
        json!({"Result": "wait, this isn't lorem ipsum"})
    );
}

#[test]
fn unknown_tools_and_bad_arguments_do_not_panic() {
    let workspace = tempdir().expect("temp workspace");
    let dispatcher = Dispatcher::new(workspace.path(), &AgentConfig::default()).expect("dispatcher");

    let unknown = dispatcher.dispatch(&ToolCallRequest::new("rm_rf", json!({"path": "/"})));
    assert_eq!(
        unknown.to_response(),
        json!({"error": "Function rm_rf not recognized."})
    );

    let missing = dispatcher.dispatch(&ToolCallRequest::new("write_file", json!({"file_path": "x"})));
    assert!(missing.is_error());
    let ToolPayload::Error(message) = &missing.payload else {
        unreachable!();
    };
    assert!(message.contains("content"), "{message}");
    assert!(!workspace.path().join("x").exists());
}

#[test]
fn dispatcher_exposes_the_same_definitions_as_the_registry() {
    let workspace = tempdir().expect("temp workspace");
    let dispatcher = Dispatcher::new(workspace.path(), &AgentConfig::default()).expect("dispatcher");

    assert_eq!(dispatcher.tool_definitions(), tool_definitions());
    assert_eq!(dispatcher.tool_definitions().len(), 4);
}
