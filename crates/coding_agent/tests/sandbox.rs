use std::fs;

use coding_agent::{Sandbox, ToolError};
use tempfile::tempdir;

#[test]
fn blank_or_missing_path_resolves_to_root() {
    let workspace = tempdir().expect("temp workspace");
    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");

    assert_eq!(sandbox.resolve(None).expect("none"), sandbox.root());
    assert_eq!(sandbox.resolve(Some("")).expect("empty"), sandbox.root());
    assert_eq!(sandbox.resolve(Some("   ")).expect("blank"), sandbox.root());
    assert_eq!(sandbox.resolve(Some(".")).expect("dot"), sandbox.root());
}

#[test]
fn padded_paths_are_not_trimmed() {
    let workspace = tempdir().expect("temp workspace");
    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");

    assert_eq!(
        sandbox.resolve(Some(" a.txt")).expect("leading space"),
        sandbox.root().join(" a.txt")
    );
    assert_eq!(
        sandbox.resolve(Some("notes.txt ")).expect("trailing space"),
        sandbox.root().join("notes.txt ")
    );
}

#[test]
fn root_is_canonicalized() {
    let workspace = tempdir().expect("temp workspace");
    fs::create_dir(workspace.path().join("inner")).expect("create inner");

    let sandbox = Sandbox::new(workspace.path().join("inner/../inner")).expect("sandbox");
    assert_eq!(
        sandbox.root(),
        workspace
            .path()
            .join("inner")
            .canonicalize()
            .expect("canonical inner")
    );
}

#[test]
fn nonexistent_targets_resolve_under_root() {
    let workspace = tempdir().expect("temp workspace");
    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");

    let resolved = sandbox.resolve(Some("pkg/new/module.py")).expect("resolve");
    assert_eq!(resolved, sandbox.root().join("pkg/new/module.py"));
    assert!(!resolved.exists(), "resolution must not create anything");
}

#[test]
fn parent_segments_that_stay_inside_are_allowed() {
    let workspace = tempdir().expect("temp workspace");
    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");

    let resolved = sandbox.resolve(Some("pkg/../lib/./calc.py")).expect("resolve");
    assert_eq!(resolved, sandbox.root().join("lib/calc.py"));
}

#[test]
fn traversal_and_absolute_escapes_are_rejected() {
    let outer = tempdir().expect("outer temp dir");
    let workspace_root = outer.path().join("workspace");
    fs::create_dir_all(&workspace_root).expect("create workspace root");
    let sandbox = Sandbox::new(&workspace_root).expect("sandbox");

    for requested in ["..", "../evil.txt", "pkg/../../evil.txt", "/etc/passwd"] {
        let error = sandbox
            .resolve(Some(requested))
            .expect_err("escape should be rejected");
        assert!(
            matches!(error, ToolError::SandboxViolation { ref path } if path == requested),
            "{requested}: {error}"
        );
    }
}

#[test]
fn absolute_paths_inside_root_are_allowed() {
    let workspace = tempdir().expect("temp workspace");
    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");
    let inside = sandbox.root().join("notes.txt");

    let resolved = sandbox
        .resolve(Some(inside.to_str().expect("utf-8 temp path")))
        .expect("resolve");
    assert_eq!(resolved, inside);
}

#[test]
fn sibling_directory_sharing_a_name_prefix_is_rejected() {
    let outer = tempdir().expect("outer temp dir");
    let workspace_root = outer.path().join("work");
    fs::create_dir_all(&workspace_root).expect("create workspace root");
    fs::create_dir_all(outer.path().join("workspace")).expect("create sibling");
    let sandbox = Sandbox::new(&workspace_root).expect("sandbox");

    let error = sandbox
        .resolve(Some("../workspace/file.txt"))
        .expect_err("sibling must not match by string prefix");
    assert!(matches!(error, ToolError::SandboxViolation { .. }));
}

#[cfg(unix)]
#[test]
fn symlinks_pointing_outside_are_rejected() {
    use std::os::unix::fs::symlink;

    let outer = tempdir().expect("outer temp dir");
    let workspace_root = outer.path().join("workspace");
    let secrets = outer.path().join("secrets");
    fs::create_dir_all(&workspace_root).expect("create workspace root");
    fs::create_dir_all(&secrets).expect("create secrets");
    fs::write(secrets.join("key.txt"), "hunter2").expect("write secret");
    symlink(&secrets, workspace_root.join("link")).expect("create symlink");

    let sandbox = Sandbox::new(&workspace_root).expect("sandbox");

    for requested in ["link", "link/key.txt", "link/new.txt"] {
        let error = sandbox
            .resolve(Some(requested))
            .expect_err("symlink escape should be rejected");
        assert!(
            matches!(error, ToolError::SandboxViolation { .. }),
            "{requested}: {error}"
        );
    }
}

#[cfg(unix)]
#[test]
fn symlinks_within_root_resolve_to_their_target() {
    use std::os::unix::fs::symlink;

    let workspace = tempdir().expect("temp workspace");
    fs::create_dir_all(workspace.path().join("real")).expect("create real dir");
    symlink(workspace.path().join("real"), workspace.path().join("alias")).expect("symlink");

    let sandbox = Sandbox::new(workspace.path()).expect("sandbox");
    let resolved = sandbox.resolve(Some("alias/file.txt")).expect("resolve");
    assert_eq!(resolved, sandbox.root().join("real/file.txt"));
}

#[test]
fn root_must_be_an_existing_directory() {
    let workspace = tempdir().expect("temp workspace");
    let file = workspace.path().join("file.txt");
    fs::write(&file, "x").expect("write file");

    let error = Sandbox::new(&file).expect_err("file root");
    assert!(matches!(error, ToolError::NotADirectory { .. }), "{error}");

    let error = Sandbox::new(workspace.path().join("missing")).expect_err("missing root");
    assert!(matches!(error, ToolError::Io { .. }), "{error}");
}
