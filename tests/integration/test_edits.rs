//! Integration tests for edit scopes around the external build

use crate::helpers::{TestWorkspace, run_forge};
use anyhow::Result;
use std::fs;
use std::os::unix::fs::PermissionsExt;

fn install_edit(ws: &TestWorkspace, versions: &str) -> Result<()> {
  fs::write(
    ws.path.join("Widget.java"),
    "class Widget { OLD_API call(); }\n",
  )?;
  fs::write(
    ws.path.join("source-edits.json"),
    format!(
      r#"[{{"path": "Widget.java", "find": "OLD_API", "replace": "NEW_API", "versions": [{}]}}]"#,
      versions
    ),
  )?;
  ws.commit_all("Add widget source")?;
  Ok(())
}

/// gradlew stub that records what the edited source looked like mid-build
fn install_snooping_gradlew(ws: &TestWorkspace) -> Result<()> {
  let script = "#!/bin/sh\nmkdir -p build\ncp Widget.java mid-build-widget.txt\necho zip > build/io.forge.plugin.zip\nexit 0\n";
  let gradlew = ws.path.join("gradlew");
  fs::write(&gradlew, script)?;
  let mut perms = fs::metadata(&gradlew)?.permissions();
  perms.set_mode(0o755);
  fs::set_permissions(&gradlew, perms)?;
  Ok(())
}

#[test]
fn test_edit_applied_during_build_and_reverted_after() -> Result<()> {
  let ws = TestWorkspace::new()?;
  install_edit(&ws, "\"2024.1\"")?;
  install_snooping_gradlew(&ws)?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable"])?;
  assert!(
    output.status.success(),
    "build failed: {}",
    String::from_utf8_lossy(&output.stderr)
  );

  // The build step saw the patched source.
  let mid = fs::read_to_string(ws.path.join("mid-build-widget.txt"))?;
  assert!(mid.contains("NEW_API"));

  // The checkout is back to its original bytes.
  let after = fs::read_to_string(ws.path.join("Widget.java"))?;
  assert_eq!(after, "class Widget { OLD_API call(); }\n");
  Ok(())
}

#[test]
fn test_edit_reverted_when_build_fails() -> Result<()> {
  let ws = TestWorkspace::new()?;
  install_edit(&ws, "\"2024.1\"")?;
  ws.write_gradlew(9)?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable"])?;
  assert_eq!(output.status.code(), Some(9));

  let after = fs::read_to_string(ws.path.join("Widget.java"))?;
  assert_eq!(after, "class Widget { OLD_API call(); }\n");
  Ok(())
}

#[test]
fn test_non_matching_edit_never_touches_source() -> Result<()> {
  let ws = TestWorkspace::new()?;
  install_edit(&ws, "\"2099.9\"")?;
  install_snooping_gradlew(&ws)?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable"])?;
  assert!(output.status.success());

  let mid = fs::read_to_string(ws.path.join("mid-build-widget.txt"))?;
  assert!(mid.contains("OLD_API"));
  Ok(())
}
