//! Integration tests for `plugin-forge build`

use crate::helpers::{TestWorkspace, forge_command, run_forge};
use anyhow::Result;

#[test]
fn test_stable_channel_builds_only_stable_rows() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1", "2024.2"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable"])?;
  assert!(
    output.status.success(),
    "build failed: {}",
    String::from_utf8_lossy(&output.stderr)
  );

  // Only the stable row ran; the dev row was skipped.
  assert_eq!(ws.built_versions(), vec!["2024.1.4"]);
  assert!(
    ws.path
      .join("releases/release_master/2024.1/io.forge.plugin.zip")
      .is_file()
  );
  Ok(())
}

#[test]
fn test_dev_channel_builds_dev_row_into_dev_scope() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1", "2024.2"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "dev"])?;
  assert!(output.status.success());
  assert_eq!(ws.built_versions(), vec!["2024.2.1"]);
  assert!(
    ws.path
      .join("releases/release_dev/2024.2/io.forge.plugin.zip")
      .is_file()
  );
  Ok(())
}

#[test]
fn test_external_build_status_propagated_verbatim() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1"])?;
  ws.write_gradlew(42)?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable"])?;
  assert_eq!(output.status.code(), Some(42));
  Ok(())
}

#[test]
fn test_setup_pass_skips_external_build() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1", "2024.2"])?;

  let output = run_forge(&ws.path, &["build", "--setup"])?;
  assert!(output.status.success());
  assert!(ws.built_versions().is_empty());
  Ok(())
}

#[test]
fn test_only_version_limits_the_run() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1", "2024.2"])?;

  let output = run_forge(&ws.path, &["build", "--only-version", "2024.2", "--channel", "dev"])?;
  assert!(output.status.success());
  assert_eq!(ws.built_versions(), vec!["2024.2.1"]);
  Ok(())
}

#[test]
fn test_missing_java_home_fails_fast() -> Result<()> {
  let ws = TestWorkspace::new()?;
  let output = forge_command(&ws.path, &["build"]).env_remove("JAVA_HOME").output()?;
  assert_eq!(output.status.code(), Some(1));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("JAVA_HOME"));
  Ok(())
}

#[test]
fn test_generated_manifest_reflects_spec() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge(&ws.path, &["build", "--channel", "stable", "--release", "13.0"])?;
  assert!(output.status.success());

  let manifest = std::fs::read_to_string(ws.path.join("resources/META-INF/plugin.xml"))?;
  assert!(manifest.contains("<version>13.0.241</version>"));
  assert!(manifest.contains("since-build=\"241\""));
  assert!(manifest.contains("<depends>Dart</depends>"));
  Ok(())
}
