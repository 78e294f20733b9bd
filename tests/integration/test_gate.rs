//! Integration tests for the release gate

use crate::helpers::{TestWorkspace, run_forge_gated, set_mtime};
use anyhow::Result;
use std::time::{Duration, SystemTime};

#[test]
fn test_release_from_release_branch_passes() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0"])?;
  assert!(
    output.status.success(),
    "gate rejected a valid release: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  Ok(())
}

#[test]
fn test_point_release_branch_passes() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13.1")?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0"])?;
  assert!(output.status.success());
  Ok(())
}

#[test]
fn test_wrong_branch_rejected_with_reason() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.warm_cache(&["2024.1"])?;

  // Still on main.
  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0"])?;
  assert_eq!(output.status.code(), Some(3));
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("release_13"), "stderr: {}", stderr);
  Ok(())
}

#[test]
fn test_bare_major_is_normalized() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13"])?;
  assert!(
    output.status.success(),
    "normalized release rejected: {}",
    String::from_utf8_lossy(&output.stderr)
  );
  Ok(())
}

#[test]
fn test_malformed_release_id_rejected() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1"])?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0.1"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("major.minor"));
  Ok(())
}

#[test]
fn test_dirty_tree_rejected_regardless_of_branch() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1"])?;
  std::fs::write(ws.path.join("CHANGELOG.md"), "uncommitted edit\n")?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("uncommitted"));
  Ok(())
}

#[test]
fn test_dev_channel_release_rejected() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1", "2024.2"])?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0", "--channel", "dev"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("dev channel"));
  Ok(())
}

#[test]
fn test_stale_ci_config_rejected() -> Result<()> {
  let ws = TestWorkspace::new()?;
  ws.checkout_new_branch("release_13")?;
  ws.warm_cache(&["2024.1"])?;
  set_mtime(
    &ws.path.join(".ci.yml"),
    SystemTime::now() - Duration::from_secs(600),
  )?;

  let output = run_forge_gated(&ws.path, &["build", "--release", "13.0"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("generate"));
  Ok(())
}

#[test]
fn test_non_repository_rejected() -> Result<()> {
  let dir = tempfile::tempdir()?;
  std::fs::write(dir.path().join("product-matrix.json"), crate::helpers::MATRIX)?;

  let output = run_forge_gated(dir.path(), &["build", "--release", "13.0"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(String::from_utf8_lossy(&output.stderr).contains("version control"));
  Ok(())
}
