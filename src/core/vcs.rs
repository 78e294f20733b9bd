//! System git wrapper for the repository facts the release gate consumes
//!
//! Uses git porcelain/plumbing via subprocess with an isolated
//! environment. Only the boolean/string facts the gate needs are exposed;
//! everything else about version control stays external to this tool.

use crate::core::error::{ForgeError, ForgeResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git facts provider backed by the system git binary
pub struct SystemGit {
  work_tree: PathBuf,
}

impl SystemGit {
  /// Open the repository containing `path`. Errors if `path` is not under
  /// version control.
  pub fn open(path: &Path) -> ForgeResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      return Err(ForgeError::message(format!(
        "{} is not under version control",
        path.display()
      )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(Self {
      work_tree: PathBuf::from(stdout.trim()),
    })
  }

  /// Get current branch name; "HEAD" when detached
  pub fn current_branch(&self) -> ForgeResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// True when the working tree has no uncommitted changes
  pub fn is_clean(&self) -> ForgeResult<bool> {
    let output = self
      .git_cmd()
      .args(["status", "--porcelain"])
      .output()
      .context("Failed to get working tree status")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ForgeError::message(format!("git status failed: {}", stderr)));
    }

    Ok(output.stdout.iter().all(|b| b.is_ascii_whitespace()))
  }

  /// Create a git command with an isolated environment: working directory
  /// pinned to the repo, only PATH and HOME inherited.
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(&self.work_tree);
    cmd.env_clear();
    if let Some(path) = std::env::var_os("PATH") {
      cmd.env("PATH", path);
    }
    if let Some(home) = std::env::var_os("HOME") {
      cmd.env("HOME", home);
    }
    cmd
  }
}
