//! Release gate: repository and naming invariants checked before any
//! release-mode build or deploy
//!
//! Checks run in a fixed order and short-circuit on the first failure;
//! cheap structural checks come before git queries. Every rejection
//! carries the specific reason, never a bare boolean.

use crate::core::context::{Channel, RunContext, normalize_release};
use crate::core::error::{ForgeError, ForgeResult};
use crate::core::vcs::SystemGit;
use regex::Regex;
use std::fs;
use std::sync::LazyLock;

static RELEASE_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\d+\.\d(-dev\.\d)?$").expect("release id pattern"));

/// Validate that a release may be cut from the current repository state.
///
/// Returns the specific rejection reason on failure.
pub fn check_release_ready(ctx: &RunContext) -> ForgeResult<()> {
  // 1. Working root must be under version control.
  let git = match SystemGit::open(&ctx.root) {
    Ok(git) => git,
    Err(_) => {
      return Err(ForgeError::Gate(format!(
        "{} is not under version control",
        ctx.root.display()
      )));
    }
  };

  // 2. Automated verification bypasses the remaining checks.
  if ctx.test_mode {
    return Ok(());
  }

  // 3. Release mode is incompatible with dev-channel builds.
  if ctx.channel == Channel::Dev {
    return Err(ForgeError::Gate(
      "release mode is incompatible with the dev channel".to_string(),
    ));
  }

  // 4. The release identifier must be well-formed.
  let release = ctx
    .release
    .as_deref()
    .ok_or_else(|| ForgeError::Gate("no release identifier declared".to_string()))?;
  let release = normalize_release(release);
  if !RELEASE_ID.is_match(&release) {
    return Err(ForgeError::Gate(format!(
      "release identifier '{}' does not match major.minor (optional -dev.N suffix)",
      release
    )));
  }

  // 5. No uncommitted changes.
  if !git.is_clean()? {
    return Err(ForgeError::Gate("working tree has uncommitted changes".to_string()));
  }

  // 6. Branch must be release_<major>, optionally with a .<digit>
  //    point-release suffix.
  let major = release.split('.').next().unwrap_or(&release);
  let branch = git.current_branch()?;
  let branch_ok = Regex::new(&format!(r"^release_{}(\.\d)?$", regex::escape(major)))
    .map(|re| re.is_match(&branch))
    .unwrap_or(false);
  if !branch_ok {
    return Err(ForgeError::Gate(format!(
      "current branch '{}' is not release_{} (or a release_{}.N point-release branch)",
      branch, major, major
    )));
  }

  // 7. The generated CI config must be at least as fresh as the matrix.
  if !ci_config_fresh(ctx) {
    return Err(ForgeError::Gate(
      "generated CI config is older than the product matrix; run 'plugin-forge generate' first".to_string(),
    ));
  }

  Ok(())
}

/// Boolean form of the gate; logs the rejection reason.
#[allow(dead_code)] // Kept as convenience API for callers that branch instead of abort
pub fn is_release_ready(ctx: &RunContext) -> bool {
  match check_release_ready(ctx) {
    Ok(()) => true,
    Err(e) => {
      eprintln!("{}", e);
      false
    }
  }
}

fn ci_config_fresh(ctx: &RunContext) -> bool {
  let ci = match fs::metadata(ctx.ci_config_path()).and_then(|m| m.modified()) {
    Ok(t) => t,
    Err(_) => return false,
  };
  let matrix = match fs::metadata(ctx.matrix_path()).and_then(|m| m.modified()) {
    Ok(t) => t,
    Err(_) => return false,
  };
  ci >= matrix
}
