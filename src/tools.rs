//! External collaborator seams: fetch/unpack, build, upload
//!
//! The actual compiler/packager, download transport, and marketplace
//! upload are external processes. Each sits behind a trait so the
//! orchestrator can be exercised without spawning anything, and every
//! real implementation passes structured argument lists - credentials
//! never travel through a shell string.

use crate::core::error::{ForgeError, ForgeResult};
use crate::matrix::BuildSpec;
use std::path::Path;
use std::process::Command;

/// Fetches remote artifacts and unpacks local archives
pub trait ArtifactFetcher {
  /// Download `url` to `dest`. Returns the process exit status.
  fn fetch(&self, url: &str, dest: &Path) -> ForgeResult<i32>;

  /// Unpack `archive` into `dest_dir`. Returns the process exit status.
  fn unpack(&self, archive: &Path, dest_dir: &Path) -> ForgeResult<i32>;
}

/// Runs the external build/test tool for one spec
pub trait ExternalBuilder {
  /// Run the build step in `root` for `spec`. Returns the exit status.
  fn build(&self, root: &Path, spec: &BuildSpec) -> ForgeResult<i32>;

  /// Run the test step in `root` for `spec`. Returns the exit status.
  fn test(&self, root: &Path, spec: &BuildSpec) -> ForgeResult<i32>;
}

/// Uploads a produced artifact to the distribution channel
pub trait ExternalUploader {
  /// Upload `artifact` for `plugin_id` on `channel`. Returns the exit
  /// status and the tool's trailing status line for the operator.
  fn upload(&self, artifact: &Path, plugin_id: &str, token: &str, channel: &str) -> ForgeResult<(i32, String)>;
}

fn run_status(mut cmd: Command, what: &str) -> ForgeResult<i32> {
  let output = cmd
    .output()
    .map_err(|e| ForgeError::message(format!("Failed to spawn {}: {}", what, e)))?;
  let stderr = String::from_utf8_lossy(&output.stderr);
  if !output.status.success() && !stderr.trim().is_empty() {
    eprintln!("{}", stderr.trim_end());
  }
  match output.status.code() {
    Some(code) => Ok(code),
    // Killed by a signal: no status to surface verbatim.
    None => Err(ForgeError::Tool {
      command: what.to_string(),
      status: -1,
      stderr: stderr.into_owned(),
    }),
  }
}

/// curl + unzip/tar backed fetcher
pub struct CurlFetcher;

impl ArtifactFetcher for CurlFetcher {
  fn fetch(&self, url: &str, dest: &Path) -> ForgeResult<i32> {
    let mut cmd = Command::new("curl");
    cmd.args(["-fsSL", "--retry", "3", "-o"]).arg(dest).arg(url);
    run_status(cmd, "curl")
  }

  fn unpack(&self, archive: &Path, dest_dir: &Path) -> ForgeResult<i32> {
    std::fs::create_dir_all(dest_dir)?;
    let name = archive.to_string_lossy();
    let mut cmd = if name.ends_with(".tar.gz") {
      let mut c = Command::new("tar");
      c.arg("xzf").arg(archive).arg("-C").arg(dest_dir);
      c
    } else {
      let mut c = Command::new("unzip");
      c.args(["-o", "-q"]).arg(archive).arg("-d").arg(dest_dir);
      c
    };
    cmd.current_dir(dest_dir.parent().unwrap_or(dest_dir));
    run_status(cmd, "unpack")
  }
}

/// Gradle-backed build collaborator. Integration tests drop a stub
/// `gradlew` script into the workspace to control the exit status.
pub struct GradleBuilder;

impl GradleBuilder {
  fn run_task(&self, root: &Path, spec: &BuildSpec, task: &str) -> ForgeResult<i32> {
    let gradlew = root.join("gradlew");
    let mut cmd = Command::new(&gradlew);
    cmd
      .current_dir(root)
      .arg(task)
      .arg(format!("-PideVersion={}", spec.ide_version))
      .arg(format!("-PsinceBuild={}", spec.since_build))
      .arg(format!("-PuntilBuild={}", spec.until_build));
    run_status(cmd, "gradlew")
  }
}

impl ExternalBuilder for GradleBuilder {
  fn build(&self, root: &Path, spec: &BuildSpec) -> ForgeResult<i32> {
    self.run_task(root, spec, "buildPlugin")
  }

  fn test(&self, root: &Path, spec: &BuildSpec) -> ForgeResult<i32> {
    self.run_task(root, spec, "test")
  }
}

/// Marketplace upload via curl with a bearer token
pub struct MarketplaceUploader;

impl ExternalUploader for MarketplaceUploader {
  fn upload(&self, artifact: &Path, plugin_id: &str, token: &str, channel: &str) -> ForgeResult<(i32, String)> {
    let mut cmd = Command::new("curl");
    cmd
      .args(["-sS", "-w", "\n%{http_code}"])
      .arg("-H")
      .arg(format!("Authorization: Bearer {}", token))
      .arg("-F")
      .arg(format!("xmlId={}", plugin_id))
      .arg("-F")
      .arg(format!("channel={}", channel))
      .arg("-F")
      .arg(format!("file=@{}", artifact.display()))
      .arg("https://plugins.jetbrains.com/plugin/uploadPlugin");

    let output = cmd
      .output()
      .map_err(|e| ForgeError::message(format!("Failed to spawn upload: {}", e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let status_line = stdout.lines().last().unwrap_or("").to_string();
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if !stderr.trim().is_empty() {
        eprintln!("{}", stderr.trim_end());
      }
    }
    Ok((output.status.code().unwrap_or(-1), status_line))
  }
}
