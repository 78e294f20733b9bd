//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const MATRIX: &str = r#"{
  "pluginId": "io.forge.plugin",
  "list": [
    {"version": "2024.1", "product": "intellij", "ideVersion": "2024.1.4",
     "dartPluginVersion": "241.15989", "sinceBuild": "241", "untilBuild": "241.*",
     "channel": "stable"},
    {"version": "2024.2", "product": "intellij", "ideVersion": "2024.2.1",
     "dartPluginVersion": "242.21829", "sinceBuild": "242", "untilBuild": "SNAPSHOT",
     "channel": "dev"}
  ]
}"#;

/// A plugin workspace with git history and a stub external build tool
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestWorkspace {
  /// Create a workspace with matrix, templates, changelogs, CI config,
  /// and a gradlew stub that succeeds and produces the expected artifact.
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    fs::write(path.join("product-matrix.json"), MATRIX)?;
    fs::create_dir_all(path.join("resources/META-INF"))?;
    fs::write(
      path.join("resources/META-INF/plugin.xml.template"),
      "<idea-plugin>\n  <id>@PLUGINID@</id>\n  @VERSION@\n  <depends>@DEPEND@</depends>\n  <idea-version since-build=\"@SINCE@\" until-build=\"@UNTIL@\"/>\n</idea-plugin>\n",
    )?;
    fs::write(path.join("CHANGELOG.md"), "stable notes\n")?;
    fs::write(path.join("CHANGELOG-dev.md"), "dev notes\n")?;
    fs::write(path.join(".ci.template.yml"), "versions: [@VERSIONS@]\n")?;
    fs::write(path.join(".ci.yml"), "versions: [2024.1]\n")?;
    // Run products stay out of the clean-tree check.
    fs::write(
      path.join(".gitignore"),
      "artifacts/\nbuild/\nreleases/\ngradle-invocations.log\nsource-edits.json\nresources/META-INF/plugin.xml\nresources/META-INF/plugin-internal.xml\n.ci.yml\n",
    )?;

    let ws = Self { _root: root, path };
    ws.write_gradlew(0)?;

    git(&ws.path, &["add", "."])?;
    git(&ws.path, &["commit", "-m", "Initial workspace"])?;
    Ok(ws)
  }

  /// Install a gradlew stub that logs each invoked version and exits with
  /// `status`. On success it produces the artifact the orchestrator moves.
  pub fn write_gradlew(&self, status: i32) -> Result<()> {
    let script = format!(
      "#!/bin/sh\necho \"$@\" >> \"$PWD/gradle-invocations.log\"\nmkdir -p build\necho zip > build/io.forge.plugin.zip\nexit {}\n",
      status
    );
    let gradlew = self.path.join("gradlew");
    fs::write(&gradlew, script)?;
    let mut perms = fs::metadata(&gradlew)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&gradlew, perms)?;
    Ok(())
  }

  /// Versions the gradlew stub was invoked for, in order
  pub fn built_versions(&self) -> Vec<String> {
    let log = match fs::read_to_string(self.path.join("gradle-invocations.log")) {
      Ok(l) => l,
      Err(_) => return Vec::new(),
    };
    log
      .lines()
      .filter_map(|l| {
        l.split_whitespace()
          .find(|a| a.starts_with("-PideVersion="))
          .map(|a| a.trim_start_matches("-PideVersion=").to_string())
      })
      .collect()
  }

  /// Mark every matrix version's artifact cache fresh so provisioning is
  /// a no-op: populated cache dir plus a generated manifest newer than
  /// the matrix file.
  pub fn warm_cache(&self, versions: &[&str]) -> Result<()> {
    for v in versions {
      let dir = self.path.join("artifacts").join(v);
      fs::create_dir_all(&dir)?;
      fs::write(dir.join("marker"), "x")?;
    }
    let manifest = self.path.join("resources/META-INF/plugin.xml");
    fs::write(&manifest, "<idea-plugin/>")?;
    let now = SystemTime::now();
    set_mtime(&self.path.join("product-matrix.json"), now - Duration::from_secs(120))?;
    set_mtime(&manifest, now)?;
    set_mtime(&self.path.join(".ci.yml"), now)?;
    Ok(())
  }

  pub fn commit_all(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  pub fn checkout_new_branch(&self, name: &str) -> Result<()> {
    git(&self.path, &["checkout", "-b", name])?;
    Ok(())
  }
}

pub fn set_mtime(path: &Path, when: SystemTime) -> Result<()> {
  let f = fs::OpenOptions::new().write(true).open(path)?;
  f.set_modified(when)?;
  Ok(())
}

pub fn git(dir: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(dir)
    .args(args)
    .output()
    .with_context(|| format!("Failed to run git {:?}", args))?;
  anyhow::ensure!(
    output.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&output.stderr)
  );
  Ok(output)
}

/// Run plugin-forge with the gate's test-mode bypass enabled
pub fn run_forge(dir: &Path, args: &[&str]) -> Result<Output> {
  forge_command(dir, args).env("FORGE_TEST_MODE", "1").output().context("Failed to run plugin-forge")
}

/// Run plugin-forge with the release gate fully active
pub fn run_forge_gated(dir: &Path, args: &[&str]) -> Result<Output> {
  forge_command(dir, args).output().context("Failed to run plugin-forge")
}

pub fn forge_command(dir: &Path, args: &[&str]) -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_plugin-forge"));
  cmd
    .current_dir(dir)
    .args(args)
    .arg("--cwd")
    .arg(dir)
    .env("JAVA_HOME", dir)
    .env_remove("FORGE_TEST_MODE");
  cmd
}
