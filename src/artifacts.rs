//! Per-version artifact cache and SDK provisioning
//!
//! Each matrix version owns an independent cache directory under
//! artifacts/<version>/. Freshness compares the generated manifest's
//! mtime against the matrix file's: when the manifest is strictly newer
//! and the cache is populated, provisioning is a no-op.

use crate::core::error::ForgeResult;
use crate::matrix::BuildSpec;
use crate::tools::ArtifactFetcher;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Cache state owned by one BuildSpec
#[derive(Debug)]
pub struct ArtifactCache {
  dir: PathBuf,
  matrix_path: PathBuf,
  manifest_path: PathBuf,
}

impl ArtifactCache {
  pub fn new(dir: PathBuf, matrix_path: PathBuf, manifest_path: PathBuf) -> Self {
    Self {
      dir,
      matrix_path,
      manifest_path,
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Fresh when the generated manifest is strictly newer than the matrix
  /// file and the cache directory is populated.
  pub fn is_fresh(&self) -> bool {
    let Some(manifest) = mtime(&self.manifest_path) else {
      return false;
    };
    let Some(matrix) = mtime(&self.matrix_path) else {
      return false;
    };
    if manifest <= matrix {
      return false;
    }
    fs::read_dir(&self.dir).map(|mut d| d.next().is_some()).unwrap_or(false)
  }
}

fn mtime(path: &Path) -> Option<SystemTime> {
  fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// One remote dependency a spec needs provisioned
struct RemoteArtifact {
  url: String,
  archive_name: String,
  unpack_as: &'static str,
}

fn required_artifacts(spec: &BuildSpec) -> Vec<RemoteArtifact> {
  let ide = if spec.is_android_studio {
    RemoteArtifact {
      url: format!(
        "https://redirector.gvt1.com/edgedl/android/studio/ide-zips/{v}/android-studio-{v}-linux.tar.gz",
        v = spec.ide_version
      ),
      archive_name: format!("android-studio-{}.tar.gz", spec.ide_version),
      unpack_as: "ide",
    }
  } else {
    RemoteArtifact {
      url: format!(
        "https://www.jetbrains.com/intellij-repository/releases/com/jetbrains/intellij/idea/ideaIC/{v}/ideaIC-{v}.zip",
        v = spec.ide_version
      ),
      archive_name: format!("ideaIC-{}.zip", spec.ide_version),
      unpack_as: "ide",
    }
  };
  let dart = RemoteArtifact {
    url: format!(
      "https://plugins.jetbrains.com/plugin/download?pluginId=Dart&version={}",
      spec.dart_plugin_version
    ),
    archive_name: format!("Dart-{}.zip", spec.dart_plugin_version),
    unpack_as: "dart-plugin",
  };
  vec![ide, dart]
}

/// Ensure the spec's SDK artifacts exist locally.
///
/// With `rebuild_cache` false and a fresh cache this performs no I/O
/// beyond the freshness check. A non-zero status from the external
/// fetch/unpack step is returned, not raised; the caller decides whether
/// it aborts the run.
pub fn provision(spec: &BuildSpec, fetcher: &dyn ArtifactFetcher, rebuild_cache: bool) -> ForgeResult<i32> {
  let cache = &spec.artifacts;

  if !rebuild_cache && cache.is_fresh() {
    println!("  artifacts for {} are up to date", spec.version);
    return Ok(0);
  }

  fs::create_dir_all(cache.dir())?;

  for artifact in required_artifacts(spec) {
    let archive = cache.dir().join(&artifact.archive_name);

    if rebuild_cache || !archive.is_file() {
      println!("  fetching {}", artifact.archive_name);
      let status = fetcher.fetch(&artifact.url, &archive)?;
      if status != 0 {
        eprintln!("  fetch of {} failed with status {}", artifact.url, status);
        return Ok(status);
      }
    }

    // Replace any previously unpacked contents wholesale.
    let unpack_dir = cache.dir().join(artifact.unpack_as);
    if unpack_dir.exists() {
      fs::remove_dir_all(&unpack_dir)?;
    }
    let status = fetcher.unpack(&archive, &unpack_dir)?;
    if status != 0 {
      eprintln!("  unpack of {} failed with status {}", archive.display(), status);
      return Ok(status);
    }
  }

  Ok(0)
}

/// Re-unpack every already-downloaded archive for the spec. Used by the
/// unconditional post-run unpack pass; missing archives are skipped.
pub fn unpack_existing(spec: &BuildSpec, fetcher: &dyn ArtifactFetcher) -> ForgeResult<i32> {
  let cache = &spec.artifacts;
  for artifact in required_artifacts(spec) {
    let archive = cache.dir().join(&artifact.archive_name);
    if !archive.is_file() {
      continue;
    }
    let status = fetcher.unpack(&archive, &cache.dir().join(artifact.unpack_as))?;
    if status != 0 {
      return Ok(status);
    }
  }
  Ok(0)
}
