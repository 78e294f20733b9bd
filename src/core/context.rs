//! Per-run configuration - built once in main, passed everywhere
//!
//! RunContext replaces ambient globals: the working root, release
//! identifier, channel, and filter flags are resolved exactly once at
//! startup and every component receives them by reference.

use crate::core::error::{ForgeError, ForgeResult};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Normalize a bare major release identifier: "13" becomes "13.0".
pub fn normalize_release(id: &str) -> String {
  if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
    format!("{}.0", id)
  } else {
    id.to_string()
  }
}

/// Distribution track for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
  Stable,
  Dev,
}

impl Channel {
  pub fn parse(s: &str) -> ForgeResult<Self> {
    match s {
      "stable" => Ok(Channel::Stable),
      "dev" => Ok(Channel::Dev),
      other => Err(ForgeError::message(format!(
        "Unknown channel '{}' (expected 'stable' or 'dev')",
        other
      ))),
    }
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Channel::Stable => write!(f, "stable"),
      Channel::Dev => write!(f, "dev"),
    }
  }
}

/// Which product rows of the matrix to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFilter {
  Intellij,
  AndroidStudio,
  Both,
}

impl ProductFilter {
  pub fn parse(s: &str) -> ForgeResult<Self> {
    match s {
      "intellij" => Ok(ProductFilter::Intellij),
      "android-studio" => Ok(ProductFilter::AndroidStudio),
      "both" => Ok(ProductFilter::Both),
      other => Err(ForgeError::message(format!(
        "Unknown product '{}' (expected 'intellij', 'android-studio', or 'both')",
        other
      ))),
    }
  }

  /// Does a matrix row with the given product flag survive this filter?
  pub fn includes(self, is_android_studio: bool) -> bool {
    match self {
      ProductFilter::Intellij => !is_android_studio,
      ProductFilter::AndroidStudio => is_android_studio,
      ProductFilter::Both => true,
    }
  }
}

/// Immutable per-run configuration
#[derive(Debug, Clone)]
pub struct RunContext {
  /// Working root (absolute path)
  pub root: PathBuf,

  /// Release identifier (`major.minor`, optional `-dev.N` suffix).
  /// Present only for release-mode runs.
  pub release: Option<String>,

  /// Active distribution channel
  pub channel: Channel,

  /// Product selector; default both
  pub product: ProductFilter,

  /// Single-version override: ignore all other matrix rows
  pub only_version: Option<String>,

  /// Force re-fetch of cached artifacts
  pub rebuild_cache: bool,

  /// Stop after provisioning (no external build)
  pub setup_only: bool,

  /// Trigger an unconditional artifact-unpack pass as the last action
  pub unpack_after: bool,

  /// Gate bypass for automated verification (FORGE_TEST_MODE=1)
  pub test_mode: bool,
}

impl RunContext {
  /// Resolve the working root and required environment, fail fast if the
  /// build toolchain is not available.
  #[allow(clippy::too_many_arguments)]
  pub fn build(
    cwd: Option<PathBuf>,
    release: Option<String>,
    channel: Channel,
    product: ProductFilter,
    only_version: Option<String>,
    rebuild_cache: bool,
    setup_only: bool,
    unpack_after: bool,
  ) -> ForgeResult<Self> {
    if env::var_os("JAVA_HOME").is_none() {
      return Err(ForgeError::with_help(
        "JAVA_HOME is not set",
        "Point JAVA_HOME at the JDK used by the external build step",
      ));
    }

    let root = match cwd {
      Some(dir) => dir,
      None => env::current_dir()?,
    };
    if !root.is_dir() {
      return Err(ForgeError::message(format!(
        "Working root {} is not a directory",
        root.display()
      )));
    }

    let test_mode = env::var("FORGE_TEST_MODE").map(|v| v == "1").unwrap_or(false);
    let release = release.map(|r| normalize_release(&r));

    Ok(Self {
      root,
      release,
      channel,
      product,
      only_version,
      rebuild_cache,
      setup_only,
      unpack_after,
      test_mode,
    })
  }

  /// Is this a release-mode run?
  pub fn release_mode(&self) -> bool {
    self.release.is_some()
  }

  /// Major component of the release identifier ("13.0" -> "13")
  pub fn release_major(&self) -> Option<&str> {
    self.release.as_deref().and_then(|r| r.split('.').next())
  }

  /// Output scope directory name: release_<major> in release mode,
  /// release_master / release_dev otherwise.
  pub fn release_scope(&self) -> String {
    match self.release_major() {
      Some(major) => format!("release_{}", major),
      None => match self.channel {
        Channel::Stable => "release_master".to_string(),
        Channel::Dev => "release_dev".to_string(),
      },
    }
  }

  // Conventional paths, all relative to the working root.

  pub fn matrix_path(&self) -> PathBuf {
    self.root.join("product-matrix.json")
  }

  pub fn manifest_template_path(&self) -> PathBuf {
    self.root.join("resources/META-INF/plugin.xml.template")
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.root.join("resources/META-INF/plugin.xml")
  }

  pub fn ci_template_path(&self) -> PathBuf {
    self.root.join(".ci.template.yml")
  }

  pub fn ci_config_path(&self) -> PathBuf {
    self.root.join(".ci.yml")
  }

  pub fn snippet_dir(&self) -> PathBuf {
    self.root.join("resources/liveTemplates")
  }

  pub fn snippet_manifest_path(&self) -> PathBuf {
    self.root.join("resources/liveTemplates/templates.xml")
  }

  pub fn artifact_dir(&self, version: &str) -> PathBuf {
    self.root.join("artifacts").join(version)
  }

  pub fn build_dir(&self) -> PathBuf {
    self.root.join("build")
  }

  /// Where a spec's built artifact lands:
  /// releases/<scope>/<version>/<artifact-name>
  pub fn release_output_dir(&self, version: &str) -> PathBuf {
    self.root.join("releases").join(self.release_scope()).join(version)
  }

  pub fn changelog_path(&self, channel: Channel) -> PathBuf {
    match channel {
      Channel::Stable => self.root.join("CHANGELOG.md"),
      Channel::Dev => self.root.join("CHANGELOG-dev.md"),
    }
  }
}
