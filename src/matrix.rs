//! Product matrix loader - one BuildSpec per target platform version
//!
//! The matrix file (product-matrix.json) declares the full set of build
//! variants. Rows come out in file order; callers rely on the first row
//! when deriving the synthetic spec for merged-manifest generation.

use crate::artifacts::ArtifactCache;
use crate::core::context::{Channel, RunContext};
use crate::core::error::{ForgeError, ForgeResult};
use serde::Deserialize;
use std::cell::OnceCell;
use std::collections::HashSet;
use std::fs;

/// Sentinel in untilBuild meaning "no upper bound yet" - the row tracks an
/// unreleased/EAP target and is excluded from generated CI version lists.
pub const SNAPSHOT: &str = "SNAPSHOT";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixFile {
  #[serde(rename = "pluginId")]
  plugin_id: String,
  list: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatrixRow {
  version: String,
  product: String,
  #[serde(rename = "ideVersion")]
  ide_version: String,
  #[serde(rename = "dartPluginVersion")]
  dart_plugin_version: String,
  #[serde(rename = "sinceBuild")]
  since_build: String,
  #[serde(rename = "untilBuild")]
  until_build: String,
  channel: String,
}

/// One row of the product matrix: a concrete (version, channel, product)
/// build target.
#[derive(Debug)]
pub struct BuildSpec {
  pub version: String,
  pub channel: Channel,
  pub plugin_id: String,
  pub ide_version: String,
  pub dart_plugin_version: String,
  pub since_build: String,
  pub until_build: String,
  pub is_android_studio: bool,
  pub is_synthetic: bool,
  pub artifacts: ArtifactCache,
  changelog: OnceCell<String>,
}

impl BuildSpec {
  /// Does this row track an unreleased target?
  pub fn is_snapshot(&self) -> bool {
    self.until_build.contains(SNAPSHOT)
  }

  /// The computed plugin version: `<release>.<sinceBuild>` when a release
  /// identifier is declared, the matrix version otherwise.
  pub fn plugin_version(&self, release: Option<&str>) -> String {
    match release {
      Some(rel) => format!("{}.{}", rel, self.since_build),
      None => self.version.clone(),
    }
  }

  /// The dependency-module identifier substituted for @DEPEND@. The
  /// synthetic/internal manifest variant depends on the bundled platform
  /// module instead of the public Dart plugin.
  pub fn depend_module(&self) -> &'static str {
    if self.is_synthetic {
      "com.intellij.modules.platform"
    } else {
      "Dart"
    }
  }

  /// Changelog text for this spec's channel, loaded on first use.
  pub fn changelog(&self, ctx: &RunContext) -> ForgeResult<&str> {
    if let Some(text) = self.changelog.get() {
      return Ok(text);
    }
    let path = ctx.changelog_path(self.channel);
    let text = fs::read_to_string(&path).map_err(|e| ForgeError::Parse {
      path: path.clone(),
      message: format!("cannot read changelog: {}", e),
    })?;
    Ok(self.changelog.get_or_init(|| text))
  }

  /// Rebase a dev-channel spec onto the current development target:
  /// the upper bound becomes open-ended and the dev notes feed @CHANGELOG@.
  pub fn rebase_to_dev(&mut self) {
    self.channel = Channel::Dev;
    self.until_build = SNAPSHOT.to_string();
  }

  /// Pin the spec back onto the released track.
  #[allow(dead_code)]
  pub fn rebase_to_master(&mut self) {
    self.channel = Channel::Stable;
    self.until_build = format!("{}.*", self.since_build);
  }
}

/// A derived spec representing the merged/internal manifest. Never handed
/// to the external build step; its compatibility range spans every row of
/// the matrix it was derived from.
#[derive(Debug)]
pub struct SyntheticBuildSpec {
  pub spec: BuildSpec,
  /// Versions of all sibling rows, for cross-reference during generation
  pub sibling_versions: Vec<String>,
}

/// Parse the matrix file into ordered BuildSpecs.
///
/// Output order equals input order. Fails with a parse error when the
/// structure is malformed or a (version, channel) pair repeats.
pub fn load_matrix(ctx: &RunContext) -> ForgeResult<Vec<BuildSpec>> {
  let path = ctx.matrix_path();
  let raw = fs::read_to_string(&path).map_err(|e| ForgeError::Parse {
    path: path.clone(),
    message: e.to_string(),
  })?;
  let file: MatrixFile = serde_json::from_str(&raw).map_err(|e| ForgeError::Parse {
    path: path.clone(),
    message: e.to_string(),
  })?;

  let mut seen: HashSet<(String, Channel)> = HashSet::new();
  let mut specs = Vec::with_capacity(file.list.len());

  for row in file.list {
    let channel = Channel::parse(&row.channel).map_err(|e| ForgeError::Parse {
      path: path.clone(),
      message: e.to_string(),
    })?;
    let is_android_studio = match row.product.as_str() {
      "android-studio" => true,
      "intellij" => false,
      other => {
        return Err(ForgeError::Parse {
          path: path.clone(),
          message: format!("unknown product '{}' for version {}", other, row.version),
        });
      }
    };

    if !seen.insert((row.version.clone(), channel)) {
      return Err(ForgeError::Parse {
        path: path.clone(),
        message: format!("duplicate version {} in channel {}", row.version, channel),
      });
    }

    let artifacts = ArtifactCache::new(ctx.artifact_dir(&row.version), path.clone(), ctx.manifest_path());

    specs.push(BuildSpec {
      version: row.version,
      channel,
      plugin_id: file.plugin_id.clone(),
      ide_version: row.ide_version,
      dart_plugin_version: row.dart_plugin_version,
      since_build: row.since_build,
      until_build: row.until_build,
      is_android_studio,
      is_synthetic: false,
      artifacts,
      changelog: OnceCell::new(),
    });
  }

  Ok(specs)
}

/// Derive the synthetic spec from the first matrix row. The compatibility
/// range widens to cover every row: lowest sinceBuild through the highest
/// untilBuild (open-ended if any row is a snapshot).
pub fn derive_synthetic(ctx: &RunContext, specs: &[BuildSpec]) -> ForgeResult<SyntheticBuildSpec> {
  let first = specs.first().ok_or_else(|| ForgeError::Parse {
    path: ctx.matrix_path(),
    message: "matrix has no rows".to_string(),
  })?;

  let since = specs
    .iter()
    .map(|s| s.since_build.as_str())
    .min_by_key(|s| build_num(s))
    .unwrap_or(&first.since_build)
    .to_string();
  let until = if specs.iter().any(|s| s.is_snapshot()) {
    SNAPSHOT.to_string()
  } else {
    specs
      .iter()
      .map(|s| s.until_build.as_str())
      .max_by_key(|s| build_num(s))
      .unwrap_or(&first.until_build)
      .to_string()
  };

  let artifacts = ArtifactCache::new(
    ctx.artifact_dir(&first.version),
    ctx.matrix_path(),
    ctx.manifest_path(),
  );

  Ok(SyntheticBuildSpec {
    spec: BuildSpec {
      version: first.version.clone(),
      channel: first.channel,
      plugin_id: first.plugin_id.clone(),
      ide_version: first.ide_version.clone(),
      dart_plugin_version: first.dart_plugin_version.clone(),
      since_build: since,
      until_build: until,
      is_android_studio: first.is_android_studio,
      is_synthetic: true,
      artifacts,
      changelog: OnceCell::new(),
    },
    sibling_versions: specs.iter().map(|s| s.version.clone()).collect(),
  })
}

/// Stable, non-snapshot versions in matrix order - the list the generated
/// CI config enumerates.
pub fn ci_versions(specs: &[BuildSpec]) -> Vec<&str> {
  specs
    .iter()
    .filter(|s| s.channel == Channel::Stable && !s.is_snapshot())
    .map(|s| s.version.as_str())
    .collect()
}

/// Numeric prefix of a build bound ("241" in "241.*"), for range math
fn build_num(bound: &str) -> u64 {
  bound
    .split(['.', '-'])
    .next()
    .and_then(|s| s.parse().ok())
    .unwrap_or(0)
}
