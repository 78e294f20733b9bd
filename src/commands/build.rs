//! The product-matrix build orchestrator
//!
//! Iterates the filtered matrix in order: dev rebase, provisioning,
//! manifest generation, edit-scoped external build, artifact placement.
//! Provisioning and build failures abort the run; placement failures are
//! caught, logged, and folded into a generic failure status. The edit
//! watchdog runs after any full (non single-version) pass.

use crate::artifacts::{provision, unpack_existing};
use crate::core::context::{Channel, RunContext};
use crate::core::error::{ForgeError, ForgeResult};
use crate::edits::{EditLedger, SourceEdit, load_edits, with_edits};
use crate::gate::check_release_ready;
use crate::matrix::{BuildSpec, load_matrix};
use crate::template::generate_file;
use crate::tools::{ArtifactFetcher, ExternalBuilder};
use std::fs;

/// Run the build command. Returns the process exit status.
pub fn run_build(ctx: &RunContext, fetcher: &dyn ArtifactFetcher, builder: &dyn ExternalBuilder) -> ForgeResult<i32> {
  if ctx.release_mode() {
    check_release_ready(ctx)?;
  }

  let mut specs = load_matrix(ctx)?;
  let edits = load_edits(ctx)?;
  let ledger = EditLedger::new();

  let result = build_loop(ctx, &mut specs, &edits, &ledger, fetcher, builder);

  // Runs regardless of the loop's outcome.
  if ctx.unpack_after {
    println!("Unpacking cached artifacts");
    for spec in specs.iter().filter(|s| selected(ctx, s)) {
      match unpack_existing(spec, fetcher) {
        Ok(0) => {}
        Ok(status) => eprintln!("Unpack pass for {} returned status {}", spec.version, status),
        Err(e) => eprintln!("Unpack pass for {} failed: {}", spec.version, e),
      }
    }
  }

  result
}

fn selected(ctx: &RunContext, spec: &BuildSpec) -> bool {
  if let Some(only) = &ctx.only_version {
    if &spec.version != only {
      return false;
    }
  }
  ctx.product.includes(spec.is_android_studio) && spec.channel == ctx.channel
}

fn build_loop(
  ctx: &RunContext,
  specs: &mut [BuildSpec],
  edits: &[SourceEdit],
  ledger: &EditLedger,
  fetcher: &dyn ArtifactFetcher,
  builder: &dyn ExternalBuilder,
) -> ForgeResult<i32> {
  let mut placement_failed = false;

  for spec in specs.iter_mut() {
    if !selected(ctx, spec) {
      continue;
    }
    println!("Building {} ({} channel)", spec.version, spec.channel);

    if spec.channel == Channel::Dev && ctx.channel == Channel::Dev {
      spec.rebase_to_dev();
    }

    let status = provision(spec, fetcher, ctx.rebuild_cache)?;
    if status != 0 {
      // Fail fast: later specs are not attempted, no partial artifacts
      // trusted.
      return Err(ForgeError::Provisioning {
        version: spec.version.clone(),
        status,
      });
    }

    if ctx.setup_only {
      continue;
    }

    generate_file(ctx, spec, &ctx.manifest_template_path(), &ctx.manifest_path())?;

    let build_dir = ctx.build_dir();
    if build_dir.exists() {
      fs::remove_dir_all(&build_dir)?;
    }
    fs::create_dir_all(&build_dir)?;

    let status = with_edits(ledger, ctx, spec, edits, || builder.build(&ctx.root, spec))?;
    if status != 0 {
      eprintln!("External build for {} failed with status {}", spec.version, status);
      return Ok(status);
    }

    if let Err(e) = place_artifact(ctx, spec) {
      eprintln!("Failed to place artifact for {}: {}", spec.version, e);
      placement_failed = true;
    }
  }

  if ctx.only_version.is_none() {
    ledger.assert_cleared()?;
  }

  Ok(if placement_failed { 1 } else { 0 })
}

/// Name of the artifact the external build step leaves in build/
pub fn artifact_name(spec: &BuildSpec) -> String {
  format!("{}.zip", spec.plugin_id)
}

fn place_artifact(ctx: &RunContext, spec: &BuildSpec) -> ForgeResult<()> {
  let name = artifact_name(spec);
  let produced = ctx.build_dir().join(&name);
  if !produced.is_file() {
    return Err(ForgeError::message(format!(
      "expected build output {} not found",
      produced.display()
    )));
  }

  let out_dir = ctx.release_output_dir(&spec.version);
  fs::create_dir_all(&out_dir)?;
  let dest = out_dir.join(&name);
  fs::rename(&produced, &dest).or_else(|_| {
    fs::copy(&produced, &dest)?;
    fs::remove_file(&produced)
  })?;
  println!("  placed {}", dest.display());
  Ok(())
}
