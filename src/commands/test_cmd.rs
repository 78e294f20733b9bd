//! Run the external test tool across the filtered matrix

use crate::artifacts::provision;
use crate::core::context::RunContext;
use crate::core::error::{ForgeError, ForgeResult};
use crate::edits::{EditLedger, load_edits, with_edits};
use crate::matrix::load_matrix;
use crate::template::generate_file;
use crate::tools::{ArtifactFetcher, ExternalBuilder};

/// Run the test command. Returns the process exit status.
pub fn run_test(ctx: &RunContext, fetcher: &dyn ArtifactFetcher, builder: &dyn ExternalBuilder) -> ForgeResult<i32> {
  let specs = load_matrix(ctx)?;
  let edits = load_edits(ctx)?;
  let ledger = EditLedger::new();

  for spec in &specs {
    if let Some(only) = &ctx.only_version {
      if &spec.version != only {
        continue;
      }
    }
    if !ctx.product.includes(spec.is_android_studio) || spec.channel != ctx.channel {
      continue;
    }
    println!("Testing {} ({} channel)", spec.version, spec.channel);

    let status = provision(spec, fetcher, ctx.rebuild_cache)?;
    if status != 0 {
      return Err(ForgeError::Provisioning {
        version: spec.version.clone(),
        status,
      });
    }

    generate_file(ctx, spec, &ctx.manifest_template_path(), &ctx.manifest_path())?;

    let status = with_edits(&ledger, ctx, spec, &edits, || builder.test(&ctx.root, spec))?;
    if status != 0 {
      eprintln!("External tests for {} failed with status {}", spec.version, status);
      return Ok(status);
    }
  }

  if ctx.only_version.is_none() {
    ledger.assert_cleared()?;
  }
  Ok(0)
}
