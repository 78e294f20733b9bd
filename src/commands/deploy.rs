//! Upload previously built artifacts to the distribution channel
//!
//! The bearer credential comes from the environment and only ever travels
//! as a structured subprocess argument.

use crate::commands::build::artifact_name;
use crate::core::context::RunContext;
use crate::core::error::{ForgeError, ForgeResult};
use crate::gate::check_release_ready;
use crate::matrix::load_matrix;
use crate::tools::ExternalUploader;
use std::env;

/// Run the deploy command. Returns the process exit status.
pub fn run_deploy(ctx: &RunContext, uploader: &dyn ExternalUploader) -> ForgeResult<i32> {
  check_release_ready(ctx)?;

  let token = env::var("PLUGIN_REPO_TOKEN").map_err(|_| {
    ForgeError::with_help(
      "PLUGIN_REPO_TOKEN not found in environment",
      "Export the marketplace token before deploying",
    )
  })?;

  let specs = load_matrix(ctx)?;
  let channel = ctx.channel.to_string();

  for spec in &specs {
    if let Some(only) = &ctx.only_version {
      if &spec.version != only {
        continue;
      }
    }
    if !ctx.product.includes(spec.is_android_studio) || spec.channel != ctx.channel {
      continue;
    }

    let artifact = ctx.release_output_dir(&spec.version).join(artifact_name(spec));
    if !artifact.is_file() {
      return Err(ForgeError::message(format!(
        "No artifact for {} at {}; build it first",
        spec.version,
        artifact.display()
      )));
    }

    println!("Uploading {} to the {} channel", artifact.display(), channel);
    let (status, status_line) = uploader.upload(&artifact, &spec.plugin_id, &token, &channel)?;
    if !status_line.is_empty() {
      println!("  {}", status_line);
    }
    if status != 0 {
      eprintln!("Upload for {} failed with status {}", spec.version, status);
      return Ok(status);
    }
  }

  Ok(0)
}
