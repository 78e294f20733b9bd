//! Regenerate derived files: plugin manifests, CI config, live templates

use crate::core::context::RunContext;
use crate::core::error::{ForgeError, ForgeResult};
use crate::matrix::{ci_versions, derive_synthetic, load_matrix};
use crate::template::generate_file;
use chrono::Local;
use regex::Regex;
use std::fs;

/// Run the generate command. Returns the process exit status.
pub fn run_generate(ctx: &RunContext) -> ForgeResult<i32> {
  let specs = load_matrix(ctx)?;

  // Public manifest from the first matrix row, internal variant from the
  // synthetic spec spanning the whole matrix.
  let first = specs
    .first()
    .ok_or_else(|| ForgeError::message("product matrix has no rows"))?;
  generate_file(ctx, first, &ctx.manifest_template_path(), &ctx.manifest_path())?;
  println!("wrote {}", ctx.manifest_path().display());

  let synthetic = derive_synthetic(ctx, &specs)?;
  let internal = ctx.root.join("resources/META-INF/plugin-internal.xml");
  generate_file(ctx, &synthetic.spec, &ctx.manifest_template_path(), &internal)?;
  println!("wrote {}", internal.display());

  generate_ci_config(ctx, &ci_versions(&specs))?;
  println!("wrote {}", ctx.ci_config_path().display());

  generate_live_templates(ctx)?;

  Ok(0)
}

/// Derive the CI config from its template: @VERSIONS@ becomes the
/// comma-joined list of stable, non-snapshot versions.
pub fn generate_ci_config(ctx: &RunContext, versions: &[&str]) -> ForgeResult<()> {
  let template_path = ctx.ci_template_path();
  let template = fs::read_to_string(&template_path).map_err(|e| ForgeError::Parse {
    path: template_path.clone(),
    message: e.to_string(),
  })?;

  let mut out = format!(
    "# Generated on {} from {}. Do not edit; run 'plugin-forge generate' instead.\n",
    Local::now().format("%Y-%m-%d"),
    template_path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
  );
  out.push_str(&template.replace("@VERSIONS@", &versions.join(",")));
  fs::write(ctx.ci_config_path(), out)?;
  Ok(())
}

/// Substitute every snippet file into the snippet-library manifest.
///
/// Each `<name>.txt` under the snippet directory replaces the value of the
/// `<template name="<name>" .../>` entry; a snippet with no matching entry
/// is an error.
pub fn generate_live_templates(ctx: &RunContext) -> ForgeResult<i32> {
  let manifest_path = ctx.snippet_manifest_path();
  if !manifest_path.is_file() {
    // No snippet library in this checkout.
    return Ok(0);
  }
  let mut manifest = fs::read_to_string(&manifest_path)?;

  let mut entries: Vec<_> = fs::read_dir(ctx.snippet_dir())?
    .filter_map(|e| e.ok())
    .map(|e| e.path())
    .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
    .collect();
  entries.sort();

  for snippet_path in entries {
    let name = snippet_path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let body = fs::read_to_string(&snippet_path)?;
    manifest = inject_snippet(&manifest, &name, &snippet_value(&body))?;
  }

  fs::write(&manifest_path, manifest)?;
  println!("wrote {}", manifest_path.display());
  Ok(0)
}

/// Escape a snippet body for a value attribute: newlines and angle
/// brackets become character references.
fn snippet_value(body: &str) -> String {
  body
    .trim_end_matches('\n')
    .replace('&', "&amp;")
    .replace('"', "&quot;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('\n', "&#10;")
}

/// Replace the value attribute of the named template entry verbatim.
fn inject_snippet(manifest: &str, name: &str, value: &str) -> ForgeResult<String> {
  let pattern = format!(
    r#"(<template[^>]*\bname="{}"[^>]*\bvalue=")[^"]*(")"#,
    regex::escape(name)
  );
  let re = Regex::new(&pattern).map_err(|e| ForgeError::message(format!("bad snippet pattern: {}", e)))?;
  if !re.is_match(manifest) {
    return Err(ForgeError::message(format!(
      "no template entry named '{}' in the snippet manifest",
      name
    )));
  }
  Ok(
    re
      .replace(manifest, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps[1], value, &caps[2])
      })
      .into_owned(),
  )
}
