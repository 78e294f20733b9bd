//! Placeholder substitution over manifest templates
//!
//! Placeholders are delimited by a pair of `@` characters (`@SINCE@`).
//! A lone `@` with no closing delimiter is literal text; substitution only
//! triggers on a well-formed pair. Unknown names inside a pair are fatal.

use crate::core::context::RunContext;
use crate::core::error::{ForgeError, ForgeResult};
use crate::matrix::BuildSpec;
use chrono::Local;
use std::fs;
use std::path::Path;

/// Substitute every `@NAME@` placeholder in one line with the value the
/// spec derives for it.
pub fn substitute_line(line: &str, spec: &BuildSpec, ctx: &RunContext) -> ForgeResult<String> {
  let mut out = String::with_capacity(line.len());
  let mut rest = line;

  while let Some(start) = rest.find('@') {
    let Some(offset) = rest[start + 1..].find('@') else {
      // Unmatched delimiter, e.g. an email address in a commit message.
      out.push_str(rest);
      return Ok(out);
    };
    let end = start + 1 + offset;
    let name = &rest[start + 1..end];
    out.push_str(&rest[..start]);
    out.push_str(&placeholder_value(name, line, spec, ctx)?);
    rest = &rest[end + 1..];
  }

  out.push_str(rest);
  Ok(out)
}

fn placeholder_value(name: &str, line: &str, spec: &BuildSpec, ctx: &RunContext) -> ForgeResult<String> {
  match name {
    "PLUGINID" => Ok(spec.plugin_id.clone()),
    "SINCE" => Ok(spec.since_build.clone()),
    "UNTIL" => Ok(spec.until_build.clone()),
    "VERSION" => Ok(format!(
      "<version>{}</version>",
      spec.plugin_version(ctx.release.as_deref())
    )),
    "CHANGELOG" => Ok(xml_escape(spec.changelog(ctx)?)),
    "DEPEND" => Ok(spec.depend_module().to_string()),
    other => Err(ForgeError::UnknownPlaceholder {
      name: other.to_string(),
      line: line.to_string(),
    }),
  }
}

/// Substitute a whole template file line by line and write the result with
/// a do-not-edit header pointing back at the template.
pub fn generate_file(ctx: &RunContext, spec: &BuildSpec, template: &Path, out: &Path) -> ForgeResult<()> {
  let source = fs::read_to_string(template).map_err(|e| ForgeError::Parse {
    path: template.to_path_buf(),
    message: e.to_string(),
  })?;

  let template_name = template
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| template.display().to_string());
  let mut result = format!(
    "<!-- Generated on {} from {}. Do not edit; run 'plugin-forge generate' instead. -->\n",
    Local::now().format("%Y-%m-%d"),
    template_name
  );

  for line in source.lines() {
    result.push_str(&substitute_line(line, spec, ctx)?);
    result.push('\n');
  }

  if let Some(parent) = out.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(out, result)?;
  Ok(())
}

/// Escape text for inclusion in an XML element body
pub fn xml_escape(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
}
