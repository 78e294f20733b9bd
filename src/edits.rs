//! Scoped source edits: apply before a build, revert on every exit path
//!
//! Some target versions need temporary patches to shared checked-out
//! sources. An EditGuard captures byte snapshots of every file it touches
//! and restores them on normal return, on an error result, and on unwind.
//! The EditLedger watchdog catches the case where a crash left sources
//! mutated: a guard that was entered but never cleared fails the run.

use crate::core::context::RunContext;
use crate::core::error::{ForgeError, ForgeResult};
use crate::matrix::BuildSpec;
use serde::Deserialize;
use std::cell::Cell;
use std::fs;
use std::path::PathBuf;

/// One version-conditional source patch
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEdit {
  /// File to patch, relative to the working root
  pub path: PathBuf,
  /// Exact text to replace
  pub find: String,
  /// Replacement text
  pub replace: String,
  /// Matrix versions this edit applies to
  pub versions: Vec<String>,
}

impl SourceEdit {
  fn applies_to(&self, spec: &BuildSpec) -> bool {
    self.versions.iter().any(|v| v == &spec.version)
  }
}

/// Load the edit set from source-edits.json; a missing file is an empty set.
pub fn load_edits(ctx: &RunContext) -> ForgeResult<Vec<SourceEdit>> {
  let path = ctx.root.join("source-edits.json");
  if !path.is_file() {
    return Ok(Vec::new());
  }
  let raw = fs::read_to_string(&path)?;
  serde_json::from_str(&raw).map_err(|e| ForgeError::Parse {
    path,
    message: e.to_string(),
  })
}

/// Run-wide edit accounting. Applications and clears are counted so the
/// end-of-run watchdog can detect a scope that never reverted.
#[derive(Debug, Default)]
pub struct EditLedger {
  applied: Cell<usize>,
  cleared: Cell<usize>,
}

impl EditLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn outstanding(&self) -> bool {
    self.applied.get() > self.cleared.get()
  }

  /// End-of-run watchdog: a prior crash mid-build would otherwise leave
  /// checked-out sources permanently altered.
  pub fn assert_cleared(&self) -> ForgeResult<()> {
    if self.outstanding() {
      return Err(ForgeError::EditState("applied edit commands not cleared".to_string()));
    }
    Ok(())
  }

  fn note_applied(&self) {
    self.applied.set(self.applied.get() + 1);
  }

  fn note_cleared(&self) {
    self.cleared.set(self.cleared.get() + 1);
  }
}

/// An outstanding edit application holding pre-edit snapshots
pub struct EditGuard<'a> {
  ledger: &'a EditLedger,
  snapshots: Vec<(PathBuf, Vec<u8>)>,
  finished: bool,
}

impl<'a> EditGuard<'a> {
  /// Apply every edit whose version list matches the spec. Files are
  /// snapshotted before mutation. Applying while another application is
  /// outstanding is an error.
  pub fn apply(
    ledger: &'a EditLedger,
    ctx: &RunContext,
    spec: &BuildSpec,
    edits: &[SourceEdit],
  ) -> ForgeResult<Self> {
    if ledger.outstanding() {
      return Err(ForgeError::EditState(
        "cannot apply edits while a previous application is outstanding".to_string(),
      ));
    }

    let mut guard = EditGuard {
      ledger,
      snapshots: Vec::new(),
      finished: false,
    };

    for edit in edits.iter().filter(|e| e.applies_to(spec)) {
      let path = ctx.root.join(&edit.path);
      let original = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
          // Roll back whatever we already touched before failing.
          guard.restore_all();
          guard.finished = true;
          return Err(ForgeError::message(format!(
            "Edit target {} unreadable: {}",
            path.display(),
            e
          )));
        }
      };
      let text = String::from_utf8_lossy(&original).into_owned();
      if !text.contains(&edit.find) {
        guard.restore_all();
        guard.finished = true;
        return Err(ForgeError::message(format!(
          "Edit pattern '{}' not found in {}",
          edit.find,
          path.display()
        )));
      }
      let patched = text.replace(&edit.find, &edit.replace);
      fs::write(&path, patched)?;
      guard.snapshots.push((path, original));
    }

    if !guard.snapshots.is_empty() {
      ledger.note_applied();
    }
    Ok(guard)
  }

  /// How many files this application mutated
  #[allow(dead_code)]
  pub fn edited_count(&self) -> usize {
    self.snapshots.len()
  }

  fn restore_all(&mut self) {
    // Reverse order, in case two edits touched the same file.
    while let Some((path, bytes)) = self.snapshots.pop() {
      if let Err(e) = fs::write(&path, &bytes) {
        eprintln!("Failed to restore {}: {}", path.display(), e);
      }
    }
  }

  /// Revert all edits, restoring byte-identical pre-edit content.
  pub fn finish(mut self) -> ForgeResult<()> {
    let had_edits = !self.snapshots.is_empty();
    let mut failed = Vec::new();
    while let Some((path, bytes)) = self.snapshots.pop() {
      if let Err(e) = fs::write(&path, &bytes) {
        failed.push(format!("{}: {}", path.display(), e));
      }
    }
    self.finished = true;
    if had_edits {
      self.ledger.note_cleared();
    }
    if !failed.is_empty() {
      return Err(ForgeError::EditState(format!(
        "failed to restore edited files: {}",
        failed.join("; ")
      )));
    }
    Ok(())
  }
}

impl Drop for EditGuard<'_> {
  fn drop(&mut self) {
    if self.finished {
      return;
    }
    // Unwind path: restore best-effort so a panicking build step cannot
    // leave sources mutated.
    let had_edits = !self.snapshots.is_empty();
    self.restore_all();
    if had_edits {
      self.ledger.note_cleared();
    }
  }
}

/// Scoped-acquisition wrapper: apply matching edits, run `body`, revert
/// unconditionally, then propagate `body`'s outcome.
pub fn with_edits<T>(
  ledger: &EditLedger,
  ctx: &RunContext,
  spec: &BuildSpec,
  edits: &[SourceEdit],
  body: impl FnOnce() -> ForgeResult<T>,
) -> ForgeResult<T> {
  let guard = EditGuard::apply(ledger, ctx, spec, edits)?;
  let result = body();
  match guard.finish() {
    Ok(()) => result,
    // A failed restore outranks a successful body, but never masks the
    // body's own error.
    Err(restore_err) => match result {
      Ok(_) => Err(restore_err),
      Err(body_err) => {
        eprintln!("{}", restore_err);
        Err(body_err)
      }
    },
  }
}
