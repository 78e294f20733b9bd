//! Error types for plugin-forge with contextual messages and exit codes
//!
//! Every failure path in the tool maps to one of these categories so that
//! the process exit code tells CI what went wrong without parsing output.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for plugin-forge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (bad matrix, invalid args, missing env)
  User = 1,
  /// System error (git, network, I/O, external tool)
  System = 2,
  /// Validation failure (release gate, edit watchdog)
  Validation = 3,
}

impl ExitCode {
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for plugin-forge
#[derive(Debug)]
pub enum ForgeError {
  /// Malformed matrix or template input
  Parse { path: PathBuf, message: String },

  /// A template referenced a placeholder this tool does not know
  UnknownPlaceholder { name: String, line: String },

  /// External fetch/unpack returned non-zero; no partial artifacts trusted
  Provisioning { version: String, status: i32 },

  /// An edit scope was entered but never cleared
  EditState(String),

  /// One of the release gate checks rejected the run
  Gate(String),

  /// Build/test/upload subprocess failed
  Tool { command: String, status: i32, stderr: String },

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional help
  Message { message: String, help: Option<String> },
}

impl ForgeError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ForgeError::Message {
      message: msg.into(),
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ForgeError::Message {
      message: msg.into(),
      help: Some(help.into()),
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ForgeError::Parse { .. } => ExitCode::User,
      ForgeError::UnknownPlaceholder { .. } => ExitCode::User,
      ForgeError::Provisioning { .. } => ExitCode::System,
      ForgeError::EditState(_) => ExitCode::Validation,
      ForgeError::Gate(_) => ExitCode::Validation,
      ForgeError::Tool { .. } => ExitCode::System,
      ForgeError::Io(_) => ExitCode::System,
      ForgeError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ForgeError::Parse { path, .. } => Some(format!("Check the structure of {}", path.display())),
      ForgeError::UnknownPlaceholder { .. } => {
        Some("Recognized placeholders: @PLUGINID@ @SINCE@ @UNTIL@ @VERSION@ @CHANGELOG@ @DEPEND@".to_string())
      }
      ForgeError::Gate(_) => Some("Fix the repository state and retry, or drop --release".to_string()),
      ForgeError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ForgeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ForgeError::Parse { path, message } => {
        write!(f, "Failed to parse {}: {}", path.display(), message)
      }
      ForgeError::UnknownPlaceholder { name, line } => {
        write!(f, "Unknown placeholder @{}@ in template line: {}", name, line)
      }
      ForgeError::Provisioning { version, status } => {
        write!(f, "Artifact provisioning for {} failed with status {}", version, status)
      }
      ForgeError::EditState(msg) => write!(f, "Edit state error: {}", msg),
      ForgeError::Gate(reason) => write!(f, "Release gate rejected: {}", reason),
      ForgeError::Tool { command, status, stderr } => {
        write!(f, "External tool '{}' failed with status {}", command, status)?;
        if !stderr.is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
      ForgeError::Io(e) => write!(f, "I/O error: {}", e),
      ForgeError::Message { message, .. } => write!(f, "{}", message),
    }
  }
}

impl std::error::Error for ForgeError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ForgeError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ForgeError {
  fn from(err: io::Error) -> Self {
    ForgeError::Io(err)
  }
}

impl From<String> for ForgeError {
  fn from(msg: String) -> Self {
    ForgeError::message(msg)
  }
}

impl From<&str> for ForgeError {
  fn from(msg: &str) -> Self {
    ForgeError::message(msg)
  }
}

/// Result alias used throughout the crate
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Extension trait for converting io results with context
pub trait ResultExt<T> {
  fn context(self, msg: &str) -> ForgeResult<T>;
}

impl<T> ResultExt<T> for Result<T, io::Error> {
  fn context(self, msg: &str) -> ForgeResult<T> {
    self.map_err(|e| ForgeError::message(format!("{}: {}", msg, e)))
  }
}
