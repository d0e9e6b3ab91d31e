// src/error.rs

//! Error types for package assembly
//!
//! Every variant is fatal to the run: there is no local recovery, the
//! assembler surfaces the first error it sees.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a package
#[derive(Error, Debug)]
pub enum Error {
    /// Unsupported distribution/architecture, bad arguments, refused output dir
    #[error("validation error: {0}")]
    Validation(String),

    /// An expected file or directory is absent after a step
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The directory a path mapping should walk does not exist
    #[error("source tree not found: {}", .0.display())]
    MissingSourceTree(PathBuf),

    /// An external command exited with an unexpected status
    #[error("step '{step}' failed: {detail} for command: {command}{}", log_hint(.log))]
    ExternalCommand {
        step: String,
        command: String,
        detail: String,
        log: Option<PathBuf>,
    },

    /// Scriptlet placeholder line not present in the template
    #[error("template {template}: placeholder line '{placeholder}' not found")]
    Template {
        template: String,
        placeholder: String,
    },

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Directory traversal failed
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Filesystem operation failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn log_hint(log: &Option<PathBuf>) -> String {
    match log {
        Some(path) => format!(". Check log for more details: {}", path.display()),
        None => String::new(),
    }
}

impl Error {
    /// Create a validation error with a message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a template error for a missing placeholder
    pub fn template(template: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            placeholder: placeholder.into(),
        }
    }
}

/// An [`Error`] tagged with the assembler step it stopped
#[derive(Error, Debug)]
#[error("step '{step}' failed")]
pub struct StepError {
    pub step: String,
    #[source]
    pub source: Error,
}

impl StepError {
    pub fn new(step: impl Into<String>, source: Error) -> Self {
        Self {
            step: step.into(),
            source,
        }
    }
}
