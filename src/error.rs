//! Error kinds raised while parsing and running a line.
//!
//! Every variant maps to a status code via [`ShellError::exit_code`]; the
//! interpreter prints the message and records the status, it never stops on one.

use crate::command::{ExitCode, NOT_FOUND};
use crate::parser::RedirectKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShellError>;

#[derive(Error, Debug)]
pub enum ShellError {
    /// A redirection operator was the last token of its stage.
    #[error("syntax error: expected filename after '{0}'")]
    MissingRedirectTarget(RedirectKind),

    /// A pipeline stage carried no command word.
    #[error("syntax error: empty command in pipeline")]
    EmptyCommand,

    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// A redirection target could not be opened.
    #[error("{}: {}", .path.display(), reason(.source))]
    Redirect { path: PathBuf, source: io::Error },

    /// The resolved executable could not be started.
    #[error("{name}: {}", reason(.source))]
    Spawn { name: String, source: io::Error },

    #[error("{}", reason(.0))]
    Io(#[from] io::Error),
}

impl ShellError {
    /// Status the failed line reports.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ShellError::CommandNotFound(_) => NOT_FOUND,
            ShellError::Spawn { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => NOT_FOUND,
                io::ErrorKind::PermissionDenied => 126,
                _ => 1,
            },
            _ => 1,
        }
    }
}

/// Human-readable text of an I/O error without the ` (os error N)` suffix.
pub fn reason(err: &io::Error) -> String {
    let text = err.to_string();
    match text.find(" (os error") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
