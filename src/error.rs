//! Error types.
//!
//! [`ExportError`] covers the handful of precondition violations that abort an
//! export. [`MediaError`] is per reference and never escapes the rewrite passes:
//! each pass degrades the reference instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors reported at the API boundary.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("notes root not found: {}", .0.display())]
    NotesRootMissing(PathBuf),

    #[error("notes root is not a directory: {}", .0.display())]
    NotesRootNotDirectory(PathBuf),

    #[error("note folder not found: {}", .0.display())]
    NoteFolderMissing(PathBuf),

    #[error("note folder {} is outside the notes root", .0.display())]
    NoteFolderOutsideRoot(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Why a single media reference could not be embedded.
///
/// None of these carry the rejected filesystem path, so they are safe to
/// surface in output or logs at any level.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("media not found: {0}")]
    NotFound(String),

    #[error("media resolves outside the notes root")]
    OutsideRoot,

    #[error("media could not be read: {0}")]
    Unreadable(String),

    #[error("no mime type for {0}")]
    UnknownMimeType(String),

    #[error("{0} is not an embeddable image")]
    NotEmbeddable(String),
}
