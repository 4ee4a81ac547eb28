//! Attachment lookup inside a notes root.
//!
//! Every path handed out by this module has been canonicalized and checked to
//! live under the canonical notes root. [`ResolvedMedia`] can only be built
//! through [`NotesRoot::contain`], so holding one is proof of containment.
//!
//! Lookup order for a bare attachment name (first existing file wins):
//! 1. `<note folder>/<name>`
//! 2. `<note folder>/_attachments/<name>`
//! 3. `<root>/_attachments/<name>`
//! 4. `<ancestor>/_attachments/<name>` for each ancestor of the note folder below the root
//! 5. any `_attachments` directory under the root, in sorted walk order

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ExportError, MediaError};
use crate::media::{self, MediaCategory};

/// Conventional name of attachment folders.
pub const ATTACHMENTS_DIR: &str = "_attachments";

/// Bounds for the recursive `_attachments` search.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum directory depth below the root that the fallback search visits.
    pub max_search_depth: usize,
    /// Wall-clock budget for one fallback search.
    pub search_budget: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_search_depth: 16,
            search_budget: Duration::from_secs(2),
        }
    }
}

/// A media file that exists under the notes root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    path: PathBuf,
    mime_type: Option<String>,
    category: MediaCategory,
}

impl ResolvedMedia {
    /// Canonical absolute path, always below the canonical notes root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn category(&self) -> MediaCategory {
        self.category
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The canonicalized notes root; the only security boundary for media.
#[derive(Debug, Clone)]
pub struct NotesRoot {
    path: PathBuf,
}

impl NotesRoot {
    /// Validate and canonicalize the root directory.
    pub fn open(path: &Path) -> Result<Self, ExportError> {
        if !path.exists() {
            return Err(ExportError::NotesRootMissing(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(ExportError::NotesRootNotDirectory(path.to_path_buf()));
        }
        // dunce avoids `\\?\` prefixes on Windows so starts_with comparisons work.
        let path = dunce::canonicalize(path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonicalize a note folder and make sure it sits at or below the root.
    pub fn note_folder(&self, folder: &Path) -> Result<PathBuf, ExportError> {
        let joined = if folder.is_absolute() {
            folder.to_path_buf()
        } else {
            self.path.join(folder)
        };
        if !joined.is_dir() {
            return Err(ExportError::NoteFolderMissing(folder.to_path_buf()));
        }
        let canonical = dunce::canonicalize(&joined)?;
        if !canonical.starts_with(&self.path) {
            return Err(ExportError::NoteFolderOutsideRoot(folder.to_path_buf()));
        }
        Ok(canonical)
    }

    /// Accept `candidate` if it is an existing regular file whose fully
    /// resolved path is inside the root.
    pub fn contain(&self, candidate: &Path) -> Result<ResolvedMedia, MediaError> {
        let display_name = candidate
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let canonical = dunce::canonicalize(candidate)
            .map_err(|_| MediaError::NotFound(display_name.clone()))?;

        if !canonical.starts_with(&self.path) {
            debug!(candidate = %candidate.display(), "rejected media outside notes root");
            return Err(MediaError::OutsideRoot);
        }
        if !canonical.is_file() {
            return Err(MediaError::NotFound(display_name));
        }

        let category = media::classify(&canonical.to_string_lossy());
        let mime_type = media::mime_type(&canonical);
        Ok(ResolvedMedia {
            path: canonical,
            mime_type,
            category,
        })
    }
}

/// Resolves attachment references for one note.
#[derive(Debug)]
pub struct AttachmentResolver<'a> {
    root: &'a NotesRoot,
    note_folder: PathBuf,
    opts: &'a ResolveOptions,
}

impl<'a> AttachmentResolver<'a> {
    pub fn new(
        root: &'a NotesRoot,
        note_folder: &Path,
        opts: &'a ResolveOptions,
    ) -> Result<Self, ExportError> {
        let note_folder = root.note_folder(note_folder)?;
        Ok(Self {
            root,
            note_folder,
            opts,
        })
    }

    pub fn root(&self) -> &NotesRoot {
        self.root
    }

    pub fn note_folder(&self) -> &Path {
        &self.note_folder
    }

    /// Find `media_name` using the fixed candidate list, then the recursive
    /// `_attachments` fallback.
    pub fn resolve(&self, media_name: &str) -> Result<ResolvedMedia, MediaError> {
        let mut outside_root = false;

        for candidate in self.candidates(media_name) {
            match self.root.contain(&candidate) {
                Ok(found) => {
                    debug!(media = media_name, "resolved attachment");
                    return Ok(found);
                }
                Err(MediaError::OutsideRoot) => outside_root = true,
                Err(_) => {}
            }
        }

        match self.search_attachment_dirs(media_name) {
            Ok(found) => return Ok(found),
            Err(MediaError::OutsideRoot) => outside_root = true,
            Err(_) => {}
        }

        if outside_root {
            warn!(media = media_name, "attachment reference escapes the notes root");
            Err(MediaError::OutsideRoot)
        } else {
            Err(MediaError::NotFound(media_name.to_string()))
        }
    }

    /// Resolve a path relative to the note folder, without any search.
    pub fn resolve_relative(&self, relative: &str) -> Result<ResolvedMedia, MediaError> {
        self.root.contain(&self.note_folder.join(relative))
    }

    /// Resolve a path relative to the notes root, without any search.
    pub fn resolve_from_root(&self, relative: &str) -> Result<ResolvedMedia, MediaError> {
        self.root.contain(&self.root.path().join(relative))
    }

    fn candidates(&self, media_name: &str) -> Vec<PathBuf> {
        let root = self.root.path();
        let mut out = vec![
            self.note_folder.join(media_name),
            self.note_folder.join(ATTACHMENTS_DIR).join(media_name),
            root.join(ATTACHMENTS_DIR).join(media_name),
        ];

        // walk up from the note folder, stopping before the root itself.
        let mut current = self.note_folder.as_path();
        while current != root && current.starts_with(root) {
            let candidate = current.join(ATTACHMENTS_DIR).join(media_name);
            if !out.contains(&candidate) {
                out.push(candidate);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        out
    }

    /// Slow path: every `_attachments` directory under the root. Bounded by
    /// depth and time, never follows symlinked directories, stops at the first hit.
    fn search_attachment_dirs(&self, media_name: &str) -> Result<ResolvedMedia, MediaError> {
        let started = Instant::now();
        let mut outside_root = false;

        let walker = WalkDir::new(self.root.path())
            .follow_links(false)
            .max_depth(self.opts.max_search_depth)
            .sort_by_file_name();

        for entry in walker {
            if started.elapsed() >= self.opts.search_budget {
                warn!(
                    media = media_name,
                    budget_ms = self.opts.search_budget.as_millis() as u64,
                    "attachment search budget exhausted"
                );
                break;
            }

            // unreadable directories are skipped, not fatal.
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_dir() || entry.file_name() != ATTACHMENTS_DIR {
                continue;
            }

            match self.root.contain(&entry.path().join(media_name)) {
                Ok(found) => {
                    debug!(media = media_name, "resolved attachment by recursive search");
                    return Ok(found);
                }
                Err(MediaError::OutsideRoot) => outside_root = true,
                Err(_) => {}
            }
        }

        if outside_root {
            Err(MediaError::OutsideRoot)
        } else {
            Err(MediaError::NotFound(media_name.to_string()))
        }
    }
}
