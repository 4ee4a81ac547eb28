pub mod encode;
pub mod error;
pub mod frontmatter;
pub mod media;
pub mod placeholder;
pub mod render;
pub mod resolve;
pub mod rewrite;

use std::path::Path;

use tracing::info;

pub use error::{ExportError, MediaError};
pub use render::RenderOptions;
pub use resolve::{AttachmentResolver, NotesRoot, ResolveOptions, ResolvedMedia};
pub use rewrite::{ExportReport, Rewriter};

/// Options controlling the export pipeline.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Bounds for attachment lookup.
    pub resolve: ResolveOptions,
    /// If true, drop a leading YAML frontmatter block before rewriting.
    pub strip_frontmatter: bool,
    /// If true, leave references inside code blocks and code spans alone.
    pub protect_code: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            resolve: ResolveOptions::default(),
            strip_frontmatter: true,
            protect_code: true,
        }
    }
}

/// Everything the caller supplies for one export.
///
/// `note_folder` is the directory holding the note and must be at or below
/// `notes_root`. `title` and `theme_css` come from the caller; the note body is
/// already loaded.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub title: &'a str,
    pub markdown: &'a str,
    pub note_folder: &'a Path,
    pub notes_root: &'a Path,
    pub theme_css: &'a str,
    pub is_dark: bool,
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct Exported {
    pub html: String,
    pub report: ExportReport,
}

/// Export a note to a standalone HTML document with default options.
pub fn export_note(request: &ExportRequest<'_>) -> Result<String, ExportError> {
    Ok(export_note_with_options(request, &ExportOptions::default())?.html)
}

/// Like [`export_note`], but with explicit options and the rewrite report.
pub fn export_note_with_options(
    request: &ExportRequest<'_>,
    opts: &ExportOptions,
) -> Result<Exported, ExportError> {
    let (markdown, report) =
        rewrite_note(request.markdown, request.note_folder, request.notes_root, opts)?;

    let html = render::assemble(
        request.title,
        &markdown,
        request.theme_css,
        &RenderOptions {
            is_dark: request.is_dark,
        },
    );

    info!(
        embedded = report.embedded,
        placeholders = report.placeholders,
        missing = report.missing,
        untouched = report.untouched,
        external_documents = report.external_documents,
        wikilinks = report.wikilinks,
        bytes = html.len(),
        "exported note"
    );

    Ok(Exported { html, report })
}

/// Strip frontmatter and rewrite media references, without building the
/// HTML shell.
///
/// Fails only when `notes_root` or `note_folder` are invalid; individual
/// references never fail the export.
pub fn rewrite_note(
    markdown: &str,
    note_folder: &Path,
    notes_root: &Path,
    opts: &ExportOptions,
) -> Result<(String, ExportReport), ExportError> {
    let root = NotesRoot::open(notes_root)?;
    let resolver = AttachmentResolver::new(&root, note_folder, &opts.resolve)?;

    let body = if opts.strip_frontmatter {
        frontmatter::strip_frontmatter(markdown)
    } else {
        markdown
    };

    let mut rewriter = Rewriter::new(&resolver).protect_code(opts.protect_code);
    let rewritten = rewriter.rewrite(body);
    Ok((rewritten, rewriter.into_report()))
}
