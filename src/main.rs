use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use note2html::{ExportOptions, ExportRequest, ResolveOptions, export_note_with_options, frontmatter};

/// note2html - export a markdown note and its attachments as one HTML file
///
/// ```bash
/// note2html notes/projects/plan.md --root notes > plan.html
/// note2html notes/plan.md --root notes --theme themes/dark.css --dark -o plan.html
/// ```
///
/// Images referenced with `![[...]]` or `![alt](path)` are inlined as data URLs.
/// Audio, video and PDF attachments become placeholders. Nothing outside
/// `--root` is ever read.
#[derive(Debug, Parser)]
#[command(name = "note2html", version)]
struct Cli {
    /// Markdown note to export.
    note: PathBuf,

    /// Notes root; all attachments must live below it.
    #[arg(short, long)]
    root: PathBuf,

    /// Document title (defaults to the frontmatter `title`, then the file name).
    #[arg(short, long)]
    title: Option<String>,

    /// CSS file inserted into the document as the theme.
    #[arg(long)]
    theme: Option<PathBuf>,

    /// Use dark code-highlighting and diagram themes.
    #[arg(long)]
    dark: bool,

    /// Write the HTML here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a JSON summary of rewritten references to stderr.
    #[arg(long)]
    report: bool,

    /// Keep frontmatter in the exported markdown.
    #[arg(long)]
    keep_frontmatter: bool,

    /// Maximum directory depth for the recursive `_attachments` search.
    #[arg(long, default_value_t = ResolveOptions::default().max_search_depth)]
    max_search_depth: usize,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("note2html={default_level}"))),
        )
        .with_writer(io::stderr)
        .init();

    let markdown = read_note(&cli.note)?;
    let theme_css = match &cli.theme {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("failed to read theme {}: {e}", path.display()))?,
        None => String::new(),
    };

    let title = cli
        .title
        .clone()
        .or_else(|| frontmatter::title(&markdown))
        .unwrap_or_else(|| note_stem(&cli.note));

    // the library reads relative folders against the root; the CLI takes cwd-relative paths.
    let note_folder = match cli.note.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => dunce::canonicalize(parent)?,
        _ => dunce::canonicalize(".")?,
    };

    let opts = ExportOptions {
        resolve: ResolveOptions {
            max_search_depth: cli.max_search_depth,
            ..ResolveOptions::default()
        },
        strip_frontmatter: !cli.keep_frontmatter,
        ..ExportOptions::default()
    };

    let request = ExportRequest {
        title: &title,
        markdown: &markdown,
        note_folder: &note_folder,
        notes_root: &cli.root,
        theme_css: &theme_css,
        is_dark: cli.dark,
    };
    let exported = export_note_with_options(&request, &opts)?;

    match &cli.output {
        Some(path) => fs::write(path, &exported.html)
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?,
        None => io::stdout().write_all(exported.html.as_bytes())?,
    }

    if cli.report {
        eprintln!("{}", serde_json::to_string_pretty(&exported.report)?);
    }

    Ok(())
}

fn read_note(path: &Path) -> Result<String, Box<dyn Error>> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;

    // if we ever encounter invalid UTF-8, fallback to lossy conversion
    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

fn note_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}
