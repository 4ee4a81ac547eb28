//! Media-reference rewriting over markdown text.
//!
//! The rewrite is an ordered list of passes ([`REWRITE_PASSES`]). Each pass
//! makes one forward scan over the text produced by the previous pass and
//! replaces non-overlapping matches of a single syntax:
//!
//! 1. `![[name]]` / `![[name|alt]]` embeds are inlined, replaced by a
//!    placeholder, or marked missing.
//! 2. `![alt](target)` images are inlined or replaced by a placeholder; on any
//!    failure the original text is kept.
//! 3. `[[target]]` / `[[target|display]]` links become decorative anchors.
//!
//! Embeds run before plain images so the generic image pattern never sees
//! wikilink brackets, and all image forms run before plain links so an embed
//! is never mistaken for a link.
//!
//! Fenced code blocks and inline code spans are lifted out before the passes
//! and restored afterwards, so reference syntax shown as code is left alone.
//! Every replacement a pass emits is held out the same way, so later passes
//! never see markup generated by earlier ones.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

use crate::encode::encode;
use crate::error::MediaError;
use crate::media::{MediaCategory, classify};
use crate::placeholder;
use crate::resolve::{AttachmentResolver, ResolvedMedia};

/// Current and legacy URL prefixes the web UI uses to serve note media.
pub const API_MEDIA_PREFIXES: &[&str] = &["/api/media/", "/api/images/"];

/// Syntax a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    /// `![[name]]` or `![[name|alt]]`
    WikilinkMedia,
    /// `![alt](target)`
    MarkdownImage,
    /// `[[target]]` or `[[target|display]]`
    WikilinkLink,
}

/// Pass order. Changing it changes which syntax wins on ambiguous input.
pub const REWRITE_PASSES: [SyntaxKind; 3] = [
    SyntaxKind::WikilinkMedia,
    SyntaxKind::MarkdownImage,
    SyntaxKind::WikilinkLink,
];

/// One reference found by [`scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference<'t> {
    pub raw: &'t str,
    pub target: &'t str,
    /// Alt text for images, display text for links; `None` when not written.
    pub alt: Option<&'t str>,
    pub kind: SyntaxKind,
}

/// Counts of what the rewrite did, for logging and `--report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Images inlined as data URLs.
    pub embedded: usize,
    /// Audio/video/document/other media replaced by a placeholder block.
    pub placeholders: usize,
    /// `![[...]]` embeds that could not be resolved or encoded.
    pub missing: usize,
    /// Local `![alt](target)` images that could not be inlined and were left as written.
    pub untouched: usize,
    /// Remote documents rendered as link cards.
    pub external_documents: usize,
    /// Plain wikilinks turned into anchors.
    pub wikilinks: usize,
}

static WIKILINK_MEDIA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("valid wikilink media regex")
});
static MARKDOWN_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").expect("valid markdown image regex")
});
static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").expect("valid wikilink regex")
});

// fences need a matching closer; an unterminated fence is left in the text.
static BACKTICK_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]{0,3}```[^\n]*\n.*?^[ \t]{0,3}```[ \t]*\r?$")
        .expect("valid backtick fence regex")
});
static TILDE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]{0,3}~~~[^\n]*\n.*?^[ \t]{0,3}~~~[ \t]*\r?$")
        .expect("valid tilde fence regex")
});
static LINK_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+)\s+("[^"]*"|'[^']*')$"#).expect("valid link title regex")
});

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``[^`]+?``|`[^`\n]+`").expect("valid inline code regex"));

const HELD_OPEN: char = '\u{E000}';
const HELD_CLOSE: char = '\u{E001}';
static HELD_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}(\\d+)\u{E001}").expect("valid held token regex")
});
static HELD_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}").expect("valid held marker regex"));

/// Find every non-overlapping reference of `kind` in `text`, in order.
pub fn scan(text: &str, kind: SyntaxKind) -> Vec<(Range<usize>, MediaReference<'_>)> {
    let re = match kind {
        SyntaxKind::WikilinkMedia => &*WIKILINK_MEDIA_RE,
        SyntaxKind::MarkdownImage => &*MARKDOWN_IMAGE_RE,
        SyntaxKind::WikilinkLink => &*WIKILINK_RE,
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            // plain links must not be the tail of an embed (`![[...]]`).
            if kind == SyntaxKind::WikilinkLink && text[..whole.start()].ends_with('!') {
                return None;
            }

            let reference = match kind {
                SyntaxKind::MarkdownImage => MediaReference {
                    raw: whole.as_str(),
                    target: caps.get(2).map_or("", |m| m.as_str()),
                    alt: caps.get(1).map(|m| m.as_str()),
                    kind,
                },
                SyntaxKind::WikilinkMedia | SyntaxKind::WikilinkLink => MediaReference {
                    raw: whole.as_str(),
                    target: caps.get(1).map_or("", |m| m.as_str()),
                    alt: caps.get(2).map(|m| m.as_str()),
                    kind,
                },
            };
            Some((whole.range(), reference))
        })
        .collect()
}

/// Text held out of the passes: code, and the output of earlier passes.
///
/// Entry `i` may itself contain tokens, but only for entries below `i`.
#[derive(Debug, Default)]
struct HeldText {
    blocks: Vec<String>,
}

impl HeldText {
    fn hold(&mut self, text: String) -> String {
        let idx = self.blocks.len();
        self.blocks.push(text);
        format!("{HELD_OPEN}{idx}{HELD_CLOSE}")
    }

    fn lift(&mut self, text: &str, re: &Regex) -> String {
        re.replace_all(text, |caps: &Captures| self.hold(caps[0].to_string()))
            .into_owned()
    }

    fn restore(&self, text: &str) -> String {
        self.restore_below(text, self.blocks.len())
    }

    fn restore_below(&self, text: &str, limit: usize) -> String {
        if !text.contains(HELD_OPEN) {
            return text.to_string();
        }
        HELD_TOKEN_RE
            .replace_all(text, |caps: &Captures| {
                match caps[1].parse::<usize>().ok().filter(|i| *i < limit) {
                    Some(i) => self.restore_below(&self.blocks[i], i),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Rewrites the media references of one note.
#[derive(Debug)]
pub struct Rewriter<'a> {
    resolver: &'a AttachmentResolver<'a>,
    protect_code: bool,
    held: HeldText,
    report: ExportReport,
}

impl<'a> Rewriter<'a> {
    pub fn new(resolver: &'a AttachmentResolver<'a>) -> Self {
        Self {
            resolver,
            protect_code: true,
            held: HeldText::default(),
            report: ExportReport::default(),
        }
    }

    /// Whether code blocks and spans are shielded from the passes (default on).
    pub fn protect_code(mut self, protect: bool) -> Self {
        self.protect_code = protect;
        self
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    pub fn into_report(self) -> ExportReport {
        self.report
    }

    /// Run all passes over `markdown`.
    pub fn rewrite(&mut self, markdown: &str) -> String {
        self.held = HeldText::default();

        // markers already in the note are held first so they restore as written.
        let mut text = self.held.lift(markdown, &HELD_OPEN_RE);
        if self.protect_code {
            text = self.held.lift(&text, &BACKTICK_FENCE_RE);
            text = self.held.lift(&text, &TILDE_FENCE_RE);
            text = self.held.lift(&text, &INLINE_CODE_RE);
        }

        for kind in REWRITE_PASSES {
            text = self.apply_pass(&text, kind);
        }

        self.held.restore(&text)
    }

    fn apply_pass(&mut self, text: &str, kind: SyntaxKind) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (range, reference) in scan(text, kind) {
            out.push_str(&text[last..range.start]);
            let replacement = match kind {
                SyntaxKind::WikilinkMedia => self.rewrite_wikilink_media(&reference),
                SyntaxKind::MarkdownImage => self.rewrite_markdown_image(&reference),
                SyntaxKind::WikilinkLink => self.rewrite_wikilink(&reference),
            };
            out.push_str(&self.held.hold(replacement));
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }

    fn rewrite_wikilink_media(&mut self, reference: &MediaReference<'_>) -> String {
        let name = self.held.restore(reference.target.trim());
        let alt = match reference.alt {
            Some(alt) => self.held.restore(alt.trim()),
            None => file_stem(&name),
        };

        let category = classify(&name);
        if category.is_placeholder_only() {
            self.report.placeholders += 1;
            return placeholder::placeholder(category, &alt);
        }

        match self.resolver.resolve(&name).and_then(|media| encode(&media)) {
            Ok(encoded) => {
                self.report.embedded += 1;
                format!("![{}]({})", alt, encoded.data_url)
            }
            Err(e) => {
                debug!(media = %name, reason = %e, "embed left unresolved");
                self.report.missing += 1;
                placeholder::missing_marker(&name)
            }
        }
    }

    fn rewrite_markdown_image(&mut self, reference: &MediaReference<'_>) -> String {
        let (target, title) = split_link_title(reference.target.trim());
        let alt = self.held.restore(reference.alt.unwrap_or_default());

        if target.is_empty() || target.starts_with("data:") {
            return reference.raw.to_string();
        }

        if target.starts_with("http://") || target.starts_with("https://") {
            if classify(target) == MediaCategory::Document {
                self.report.external_documents += 1;
                return placeholder::external_document_card(target, &alt);
            }
            return reference.raw.to_string();
        }

        let media = match self.resolve_local_target(target) {
            Ok(media) => media,
            Err(e) => {
                debug!(reason = %e, "image reference left as written");
                self.report.untouched += 1;
                return reference.raw.to_string();
            }
        };

        if media.category() != MediaCategory::Image {
            self.report.placeholders += 1;
            let label = if alt.trim().is_empty() {
                media.file_name()
            } else {
                alt
            };
            return placeholder::placeholder(media.category(), &label);
        }

        match encode(&media) {
            Ok(encoded) => {
                self.report.embedded += 1;
                match title {
                    Some(title) => format!("![{}]({} {})", alt, encoded.data_url, title),
                    None => format!("![{}]({})", alt, encoded.data_url),
                }
            }
            Err(e) => {
                debug!(reason = %e, "image reference left as written");
                self.report.untouched += 1;
                reference.raw.to_string()
            }
        }
    }

    /// Resolve a local image target: API paths against the root, anything
    /// else against the note folder, then by file name alone.
    fn resolve_local_target(&self, target: &str) -> Result<ResolvedMedia, MediaError> {
        let direct = |t: &str| match strip_api_prefix(t) {
            Some(relative) => self.resolver.resolve_from_root(relative),
            None => self.resolver.resolve_relative(t),
        };

        let decoded = percent_decode_str(target)
            .decode_utf8()
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| target.to_string());

        let mut result = direct(target);
        if matches!(result, Err(MediaError::NotFound(_))) && decoded != target {
            result = direct(&decoded);
        }

        match result {
            Err(MediaError::NotFound(_)) => {
                let Some(name) = Path::new(&decoded).file_name().and_then(|n| n.to_str()) else {
                    return Err(MediaError::NotFound(decoded.clone()));
                };
                self.resolver.resolve(name)
            }
            other => other,
        }
    }

    fn rewrite_wikilink(&mut self, reference: &MediaReference<'_>) -> String {
        let target = self.held.restore(reference.target.trim());
        let display = match reference.alt {
            Some(display) => self.held.restore(display.trim()),
            None => target.clone(),
        };
        self.report.wikilinks += 1;
        placeholder::wikilink_anchor(&target, &display)
    }
}

/// `pic.png "Caption"` -> (`pic.png`, `Some("\"Caption\"")`)
fn split_link_title(target: &str) -> (&str, Option<&str>) {
    match LINK_TITLE_RE.captures(target) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(path), Some(title)) => (path.as_str(), Some(title.as_str())),
            _ => (target, None),
        },
        None => (target, None),
    }
}

fn strip_api_prefix(target: &str) -> Option<&str> {
    API_MEDIA_PREFIXES
        .iter()
        .find_map(|prefix| target.strip_prefix(prefix))
}

/// `folder/diagram.png` -> `diagram`
fn file_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_wikilink_media_with_and_without_alt() {
        let refs = scan("a ![[diagram.png]] b ![[x/y.jpg|Figure 1]]", SyntaxKind::WikilinkMedia);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].1.target, "diagram.png");
        assert_eq!(refs[0].1.alt, None);
        assert_eq!(refs[0].1.raw, "![[diagram.png]]");
        assert_eq!(refs[1].1.target, "x/y.jpg");
        assert_eq!(refs[1].1.alt, Some("Figure 1"));
    }

    #[test]
    fn scans_markdown_images_including_empty_targets() {
        let refs = scan("![a](b.png) ![](c.png) ![d]()", SyntaxKind::MarkdownImage);
        let targets: Vec<_> = refs.iter().map(|(_, r)| r.target).collect();
        assert_eq!(targets, ["b.png", "c.png", ""]);
        assert_eq!(refs[1].1.alt, Some(""));
    }

    #[test]
    fn plain_wikilink_scan_skips_embeds() {
        let refs = scan("![[a.png]] [[Note]] [[Other|shown]]", SyntaxKind::WikilinkLink);
        let targets: Vec<_> = refs.iter().map(|(_, r)| r.target).collect();
        assert_eq!(targets, ["Note", "Other"]);
        assert_eq!(refs[1].1.alt, Some("shown"));
    }

    #[test]
    fn adjacent_wikilinks_are_both_found() {
        let refs = scan("[[a]][[b]]", SyntaxKind::WikilinkLink);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn pass_order_is_fixed() {
        assert_eq!(
            REWRITE_PASSES,
            [
                SyntaxKind::WikilinkMedia,
                SyntaxKind::MarkdownImage,
                SyntaxKind::WikilinkLink
            ]
        );
    }

    #[test]
    fn file_stem_defaults() {
        assert_eq!(file_stem("diagram.png"), "diagram");
        assert_eq!(file_stem("folder/sub/diagram.v2.png"), "diagram.v2");
        assert_eq!(file_stem("README"), "README");
    }

    #[test]
    fn link_titles_are_split_off() {
        assert_eq!(
            split_link_title(r#"pic.png "A caption""#),
            ("pic.png", Some(r#""A caption""#))
        );
        assert_eq!(split_link_title("pic.png 'x'"), ("pic.png", Some("'x'")));
        assert_eq!(split_link_title("my pic.png"), ("my pic.png", None));
        assert_eq!(split_link_title("pic.png"), ("pic.png", None));
    }

    #[test]
    fn api_prefixes() {
        assert_eq!(strip_api_prefix("/api/media/a/b.png"), Some("a/b.png"));
        assert_eq!(strip_api_prefix("/api/images/b.png"), Some("b.png"));
        assert_eq!(strip_api_prefix("api/media/b.png"), None);
    }

    #[test]
    fn lifted_code_round_trips() {
        let mut held = HeldText::default();
        let src = "before\n```md\n![[x.png]]\n```\nafter `[[y]]` end";
        let mut text = held.lift(src, &BACKTICK_FENCE_RE);
        text = held.lift(&text, &INLINE_CODE_RE);
        assert!(!text.contains("[["));
        assert_eq!(held.restore(&text), src);
    }

    #[test]
    fn nested_held_text_restores_fully() {
        let mut held = HeldText::default();
        let code = held.hold("`[[x]]`".to_string());
        let outer = held.hold(format!("![{code}](missing.png)"));
        assert_eq!(held.restore(&format!("a {outer} b")), "a ![`[[x]]`](missing.png) b");
    }

    #[test]
    fn tokens_only_expand_earlier_entries() {
        let held = HeldText {
            blocks: vec!["`x`".to_string(), format!("{HELD_OPEN}1{HELD_CLOSE}")],
        };
        // entry 1 refers to itself; it is left as written instead of looping.
        let looping = format!("{HELD_OPEN}1{HELD_CLOSE}");
        assert_eq!(held.restore(&looping), looping);
        let unknown = format!("{HELD_OPEN}7{HELD_CLOSE}");
        assert_eq!(held.restore(&unknown), unknown);
    }

    #[test]
    fn marker_characters_in_the_note_survive() {
        let mut held = HeldText::default();
        let src = format!("{HELD_OPEN}0{HELD_CLOSE} and `code`");
        let mut text = held.lift(&src, &HELD_OPEN_RE);
        text = held.lift(&text, &INLINE_CODE_RE);
        assert_eq!(held.restore(&text), src);
    }
}
