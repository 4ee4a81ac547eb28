//! HTML fragments substituted into the markdown for media that is not inlined.
//!
//! Every user-authored string (alt text, names, link targets) goes through
//! [`escape`] before it is placed in markup. Fragments are kept on a single
//! line so they do not split the surrounding markdown block.

use std::borrow::Cow;

use crate::media::MediaCategory;

const BLOCK_STYLE: &str = "display: flex; align-items: center; gap: 0.75em; padding: 0.75em 1em; margin: 1em 0; border: 1px solid var(--border-primary, #e1e4e8); border-radius: 0.5rem; background-color: var(--bg-secondary, #f6f8fa); color: var(--text-secondary, #586069);";

const MISSING_STYLE: &str = "display: inline-block; padding: 0.1em 0.5em; border: 1px dashed #d73a49; border-radius: 0.25rem; color: #d73a49; font-size: 0.9em;";

const CARD_STYLE: &str = "display: flex; align-items: center; gap: 0.75em; padding: 0.75em 1em; margin: 1em 0; border: 1px solid var(--border-primary, #e1e4e8); border-radius: 0.5rem; background-color: var(--bg-secondary, #f6f8fa); color: var(--accent-primary, #0366d6); text-decoration: none;";

const WIKILINK_STYLE: &str = "color: var(--accent-primary, #0366d6); text-decoration: none; border-bottom: 1px dashed currentColor;";

/// Escape `&`, `<`, `>`, `"` and `'` so the value is safe in text and in
/// quoted attributes.
pub fn escape(s: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(s)
}

/// Icon and label shown for a category.
pub fn icon_and_label(category: MediaCategory) -> (&'static str, &'static str) {
    match category {
        MediaCategory::Audio => ("🎵", "Audio file"),
        MediaCategory::Video => ("🎬", "Video file"),
        MediaCategory::Document => ("📄", "PDF document"),
        MediaCategory::Image | MediaCategory::Unknown => ("📎", "Media file"),
    }
}

fn css_class(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Image => "image",
        MediaCategory::Audio => "audio",
        MediaCategory::Video => "video",
        MediaCategory::Document => "document",
        MediaCategory::Unknown => "unknown",
    }
}

/// Styled block standing in for media that is not embedded.
pub fn placeholder(category: MediaCategory, alt_text: &str) -> String {
    let (icon, label) = icon_and_label(category);
    format!(
        "<div class=\"media-placeholder media-placeholder-{}\" style=\"{}\"><span class=\"media-placeholder-icon\" style=\"font-size: 1.5em;\">{}</span><span class=\"media-placeholder-label\" style=\"font-weight: 600;\">{}</span><span class=\"media-placeholder-name\" style=\"opacity: 0.8;\">{}</span></div>",
        css_class(category),
        BLOCK_STYLE,
        icon,
        label,
        escape(alt_text),
    )
}

/// Inline marker for an embed reference that could not be resolved.
pub fn missing_marker(name: &str) -> String {
    format!(
        "<span class=\"media-missing\" style=\"{}\">⚠️ Missing media: {}</span>",
        MISSING_STYLE,
        escape(name),
    )
}

/// Link card for a remote document that cannot render inside `<img>`.
pub fn external_document_card(url: &str, alt_text: &str) -> String {
    let (icon, label) = icon_and_label(MediaCategory::Document);
    let text = if alt_text.trim().is_empty() {
        url.rsplit('/').next().unwrap_or(url)
    } else {
        alt_text
    };
    format!(
        "<a class=\"external-document\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" style=\"{}\"><span style=\"font-size: 1.5em;\">{}</span><span style=\"font-weight: 600;\">{}</span><span>{}</span></a>",
        escape(url),
        CARD_STYLE,
        icon,
        label,
        escape(text),
    )
}

/// Decorative, non-navigating anchor for a note-to-note wikilink.
pub fn wikilink_anchor(target: &str, display: &str) -> String {
    format!(
        "<a href=\"#\" class=\"wikilink\" title=\"{}\" style=\"{}\">{}</a>",
        escape(target),
        WIKILINK_STYLE,
        escape(display),
    )
}
