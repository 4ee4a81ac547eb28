//! Extension-based media classification and MIME lookup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::Serialize;

/// Broad kind of an attachment, decided purely from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Audio,
    Video,
    Document,
    Unknown,
}

impl MediaCategory {
    /// Categories that are never inlined as data URLs.
    pub fn is_placeholder_only(self) -> bool {
        matches!(self, Self::Audio | Self::Video | Self::Document)
    }
}

static EXTENSIONS: LazyLock<HashMap<&'static str, MediaCategory>> = LazyLock::new(|| {
    use MediaCategory::*;

    let table: &[(&[&str], MediaCategory)] = &[
        (
            &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "ico", "avif", "apng", "tif", "tiff"],
            Image,
        ),
        (&["mp3", "wav", "ogg", "oga", "m4a", "flac", "aac", "opus"], Audio),
        (&["mp4", "webm", "mov", "mkv", "avi", "m4v", "ogv"], Video),
        (&["pdf"], Document),
    ];

    table
        .iter()
        .flat_map(|(exts, cat)| exts.iter().map(move |e| (*e, *cat)))
        .collect()
});

/// Classify a file name (or path, or URL) by its extension.
///
/// For URLs the query string and fragment are ignored, so
/// `https://host/a.pdf?dl=1` is still a document.
pub fn classify(name: &str) -> MediaCategory {
    let name = if name.contains("://") {
        name.split(['?', '#']).next().unwrap_or(name)
    } else {
        name
    };

    let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
        return MediaCategory::Unknown;
    };

    EXTENSIONS
        .get(ext.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(MediaCategory::Unknown)
}

/// MIME type for a path, if the extension maps to one.
pub fn mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(classify("diagram.png"), MediaCategory::Image);
        assert_eq!(classify("photo.JPEG"), MediaCategory::Image);
        assert_eq!(classify("song.mp3"), MediaCategory::Audio);
        assert_eq!(classify("take.wav"), MediaCategory::Audio);
        assert_eq!(classify("clip.mp4"), MediaCategory::Video);
        assert_eq!(classify("clip.MOV"), MediaCategory::Video);
        assert_eq!(classify("paper.pdf"), MediaCategory::Document);
    }

    #[test]
    fn unmapped_or_missing_extension_is_unknown() {
        assert_eq!(classify("notes.txt"), MediaCategory::Unknown);
        assert_eq!(classify("Makefile"), MediaCategory::Unknown);
        assert_eq!(classify(""), MediaCategory::Unknown);
    }

    #[test]
    fn ignores_query_and_fragment() {
        assert_eq!(
            classify("https://example.com/spec.pdf?download=1"),
            MediaCategory::Document
        );
        assert_eq!(classify("http://host/pic.gif#frame"), MediaCategory::Image);
        // local names keep their '#'
        assert_eq!(classify("C#.png"), MediaCategory::Image);
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_type(Path::new("a.png")).as_deref(), Some("image/png"));
        assert_eq!(mime_type(Path::new("a.svg")).as_deref(), Some("image/svg+xml"));
        assert_eq!(mime_type(Path::new("a.unknownext")), None);
    }
}
