//! Data URL encoding for resolved images.

use std::fs;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::warn;

use crate::error::MediaError;
use crate::media::MediaCategory;
use crate::resolve::ResolvedMedia;

/// An image inlined as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMedia {
    pub data_url: String,
    pub category: MediaCategory,
}

/// Read `media` and encode it as `data:<mime>;base64,<payload>`.
///
/// Only images are encoded. Read failures are logged and returned as
/// [`MediaError::Unreadable`]; callers degrade the reference and carry on.
pub fn encode(media: &ResolvedMedia) -> Result<EncodedMedia, MediaError> {
    let name = media.file_name();

    if media.category() != MediaCategory::Image {
        return Err(MediaError::NotEmbeddable(name));
    }
    let mime = media
        .mime_type()
        .ok_or_else(|| MediaError::UnknownMimeType(name.clone()))?;

    let bytes = fs::read(media.path()).map_err(|e| {
        warn!(media = %name, error = %e, "failed to read media file");
        MediaError::Unreadable(name.clone())
    })?;

    Ok(EncodedMedia {
        data_url: format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)),
        category: media.category(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::NotesRoot;
    use std::path::Path;
    use tempfile::tempdir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d];

    fn resolved(root: &Path, name: &str, bytes: &[u8]) -> ResolvedMedia {
        fs::write(root.join(name), bytes).unwrap();
        NotesRoot::open(root)
            .unwrap()
            .contain(&root.join(name))
            .unwrap()
    }

    #[test]
    fn encodes_png_round_trip() {
        let dir = tempdir().unwrap();
        let media = resolved(dir.path(), "tiny.png", PNG_HEADER);

        let encoded = encode(&media).unwrap();
        let payload = encoded
            .data_url
            .strip_prefix("data:image/png;base64,")
            .expect("png data url prefix");
        assert_eq!(STANDARD.decode(payload).unwrap(), PNG_HEADER);
        assert_eq!(encoded.category, MediaCategory::Image);
    }

    #[test]
    fn empty_image_is_still_encoded() {
        let dir = tempdir().unwrap();
        let media = resolved(dir.path(), "empty.gif", b"");
        assert_eq!(encode(&media).unwrap().data_url, "data:image/gif;base64,");
    }

    #[test]
    fn non_images_are_refused() {
        let dir = tempdir().unwrap();
        let media = resolved(dir.path(), "clip.mp4", b"\0\0\0\x18ftypmp42");
        assert_eq!(
            encode(&media),
            Err(MediaError::NotEmbeddable("clip.mp4".to_string()))
        );

        let media = resolved(dir.path(), "notes.txt", b"text");
        assert!(matches!(encode(&media), Err(MediaError::NotEmbeddable(_))));
    }

    #[test]
    fn vanished_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let media = resolved(dir.path(), "gone.png", PNG_HEADER);
        fs::remove_file(media.path()).unwrap();
        assert_eq!(
            encode(&media),
            Err(MediaError::Unreadable("gone.png".to_string()))
        );
    }
}
