//! YAML frontmatter handling for exported notes.
//!
//! Exports never show frontmatter. A block only counts as frontmatter when it
//! is properly closed; an unterminated `---` block is left alone rather than
//! partially stripped.

use serde_yaml::Value;

/// If `text` (ignoring leading whitespace) starts with a `---` line and a later
/// line closes the block, return the YAML between the delimiters and the
/// remainder of the document after the closing line.
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();

    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    // the opening line must be exactly `---` (CRLF and trailing blanks allowed).
    if first.trim() != "---" {
        return None;
    }

    let body_start = first.len();
    let mut pos = body_start;
    for line in lines {
        if line.trim() == "---" {
            return Some((&text[body_start..pos], &text[pos + line.len()..]));
        }
        pos += line.len();
    }
    None
}

/// Remove a leading frontmatter block.
///
/// Returns the document body trimmed when a closed block is found, otherwise
/// the input unchanged.
pub fn strip_frontmatter(content: &str) -> &str {
    match split_frontmatter(content) {
        Some((_, rest)) => rest.trim(),
        None => content,
    }
}

/// The `title` key of the frontmatter, if present and scalar.
pub fn title(content: &str) -> Option<String> {
    let (yaml, _) = split_frontmatter(content)?;

    let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(yaml) else {
        return None;
    };

    let title = match map.get(Value::String("title".to_string()))? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    (!title.is_empty()).then_some(title)
}
