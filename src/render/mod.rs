//! Standalone HTML document assembly.
//!
//! The markdown is not rendered here: it is embedded as a JavaScript template
//! literal and rendered in the browser by the shell's own scripts (marked,
//! highlight.js, MathJax, mermaid).

const TEMPLATE: &str = include_str!("template.html");

/// Options for the document shell.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Use dark highlight.js and mermaid themes.
    pub is_dark: bool,
}

impl RenderOptions {
    fn highlight_theme(&self) -> &'static str {
        if self.is_dark { "github-dark" } else { "github" }
    }

    fn mermaid_theme(&self) -> &'static str {
        if self.is_dark { "dark" } else { "default" }
    }
}

/// Escape markdown for a backtick-delimited JavaScript template literal
/// inside a `<script>` element.
///
/// Order matters: backslashes first, so the escapes added afterwards are not
/// escaped again. `</` and `<!--` are broken up so the HTML tokenizer never
/// leaves plain script data. Carriage returns are written as `\r` because a
/// template literal would otherwise normalize CRLF to LF.
pub fn escape_for_script(markdown: &str) -> String {
    markdown
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace('$', "\\$")
        .replace('\r', "\\r")
        .replace("</", "<\\/")
        .replace("<!--", "<\\!--")
}

/// Render the complete HTML document.
///
/// `theme_css` is inserted verbatim; it comes from the application's own
/// themes, not from note content. The title is HTML-escaped.
pub fn assemble(title: &str, markdown: &str, theme_css: &str, opts: &RenderOptions) -> String {
    let title = html_escape::encode_text(title);
    let content = escape_for_script(markdown);

    fill_template(TEMPLATE, |key| match key {
        "title" => Some(&*title),
        "highlight_theme" => Some(opts.highlight_theme()),
        "mermaid_theme" => Some(opts.mermaid_theme()),
        "theme_css" => Some(theme_css),
        "content" => Some(content.as_str()),
        _ => None,
    })
}

/// Substitute `{{key}}` slots in a single pass over the template. Inserted
/// values are never rescanned, so note content cannot inject slots.
fn fill_template<'v>(template: &str, lookup: impl Fn(&str) -> Option<&'v str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let value = after
            .find("}}")
            .and_then(|end| lookup(&after[..end]).map(|v| (v, end)));

        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_in_order() {
        assert_eq!(escape_for_script(r"a\b"), r"a\\b");
        assert_eq!(escape_for_script("`x`"), r"\`x\`");
        assert_eq!(escape_for_script("${x}"), r"\${x}");
        assert_eq!(escape_for_script("</script>"), r"<\/script>");
        // an existing backslash before a backtick is not collapsed into the escape.
        assert_eq!(escape_for_script(r"\`"), r"\\\`");
        assert_eq!(escape_for_script("<!--<script>"), r"<\!--<script>");
        assert_eq!(escape_for_script("a\r\nb"), "a\\r\nb");
    }

    fn script_texts(html: &str) -> Vec<String> {
        let doc = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("script").unwrap();
        doc.select(&selector)
            .map(|el| el.text().collect::<String>())
            .collect()
    }

    #[test]
    fn comment_openers_cannot_swallow_the_document() {
        let baseline = script_texts(&assemble("T", "plain body", "", &RenderOptions::default()));

        for md in [
            "Example: <!--<script> in html docs",
            "<!-- <script>x</script> -->",
            "<!--<script>\n</script>-->\n<!--",
        ] {
            let html = assemble("T", md, "", &RenderOptions::default());
            let scripts = script_texts(&html);
            assert_eq!(scripts.len(), baseline.len(), "{md}");
            for text in &scripts {
                assert!(!text.contains("</body>"), "script ran past its end for {md:?}");
            }
            let last = scripts.last().unwrap();
            assert!(last.trim_end().ends_with("});"), "{md:?}: {last}");
        }
    }

    #[test]
    fn template_has_every_slot() {
        for slot in ["title", "highlight_theme", "mermaid_theme", "theme_css", "content"] {
            assert!(TEMPLATE.contains(&format!("{{{{{slot}}}}}")), "missing slot {slot}");
        }
    }

    #[test]
    fn fill_leaves_unknown_slots() {
        let out = fill_template("a {{x}} {{y}} {{z", |k| (k == "x").then_some("1"));
        assert_eq!(out, "a 1 {{y}} {{z");
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = fill_template("{{a}}|{{b}}", |k| match k {
            "a" => Some("{{b}}"),
            "b" => Some("B"),
            _ => None,
        });
        assert_eq!(out, "{{b}}|B");
    }

    #[test]
    fn light_and_dark_themes() {
        let light = assemble("T", "body", "", &RenderOptions::default());
        assert!(light.contains("styles/github.min.css"));
        assert!(light.contains("theme: 'default'"));

        let dark = assemble("T", "body", "", &RenderOptions { is_dark: true });
        assert!(dark.contains("styles/github-dark.min.css"));
        assert!(dark.contains("theme: 'dark'"));
    }

    #[test]
    fn title_is_escaped_and_css_is_verbatim() {
        let html = assemble(
            "</title><script>x</script>",
            "",
            ":root { --accent-primary: #ff0000; }",
            &RenderOptions::default(),
        );
        assert!(html.contains("<title>&lt;/title&gt;&lt;script&gt;x&lt;/script&gt;</title>"));
        assert!(html.contains(":root { --accent-primary: #ff0000; }"));
    }

    #[test]
    fn content_cannot_close_script() {
        let html = assemble("T", "</script><script>alert(1)</script>", "", &RenderOptions::default());
        assert_eq!(html.matches("</script>").count(), TEMPLATE.matches("</script>").count());
        assert!(html.ends_with("</html>\n"));
    }
}
