//! AFL++ fuzz target for `note2html`.
//!
//! This binary is intentionally stdin-driven, so it can be used with AFL++.
//! Build and run it via `cargo-afl`:
//!
//! ```bash
//! cargo install cargo-afl
//!
//! cargo afl build --release --features afl_fuzz --bin note2html_afl_rewrite
//!
//! mkdir -p fuzz/afl/out
//!
//! cargo afl fuzz \
//!   -i fuzz/afl/in \
//!   -o fuzz/afl/out \
//!   target/release/note2html_afl_rewrite
//! ```
//!
//! Rust panics normally unwind and exit with a non-crashing status code.
//! AFL++ only treats crashes as signals/aborts. We therefore catch any unwind
//! and turn it into `abort()`.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use note2html::render::{self, RenderOptions};
use note2html::{ExportOptions, rewrite_note};

const MAX_INPUT_LEN: usize = 1_000_000; // 1MB guardrail; AFL++ will typically cap this anyway.

fn fuzz_root() -> PathBuf {
    let root = std::env::temp_dir().join("note2html_afl_root");
    let attachments = root.join("_attachments");
    if !attachments.exists() {
        fs::create_dir_all(&attachments).expect("create fuzz root");
        // a real image so the embed paths are exercised too.
        fs::write(attachments.join("a.png"), [0x89, b'P', b'N', b'G']).expect("write fuzz image");
    }
    root
}

fn check_document(markdown: &str) {
    let root = fuzz_root();
    let opts = ExportOptions::default();

    let (rewritten, _report) =
        rewrite_note(markdown, &root, &root, &opts).expect("fuzz root is valid");

    let escaped = render::escape_for_script(&rewritten);
    assert!(!escaped.contains("</"), "escaped content still contains '</'");
    assert!(!escaped.contains("<!--"), "escaped content still opens a comment");

    let html = render::assemble("fuzz", &rewritten, "", &RenderOptions::default());
    let baseline = render::assemble("fuzz", "", "", &RenderOptions::default());
    assert_eq!(
        html.matches("</script>").count(),
        baseline.matches("</script>").count(),
        "content closed a script element"
    );
}

fn main() {
    let mut buf = Vec::new();
    if std::io::stdin().read_to_end(&mut buf).is_err() {
        return;
    }
    buf.truncate(MAX_INPUT_LEN);

    // decode like the CLI does: accept arbitrary bytes.
    let src = String::from_utf8_lossy(&buf).into_owned();

    let result = std::panic::catch_unwind(|| check_document(&src));
    if result.is_err() {
        std::process::abort();
    }
}
