//! Post text formatting
//!
//! Turns an [`EmailRecord`] into the single normalized string that gets
//! split into thread chunks. HTML-derived bodies are full of indentation,
//! zero-width characters and runs of blank lines; all of that is cleaned up
//! here so posts don't waste characters on invisible content.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::EmailRecord;

/// Marker placed before the header block of every post
pub const HEADER_MARKER: &str = "📧";

/// Build the normalized post text for an email
///
/// The result has no line starting with a space or tab, no line made only of
/// whitespace or invisible marks, at most one blank line in a row and no
/// leading or trailing whitespace. Never fails; empty fields just produce the
/// bare header labels.
pub fn format_post(record: &EmailRecord) -> String {
    let text = format!(
        "{HEADER_MARKER} From: {}\nSubject: {}\nSent: {}\n{}",
        record.sender, record.subject, record.sent_date, record.body
    );
    normalize(&text)
}

/// Apply the whitespace normalization steps to arbitrary text
pub fn normalize(text: &str) -> String {
    let text = leading_indent_regex().replace_all(text, "");
    let text = invisible_line_regex().replace_all(&text, "");
    let text = blank_run_regex().replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn leading_indent_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?m)^[ \t]+").expect("valid indent regex"))
}

/// Lines made entirely of whitespace, zero-width space/non-joiner/joiner,
/// BOM, soft hyphen or combining grapheme joiner
fn invisible_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^[\s\x{200B}-\x{200D}\x{FEFF}\x{00AD}\x{034F}]+$")
            .expect("valid invisible line regex")
    })
}

fn blank_run_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank run regex"))
}
