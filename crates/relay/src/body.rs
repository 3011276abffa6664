//! Body text extraction from a message content tree
//!
//! Walks every leaf in document order, keeping `text/plain` parts as they are
//! and converting `text/html` parts to plain text. HTML parts first lose any
//! hidden `<div>`/`<span>` blocks (tracking pixels, preheaders) and have the
//! alias address masked so the relay address never ends up in a public post.

use regex::{NoExpand, Regex};
use std::sync::OnceLock;

use html2text::render::text_renderer::TrivialDecorator;

use crate::models::ContentNode;

/// Replacement for the alias address found in HTML bodies
pub const DEFAULT_PLACEHOLDER: &str = "[open mail project]";

/// Line width handed to the HTML renderer; wide enough that nothing wraps
const HTML_RENDER_WIDTH: usize = 10_000;

/// Extract the readable text of a message
///
/// Parts are joined with a newline. Leaves that are neither plain text nor
/// HTML (attachments, images, calendars) are ignored.
pub fn extract_body(content: &ContentNode, alias_address: &str, placeholder: &str) -> String {
    extract_text_parts(content, alias_address, placeholder).join("\n")
}

/// Extract each textual leaf as its own string, in document order
pub fn extract_text_parts(
    content: &ContentNode,
    alias_address: &str,
    placeholder: &str,
) -> Vec<String> {
    let mut parts = Vec::new();

    for leaf in content.leaves() {
        let ContentNode::Leaf { data, .. } = leaf else {
            continue;
        };
        if data.is_empty() {
            continue;
        }

        if leaf.is_type("text/plain") {
            parts.push(String::from_utf8_lossy(data).into_owned());
        } else if leaf.is_type("text/html") {
            let html = String::from_utf8_lossy(data);
            let html = remove_hidden_blocks(&html);
            let html = mask_address(&html, alias_address, placeholder);
            parts.push(html_to_text(&html));
        }
    }

    parts
}

/// Remove `<div>` and `<span>` elements styled `display:none` or `visibility:hidden`
pub fn remove_hidden_blocks(html: &str) -> String {
    let without_divs = hidden_div_regex().replace_all(html, "");
    hidden_span_regex().replace_all(&without_divs, "").into_owned()
}

/// Replace every occurrence of `address` (any letter case) with `placeholder`
pub fn mask_address(text: &str, address: &str, placeholder: &str) -> String {
    if address.is_empty() {
        return text.to_string();
    }
    match Regex::new(&format!("(?i){}", regex::escape(address))) {
        Ok(re) => re.replace_all(text, NoExpand(placeholder)).into_owned(),
        Err(_) => text.replace(address, placeholder),
    }
}

/// Render HTML as undecorated plain text without line wrapping
pub fn html_to_text(html: &str) -> String {
    html2text::from_read_with_decorator(html.as_bytes(), HTML_RENDER_WIDTH, TrivialDecorator::new())
}

fn hidden_div_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| hidden_block_regex("div"))
}

fn hidden_span_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| hidden_block_regex("span"))
}

fn hidden_block_regex(tag: &str) -> Regex {
    let pattern = format!(
        r#"(?is)<{tag}[^>]*style=["'][^"'>]*(?:display\s*:\s*none|visibility\s*:\s*hidden)[^"'>]*["'][^>]*>.*?</{tag}>"#
    );
    Regex::new(&pattern).expect("valid hidden block regex")
}
