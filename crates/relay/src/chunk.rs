//! Splitting post text into thread-sized chunks
//!
//! Lengths are measured in characters (Unicode scalar values), which never
//! undercounts against Bluesky's grapheme-based limit.

use thiserror::Error;

/// Bluesky's hard limit on post length
pub const MAX_POST_CHARS: usize = 300;

/// Default chunk size
pub const DEFAULT_MAX_CHUNK: usize = MAX_POST_CHARS;

/// How many characters a word-boundary break may give up at the end of a window
pub const BREAK_SLACK: usize = 50;

/// Rejected chunk size
#[derive(Debug, Error, PartialEq, Eq)]
#[error("chunk size must be between 1 and {MAX_POST_CHARS}, got {0}")]
pub struct InvalidChunkSize(pub usize);

/// Splitter with a validated maximum chunk size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chunk: usize,
}

impl Chunker {
    pub fn new(max_chunk: usize) -> Result<Self, InvalidChunkSize> {
        if max_chunk == 0 || max_chunk > MAX_POST_CHARS {
            return Err(InvalidChunkSize(max_chunk));
        }
        Ok(Self { max_chunk })
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        split_text(text, self.max_chunk)
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            max_chunk: DEFAULT_MAX_CHUNK,
        }
    }
}

/// Split `text` into trimmed chunks of at most `max_chunk` characters
///
/// Each window of `max_chunk` characters that doesn't reach the end of the
/// text is cut just after its last space, as long as that loses no more than
/// [`BREAK_SLACK`] characters; otherwise it is cut hard at `max_chunk`. The
/// cursor advances to the cut, not past the trimmed whitespace. Chunks that
/// trim down to nothing are dropped. A `max_chunk` of zero is treated as one.
pub fn split_text(text: &str, max_chunk: usize) -> Vec<String> {
    let max_chunk = max_chunk.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + max_chunk).min(chars.len());

        if end < chars.len() {
            let window = &chars[start..end];
            let cut = window.iter().rposition(|&c| c == ' ').map_or(0, |i| i + 1);
            if cut > max_chunk.saturating_sub(BREAK_SLACK) {
                end = start + cut;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = end;
    }

    chunks
}
