//! Post references returned by the posting service

use serde::{Deserialize, Serialize};

/// Strong reference to a published post (AT URI plus content hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostHandle {
    pub uri: String,
    pub cid: String,
}

impl PostHandle {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
        }
    }
}

/// Reply target for a post within a thread
///
/// `root` is always the first post of the thread; `parent` is the post being
/// replied to directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostHandle,
    pub parent: PostHandle,
}
