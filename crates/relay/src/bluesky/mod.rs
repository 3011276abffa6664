//! Bluesky (atproto) posting client
//!
//! This module provides:
//! - Session login with a handle and app password
//! - Post creation, optionally as a reply within a thread
//! - The [`PostingService`] seam the pipeline logs in through

mod client;

pub use client::{BlueskyClient, BlueskySession, DEFAULT_SERVICE};

use crate::alias::Credentials;
use crate::error::AuthError;
use crate::publish::Poster;

/// Something that can open an authenticated posting session
pub trait PostingService {
    fn login(&self, credentials: &Credentials) -> Result<Box<dyn Poster>, AuthError>;
}

/// XRPC request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::{PostHandle, ReplyRef};

    /// Record collection for posts
    pub const POST_COLLECTION: &str = "app.bsky.feed.post";

    /// `com.atproto.server.createSession` input
    #[derive(Debug, Serialize)]
    pub struct CreateSessionRequest<'a> {
        pub identifier: &'a str,
        pub password: &'a str,
    }

    /// `com.atproto.server.createSession` output
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateSessionResponse {
        pub access_jwt: String,
        pub did: String,
        pub handle: String,
    }

    /// `app.bsky.feed.post` record
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PostRecord<'a> {
        #[serde(rename = "$type")]
        pub record_type: &'static str,
        pub text: &'a str,
        pub created_at: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub reply: Option<&'a ReplyRef>,
    }

    /// `com.atproto.repo.createRecord` input
    #[derive(Debug, Serialize)]
    pub struct CreateRecordRequest<'a> {
        pub repo: &'a str,
        pub collection: &'static str,
        pub record: PostRecord<'a>,
    }

    /// `com.atproto.repo.createRecord` output; a strong ref to the new record
    pub type CreateRecordResponse = PostHandle;
}
