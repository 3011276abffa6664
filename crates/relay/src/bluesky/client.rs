//! Bluesky XRPC HTTP client
//!
//! Uses synchronous HTTP (ureq), matching the Gmail client.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use url::Url;

use super::PostingService;
use super::api::{
    CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, CreateSessionResponse,
    POST_COLLECTION, PostRecord,
};
use crate::alias::Credentials;
use crate::chunk::MAX_POST_CHARS;
use crate::error::AuthError;
use crate::models::{PostHandle, ReplyRef};
use crate::publish::Poster;

/// Default PDS entryway
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

/// Unauthenticated client bound to one service host
#[derive(Debug, Clone)]
pub struct BlueskyClient {
    service: Url,
}

impl BlueskyClient {
    /// Create a client for `service` (e.g. `https://bsky.social`)
    pub fn new(service: &str) -> Result<Self> {
        let mut service =
            Url::parse(service).with_context(|| format!("Invalid Bluesky service URL: {}", service))?;
        // `Url::join` replaces the last path segment unless the path ends in '/'
        if !service.path().ends_with('/') {
            let path = format!("{}/", service.path());
            service.set_path(&path);
        }
        Ok(Self { service })
    }

    pub fn service(&self) -> &Url {
        &self.service
    }

    /// Open a session with a handle and app password
    pub fn login(&self, credentials: &Credentials) -> Result<BlueskySession, AuthError> {
        let url = xrpc_url(&self.service, "com.atproto.server.createSession").map_err(|e| {
            AuthError::Transport {
                handle: credentials.handle.clone(),
                source: e,
            }
        })?;

        let request = CreateSessionRequest {
            identifier: &credentials.handle,
            password: &credentials.password,
        };

        let response = match ureq::post(url.as_str()).send_json(&request) {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(400 | 401)) => {
                return Err(AuthError::Rejected {
                    handle: credentials.handle.clone(),
                });
            }
            Err(e) => {
                return Err(AuthError::Transport {
                    handle: credentials.handle.clone(),
                    source: anyhow::Error::new(e).context("Failed to send createSession request"),
                });
            }
        };

        let session: CreateSessionResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse createSession response")
            .map_err(|e| AuthError::Transport {
                handle: credentials.handle.clone(),
                source: e,
            })?;

        Ok(BlueskySession {
            service: self.service.clone(),
            did: session.did,
            handle: session.handle,
            access_jwt: session.access_jwt,
        })
    }
}

impl PostingService for BlueskyClient {
    fn login(&self, credentials: &Credentials) -> Result<Box<dyn Poster>, AuthError> {
        BlueskyClient::login(self, credentials).map(|s| Box::new(s) as Box<dyn Poster>)
    }
}

/// An authenticated session for one account
pub struct BlueskySession {
    service: Url,
    did: String,
    handle: String,
    access_jwt: String,
}

impl BlueskySession {
    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl Poster for BlueskySession {
    fn post(&self, text: &str, reply_to: Option<&ReplyRef>) -> Result<PostHandle> {
        let length = text.chars().count();
        if length > MAX_POST_CHARS {
            anyhow::bail!(
                "Post text is {} characters, over the {} character limit",
                length,
                MAX_POST_CHARS
            );
        }

        let url = xrpc_url(&self.service, "com.atproto.repo.createRecord")?;
        let request = CreateRecordRequest {
            repo: &self.did,
            collection: POST_COLLECTION,
            record: PostRecord {
                record_type: POST_COLLECTION,
                text,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                reply: reply_to,
            },
        };

        let response = ureq::post(url.as_str())
            .header("Authorization", &format!("Bearer {}", self.access_jwt))
            .send_json(&request)
            .with_context(|| format!("Failed to create post for {}", self.handle))?;

        let created: CreateRecordResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse createRecord response")?;

        Ok(created)
    }
}

fn xrpc_url(service: &Url, method: &str) -> Result<Url> {
    service
        .join(&format!("xrpc/{}", method))
        .with_context(|| format!("Failed to build XRPC URL for {}", method))
}
