//! Gmail API integration
//!
//! This module provides:
//! - Access-token refresh from a stored OAuth refresh token
//! - Gmail API client for listing, fetching and relabelling messages
//! - Conversion of Gmail payloads to mailbox items
//! - The [`Mailbox`](crate::mailbox::Mailbox) implementation used in production

mod auth;
mod client;
mod extract;
mod mailbox;

pub use auth::GmailAuth;
pub use client::GmailClient;
pub use extract::{decode_base64_body, to_mail_item};
pub use mailbox::GmailMailbox;

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: String,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub thread_id: Option<String>,
        pub label_ids: Option<Vec<String>>,
        pub payload: Option<MessagePart>,
    }

    /// A message part; the top-level payload is a part too
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Part body (base64url encoded data, or an attachment reference)
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Request body for `messages.modify`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest<'a> {
        pub add_label_ids: &'a [&'a str],
        pub remove_label_ids: &'a [&'a str],
    }
}
