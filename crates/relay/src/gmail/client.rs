//! Gmail API HTTP client
//!
//! Provides methods for listing, fetching and relabelling messages.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;

use super::GmailAuth;
use super::api::{GmailMessage, ListMessagesResponse, MessageRef, ModifyMessageRequest};
use crate::models::MessageId;

/// Largest page size the list endpoint accepts
const MAX_PAGE_SIZE: usize = 500;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// List one page of message IDs carrying `label`
    ///
    /// # Arguments
    /// * `label` - Label ID to filter on (e.g. "INBOX")
    /// * `max_results` - Maximum number of messages per page (1-500)
    /// * `page_token` - Optional page token for pagination
    pub fn list_messages(
        &self,
        label: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let mut url = format!(
            "{}/users/me/messages?labelIds={}&maxResults={}",
            Self::BASE_URL,
            urlencoding::encode(label),
            max_results.clamp(1, MAX_PAGE_SIZE)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let access_token = self.auth.get_access_token()?;
        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")
    }

    /// List up to `max_messages` message references carrying `label`
    ///
    /// Follows page tokens until the limit is reached or pages run out.
    pub fn list_messages_all(&self, label: &str, max_messages: usize) -> Result<Vec<MessageRef>> {
        let mut all_messages: Vec<MessageRef> = Vec::new();
        let mut page_token: Option<String> = None;

        while all_messages.len() < max_messages {
            let remaining = max_messages - all_messages.len();
            let response = self.list_messages(label, remaining, page_token.as_deref())?;

            if let Some(messages) = response.messages {
                all_messages.extend(messages);
            }
            debug!(
                "Listed {} messages under {} (estimate {:?})",
                all_messages.len(),
                label,
                response.result_size_estimate
            );

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        all_messages.truncate(max_messages);
        Ok(all_messages)
    }

    /// Get full message details by ID
    pub fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let access_token = self.auth.get_access_token()?;
        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .with_context(|| format!("Failed to fetch message {}", id))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse message {}", id))
    }

    /// Add and remove labels on a single message
    pub fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()> {
        let url = format!(
            "{}/users/me/messages/{}/modify",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );
        let request = ModifyMessageRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };

        let access_token = self.auth.get_access_token()?;
        ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request)
            .with_context(|| format!("Failed to modify labels on message {}", id))?;

        Ok(())
    }

    /// Forget the cached access token, e.g. after an authorization failure
    pub fn reset_auth(&self) {
        self.auth.invalidate();
    }
}
