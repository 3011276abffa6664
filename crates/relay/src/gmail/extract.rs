//! Gmail API payload conversion
//!
//! Converts Gmail message JSON into [`MailItem`]s: headers are looked up by
//! name and the MIME part tree is turned into a [`ContentNode`] tree with
//! base64url payloads already decoded.

use anyhow::{Context, Result};
use base64::prelude::*;

use super::api::{GmailMessage, MessagePart};
use crate::models::{ContentNode, MailItem, MessageId};

/// Convert a Gmail API message to a mailbox item
pub fn to_mail_item(gmail_msg: GmailMessage) -> Result<MailItem> {
    let payload = gmail_msg
        .payload
        .as_ref()
        .with_context(|| format!("Message {} has no payload", gmail_msg.id))?;

    Ok(MailItem::builder(MessageId::new(&gmail_msg.id))
        .recipient(extract_header(payload, "To").unwrap_or_default())
        .sender(extract_header(payload, "From").unwrap_or_default())
        .subject(extract_header(payload, "Subject").unwrap_or_default())
        .sent_date(extract_header(payload, "Date").unwrap_or_default())
        .content(to_content_node(payload))
        .build())
}

/// Extract a header value by name (case-insensitive)
fn extract_header(part: &MessagePart, name: &str) -> Option<String> {
    part.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Convert a part and its children into a content tree
///
/// A part with sub-parts becomes a container; anything else is a leaf whose
/// data is the decoded body (empty for attachments stored by reference).
fn to_content_node(part: &MessagePart) -> ContentNode {
    let mime_type = part.mime_type.clone().unwrap_or_default();

    if let Some(children) = &part.parts {
        return ContentNode::container(mime_type, children.iter().map(to_content_node).collect());
    }

    let data = part
        .body
        .as_ref()
        .and_then(|body| body.data.as_deref())
        .and_then(decode_base64_body)
        .unwrap_or_default();

    ContentNode::leaf(mime_type, data)
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_base64_body(data: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}
