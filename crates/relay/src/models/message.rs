//! Message models: mailbox items and the record handed to the formatter

use serde::{Deserialize, Serialize};

use super::ContentNode;

/// Unique identifier for a mailbox message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Parse a comma-separated header value such as a `To` line
    ///
    /// Empty entries are dropped.
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// The bare address, lowercased, for lookups
    pub fn normalized(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}

/// A message as delivered by a mailbox gateway
///
/// Header values are kept as raw strings; a missing header is an empty
/// string. The body is a decoded content tree, independent of the transport
/// encoding the mailbox used.
#[derive(Debug, Clone)]
pub struct MailItem {
    pub id: MessageId,
    /// Raw `To` header
    pub recipient: String,
    /// Raw `From` header
    pub sender: String,
    pub subject: String,
    /// Raw `Date` header
    pub sent_date: String,
    pub content: ContentNode,
}

impl MailItem {
    /// Create a new mail item builder
    pub fn builder(id: MessageId) -> MailItemBuilder {
        MailItemBuilder::new(id)
    }
}

/// Builder for creating MailItem instances
pub struct MailItemBuilder {
    id: MessageId,
    recipient: String,
    sender: String,
    subject: String,
    sent_date: String,
    content: Option<ContentNode>,
}

impl MailItemBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            recipient: String::new(),
            sender: String::new(),
            subject: String::new(),
            sent_date: String::new(),
            content: None,
        }
    }

    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn sent_date(mut self, sent_date: impl Into<String>) -> Self {
        self.sent_date = sent_date.into();
        self
    }

    pub fn content(mut self, content: ContentNode) -> Self {
        self.content = Some(content);
        self
    }

    /// Shorthand for a single `text/plain` body
    pub fn plain_body(self, body: impl Into<String>) -> Self {
        self.content(ContentNode::text("text/plain", body.into()))
    }

    pub fn build(self) -> MailItem {
        MailItem {
            id: self.id,
            recipient: self.recipient,
            sender: self.sender,
            subject: self.subject,
            sent_date: self.sent_date,
            content: self
                .content
                .unwrap_or_else(|| ContentNode::container("multipart/mixed", Vec::new())),
        }
    }
}

/// The fields the formatter turns into post text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmailRecord {
    pub sender: String,
    pub subject: String,
    pub sent_date: String,
    pub body: String,
}

impl EmailRecord {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        sent_date: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            sent_date: sent_date.into(),
            body: body.into(),
        }
    }
}
