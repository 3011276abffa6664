//! Mailbox gateway abstraction
//!
//! The pipeline only needs three things from a mailbox: the ids waiting under
//! a label, the full content of one message, and a way to take a message out
//! of that label once it has been handled.

use anyhow::Result;

use crate::models::{MailItem, MessageId};

pub trait Mailbox {
    /// List message ids carrying `label`, newest first, at most `max_messages`
    fn list_message_ids(&self, label: &str, max_messages: usize) -> Result<Vec<MessageId>>;

    /// Fetch headers and decoded content for one message
    fn fetch_message(&self, id: &MessageId) -> Result<MailItem>;

    /// Remove `label` from the message (archive when the label is the inbox)
    fn archive(&self, id: &MessageId, label: &str) -> Result<()>;
}
