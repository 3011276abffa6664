//! Gmail-backed mailbox gateway

use anyhow::Result;
use log::warn;

use super::{GmailClient, to_mail_item};
use crate::mailbox::Mailbox;
use crate::models::{MailItem, MessageId};

pub struct GmailMailbox {
    client: GmailClient,
}

impl GmailMailbox {
    pub fn new(client: GmailClient) -> Self {
        Self { client }
    }

    /// Run `op`, retrying once with a fresh access token if Gmail answers 401
    fn with_token_retry<T>(&self, op: impl Fn(&GmailClient) -> Result<T>) -> Result<T> {
        match op(&self.client) {
            Err(e) if is_unauthorized(&e) => {
                warn!("Gmail rejected the access token, refreshing and retrying");
                self.client.reset_auth();
                op(&self.client)
            }
            other => other,
        }
    }
}

impl Mailbox for GmailMailbox {
    fn list_message_ids(&self, label: &str, max_messages: usize) -> Result<Vec<MessageId>> {
        let refs = self.with_token_retry(|c| c.list_messages_all(label, max_messages))?;
        Ok(refs.into_iter().map(|r| MessageId::new(r.id)).collect())
    }

    fn fetch_message(&self, id: &MessageId) -> Result<MailItem> {
        let message = self.with_token_retry(|c| c.get_message(id))?;
        to_mail_item(message)
    }

    fn archive(&self, id: &MessageId, label: &str) -> Result<()> {
        self.with_token_retry(|c| c.modify_labels(id, &[], &[label]))
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ureq::Error>(),
            Some(ureq::Error::StatusCode(401))
        )
    })
}
