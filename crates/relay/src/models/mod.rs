//! Domain models for relayed mail and published posts

mod content;
mod message;
mod post;

pub use content::ContentNode;
pub use message::{EmailAddress, EmailRecord, MailItem, MessageId};
pub use post::{PostHandle, ReplyRef};
