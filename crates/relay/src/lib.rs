//! Relay crate - Mail-to-Bluesky relaying
//!
//! This crate turns messages sent to configured alias addresses into
//! Bluesky threads posted by the alias's account:
//! - Domain models (MailItem, ContentNode, EmailRecord, PostHandle)
//! - Gmail API client and OAuth token refresh
//! - Body extraction with hidden-content removal and address masking
//! - Post formatting and chunking to the Bluesky length limit
//! - Bluesky XRPC client and thread publishing
//! - Processed-message log for idempotent runs
//! - The relay pipeline tying it together
//!
//! Remote services sit behind the [`Mailbox`], [`PostingService`] and
//! [`Poster`] traits so everything above them can be tested offline.

pub mod alias;
pub mod bluesky;
pub mod body;
pub mod chunk;
pub mod config;
pub mod error;
pub mod format;
pub mod gmail;
pub mod mailbox;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod storage;

pub use alias::{AliasEntry, AliasTable, Credentials, ResolvedAlias};
pub use bluesky::{BlueskyClient, BlueskySession, PostingService};
pub use body::{extract_body, extract_text_parts};
pub use chunk::{Chunker, InvalidChunkSize, MAX_POST_CHARS, split_text};
pub use config::{GmailCredentials, HeraldConfig};
pub use error::{AuthError, MessageError};
pub use format::{format_post, normalize};
pub use gmail::{GmailAuth, GmailClient, GmailMailbox};
pub use mailbox::Mailbox;
pub use models::{ContentNode, EmailAddress, EmailRecord, MailItem, MessageId, PostHandle, ReplyRef};
pub use pipeline::{Disposition, RunOptions, RunStats, process_mailbox, process_message};
pub use publish::{Poster, SleepThrottle, ThreadError, ThreadPublisher, ThreadReceipt, Throttle};
pub use storage::{InMemoryProcessedLog, LogEntry, Outcome, ProcessedLog, SqliteProcessedLog};
