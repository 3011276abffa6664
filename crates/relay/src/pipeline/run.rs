//! Single relay run over a mailbox label

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::alias::AliasTable;
use crate::bluesky::PostingService;
use crate::body::{DEFAULT_PLACEHOLDER, extract_body};
use crate::chunk::Chunker;
use crate::error::MessageError;
use crate::format::format_post;
use crate::mailbox::Mailbox;
use crate::models::{EmailRecord, MailItem, MessageId};
use crate::publish::{ThreadError, ThreadPublisher};
use crate::storage::{LogEntry, Outcome, ProcessedLog};

/// Per-run settings
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Label to scan and remove on archive
    pub label: String,
    pub max_messages: usize,
    /// Format and split only; post, record and archive nothing
    pub dry_run: bool,
    /// Replacement for the alias address in HTML bodies
    pub placeholder: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label: "INBOX".to_string(),
            max_messages: 100,
            dry_run: false,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Statistics from a relay run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Message ids returned by the mailbox
    pub listed: usize,
    /// Skipped because the log already has them
    pub already_processed: usize,
    /// Skipped because no recipient matched a configured alias
    pub no_alias: usize,
    /// Threads published in full
    pub threads_posted: usize,
    /// Individual posts made, including those of partial threads
    pub posts: usize,
    /// Threads that stopped part-way
    pub partial: usize,
    /// Messages that failed (including partial threads)
    pub failed: usize,
    /// Messages removed from the label
    pub archived: usize,
    /// Dry-run messages that were formatted but not posted
    pub dry_run: usize,
    pub duration_ms: u64,
}

/// What happened to one message that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    AlreadyProcessed,
    NoAlias,
    /// Dry run: the chunks that would have been posted
    DryRun { chunks: Vec<String> },
    Posted { posts: usize, archived: bool },
}

/// Relay every unprocessed message under `options.label`
///
/// Only a failure to list the mailbox aborts the run; every per-message
/// failure is logged and counted. Safe to re-run: messages in the log are
/// skipped.
pub fn process_mailbox(
    mailbox: &dyn Mailbox,
    service: &dyn PostingService,
    log: &dyn ProcessedLog,
    aliases: &AliasTable,
    chunker: &Chunker,
    publisher: &ThreadPublisher,
    options: &RunOptions,
) -> Result<RunStats> {
    let start = std::time::Instant::now();
    let mut stats = RunStats::default();

    let ids = mailbox.list_message_ids(&options.label, options.max_messages)?;
    stats.listed = ids.len();
    info!("Found {} message(s) under {}", ids.len(), options.label);

    for id in &ids {
        match process_message(id, mailbox, service, log, aliases, chunker, publisher, options) {
            Ok(Disposition::AlreadyProcessed) => stats.already_processed += 1,
            Ok(Disposition::NoAlias) => stats.no_alias += 1,
            Ok(Disposition::DryRun { .. }) => stats.dry_run += 1,
            Ok(Disposition::Posted { posts, archived }) => {
                stats.threads_posted += 1;
                stats.posts += posts;
                if archived {
                    stats.archived += 1;
                }
            }
            Err(e) => {
                stats.failed += 1;
                stats.posts += e.posted();
                if e.is_partial() {
                    stats.partial += 1;
                }
                if let MessageError::Unrecorded {
                    outcome: Outcome::Posted,
                    ..
                } = &e
                {
                    stats.threads_posted += 1;
                }
                if e.archived() {
                    stats.archived += 1;
                }
                error!("Message {}: {:#}", id, anyhow::Error::new(e));
            }
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Relay one message
///
/// Recording and archiving follow the message's fate:
/// - full thread: recorded as posted, then archived
/// - thread stopped after at least one post: recorded as partial, left in place
/// - nothing posted (login or first post failed): untouched, retried next run
///
/// If the log write fails after anything was posted, the message is archived
/// regardless so a later run cannot post it again.
#[allow(clippy::too_many_arguments)]
pub fn process_message(
    id: &MessageId,
    mailbox: &dyn Mailbox,
    service: &dyn PostingService,
    log: &dyn ProcessedLog,
    aliases: &AliasTable,
    chunker: &Chunker,
    publisher: &ThreadPublisher,
    options: &RunOptions,
) -> std::result::Result<Disposition, MessageError> {
    if log.is_processed(id).map_err(MessageError::Storage)? {
        debug!("Message {} already processed", id);
        return Ok(Disposition::AlreadyProcessed);
    }

    let item = mailbox.fetch_message(id).map_err(MessageError::Mailbox)?;

    let Some(alias) = aliases.resolve(&item.recipient) else {
        warn!("No alias configured for recipient {:?} (message {})", item.recipient, id);
        return Ok(Disposition::NoAlias);
    };

    let record = build_record(&item, alias.address, &options.placeholder);
    let chunks = chunker.split(&format_post(&record));

    if options.dry_run {
        info!(
            "[dry run] Message {} -> {} ({} chunk(s))",
            id,
            alias.credentials.handle,
            chunks.len()
        );
        for (i, chunk) in chunks.iter().enumerate() {
            info!("[dry run] {}/{}:\n{}", i + 1, chunks.len(), chunk);
        }
        return Ok(Disposition::DryRun { chunks });
    }

    let poster = service.login(alias.credentials)?;
    info!("Logged in as {}", alias.credentials.handle);

    let receipt = match publisher.publish(&chunks, poster.as_ref()) {
        Ok(receipt) => receipt,
        Err(e) => {
            if let ThreadError::Post {
                posted,
                total,
                root: Some(root),
                ..
            } = &e
            {
                error!(
                    "Thread for message {} stopped after {} of {} posts; root {} needs manual follow-up",
                    id, posted, total, root.uri
                );
                let entry = LogEntry::new(id.clone(), Outcome::Partial, *posted, Some(root.uri.clone()));
                if let Err(source) = log.record(entry) {
                    return Err(MessageError::Unrecorded {
                        outcome: Outcome::Partial,
                        posted: *posted,
                        archived: archive_unrecorded(mailbox, id, &options.label),
                        source,
                    });
                }
            }
            return Err(e.into());
        }
    };

    let entry = LogEntry::new(id.clone(), Outcome::Posted, receipt.posts, Some(receipt.root.uri));
    if let Err(source) = log.record(entry) {
        return Err(MessageError::Unrecorded {
            outcome: Outcome::Posted,
            posted: receipt.posts,
            archived: archive_unrecorded(mailbox, id, &options.label),
            source,
        });
    }

    let archived = match mailbox.archive(id, &options.label) {
        Ok(()) => {
            debug!("Archived message {}", id);
            true
        }
        Err(e) => {
            warn!("Failed to archive message {}: {:#}", id, e);
            false
        }
    };

    Ok(Disposition::Posted {
        posts: receipt.posts,
        archived,
    })
}

/// Archive a message whose outcome could not be logged
fn archive_unrecorded(mailbox: &dyn Mailbox, id: &MessageId, label: &str) -> bool {
    match mailbox.archive(id, label) {
        Ok(()) => {
            warn!("Message {} archived without a log entry", id);
            true
        }
        Err(e) => {
            error!(
                "Message {} is neither recorded nor archived and will be posted again: {:#}",
                id, e
            );
            false
        }
    }
}

/// Turn a fetched message into the fields the formatter needs
pub fn build_record(item: &MailItem, alias_address: &str, placeholder: &str) -> EmailRecord {
    EmailRecord::new(
        item.sender.clone(),
        item.subject.clone(),
        item.sent_date.clone(),
        extract_body(&item.content, alias_address, placeholder),
    )
}
