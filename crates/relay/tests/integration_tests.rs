//! Integration tests for the relay crate
//!
//! These tests drive full relay runs against in-process fakes of the mailbox
//! and the posting service.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use relay::alias::Credentials;
use relay::models::{ContentNode, MailItem, MessageId, PostHandle, ReplyRef};
use relay::pipeline::build_record;
use relay::{
    AliasTable, AuthError, Chunker, InMemoryProcessedLog, LogEntry, Mailbox, Outcome, Poster,
    PostingService, ProcessedLog, RunOptions, SqliteProcessedLog, ThreadPublisher, Throttle,
    format_post, process_mailbox,
};

const ALIAS: &str = "tips@example.org";
const HANDLE: &str = "tips.bsky.social";

/// Mailbox backed by a fixed list of messages; archived ones stop being listed
#[derive(Default)]
struct FakeMailbox {
    messages: Vec<MailItem>,
    broken: HashSet<String>,
    archive_fails: bool,
    archived: RefCell<Vec<String>>,
}

impl FakeMailbox {
    fn with(messages: Vec<MailItem>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    fn archived(&self) -> Vec<String> {
        self.archived.borrow().clone()
    }
}

impl Mailbox for FakeMailbox {
    fn list_message_ids(&self, _label: &str, max_messages: usize) -> Result<Vec<MessageId>> {
        let archived = self.archived.borrow();
        Ok(self
            .messages
            .iter()
            .filter(|m| !archived.iter().any(|a| a == m.id.as_str()))
            .take(max_messages)
            .map(|m| m.id.clone())
            .collect())
    }

    fn fetch_message(&self, id: &MessageId) -> Result<MailItem> {
        if self.broken.contains(id.as_str()) {
            anyhow::bail!("fetch failed for {}", id);
        }
        self.messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such message {}", id))
    }

    fn archive(&self, id: &MessageId, _label: &str) -> Result<()> {
        if self.archive_fails {
            anyhow::bail!("modify request failed");
        }
        self.archived.borrow_mut().push(id.as_str().to_string());
        Ok(())
    }
}

/// State shared between the fake service and the sessions it hands out
#[derive(Default)]
struct Network {
    logins: RefCell<Vec<String>>,
    posts: RefCell<Vec<(String, Option<ReplyRef>)>>,
    /// Fail the post with this 1-based index (counted across the run)
    fail_at: RefCell<Option<usize>>,
    calls: RefCell<usize>,
}

struct FakeService {
    network: Rc<Network>,
    rejected: HashSet<String>,
}

impl FakeService {
    fn new() -> Self {
        Self {
            network: Rc::new(Network::default()),
            rejected: HashSet::new(),
        }
    }
}

impl PostingService for FakeService {
    fn login(&self, credentials: &Credentials) -> Result<Box<dyn Poster>, AuthError> {
        if self.rejected.contains(&credentials.handle) {
            return Err(AuthError::Rejected {
                handle: credentials.handle.clone(),
            });
        }
        self.network.logins.borrow_mut().push(credentials.handle.clone());
        Ok(Box::new(FakeSession {
            network: Rc::clone(&self.network),
        }))
    }
}

struct FakeSession {
    network: Rc<Network>,
}

impl Poster for FakeSession {
    fn post(&self, text: &str, reply_to: Option<&ReplyRef>) -> Result<PostHandle> {
        let call = {
            let mut calls = self.network.calls.borrow_mut();
            *calls += 1;
            *calls
        };
        if *self.network.fail_at.borrow() == Some(call) {
            anyhow::bail!("service unavailable");
        }

        let mut posts = self.network.posts.borrow_mut();
        posts.push((text.to_string(), reply_to.cloned()));
        let n = posts.len();
        Ok(PostHandle::new(
            format!("at://did:plc:tips/app.bsky.feed.post/{}", n),
            format!("cid{}", n),
        ))
    }
}

/// Log whose writes always fail, e.g. a full disk
struct UnwritableLog;

impl ProcessedLog for UnwritableLog {
    fn is_processed(&self, _id: &MessageId) -> Result<bool> {
        Ok(false)
    }

    fn record(&self, entry: LogEntry) -> Result<bool> {
        anyhow::bail!("database or disk is full (recording {})", entry.message_id)
    }

    fn get(&self, _id: &MessageId) -> Result<Option<LogEntry>> {
        Ok(None)
    }

    fn list_by_outcome(&self, _outcome: Outcome) -> Result<Vec<LogEntry>> {
        Ok(Vec::new())
    }

    fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

struct NoDelay;

impl Throttle for NoDelay {
    fn pause(&self, _delay: Duration) {}
}

fn make_message(id: &str, recipient: &str, body: &str) -> MailItem {
    MailItem::builder(MessageId::new(id))
        .recipient(recipient)
        .sender("Ann Example <ann@example.com>")
        .subject(format!("Tip {}", id))
        .sent_date("Mon, 1 Jan 2024 10:00:00 +0000")
        .plain_body(body)
        .build()
}

fn long_body() -> String {
    "the committee met again today and nobody wrote anything down ".repeat(4)
}

fn aliases() -> AliasTable {
    let mut table = AliasTable::new();
    table.insert(
        ALIAS,
        Credentials {
            handle: HANDLE.to_string(),
            password: "app-password".to_string(),
        },
    );
    table
}

fn publisher() -> ThreadPublisher {
    ThreadPublisher::with_throttle(Duration::from_secs(5), NoDelay)
}

fn run(
    mailbox: &FakeMailbox,
    service: &FakeService,
    log: &dyn ProcessedLog,
    chunker: &Chunker,
    options: &RunOptions,
) -> relay::RunStats {
    process_mailbox(mailbox, service, log, &aliases(), chunker, &publisher(), options).unwrap()
}

#[test]
fn test_relay_posts_thread_and_archives() {
    let item = make_message("m1", ALIAS, &long_body());
    let chunker = Chunker::new(80).unwrap();
    let expected = chunker.split(&format_post(&build_record(&item, ALIAS, "[x]")));
    assert!(expected.len() > 2);

    let mailbox = FakeMailbox::with(vec![item]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();

    let stats = run(&mailbox, &service, &log, &chunker, &RunOptions::default());

    assert_eq!(stats.listed, 1);
    assert_eq!(stats.threads_posted, 1);
    assert_eq!(stats.posts, expected.len());
    assert_eq!(stats.archived, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(mailbox.archived(), vec!["m1"]);
    assert_eq!(*service.network.logins.borrow(), vec![HANDLE]);

    let posts = service.network.posts.borrow();
    let texts: Vec<&str> = posts.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(texts[0].starts_with("📧 From: Ann Example <ann@example.com>"));

    // Root has no reply; every reply points at post 1 as root and its predecessor as parent
    assert!(posts[0].1.is_none());
    for (i, (_, reply)) in posts.iter().enumerate().skip(1) {
        let reply = reply.as_ref().unwrap();
        assert_eq!(reply.root.uri, "at://did:plc:tips/app.bsky.feed.post/1");
        assert_eq!(reply.parent.uri, format!("at://did:plc:tips/app.bsky.feed.post/{}", i));
    }

    let entry = log.get(&MessageId::new("m1")).unwrap().unwrap();
    assert_eq!(entry.outcome, Outcome::Posted);
    assert_eq!(entry.posts, expected.len());
    assert_eq!(entry.root_uri.as_deref(), Some("at://did:plc:tips/app.bsky.feed.post/1"));
}

#[test]
fn test_second_run_skips_processed_messages() {
    let mailbox = FakeMailbox {
        archive_fails: true,
        ..FakeMailbox::with(vec![make_message("m1", ALIAS, "short tip")])
    };
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();
    let chunker = Chunker::default();

    let first = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(first.threads_posted, 1);
    assert_eq!(first.archived, 0);

    let second = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(second.already_processed, 1);
    assert_eq!(second.threads_posted, 0);
    assert_eq!(service.network.posts.borrow().len(), 1);
}

#[test]
fn test_fetch_failure_does_not_stop_run() {
    let mut mailbox = FakeMailbox::with(vec![
        make_message("m1", ALIAS, "first"),
        make_message("m2", ALIAS, "second"),
    ]);
    mailbox.broken.insert("m1".to_string());
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();

    let stats = run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.threads_posted, 1);
    assert_eq!(mailbox.archived(), vec!["m2"]);
    assert!(!log.is_processed(&MessageId::new("m1")).unwrap());
}

#[test]
fn test_unknown_recipient_is_skipped() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", "someone@example.org", "hello")]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();

    let stats = run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());

    assert_eq!(stats.no_alias, 1);
    assert_eq!(stats.failed, 0);
    assert!(service.network.logins.borrow().is_empty());
    assert!(mailbox.archived().is_empty());
    assert_eq!(log.count().unwrap(), 0);
}

#[test]
fn test_alias_matches_any_listed_recipient() {
    let recipients = format!("Other <other@example.org>, \"Tips\" <{}>", ALIAS.to_uppercase());
    let mailbox = FakeMailbox::with(vec![make_message("m1", &recipients, "hello")]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();

    let stats = run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());
    assert_eq!(stats.threads_posted, 1);
}

#[test]
fn test_rejected_login_leaves_message_for_retry() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, "hello")]);
    let mut service = FakeService::new();
    service.rejected.insert(HANDLE.to_string());
    let log = InMemoryProcessedLog::new();

    let stats = run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.posts, 0);
    assert!(service.network.posts.borrow().is_empty());
    assert!(mailbox.archived().is_empty());
    assert_eq!(log.count().unwrap(), 0);
}

#[test]
fn test_partial_thread_recorded_not_archived() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, &long_body())]);
    let service = FakeService::new();
    *service.network.fail_at.borrow_mut() = Some(2);
    let log = InMemoryProcessedLog::new();
    let chunker = Chunker::new(80).unwrap();

    let stats = run(&mailbox, &service, &log, &chunker, &RunOptions::default());

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.partial, 1);
    assert_eq!(stats.posts, 1);
    assert_eq!(stats.threads_posted, 0);
    assert!(mailbox.archived().is_empty());
    // Nothing after the failing chunk is attempted
    assert_eq!(*service.network.calls.borrow(), 2);

    let entry = log.get(&MessageId::new("m1")).unwrap().unwrap();
    assert_eq!(entry.outcome, Outcome::Partial);
    assert_eq!(entry.posts, 1);
    assert_eq!(entry.root_uri.as_deref(), Some("at://did:plc:tips/app.bsky.feed.post/1"));

    // Never reposted automatically
    *service.network.fail_at.borrow_mut() = None;
    let again = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(again.already_processed, 1);
    assert_eq!(service.network.posts.borrow().len(), 1);
}

#[test]
fn test_failed_root_post_retried_next_run() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, "hello")]);
    let service = FakeService::new();
    *service.network.fail_at.borrow_mut() = Some(1);
    let log = InMemoryProcessedLog::new();
    let chunker = Chunker::default();

    let stats = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.partial, 0);
    assert_eq!(log.count().unwrap(), 0);
    assert!(mailbox.archived().is_empty());

    let retry = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(retry.threads_posted, 1);
    assert_eq!(mailbox.archived(), vec!["m1"]);
}

#[test]
fn test_dry_run_posts_nothing() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, &long_body())]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let stats = run(&mailbox, &service, &log, &Chunker::new(80).unwrap(), &options);

    assert_eq!(stats.dry_run, 1);
    assert_eq!(stats.threads_posted, 0);
    assert!(service.network.logins.borrow().is_empty());
    assert!(service.network.posts.borrow().is_empty());
    assert!(mailbox.archived().is_empty());
    assert_eq!(log.count().unwrap(), 0);
}

#[test]
fn test_html_body_masks_alias_and_drops_hidden_text() {
    let html = format!(
        "<html><body><p>Forwarded to {}</p><div style=\"display:none\">tracking pixel text</div></body></html>",
        ALIAS
    );
    let item = MailItem::builder(MessageId::new("m1"))
        .recipient(ALIAS)
        .sender("ann@example.com")
        .subject("Hidden")
        .sent_date("Mon, 1 Jan 2024 10:00:00 +0000")
        .content(ContentNode::container(
            "multipart/alternative",
            vec![ContentNode::text("text/html", html)],
        ))
        .build();
    let mailbox = FakeMailbox::with(vec![item]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();
    let options = RunOptions {
        placeholder: "[redacted]".to_string(),
        ..RunOptions::default()
    };

    run(&mailbox, &service, &log, &Chunker::default(), &options);

    let posts = service.network.posts.borrow();
    let text: String = posts.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>().join(" ");
    assert!(text.contains("[redacted]"));
    assert!(!text.contains(ALIAS));
    assert!(!text.contains("tracking pixel"));
}

#[test]
fn test_sqlite_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.db");
    let mailbox = FakeMailbox {
        archive_fails: true,
        ..FakeMailbox::with(vec![make_message("m1", ALIAS, "hello")])
    };
    let service = FakeService::new();
    let chunker = Chunker::default();

    {
        let log = SqliteProcessedLog::open(&path).unwrap();
        let stats = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
        assert_eq!(stats.threads_posted, 1);
    }

    let log = SqliteProcessedLog::open(&path).unwrap();
    let stats = run(&mailbox, &service, &log, &chunker, &RunOptions::default());
    assert_eq!(stats.already_processed, 1);
    assert_eq!(service.network.posts.borrow().len(), 1);
}

#[test]
fn test_max_messages_limits_run() {
    let mailbox = FakeMailbox::with(vec![
        make_message("m1", ALIAS, "one"),
        make_message("m2", ALIAS, "two"),
        make_message("m3", ALIAS, "three"),
    ]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();
    let options = RunOptions {
        max_messages: 2,
        ..RunOptions::default()
    };

    let stats = run(&mailbox, &service, &log, &Chunker::default(), &options);
    assert_eq!(stats.listed, 2);
    assert_eq!(stats.threads_posted, 2);
}

#[test]
fn test_archived_messages_are_not_listed_again() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, "short tip")]);
    let service = FakeService::new();
    let log = InMemoryProcessedLog::new();

    run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());
    let second = run(&mailbox, &service, &log, &Chunker::default(), &RunOptions::default());

    assert_eq!(second.listed, 0);
    assert_eq!(service.network.posts.borrow().len(), 1);
}

#[test]
fn test_unrecorded_thread_is_archived_and_not_reposted() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, &long_body())]);
    let service = FakeService::new();
    let chunker = Chunker::new(80).unwrap();

    let first = run(&mailbox, &service, &UnwritableLog, &chunker, &RunOptions::default());
    let posted = service.network.posts.borrow().len();
    assert!(posted > 2);
    assert_eq!(first.failed, 1);
    assert_eq!(first.threads_posted, 1);
    assert_eq!(first.posts, posted);
    assert_eq!(first.partial, 0);
    assert_eq!(first.archived, 1);
    assert_eq!(mailbox.archived(), vec!["m1"]);

    let second = run(&mailbox, &service, &UnwritableLog, &chunker, &RunOptions::default());
    assert_eq!(second.posts, 0);
    assert_eq!(service.network.posts.borrow().len(), posted);
}

#[test]
fn test_unrecorded_partial_thread_is_archived_and_not_reposted() {
    let mailbox = FakeMailbox::with(vec![make_message("m1", ALIAS, &long_body())]);
    let service = FakeService::new();
    *service.network.fail_at.borrow_mut() = Some(2);
    let chunker = Chunker::new(80).unwrap();

    let first = run(&mailbox, &service, &UnwritableLog, &chunker, &RunOptions::default());
    assert_eq!(first.failed, 1);
    assert_eq!(first.partial, 1);
    assert_eq!(first.posts, 1);
    assert_eq!(first.threads_posted, 0);
    assert_eq!(mailbox.archived(), vec!["m1"]);

    *service.network.fail_at.borrow_mut() = None;
    let second = run(&mailbox, &service, &UnwritableLog, &chunker, &RunOptions::default());
    assert_eq!(second.posts, 0);
    assert_eq!(service.network.posts.borrow().len(), 1);
}

#[test]
fn test_unrecorded_thread_counted_when_archive_also_fails() {
    let mailbox = FakeMailbox {
        archive_fails: true,
        ..FakeMailbox::with(vec![make_message("m1", ALIAS, "hello")])
    };
    let service = FakeService::new();

    let stats = run(&mailbox, &service, &UnwritableLog, &Chunker::default(), &RunOptions::default());
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.posts, 1);
    assert_eq!(stats.archived, 0);
}
