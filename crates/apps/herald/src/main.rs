//! Herald - relays aliased mailbox messages to Bluesky
//!
//! One invocation is one pass over the mailbox label; schedule it with cron
//! or a systemd timer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use relay::{
    BlueskyClient, GmailAuth, GmailClient, GmailMailbox, HeraldConfig, InMemoryProcessedLog,
    ProcessedLog, RunOptions, RunStats, SqliteProcessedLog, ThreadPublisher, process_mailbox,
};

mod logging;

#[derive(Parser, Debug)]
#[command(name = "herald", version, about = "Publish aliased mailbox messages as Bluesky threads")]
struct Args {
    /// Config file (defaults to herald.json in the Herald config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mailbox label to scan, overriding the config file
    #[arg(long)]
    label: Option<String>,

    /// Maximum messages to examine this run
    #[arg(long)]
    max_messages: Option<usize>,

    /// Format and split messages without posting, recording or archiving
    #[arg(long)]
    dry_run: bool,

    /// Processed-message database, overriding the config file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Log file (defaults to herald.log in the Herald data directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log to stderr only
    #[arg(long, global = true, conflicts_with = "log_file")]
    no_log_file: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a starter config file
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = if args.no_log_file {
        None
    } else {
        args.log_file.clone().or_else(logging::default_log_path)
    };
    logging::init(log_file.as_deref());

    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    match args.command {
        Some(Command::Init { force }) => init_config(args.config, force),
        None => run(args),
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => config::config_path(relay::config::CONFIG_FILE)
            .context("Could not determine config directory")?,
    };

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config::save_json_file(&path, &HeraldConfig::example())?;
    info!("Wrote starter config to {}", path.display());
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut cfg = HeraldConfig::load(args.config.as_deref())?;
    cfg.apply_env(std::env::vars());

    if let Some(label) = args.label {
        cfg.label = label;
    }
    if let Some(max_messages) = args.max_messages {
        cfg.max_messages = max_messages;
    }
    if let Some(database) = args.database {
        cfg.database = Some(database);
    }
    cfg.validate()?;

    if !cfg.gmail.is_complete() {
        anyhow::bail!(
            "Gmail credentials are incomplete: set gmail.client_id, gmail.client_secret and \
             gmail.refresh_token in the config file or GMAIL_CLIENT_ID, GMAIL_CLIENT_SECRET \
             and GMAIL_REFRESH_TOKEN"
        );
    }

    let aliases = cfg.alias_table();
    if aliases.is_empty() {
        warn!("No aliases configured; every message will be skipped");
    }

    let log: Box<dyn ProcessedLog> = if args.dry_run {
        info!("Dry run: nothing will be posted, recorded or archived");
        Box::new(InMemoryProcessedLog::new())
    } else {
        let path = cfg.database_path()?;
        info!("Using processed-message log at {}", path.display());
        Box::new(SqliteProcessedLog::open(&path)?)
    };

    let mailbox = GmailMailbox::new(GmailClient::new(GmailAuth::new(&cfg.gmail)));
    let service = BlueskyClient::new(&cfg.bluesky_service)?;
    let chunker = cfg.chunker()?;
    let publisher = ThreadPublisher::new(cfg.post_delay());
    let options = RunOptions {
        label: cfg.label.clone(),
        max_messages: cfg.max_messages,
        dry_run: args.dry_run,
        placeholder: cfg.placeholder.clone(),
    };

    let stats = process_mailbox(
        &mailbox,
        &service,
        log.as_ref(),
        &aliases,
        &chunker,
        &publisher,
        &options,
    )
    .context("Relay run failed")?;

    report(&stats);
    Ok(())
}

fn report(stats: &RunStats) {
    info!(
        "Run finished in {}ms: {} listed, {} already processed, {} without alias, \
         {} thread(s) posted ({} posts), {} archived",
        stats.duration_ms,
        stats.listed,
        stats.already_processed,
        stats.no_alias,
        stats.threads_posted,
        stats.posts,
        stats.archived
    );
    if stats.dry_run > 0 {
        info!("{} message(s) previewed", stats.dry_run);
    }
    if stats.failed > 0 {
        error!(
            "{} message(s) failed, {} of them partially posted",
            stats.failed, stats.partial
        );
    }
}
