//! Relay pipeline: mailbox messages in, Bluesky threads out
//!
//! Each message is handled in isolation so one bad message never stops a run.

mod run;

pub use run::{Disposition, RunOptions, RunStats, build_record, process_mailbox, process_message};
