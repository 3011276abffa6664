//! Error types for per-message processing

use thiserror::Error;

use crate::publish::ThreadError;
use crate::storage::Outcome;

/// Logging in to the posting service failed
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service refused the handle/password pair
    #[error("credentials rejected for {handle}")]
    Rejected { handle: String },

    /// The login request itself failed (network, server error, bad response)
    #[error("login request failed for {handle}")]
    Transport {
        handle: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Why one mailbox message could not be relayed
///
/// These never abort a run; the pipeline logs them and moves on to the next
/// message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("mailbox error")]
    Mailbox(#[source] anyhow::Error),

    #[error("processed-message log error")]
    Storage(#[source] anyhow::Error),

    #[error("authentication failed")]
    Authentication(#[from] AuthError),

    #[error("publishing failed")]
    Publish(#[from] ThreadError),

    /// Posts went out but the outcome could not be written to the log
    ///
    /// The pipeline archives such a message even when the thread is partial,
    /// since the label is then the only thing keeping it from being posted
    /// again. `archived` is false when that fallback failed too.
    #[error("{posted} post(s) made but the {} outcome was not recorded", .outcome.as_str())]
    Unrecorded {
        outcome: Outcome,
        posted: usize,
        archived: bool,
        #[source]
        source: anyhow::Error,
    },
}

impl MessageError {
    /// Posts that went out before the failure
    pub fn posted(&self) -> usize {
        match self {
            Self::Publish(e) => e.posted(),
            Self::Unrecorded { posted, .. } => *posted,
            Self::Mailbox(_) | Self::Storage(_) | Self::Authentication(_) => 0,
        }
    }

    /// The thread stopped part-way after at least one post
    pub fn is_partial(&self) -> bool {
        match self {
            Self::Publish(e) => e.posted() > 0,
            Self::Unrecorded { outcome, .. } => *outcome == Outcome::Partial,
            Self::Mailbox(_) | Self::Storage(_) | Self::Authentication(_) => false,
        }
    }

    /// The message was removed from the label despite the failure
    pub fn archived(&self) -> bool {
        matches!(self, Self::Unrecorded { archived: true, .. })
    }
}
