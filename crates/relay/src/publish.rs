//! Thread publishing
//!
//! Posts an ordered chunk sequence as a reply chain: the first chunk becomes
//! the thread root and every later chunk replies to its predecessor while
//! pointing at that root. Posting is at-most-once per chunk. A failure stops
//! the chain where it is; nothing already posted is retried or deleted.

use anyhow::Result;
use log::{debug, error, info};
use std::time::Duration;
use thiserror::Error;

use crate::models::{PostHandle, ReplyRef};

/// Delay between consecutive posts of a thread
pub const DEFAULT_POST_DELAY: Duration = Duration::from_secs(5);

/// An authenticated posting session
pub trait Poster {
    /// Publish `text`, optionally as a reply, returning the new post's handle
    fn post(&self, text: &str, reply_to: Option<&ReplyRef>) -> Result<PostHandle>;
}

/// Waits between posts to respect the remote rate limit
pub trait Throttle {
    fn pause(&self, delay: Duration);
}

/// Blocks the current thread for the delay
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepThrottle;

impl Throttle for SleepThrottle {
    fn pause(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Progress of a single thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    NotStarted,
    RootPosted,
    Replying { posted: usize },
    Complete { posts: usize },
    Aborted { after: usize },
}

impl ThreadState {
    /// Number of posts published when the thread was in this state
    pub fn posted(&self) -> usize {
        match *self {
            Self::NotStarted => 0,
            Self::RootPosted => 1,
            Self::Replying { posted } => posted,
            Self::Complete { posts } => posts,
            Self::Aborted { after } => after,
        }
    }

    fn advance(self) -> Self {
        match self {
            Self::NotStarted => Self::RootPosted,
            other => Self::Replying {
                posted: other.posted() + 1,
            },
        }
    }
}

/// A fully published thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadReceipt {
    /// Number of posts made, equal to the number of chunks
    pub posts: usize,
    pub root: PostHandle,
    pub last: PostHandle,
}

/// Why a thread could not be published in full
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("No content to post")]
    EmptyContent,

    #[error("thread aborted after {posted} of {total} posts")]
    Post {
        /// Posts successfully made before the failure
        posted: usize,
        total: usize,
        /// Root of the partial thread, if the first post went through
        root: Option<PostHandle>,
        #[source]
        source: anyhow::Error,
    },
}

impl ThreadError {
    /// Posts that were published before the error
    pub fn posted(&self) -> usize {
        match self {
            Self::EmptyContent => 0,
            Self::Post { posted, .. } => *posted,
        }
    }
}

/// Publishes chunk sequences as threads
pub struct ThreadPublisher {
    delay: Duration,
    throttle: Box<dyn Throttle>,
}

impl ThreadPublisher {
    /// Create a publisher that sleeps `delay` between posts
    pub fn new(delay: Duration) -> Self {
        Self::with_throttle(delay, SleepThrottle)
    }

    pub fn with_throttle(delay: Duration, throttle: impl Throttle + 'static) -> Self {
        Self {
            delay,
            throttle: Box::new(throttle),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Publish `chunks` in order as a single thread
    ///
    /// Fails with [`ThreadError::EmptyContent`] without touching the poster
    /// when there is nothing to post.
    pub fn publish(
        &self,
        chunks: &[String],
        poster: &dyn Poster,
    ) -> std::result::Result<ThreadReceipt, ThreadError> {
        let Some((first, rest)) = chunks.split_first() else {
            error!("No content to post.");
            return Err(ThreadError::EmptyContent);
        };

        let total = chunks.len();
        let mut state = ThreadState::NotStarted;

        let root = poster
            .post(first, None)
            .map_err(|e| abort(state, total, None, e))?;
        state = state.advance();
        debug!("Thread root posted: {} ({:?})", root.uri, state);

        let mut parent = root.clone();
        for chunk in rest {
            self.throttle.pause(self.delay);

            let reply_to = ReplyRef {
                root: root.clone(),
                parent,
            };
            parent = poster
                .post(chunk, Some(&reply_to))
                .map_err(|e| abort(state, total, Some(root.clone()), e))?;
            state = state.advance();
            debug!("Reply posted: {} ({:?})", parent.uri, state);
        }

        state = ThreadState::Complete { posts: total };
        debug!("Thread finished: {:?}", state);
        info!("✓ Posted thread with {} parts.", total);

        Ok(ThreadReceipt {
            posts: total,
            root,
            last: parent,
        })
    }
}

impl Default for ThreadPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_POST_DELAY)
    }
}

fn abort(
    state: ThreadState,
    total: usize,
    root: Option<PostHandle>,
    source: anyhow::Error,
) -> ThreadError {
    let aborted = ThreadState::Aborted {
        after: state.posted(),
    };
    error!("Error posting thread: {:#} ({:?})", source, aborted);
    ThreadError::Post {
        posted: aborted.posted(),
        total,
        root,
        source,
    }
}
