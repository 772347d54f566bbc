//! Background corpus synchronization.
//!
//! A run fetches the corpus size once, then loops: download the page at the
//! current offset, persist it as a transfer file, bulk-learn it under the
//! language's learn lock, report the outcome. Failed downloads are retried
//! at the same offset after a fixed delay until the retry budget runs out.
//!
//! ```text
//! Idle -> FetchingMeta -> NothingToSync
//!                      -> Downloading -> Persisting -> Learning -> Downloading | Done
//!                         (any step may end in Fatal; shutdown ends in Stopped)
//! ```

pub mod progress;
pub mod syncer;
pub mod transfer;

use std::io;

use thiserror::Error;

use crate::engine::EngineError;

pub use progress::{
    ChannelReporter, LogReporter, ProgressEvent, ProgressReporter, StatusStoreReporter,
    SyncEvent, SyncFailure,
};
pub use syncer::{CorpusSyncer, SyncHandle};
pub use transfer::{PageTransformer, TransferFile};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("error getting corpus details for '{language}': {source}")]
    Upstream {
        language: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to download words for '{language}' at offset {offset} after {attempts} attempts: {source}")]
    DownloadExhausted {
        language: String,
        offset: u64,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist words for '{language}' at offset {offset}: {source}")]
    Persistence {
        language: String,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("learning page at offset {offset} failed: {source}")]
    Learn {
        offset: u64,
        #[source]
        source: EngineError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    FetchingMeta,
    NothingToSync,
    Downloading,
    Persisting,
    Learning,
    Done,
    Fatal,
    /// Cancelled by shutdown.
    Stopped,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SyncState::NothingToSync | SyncState::Done | SyncState::Fatal | SyncState::Stopped
        )
    }
}

/// Cursor of one run, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    pub language: String,
    pub current_offset: u64,
    pub retry_count: u32,
    pub max_offset: u64,
    pub state: SyncState,
}

/// What `start` decided.
#[derive(Debug)]
pub enum SyncStart {
    /// The stored offset is already at or past the corpus size. No run was spawned.
    NothingToSync { offset: u64, words_count: u64 },
    Started(SyncHandle),
}
