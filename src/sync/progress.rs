// Per-page sync outcomes and the strategies that consume them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::SyncError;
use crate::settings::{SettingsStore, SyncStatus};

/// A page was downloaded, persisted and handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub language: String,
    /// Cursor after this page; the offset a resumed run starts from.
    pub offset: u64,
    pub learned_count: usize,
    pub failed_count: usize,
    /// The page reached the end of the corpus.
    pub last_page: bool,
}

/// A page (or the whole run) failed.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub language: String,
    pub offset: u64,
    pub error: Arc<SyncError>,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Progress(ProgressEvent),
    Error(SyncFailure),
}

impl SyncEvent {
    pub fn language(&self) -> &str {
        match self {
            SyncEvent::Progress(p) => &p.language,
            SyncEvent::Error(f) => &f.language,
        }
    }
}

/// Receives one event per page outcome, in order. Runs on the blocking pool, so it may do I/O.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &SyncEvent);
}

impl ProgressReporter for Vec<Arc<dyn ProgressReporter>> {
    fn report(&self, event: &SyncEvent) {
        for reporter in self {
            reporter.report(event);
        }
    }
}

/// Exposes events as a stream.
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: &SyncEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// Writes events to the log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Progress(p) => info!(
                "[{}] learned page up to offset {}: learned={} failed={}{}",
                p.language,
                p.offset,
                p.learned_count,
                p.failed_count,
                if p.last_page { " (last page)" } else { "" }
            ),
            SyncEvent::Error(f) => warn!("[{}] sync error at offset {}: {}", f.language, f.offset, f.error),
        }
    }
}

/// Records each learned page in the settings file so a restart resumes there.
pub struct StatusStoreReporter {
    store: Arc<SettingsStore>,
}

impl StatusStoreReporter {
    pub fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }
}

impl ProgressReporter for StatusStoreReporter {
    fn report(&self, event: &SyncEvent) {
        let SyncEvent::Progress(p) = event else { return };
        let status = SyncStatus {
            enabled: true,
            offset: p.offset,
            last_page: p.last_page,
        };
        if let Err(e) = self.store.set_sync_status(&p.language, status) {
            warn!("[{}] failed to save sync status at offset {}: {}", p.language, p.offset, e);
        }
    }
}
