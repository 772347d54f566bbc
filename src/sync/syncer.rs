// Corpus sync runs: fetch, persist, learn, report, with bounded fixed-delay retry.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{ProgressEvent, ProgressReporter, SyncEvent, SyncFailure};
use super::transfer::{PageTransformer, TransferFile};
use super::{SyncError, SyncRun, SyncStart, SyncState};
use crate::config::SyncConfig;
use crate::engine::EngineRegistry;
use crate::upstream::{Page, UpstreamClient};

pub struct CorpusSyncer {
    registry: Arc<EngineRegistry>,
    transformer: PageTransformer,
    reporter: Option<Arc<dyn ProgressReporter>>,
    max_retries: u32,
    backoff: Duration,
    shutdown: CancellationToken,
}

impl CorpusSyncer {
    pub fn new(registry: Arc<EngineRegistry>, config: &SyncConfig) -> Self {
        Self {
            registry,
            transformer: PageTransformer::new(config.transfer_dir()),
            reporter: None,
            max_retries: config.max_retries.max(1),
            backoff: config.retry_backoff(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Begin syncing `language` from `offset`.
    ///
    /// The corpus size is fetched here, once and without retry; a failure
    /// is returned and nothing is spawned. An offset already at the end
    /// returns [`SyncStart::NothingToSync`] without spawning either.
    /// Otherwise one independent background run is spawned per call.
    pub async fn start(
        &self,
        upstream: Arc<dyn UpstreamClient>,
        language: &str,
        offset: u64,
    ) -> Result<SyncStart, SyncError> {
        let (state_tx, state_rx) = watch::channel(SyncRun {
            language: language.to_string(),
            current_offset: offset,
            retry_count: 0,
            max_offset: 0,
            state: SyncState::Idle,
        });

        state_tx.send_modify(|run| run.state = SyncState::FetchingMeta);
        let details = upstream.corpus_details().await.map_err(|source| {
            warn!("[{}] error getting corpus details: {}", language, source);
            SyncError::Upstream {
                language: language.to_string(),
                source,
            }
        })?;

        if offset >= details.words_count {
            info!(
                "[{}] nothing to sync: offset {} >= {} words",
                language, offset, details.words_count
            );
            return Ok(SyncStart::NothingToSync {
                offset,
                words_count: details.words_count,
            });
        }

        state_tx.send_modify(|run| {
            run.max_offset = details.words_count;
            run.state = SyncState::Downloading;
        });
        info!(
            "[{}] starting sync from offset {} of {}",
            language, offset, details.words_count
        );

        let cancel = self.shutdown.child_token();
        let task = RunTask {
            language: language.to_string(),
            upstream,
            registry: Arc::clone(&self.registry),
            transformer: self.transformer.clone(),
            reporter: self.reporter.clone(),
            max_retries: self.max_retries,
            backoff: self.backoff,
            cancel: cancel.clone(),
            state: state_tx,
        };
        let join = tokio::spawn(task.run());

        Ok(SyncStart::Started(SyncHandle {
            language: language.to_string(),
            state: state_rx,
            cancel,
            task: join,
        }))
    }

    /// Cancel every run started by this syncer.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Observe or stop a running sync.
#[derive(Debug)]
pub struct SyncHandle {
    language: String,
    state: watch::Receiver<SyncRun>,
    cancel: CancellationToken,
    task: JoinHandle<SyncState>,
}

impl SyncHandle {
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn state(&self) -> SyncState {
        self.state.borrow().state
    }

    pub fn snapshot(&self) -> SyncRun {
        self.state.borrow().clone()
    }

    /// Stop at the next download or backoff. A page being learned is finished first.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end and return its final state.
    pub async fn join(self) -> SyncState {
        self.task.await.unwrap_or(SyncState::Fatal)
    }
}

struct RunTask {
    language: String,
    upstream: Arc<dyn UpstreamClient>,
    registry: Arc<EngineRegistry>,
    transformer: PageTransformer,
    reporter: Option<Arc<dyn ProgressReporter>>,
    max_retries: u32,
    backoff: Duration,
    cancel: CancellationToken,
    state: watch::Sender<SyncRun>,
}

impl RunTask {
    async fn run(self) -> SyncState {
        let outcome = self.drive().await;
        self.set_state(outcome);
        let run = self.state.borrow().clone();
        info!(
            "[{}] sync finished state={:?} offset={}/{}",
            self.language, outcome, run.current_offset, run.max_offset
        );
        outcome
    }

    async fn drive(&self) -> SyncState {
        loop {
            let (offset, max_offset) = {
                let run = self.state.borrow();
                (run.current_offset, run.max_offset)
            };
            if offset >= max_offset {
                return SyncState::Done;
            }

            self.set_state(SyncState::Downloading);
            let downloaded = tokio::select! {
                _ = self.cancel.cancelled() => return SyncState::Stopped,
                result = self.upstream.download_words(offset) => result,
            };

            let page = match downloaded {
                Ok(page) => page,
                Err(source) => {
                    let attempts = self.record_failure();
                    if attempts >= self.max_retries {
                        warn!(
                            "[{}] giving up on offset {} after {} attempts: {}",
                            self.language, offset, attempts, source
                        );
                        self.report_error(
                            offset,
                            SyncError::DownloadExhausted {
                                language: self.language.clone(),
                                offset,
                                attempts,
                                source,
                            },
                        )
                        .await;
                        return SyncState::Fatal;
                    }
                    warn!(
                        "[{}] failed to download words at offset {} (attempt {}/{}): {}",
                        self.language, offset, attempts, self.max_retries, source
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return SyncState::Stopped,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                    continue;
                }
            };

            if page.is_empty() {
                warn!(
                    "[{}] upstream returned no words at offset {} of {}, stopping",
                    self.language, offset, max_offset
                );
                return SyncState::Done;
            }

            let next_offset = offset + page.len() as u64;
            self.state.send_modify(|run| {
                run.retry_count = 0;
                run.state = SyncState::Persisting;
            });
            debug!(
                "[{}] downloaded {} words at offset {}",
                self.language,
                page.len(),
                offset
            );

            let file = match self.persist(page).await {
                Ok(file) => file,
                Err(source) => {
                    self.report_error(
                        offset,
                        SyncError::Persistence {
                            language: self.language.clone(),
                            offset,
                            source,
                        },
                    )
                    .await;
                    return SyncState::Fatal;
                }
            };

            // The cursor moves only once the page is on disk.
            self.state.send_modify(|run| {
                run.current_offset = next_offset;
                run.state = SyncState::Learning;
            });
            let learned = self
                .registry
                .learn_from_file(&self.language, file.path().to_path_buf())
                .await;
            let skipped = file.skipped();
            let path = file.path().display().to_string();
            let removed = tokio::task::spawn_blocking(move || file.remove())
                .await
                .unwrap_or_else(|e| Err(io::Error::other(e)));
            if let Err(e) = removed {
                warn!("[{}] error deleting '{}': {}", self.language, path, e);
            }

            match learned {
                Ok(status) => {
                    self.report(SyncEvent::Progress(ProgressEvent {
                        language: self.language.clone(),
                        offset: next_offset,
                        learned_count: status.learned(),
                        failed_count: status.failed + skipped,
                        last_page: next_offset >= max_offset,
                    }))
                    .await
                }
                Err(source) => {
                    self.report_error(offset, SyncError::Learn { offset, source })
                        .await
                }
            }
        }
    }

    /// Write the page on the blocking pool.
    async fn persist(&self, page: Page) -> io::Result<TransferFile> {
        let transformer = self.transformer.clone();
        let language = self.language.clone();
        tokio::task::spawn_blocking(move || transformer.persist(&language, &page))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
    }

    fn set_state(&self, state: SyncState) {
        self.state.send_modify(|run| run.state = state);
    }

    /// Count a failed download and return the consecutive failure count.
    fn record_failure(&self) -> u32 {
        let mut attempts = 0;
        self.state.send_modify(|run| {
            run.retry_count += 1;
            attempts = run.retry_count;
        });
        attempts
    }

    /// Reporters may do file I/O, so they run on the blocking pool. Events stay in order
    /// because each one is awaited before the run moves on.
    async fn report(&self, event: SyncEvent) {
        let Some(reporter) = self.reporter.clone() else {
            return;
        };
        if let Err(e) = tokio::task::spawn_blocking(move || reporter.report(&event)).await {
            warn!("[{}] progress reporter failed: {}", self.language, e);
        }
    }

    async fn report_error(&self, offset: u64, error: SyncError) {
        self.report(SyncEvent::Error(SyncFailure {
            language: self.language.clone(),
            offset,
            error: Arc::new(error),
        }))
        .await;
    }
}
