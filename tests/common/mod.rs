// Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use translit_daemon::config::SyncConfig;
use translit_daemon::engine::{EngineHandle, EngineProvider, LearnStatus};
use translit_daemon::sync::SyncEvent;
use translit_daemon::upstream::{CorpusDetails, Page, UpstreamClient, Word};

/// Counters shared by every handle a [`RecordingEngine`] opens.
#[derive(Default)]
pub struct EngineLog {
    pub opened: AtomicUsize,
    pub learns_in_flight: AtomicUsize,
    pub max_learns_in_flight: AtomicUsize,
    pub learned_words: Mutex<Vec<String>>,
    pub learned_files: Mutex<Vec<String>>,
}

impl EngineLog {
    fn enter_learn(&self) {
        let now = self.learns_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_learns_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit_learn(&self) {
        self.learns_in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_concurrent_learns(&self) -> usize {
        self.max_learns_in_flight.load(Ordering::SeqCst)
    }
}

/// An engine that records what it is asked to do.
///
/// `transliterate` answers `[input, input.to_uppercase()]`. The word
/// `panic` makes any call panic and the word `fail` makes it return an
/// error. Learn calls hold for `learn_delay` so overlap would be visible.
pub struct RecordingEngine {
    pub log: Arc<EngineLog>,
    pub learn_delay: Duration,
    pub fail_file_learn: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            log: Arc::new(EngineLog::default()),
            learn_delay: Duration::ZERO,
            fail_file_learn: false,
        }
    }

    pub fn with_learn_delay(mut self, delay: Duration) -> Self {
        self.learn_delay = delay;
        self
    }

    pub fn failing_file_learn(mut self) -> Self {
        self.fail_file_learn = true;
        self
    }
}

impl EngineProvider for RecordingEngine {
    fn open(&self, _language: &str) -> Result<Arc<dyn EngineHandle>> {
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingHandle {
            log: Arc::clone(&self.log),
            learn_delay: self.learn_delay,
            fail_file_learn: self.fail_file_learn,
        }))
    }
}

struct RecordingHandle {
    log: Arc<EngineLog>,
    learn_delay: Duration,
    fail_file_learn: bool,
}

fn check(input: &str) -> Result<()> {
    match input {
        "panic" => panic!("engine crashed on '{}'", input),
        "fail" => Err(anyhow!("engine rejected '{}'", input)),
        _ => Ok(()),
    }
}

impl EngineHandle for RecordingHandle {
    fn transliterate(&self, input: &str) -> Result<Vec<String>> {
        check(input)?;
        Ok(vec![input.to_string(), input.to_uppercase()])
    }

    fn reverse_transliterate(&self, input: &str) -> Result<String> {
        check(input)?;
        Ok(input.chars().rev().collect())
    }

    fn learn(&self, word: &str) -> Result<()> {
        self.log.enter_learn();
        std::thread::sleep(self.learn_delay);
        let outcome = check(word);
        if outcome.is_ok() {
            self.log.learned_words.lock().push(word.to_string());
        }
        self.log.exit_learn();
        outcome
    }

    fn learn_from_file(&self, path: &Path) -> Result<LearnStatus> {
        self.log.enter_learn();
        std::thread::sleep(self.learn_delay);
        let contents = std::fs::read_to_string(path);
        self.log.exit_learn();

        let contents = contents?;
        if self.fail_file_learn {
            return Err(anyhow!("corrupt learn file {}", path.display()));
        }
        self.log.learned_files.lock().push(contents.clone());
        let total_words = contents.lines().filter(|l| !l.is_empty()).count();
        Ok(LearnStatus {
            total_words,
            failed: 0,
        })
    }
}

/// An upstream serving a synthetic corpus of `words_count` words in pages of `page_size`.
pub struct ScriptedUpstream {
    pub words_count: u64,
    pub page_size: u64,
    /// Fail this many downloads before succeeding again.
    pub fail_downloads: AtomicUsize,
    /// Fail every download.
    pub always_fail: bool,
    pub meta_error: bool,
    /// Index of a word whose text carries a line break.
    pub broken_word: Option<u64>,
    pub requested: Mutex<Vec<u64>>,
}

impl ScriptedUpstream {
    pub fn new(words_count: u64, page_size: u64) -> Self {
        Self {
            words_count,
            page_size,
            fail_downloads: AtomicUsize::new(0),
            always_fail: false,
            meta_error: false,
            broken_word: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.fail_downloads.store(failures, Ordering::SeqCst);
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn broken_meta(mut self) -> Self {
        self.meta_error = true;
        self
    }

    pub fn with_broken_word(mut self, index: u64) -> Self {
        self.broken_word = Some(index);
        self
    }

    pub fn requested_offsets(&self) -> Vec<u64> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn corpus_details(&self) -> Result<CorpusDetails> {
        if self.meta_error {
            return Err(anyhow!("test error"));
        }
        Ok(CorpusDetails {
            words_count: self.words_count,
        })
    }

    async fn download_words(&self, offset: u64) -> Result<Page> {
        self.requested.lock().push(offset);
        if self.always_fail {
            return Err(anyhow!("upstream unavailable"));
        }
        let remaining = self.fail_downloads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_downloads.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("connection reset"));
        }
        if offset >= self.words_count {
            return Err(anyhow!("invalid offset {}", offset));
        }

        let end = (offset + self.page_size).min(self.words_count);
        let words = (offset..end)
            .map(|i| Word {
                id: i as i64 + 1,
                confidence: 10 + i as i64,
                text: if self.broken_word == Some(i) {
                    format!("മലയാ\nളം{}", i)
                } else {
                    format!("മലയാളം{}", i)
                },
            })
            .collect();
        Ok(Page { offset, words })
    }
}

/// Sync settings with a tiny backoff and a private transfer directory.
pub fn fast_sync_config(transfer_dir: &Path) -> SyncConfig {
    SyncConfig {
        retry_backoff_ms: 1,
        transfer_dir: Some(transfer_dir.to_path_buf()),
        ..Default::default()
    }
}

/// Everything reported so far.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
