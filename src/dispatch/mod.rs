//! Per-language job dispatch.
//!
//! Each supported language gets its own lanes: `fan_out` workers sharing a
//! transliterate queue, `fan_out` workers sharing a reverse-transliterate
//! queue, and exactly one learn worker. Jobs within a lane run in
//! submission order; workers of the same lane give no ordering guarantee
//! between each other. Learning additionally goes through the registry's
//! per-language learn lock, which corpus sync runs share.

pub mod job;
pub mod stats;
mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::engine::EngineRegistry;

pub use job::{Completion, Job, JobKind, JobPayload, JobResult};
pub use stats::{DispatchStats, StatsSnapshot};

use job::Envelope;
use worker::Worker;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("unsupported language '{language}' for {kind}")]
    UnsupportedLanguage { language: String, kind: JobKind },

    #[error("dispatcher is shut down")]
    Closed,

    #[error("job did not complete within {0:?}")]
    Timeout(Duration),

    #[error("worker exited before completing the job")]
    WorkerGone,
}

/// Queues for one language. A kind without a lane is not served.
struct LanguageLanes {
    transliterate: Option<mpsc::Sender<Envelope>>,
    reverse_transliterate: Option<mpsc::Sender<Envelope>>,
    learn: mpsc::Sender<Envelope>,
}

impl LanguageLanes {
    fn lane(&self, kind: JobKind) -> Option<&mpsc::Sender<Envelope>> {
        match kind {
            JobKind::Transliterate => self.transliterate.as_ref(),
            JobKind::ReverseTransliterate => self.reverse_transliterate.as_ref(),
            JobKind::Learn => Some(&self.learn),
        }
    }
}

pub struct Dispatcher {
    lanes: HashMap<String, LanguageLanes>,
    stats: Arc<DispatchStats>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Build the lanes and spawn their workers. Must be called inside a Tokio runtime.
    pub fn start(config: DispatchConfig, registry: Arc<EngineRegistry>) -> Self {
        let stats = Arc::new(DispatchStats::new());
        let shutdown = CancellationToken::new();
        let fan_out = config.fan_out.max(1);
        let depth = config.queue_depth.max(1);

        let spawn_lane = |language: &str, kind: JobKind, workers: usize| {
            let (tx, rx) = mpsc::channel(depth);
            let lane = Arc::new(Mutex::new(rx));
            for index in 0..workers {
                let worker = Worker {
                    language: language.to_string(),
                    kind,
                    index,
                    lane: Arc::clone(&lane),
                    registry: Arc::clone(&registry),
                    stats: Arc::clone(&stats),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(worker.run());
            }
            tx
        };

        let mut lanes = HashMap::new();
        for language in &config.languages {
            if lanes.contains_key(language) {
                continue;
            }
            let (transliterate, reverse_transliterate) = if config.learn_only {
                (None, None)
            } else {
                (
                    Some(spawn_lane(language, JobKind::Transliterate, fan_out)),
                    Some(spawn_lane(language, JobKind::ReverseTransliterate, fan_out)),
                )
            };
            let learn = spawn_lane(language, JobKind::Learn, 1);
            lanes.insert(
                language.clone(),
                LanguageLanes {
                    transliterate,
                    reverse_transliterate,
                    learn,
                },
            );
        }

        info!(
            "dispatcher started languages={:?} fan_out={} learn_only={}",
            config.languages, fan_out, config.learn_only
        );

        Self {
            lanes,
            stats,
            shutdown,
        }
    }

    /// Route `job` to its language's lane.
    ///
    /// The lane is looked up before anything is enqueued, so an unknown
    /// language (or a kind the language has no lane for) fails immediately.
    /// Waits only if the lane's queue is full.
    pub async fn submit(&self, job: Job) -> Result<Completion, DispatchError> {
        let Some(lane) = self
            .lanes
            .get(&job.language)
            .and_then(|lanes| lanes.lane(job.kind))
        else {
            self.stats.record_rejected();
            debug!("rejected {} job for unsupported language {}", job.kind, job.language);
            return Err(DispatchError::UnsupportedLanguage {
                language: job.language,
                kind: job.kind,
            });
        };
        if self.shutdown.is_cancelled() {
            return Err(DispatchError::Closed);
        }

        let (envelope, completion) = Envelope::new(job);
        lane.send(envelope).await.map_err(|_| DispatchError::Closed)?;
        self.stats.record_submitted();
        Ok(completion)
    }

    /// Submit and wait for the result, giving up after `timeout`.
    pub async fn run(&self, job: Job, timeout: Duration) -> Result<JobResult, DispatchError> {
        self.submit(job).await?.wait_timeout(timeout).await
    }

    pub fn supports(&self, language: &str, kind: JobKind) -> bool {
        self.lanes
            .get(language)
            .map(|lanes| lanes.lane(kind).is_some())
            .unwrap_or(false)
    }

    /// Languages with lanes, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.lanes.keys().cloned().collect();
        languages.sort();
        languages
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting jobs and let idle workers exit. Jobs already running finish.
    pub fn shutdown(&self) {
        info!("dispatcher shutting down");
        self.shutdown.cancel();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
