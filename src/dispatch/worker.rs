// Worker loop: drains one lane FIFO and runs each job against the engine.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::job::{Envelope, Job, JobKind, JobPayload, JobResult};
use super::stats::DispatchStats;
use crate::engine::{EngineError, EngineRegistry};

/// The receiving end of a lane, shared by every worker of that lane.
pub(crate) type LaneReceiver = Arc<Mutex<mpsc::Receiver<Envelope>>>;

pub(crate) struct Worker {
    pub(crate) language: String,
    pub(crate) kind: JobKind,
    pub(crate) index: usize,
    pub(crate) lane: LaneReceiver,
    pub(crate) registry: Arc<EngineRegistry>,
    pub(crate) stats: Arc<DispatchStats>,
    pub(crate) shutdown: CancellationToken,
}

impl Worker {
    pub(crate) async fn run(self) {
        debug!("{} worker {} for {} started", self.kind, self.index, self.language);
        loop {
            // Hold the lane only while waiting, so siblings can pick up the next job
            // while this one is busy.
            let next = {
                let mut lane = self.lane.lock().await;
                tokio::select! {
                    envelope = lane.recv() => envelope,
                    _ = self.shutdown.cancelled() => None,
                }
            };
            let Some(envelope) = next else { break };

            self.stats.increment_workers();
            let result = execute(&self.registry, &envelope.job).await;
            self.stats.decrement_workers();
            self.stats.record_outcome(self.kind, result.is_ok());

            if !result.is_ok() {
                warn!(
                    "{} job for {} failed: {}",
                    self.kind,
                    self.language,
                    result.errors.join("; ")
                );
            }
            envelope.complete(result);
        }
        debug!("{} worker {} for {} stopped", self.kind, self.index, self.language);
    }
}

/// Run one job. Every engine failure comes back as an error entry, never a panic.
pub(crate) async fn execute(registry: &EngineRegistry, job: &Job) -> JobResult {
    let text = job.text.clone();
    let outcome: Result<JobPayload, EngineError> = match job.kind {
        JobKind::Transliterate => registry
            .with_handle(&job.language, move |handle| handle.transliterate(&text))
            .await
            .map(JobPayload::Transliterated),
        JobKind::ReverseTransliterate => registry
            .with_handle(&job.language, move |handle| {
                handle.reverse_transliterate(&text)
            })
            .await
            .map(JobPayload::Reversed),
        JobKind::Learn => registry
            .learn(&job.language, move |handle| handle.learn(&text))
            .await
            .map(|()| JobPayload::Learned),
    };
    match outcome {
        Ok(payload) => JobResult::ok(payload),
        Err(e) => JobResult::failed(job.kind, e.to_string()),
    }
}
