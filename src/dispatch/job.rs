use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use super::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transliterate,
    ReverseTransliterate,
    Learn,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Transliterate => "transliterate",
            JobKind::ReverseTransliterate => "reverse_transliterate",
            JobKind::Learn => "learn",
        };
        f.write_str(name)
    }
}

/// A single interactive request, owned by the caller until submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub language: String,
    pub kind: JobKind,
    pub text: String,
}

impl Job {
    pub fn new(language: impl Into<String>, kind: JobKind, text: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            kind,
            text: text.into(),
        }
    }

    pub fn transliterate(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(language, JobKind::Transliterate, text)
    }

    pub fn reverse_transliterate(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(language, JobKind::ReverseTransliterate, text)
    }

    pub fn learn(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(language, JobKind::Learn, text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    Transliterated(Vec<String>),
    Reversed(String),
    Learned,
}

/// What a worker writes back: engine errors as data, plus the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub errors: Vec<String>,
    pub payload: JobPayload,
}

impl JobResult {
    pub fn ok(payload: JobPayload) -> Self {
        Self {
            errors: Vec::new(),
            payload,
        }
    }

    /// A failed job still carries an (empty) payload of its kind.
    pub fn failed(kind: JobKind, error: impl Into<String>) -> Self {
        let payload = match kind {
            JobKind::Transliterate => JobPayload::Transliterated(Vec::new()),
            JobKind::ReverseTransliterate => JobPayload::Reversed(String::new()),
            JobKind::Learn => JobPayload::Learned,
        };
        Self {
            errors: vec![error.into()],
            payload,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A job in a lane, paired with the channel its result goes back on.
pub(crate) struct Envelope {
    pub(crate) job: Job,
    reply: oneshot::Sender<JobResult>,
}

impl Envelope {
    pub(crate) fn new(job: Job) -> (Self, Completion) {
        let (reply, rx) = oneshot::channel();
        (Self { job, reply }, Completion { rx })
    }

    /// Deliver the result. Consumes the envelope, so this happens at most once.
    pub(crate) fn complete(self, result: JobResult) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.reply.send(result);
    }
}

/// Fires once, when the assigned worker has finished the job.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<JobResult>,
}

impl Completion {
    pub async fn wait(self) -> Result<JobResult, DispatchError> {
        self.rx.await.map_err(|_| DispatchError::WorkerGone)
    }

    /// Wait at most `timeout`. Dropping the wait leaves the job to finish unobserved.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<JobResult, DispatchError> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(timeout)),
        }
    }
}
