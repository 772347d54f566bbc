use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

/// Outcome of a bulk learn from a transfer file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnStatus {
    pub total_words: usize,
    pub failed: usize,
}

impl LearnStatus {
    pub fn learned(&self) -> usize {
        self.total_words.saturating_sub(self.failed)
    }
}

/// One language's engine. Calls may block; the registry runs them off the async runtime.
pub trait EngineHandle: Send + Sync {
    fn transliterate(&self, input: &str) -> Result<Vec<String>>;
    fn reverse_transliterate(&self, input: &str) -> Result<String>;
    fn learn(&self, word: &str) -> Result<()>;
    /// Learn every `"<text> <confidence>"` line of the file at `path`.
    fn learn_from_file(&self, path: &Path) -> Result<LearnStatus>;
}

/// Opens engine handles. Called at most once per language by the registry.
pub trait EngineProvider: Send + Sync {
    fn open(&self, language: &str) -> Result<Arc<dyn EngineHandle>>;
}
