use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Size of the remote corpus for one language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusDetails {
    pub words_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: i64,
    /// Signed on the wire; a negative value is passed through to the engine as is.
    pub confidence: i64,
    #[serde(rename = "word")]
    pub text: String,
}

/// One batch of words, as returned by a single download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub words: Vec<Word>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Raw access to the upstream corpus. Implementations never retry.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn corpus_details(&self) -> Result<CorpusDetails>;
    async fn download_words(&self, offset: u64) -> Result<Page>;
}
