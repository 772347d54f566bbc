use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::traits::{CorpusDetails, Page, UpstreamClient, Word};
use crate::config::{UPSTREAM_CONNECT_TIMEOUT_SECS, UPSTREAM_TIMEOUT_SECS};

/// An HTTP client whose requests fail after `timeout` instead of waiting on a silent upstream.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS)))
        .build()
}

/// [`build_client`] with the default upstream limits.
pub fn default_client() -> reqwest::Result<Client> {
    build_client(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
}

#[derive(Deserialize)]
struct MetaResponse {
    result: CorpusDetails,
}

#[derive(Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    words: Vec<Word>,
}

/// Corpus client for one language against the upstream HTTP API.
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    language: String,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, language: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(default_client()?, base_url, language))
    }

    /// Share one connection pool across languages.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn meta_url(&self) -> String {
        format!("{}/meta/{}", self.base_url, self.language)
    }

    pub fn download_url(&self, offset: u64) -> String {
        format!("{}/download/{}/{}", self.base_url, self.language, offset)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        debug!("upstream GET {} status={}", url, status.as_u16());
        if !status.is_success() {
            warn!("upstream GET {} failed status={}", url, status.as_u16());
            return Err(anyhow!("upstream request failed: HTTP {}", status.as_u16()));
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn corpus_details(&self) -> Result<CorpusDetails> {
        let meta: MetaResponse = self.get_json(&self.meta_url()).await?;
        Ok(meta.result)
    }

    async fn download_words(&self, offset: u64) -> Result<Page> {
        let response: DownloadResponse = self.get_json(&self.download_url(offset)).await?;
        Ok(Page {
            offset,
            words: response.words,
        })
    }
}
