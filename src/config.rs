use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Port the HTTP surface listens on when none is given.
pub const DEFAULT_PORT: u16 = 3000;

/// Languages served when none are configured.
pub const DEFAULT_LANGUAGES: &[&str] = &["ta", "hi", "kn"];

/// Parallel transliteration workers per language.
pub const DEFAULT_FAN_OUT: usize = 1;

/// Pending jobs a single lane holds before `submit` waits for room.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Seconds an HTTP request waits for its job before giving up.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Consecutive failed page downloads after which a sync run is abandoned.
pub const SYNC_MAX_RETRIES: u32 = 10;

/// Fixed delay between failed page downloads (10 s).
pub const SYNC_RETRY_BACKOFF_MS: u64 = 10_000;

/// Whole-request limit for upstream calls; a stalled download counts as a failed attempt.
pub const UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Connect limit for upstream calls.
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upstream corpus service used when the settings file names none.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.varnamproject.com";

/// Worker layout for the dispatcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Languages that get worker lanes.
    pub languages: Vec<String>,
    /// Transliterate and reverse-transliterate workers per language.
    pub fan_out: usize,
    /// Capacity of each lane's queue.
    pub queue_depth: usize,
    /// Only start the learn lanes.
    pub learn_only: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            fan_out: DEFAULT_FAN_OUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            learn_only: false,
        }
    }
}

/// Retry and staging settings for corpus sync runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Consecutive download failures tolerated before the run is fatal.
    pub max_retries: u32,
    /// Delay between download attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Where transfer files are staged. `None` uses the system temp dir.
    pub transfer_dir: Option<PathBuf>,
}

impl SyncConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn transfer_dir(&self) -> PathBuf {
        self.transfer_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: SYNC_MAX_RETRIES,
            retry_backoff_ms: SYNC_RETRY_BACKOFF_MS,
            transfer_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults_match_retry_budget() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.retry_backoff(), Duration::from_secs(10));
        assert_eq!(config.transfer_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_dispatch_config_partial_json() {
        let config: DispatchConfig = serde_json::from_str(r#"{"fan_out": 4}"#).unwrap();
        assert_eq!(config.fan_out, 4);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.languages, vec!["ta", "hi", "kn"]);
        assert!(!config.learn_only);
    }
}
