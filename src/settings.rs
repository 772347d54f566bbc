//! Persisted daemon settings: upstream URL and per-language sync status.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::DEFAULT_UPSTREAM_URL;

/// Sync status for one language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    pub offset: u64,
    pub last_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub upstream_url: String,
    #[serde(default)]
    pub schemes_to_sync: BTreeMap<String, SyncStatus>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            schemes_to_sync: BTreeMap::new(),
        }
    }
}

/// Default location of the settings file: `<config dir>/config.json`.
pub fn default_path() -> PathBuf {
    directories::ProjectDirs::from("org", "varnamproject", "translit-daemon")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".translit-daemon"))
        .join("config.json")
}

/// The settings file plus the in-memory copy every write goes through.
pub struct SettingsStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl SettingsStore {
    /// Defaults bound to `path`. Nothing is written until the first save.
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Mutex::new(Settings::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let blob = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let settings: Settings = serde_json::from_slice(&blob)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            settings: Mutex::new(settings),
        })
    }

    /// Load `path` if it exists, otherwise start from defaults. A corrupt file is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("no settings at {}, using defaults", path.display());
            Ok(Self::with_defaults(path))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.lock().clone()
    }

    pub fn upstream_url(&self) -> String {
        self.settings.lock().upstream_url.clone()
    }

    /// Languages with sync enabled, with their stored status.
    pub fn enabled_schemes(&self) -> Vec<(String, SyncStatus)> {
        self.settings
            .lock()
            .schemes_to_sync
            .iter()
            .filter(|(_, status)| status.enabled)
            .map(|(language, status)| (language.clone(), *status))
            .collect()
    }

    pub fn save(&self) -> Result<()> {
        let settings = self.settings.lock();
        write_atomically(&self.path, &settings)
    }

    /// Record `status` for `language` and save. Concurrent callers are serialized.
    pub fn set_sync_status(&self, language: &str, status: SyncStatus) -> Result<()> {
        let mut settings = self.settings.lock();
        settings
            .schemes_to_sync
            .insert(language.to_string(), status);
        write_atomically(&self.path, &settings)
    }
}

fn write_atomically(path: &Path, settings: &Settings) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, settings)?;
        writer.flush()?;
    }
    temp.persist(path)
        .with_context(|| format!("saving {}", path.display()))?;
    debug!("saved settings to {}", path.display());
    Ok(())
}
