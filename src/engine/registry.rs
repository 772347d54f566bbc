// Get-or-create cache of engine handles, one slot per language.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use super::traits::{EngineHandle, EngineProvider, LearnStatus};
use super::EngineError;

/// Per-language state: the lazily opened handle and the learn lock.
struct LanguageSlot {
    handle: OnceCell<Arc<dyn EngineHandle>>,
    learn_lock: Arc<Mutex<()>>,
}

impl LanguageSlot {
    fn new() -> Self {
        Self {
            handle: OnceCell::new(),
            learn_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Shared by the dispatcher's workers and every sync run.
///
/// The slot map lock is only held to find or insert a slot, so languages
/// never wait on each other. Handle creation is serialized per language by
/// the slot's `OnceCell`: a second caller for a language that is still
/// opening waits for the first instead of opening a duplicate. All learn
/// calls for a language, interactive or from a sync run, go through
/// [`EngineRegistry::learn`] and hold that language's learn lock until the
/// engine call has returned.
pub struct EngineRegistry {
    provider: Arc<dyn EngineProvider>,
    slots: RwLock<HashMap<String, Arc<LanguageSlot>>>,
}

impl EngineRegistry {
    pub fn new(provider: Arc<dyn EngineProvider>) -> Self {
        Self {
            provider,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, language: &str) -> Arc<LanguageSlot> {
        if let Some(slot) = self.slots.read().get(language) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(
            slots
                .entry(language.to_string())
                .or_insert_with(|| Arc::new(LanguageSlot::new())),
        )
    }

    async fn handle_for(
        &self,
        language: &str,
        slot: &LanguageSlot,
    ) -> Result<Arc<dyn EngineHandle>, EngineError> {
        let handle = slot
            .handle
            .get_or_try_init(|| async {
                let provider = Arc::clone(&self.provider);
                let lang = language.to_string();
                debug!("opening engine handle for {}", language);
                let opened = tokio::task::spawn_blocking(move || provider.open(&lang)).await;
                match opened {
                    Ok(Ok(handle)) => {
                        info!("engine handle ready for {}", language);
                        Ok(handle)
                    }
                    Ok(Err(source)) => Err(EngineError::Init {
                        language: language.to_string(),
                        source,
                    }),
                    Err(_) => Err(EngineError::Panicked {
                        language: language.to_string(),
                    }),
                }
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Return the cached handle for `language`, opening it on first use.
    pub async fn get_or_create(&self, language: &str) -> Result<Arc<dyn EngineHandle>, EngineError> {
        let slot = self.slot(language);
        self.handle_for(language, &slot).await
    }

    /// Obtain the handle (creating and caching it first if needed), then run `f` with it.
    ///
    /// `f` runs on the blocking pool; a panic inside it becomes
    /// [`EngineError::Panicked`] instead of unwinding into the caller.
    pub async fn with_handle<T, F>(&self, language: &str, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EngineHandle) -> anyhow::Result<T> + Send + 'static,
    {
        let handle = self.get_or_create(language).await?;
        run_blocking(language, move || f(handle.as_ref())).await
    }

    /// Like [`with_handle`](Self::with_handle), serialized against every other learn for `language`.
    pub async fn learn<T, F>(&self, language: &str, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EngineHandle) -> anyhow::Result<T> + Send + 'static,
    {
        let slot = self.slot(language);
        let handle = self.handle_for(language, &slot).await?;
        // The guard moves into the blocking task so it is released only once
        // the engine call returns, even if this future is dropped first.
        let guard = Arc::clone(&slot.learn_lock).lock_owned().await;
        run_blocking(language, move || {
            let _guard = guard;
            f(handle.as_ref())
        })
        .await
    }

    /// Bulk-learn a transfer file under the language's learn lock.
    pub async fn learn_from_file(
        &self,
        language: &str,
        path: PathBuf,
    ) -> Result<LearnStatus, EngineError> {
        self.learn(language, move |handle| handle.learn_from_file(&path))
            .await
    }

    pub fn is_initialized(&self, language: &str) -> bool {
        self.slots
            .read()
            .get(language)
            .map(|slot| slot.handle.initialized())
            .unwrap_or(false)
    }

    /// Languages with an open handle, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.handle.initialized())
            .map(|(language, _)| language.clone())
            .collect();
        languages.sort();
        languages
    }
}

async fn run_blocking<T, F>(language: &str, f: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(EngineError::Operation {
            language: language.to_string(),
            source,
        }),
        Err(_) => Err(EngineError::Panicked {
            language: language.to_string(),
        }),
    }
}
