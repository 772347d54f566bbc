// Engine boundary: per-language handles, the shared registry and a fallback lexicon engine.

pub mod lexicon;
pub mod registry;
pub mod traits;

use thiserror::Error;

pub use lexicon::LexiconEngine;
pub use registry::EngineRegistry;
pub use traits::{EngineHandle, EngineProvider, LearnStatus};

/// Failures reported by (or while reaching) the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine init failed for '{language}': {source}")]
    Init {
        language: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{source}")]
    Operation {
        language: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("engine call panicked for '{language}'")]
    Panicked { language: String },
}

impl EngineError {
    pub fn language(&self) -> &str {
        match self {
            EngineError::Init { language, .. }
            | EngineError::Operation { language, .. }
            | EngineError::Panicked { language } => language,
        }
    }
}
