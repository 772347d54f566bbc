//! Transliteration daemon core.
//!
//! Interactive requests are routed by the [`dispatch::Dispatcher`] to
//! per-language worker lanes. A background [`sync::CorpusSyncer`] pages
//! through a remote word corpus and feeds each page to the engine's bulk
//! learn operation. Both paths share one [`engine::EngineRegistry`], which
//! owns the per-language engine handles and the learn lock that keeps
//! interactive and background learning from overlapping.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod server;
pub mod settings;
pub mod sync;
pub mod upstream;
