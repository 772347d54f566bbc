// HTTP surface for interactive transliteration and learning.

pub mod handler;

pub use handler::{
    router, AppState, DaemonServer, ReverseTransliterationResponse, TransliterationResponse,
};
