// Remote corpus access: the client trait and its HTTP implementation.

pub mod http_upstream;
pub mod traits;

pub use http_upstream::{build_client, default_client, HttpUpstream};
pub use traits::{CorpusDetails, Page, UpstreamClient, Word};
