//! MaRDI workflow tools: client wrappers for data-pipeline scripts.
//!
//! Thin clients over the remote services the MaRDI pipelines talk to:
//! the knowledge-graph search API (MediaWiki), an IPFS content store,
//! a lakeFS versioned object repository, and a credential lookup chain.
//! Each operation is a single outbound call (or a short fixed chain of
//! calls) with the response lightly reshaped into typed records.

pub mod config;
pub mod curl;
pub mod ipfs;
pub mod kg;
pub mod lakefs;
pub mod network;
pub mod secrets;

pub use config::Settings;
pub use ipfs::IpfsClient;
pub use kg::{KgClient, KgSearchResult};
pub use lakefs::LakeClient;
pub use network::HttpClient;
pub use secrets::{CredentialChain, CredentialProvider, Credentials};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of attempts for the knowledge-graph query executor
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between query attempts in seconds
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 2.0;
