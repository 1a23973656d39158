//! HTTP networking module
//!
//! Shared request plumbing for the service clients.

mod client;

pub use client::HttpClient;
