//! IPFS content store module
//!
//! Client for a Basic-Authenticated IPFS node following the `/api/v0`
//! convention, plus unauthenticated downloads through a public gateway.
//! MFS paths are used to tag immutable CIDs with human-readable names.

mod client;

pub use client::{IpfsClient, PinnedObject, TaggedPath};
