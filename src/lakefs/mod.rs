//! lakeFS versioned object repository module
//!
//! REST API calls (health, object stat/read/list, commits) go through
//! `<endpoint>/api/v1` with Basic Auth; object bytes move through the
//! S3-compatible gateway on the same endpoint, signed with AWS
//! Signature V2.

mod client;
mod s3;

pub use client::{LakeClient, ObjectEntry, SyncStats, UploadResult, DEFAULT_LIST_AMOUNT};
pub use s3::S3Gateway;
