//! lakeFS repository client

use super::s3::S3Gateway;
use crate::config::{LakeFsSettings, OutgoingSettings};
use crate::network::HttpClient;
use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

/// Default page size for object listings
pub const DEFAULT_LIST_AMOUNT: u64 = 100;

/// One object in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size_bytes: u64,
}

/// Outcome of uploading one file: the object key and the HTTP status
/// code, `-1` when the upload failed before a response arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub status: i32,
}

/// Counters from a sync-to-local run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub downloaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct ObjectStat {
    path: String,
    #[serde(default)]
    size_bytes: u64,
}

#[derive(Debug, Deserialize)]
struct ListObjectsResponse {
    #[serde(default)]
    results: Vec<ObjectStat>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_offset: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    id: String,
}

/// Client for a lakeFS endpoint.
///
/// REST calls map failures to `bool`/`None` with a logged message, except
/// `commit` and `sync_repo_to_local`, which propagate like the query
/// executor does: their callers need to know the pipeline step failed.
pub struct LakeClient {
    http: HttpClient,
    api_base: String,
    s3: S3Gateway,
}

impl LakeClient {
    /// Create a client for `endpoint` with access key credentials
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str) -> Result<Self> {
        let settings = LakeFsSettings {
            endpoint: endpoint.to_string(),
        };
        Self::with_settings(&settings, &OutgoingSettings::default(), access_key, secret_key)
    }

    /// Create a client from explicit settings
    pub fn with_settings(
        settings: &LakeFsSettings,
        outgoing: &OutgoingSettings,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self> {
        let endpoint = settings.endpoint.trim_end_matches('/');
        Ok(Self {
            http: HttpClient::with_settings(outgoing)?.with_basic_auth(access_key, secret_key),
            api_base: format!("{}/api/v1", endpoint),
            s3: S3Gateway::new(endpoint, access_key, secret_key),
        })
    }

    /// Check whether the server answers its health endpoint
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthcheck", self.api_base);
        match self.http.get(&url).await {
            Ok(response) if response.status().is_success() => {
                info!("lakeFS is healthy.");
                true
            }
            Ok(response) => {
                error!("[health_check] HTTP {}", response.status());
                false
            }
            Err(e) => {
                error!("[health_check] Error: {}", e);
                false
            }
        }
    }

    /// Check whether an object exists under a ref
    pub async fn file_exists(&self, repository: &str, r#ref: &str, path: &str) -> bool {
        let url = format!(
            "{}/repositories/{}/refs/{}/objects/stat",
            self.api_base, repository, r#ref
        );
        match self.http.get_with_params(&url, &[("path", path)]).await {
            Ok(response) if response.status().is_success() => {
                info!("File exists: {}", path);
                true
            }
            Ok(response) => {
                error!("[file_exists] HTTP {}", response.status());
                false
            }
            Err(e) => {
                error!("[file_exists] Error: {}", e);
                false
            }
        }
    }

    /// Load an object's content as UTF-8 text
    pub async fn load_file(&self, repository: &str, r#ref: &str, path: &str) -> Option<String> {
        let url = format!(
            "{}/repositories/{}/refs/{}/objects",
            self.api_base, repository, r#ref
        );
        let result: Result<String> = async {
            let response = self
                .http
                .get_with_params(&url, &[("path", path)])
                .await?
                .error_for_status()?;
            Ok(response.text().await?)
        }
        .await;

        match result {
            Ok(content) => Some(content),
            Err(e) => {
                error!("[load_file] Error: {}", e);
                None
            }
        }
    }

    /// List objects under a ref, up to `amount` entries
    pub async fn list_objects(
        &self,
        repository: &str,
        r#ref: &str,
        amount: u64,
    ) -> Option<Vec<ObjectEntry>> {
        let url = format!(
            "{}/repositories/{}/refs/{}/objects/ls",
            self.api_base, repository, r#ref
        );
        let amount = amount.to_string();
        let result: Result<ListObjectsResponse> = async {
            let response = self
                .http
                .get_with_params(&url, &[("amount", amount.as_str())])
                .await?
                .error_for_status()?;
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(listing) => Some(
                listing
                    .results
                    .into_iter()
                    .map(|obj| ObjectEntry {
                        path: obj.path,
                        size_bytes: obj.size_bytes,
                    })
                    .collect(),
            ),
            Err(e) => {
                error!("[list_objects] Error: {}", e);
                None
            }
        }
    }

    /// Upload files through the S3 gateway, one PUT per file.
    ///
    /// Keys are `<branch>/<subpath>/<filename>` with the subpath's
    /// slashes trimmed, or `<branch>/<filename>` when no subpath is
    /// given. Each entry records the HTTP status, `-1` on failure.
    pub async fn upload(
        &self,
        file_paths: &[&Path],
        repository: &str,
        branch: &str,
        subpath: &str,
    ) -> Vec<UploadResult> {
        let mut results = Vec::with_capacity(file_paths.len());

        for file_path in file_paths {
            let outcome = self
                .upload_one(file_path, repository, branch, subpath)
                .await;
            results.push(match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("[upload] Error uploading {}: {}", file_path.display(), e);
                    UploadResult {
                        key: object_key(branch, subpath, file_path).unwrap_or_default(),
                        status: -1,
                    }
                }
            });
        }

        results
    }

    async fn upload_one(
        &self,
        file_path: &Path,
        repository: &str,
        branch: &str,
        subpath: &str,
    ) -> Result<UploadResult> {
        let key = object_key(branch, subpath, file_path)
            .ok_or_else(|| anyhow!("path has no file name: {}", file_path.display()))?;
        let contents = tokio::fs::read(file_path).await?;

        info!("Uploading key={} to repo={}...", key, repository);
        let status = self
            .s3
            .put_object(self.http.inner(), repository, &key, contents)
            .await?;
        info!("Upload done: {}", status);

        Ok(UploadResult {
            key,
            status: i32::from(status),
        })
    }

    /// Commit staged changes on a branch.
    ///
    /// Returns the commit id, or `None` when there was nothing to commit
    /// (the server answers 400 with a "no changes" message). Every other
    /// failure propagates.
    pub async fn commit(
        &self,
        repository: &str,
        branch: &str,
        message: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/repositories/{}/branches/{}/commits",
            self.api_base, repository, branch
        );
        let body = serde_json::json!({
            "message": message,
            "metadata": metadata.unwrap_or_default(),
        });

        let response = self.http.post_json(&url, &body).await?;
        let status = response.status();

        if status.is_success() {
            let commit: CommitResponse = response.json().await?;
            return Ok(Some(commit.id));
        }

        let text = response.text().await.unwrap_or_default();
        if status.as_u16() == 400 && text.contains("no changes") {
            warn!("[commit] No changes to commit.");
            return Ok(None);
        }

        error!("[commit] API Error: HTTP {}: {}", status, text);
        bail!("commit failed: HTTP {}: {}", status, text)
    }

    /// Download everything under `<branch>/<subpath>` into a local
    /// directory, skipping files that already exist unless `overwrite`
    /// is set. Listing goes through the REST API (paginated); object
    /// bytes come from the S3 gateway. Failures propagate.
    pub async fn sync_repo_to_local(
        &self,
        repository: &str,
        branch: &str,
        subpath: &str,
        local_dir: &Path,
        overwrite: bool,
    ) -> Result<SyncStats> {
        let subpath = subpath.trim_matches('/');
        let mut stats = SyncStats::default();

        info!(
            "Syncing from s3://{}/{}/{} to {}",
            repository,
            branch,
            subpath,
            local_dir.display()
        );

        let url = format!(
            "{}/repositories/{}/refs/{}/objects/ls",
            self.api_base, repository, branch
        );
        let mut after = String::new();

        loop {
            let listing: ListObjectsResponse = self
                .http
                .get_with_params(
                    &url,
                    &[
                        ("prefix", subpath),
                        ("after", after.as_str()),
                        ("amount", "1000"),
                    ],
                )
                .await?
                .error_for_status()?
                .json()
                .await?;

            for object in &listing.results {
                let relative = object
                    .path
                    .strip_prefix(subpath)
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or(object.path.as_str());
                let local_file = local_dir.join(relative);

                if local_file.exists() && !overwrite {
                    stats.skipped += 1;
                    continue;
                }

                if let Some(parent) = local_file.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }

                let key = format!("{}/{}", branch, object.path);
                let response = self
                    .s3
                    .get_object(self.http.inner(), repository, &key)
                    .await?;
                HttpClient::save_to_file(response, &local_file).await?;

                stats.downloaded += 1;
                info!("Downloaded: {}", local_file.display());
            }

            if !listing.pagination.has_more {
                break;
            }
            after = listing.pagination.next_offset;
        }

        info!(
            "Sync complete: {} downloaded, {} skipped.",
            stats.downloaded, stats.skipped
        );
        Ok(stats)
    }

    /// Upload one file to the `main` branch and commit it
    pub async fn upload_and_commit(
        &self,
        path_and_file: &Path,
        repository: &str,
        subpath: &str,
        message: &str,
    ) -> Result<()> {
        info!(
            "Uploading {} to lakeFS ({} -> main -> {})",
            path_and_file.display(),
            repository,
            subpath
        );
        let results = self
            .upload(&[path_and_file], repository, "main", subpath)
            .await;
        if results.iter().any(|r| r.status != 200) {
            bail!("upload of {} failed", path_and_file.display());
        }

        let metadata = HashMap::from([(
            "source".to_string(),
            "mardi-workflowtools::upload_and_commit".to_string(),
        )]);
        match self.commit(repository, "main", message, Some(metadata)).await? {
            Some(id) => info!("Committed with ID: {}", id),
            None => info!("Not committed - no change detected."),
        }
        Ok(())
    }
}

/// Object key for an upload: `branch/subpath/filename`
fn object_key(branch: &str, subpath: &str, file_path: &Path) -> Option<String> {
    let filename = file_path.file_name()?.to_string_lossy();
    let subpath = subpath.trim_matches('/');
    if subpath.is_empty() {
        Some(format!("{}/{}", branch, filename))
    } else {
        Some(format!("{}/{}/{}", branch, subpath, filename))
    }
}
