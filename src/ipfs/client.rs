//! IPFS node client

use crate::config::{IpfsSettings, OutgoingSettings};
use crate::network::HttpClient;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// A pinned CID and its pin type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedObject {
    pub cid: String,
    pub pin_type: String,
}

/// An MFS tag: a virtual path pointing at an immutable CID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedPath {
    /// Full MFS path, e.g. `/tags/db-latest.sqlite`
    pub path: String,
    /// CID the path points to
    pub cid: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time as a Unix timestamp
    pub mtime: i64,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    keys: HashMap<String, PinInfo>,
}

#[derive(Debug, Deserialize)]
struct PinInfo {
    #[serde(rename = "Type", default)]
    pin_type: String,
}

#[derive(Debug, Deserialize)]
struct LocalRef {
    #[serde(rename = "Ref")]
    r#ref: String,
}

#[derive(Debug, Deserialize)]
struct FilesLsResponse {
    #[serde(rename = "Entries", default)]
    entries: Vec<FilesEntry>,
}

#[derive(Debug, Deserialize)]
struct FilesEntry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilesStatResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "Mtime", default)]
    mtime: i64,
}

/// Client for an IPFS node with Basic Auth on the API host.
///
/// All API verbs are POSTs against `<host>/api/v0`; downloads by CID go
/// through the public gateway without authentication. Failures are mapped
/// to `bool`/`None` with a logged message; nothing here retries.
pub struct IpfsClient {
    http: HttpClient,
    api_base: String,
    gateway_url: String,
}

impl IpfsClient {
    /// Create a client for `host` with Basic Auth credentials
    pub fn new(host: &str, user: &str, password: &str) -> Result<Self> {
        let settings = IpfsSettings {
            api_url: host.to_string(),
            ..IpfsSettings::default()
        };
        Self::with_settings(&settings, &OutgoingSettings::default(), user, password)
    }

    /// Create a client from explicit settings
    pub fn with_settings(
        settings: &IpfsSettings,
        outgoing: &OutgoingSettings,
        user: &str,
        password: &str,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpClient::with_settings(outgoing)?.with_basic_auth(user, password),
            api_base: format!("{}/api/v0", settings.api_url.trim_end_matches('/')),
            gateway_url: settings.gateway_url.trim_end_matches('/').to_string(),
        })
    }

    /// Upload a file to the node; returns the resulting CID.
    ///
    /// The `/add` endpoint emits one JSON object per line for chunked or
    /// wrapped uploads; the first line carries the file's own hash.
    pub async fn add_file(&self, file_path: &Path, cid_version: u32, pin: bool) -> Option<String> {
        match self.try_add_file(file_path, cid_version, pin).await {
            Ok(cid) => {
                info!("Uploaded: {} -> CID: {}", file_path.display(), cid);
                Some(cid)
            }
            Err(e) => {
                error!("Error uploading file: {}", e);
                None
            }
        }
    }

    async fn try_add_file(&self, file_path: &Path, cid_version: u32, pin: bool) -> Result<String> {
        let cid_version = cid_version.to_string();
        let pin = pin.to_string();
        let params = [("cid-version", cid_version.as_str()), ("pin", pin.as_str())];

        let contents = tokio::fs::read(file_path).await?;
        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_path.display().to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post_multipart(&format!("{}/add", self.api_base), &params, form)
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let first_line = body
            .trim()
            .lines()
            .next()
            .ok_or_else(|| anyhow!("empty response from /add"))?;
        let parsed: AddResponse = serde_json::from_str(first_line)?;
        Ok(parsed.hash)
    }

    /// Public gateway URL for a CID
    pub fn gateway_url(&self, cid: &str, gateway_host: Option<&str>) -> String {
        let base = gateway_host
            .map(|h| h.trim_end_matches('/'))
            .unwrap_or(&self.gateway_url);
        format!("{}/ipfs/{}", base, cid)
    }

    /// Download a file by CID through the public gateway
    pub async fn download_file(
        &self,
        cid: &str,
        destination: &Path,
        gateway_host: Option<&str>,
    ) -> bool {
        let url = self.gateway_url(cid, gateway_host);
        match self.try_download(&url, destination, false).await {
            Ok(()) => {
                info!("Downloaded CID {} to {}", cid, destination.display());
                true
            }
            Err(e) => {
                error!("Error downloading CID {}: {}", cid, e);
                false
            }
        }
    }

    async fn try_download(&self, url: &str, destination: &Path, authenticated: bool) -> Result<()> {
        // The gateway is public; only MFS reads go through the API host
        let response = if authenticated {
            self.http.post_query(url, &[]).await?
        } else {
            self.http.inner().get(url).send().await?
        };

        HttpClient::save_to_file(response.error_for_status()?, destination).await
    }

    /// Pin a CID so the node retains it
    pub async fn pin(&self, cid: &str) -> bool {
        match self.simple_call("pin/add", &[("arg", cid)]).await {
            Ok(_) => {
                info!("Pinned CID: {}", cid);
                true
            }
            Err(e) => {
                error!("Error pinning CID {}: {}", cid, e);
                false
            }
        }
    }

    /// Unpin a CID
    pub async fn unpin(&self, cid: &str) -> bool {
        match self.simple_call("pin/rm", &[("arg", cid)]).await {
            Ok(_) => {
                info!("Unpinned CID: {}", cid);
                true
            }
            Err(e) => {
                error!("Error unpinning CID {}: {}", cid, e);
                false
            }
        }
    }

    /// Trigger garbage collection on the node
    pub async fn run_gc(&self) -> bool {
        match self.simple_call("repo/gc", &[]).await {
            Ok(_) => {
                info!("Garbage collection triggered.");
                true
            }
            Err(e) => {
                error!("Error running garbage collection: {}", e);
                false
            }
        }
    }

    /// List pinned CIDs of the given type: `all`, `recursive`, `direct`
    /// or `indirect`.
    pub async fn list_pins(&self, pin_type: &str) -> Option<Vec<PinnedObject>> {
        let result: Result<PinLsResponse> = async {
            let response = self
                .simple_call("pin/ls", &[("type", pin_type)])
                .await?;
            Ok(response.json().await?)
        }
        .await;

        match result {
            Ok(parsed) => {
                let mut pins: Vec<PinnedObject> = parsed
                    .keys
                    .into_iter()
                    .map(|(cid, info)| PinnedObject {
                        cid,
                        pin_type: info.pin_type,
                    })
                    .collect();
                pins.sort_by(|a, b| a.cid.cmp(&b.cid));
                info!("Retrieved {} pinned CIDs (type={})", pins.len(), pin_type);
                Some(pins)
            }
            Err(e) => {
                error!("Error listing pins: {}", e);
                None
            }
        }
    }

    /// List all CIDs stored locally on the node, pinned or not.
    ///
    /// `/refs/local` streams NDJSON, one `{"Ref": cid}` object per line.
    pub async fn list_local_refs(&self) -> Option<Vec<String>> {
        let result: Result<Vec<String>> = async {
            let response = self.simple_call("refs/local", &[]).await?;
            let body = response.text().await?;
            let mut cids = Vec::new();
            for line in body.lines().filter(|line| !line.trim().is_empty()) {
                let parsed: LocalRef = serde_json::from_str(line)?;
                cids.push(parsed.r#ref);
            }
            Ok(cids)
        }
        .await;

        match result {
            Ok(cids) => {
                info!("Found {} local CIDs", cids.len());
                Some(cids)
            }
            Err(e) => {
                error!("Error listing local refs: {}", e);
                None
            }
        }
    }

    /// Create an MFS directory, parents included
    pub async fn mkdir_mfs(&self, path: &str) -> bool {
        match self
            .simple_call("files/mkdir", &[("arg", path), ("parents", "true")])
            .await
        {
            Ok(_) => {
                info!("Ensured MFS directory exists: {}", path);
                true
            }
            Err(e) => {
                error!("Error creating MFS directory {}: {}", path, e);
                false
            }
        }
    }

    /// Remove a file or directory from MFS.
    ///
    /// A path that does not exist counts as success.
    pub async fn remove_mfs_path(&self, mfs_path: &str) -> bool {
        let url = format!("{}/files/rm", self.api_base);
        let params = [("arg", mfs_path), ("force", "true")];

        let response = match self.http.post_query(&url, &params).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error removing MFS path {}: {}", mfs_path, e);
                return false;
            }
        };

        let status = response.status();
        if status.is_success() {
            info!("Removed existing MFS path: {}", mfs_path);
            return true;
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 500 && body.contains("does not exist") {
            debug!("MFS path {} did not exist.", mfs_path);
            true
        } else {
            error!(
                "Error removing MFS path {}: HTTP {}: {}",
                mfs_path, status, body
            );
            false
        }
    }

    /// Tag a CID with a virtual MFS path, like a symbolic link.
    ///
    /// Parent directories are created as needed. An existing path is an
    /// error unless `overwrite` is set.
    pub async fn tag_file(&self, cid: &str, mfs_path: &str, overwrite: bool) -> bool {
        if let Some(parent) = Self::parent_dir(mfs_path) {
            self.mkdir_mfs(&parent).await;
        }

        if overwrite {
            self.remove_mfs_path(mfs_path).await;
        }

        let url = format!("{}/files/cp", self.api_base);
        let source = format!("/ipfs/{}", cid);
        let params = [("arg", source.as_str()), ("arg", mfs_path)];

        let response = match self.http.post_query(&url, &params).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error tagging CID in MFS: {}", e);
                return false;
            }
        };

        let status = response.status();
        if status.is_success() {
            info!("Tagged CID {} as MFS path {}", cid, mfs_path);
            return true;
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 500 && body.to_lowercase().contains("file already exists") {
            warn!(
                "MFS path {} already exists. Use overwrite to replace.",
                mfs_path
            );
        } else {
            error!("Error tagging CID in MFS: HTTP {}: {}", status, body);
        }
        false
    }

    /// Download a file from MFS by its virtual path
    pub async fn download_by_tag(&self, mfs_path: &str, destination: &Path) -> bool {
        let url = format!(
            "{}/files/read?arg={}",
            self.api_base,
            urlencoding::encode(mfs_path)
        );
        match self.try_download(&url, destination, true).await {
            Ok(()) => {
                info!("Downloaded {} -> {}", mfs_path, destination.display());
                true
            }
            Err(e) => {
                error!("Error downloading from MFS path {}: {}", mfs_path, e);
                false
            }
        }
    }

    /// List MFS tags under a directory with their CID, size and mtime.
    ///
    /// One `/files/stat` call per entry; the listing itself carries no
    /// hashes.
    pub async fn list_tags(&self, mfs_dir: &str) -> Option<Vec<TaggedPath>> {
        let result: Result<Vec<TaggedPath>> = async {
            let listing: FilesLsResponse = self
                .simple_call("files/ls", &[("arg", mfs_dir), ("long", "true")])
                .await?
                .json()
                .await?;

            let mut tags = Vec::with_capacity(listing.entries.len());
            for entry in listing.entries {
                let full_path = format!("{}/{}", mfs_dir.trim_end_matches('/'), entry.name);
                let stat: FilesStatResponse = self
                    .simple_call("files/stat", &[("arg", full_path.as_str())])
                    .await?
                    .json()
                    .await?;
                tags.push(TaggedPath {
                    path: full_path,
                    cid: stat.hash,
                    size: stat.size,
                    mtime: stat.mtime,
                });
            }
            Ok(tags)
        }
        .await;

        match result {
            Ok(tags) => {
                info!("Found {} tags in {}", tags.len(), mfs_dir);
                Some(tags)
            }
            Err(e) => {
                error!("Error listing tags in MFS directory {}: {}", mfs_dir, e);
                None
            }
        }
    }

    /// One authenticated POST to an API verb, failed statuses mapped to
    /// errors carrying the response body.
    async fn simple_call(
        &self,
        verb: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.api_base, verb);
        let response = self.http.post_query(&url, params).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("HTTP {}: {}", status, body));
        }
        Ok(response)
    }

    /// Parent directory of an MFS path, `/a/b/c` -> `/a/b`
    fn parent_dir(mfs_path: &str) -> Option<String> {
        let trimmed = mfs_path.trim_matches('/');
        let mut parts: Vec<&str> = trimmed.split('/').collect();
        parts.pop()?;
        if parts.is_empty() {
            None
        } else {
            Some(format!("/{}", parts.join("/")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> IpfsClient {
        IpfsClient::new(uri, "user", "pw").unwrap()
    }

    #[test]
    fn test_gateway_url() {
        let ipfs = client("https://ipfs-admin.example.org/");
        assert_eq!(
            ipfs.gateway_url("bafy123", None),
            "https://ipfs.portal.mardi4nfdi.de/ipfs/bafy123"
        );
        assert_eq!(
            ipfs.gateway_url("bafy123", Some("https://my-gw.example.org/")),
            "https://my-gw.example.org/ipfs/bafy123"
        );
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(IpfsClient::parent_dir("/tags/file.txt"), Some("/tags".to_string()));
        assert_eq!(
            IpfsClient::parent_dir("/a/b/c.txt"),
            Some("/a/b".to_string())
        );
        assert_eq!(IpfsClient::parent_dir("/file.txt"), None);
    }

    #[tokio::test]
    async fn test_add_file_parses_first_ndjson_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/add"))
            .and(query_param("cid-version", "1"))
            .and(query_param("pin", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"Name\":\"f\",\"Hash\":\"bafyfirst\"}\n{\"Name\":\"wrap\",\"Hash\":\"bafywrap\"}\n",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"content").unwrap();

        let cid = client(&server.uri()).add_file(file.path(), 1, true).await;
        assert_eq!(cid.as_deref(), Some("bafyfirst"));
    }

    #[tokio::test]
    async fn test_add_file_failure_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/add"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"content").unwrap();

        assert_eq!(client(&server.uri()).add_file(file.path(), 1, false).await, None);
    }

    #[tokio::test]
    async fn test_pin_and_unpin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/add"))
            .and(query_param("arg", "bafy123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/rm"))
            .and(query_param("arg", "bafy123"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not pinned"))
            .expect(1)
            .mount(&server)
            .await;

        let ipfs = client(&server.uri());
        assert!(ipfs.pin("bafy123").await);
        assert!(!ipfs.unpin("bafy123").await);
    }

    #[tokio::test]
    async fn test_list_pins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/pin/ls"))
            .and(query_param("type", "recursive"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Keys": {
                    "bafyA": {"Type": "recursive"},
                    "bafyB": {"Type": "recursive"}
                }
            })))
            .mount(&server)
            .await;

        let pins = client(&server.uri()).list_pins("recursive").await.unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].cid, "bafyA");
        assert_eq!(pins[0].pin_type, "recursive");
    }

    #[tokio::test]
    async fn test_list_local_refs_parses_ndjson() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/refs/local"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"Ref\":\"bafyA\"}\n{\"Ref\":\"bafyB\"}\n\n"),
            )
            .mount(&server)
            .await;

        let refs = client(&server.uri()).list_local_refs().await.unwrap();
        assert_eq!(refs, vec!["bafyA".to_string(), "bafyB".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_mfs_path_missing_is_benign() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/rm"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("{\"Message\":\"file does not exist\",\"Code\":0}"),
            )
            .mount(&server)
            .await;

        assert!(client(&server.uri()).remove_mfs_path("/tags/gone.txt").await);
    }

    #[tokio::test]
    async fn test_remove_mfs_path_other_error_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/rm"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        assert!(!client(&server.uri()).remove_mfs_path("/tags/x.txt").await);
    }

    #[tokio::test]
    async fn test_tag_file_existing_path_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/mkdir"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/cp"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("{\"Message\":\"cp: cannot put node in path: File already exists\"}"),
            )
            .mount(&server)
            .await;

        assert!(
            !client(&server.uri())
                .tag_file("bafy123", "/tags/db.sqlite", false)
                .await
        );
    }

    #[tokio::test]
    async fn test_tag_file_creates_parent_and_copies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/mkdir"))
            .and(query_param("arg", "/tags"))
            .and(query_param("parents", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/cp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            client(&server.uri())
                .tag_file("bafy123", "/tags/db.sqlite", false)
                .await
        );
    }

    #[tokio::test]
    async fn test_download_by_tag_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/read"))
            .and(query_param("arg", "/tags/db.sqlite"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tagged bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("db.sqlite");
        assert!(client(&server.uri()).download_by_tag("/tags/db.sqlite", &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"tagged bytes");
    }

    #[tokio::test]
    async fn test_download_file_uses_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafy123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cid bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let ok = client("https://ipfs-admin.example.org")
            .download_file("bafy123", &dest, Some(&server.uri()))
            .await;
        assert!(ok);
        assert_eq!(std::fs::read(&dest).unwrap(), b"cid bytes");
    }

    #[tokio::test]
    async fn test_list_tags_stats_each_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/ls"))
            .and(query_param("arg", "/tags"))
            .and(query_param("long", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Entries": [{"Name": "db.sqlite"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v0/files/stat"))
            .and(query_param("arg", "/tags/db.sqlite"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Hash": "bafydb",
                "Size": 4096,
                "Mtime": 1700000000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tags = client(&server.uri()).list_tags("/tags").await.unwrap();
        assert_eq!(
            tags,
            vec![TaggedPath {
                path: "/tags/db.sqlite".to_string(),
                cid: "bafydb".to_string(),
                size: 4096,
                mtime: 1700000000,
            }]
        );
    }
}
