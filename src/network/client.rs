//! HTTP client shared by the service wrappers

use crate::config::OutgoingSettings;
use anyhow::Result;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Thin wrapper around one `reqwest::Client` plus the immutable
/// connection configuration a client instance holds: optional Basic
/// Auth credentials set at construction and never mutated.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    auth: Option<(String, String)>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            auth: None,
        })
    }

    /// Attach Basic Auth credentials to every request made through this client
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }

    /// Access the underlying `reqwest::Client` for requests that need
    /// custom headers (the S3 gateway path signs its own).
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// POST with a form-encoded body
    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response> {
        let builder = self.apply_auth(self.client.post(url)).form(form);
        Ok(builder.send().await?)
    }

    /// POST with query parameters and no body (the IPFS API convention)
    pub async fn post_query(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        let builder = self.apply_auth(self.client.post(url)).query(params);
        Ok(builder.send().await?)
    }

    /// POST a multipart form with query parameters
    pub async fn post_multipart(
        &self,
        url: &str,
        params: &[(&str, &str)],
        form: reqwest::multipart::Form,
    ) -> Result<Response> {
        let builder = self
            .apply_auth(self.client.post(url))
            .query(params)
            .multipart(form);
        Ok(builder.send().await?)
    }

    /// POST with a JSON body
    pub async fn post_json(&self, url: &str, json: &serde_json::Value) -> Result<Response> {
        let builder = self.apply_auth(self.client.post(url)).json(json);
        Ok(builder.send().await?)
    }

    /// Simple GET request
    pub async fn get(&self, url: &str) -> Result<Response> {
        let builder = self.apply_auth(self.client.get(url));
        Ok(builder.send().await?)
    }

    /// GET request with query parameters
    pub async fn get_with_params(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        let builder = self.apply_auth(self.client.get(url)).query(params);
        Ok(builder.send().await?)
    }

    /// Stream a response body to a local file in chunks
    pub async fn save_to_file(response: Response, destination: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}
