//! Settings structures for the workflow tool clients

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings, one section per remote service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kg: KgSettings,
    pub ipfs: IpfsSettings,
    pub lakefs: LakeFsSettings,
    pub outgoing: OutgoingSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (MARDI_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("MARDI_KG_API_URL") {
            self.kg.api_url = val;
        }
        if let Ok(val) = std::env::var("MARDI_IPFS_API_URL") {
            self.ipfs.api_url = val;
        }
        if let Ok(val) = std::env::var("MARDI_IPFS_GATEWAY_URL") {
            self.ipfs.gateway_url = val;
        }
        if let Ok(val) = std::env::var("MARDI_LAKEFS_ENDPOINT") {
            self.lakefs.endpoint = val;
        }
    }
}

/// Knowledge-graph search endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KgSettings {
    /// Base URL of the MediaWiki API
    pub api_url: String,
    /// Search namespace (the portal keeps publications in 4206)
    pub namespace: String,
}

impl Default for KgSettings {
    fn default() -> Self {
        Self {
            api_url: "https://portal.mardi4nfdi.de/w/api.php".to_string(),
            namespace: "4206".to_string(),
        }
    }
}

/// IPFS node and gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfsSettings {
    /// Base URL of the authenticated IPFS API host
    pub api_url: String,
    /// Public gateway for unauthenticated downloads
    pub gateway_url: String,
}

impl Default for IpfsSettings {
    fn default() -> Self {
        Self {
            api_url: "https://ipfs-admin.portal.mardi4nfdi.de".to_string(),
            gateway_url: "https://ipfs.portal.mardi4nfdi.de".to_string(),
        }
    }
}

/// lakeFS endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LakeFsSettings {
    /// lakeFS host, serving both the REST API and the S3 gateway
    pub endpoint: String,
}

impl Default for LakeFsSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://lake-bioinfmed.zib.de".to_string(),
        }
    }
}

/// Outgoing request settings shared by all clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Request timeout in seconds
    pub request_timeout: f64,
    /// Verify TLS certificates
    pub verify_ssl: bool,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            verify_ssl: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.kg.api_url.contains("api.php"));
        assert_eq!(settings.kg.namespace, "4206");
        assert!(settings.outgoing.verify_ssl);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "kg:\n  namespace: \"0\"\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.kg.namespace, "0");
        assert!(settings.kg.api_url.contains("mardi4nfdi.de"));
        assert_eq!(settings.outgoing.request_timeout, 30.0);
    }
}
