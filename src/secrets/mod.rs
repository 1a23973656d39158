//! Credential lookup module
//!
//! Credentials are resolved by logical name (`"lakefs"`, `"ipfs"`,
//! `"mardi-kg"`) through an ordered chain of providers; the first provider
//! that returns a full pair wins. Partial credentials count as absent:
//! a missing key is logged, never raised.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A user/password pair looked up by logical name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// A single source of credentials
pub trait CredentialProvider: Send + Sync {
    /// Look up credentials by logical name; `None` when the provider has
    /// no full pair for this name.
    fn lookup(&self, name: &str) -> Option<Credentials>;
}

/// Primary store: process environment.
///
/// Reads `<NAME>_USER` / `<NAME>_PASSWORD` with the logical name
/// uppercased and dashes mapped to underscores.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    fn env_key(name: &str, suffix: &str) -> String {
        format!("{}_{}", name.to_uppercase().replace('-', "_"), suffix)
    }
}

impl CredentialProvider for EnvCredentials {
    fn lookup(&self, name: &str) -> Option<Credentials> {
        let user = std::env::var(Self::env_key(name, "USER")).ok();
        let password = std::env::var(Self::env_key(name, "PASSWORD")).ok();

        match (user, password) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            _ => {
                info!("Could not read {} credentials from the environment.", name);
                None
            }
        }
    }
}

/// Fallback store: a local `key=value` file.
///
/// One pair per line; the first `=` splits key from value, lines without
/// `=` are skipped. Wanted keys are `<name>-user` and `<name>-password`.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse(content: &str) -> HashMap<String, String> {
        content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.trim().split_once('=')?;
                Some((key.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

impl CredentialProvider for FileCredentials {
    fn lookup(&self, name: &str) -> Option<Credentials> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not get {} credentials from {}: {}",
                    name,
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        let entries = Self::parse(&content);
        let user = entries.get(&format!("{}-user", name));
        let password = entries.get(&format!("{}-password", name));

        match (user, password) {
            (Some(user), Some(password)) => Some(Credentials {
                user: user.clone(),
                password: password.clone(),
            }),
            _ => {
                warn!(
                    "Missing {} credentials in {}.",
                    name,
                    self.path.display()
                );
                None
            }
        }
    }
}

/// Ordered list of providers; first success wins
#[derive(Default)]
pub struct CredentialChain {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the end of the chain
    pub fn with(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// The conventional chain: environment first, then the secrets file
    pub fn standard<P: AsRef<Path>>(secrets_path: P) -> Self {
        Self::new()
            .with(EnvCredentials)
            .with(FileCredentials::new(secrets_path))
    }

    /// A chain that only consults the secrets file
    pub fn local_only<P: AsRef<Path>>(secrets_path: P) -> Self {
        Self::new().with(FileCredentials::new(secrets_path))
    }
}

impl CredentialProvider for CredentialChain {
    fn lookup(&self, name: &str) -> Option<Credentials> {
        self.providers
            .iter()
            .find_map(|provider| provider.lookup(name))
    }
}
