//! Credential handling.
//!
//! A [`SecretRef`] names where a credential lives; a [`SecretStore`] turns it
//! into a [`Secret`] on demand. Plaintext only ever exists inside `Secret`,
//! which redacts itself when formatted and zeroes its memory on drop.

mod mock;
mod store;

pub use mock::{FailingSecretStore, StaticSecretStore};
pub use store::{DefaultSecretStore, KEYRING_SERVICE};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{ChqError, Result};

/// A resolved credential.
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Wraps a plaintext value.
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(Zeroizing::new(plaintext.into()))
    }

    /// Returns the plaintext. Never log or persist the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Where a credential can be fetched from.
///
/// In TOML this is a single-key table, e.g. `password = { env = "CH_PASSWORD" }`.
/// On the command line it is `kind:value`, e.g. `env:CH_PASSWORD`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretRef {
    /// An environment variable.
    Env(String),
    /// A file whose contents (minus one trailing newline) are the secret.
    File(PathBuf),
    /// An OS keyring entry under the `chq` service.
    Keyring(String),
    /// An inline value. Intended for tests and throwaway setups.
    Plain(String),
}

impl SecretRef {
    /// Short description that is safe to log.
    pub fn describe(&self) -> String {
        match self {
            Self::Env(name) => format!("env:{name}"),
            Self::File(path) => format!("file:{}", path.display()),
            Self::Keyring(key) => format!("keyring:{key}"),
            Self::Plain(_) => "plain:[REDACTED]".to_string(),
        }
    }
}

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretRef({})", self.describe())
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl FromStr for SecretRef {
    type Err = ChqError;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, value) = s.split_once(':').ok_or_else(|| {
            ChqError::config("Secret reference must look like env:NAME, file:PATH, keyring:KEY or plain:VALUE")
        })?;

        if value.is_empty() && kind != "plain" {
            return Err(ChqError::config(format!(
                "Secret reference '{kind}:' is missing its value"
            )));
        }

        match kind {
            "env" => Ok(Self::Env(value.to_string())),
            "file" => Ok(Self::File(PathBuf::from(value))),
            "keyring" => Ok(Self::Keyring(value.to_string())),
            "plain" => Ok(Self::Plain(value.to_string())),
            other => Err(ChqError::config(format!(
                "Unknown secret kind '{other}'. Expected env, file, keyring or plain"
            ))),
        }
    }
}

/// Resolves secret references into plaintext.
///
/// Each call performs a fresh lookup; implementations must not cache the
/// plaintext on the caller's behalf.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the credential behind `reference`.
    async fn resolve(&self, reference: &SecretRef) -> Result<Secret>;
}
