//! Default secret store: environment, files, and the OS keyring.

use async_trait::async_trait;
use keyring::Entry;
use tracing::debug;
use zeroize::Zeroizing;

use super::{Secret, SecretRef, SecretStore};
use crate::error::{ChqError, Result};

/// Keyring service name under which connection passwords are stored.
pub const KEYRING_SERVICE: &str = "chq";

/// Resolves every [`SecretRef`] kind without any caching.
#[derive(Debug, Clone, Default)]
pub struct DefaultSecretStore;

impl DefaultSecretStore {
    /// Creates a new store.
    pub fn new() -> Self {
        Self
    }

    fn read_env(name: &str) -> Result<Secret> {
        match std::env::var(name) {
            Ok(value) => Ok(Secret::new(value)),
            Err(std::env::VarError::NotPresent) => Err(ChqError::secret(format!(
                "environment variable {name} is not set"
            ))),
            Err(std::env::VarError::NotUnicode(_)) => Err(ChqError::secret(format!(
                "environment variable {name} is not valid UTF-8"
            ))),
        }
    }

    async fn read_file(path: &std::path::Path) -> Result<Secret> {
        let content = Zeroizing::new(tokio::fs::read_to_string(path).await.map_err(|e| {
            ChqError::secret(format!("Failed to read secret file {}: {e}", path.display()))
        })?);
        Ok(Secret::new(strip_one_newline(content.as_str())))
    }

    async fn read_keyring(key: &str) -> Result<Secret> {
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(KEYRING_SERVICE, &key).map_err(|e| {
                ChqError::secret(format!("Failed to access keyring entry '{key}': {e}"))
            })?;

            match entry.get_password() {
                Ok(password) => Ok(Secret::new(password)),
                Err(keyring::Error::NoEntry) => Err(ChqError::secret(format!(
                    "No keyring entry '{key}' for service '{KEYRING_SERVICE}'"
                ))),
                Err(e) => Err(ChqError::secret(format!(
                    "Failed to retrieve keyring entry '{key}': {e}"
                ))),
            }
        })
        .await
        .map_err(|e| ChqError::internal(format!("Keyring lookup task failed: {e}")))?
    }
}

/// Removes a single trailing `\n` or `\r\n`, as left by editors and `echo`.
fn strip_one_newline(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .unwrap_or(s)
}

#[async_trait]
impl SecretStore for DefaultSecretStore {
    async fn resolve(&self, reference: &SecretRef) -> Result<Secret> {
        debug!("Resolving secret {}", reference);
        match reference {
            SecretRef::Env(name) => Self::read_env(name),
            SecretRef::File(path) => Self::read_file(path).await,
            SecretRef::Keyring(key) => Self::read_keyring(key).await,
            SecretRef::Plain(value) => Ok(Secret::new(value.as_str())),
        }
    }
}
