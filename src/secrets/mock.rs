//! Secret stores for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Secret, SecretRef, SecretStore};
use crate::error::{ChqError, Result};

/// Returns the same plaintext for every reference and counts lookups.
#[derive(Debug)]
pub struct StaticSecretStore {
    plaintext: String,
    lookups: AtomicUsize,
}

impl StaticSecretStore {
    /// Creates a store that always yields `plaintext`.
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self {
            plaintext: plaintext.into(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of times `resolve` has been called.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn resolve(&self, _reference: &SecretRef) -> Result<Secret> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Secret::new(self.plaintext.as_str()))
    }
}

/// A secret store whose lookups always fail.
#[derive(Debug, Default)]
pub struct FailingSecretStore;

#[async_trait]
impl SecretStore for FailingSecretStore {
    async fn resolve(&self, reference: &SecretRef) -> Result<Secret> {
        Err(ChqError::secret(format!("{reference} is unavailable")))
    }
}
