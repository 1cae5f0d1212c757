//! Digest-pinned container image references.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ChqError, Result};

/// Upstream repository the base image is pinned from.
pub const DEFAULT_REPOSITORY: &str = "index.docker.io/clickhouse/clickhouse-server";

/// Pin used when neither the config file nor the environment supply one.
/// Refresh with `chq pin --write`.
pub const DEFAULT_PIN: &str = "docker.io/clickhouse/clickhouse-server@sha256:2935c2d30c49117a979a1bacd513423d0c339c933cfdfd8a7a99c23af6a7cdf3";

fn digest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^sha256:[0-9a-f]{64}$").expect("digest pattern is a valid regex")
    })
}

/// A content-addressed image reference: `repository[:tag]@sha256:<hex>`.
///
/// Mutable tags alone are rejected so every run fetches identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    name: String,
    digest: String,
}

impl ImageRef {
    /// Parses and validates a pinned reference.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let (name, digest) = reference.rsplit_once('@').ok_or_else(|| {
            ChqError::config(format!(
                "Image reference '{reference}' is not pinned; expected NAME@sha256:DIGEST"
            ))
        })?;

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ChqError::config(format!(
                "Image reference '{reference}' has an invalid name"
            )));
        }

        if !digest_pattern().is_match(digest) {
            return Err(ChqError::config(format!(
                "Image reference '{reference}' has an invalid digest; expected sha256:<64 hex chars>"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            digest: digest.to_string(),
        })
    }

    /// Image name, possibly including a tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `sha256:` digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::parse(DEFAULT_PIN).expect("default pin is a valid reference")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}

impl FromStr for ImageRef {
    type Err = ChqError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = ChqError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.to_string()
    }
}
