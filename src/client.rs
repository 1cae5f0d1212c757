//! ClickHouse query runner.
//!
//! A [`Clickhouse`] resolves its password and builds the client command line
//! exactly once, in [`Clickhouse::connect`]. A value of this type therefore
//! always holds a ready command line; every [`Clickhouse::csv`] call reuses it
//! and only varies the query fed on stdin.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{ChqError, Result};
use crate::image::ImageRef;
use crate::runtime::ContainerRuntime;
use crate::secrets::SecretStore;
use crate::shell::ShellCommand;

/// Name the query output is redirected to.
///
/// Each run gets its own file derived from it (`out-<random>.csv`) under the
/// runtime's work dir.
pub const CSV_OUTPUT_PATH: &str = "out.csv";

/// A configured ClickHouse client.
///
/// The cached command line is read-only, so one instance can serve
/// concurrent `csv` calls.
///
/// The password is read once. If it is rotated afterwards, build a new
/// instance; this one keeps using the old value.
pub struct Clickhouse {
    config: ConnectionConfig,
    image: ImageRef,
    command: ShellCommand,
    runtime: Arc<dyn ContainerRuntime>,
}

impl std::fmt::Debug for Clickhouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clickhouse")
            .field("config", &self.config)
            .field("image", &self.image)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl Clickhouse {
    /// Resolves the password and builds the client command line.
    ///
    /// Fails with a secret resolution error if the password cannot be
    /// fetched, or a quoting error if a value cannot be shell-quoted.
    pub async fn connect(
        config: ConnectionConfig,
        image: ImageRef,
        secrets: &dyn SecretStore,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self> {
        let password = secrets.resolve(config.password()).await.map_err(|e| match e {
            ChqError::SecretResolution(_) => e,
            other => ChqError::secret(other.to_string()),
        })?;

        let command = ShellCommand::clickhouse_client(&config, &password)?;
        drop(password);

        info!("Configured ClickHouse client for {}", config.display_string());
        Ok(Self {
            config,
            image,
            command,
            runtime,
        })
    }

    /// Sends a SQL query and returns the path of the CSV file holding the result.
    ///
    /// The file is new for every call and belongs to the caller, who is
    /// responsible for removing it.
    ///
    /// The query is forwarded verbatim, even when empty. Runtime failures are
    /// returned unchanged apart from credential redaction; nothing is retried.
    pub async fn csv(&self, query: &str, cancel: &CancellationToken) -> Result<PathBuf> {
        debug!(
            "Sending {} byte query to {}",
            query.len(),
            self.config.display_string()
        );

        self.runtime
            .run(
                &self.image,
                &self.command,
                query,
                Path::new(CSV_OUTPUT_PATH),
                cancel,
            )
            .await
            .map_err(|e| self.redact_error(e))
    }

    /// Connection this client talks to.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Image the client runs in.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Scrubs the credential from any message an error carries.
    fn redact_error(&self, err: ChqError) -> ChqError {
        match err {
            ChqError::Execution(msg) => ChqError::Execution(self.command.redact(&msg)),
            ChqError::SecretResolution(msg) => {
                ChqError::SecretResolution(self.command.redact(&msg))
            }
            ChqError::Quoting(msg) => ChqError::Quoting(self.command.redact(&msg)),
            ChqError::Config(msg) => ChqError::Config(self.command.redact(&msg)),
            ChqError::Internal(msg) => ChqError::Internal(self.command.redact(&msg)),
            ChqError::Cancelled => ChqError::Cancelled,
        }
    }
}
