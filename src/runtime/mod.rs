//! Container runtime abstraction.
//!
//! The query runner only needs two things from a container engine: run a
//! shell script in a pinned image with a given stdin, capturing stdout into a
//! file, and resolve a repository to its current digest-pinned reference.

mod docker;
mod mock;

pub use docker::{DockerRuntime, SCRIPT_ENV_VAR};
pub use mock::{FailingRuntime, Invocation, MockRuntime};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::error::{ChqError, Result};
use crate::image::ImageRef;
use crate::shell::ShellCommand;

/// Trait defining the interface for container runtimes.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runs `command` with `sh -c` inside `image`.
    ///
    /// `stdin` is fed to the script and its standard output is redirected to
    /// `stdout_path`. Every run writes to a fresh host file named after
    /// `stdout_path`, so concurrent or later runs never touch an earlier
    /// result. The returned file belongs to the caller.
    ///
    /// A non-zero exit status is an execution error. When `cancel` fires the
    /// run is aborted and `ChqError::Cancelled` is returned. No output file
    /// is left behind on failure.
    async fn run(
        &self,
        image: &ImageRef,
        command: &ShellCommand,
        stdin: &str,
        stdout_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    /// Resolves `repository` to the digest-pinned reference of its current image.
    async fn resolve_pin(&self, repository: &str) -> Result<ImageRef>;
}

/// Creates the host file for one run's output under `work_dir`.
///
/// `out.csv` becomes `out-<random>.csv` in the same relative directory. The
/// file is removed when dropped unless kept with [`keep_output`].
pub(crate) fn create_output_file(work_dir: &Path, stdout_path: &Path) -> Result<NamedTempFile> {
    let target = work_dir.join(stdout_path);
    let dir = target.parent().unwrap_or(work_dir);
    std::fs::create_dir_all(dir)
        .map_err(|e| ChqError::execution(format!("Failed to create {}: {e}", dir.display())))?;

    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let suffix = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    tempfile::Builder::new()
        .prefix(&format!("{stem}-"))
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| {
            ChqError::execution(format!("Failed to create output file in {}: {e}", dir.display()))
        })
}

/// Hands a finished output file over to the caller.
pub(crate) fn keep_output(path: tempfile::TempPath) -> Result<PathBuf> {
    path.keep()
        .map_err(|e| ChqError::internal(format!("Failed to keep output file: {e}")))
}
