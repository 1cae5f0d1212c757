//! Docker-compatible CLI runtime.
//!
//! Drives `docker` (or any CLI with the same `run`/`pull`/`image inspect`
//! surface, such as `podman`) through `tokio::process`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{create_output_file, keep_output, ContainerRuntime};
use crate::config::RuntimeConfig;
use crate::error::{ChqError, Result};
use crate::image::ImageRef;
use crate::shell::ShellCommand;

/// Environment variable that carries the script into the container.
///
/// The script holds the password, so it is passed through the child's
/// environment rather than its argument list, which any local user can read.
pub const SCRIPT_ENV_VAR: &str = "CHQ_SCRIPT";

/// Maximum number of stderr bytes kept in error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs containers through a Docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    program: String,
    work_dir: PathBuf,
    run_args: Vec<String>,
}

impl DockerRuntime {
    /// Creates a runtime from configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            program: config.program.clone(),
            work_dir: config.work_dir.clone(),
            run_args: config.run_args.clone(),
        }
    }

    /// Arguments for `docker run`, excluding the program itself.
    fn run_arguments(&self, image: &ImageRef, name: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--interactive".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--env".to_string(),
            SCRIPT_ENV_VAR.to_string(),
            "--entrypoint".to_string(),
            "sh".to_string(),
        ];
        args.extend(self.run_args.iter().cloned());
        args.push(image.to_string());
        args.push("-c".to_string());
        args.push(format!("eval \"${SCRIPT_ENV_VAR}\""));
        args
    }

    /// Runs a short-lived CLI command and returns its trimmed stdout.
    async fn capture(&self, args: &[&str]) -> Result<String> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ChqError::execution(format!("Failed to start {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(ChqError::execution(format!(
                "{} {} failed ({}): {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Container name for a run, unique because its output file name is.
fn container_name(output_path: &Path) -> String {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') { c } else { '-' })
        .collect();
    format!("chq-{stem}")
}

/// Returns the last few KB of stderr as text.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(
        &self,
        image: &ImageRef,
        command: &ShellCommand,
        stdin: &str,
        stdout_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let output = create_output_file(&self.work_dir, stdout_path)?;
        let stdout_file = output.as_file().try_clone().map_err(|e| {
            ChqError::execution(format!("Failed to open {}: {e}", output.path().display()))
        })?;
        let output_path = output.into_temp_path();
        let name = container_name(&output_path);

        info!("Running query in {} as {}", image, name);
        let mut child = Command::new(&self.program)
            .args(self.run_arguments(image, &name))
            .env(SCRIPT_ENV_VAR, command.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChqError::execution(format!("Failed to start {}: {e}", self.program)))?;

        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChqError::internal("child stdin was not captured"))?;
        let input = stdin.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            child_stdin.write_all(&input).await?;
            child_stdin.shutdown().await
        });

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| ChqError::execution(format!("Failed to wait for {}: {e}", self.program)))?,
            _ = cancel.cancelled() => {
                warn!("Query cancelled, removing container {}", name);
                writer.abort();
                // Killing the CLI leaves the container running.
                if let Err(e) = self.capture(&["rm", "--force", &name]).await {
                    warn!("Failed to remove container {}: {}", name, e);
                }
                return Err(ChqError::Cancelled);
            }
        };

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Container closed stdin before the whole query was written");
            }
            Ok(Err(e)) => {
                return Err(ChqError::execution(format!("Failed to write query: {e}")));
            }
            Err(e) => {
                return Err(ChqError::internal(format!("stdin writer task failed: {e}")));
            }
        }

        if !output.status.success() {
            return Err(ChqError::execution(format!(
                "container exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let output_path = keep_output(output_path)?;
        debug!("Query output written to {}", output_path.display());
        Ok(output_path)
    }

    async fn resolve_pin(&self, repository: &str) -> Result<ImageRef> {
        info!("Pulling {}", repository);
        self.capture(&["pull", "--quiet", repository]).await?;

        let reference = self
            .capture(&[
                "image",
                "inspect",
                "--format",
                "{{index .RepoDigests 0}}",
                repository,
            ])
            .await?;

        ImageRef::parse(&reference).map_err(|e| {
            ChqError::execution(format!("Unexpected digest for {repository}: {e}"))
        })
    }
}
