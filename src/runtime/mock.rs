//! Container runtimes for testing.
//!
//! `MockRuntime` records every invocation and writes a canned response to a
//! fresh output file, as a real runtime would; `FailingRuntime` fails every call.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{create_output_file, keep_output, ContainerRuntime};
use crate::error::{ChqError, Result};
use crate::image::ImageRef;
use crate::shell::ShellCommand;

/// One recorded `run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Image the script ran in.
    pub image: ImageRef,
    /// The exact script, credential included.
    pub script: String,
    /// Data supplied on stdin.
    pub stdin: String,
    /// Requested stdout redirect path.
    pub stdout_path: PathBuf,
}

/// A runtime that never starts a container.
#[derive(Debug)]
pub struct MockRuntime {
    output_dir: PathBuf,
    response: String,
    pin: ImageRef,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockRuntime {
    /// Creates a mock that writes outputs under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            response: String::new(),
            pin: ImageRef::default(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Sets the content written for every run.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Sets the reference returned by `resolve_pin`.
    pub fn with_pin(mut self, pin: ImageRef) -> Self {
        self.pin = pin;
        self
    }

    /// Returns a copy of all recorded invocations.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn run(
        &self,
        image: &ImageRef,
        command: &ShellCommand,
        stdin: &str,
        stdout_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(ChqError::Cancelled);
        }

        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Invocation {
                image: image.clone(),
                script: command.expose().to_string(),
                stdin: stdin.to_string(),
                stdout_path: stdout_path.to_path_buf(),
            });

        let output_path = create_output_file(&self.output_dir, stdout_path)?.into_temp_path();
        tokio::fs::write(&output_path, &self.response)
            .await
            .map_err(|e| ChqError::execution(format!("Failed to write mock output: {e}")))?;
        keep_output(output_path)
    }

    async fn resolve_pin(&self, _repository: &str) -> Result<ImageRef> {
        Ok(self.pin.clone())
    }
}

/// A runtime whose every call fails, echoing the script like a noisy CLI would.
#[derive(Debug, Default)]
pub struct FailingRuntime;

#[async_trait]
impl ContainerRuntime for FailingRuntime {
    async fn run(
        &self,
        _image: &ImageRef,
        command: &ShellCommand,
        _stdin: &str,
        _stdout_path: &Path,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        Err(ChqError::execution(format!(
            "sh -c {} exited with status 210",
            command.expose()
        )))
    }

    async fn resolve_pin(&self, repository: &str) -> Result<ImageRef> {
        Err(ChqError::execution(format!("failed to pull {repository}")))
    }
}
