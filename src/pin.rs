//! Base image pin maintenance.
//!
//! Runs are reproducible because they use a digest-pinned image. These helpers
//! look up the digest currently behind the configured repository and write it
//! back into the config file.

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::image::ImageRef;
use crate::runtime::ContainerRuntime;

/// Resolves the current digest-pinned reference for `repository`.
pub async fn resolve_latest(runtime: &dyn ContainerRuntime, repository: &str) -> Result<ImageRef> {
    let pin = runtime.resolve_pin(repository).await?;
    info!("{} resolves to {}", repository, pin);
    Ok(pin)
}

/// Stores `pin` in the config file at `path`, keeping everything else intact.
///
/// Returns false if the file already carried that pin.
pub fn write_pin(path: &Path, pin: &ImageRef) -> Result<bool> {
    let mut config = Config::load_from_file(path)?;
    if path.exists() && &config.image.pin == pin {
        return Ok(false);
    }

    config.image.pin = pin.clone();
    config.save_to_file(path)?;
    info!("Wrote pin {} to {}", pin, path.display());
    Ok(true)
}
