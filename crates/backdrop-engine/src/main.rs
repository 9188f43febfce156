//! # Backdrop
//!
//! Headless host for Backdrop particle fields.
//!
//! Loads a run description from TOML, drives a field frame by frame on a
//! software canvas, and writes a PNG snapshot and a JSON summary.
//!
//! ```text
//! backdrop [config.toml]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod timing;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{HostConfig, CONFIG_FILE};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("backdrop=info".parse()?))
        .init();

    info!("Backdrop {}", env!("CARGO_PKG_VERSION"));

    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);

    let mut config = HostConfig::load_from(&path);
    config.validate();

    info!("Configuration loaded:");
    info!(
        "  Surface: {}x{} @{}x",
        config.width, config.height, config.device_pixel_ratio
    );
    info!("  Variant: {}", config.variant);
    info!("  Frames: {} at {} fps", config.frames, config.target_fps);

    let summary = app::run(&config)?;
    info!("{}", serde_json::to_string(&summary)?);

    info!("Backdrop shutdown complete");
    Ok(())
}
