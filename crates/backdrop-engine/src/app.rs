//! Headless run lifecycle.
//!
//! Builds a particle field on a software canvas, replays the configured
//! frames and host events, then writes the requested artifacts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use backdrop_common::{Color, Viewport};
use backdrop_kernel::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::timing::FrameTiming;

/// Outcome of a headless run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Variant that ran
    pub variant: String,
    /// Frames the engine rendered
    pub frames_rendered: u64,
    /// Particles in the final batch
    pub final_particles: usize,
    /// Live transients at the end of the run
    pub final_transients: usize,
    /// Batch regenerations after the initial one
    pub regenerations: u64,
    /// Theme the final batch was generated for
    pub final_theme: String,
    /// Final logical surface size
    pub final_size: (f32, f32),
    /// Animation time between the first and the last rendered frame
    pub simulated_seconds: f64,
    /// Mean engine time per frame in milliseconds
    pub average_frame_time_ms: f64,
}

/// Host events due before a frame.
struct EventScript<'a> {
    config: &'a HostConfig,
    next_resize: usize,
}

impl<'a> EventScript<'a> {
    fn new(config: &'a HostConfig) -> Self {
        Self {
            config,
            next_resize: 0,
        }
    }

    fn fire(&mut self, frame: u64, viewport: &Watch<Viewport>, theme: &ThemeSource) {
        while let Some(resize) = self.config.resizes.get(self.next_resize) {
            if resize.frame > frame {
                break;
            }
            self.next_resize += 1;
            info!("Frame {frame}: resize to {}x{}", resize.width, resize.height);
            viewport.set(Viewport::new(
                resize.width,
                resize.height,
                self.config.device_pixel_ratio,
            ));
        }

        let every = self.config.theme_toggle_every;
        if every > 0 && frame > 0 && frame % every == 0 {
            let key = toggle_theme(theme);
            info!("Frame {frame}: theme toggled to '{key}'");
        }
    }
}

/// Runs the configured scenario and returns its summary.
pub fn run(config: &HostConfig) -> Result<RunSummary> {
    let kind = config.variant_kind();
    let viewport = Watch::new(Viewport::new(
        config.width,
        config.height,
        config.device_pixel_ratio,
    ));
    let theme = theme_source(ThemeKey::new(&config.theme));

    let mut field_config = kind.preset();
    if let Some(seed) = config.seed {
        field_config = field_config.with_seed(seed);
    }
    if kind.is_theme_sensitive() {
        field_config = field_config.with_theme(theme.clone());
    }
    debug!("Field configuration: {field_config:?}");

    let driver = ManualFrameDriver::new();
    let surface = Surface::new(viewport.clone(), PixelCanvas::new(1, 1));
    let field = ParticleField::create(surface, field_config, Arc::new(driver.clone()))
        .with_context(|| format!("Failed to start '{kind}' field"))?;

    info!(
        "Running '{}' for {} frames at {} fps{}",
        kind,
        config.frames,
        config.target_fps,
        if config.realtime { " (realtime)" } else { "" }
    );

    let mut timing = FrameTiming::new(config.target_fps).with_realtime(config.realtime);
    let mut script = EventScript::new(config);
    let dt = timing.frame_dt();

    for frame in 0..config.frames {
        script.fire(frame, &viewport, &theme);
        timing.begin_frame();
        driver.advance(dt);
        timing.end_frame();

        if frame > 0 && frame % 120 == 0 {
            debug!(
                "Frame {frame}: {} particles, {:.3} ms/frame",
                field.particle_count(),
                timing.recent_frame_time_ms()
            );
        }
    }

    if let Some(path) = &config.snapshot {
        match write_snapshot(&field, &viewport.get(), path) {
            Ok(()) => info!("Snapshot written to {}", path.display()),
            Err(e) => warn!("Failed to write snapshot: {e:#}"),
        }
    }

    let size = viewport.get().logical_size();
    let stats = field.stats();
    let summary = RunSummary {
        variant: kind.name().to_string(),
        frames_rendered: stats.frames_rendered,
        final_particles: stats.particles,
        final_transients: stats.transients,
        regenerations: stats.generation.saturating_sub(1),
        final_theme: field.theme().to_string(),
        final_size: (size.width, size.height),
        simulated_seconds: f64::from(field.last_clock().elapsed),
        average_frame_time_ms: timing.average_frame_time_ms(),
    };

    if let Some(path) = &config.summary {
        write_summary(&summary, path)?;
        info!("Summary written to {}", path.display());
    }

    info!(
        "Run complete: {} frames, {} particles, {} regenerations, {:.3} ms/frame",
        summary.frames_rendered,
        summary.final_particles,
        summary.regenerations,
        summary.average_frame_time_ms
    );

    field.destroy();
    Ok(summary)
}

/// Composites the page background and the particle layer into a PNG.
fn write_snapshot(
    field: &ParticleField<PixelCanvas>,
    viewport: &Viewport,
    path: &Path,
) -> Result<()> {
    let layer = field
        .with_surface(|surface| surface.canvas().map(|canvas| canvas.image().clone()))
        .context("Field has no canvas")?;

    let transparent = StaticBackgroundLayer::Solid(Color::TRANSPARENT);
    let background = field.background();
    let page = paint_background(background.as_deref().unwrap_or(&transparent), viewport);

    let image = composite(&page, &layer, field.composite_opacity());
    save_png(&image, path)?;
    Ok(())
}

fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
