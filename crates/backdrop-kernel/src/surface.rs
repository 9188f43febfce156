//! The drawing surface.

use backdrop_common::{SurfaceSize, Viewport};
use tracing::debug;

use crate::canvas::Canvas;
use crate::signal::Watch;

/// A drawing target bound to a host viewport.
///
/// The canvas is optional: a surface whose 2D capability is missing is
/// represented by `canvas: None`, and an engine created on it comes up
/// disabled.
#[derive(Debug)]
pub struct Surface<C: Canvas> {
    viewport: Watch<Viewport>,
    canvas: Option<C>,
    logical: SurfaceSize,
    backing: (u32, u32),
}

impl<C: Canvas> Surface<C> {
    /// Binds `canvas` to a viewport.
    #[must_use]
    pub fn new(viewport: Watch<Viewport>, canvas: C) -> Self {
        Self {
            viewport,
            canvas: Some(canvas),
            logical: SurfaceSize::default(),
            backing: (0, 0),
        }
    }

    /// A surface that cannot yield a drawing context.
    #[must_use]
    pub fn unavailable(viewport: Watch<Viewport>) -> Self {
        Self {
            viewport,
            canvas: None,
            logical: SurfaceSize::default(),
            backing: (0, 0),
        }
    }

    /// Whether a drawing context is present.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.canvas.is_some()
    }

    /// The viewport watch this surface follows.
    #[must_use]
    pub fn viewport(&self) -> &Watch<Viewport> {
        &self.viewport
    }

    /// Logical size as of the last [`Self::sync`].
    #[must_use]
    pub fn logical_size(&self) -> SurfaceSize {
        self.logical
    }

    /// Backing-store size in physical pixels as of the last [`Self::sync`].
    #[must_use]
    pub fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    /// The canvas, if any.
    #[must_use]
    pub fn canvas(&self) -> Option<&C> {
        self.canvas.as_ref()
    }

    /// Mutable access to the canvas, if any.
    pub fn canvas_mut(&mut self) -> Option<&mut C> {
        self.canvas.as_mut()
    }

    /// Takes the canvas out, leaving the surface unavailable.
    pub fn release(&mut self) -> Option<C> {
        self.canvas.take()
    }

    /// Re-reads the viewport and reallocates the backing store.
    /// Returns the viewport that was read.
    pub fn sync(&mut self) -> Viewport {
        let viewport = self.viewport.get();
        self.logical = viewport.logical_size();
        self.backing = viewport.backing_size();

        if let Some(canvas) = self.canvas.as_mut() {
            canvas.resize_backing(self.backing.0, self.backing.1);
        }

        debug!(
            "Surface synced: logical {}x{}, backing {}x{} (dpr {})",
            self.logical.width,
            self.logical.height,
            self.backing.0,
            self.backing.1,
            viewport.effective_ratio()
        );
        viewport
    }
}
