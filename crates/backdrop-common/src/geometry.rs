//! Surface and viewport geometry.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Logical size of a drawing surface in device-independent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    /// Width in logical pixels.
    pub width: f32,
    /// Height in logical pixels.
    pub height: f32,
}

impl SurfaceSize {
    /// Creates a new surface size. Negative or non-finite extents collapse
    /// to zero.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: sanitize_extent(width),
            height: sanitize_extent(height),
        }
    }

    /// Surface area in square logical pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Centre point of the surface.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Whether a point lies in `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.x < self.width && point.y >= 0.0 && point.y < self.height
    }

    /// Whether the surface has no drawable area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Length of the surface diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f32 {
        self.width.hypot(self.height)
    }
}

/// Host viewport as reported by the windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Logical width in device-independent pixels.
    pub width: f32,
    /// Logical height in device-independent pixels.
    pub height: f32,
    /// Device pixel ratio (backing pixels per logical pixel).
    pub device_pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    /// Creates a viewport.
    #[must_use]
    pub const fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Logical size of the viewport.
    #[must_use]
    pub fn logical_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }

    /// Device pixel ratio, falling back to 1.0 when the host reports an
    /// unusable value.
    #[must_use]
    pub fn effective_ratio(&self) -> f32 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }

    /// Backing-store size in physical pixels (logical size x ratio).
    #[must_use]
    pub fn backing_size(&self) -> (u32, u32) {
        let size = self.logical_size();
        let ratio = self.effective_ratio();
        (
            (size.width * ratio).round() as u32,
            (size.height * ratio).round() as u32,
        )
    }
}

fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_area() {
        let size = SurfaceSize::new(800.0, 600.0);
        assert_eq!(size.area(), 480_000.0);
        assert_eq!(size.center(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_surface_sanitizes_extents() {
        let size = SurfaceSize::new(-5.0, f32::NAN);
        assert_eq!(size.width, 0.0);
        assert_eq!(size.height, 0.0);
        assert!(size.is_empty());
    }

    #[test]
    fn test_surface_contains_is_half_open() {
        let size = SurfaceSize::new(10.0, 10.0);
        assert!(size.contains(Vec2::ZERO));
        assert!(size.contains(Vec2::new(9.99, 9.99)));
        assert!(!size.contains(Vec2::new(10.0, 5.0)));
        assert!(!size.contains(Vec2::new(5.0, -0.01)));
    }

    #[test]
    fn test_backing_size_scales_by_ratio() {
        let viewport = Viewport::new(800.0, 600.0, 2.0);
        assert_eq!(viewport.backing_size(), (1600, 1200));

        let fractional = Viewport::new(801.0, 601.0, 1.5);
        assert_eq!(fractional.backing_size(), (1202, 902));
    }

    #[test]
    fn test_invalid_ratio_falls_back() {
        let viewport = Viewport::new(100.0, 100.0, 0.0);
        assert_eq!(viewport.effective_ratio(), 1.0);
        assert_eq!(viewport.backing_size(), (100, 100));

        let viewport = Viewport::new(100.0, 100.0, f32::INFINITY);
        assert_eq!(viewport.effective_ratio(), 1.0);
    }
}
