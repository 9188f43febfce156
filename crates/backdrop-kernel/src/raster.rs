//! Software rasterizer.
//!
//! [`PixelCanvas`] implements [`DrawContext`] over an RGBA image. Shapes
//! are transformed by the current affine matrix, curves are flattened to
//! polylines and everything is filled with an even-odd scanline pass
//! sampled at pixel centres. Blending is straight-alpha source-over.

use std::path::Path;

use backdrop_common::{BackdropError, BackdropResult, Color};
use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::canvas::{Canvas, DrawContext, PathCommand};

/// Segments used to approximate a full ellipse.
const ELLIPSE_SEGMENTS: usize = 32;

/// Steps used to flatten a quadratic bezier.
const QUAD_STEPS: usize = 8;

/// Steps used to flatten a cubic bezier.
const CUBIC_STEPS: usize = 12;

/// Radius below which circles are splatted onto a single pixel.
const SPLAT_RADIUS: f32 = 0.75;

/// RGBA raster canvas.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    image: RgbaImage,
    transform: Affine2,
    stack: Vec<Affine2>,
}

impl PixelCanvas {
    /// Creates a transparent canvas.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            transform: Affine2::IDENTITY,
            stack: Vec::new(),
        }
    }

    /// The rendered image.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Reads a pixel, or `None` outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.image.width() && y < self.image.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    /// Number of pixels with non-zero alpha.
    #[must_use]
    pub fn painted_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p.0[3] > 0).count()
    }

    fn blend_at(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height())
        {
            return;
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        blend_over(pixel, color, 1.0);
    }

    /// Fills device-space contours with the even-odd rule.
    fn fill_contours(&mut self, contours: &[Vec<Vec2>], color: Color) {
        if color.is_invisible() {
            return;
        }

        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for point in contours.iter().flatten() {
            if !point.is_finite() {
                return;
            }
            min_y = min_y.min(point.y);
            max_y = max_y.max(point.y);
        }
        if min_y > max_y {
            return;
        }

        let height = self.image.height() as i64;
        let width = self.image.width() as i64;
        let row_start = (min_y.floor() as i64).max(0);
        let row_end = (max_y.ceil() as i64).min(height);

        let mut crossings: Vec<f32> = Vec::new();
        for row in row_start..row_end {
            let sample_y = row as f32 + 0.5;
            crossings.clear();

            for contour in contours {
                let n = contour.len();
                if n < 3 {
                    continue;
                }
                for i in 0..n {
                    let a = contour[i];
                    let b = contour[(i + 1) % n];
                    let crosses = (a.y <= sample_y && b.y > sample_y)
                        || (b.y <= sample_y && a.y > sample_y);
                    if crosses {
                        let t = (sample_y - a.y) / (b.y - a.y);
                        crossings.push(a.x + t * (b.x - a.x));
                    }
                }
            }

            crossings.sort_by(f32::total_cmp);
            for span in crossings.chunks_exact(2) {
                let first = ((span[0] - 0.5).ceil() as i64).max(0);
                let last = ((span[1] - 0.5).ceil() as i64).min(width);
                for column in first..last {
                    self.blend_at(column, row, color);
                }
            }
        }
    }

    fn to_device(&self, points: &[Vec2]) -> Vec<Vec2> {
        points
            .iter()
            .map(|p| self.transform.transform_point2(*p))
            .collect()
    }

    fn uniform_scale(&self) -> f32 {
        self.transform.matrix2.determinant().abs().sqrt()
    }
}

impl DrawContext for PixelCanvas {
    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn reset_transform(&mut self) {
        self.transform = Affine2::IDENTITY;
    }

    fn translate(&mut self, offset: Vec2) {
        self.transform = self.transform * Affine2::from_translation(offset);
    }

    fn rotate(&mut self, radians: f32) {
        self.transform = self.transform * Affine2::from_angle(radians);
    }

    fn scale(&mut self, factor: Vec2) {
        self.transform = self.transform * Affine2::from_scale(factor);
    }

    fn clear_rect(&mut self, origin: Vec2, size: Vec2) {
        let corners = self.to_device(&rect_corners(origin, size));
        let (lo, hi) = bounds(&corners);
        let x0 = (lo.x.floor().max(0.0)) as u32;
        let y0 = (lo.y.floor().max(0.0)) as u32;
        let x1 = (hi.x.ceil().max(0.0) as u32).min(self.image.width());
        let y1 = (hi.y.ceil().max(0.0) as u32).min(self.image.height());
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        let contour = self.to_device(&rect_corners(origin, size));
        self.fill_contours(&[contour], color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        if radius <= 0.0 || color.is_invisible() {
            return;
        }
        let device_center = self.transform.transform_point2(center);
        let device_radius = radius * self.uniform_scale();

        if device_radius < SPLAT_RADIUS {
            let coverage = (std::f32::consts::PI * device_radius * device_radius).min(1.0);
            self.blend_at(
                device_center.x.floor() as i64,
                device_center.y.floor() as i64,
                color.fade(coverage),
            );
            return;
        }

        if !device_center.is_finite() || !device_radius.is_finite() {
            return;
        }
        let r2 = device_radius * device_radius;
        let height = i64::from(self.image.height());
        let width = i64::from(self.image.width());
        let row_start = ((device_center.y - device_radius).floor() as i64).max(0);
        let row_end = ((device_center.y + device_radius).ceil() as i64).min(height);
        let col_start = ((device_center.x - device_radius).floor() as i64).max(0);
        let col_end = ((device_center.x + device_radius).ceil() as i64).min(width);
        for row in row_start..row_end {
            let dy = row as f32 + 0.5 - device_center.y;
            for column in col_start..col_end {
                let dx = column as f32 + 0.5 - device_center.x;
                if dx * dx + dy * dy <= r2 {
                    self.blend_at(column, row, color);
                }
            }
        }
    }

    fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, rotation: f32, color: Color) {
        let (sin, cos) = rotation.sin_cos();
        let local: Vec<Vec2> = (0..ELLIPSE_SEGMENTS)
            .map(|i| {
                let theta = i as f32 / ELLIPSE_SEGMENTS as f32 * std::f32::consts::TAU;
                let p = Vec2::new(radii.x * theta.cos(), radii.y * theta.sin());
                center + Vec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos)
            })
            .collect();
        let contour = self.to_device(&local);
        self.fill_contours(&[contour], color);
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Color) {
        let contour = self.to_device(points);
        self.fill_contours(&[contour], color);
    }

    fn fill_path(&mut self, path: &[PathCommand], color: Color) {
        let contours: Vec<Vec<Vec2>> = flatten_path(path)
            .iter()
            .map(|contour| self.to_device(contour))
            .collect();
        self.fill_contours(&contours, color);
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        let direction = to - from;
        let length = direction.length();
        if length <= f32::EPSILON || width <= 0.0 {
            return;
        }
        let normal = Vec2::new(-direction.y, direction.x) / length * (width * 0.5);
        let quad = [from + normal, to + normal, to - normal, from - normal];
        let contour = self.to_device(&quad);
        self.fill_contours(&[contour], color);
    }
}

impl Canvas for PixelCanvas {
    fn resize_backing(&mut self, width: u32, height: u32) {
        debug!("Resizing pixel canvas to {}x{}", width, height);
        self.image = RgbaImage::new(width, height);
        self.transform = Affine2::IDENTITY;
        self.stack.clear();
    }

    fn backing_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Splits a path into closed polylines.
#[must_use]
pub fn flatten_path(path: &[PathCommand]) -> Vec<Vec<Vec2>> {
    let mut contours = Vec::new();
    let mut current: Vec<Vec2> = Vec::new();
    let mut cursor = Vec2::ZERO;

    for command in path {
        match *command {
            PathCommand::MoveTo(p) => {
                if current.len() > 1 {
                    contours.push(std::mem::take(&mut current));
                }
                current.clear();
                current.push(p);
                cursor = p;
            },
            PathCommand::LineTo(p) => {
                if current.is_empty() {
                    current.push(cursor);
                }
                current.push(p);
                cursor = p;
            },
            PathCommand::QuadTo(c, p) => {
                if current.is_empty() {
                    current.push(cursor);
                }
                let start = cursor;
                for step in 1..=QUAD_STEPS {
                    let t = step as f32 / QUAD_STEPS as f32;
                    let u = 1.0 - t;
                    current.push(start * (u * u) + c * (2.0 * u * t) + p * (t * t));
                }
                cursor = p;
            },
            PathCommand::CubicTo(c1, c2, p) => {
                if current.is_empty() {
                    current.push(cursor);
                }
                let start = cursor;
                for step in 1..=CUBIC_STEPS {
                    let t = step as f32 / CUBIC_STEPS as f32;
                    let u = 1.0 - t;
                    current.push(
                        start * (u * u * u)
                            + c1 * (3.0 * u * u * t)
                            + c2 * (3.0 * u * t * t)
                            + p * (t * t * t),
                    );
                }
                cursor = p;
            },
            PathCommand::Close => {
                if current.len() > 1 {
                    cursor = current[0];
                    contours.push(std::mem::take(&mut current));
                }
            },
        }
    }

    if current.len() > 1 {
        contours.push(current);
    }
    contours
}

/// Source-over blend of `color` (scaled by `opacity`) onto `pixel`.
pub fn blend_over(pixel: &mut Rgba<u8>, color: Color, opacity: f32) {
    let src_a = (color.a * opacity).clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let [dr, dg, db, da] = pixel.0;
    let dst_a = f32::from(da) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        pixel.0 = [0, 0, 0, 0];
        return;
    }

    let mix = |src: f32, dst: u8| -> u8 {
        let dst = f32::from(dst) / 255.0;
        let value = (src * src_a + dst * dst_a * (1.0 - src_a)) / out_a;
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    };

    pixel.0 = [
        mix(color.r, dr),
        mix(color.g, dg),
        mix(color.b, db),
        (out_a * 255.0).round() as u8,
    ];
}

/// Lays `layer` over `background` at `opacity`, the way a translucent
/// canvas sits on top of its page background. Both images are expected to
/// share dimensions; the overlap is used otherwise.
#[must_use]
pub fn composite(background: &RgbaImage, layer: &RgbaImage, opacity: f32) -> RgbaImage {
    let mut out = background.clone();
    let width = out.width().min(layer.width());
    let height = out.height().min(layer.height());
    for y in 0..height {
        for x in 0..width {
            let [r, g, b, a] = layer.get_pixel(x, y).0;
            if a == 0 {
                continue;
            }
            let src = Color::rgba8(r, g, b, f32::from(a) / 255.0);
            blend_over(out.get_pixel_mut(x, y), src, opacity);
        }
    }
    out
}

/// Writes an image as PNG.
pub fn save_png(image: &RgbaImage, path: impl AsRef<Path>) -> BackdropResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| BackdropError::Image(e.to_string()))
}

fn rect_corners(origin: Vec2, size: Vec2) -> [Vec2; 4] {
    [
        origin,
        origin + Vec2::new(size.x, 0.0),
        origin + size,
        origin + Vec2::new(0.0, size.y),
    ]
}

fn bounds(points: &[Vec2]) -> (Vec2, Vec2) {
    points.iter().fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_covers_pixels() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_rect(Vec2::new(2.0, 2.0), Vec2::new(4.0, 3.0), Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 12);
        assert_eq!(canvas.pixel(2, 2), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(6, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_clear_rect() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        canvas.clear_rect(Vec2::ZERO, Vec2::splat(2.0));
        assert_eq!(canvas.painted_pixels(), 12);
    }

    #[test]
    fn test_fill_circle_is_round() {
        let mut canvas = PixelCanvas::new(21, 21);
        canvas.fill_circle(Vec2::new(10.5, 10.5), 5.0, Color::WHITE);
        let painted = canvas.painted_pixels() as f32;
        let expected = std::f32::consts::PI * 25.0;
        assert!((painted - expected).abs() < expected * 0.15);
        assert_eq!(canvas.pixel(10, 10), Some([255, 255, 255, 255]));
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_huge_circle_walks_only_visible_pixels() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_circle(Vec2::splat(5.0), 1.0e5, Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 100);

        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_circle(Vec2::new(-1.0e5, 3.0), 1.0e5 + 2.0, Color::WHITE);
        assert!(canvas.pixel(0, 3).is_some_and(|p| p[3] > 0));
        assert_eq!(canvas.pixel(5, 3), Some([0, 0, 0, 0]));

        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_circle(Vec2::splat(-1.0e6), 50.0, Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 0);
    }

    #[test]
    fn test_tiny_circle_splats() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_circle(Vec2::new(1.2, 1.7), 0.3, Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 1);
        let alpha = canvas.pixel(1, 1).map(|p| p[3]).unwrap_or(0);
        assert!(alpha > 0 && alpha < 255);
    }

    #[test]
    fn test_scale_transform() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.scale(Vec2::splat(2.0));
        canvas.fill_rect(Vec2::ZERO, Vec2::splat(2.0), Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 16);
    }

    #[test]
    fn test_save_restore_transform() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.save();
        canvas.translate(Vec2::new(5.0, 5.0));
        canvas.restore();
        canvas.fill_rect(Vec2::ZERO, Vec2::ONE, Color::WHITE);
        assert_eq!(canvas.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_alpha_blending() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.fill_rect(Vec2::ZERO, Vec2::ONE, Color::BLACK);
        canvas.fill_rect(Vec2::ZERO, Vec2::ONE, Color::WHITE.with_alpha(0.5));
        let [r, g, b, a] = canvas.pixel(0, 0).unwrap_or_default();
        assert_eq!(a, 255);
        assert!((i32::from(r) - 128).abs() <= 1);
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_stroke_line() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.stroke_line(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0), 2.0, Color::WHITE);
        assert_eq!(canvas.painted_pixels(), 20);
    }

    #[test]
    fn test_flatten_path() {
        let path = [
            PathCommand::MoveTo(Vec2::ZERO),
            PathCommand::QuadTo(Vec2::new(5.0, 10.0), Vec2::new(10.0, 0.0)),
            PathCommand::Close,
        ];
        let contours = flatten_path(&path);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 1 + QUAD_STEPS);
        assert_eq!(*contours[0].last().unwrap_or(&Vec2::ZERO), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_fill_path_triangle() {
        let mut canvas = PixelCanvas::new(10, 10);
        let path = [
            PathCommand::MoveTo(Vec2::ZERO),
            PathCommand::LineTo(Vec2::new(10.0, 0.0)),
            PathCommand::LineTo(Vec2::new(0.0, 10.0)),
            PathCommand::Close,
        ];
        canvas.fill_path(&path, Color::WHITE);
        let painted = canvas.painted_pixels();
        assert!((40..=60).contains(&painted));
    }

    #[test]
    fn test_resize_clears() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
        canvas.resize_backing(8, 2);
        assert_eq!(canvas.backing_size(), (8, 2));
        assert_eq!(canvas.painted_pixels(), 0);
    }

    #[test]
    fn test_composite_respects_opacity() {
        let background = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let layer = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let out = composite(&background, &layer, 0.3);
        let [r, _, _, a] = out.get_pixel(0, 0).0;
        assert_eq!(a, 255);
        assert!((i32::from(r) - 77).abs() <= 1);
    }
}
