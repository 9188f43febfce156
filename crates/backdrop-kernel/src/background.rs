//! Static background layers.
//!
//! A background sits beneath the particle canvas and never animates. The
//! caller owns it; the engine only carries a shared reference so hosts
//! can paint it behind the particle layer.

use backdrop_common::{Color, SurfaceSize, Viewport};
use glam::Vec2;
use image::{Rgba, RgbaImage};

/// A color stop along a gradient line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient line in [0, 1].
    pub offset: f32,
    /// Color at this stop.
    pub color: Color,
}

impl GradientStop {
    /// Creates a stop.
    #[must_use]
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// A non-animated layer drawn behind the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticBackgroundLayer {
    /// Flat color.
    Solid(Color),
    /// Linear gradient. `angle` follows the CSS convention in degrees:
    /// 180 runs top to bottom, 135 runs top-left to bottom-right.
    LinearGradient {
        /// Direction in degrees.
        angle: f32,
        /// Stops sorted by offset.
        stops: Vec<GradientStop>,
    },
    /// Grid lines over another layer.
    Grid {
        /// Layer underneath the lines.
        base: Box<StaticBackgroundLayer>,
        /// Distance between lines in logical pixels.
        spacing: f32,
        /// Line color (lines are one logical pixel wide).
        line: Color,
    },
}

impl StaticBackgroundLayer {
    /// Evenly spaced gradient through `colors`.
    #[must_use]
    pub fn gradient(angle: f32, colors: &[Color]) -> Self {
        let last = colors.len().saturating_sub(1).max(1) as f32;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, color)| GradientStop::new(i as f32 / last, *color))
            .collect();
        Self::LinearGradient { angle, stops }
    }

    /// Top-to-bottom gradient through `colors`.
    #[must_use]
    pub fn to_bottom(colors: &[Color]) -> Self {
        Self::gradient(180.0, colors)
    }

    /// Top-left to bottom-right gradient through `colors`.
    #[must_use]
    pub fn to_bottom_right(colors: &[Color]) -> Self {
        Self::gradient(135.0, colors)
    }

    /// Wraps this layer with grid lines.
    #[must_use]
    pub fn with_grid(self, spacing: f32, line: Color) -> Self {
        Self::Grid {
            base: Box::new(self),
            spacing,
            line,
        }
    }

    /// Color at a logical point on a surface of `size`.
    #[must_use]
    pub fn sample(&self, point: Vec2, size: SurfaceSize) -> Color {
        match self {
            Self::Solid(color) => *color,
            Self::LinearGradient { angle, stops } => {
                sample_stops(stops, gradient_position(*angle, point, size))
            },
            Self::Grid {
                base,
                spacing,
                line,
            } => {
                let under = base.sample(point, size);
                if *spacing > 1.0
                    && (point.x.rem_euclid(*spacing) < 1.0 || point.y.rem_euclid(*spacing) < 1.0)
                {
                    over(under, *line)
                } else {
                    under
                }
            },
        }
    }

    /// Whether every pixel of this layer is fully opaque.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Solid(color) => color.a >= 1.0,
            Self::LinearGradient { stops, .. } => stops.iter().all(|s| s.color.a >= 1.0),
            Self::Grid { base, .. } => base.is_opaque(),
        }
    }
}

/// Renders `layer` at the viewport's backing resolution. Pixels are sampled
/// at their centres mapped back to logical coordinates.
#[must_use]
pub fn paint_background(layer: &StaticBackgroundLayer, viewport: &Viewport) -> RgbaImage {
    let (width, height) = viewport.backing_size();
    let ratio = viewport.effective_ratio();
    let size = viewport.logical_size();
    RgbaImage::from_fn(width, height, |x, y| {
        let point = Vec2::new((x as f32 + 0.5) / ratio, (y as f32 + 0.5) / ratio);
        Rgba(layer.sample(point, size).to_rgba8())
    })
}

fn gradient_position(angle: f32, point: Vec2, size: SurfaceSize) -> f32 {
    let radians = angle.to_radians();
    let direction = Vec2::new(radians.sin(), -radians.cos());
    let length = (size.width * direction.x).abs() + (size.height * direction.y).abs();
    if length <= f32::EPSILON {
        return 0.0;
    }
    ((point - size.center()).dot(direction) / length + 0.5).clamp(0.0, 1.0)
}

fn sample_stops(stops: &[GradientStop], t: f32) -> Color {
    let Some(first) = stops.first() else {
        return Color::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.color;
            }
            return a.color.lerp(b.color, (t - a.offset) / span);
        }
    }
    stops.last().map_or(first.color, |s| s.color)
}

fn over(dst: Color, src: Color) -> Color {
    let a = src.a + dst.a * (1.0 - src.a);
    if a <= 0.0 {
        return Color::TRANSPARENT;
    }
    let mix = |s: f32, d: f32| (s * src.a + d * dst.a * (1.0 - src.a)) / a;
    Color::new(mix(src.r, dst.r), mix(src.g, dst.g), mix(src.b, dst.b), a)
}
