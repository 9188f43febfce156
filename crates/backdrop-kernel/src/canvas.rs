//! Drawing contexts.
//!
//! [`DrawContext`] is the set of 2D primitives particle rules issue:
//! filled circles, ellipses, polygons and bezier paths, straight lines, a
//! full-rectangle fill for the trail fade, and affine transforms scoped by
//! `save`/`restore`. [`Canvas`] adds the backing-store resize the surface
//! performs on every viewport change.
//!
//! [`RecordingCanvas`] records every call as a [`DrawCommand`] so frames
//! can be inspected without rasterizing.

use backdrop_common::Color;
use glam::Vec2;

/// One segment of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// Starts a new sub-path at a point.
    MoveTo(Vec2),
    /// Straight segment to a point.
    LineTo(Vec2),
    /// Quadratic bezier with one control point.
    QuadTo(Vec2, Vec2),
    /// Cubic bezier with two control points.
    CubicTo(Vec2, Vec2, Vec2),
    /// Closes the current sub-path.
    Close,
}

/// 2D drawing primitives.
pub trait DrawContext {
    /// Pushes the current transform.
    fn save(&mut self);
    /// Pops the transform pushed by the matching `save`.
    fn restore(&mut self);
    /// Replaces the current transform with identity.
    fn reset_transform(&mut self);
    /// Translates subsequent drawing.
    fn translate(&mut self, offset: Vec2);
    /// Rotates subsequent drawing by `radians`.
    fn rotate(&mut self, radians: f32);
    /// Scales subsequent drawing.
    fn scale(&mut self, factor: Vec2);

    /// Clears a rectangle to transparent.
    fn clear_rect(&mut self, origin: Vec2, size: Vec2);
    /// Fills a rectangle.
    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color);
    /// Fills a circle.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    /// Fills an ellipse rotated by `rotation` radians around its centre.
    fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, rotation: f32, color: Color);
    /// Fills a closed polygon.
    fn fill_polygon(&mut self, points: &[Vec2], color: Color);
    /// Fills a path made of line and bezier segments.
    fn fill_path(&mut self, path: &[PathCommand], color: Color);
    /// Strokes a straight line.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color);
}

/// A drawing context with a resizable backing store.
pub trait Canvas: DrawContext + Send + 'static {
    /// Reallocates the backing store at `width x height` physical pixels.
    fn resize_backing(&mut self, width: u32, height: u32);
    /// Current backing-store size in physical pixels.
    fn backing_size(&self) -> (u32, u32);
}

/// A recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `save`
    Save,
    /// `restore`
    Restore,
    /// `reset_transform`
    ResetTransform,
    /// `translate`
    Translate(Vec2),
    /// `rotate`
    Rotate(f32),
    /// `scale`
    Scale(Vec2),
    /// `clear_rect`
    ClearRect {
        /// Top-left corner.
        origin: Vec2,
        /// Extent.
        size: Vec2,
    },
    /// `fill_rect`
    FillRect {
        /// Top-left corner.
        origin: Vec2,
        /// Extent.
        size: Vec2,
        /// Fill color.
        color: Color,
    },
    /// `fill_circle`
    FillCircle {
        /// Centre.
        center: Vec2,
        /// Radius.
        radius: f32,
        /// Fill color.
        color: Color,
    },
    /// `fill_ellipse`
    FillEllipse {
        /// Centre.
        center: Vec2,
        /// Radii along the local axes.
        radii: Vec2,
        /// Rotation in radians.
        rotation: f32,
        /// Fill color.
        color: Color,
    },
    /// `fill_polygon`
    FillPolygon {
        /// Vertices.
        points: Vec<Vec2>,
        /// Fill color.
        color: Color,
    },
    /// `fill_path`
    FillPath {
        /// Segments.
        path: Vec<PathCommand>,
        /// Fill color.
        color: Color,
    },
    /// `stroke_line`
    StrokeLine {
        /// Start point.
        from: Vec2,
        /// End point.
        to: Vec2,
        /// Line width.
        width: f32,
        /// Stroke color.
        color: Color,
    },
}

impl DrawCommand {
    /// Whether this command puts paint on the surface (as opposed to
    /// changing transform state).
    #[must_use]
    pub fn is_paint(&self) -> bool {
        !matches!(
            self,
            Self::Save | Self::Restore | Self::ResetTransform | Self::Translate(_)
                | Self::Rotate(_)
                | Self::Scale(_)
        )
    }
}

/// Canvas that records drawing calls instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    backing: (u32, u32),
    depth: usize,
    resizes: usize,
}

impl RecordingCanvas {
    /// Creates an empty recording canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands since the last [`Self::clear_log`].
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drops all recorded commands.
    pub fn clear_log(&mut self) {
        self.commands.clear();
    }

    /// Number of recorded commands that paint.
    #[must_use]
    pub fn paint_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_paint()).count()
    }

    /// Number of `fill_circle` calls recorded.
    #[must_use]
    pub fn circle_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillCircle { .. }))
            .count()
    }

    /// Current `save` nesting depth. Zero between frames.
    #[must_use]
    pub fn save_depth(&self) -> usize {
        self.depth
    }

    /// How many times the backing store was resized.
    #[must_use]
    pub fn resize_count(&self) -> usize {
        self.resizes
    }
}

impl DrawContext for RecordingCanvas {
    fn save(&mut self) {
        self.depth += 1;
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.commands.push(DrawCommand::Restore);
    }

    fn reset_transform(&mut self) {
        self.commands.push(DrawCommand::ResetTransform);
    }

    fn translate(&mut self, offset: Vec2) {
        self.commands.push(DrawCommand::Translate(offset));
    }

    fn rotate(&mut self, radians: f32) {
        self.commands.push(DrawCommand::Rotate(radians));
    }

    fn scale(&mut self, factor: Vec2) {
        self.commands.push(DrawCommand::Scale(factor));
    }

    fn clear_rect(&mut self, origin: Vec2, size: Vec2) {
        self.commands.push(DrawCommand::ClearRect { origin, size });
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.commands.push(DrawCommand::FillRect {
            origin,
            size,
            color,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
        });
    }

    fn fill_ellipse(&mut self, center: Vec2, radii: Vec2, rotation: f32, color: Color) {
        self.commands.push(DrawCommand::FillEllipse {
            center,
            radii,
            rotation,
            color,
        });
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Color) {
        self.commands.push(DrawCommand::FillPolygon {
            points: points.to_vec(),
            color,
        });
    }

    fn fill_path(&mut self, path: &[PathCommand], color: Color) {
        self.commands.push(DrawCommand::FillPath {
            path: path.to_vec(),
            color,
        });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            width,
            color,
        });
    }
}

impl Canvas for RecordingCanvas {
    fn resize_backing(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.resizes += 1;
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }
}
