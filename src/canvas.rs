// src/canvas.rs
// Drawing surface contract used by layers, plus the two surfaces shipped with the crate.
use glam::Vec2;

use crate::color::DeviceColor;
use crate::models::LineVertex;

/// A 2D drawing surface with a pixel size and canvas-style path API.
///
/// `set_global_alpha` is raw: like a browser context it ignores values outside `[0, 1]`,
/// so callers clamp before writing.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn set_size(&mut self, width: u32, height: u32);

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    fn set_stroke_style(&mut self, color: DeviceColor);
    fn set_fill_style(&mut self, color: DeviceColor);
    fn set_line_width(&mut self, width: f32);

    fn begin_path(&mut self);
    fn move_to(&mut self, point: Vec2);
    fn line_to(&mut self, point: Vec2);
    fn stroke(&mut self);
    fn close_path(&mut self);

    fn global_alpha(&self) -> f64;
    fn set_global_alpha(&mut self, alpha: f64);

    fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }
}

/// One stroked segment, in pixels, with its final (alpha-baked) color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
    pub color: DeviceColor,
}

impl Segment {
    fn within(&self, min: Vec2, max: Vec2) -> bool {
        let inside = |p: Vec2| p.x >= min.x && p.y >= min.y && p.x <= max.x && p.y <= max.y;
        inside(self.from) && inside(self.to)
    }

    /// Two triangles covering the segment widened to `width` pixels.
    pub fn tessellate(&self, out: &mut Vec<LineVertex>) {
        let dir = self.to - self.from;
        if dir.length_squared() <= f32::EPSILON {
            return;
        }
        let normal = dir.normalize().perp() * (self.width.max(1.0) * 0.5);
        let color = self.color.to_linear_rgba();
        let corners = [
            self.from + normal,
            self.from - normal,
            self.to - normal,
            self.to + normal,
        ];
        for i in [0, 1, 2, 0, 2, 3] {
            out.push(LineVertex { position: corners[i].to_array(), color });
        }
    }
}

#[derive(Debug, Clone)]
struct PenState {
    stroke_style: DeviceColor,
    fill_style: DeviceColor,
    line_width: f32,
    global_alpha: f64,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            stroke_style: DeviceColor { red: 0.0, green: 0.0, blue: 0.0, alpha: 1.0 },
            fill_style: DeviceColor { red: 0.0, green: 0.0, blue: 0.0, alpha: 1.0 },
            line_width: 1.0,
            global_alpha: 1.0,
        }
    }
}

/// Retained display list of stroked segments, uploaded to the GPU by `State::render`.
#[derive(Debug, Clone, Default)]
pub struct LineCanvas {
    width: u32,
    height: u32,
    pen: PenState,
    path: Vec<Vec<Vec2>>,
    segments: Vec<Segment>,
    dirty: bool,
}

impl LineCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Default::default() }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn tessellate_into(&self, out: &mut Vec<LineVertex>) {
        for segment in &self.segments {
            segment.tessellate(out);
        }
    }
}

impl Canvas for LineCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_size(&mut self, width: u32, height: u32) {
        // Resizing a canvas resets its bitmap and context state.
        self.width = width;
        self.height = height;
        self.pen = PenState::default();
        self.path.clear();
        self.segments.clear();
        self.dirty = true;
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let min = Vec2::new(x, y);
        let max = min + Vec2::new(width, height);
        let before = self.segments.len();
        self.segments.retain(|s| !s.within(min, max));
        self.dirty |= before != self.segments.len();
    }

    fn set_stroke_style(&mut self, color: DeviceColor) {
        self.pen.stroke_style = color;
    }

    fn set_fill_style(&mut self, color: DeviceColor) {
        self.pen.fill_style = color;
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.pen.line_width = width;
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, point: Vec2) {
        self.path.push(vec![point]);
    }

    fn line_to(&mut self, point: Vec2) {
        match self.path.last_mut() {
            Some(subpath) => subpath.push(point),
            None => self.path.push(vec![point]),
        }
    }

    fn stroke(&mut self) {
        let color = self.pen.stroke_style.with_alpha_scaled(self.pen.global_alpha as f32);
        for subpath in &self.path {
            for pair in subpath.windows(2) {
                self.segments.push(Segment {
                    from: pair[0],
                    to: pair[1],
                    width: self.pen.line_width,
                    color,
                });
            }
        }
        self.dirty = true;
    }

    fn close_path(&mut self) {
        if let Some(subpath) = self.path.last_mut() {
            if let Some(&first) = subpath.first() {
                subpath.push(first);
                self.path.push(vec![first]);
            }
        }
    }

    fn global_alpha(&self) -> f64 {
        self.pen.global_alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if (0.0..=1.0).contains(&alpha) {
            self.pen.global_alpha = alpha;
        }
    }
}

/// A single call made against a `RecordingCanvas`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize { width: u32, height: u32 },
    ClearRect { x: f32, y: f32, width: f32, height: f32 },
    StrokeStyle(DeviceColor),
    FillStyle(DeviceColor),
    LineWidth(f32),
    BeginPath,
    MoveTo(Vec2),
    LineTo(Vec2),
    Stroke,
    ClosePath,
    GlobalAlpha(f64),
}

/// Canvas that only records what was asked of it. Used for headless runs and tests.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    global_alpha: f64,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, global_alpha: 1.0, commands: Vec::new() }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// `(from, to)` pixel pairs of every `MoveTo`/`LineTo` run that was stroked.
    pub fn stroked_lines(&self) -> Vec<(Vec2, Vec2)> {
        let mut lines = Vec::new();
        let mut pending = Vec::new();
        let mut cursor = None;
        for command in &self.commands {
            match command {
                DrawCommand::BeginPath => pending.clear(),
                DrawCommand::MoveTo(p) => cursor = Some(*p),
                DrawCommand::LineTo(p) => {
                    if let Some(from) = cursor {
                        pending.push((from, *p));
                    }
                    cursor = Some(*p);
                }
                DrawCommand::Stroke => lines.append(&mut pending),
                _ => {}
            }
        }
        lines
    }

    pub fn clear_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::ClearRect { .. }))
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.global_alpha = 1.0;
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::ClearRect { x, y, width, height });
    }

    fn set_stroke_style(&mut self, color: DeviceColor) {
        self.commands.push(DrawCommand::StrokeStyle(color));
    }

    fn set_fill_style(&mut self, color: DeviceColor) {
        self.commands.push(DrawCommand::FillStyle(color));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(DrawCommand::LineWidth(width));
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, point: Vec2) {
        self.commands.push(DrawCommand::MoveTo(point));
    }

    fn line_to(&mut self, point: Vec2) {
        self.commands.push(DrawCommand::LineTo(point));
    }

    fn stroke(&mut self) {
        self.commands.push(DrawCommand::Stroke);
    }

    fn close_path(&mut self) {
        self.commands.push(DrawCommand::ClosePath);
    }

    fn global_alpha(&self) -> f64 {
        self.global_alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        if (0.0..=1.0).contains(&alpha) {
            self.global_alpha = alpha;
            self.commands.push(DrawCommand::GlobalAlpha(alpha));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> DeviceColor {
        DeviceColor { red: 255.0, green: 0.0, blue: 0.0, alpha: 1.0 }
    }

    #[test]
    fn line_canvas_bakes_global_alpha_into_strokes() {
        let mut canvas = LineCanvas::new(100, 100);
        canvas.set_global_alpha(0.5);
        canvas.set_stroke_style(red());
        canvas.set_line_width(2.0);
        canvas.begin_path();
        canvas.move_to(Vec2::new(0.0, 0.0));
        canvas.line_to(Vec2::new(10.0, 0.0));
        canvas.stroke();
        canvas.close_path();

        assert_eq!(canvas.segments().len(), 1);
        let segment = canvas.segments()[0];
        assert_eq!(segment.width, 2.0);
        assert!((segment.color.alpha - 0.5).abs() < 1e-6);

        let mut vertices = Vec::new();
        canvas.tessellate_into(&mut vertices);
        assert_eq!(vertices.len(), 6);
    }

    #[test]
    fn line_canvas_ignores_out_of_range_alpha() {
        let mut canvas = LineCanvas::new(10, 10);
        canvas.set_global_alpha(0.3);
        canvas.set_global_alpha(1.7);
        canvas.set_global_alpha(-0.2);
        assert_eq!(canvas.global_alpha(), 0.3);
    }

    #[test]
    fn full_clear_drops_every_segment() {
        let mut canvas = LineCanvas::new(50, 50);
        canvas.begin_path();
        canvas.move_to(Vec2::new(1.0, 1.0));
        canvas.line_to(Vec2::new(49.0, 49.0));
        canvas.stroke();
        assert!(canvas.take_dirty());

        canvas.clear_rect(0.0, 0.0, 50.0, 50.0);
        assert!(canvas.segments().is_empty());
        assert!(canvas.take_dirty());
        assert!(!canvas.take_dirty());
    }

    #[test]
    fn zero_length_segments_tessellate_to_nothing() {
        let segment = Segment { from: Vec2::ONE, to: Vec2::ONE, width: 1.0, color: red() };
        let mut vertices = Vec::new();
        segment.tessellate(&mut vertices);
        assert!(vertices.is_empty());
    }

    #[test]
    fn recording_canvas_collects_stroked_lines() {
        let mut canvas = RecordingCanvas::new(10, 10);
        canvas.begin_path();
        canvas.move_to(Vec2::new(1.0, 2.0));
        canvas.line_to(Vec2::new(3.0, 4.0));
        canvas.stroke();
        canvas.begin_path();
        canvas.move_to(Vec2::new(5.0, 5.0));
        canvas.line_to(Vec2::new(6.0, 6.0));
        // never stroked

        assert_eq!(
            canvas.stroked_lines(),
            vec![(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0))]
        );
    }
}
