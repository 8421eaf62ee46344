use std::sync::Arc;

use crate::canvas::Canvas;
use crate::color::ColorCoords;

use super::entity::{EntityBase, Position, canvas_pos};

/// Lifespan of every tracer, in cycles.
pub const TRACER_LIFESPAN: u32 = 20;

/// Fading trail segment left behind by a signal.
#[derive(Debug, Clone)]
pub struct Tracer {
    pub(crate) base: EntityBase,
    endpoint: Position,
    cycles_left: u32,
    width: f32,
}

impl Tracer {
    pub fn new(start: Position, endpoint: Position, color: Arc<ColorCoords>, width: f32) -> Self {
        Self {
            base: EntityBase::new(start, color),
            endpoint,
            cycles_left: TRACER_LIFESPAN,
            width,
        }
    }

    pub fn endpoint(&self) -> Position {
        self.endpoint
    }

    pub fn cycles_left(&self) -> u32 {
        self.cycles_left
    }

    pub fn is_active(&self) -> bool {
        self.cycles_left > 0
    }

    /// Opacity in percent, proportional to the remaining lifespan.
    pub fn alpha_percent(&self) -> f32 {
        100.0 * self.cycles_left as f32 / TRACER_LIFESPAN as f32
    }

    pub fn cycle(&mut self) {
        self.cycles_left = self.cycles_left.saturating_sub(1);
    }

    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        canvas.set_stroke_style(self.base.device_color(self.alpha_percent()));
        canvas.set_line_width(self.width);

        let start = canvas_pos(canvas, self.base.pos);
        let end = canvas_pos(canvas, self.endpoint);

        canvas.begin_path();
        canvas.move_to(start);
        canvas.line_to(end);
        canvas.stroke();
        canvas.close_path();
    }
}
