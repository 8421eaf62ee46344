use std::sync::Arc;

use glam::Vec2;
use rand::Rng;

use crate::canvas::Canvas;
use crate::color::ColorCoords;

use super::entity::{EntityBase, Position, SceneView, canvas_pos};

/// Network connections are always dim background lines.
pub const NETWORK_ALPHA_PERCENT: f32 = 25.0;

/// Static network vertex. `terminal` indexes the next node in the same chain.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) base: EntityBase,
    terminal: Option<usize>,
}

impl Node {
    pub fn new(pos: Position, terminal: Option<usize>, color: Arc<ColorCoords>) -> Self {
        Self { base: EntityBase::new(pos, color), terminal }
    }

    pub fn pos(&self) -> Position {
        self.base.pos
    }

    pub fn terminal(&self) -> Option<usize> {
        self.terminal
    }

    /// Fixes up `terminal` after the entity at `removed` left the layer.
    pub(crate) fn unlink_removed(&mut self, removed: usize) {
        self.terminal = match self.terminal {
            Some(t) if t == removed => None,
            Some(t) if t > removed => Some(t - 1),
            other => other,
        };
    }

    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C, view: &SceneView<'_>) {
        let color = self.base.device_color(NETWORK_ALPHA_PERCENT);
        canvas.set_stroke_style(color);
        canvas.set_fill_style(color);

        let Some(terminal_pos) = self.terminal.and_then(|t| view.position(t)) else {
            return;
        };

        let from = canvas_pos(canvas, self.base.pos);
        let to = canvas_pos(canvas, terminal_pos);

        canvas.begin_path();
        canvas.move_to(from);
        canvas.line_to(to);
        canvas.stroke();
        canvas.close_path();
    }
}

/// Builds a chain of `size` randomly placed nodes.
///
/// Every new node links to the one created before it and is placed in front of it,
/// so the chain reads first -> last and the seed node (no terminal) ends up last.
pub fn build_chain<R: Rng + ?Sized>(size: usize, color: &Arc<ColorCoords>, rng: &mut R) -> Vec<Node> {
    let mut positions: Vec<Position> = (0..size)
        .map(|_| Vec2::new(rng.r#gen::<f32>(), rng.r#gen::<f32>()))
        .collect();
    positions.reverse();
    chain_from_positions(&positions, color)
}

/// Chain over fixed positions: node `i` links to node `i + 1`, the last node links nowhere.
pub fn chain_from_positions(positions: &[Position], color: &Arc<ColorCoords>) -> Vec<Node> {
    let last = positions.len().saturating_sub(1);
    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| Node::new(pos, (i < last).then_some(i + 1), color.clone()))
        .collect()
}
