use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

use crate::canvas::Canvas;
use crate::color::{ColorCoords, DeviceColor};

use super::node::Node;
use super::signal::Signal;
use super::tracer::Tracer;

/// Normalized position in `[0, 1] x [0, 1]`; scaled to pixels only while rendering.
pub type Position = Vec2;

/// Opaque identity token, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// State every entity carries: identity, normalized position and the shared generation color.
#[derive(Debug, Clone)]
pub struct EntityBase {
    pub id: EntityId,
    pub pos: Position,
    pub color: Arc<ColorCoords>,
}

impl EntityBase {
    pub fn new(pos: Position, color: Arc<ColorCoords>) -> Self {
        Self { id: EntityId::next(), pos, color }
    }

    pub fn device_color(&self, alpha_pct: f32) -> DeviceColor {
        self.color.device_color(alpha_pct)
    }
}

/// Maps a normalized position to floored pixel coordinates on `canvas`.
pub fn canvas_pos<C: Canvas + ?Sized>(canvas: &C, pos: Position) -> Vec2 {
    (pos * canvas.size()).floor()
}

/// Positions of a layer's entities at render time, indexed like the layer's collection.
///
/// Nodes resolve their terminal through this instead of holding a reference to it.
#[derive(Debug, Clone, Copy)]
pub struct SceneView<'a> {
    positions: &'a [Position],
}

impl<'a> SceneView<'a> {
    pub fn new(positions: &'a [Position]) -> Self {
        Self { positions }
    }

    pub fn empty() -> Self {
        Self { positions: &[] }
    }

    pub fn position(&self, index: usize) -> Option<Position> {
        self.positions.get(index).copied()
    }
}

#[derive(Debug, Clone)]
pub enum Entity {
    Node(Node),
    Signal(Signal),
    Tracer(Tracer),
}

impl Entity {
    fn base(&self) -> &EntityBase {
        match self {
            Entity::Node(n) => &n.base,
            Entity::Signal(s) => &s.base,
            Entity::Tracer(t) => &t.base,
        }
    }

    pub fn id(&self) -> EntityId {
        self.base().id
    }

    pub fn position(&self) -> Position {
        self.base().pos
    }

    pub fn color(&self) -> &ColorCoords {
        &self.base().color
    }

    /// Device color of this entity at `alpha_pct` percent opacity.
    pub fn color_string(&self, alpha_pct: f32) -> String {
        self.base().device_color(alpha_pct).to_string()
    }

    /// Pixel position of `pos`, or of this entity when `pos` is `None`.
    pub fn canvas_pos<C: Canvas + ?Sized>(&self, canvas: &C, pos: Option<Position>) -> Vec2 {
        canvas_pos(canvas, pos.unwrap_or(self.base().pos))
    }

    /// Inactive entities are dropped by their layer on the next cycle.
    pub fn is_active(&self) -> bool {
        match self {
            Entity::Node(_) => true,
            Entity::Signal(s) => s.is_active(),
            Entity::Tracer(t) => t.is_active(),
        }
    }

    pub fn cycle(&mut self) {
        match self {
            Entity::Node(_) => {}
            Entity::Signal(s) => s.cycle(),
            Entity::Tracer(t) => t.cycle(),
        }
    }

    pub fn render<C: Canvas + ?Sized>(&mut self, canvas: &mut C, view: &SceneView<'_>) {
        match self {
            Entity::Node(n) => n.render(canvas, view),
            Entity::Signal(s) => s.render(canvas),
            Entity::Tracer(t) => t.render(canvas),
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<Signal> for Entity {
    fn from(signal: Signal) -> Self {
        Entity::Signal(signal)
    }
}

impl From<Tracer> for Entity {
    fn from(tracer: Tracer) -> Self {
        Entity::Tracer(tracer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;

    #[test]
    fn ids_are_unique() {
        let a = EntityId::next();
        let b = EntityId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn canvas_pos_scales_and_floors() {
        let canvas = RecordingCanvas::new(200, 100);
        assert_eq!(canvas_pos(&canvas, Vec2::new(0.5, 0.5)), Vec2::new(100.0, 50.0));
        assert_eq!(canvas_pos(&canvas, Vec2::new(0.333, 0.999)), Vec2::new(66.0, 99.0));
        assert_eq!(canvas_pos(&canvas, Vec2::ONE), Vec2::new(200.0, 100.0));
    }

    #[test]
    fn entity_accessors_delegate_to_variant() {
        let color = Arc::new(ColorCoords::new(1.0, 1.0, 1.0));
        let node = Node::new(Vec2::new(0.25, 0.75), None, color);
        let entity = Entity::from(node);
        let canvas = RecordingCanvas::new(100, 100);

        assert!(entity.is_active());
        assert_eq!(entity.position(), Vec2::new(0.25, 0.75));
        assert_eq!(entity.canvas_pos(&canvas, None), Vec2::new(25.0, 75.0));
        assert_eq!(entity.canvas_pos(&canvas, Some(Vec2::ONE)), Vec2::new(100.0, 100.0));
        assert_eq!(entity.color_string(100.0), "rgb(255 255 255 / 100%)");
    }
}
