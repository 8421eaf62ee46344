use crate::canvas::Canvas;

use super::entity::{Entity, EntityId, Position, SceneView};
use super::fade::{DEFAULT_FADE_RATE, Fade, FadeDirection, FadePoll};

/// A drawing surface plus the entities rendered onto it, in draw order.
#[derive(Debug)]
pub struct Layer<C: Canvas> {
    canvas: C,
    entities: Vec<Entity>,
    fade_rate: f64,
}

impl<C: Canvas> Layer<C> {
    pub fn new(canvas: C) -> Self {
        Self { canvas, entities: Vec::new(), fade_rate: DEFAULT_FADE_RATE }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn fade_rate(&self) -> f64 {
        self.fade_rate
    }

    pub fn set_fade_rate(&mut self, rate: f64) {
        self.fade_rate = rate;
    }

    pub fn has_active(&self) -> bool {
        self.entities.iter().any(Entity::is_active)
    }

    pub fn global_alpha(&self) -> f64 {
        self.canvas.global_alpha()
    }

    /// The context ignores out-of-range writes, so saturate first.
    pub fn set_global_alpha(&mut self, alpha: f64) {
        let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        self.canvas.set_global_alpha(alpha);
    }

    /// Appends `entity` and draws just that entity on top of what's already there.
    pub fn add_entity(&mut self, entity: impl Into<Entity>) {
        self.entities.push(entity.into());
        let positions = self.positions();
        let view = SceneView::new(&positions);
        if let Some(entity) = self.entities.last_mut() {
            entity.render(&mut self.canvas, &view);
        }
    }

    /// Removes the entity with `id`. Nodes that linked to it lose their link, and
    /// later terminal indices shift down with the entities they point at.
    pub fn remove_entity(&mut self, id: EntityId) {
        let Some(index) = self.entities.iter().position(|e| e.id() == id) else {
            return;
        };
        self.entities.remove(index);
        for entity in &mut self.entities {
            if let Entity::Node(node) = entity {
                node.unlink_removed(index);
            }
        }
    }

    /// Replaces every entity and redraws.
    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
        self.render_all();
    }

    pub fn clear(&mut self) {
        let (w, h) = (self.canvas.width() as f32, self.canvas.height() as f32);
        self.canvas.clear_rect(0.0, 0.0, w, h);
    }

    /// Cycles active entities and drops inactive ones, then redraws once.
    pub fn cycle_all(&mut self) {
        self.entities.retain_mut(|entity| {
            if entity.is_active() {
                entity.cycle();
                true
            } else {
                false
            }
        });
        self.render_all();
    }

    /// Wipes the surface and draws every entity in collection order.
    pub fn render_all(&mut self) {
        self.clear();
        let positions = self.positions();
        let view = SceneView::new(&positions);
        for entity in &mut self.entities {
            entity.render(&mut self.canvas, &view);
        }
    }

    /// Starts a fade: opacity jumps to the fade's starting extreme.
    pub fn begin_fade(&mut self, direction: FadeDirection) -> Fade {
        let fade = Fade::new(direction, self.fade_rate);
        self.set_global_alpha(fade.opacity());
        fade
    }

    /// One fade frame: done if the target was reached, otherwise draw and step opacity.
    pub fn fade_step(&mut self, fade: &mut Fade) -> FadePoll {
        if fade.is_complete() {
            return FadePoll::Done;
        }
        self.set_global_alpha(fade.opacity());
        self.render_all();
        fade.advance();
        self.set_global_alpha(fade.opacity());
        FadePoll::Pending
    }

    fn positions(&self) -> Vec<Position> {
        self.entities.iter().map(Entity::position).collect()
    }
}
