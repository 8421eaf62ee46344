use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec2;

use crate::canvas::Canvas;
use crate::color::ColorCoords;

use super::entity::{EntityBase, Position};
use super::tracer::Tracer;

/// One percent of a normalized coordinate unit per cycle.
pub const DEFAULT_SPEED: f32 = 0.01;

/// Traveler walking a precomputed path over the network, one waypoint per cycle.
#[derive(Debug, Clone)]
pub struct Signal {
    pub(crate) base: EntityBase,
    waypoints: VecDeque<Position>,
    tracers: Vec<Tracer>,
    speed: f32,
    tracer_scale: f32,
}

impl Signal {
    /// `path` is the node chain's positions in order; the signal starts on the first one.
    pub fn new(
        path: &[Position],
        color: Arc<ColorCoords>,
        speed_multiplier: f32,
        tracer_scale: f32,
    ) -> Self {
        let speed = DEFAULT_SPEED * speed_multiplier;
        let start = path.first().copied().unwrap_or(Vec2::ZERO);
        Self {
            base: EntityBase::new(start, color),
            waypoints: calculate_waypoints(path, speed),
            tracers: Vec::new(),
            speed,
            tracer_scale,
        }
    }

    pub fn pos(&self) -> Position {
        self.base.pos
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn waypoints(&self) -> &VecDeque<Position> {
        &self.waypoints
    }

    pub fn tracers(&self) -> &[Tracer] {
        &self.tracers
    }

    /// Moving, or done moving but with trail still visible.
    pub fn is_active(&self) -> bool {
        !self.waypoints.is_empty() || self.tracers.iter().any(Tracer::is_active)
    }

    /// Leaves a tracer behind and hops to the next waypoint, if there is one.
    pub fn cycle(&mut self) {
        let Some(next) = self.waypoints.pop_front() else {
            return;
        };
        self.tracers.push(Tracer::new(
            self.base.pos,
            next,
            self.base.color.clone(),
            self.tracer_scale,
        ));
        self.base.pos = next;
    }

    /// Draws nothing itself; renders its tracers, ages each one and drops the spent ones.
    pub fn render<C: Canvas + ?Sized>(&mut self, canvas: &mut C) {
        canvas.set_fill_style(self.base.device_color(100.0));

        for tracer in &mut self.tracers {
            tracer.render(canvas);
            tracer.cycle();
        }
        self.tracers.retain(Tracer::is_active);
    }
}

/// Evenly spaced stops along every consecutive pair of `nodes`, ending on the last node.
///
/// Spacing along a segment is `speed`, except the final sub-step which may be shorter.
pub fn calculate_waypoints(nodes: &[Position], speed: f32) -> VecDeque<Position> {
    let mut waypoints = VecDeque::new();
    let Some(&last) = nodes.last() else {
        return waypoints;
    };

    for pair in nodes.windows(2) {
        let (n0, n1) = (pair[0], pair[1]);
        let delta = n1 - n0;
        let len = delta.length();
        let dir = delta.y.atan2(delta.x);
        let steps = (len / speed).ceil() as usize;
        let heading = Vec2::new(dir.cos(), dir.sin());

        waypoints.push_back(n0);
        for step in 1..steps {
            waypoints.push_back(n0 + heading * (step as f32 * speed));
        }
    }
    waypoints.push_back(last);

    waypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> Arc<ColorCoords> {
        Arc::new(ColorCoords::BLACK)
    }

    #[test]
    fn two_nodes_half_speed() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        let waypoints: Vec<_> = calculate_waypoints(&path, 0.5).into_iter().collect();
        assert_eq!(
            waypoints,
            vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.0)]
        );
    }

    #[test]
    fn spacing_never_exceeds_speed_and_visits_every_node() {
        let path = [
            Vec2::new(0.1, 0.9),
            Vec2::new(0.8, 0.2),
            Vec2::new(0.35, 0.35),
            Vec2::new(0.9, 0.95),
        ];
        let speed = 0.03;
        let waypoints: Vec<_> = calculate_waypoints(&path, speed).into_iter().collect();

        for pair in waypoints.windows(2) {
            assert!(pair[0].distance(pair[1]) <= speed + 1e-5);
        }
        for node in path {
            assert!(waypoints.contains(&node));
        }
        assert_eq!(*waypoints.last().unwrap(), path[3]);

        let expected: usize = path
            .windows(2)
            .map(|p| (p[0].distance(p[1]) / speed).ceil() as usize)
            .sum::<usize>()
            + 1;
        assert_eq!(waypoints.len(), expected);
    }

    #[test]
    fn single_node_yields_single_waypoint() {
        let node = Vec2::new(0.4, 0.6);
        let mut signal = Signal::new(&[node], color(), 1.0, 1.0);
        assert_eq!(signal.waypoints().len(), 1);
        assert_eq!(signal.waypoints()[0], node);

        signal.cycle();
        assert!(signal.waypoints().is_empty());
        assert_eq!(signal.tracers().len(), 1);
        assert!(signal.is_active());
    }

    #[test]
    fn cycle_spawns_tracer_from_current_to_next_waypoint() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(0.02, 0.0)];
        let mut signal = Signal::new(&path, color(), 1.0, 2.0);

        signal.cycle();
        signal.cycle();
        assert_eq!(signal.tracers().len(), 2);
        let second = &signal.tracers()[1];
        assert_eq!(second.base.pos, Vec2::new(0.0, 0.0));
        assert!((second.endpoint() - Vec2::new(0.01, 0.0)).length() < 1e-6);
        assert_eq!(signal.pos(), second.endpoint());
    }

    #[test]
    fn goes_inactive_once_path_and_trail_are_spent() {
        let path = [Vec2::new(0.0, 0.0), Vec2::new(0.05, 0.0)];
        let mut signal = Signal::new(&path, color(), 1.0, 1.0);
        let mut canvas = crate::canvas::RecordingCanvas::new(10, 10);

        let mut cycles = 0;
        while signal.is_active() {
            signal.cycle();
            signal.render(&mut canvas);
            cycles += 1;
            assert!(cycles < 1000);
        }
        assert!(signal.waypoints().is_empty());
        assert!(signal.tracers().is_empty());

        // stays dead
        signal.cycle();
        signal.render(&mut canvas);
        assert!(!signal.is_active());
    }
}
