// src/synapse.rs
// Two-layer orchestrator: build a network, fade it in, run its signal, fade out, repeat.
use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::canvas::Canvas;
use crate::color::ColorCoords;
use crate::config::SynapseOptions;
use crate::scene::{
    Entity, Fade, FadeDirection, FadePoll, Layer, Node, Position, Signal, build_chain,
};
use crate::scheduler::{Scheduler, TaskHandle};

/// Period of the simulation tick.
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(20);

/// Where surface dimensions come from, and where the chosen size is written back.
pub trait SizeSource {
    /// Bounding box size of the parent container, if there is one.
    fn container_size(&self) -> Option<Vec2>;
    fn viewport_size(&self) -> Vec2;

    /// Distance from the top of the viewport to the container.
    fn container_top(&self) -> f32 {
        0.0
    }

    /// Called with the floored offset and size after every resize, so the host
    /// surface can be moved and sized to match the layers.
    fn apply(&self, _top: f32, _size: Vec2) {}
}

/// A size source that never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSize {
    pub container: Option<Vec2>,
    pub viewport: Vec2,
}

impl SizeSource for FixedSize {
    fn container_size(&self) -> Option<Vec2> {
        self.container
    }

    fn viewport_size(&self) -> Vec2 {
        self.viewport
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    FadingIn,
    Running,
    FadingOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynapseEvent {
    Tick,
    FadeStep,
}

pub struct SynapseBg<C: Canvas> {
    network_layer: Layer<C>,
    signal_layer: Layer<C>,
    options: SynapseOptions,
    color: Arc<ColorCoords>,
    sizing: Box<dyn SizeSource>,
    scheduler: Scheduler<SynapseEvent>,
    tick: Option<TaskHandle>,
    fade: Option<Fade>,
    phase: Phase,
    generation: u64,
    rng: StdRng,
    resize_tx: flume::Sender<()>,
    resize_rx: flume::Receiver<()>,
}

impl<C: Canvas> SynapseBg<C> {
    pub fn new(
        network_canvas: C,
        signal_canvas: C,
        options: SynapseOptions,
        sizing: Box<dyn SizeSource>,
        now: Duration,
    ) -> Self {
        Self::with_rng(network_canvas, signal_canvas, options, sizing, StdRng::from_entropy(), now)
    }

    /// Like `new`, with node placement drawn from `rng`.
    pub fn with_rng(
        network_canvas: C,
        signal_canvas: C,
        options: SynapseOptions,
        sizing: Box<dyn SizeSource>,
        rng: StdRng,
        now: Duration,
    ) -> Self {
        let options = options.normalized();
        let color = Arc::new(options.color_coords());
        let (resize_tx, resize_rx) = flume::unbounded();

        let mut synapse = Self {
            network_layer: Layer::new(network_canvas),
            signal_layer: Layer::new(signal_canvas),
            options,
            color,
            sizing,
            scheduler: Scheduler::new(),
            tick: None,
            fade: None,
            phase: Phase::Initializing,
            generation: 0,
            rng,
            resize_tx,
            resize_rx,
        };
        synapse.init(now);
        synapse
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of networks built so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn options(&self) -> &SynapseOptions {
        &self.options
    }

    pub fn network_layer(&self) -> &Layer<C> {
        &self.network_layer
    }

    pub fn signal_layer(&self) -> &Layer<C> {
        &self.signal_layer
    }

    pub fn network_layer_mut(&mut self) -> &mut Layer<C> {
        &mut self.network_layer
    }

    pub fn signal_layer_mut(&mut self) -> &mut Layer<C> {
        &mut self.signal_layer
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.is_some_and(|t| self.scheduler.is_scheduled(t))
    }

    /// Send `()` here whenever the container or viewport changes size.
    pub fn resize_notifier(&self) -> flume::Sender<()> {
        self.resize_tx.clone()
    }

    /// When `advance` next has something to do.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Applies pending resize notifications, then runs every timer due by `now`.
    pub fn advance(&mut self, now: Duration) {
        if self.resize_rx.try_iter().count() > 0 {
            self.resize();
        }

        while let Some((_, event)) = self.scheduler.pop_due(now) {
            match event {
                SynapseEvent::Tick => self.cycle(now),
                SynapseEvent::FadeStep => self.fade_step(now),
            }
        }
    }

    /// Drops everything in flight and starts over with `options`.
    pub fn reconfigure(&mut self, options: SynapseOptions, now: Duration) {
        self.options = options.normalized();
        self.color = Arc::new(self.options.color_coords());
        self.scheduler = Scheduler::new();
        self.tick = None;
        self.fade = None;
        self.network_layer.set_entities(Vec::new());
        self.signal_layer.set_entities(Vec::new());
        self.init(now);
    }

    /// Re-reads the surface size and redraws both layers; entities are left untouched.
    pub fn resize(&mut self) {
        let container = if self.options.viewport { None } else { self.sizing.container_size() };
        let (top, size) = match container {
            Some(size) => (self.sizing.container_top(), size),
            None => (0.0, self.sizing.viewport_size()),
        };
        let (top, size) = (top.floor(), size.floor().max(Vec2::ZERO));
        let (width, height) = (size.x as u32, size.y as u32);
        log::debug!("Resize {}, {} at top {}", width, height, top);
        self.sizing.apply(top, size);

        for layer in [&mut self.network_layer, &mut self.signal_layer] {
            layer.canvas_mut().set_size(width, height);
            layer.render_all();
        }
    }

    fn init(&mut self, now: Duration) {
        self.phase = Phase::Initializing;
        self.resize();
        let path = self.create_network();
        self.create_signal(&path);
        self.generation += 1;

        let waypoints = match self.signal_layer.entities().last() {
            Some(Entity::Signal(signal)) => signal.waypoints().len(),
            _ => 0,
        };
        log::info!(
            "Network generation {} with {} nodes and {} waypoints.",
            self.generation,
            path.len(),
            waypoints
        );

        self.fade = Some(self.network_layer.begin_fade(FadeDirection::In));
        self.set_phase(Phase::FadingIn);
        self.fade_step(now);
    }

    fn create_network(&mut self) -> Vec<Position> {
        let nodes = build_chain(self.options.network_size, &self.color, &mut self.rng);
        let path: Vec<Position> = nodes.iter().map(Node::pos).collect();
        self.network_layer
            .set_entities(nodes.into_iter().map(Entity::from).collect());
        path
    }

    fn create_signal(&mut self, path: &[Position]) {
        let signal = Signal::new(
            path,
            self.color.clone(),
            self.options.speed_scale,
            self.options.tracer_scale,
        );
        self.signal_layer.add_entity(signal);
    }

    // The next step is armed from `now`, not from when this one was due, so a
    // stalled host resumes the fade where it left off instead of bursting.
    fn fade_step(&mut self, now: Duration) {
        let Some(mut fade) = self.fade.take() else {
            return;
        };
        match self.network_layer.fade_step(&mut fade) {
            FadePoll::Pending => {
                self.fade = Some(fade);
                self.scheduler
                    .set_timeout(now, crate::scene::fade::FADE_INTERVAL, SynapseEvent::FadeStep);
            }
            FadePoll::Done => {
                log::debug!("Fade {:?} done after {} steps.", fade.direction(), fade.steps());
                match fade.direction() {
                    FadeDirection::In => self.start(now),
                    FadeDirection::Out => self.init(now),
                }
            }
        }
    }

    fn start(&mut self, now: Duration) {
        self.stop();
        self.tick = Some(self.scheduler.set_interval(now, CYCLE_INTERVAL, SynapseEvent::Tick));
        self.set_phase(Phase::Running);
    }

    fn stop(&mut self) {
        if let Some(tick) = self.tick.take() {
            self.scheduler.cancel(tick);
        }
    }

    fn cycle(&mut self, now: Duration) {
        if self.signal_layer.has_active() {
            log::trace!("cycle: {} signal-layer entities", self.signal_layer.entities().len());
            self.signal_layer.cycle_all();
        } else {
            self.reset(now);
        }
    }

    fn reset(&mut self, now: Duration) {
        self.stop();
        self.fade = Some(self.network_layer.begin_fade(FadeDirection::Out));
        self.set_phase(Phase::FadingOut);
        self.fade_step(now);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            log::debug!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;

    fn synapse(options: SynapseOptions) -> SynapseBg<RecordingCanvas> {
        let sizing = FixedSize { container: Some(Vec2::new(320.5, 240.9)), viewport: Vec2::new(800.0, 600.0) };
        SynapseBg::with_rng(
            RecordingCanvas::new(0, 0),
            RecordingCanvas::new(0, 0),
            options,
            Box::new(sizing),
            StdRng::seed_from_u64(42),
            Duration::ZERO,
        )
    }

    #[test]
    fn init_builds_network_and_signal_then_fades_in() {
        let synapse = synapse(SynapseOptions::default());
        assert_eq!(synapse.phase(), Phase::FadingIn);
        assert_eq!(synapse.generation(), 1);
        assert_eq!(synapse.network_layer().entities().len(), 5);
        assert_eq!(synapse.signal_layer().entities().len(), 1);
        assert!(!synapse.is_ticking());
        // first fade frame runs immediately
        assert!((synapse.network_layer().global_alpha() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn sizes_from_container_unless_viewport() {
        let synapse = synapse(SynapseOptions::default());
        assert_eq!(synapse.network_layer().canvas().width(), 320);
        assert_eq!(synapse.signal_layer().canvas().height(), 240);

        let synapse = synapse_with_viewport();
        assert_eq!(synapse.network_layer().canvas().width(), 800);
        assert_eq!(synapse.network_layer().canvas().height(), 600);
    }

    #[derive(Default)]
    struct PageSize {
        applied: std::rc::Rc<std::cell::RefCell<Vec<(f32, Vec2)>>>,
    }

    impl SizeSource for PageSize {
        fn container_size(&self) -> Option<Vec2> {
            Some(Vec2::new(300.7, 150.2))
        }

        fn viewport_size(&self) -> Vec2 {
            Vec2::new(1920.0, 1080.0)
        }

        fn container_top(&self) -> f32 {
            64.9
        }

        fn apply(&self, top: f32, size: Vec2) {
            self.applied.borrow_mut().push((top, size));
        }
    }

    #[test]
    fn chosen_size_is_applied_to_the_host_surface() {
        let page = PageSize::default();
        let applied = page.applied.clone();
        let mut synapse = SynapseBg::with_rng(
            RecordingCanvas::new(0, 0),
            RecordingCanvas::new(0, 0),
            SynapseOptions::default(),
            Box::new(page),
            StdRng::seed_from_u64(7),
            Duration::ZERO,
        );
        assert_eq!(applied.borrow().last(), Some(&(64.0, Vec2::new(300.0, 150.0))));

        synapse.reconfigure(SynapseOptions { viewport: true, ..Default::default() }, Duration::ZERO);
        assert_eq!(applied.borrow().last(), Some(&(0.0, Vec2::new(1920.0, 1080.0))));
        assert_eq!(synapse.network_layer().canvas().width(), 1920);
    }

    fn synapse_with_viewport() -> SynapseBg<RecordingCanvas> {
        synapse(SynapseOptions { viewport: true, ..Default::default() })
    }

    #[test]
    fn ticking_starts_only_after_fade_in() {
        let mut synapse = synapse(SynapseOptions::default());
        let step = crate::scene::fade::FADE_INTERVAL;

        for frame in 1..100 {
            synapse.advance(step * frame);
        }
        assert_eq!(synapse.phase(), Phase::FadingIn);
        assert!(!synapse.is_ticking());

        synapse.advance(step * 100);
        assert_eq!(synapse.phase(), Phase::Running);
        assert!(synapse.is_ticking());
        assert_eq!(synapse.network_layer().global_alpha(), 1.0);
        assert_eq!(synapse.next_deadline(), Some(step * 100 + CYCLE_INTERVAL));
    }

    #[test]
    fn stalled_host_gets_one_fade_step_not_a_burst() {
        let mut synapse = synapse(SynapseOptions::default());
        let step = crate::scene::fade::FADE_INTERVAL;

        synapse.advance(step * 99);
        assert_eq!(synapse.phase(), Phase::FadingIn);
        assert!((synapse.network_layer().global_alpha() - 0.02).abs() < 1e-9);
        assert_eq!(synapse.next_deadline(), Some(step * 100));
    }

    #[test]
    fn reconfigure_starts_a_fresh_generation() {
        let mut synapse = synapse(SynapseOptions::default());
        synapse.reconfigure(SynapseOptions { network_size: 3, ..Default::default() }, Duration::ZERO);
        assert_eq!(synapse.generation(), 2);
        assert_eq!(synapse.network_layer().entities().len(), 3);
        assert_eq!(synapse.signal_layer().entities().len(), 1);
        assert_eq!(synapse.phase(), Phase::FadingIn);
    }
}
