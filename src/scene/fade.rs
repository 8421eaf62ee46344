use std::time::Duration;

/// Opacity change per fade step.
pub const DEFAULT_FADE_RATE: f64 = 0.01;
/// Delay between two fade steps.
pub const FADE_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

impl FadeDirection {
    pub fn start_opacity(self) -> f64 {
        match self {
            FadeDirection::In => 0.0,
            FadeDirection::Out => 1.0,
        }
    }

    fn sign(self) -> f64 {
        match self {
            FadeDirection::In => 1.0,
            FadeDirection::Out => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadePoll {
    Pending,
    Done,
}

/// An in-flight opacity transition, advanced one step at a time by its layer.
///
/// Opacity is derived from the step count rather than accumulated, so a fade at
/// rate `r` always completes after `ceil(1 / r)` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Fade {
    direction: FadeDirection,
    rate: f64,
    steps: u32,
}

impl Fade {
    pub fn new(direction: FadeDirection, rate: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { DEFAULT_FADE_RATE };
        Self { direction, rate, steps: 0 }
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Current opacity, clamped to `[0, 1]`.
    pub fn opacity(&self) -> f64 {
        let raw = self.direction.start_opacity()
            + self.direction.sign() * self.rate * self.steps as f64;
        raw.clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        match self.direction {
            FadeDirection::In => self.opacity() >= 1.0,
            FadeDirection::Out => self.opacity() <= 0.0,
        }
    }

    pub(crate) fn advance(&mut self) {
        self.steps += 1;
    }
}
