// src/scheduler.rs
// Interval and one-shot timers over an explicit clock, so timing is testable without real time.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Source of the current time, measured from an arbitrary fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `instant::Instant` (works on native and wasm).
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: instant::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: instant::Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Virtual clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, by: Duration) -> Duration {
        self.now += by;
        self.now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }
}

#[derive(Debug, Clone)]
struct Timer<E> {
    handle: TaskHandle,
    due: Duration,
    period: Option<Duration>,
    event: E,
}

/// Pending timers, each yielding a copy of its event when it fires.
#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    timers: Vec<Timer<E>>,
    next_handle: u64,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self { timers: Vec::new(), next_handle: 1 }
    }
}

impl<E: Clone> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `event` every `period`, first at `now + period`.
    pub fn set_interval(&mut self, now: Duration, period: Duration, event: E) -> TaskHandle {
        let period = period.max(Duration::from_millis(1));
        self.push(now + period, Some(period), event)
    }

    /// Fires `event` once at `now + delay`.
    pub fn set_timeout(&mut self, now: Duration, delay: Duration, event: E) -> TaskHandle {
        self.push(now + delay, None, event)
    }

    /// Returns whether a timer was actually cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        before != self.timers.len()
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Pops the earliest timer due at or before `now`.
    ///
    /// Intervals are re-armed one period later (or one period after `now` if they
    /// fell behind), so a stalled clock never produces a burst of ticks.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TaskHandle, E)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.handle.0))
            .map(|(i, _)| i)?;

        let timer = &mut self.timers[index];
        let fired = (timer.handle, timer.event.clone());
        match timer.period {
            Some(period) => {
                let next = timer.due + period;
                timer.due = if next <= now { now + period } else { next };
            }
            None => {
                self.timers.remove(index);
            }
        }
        Some(fired)
    }

    fn push(&mut self, due: Duration, period: Option<Duration>, event: E) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.push(Timer { handle, due, period, event });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn drain(scheduler: &mut Scheduler<&'static str>, now: Duration) -> Vec<&'static str> {
        std::iter::from_fn(|| scheduler.pop_due(now).map(|(_, e)| e)).collect()
    }

    #[test]
    fn timeout_fires_once() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timeout(Duration::ZERO, 20 * MS, "fade");

        assert!(drain(&mut scheduler, 19 * MS).is_empty());
        assert_eq!(drain(&mut scheduler, 20 * MS), vec!["fade"]);
        assert!(drain(&mut scheduler, 100 * MS).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn interval_repeats_without_bursting() {
        let mut scheduler = Scheduler::new();
        scheduler.set_interval(Duration::ZERO, 20 * MS, "tick");

        assert_eq!(drain(&mut scheduler, 20 * MS), vec!["tick"]);
        assert_eq!(drain(&mut scheduler, 40 * MS), vec!["tick"]);
        // clock jumped five periods ahead: still one tick
        assert_eq!(drain(&mut scheduler, 140 * MS), vec!["tick"]);
        assert_eq!(scheduler.next_deadline(), Some(160 * MS));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = Scheduler::new();
        let tick = scheduler.set_interval(Duration::ZERO, 20 * MS, "tick");
        assert!(scheduler.is_scheduled(tick));
        assert!(scheduler.cancel(tick));
        assert!(!scheduler.cancel(tick));
        assert!(drain(&mut scheduler, 1000 * MS).is_empty());
    }

    #[test]
    fn timers_fire_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.set_timeout(Duration::ZERO, 30 * MS, "late");
        scheduler.set_timeout(Duration::ZERO, 10 * MS, "early");
        assert_eq!(scheduler.next_deadline(), Some(10 * MS));
        assert_eq!(drain(&mut scheduler, 30 * MS), vec!["early", "late"]);
    }

    #[test]
    fn manual_clock_advances() {
        let mut clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(20 * MS);
        assert_eq!(clock.advance(5 * MS), 25 * MS);
        assert_eq!(clock.now(), 25 * MS);
    }
}
