use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::bus::EventBus;
use crate::emitter::Emitter;

/// Delta reported before the first tick (one 60 Hz frame).
pub const INITIAL_DELTA: Duration = Duration::from_millis(16);

/// Frame deltas above this are clamped so that animation speed does not
/// depend on the display refresh rate or on stalls.
pub const DEFAULT_DELTA_CAP: Duration = Duration::from_millis(60);

/// Frames-per-second over a sliding window.
///
/// The rate is derived from the spacing between the oldest and newest frame
/// still inside the window, so it settles after two frames.
#[derive(Debug, Clone)]
pub struct FrameRate {
    frames: VecDeque<Instant>,
    window: Duration,
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl FrameRate {
    pub fn new(window: Duration) -> Self {
        Self {
            frames: VecDeque::new(),
            window,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.frames.push_back(now);
        while let Some(&oldest) = self.frames.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn per_second(&self) -> f64 {
        let (Some(oldest), Some(newest)) = (self.frames.front(), self.frames.back()) else {
            return 0.0;
        };
        let span = newest.saturating_duration_since(*oldest).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }
        (self.frames.len() - 1) as f64 / span
    }
}

/// The frame clock.
///
/// `Time` does not schedule anything itself: the host loop calls
/// [`tick`](Time::tick) once per frame and the clock triggers `"tick"` on its
/// bus. Listeners receive one argument describing the frame:
///
/// ```json
/// { "frame": 12, "delta_ms": 16.0, "elapsed_ms": 200.0 }
/// ```
#[derive(Debug)]
pub struct Time {
    events: EventBus,
    start: Instant,
    current: Instant,
    elapsed: Duration,
    delta: Duration,
    delta_cap: Duration,
    frame: u64,
    rate: FrameRate,
    running: bool,
}

impl Time {
    pub fn new(start: Instant) -> Self {
        Self {
            events: EventBus::new(),
            start,
            current: start,
            elapsed: Duration::ZERO,
            delta: INITIAL_DELTA,
            delta_cap: DEFAULT_DELTA_CAP,
            frame: 0,
            rate: FrameRate::default(),
            running: true,
        }
    }

    pub fn with_delta_cap(mut self, cap: Duration) -> Self {
        self.delta_cap = cap;
        self
    }

    /// Advance the clock to `now` and trigger `"tick"`.
    ///
    /// Returns the first listener answer. A stopped clock ignores ticks.
    pub fn tick(&mut self, now: Instant) -> Option<Value> {
        if !self.running {
            return None;
        }

        self.delta = now
            .saturating_duration_since(self.current)
            .min(self.delta_cap);
        self.elapsed = now.saturating_duration_since(self.start);
        self.current = now;
        self.frame += 1;
        self.rate.record(now);

        let frame = self.frame_info();
        self.events.trigger("tick", &[frame]).ok().flatten()
    }

    /// Stop the clock. Subsequent ticks are ignored.
    pub fn stop(&mut self) {
        if self.running {
            tracing::debug!(frames = self.frame, "frame clock stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn fps(&self) -> f64 {
        self.rate.per_second()
    }

    pub fn frame_info(&self) -> Value {
        json!({
            "frame": self.frame,
            "delta_ms": millis(self.delta),
            "elapsed_ms": millis(self.elapsed),
        })
    }
}

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

impl Emitter for Time {
    fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_with_one_frame_delta() {
        let time = Time::new(Instant::now());
        assert_eq!(time.delta(), INITIAL_DELTA);
        assert_eq!(time.elapsed(), Duration::ZERO);
        assert_eq!(time.frame(), 0);
        assert!(time.is_running());
    }

    #[test]
    fn tick_updates_delta_and_elapsed() {
        let start = Instant::now();
        let mut time = Time::new(start);
        time.tick(start + ms(20));
        time.tick(start + ms(45));
        assert_eq!(time.delta(), ms(25));
        assert_eq!(time.elapsed(), ms(45));
        assert_eq!(time.frame(), 2);
    }

    #[test]
    fn delta_is_capped() {
        let start = Instant::now();
        let mut time = Time::new(start);
        time.tick(start + ms(500));
        assert_eq!(time.delta(), DEFAULT_DELTA_CAP);
        assert_eq!(time.elapsed(), ms(500));

        let mut slow = Time::new(start).with_delta_cap(ms(10));
        slow.tick(start + ms(30));
        assert_eq!(slow.delta(), ms(10));
    }

    #[test]
    fn tick_triggers_listeners_with_frame_info() {
        let start = Instant::now();
        let mut time = Time::new(start);
        let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
        {
            let seen = Rc::clone(&seen);
            time.on("tick.camera", move |args| {
                seen.borrow_mut().push(args[0].clone());
                None
            })
            .unwrap();
        }

        time.tick(start + ms(16));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["frame"], 1);
        assert_eq!(seen[0]["delta_ms"], 16.0);
        assert_eq!(seen[0]["elapsed_ms"], 16.0);
    }

    #[test]
    fn stopped_clock_ignores_ticks() {
        let start = Instant::now();
        let mut time = Time::new(start);
        let count = Rc::new(std::cell::Cell::new(0));
        {
            let count = Rc::clone(&count);
            time.on("tick", move |_| {
                count.set(count.get() + 1);
                None
            })
            .unwrap();
        }

        time.tick(start + ms(16));
        time.stop();
        time.tick(start + ms(32));
        assert_eq!(count.get(), 1);
        assert_eq!(time.frame(), 1);
        assert!(!time.is_running());
    }

    #[test]
    fn tick_returns_first_answer() {
        let start = Instant::now();
        let mut time = Time::new(start);
        time.on("tick", |_| None).unwrap();
        time.on("tick.render", |_| Some(json!("drawn"))).unwrap();
        assert_eq!(time.tick(start + ms(16)), Some(json!("drawn")));
    }

    #[test]
    fn rate_is_zero_until_two_frames() {
        let mut rate = FrameRate::default();
        assert_eq!(rate.per_second(), 0.0);
        rate.record(Instant::now());
        assert_eq!(rate.per_second(), 0.0);
    }

    #[test]
    fn rate_follows_frame_spacing() {
        let base = Instant::now();
        let mut rate = FrameRate::new(Duration::from_secs(1));
        for i in 0..10 {
            rate.record(base + ms(i * 100));
        }
        let fps = rate.per_second();
        assert!((fps - 10.0).abs() < 0.01, "fps was {fps}");
    }

    #[test]
    fn rate_forgets_frames_outside_window() {
        let base = Instant::now();
        let mut rate = FrameRate::new(Duration::from_secs(1));
        for i in 0..5 {
            rate.record(base + ms(i * 10));
        }
        rate.record(base + ms(2000));
        rate.record(base + ms(2500));
        assert_eq!(rate.frames.len(), 2);
        assert!((rate.per_second() - 2.0).abs() < 0.01);
    }

    #[test]
    fn clock_reports_fps() {
        let start = Instant::now();
        let mut time = Time::new(start);
        for i in 1..=5 {
            time.tick(start + ms(i * 50));
        }
        assert!((time.fps() - 20.0).abs() < 0.01, "fps was {}", time.fps());
    }
}
