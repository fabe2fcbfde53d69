//! Render scheduler
//!
//! Drives render-on-demand: dirty marks coalesce into at most one render
//! per frame tick, and `tick_once` always renders. Keeps a circular buffer
//! of the last 120 frame times (about two seconds at 60 Hz) and derives
//! exact FPS, min/max/avg, percentiles, and drop tracking from it. The
//! clock is injected so metrics are deterministic under test.

use chartgpu_renderer::Timer;
use std::collections::VecDeque;

/// Frame-time history length.
pub const FRAME_HISTORY: usize = 120;

pub trait FrameClock: Send {
    /// Monotonic milliseconds.
    fn now_ms(&mut self) -> f64;
}

pub struct MonotonicClock {
    timer: Timer,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self { timer: Timer::now() }
    }
}

impl FrameClock for MonotonicClock {
    fn now_ms(&mut self) -> f64 {
        self.timer.elapsed_millis()
    }
}

/// Timing for one executed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub now_ms: f64,
    /// Time since the previous executed frame; the target interval on the
    /// first frame.
    pub delta_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameMetrics {
    /// Exact FPS over the history window: N / sum(delta).
    pub exact_fps: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub frame_count: u64,
    pub dropped_frames: u64,
    pub consecutive_drops: u32,
    pub last_drop_ms: Option<f64>,
    /// Most recent GPU submit-to-done time, when sampled.
    pub gpu_ms: Option<f64>,
}

pub struct RenderScheduler {
    clock: Box<dyn FrameClock>,
    target_interval_ms: f64,
    frame_times: VecDeque<f64>,
    last_frame_ms: Option<f64>,
    dirty: bool,
    running: bool,
    frame_count: u64,
    dropped_frames: u64,
    consecutive_drops: u32,
    last_drop_ms: Option<f64>,
    gpu_ms: Option<f64>,
}

impl RenderScheduler {
    pub fn new(target_fps: f64) -> Self {
        Self::with_clock(target_fps, Box::new(MonotonicClock::default()))
    }

    pub fn with_clock(target_fps: f64, clock: Box<dyn FrameClock>) -> Self {
        Self {
            clock,
            target_interval_ms: 1000.0 / target_fps.max(1.0),
            frame_times: VecDeque::with_capacity(FRAME_HISTORY),
            last_frame_ms: None,
            dirty: false,
            running: false,
            frame_count: 0,
            dropped_frames: 0,
            consecutive_drops: 0,
            last_drop_ms: None,
            gpu_ms: None,
        }
    }

    pub fn target_interval_ms(&self) -> f64 {
        self.target_interval_ms
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Loop tick. Renders only when running and dirty; clears the dirty
    /// flag, so back-to-back marks within one tick produce one frame.
    pub fn tick(&mut self) -> Option<FrameTiming> {
        if !self.running || !self.dirty {
            return None;
        }
        Some(self.execute_frame())
    }

    /// Manual tick: always renders, regardless of the dirty flag.
    pub fn tick_once(&mut self) -> FrameTiming {
        self.execute_frame()
    }

    fn execute_frame(&mut self) -> FrameTiming {
        let now = self.clock.now_ms();
        let delta = match self.last_frame_ms {
            Some(prev) => now - prev,
            None => self.target_interval_ms,
        };
        self.last_frame_ms = Some(now);
        self.dirty = false;
        self.frame_count += 1;

        if self.frame_times.len() == FRAME_HISTORY {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(delta);

        if delta > self.target_interval_ms * 1.5 {
            self.dropped_frames += 1;
            self.consecutive_drops += 1;
            self.last_drop_ms = Some(now);
        } else {
            self.consecutive_drops = 0;
        }

        FrameTiming {
            now_ms: now,
            delta_ms: delta,
        }
    }

    /// Record a sampled GPU completion time for the last submit.
    pub fn record_gpu_time(&mut self, gpu_ms: f64) {
        self.gpu_ms = Some(gpu_ms);
    }

    pub fn metrics(&self) -> FrameMetrics {
        if self.frame_times.is_empty() {
            return FrameMetrics {
                frame_count: self.frame_count,
                dropped_frames: self.dropped_frames,
                consecutive_drops: self.consecutive_drops,
                last_drop_ms: self.last_drop_ms,
                gpu_ms: self.gpu_ms,
                ..Default::default()
            };
        }
        let n = self.frame_times.len();
        let sum: f64 = self.frame_times.iter().sum();
        let mut sorted: Vec<f64> = self.frame_times.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let percentile = |p: f64| -> f64 {
            let rank = (p * (n - 1) as f64).round() as usize;
            sorted[rank.min(n - 1)]
        };

        FrameMetrics {
            exact_fps: if sum > 0.0 { n as f64 * 1000.0 / sum } else { 0.0 },
            avg_ms: sum / n as f64,
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            p50_ms: percentile(0.50),
            p95_ms: percentile(0.95),
            p99_ms: percentile(0.99),
            frame_count: self.frame_count,
            dropped_frames: self.dropped_frames,
            consecutive_drops: self.consecutive_drops,
            last_drop_ms: self.last_drop_ms,
            gpu_ms: self.gpu_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted clock: returns queued timestamps in order.
    struct ScriptedClock {
        times: Vec<f64>,
        cursor: usize,
    }

    impl ScriptedClock {
        fn new(times: Vec<f64>) -> Self {
            Self { times, cursor: 0 }
        }
    }

    impl FrameClock for ScriptedClock {
        fn now_ms(&mut self) -> f64 {
            let t = self.times[self.cursor.min(self.times.len() - 1)];
            self.cursor += 1;
            t
        }
    }

    fn scheduler(times: Vec<f64>) -> RenderScheduler {
        let mut s = RenderScheduler::with_clock(60.0, Box::new(ScriptedClock::new(times)));
        s.start();
        s
    }

    #[test]
    fn dirty_marks_coalesce_into_one_frame() {
        let mut s = scheduler(vec![0.0, 16.0, 32.0]);
        s.mark_dirty();
        s.mark_dirty();
        s.mark_dirty();
        assert!(s.tick().is_some());
        // The set was cleared by the single render.
        assert!(s.tick().is_none());
        assert_eq!(s.metrics().frame_count, 1);
    }

    #[test]
    fn no_render_while_clean_and_running() {
        let mut s = scheduler(vec![0.0]);
        assert!(s.tick().is_none());
        assert!(s.tick().is_none());
        assert_eq!(s.metrics().frame_count, 0);
    }

    #[test]
    fn no_render_while_stopped() {
        let mut s = scheduler(vec![0.0]);
        s.stop();
        s.mark_dirty();
        assert!(s.tick().is_none());
    }

    #[test]
    fn tick_once_always_renders() {
        let mut s = scheduler(vec![0.0, 16.0]);
        assert!(!s.is_dirty());
        let timing = s.tick_once();
        assert_eq!(timing.delta_ms, s.target_interval_ms());
        assert_eq!(s.metrics().frame_count, 1);
    }

    #[test]
    fn exact_fps_over_the_window() {
        // 0, 20, 40, 60: three 20ms deltas after the first frame.
        let mut s = scheduler(vec![0.0, 20.0, 40.0, 60.0]);
        for _ in 0..4 {
            s.mark_dirty();
            s.tick().unwrap();
        }
        let m = s.metrics();
        // First delta is the 16.67ms target, then three 20ms frames.
        let expected_sum = s.target_interval_ms() + 60.0;
        assert!((m.exact_fps - 4.0 * 1000.0 / expected_sum).abs() < 1e-9);
        assert_eq!(m.max_ms, 20.0);
    }

    #[test]
    fn drops_are_detected_and_reset() {
        // Deltas: target, 100 (drop), 100 (drop), 10 (recovers).
        let mut s = scheduler(vec![0.0, 100.0, 200.0, 210.0]);
        for _ in 0..4 {
            s.mark_dirty();
            s.tick().unwrap();
        }
        let m = s.metrics();
        assert_eq!(m.dropped_frames, 2);
        assert_eq!(m.consecutive_drops, 0);
        assert_eq!(m.last_drop_ms, Some(200.0));
    }

    #[test]
    fn consecutive_drops_accumulate() {
        let mut s = scheduler(vec![0.0, 100.0, 200.0, 300.0]);
        for _ in 0..4 {
            s.mark_dirty();
            s.tick().unwrap();
        }
        assert_eq!(s.metrics().consecutive_drops, 3);
    }

    #[test]
    fn history_is_bounded() {
        let times: Vec<f64> = (0..200).map(|i| i as f64 * 16.0).collect();
        let mut s = scheduler(times);
        for _ in 0..200 {
            s.mark_dirty();
            s.tick().unwrap();
        }
        let m = s.metrics();
        assert_eq!(m.frame_count, 200);
        // Only the last FRAME_HISTORY deltas are in the window.
        assert!((m.avg_ms - 16.0).abs() < 0.5);
    }

    #[test]
    fn percentiles_are_ordered() {
        let times: Vec<f64> = (0..50).map(|i| i as f64 * i as f64).collect();
        let mut s = scheduler(times);
        for _ in 0..50 {
            s.mark_dirty();
            s.tick().unwrap();
        }
        let m = s.metrics();
        assert!(m.min_ms <= m.p50_ms);
        assert!(m.p50_ms <= m.p95_ms);
        assert!(m.p95_ms <= m.p99_ms);
        assert!(m.p99_ms <= m.max_ms);
    }
}
