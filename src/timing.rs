// timing.rs: frame delta and fps for the redraw loop

use std::time::{Duration, Instant};

/// Longest step fed to the camera after a stall (window drag, breakpoint).
const MAX_DT: f32 = 0.1;
const FPS_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    pub fps: f32,
}

impl FrameTiming {
    pub fn new(now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            fps: 0.0,
        }
    }

    /// Returns the clamped delta since the previous call.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt.as_secs_f32().min(MAX_DT);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed >= FPS_WINDOW {
            self.fps = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.last_fps_time = now;
        }
        self.frame_dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_is_measured_and_clamped() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(start);
        assert!((timing.tick(start) - 0.016).abs() < 1e-6);
        assert!((timing.tick(start + Duration::from_millis(20)) - 0.02).abs() < 1e-4);
        assert_eq!(timing.tick(start + Duration::from_secs(3)), MAX_DT);
    }

    #[test]
    fn fps_updates_every_half_second() {
        let start = Instant::now();
        let mut timing = FrameTiming::new(start);
        for i in 1..=30 {
            timing.tick(start + Duration::from_millis(i * 10));
        }
        assert_eq!(timing.fps, 0.0);
        for i in 31..=50 {
            timing.tick(start + Duration::from_millis(i * 10));
        }
        assert!((timing.fps - 100.0).abs() < 1.0);
    }
}
