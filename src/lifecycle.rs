// lifecycle.rs: viewer phases, load status and the frame loop switch

/// Progress milestones reported while a viewer initializes.
pub mod progress {
    pub const CONTEXT_READY: u8 = 10;
    pub const ENVIRONMENT_BUILT: u8 = 50;
    pub const TEXTURE_STARTED: u8 = 70;
    pub const TEXTURE_LOADED: u8 = 90;
    pub const FIRST_FRAME: u8 = 100;

    /// Maps a loader fraction into the texture phase window.
    pub fn texture_fraction(fraction: f32) -> u8 {
        let f = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let span = (TEXTURE_LOADED - TEXTURE_STARTED) as f32;
        TEXTURE_STARTED + (f * span).round() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Error,
    Disposed,
}

/// Shown in place of the 3D view when loading failed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fallback {
    #[default]
    None,
    Image(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadStatus {
    pub is_loading: bool,
    pub has_error: bool,
    pub loading_progress: u8,
    pub error: Option<String>,
    pub fallback: Fallback,
}

impl LoadStatus {
    /// Starts a fresh attempt.
    pub fn begin(&mut self) {
        *self = LoadStatus {
            is_loading: true,
            ..LoadStatus::default()
        };
    }

    /// Progress only moves forward within one attempt.
    pub fn advance(&mut self, percent: u8) {
        if self.has_error {
            return;
        }
        self.loading_progress = self.loading_progress.max(percent.min(100));
    }

    pub fn complete(&mut self) {
        self.advance(progress::FIRST_FRAME);
        self.is_loading = false;
    }

    pub fn fail(&mut self, message: impl Into<String>, fallback: Fallback) {
        self.is_loading = false;
        self.has_error = true;
        self.error = Some(message.into());
        self.fallback = fallback;
    }
}

/// Per-frame callback switch plus a counter of completed frames.
#[derive(Debug, Default)]
pub struct FrameLoop {
    running: bool,
    frames: u64,
}

impl FrameLoop {
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&mut self) {
        self.frames += 1;
    }

    pub fn count(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotonic() {
        let mut status = LoadStatus::default();
        status.begin();
        status.advance(50);
        status.advance(10);
        assert_eq!(status.loading_progress, 50);
        status.advance(250);
        assert_eq!(status.loading_progress, 100);
    }

    #[test]
    fn begin_resets_a_failed_attempt() {
        let mut status = LoadStatus::default();
        status.begin();
        status.advance(70);
        status.fail("boom", Fallback::Unavailable);
        assert!(status.has_error && !status.is_loading);

        status.begin();
        assert_eq!(
            status,
            LoadStatus {
                is_loading: true,
                ..LoadStatus::default()
            }
        );
    }

    #[test]
    fn texture_fraction_stays_in_its_window() {
        assert_eq!(progress::texture_fraction(0.0), 70);
        assert_eq!(progress::texture_fraction(0.5), 80);
        assert_eq!(progress::texture_fraction(1.0), 90);
        assert_eq!(progress::texture_fraction(7.0), 90);
        assert_eq!(progress::texture_fraction(f32::NAN), 70);
    }
}
