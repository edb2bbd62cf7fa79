//! Frame timing for headless runs.

/// Advances by a fixed step per frame, independent of wall time.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    step: f32,
    frame: u32,
}

impl FixedStepClock {
    pub fn new(fps: f32) -> Self {
        let step = if fps.is_finite() && fps > 0.0 { 1.0 / fps } else { 0.0 };
        Self { step, frame: 0 }
    }

    /// `(elapsed, delta)` in seconds for the next frame.
    pub fn tick(&mut self) -> (f32, f32) {
        self.frame += 1;
        (self.frame as f32 * self.step, self.step)
    }
}
