//! Parameter-level blending during a timed switch between two filter
//! configurations.

/// Progress of a transition from this filter's configuration toward
/// another one.
///
/// Passed into a frame explicitly; the pyramid blur reads it to interpolate
/// its strength, so a cross-fade never renders two independent results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionContext {
    target: f32,
    progress: f32,
}

impl TransitionContext {
    /// Transition toward a configuration whose strength is `target`.
    /// `progress` is clamped to `[0, 1]`; non-finite progress reads as 0.
    #[must_use]
    pub fn new(target: f32, progress: f32) -> Self {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { target, progress }
    }

    /// Fraction of the way to the target configuration.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// Strength of the target configuration.
    #[must_use]
    pub const fn target(&self) -> f32 {
        self.target
    }

    /// Linear interpolation from `own` toward the target.
    #[must_use]
    pub fn interpolate(&self, own: f32) -> f32 {
        own + (self.target - own) * self.progress
    }
}
