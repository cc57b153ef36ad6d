#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bone influences kept per vertex.
pub const MAX_INFLUENCES: usize = 4;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImportSettings {
    /// Kept influences whose raw sum is at or below this fall back to a single influence on bone 0.
    pub weight_epsilon: f32,
    /// Used when a source animation reports zero (or a non-finite) ticks per second.
    pub default_ticks_per_second: f64,
    /// Looping flag given to every extracted clip.
    pub loop_animations: bool,
    pub import_animations: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            weight_epsilon: 1e-3,
            default_ticks_per_second: 25.0,
            loop_animations: true,
            import_animations: true,
        }
    }
}

impl ImportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.loop_animations = looping;
        self
    }

    pub fn without_animations(mut self) -> Self {
        self.import_animations = false;
        self
    }
}
