//! Shade Module
//!
//! Shade modes and the time-normalised roll animation. The animation
//! spends a fixed wall-clock budget no matter how fast the display is:
//! a slow display gets fewer, larger steps.

use std::time::{Duration, Instant};

/// Smallest height change per animation step
pub const MIN_SHADE_STEP: u32 = 4;

/// Fastest configurable animation speed
pub const MAX_SHADE_SPEED: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadeMode {
    #[default]
    None,
    /// Shaded by the user
    Normal,
    /// Temporarily unshaded while the pointer hovers
    Hover,
    /// Temporarily unshaded because the window was activated
    Activated,
}

impl ShadeMode {
    /// Rolled up, as far as the rest of the system is concerned
    pub fn is_shaded(self) -> bool {
        self != ShadeMode::None
    }
}

/// Total animation time for a speed setting
pub fn animation_budget(speed: u8) -> Duration {
    let speed = u64::from(speed.min(MAX_SHADE_SPEED));
    Duration::from_millis(40 * (11 - speed))
}

/// One roll from `from` to `to` frame height
#[derive(Debug, Clone)]
pub struct ShadeAnimation {
    from: u32,
    to: u32,
    current: u32,
    budget: Duration,
    started: Instant,
}

impl ShadeAnimation {
    pub fn new(from: u32, to: u32, speed: u8, started: Instant) -> Self {
        Self {
            from,
            to,
            current: from,
            budget: animation_budget(speed),
            started,
        }
    }

    pub fn distance(&self) -> u32 {
        self.from.abs_diff(self.to)
    }

    /// Upper bound on the number of heights [`next_height`](Self::next_height) yields
    pub fn max_steps(&self) -> u32 {
        self.distance().div_ceil(MIN_SHADE_STEP)
    }

    pub fn is_done(&self) -> bool {
        self.current == self.to
    }

    /// Height for the frame at `now`, or `None` once the target is reached
    ///
    /// Follows elapsed time but moves at least [`MIN_SHADE_STEP`] per call
    /// and never overshoots the target.
    pub fn next_height(&mut self, now: Instant) -> Option<u32> {
        if self.is_done() {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.started);
        let travelled = if self.budget.is_zero() || elapsed >= self.budget {
            self.distance()
        } else {
            let scaled = u128::from(self.distance()) * elapsed.as_nanos() / self.budget.as_nanos();
            scaled as u32
        };

        let done_so_far = self.current.abs_diff(self.from);
        let advance = travelled
            .saturating_sub(done_so_far)
            .max(MIN_SHADE_STEP)
            .min(self.current.abs_diff(self.to));

        self.current = if self.to < self.from {
            self.current - advance
        } else {
            self.current + advance
        };
        Some(self.current)
    }
}
