//! Control context
//!
//! Everything an operation on a managed window may touch besides the
//! window itself: the display, the workspace policy, timers and helper
//! processes, the animation clock, configuration and the current
//! protocol timestamp. One context is built per dispatched event.

use std::time::Instant;

use crate::config::Config;
use crate::wm::protocol::{Timestamp, WindowServer};
use crate::wm::scheduler::Scheduler;
use crate::wm::workspace::Workspace;

/// Time source for the shading animation
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct Context<'a> {
    pub server: &'a mut dyn WindowServer,
    pub workspace: &'a mut dyn Workspace,
    pub scheduler: &'a mut dyn Scheduler,
    pub clock: &'a dyn Clock,
    pub config: &'a Config,
    /// Timestamp of the event being processed
    pub timestamp: Timestamp,
}
