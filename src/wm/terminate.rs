//! Terminate Module
//!
//! Liveness checking of clients and the escalation to killing them.
//! A ping goes out on close; if it is not answered in time the user is
//! asked, through an out-of-process helper, whether to kill the owner.

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::wm::context::Context;
use crate::wm::protocol::{ProtocolMessage, Timestamp, WindowId, CURRENT_TIME};
use crate::wm::scheduler::{Invocation, ProcessId, TimerId};

/// How long a client has to answer a ping
pub const PING_TIMEOUT: Duration = Duration::from_millis(5000);

/// What is known about the process behind a window
#[derive(Debug, Clone, Copy)]
pub struct KillTarget<'a> {
    pub window: WindowId,
    pub pid: Option<u32>,
    /// Normalised client machine, "localhost" for this host
    pub machine: Option<&'a str>,
    pub caption: &'a str,
    pub resource_class: &'a str,
}

/// Interactive "not responding" helper invocation
pub fn kill_helper_invocation(
    config: &LivenessConfig,
    target: &KillTarget<'_>,
    pid: u32,
    machine: &str,
    timestamp: Timestamp,
) -> Invocation {
    Invocation::new(&config.kill_helper)
        .arg("--pid")
        .arg(pid.to_string())
        .arg("--hostname")
        .arg(machine)
        .arg("--windowname")
        .arg(target.caption)
        .arg("--applicationname")
        .arg(target.resource_class)
        .arg("--wid")
        .arg(target.window.to_string())
        .arg("--timestamp")
        .arg(timestamp.to_string())
}

/// `kill` run on the client's host through the remote execution program
pub fn remote_kill_invocation(config: &LivenessConfig, machine: &str, pid: u32) -> Invocation {
    Invocation::new(&config.remote_exec)
        .arg(machine)
        .arg("kill")
        .arg(pid.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingPing {
    timer: TimerId,
    timestamp: Timestamp,
}

/// Per-window ping and kill-helper state
///
/// At most one ping and one helper are outstanding at any time.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    pending: Option<PendingPing>,
    /// Timestamp of the most recent ping; outlives the timer
    last_ping: Option<Timestamp>,
    killer: Option<ProcessId>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pinging(&self) -> bool {
        self.pending.is_some()
    }

    pub fn killer(&self) -> Option<ProcessId> {
        self.killer
    }

    /// Send a ping unless unsupported or one is already outstanding
    pub fn ping(&mut self, ctx: &mut Context<'_>, window: WindowId, supported: bool) -> Result<()> {
        if !supported || self.pending.is_some() {
            return Ok(());
        }
        let timestamp = ctx.timestamp;
        if timestamp == CURRENT_TIME {
            // A reply could not be told apart from an older one
            debug!("No server time yet, not pinging window 0x{:x}", window);
            return Ok(());
        }
        let timer = ctx.scheduler.arm_ping_timer(window, timestamp, PING_TIMEOUT);
        self.pending = Some(PendingPing { timer, timestamp });
        self.last_ping = Some(timestamp);
        debug!("Pinging window 0x{:x} at {}", window, timestamp);
        ctx.server.send_message(window, ProtocolMessage::Ping, timestamp)
    }

    /// A ping reply arrived; returns whether it matched
    pub fn got_ping(&mut self, ctx: &mut Context<'_>, window: WindowId, timestamp: Timestamp) -> bool {
        if self.last_ping != Some(timestamp) {
            debug!("Ignoring stale ping reply {} from 0x{:x}", timestamp, window);
            return false;
        }
        if let Some(pending) = self.pending.take() {
            ctx.scheduler.cancel_timer(pending.timer);
        }
        if let Some(killer) = self.killer.take() {
            info!("Window 0x{:x} answered after all, stopping kill helper", window);
            ctx.scheduler.terminate(killer);
        }
        true
    }

    /// The ping timer fired; escalates if it belongs to the outstanding ping
    pub fn ping_timeout(&mut self, ctx: &mut Context<'_>, target: &KillTarget<'_>, timestamp: Timestamp) -> Result<()> {
        match self.pending {
            Some(pending) if pending.timestamp == timestamp => {
                self.pending = None;
                warn!("Ping timeout: window 0x{:x} ({})", target.window, target.caption);
                self.kill_process(ctx, target, true, timestamp)
            }
            _ => {
                debug!("Ignoring stale ping timeout {} for 0x{:x}", timestamp, target.window);
                Ok(())
            }
        }
    }

    /// Terminate the owning process, directly or after asking the user
    ///
    /// `timestamp` proves when the window was found unresponsive and is
    /// only meaningful when asking.
    pub fn kill_process(
        &mut self,
        ctx: &mut Context<'_>,
        target: &KillTarget<'_>,
        ask: bool,
        timestamp: Timestamp,
    ) -> Result<()> {
        if self.killer.is_some() {
            return Ok(());
        }
        if ask && timestamp == CURRENT_TIME {
            warn!("Not asking to kill window 0x{:x} without a server time", target.window);
            return Ok(());
        }
        let (Some(pid), Some(machine)) = (target.pid, target.machine) else {
            debug!("Cannot kill window 0x{:x}: pid or host unknown", target.window);
            return Ok(());
        };
        info!("Kill process {} ({}) of window 0x{:x}", pid, machine, target.window);

        let liveness = &ctx.config.liveness;
        if !ask {
            if machine == "localhost" {
                ctx.scheduler.terminate_pid(pid)
            } else {
                ctx.scheduler.spawn_detached(&remote_kill_invocation(liveness, machine, pid))
            }
        } else {
            let helper = kill_helper_invocation(liveness, target, pid, machine, timestamp);
            match ctx.scheduler.spawn_tracked(target.window, &helper) {
                Ok(process) => {
                    self.killer = Some(process);
                }
                Err(e) => warn!("Kill helper for window 0x{:x} did not start: {}", target.window, e),
            }
            Ok(())
        }
    }

    /// A tracked helper exited; returns whether it was ours
    pub fn helper_exited(&mut self, process: ProcessId) -> bool {
        if self.killer == Some(process) {
            debug!("Kill helper {:?} exited", process);
            self.killer = None;
            true
        } else {
            false
        }
    }

    /// Drop the ping timer before the window goes away
    ///
    /// A running helper is left alone; it ends on its own.
    pub fn cancel(&mut self, ctx: &mut Context<'_>) {
        if let Some(pending) = self.pending.take() {
            ctx.scheduler.cancel_timer(pending.timer);
        }
    }
}
