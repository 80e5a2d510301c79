//! Scheduler Module
//!
//! Timers and helper processes for the single control loop. Arming a
//! timer or launching a process never blocks; completion comes back
//! later as a [`ControlEvent`] carrying the window and a correlation
//! token, so stale completions are recognised by token mismatch.

use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::wm::protocol::{Timestamp, WindowId};

/// Handle of an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Handle of a tracked helper process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u64);

/// Completion delivered to the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The ping sent at `timestamp` went unanswered
    PingTimeout { window: WindowId, timestamp: Timestamp },
    /// A tracked helper process exited, whatever its status
    HelperExited { window: WindowId, process: ProcessId },
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Value of a `--flag value` pair
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

pub trait Scheduler {
    /// Single-shot timer; expiry posts [`ControlEvent::PingTimeout`]
    fn arm_ping_timer(&mut self, window: WindowId, timestamp: Timestamp, after: Duration) -> TimerId;

    fn cancel_timer(&mut self, timer: TimerId);

    /// Launch a process whose exit posts [`ControlEvent::HelperExited`]
    fn spawn_tracked(&mut self, window: WindowId, invocation: &Invocation) -> Result<ProcessId>;

    /// Stop a tracked process; its exit event may still arrive
    fn terminate(&mut self, process: ProcessId);

    /// Launch a process nobody waits for
    fn spawn_detached(&mut self, invocation: &Invocation) -> Result<()>;

    /// SIGTERM a process on this machine
    fn terminate_pid(&mut self, pid: u32) -> Result<()>;
}

/// [`Scheduler`] on top of the tokio runtime
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<ControlEvent>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    helpers: HashMap<ProcessId, oneshot::Sender<()>>,
    next_id: u64,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self {
            events,
            timers: HashMap::new(),
            helpers: HashMap::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Scheduler for TokioScheduler {
    fn arm_ping_timer(&mut self, window: WindowId, timestamp: Timestamp, after: Duration) -> TimerId {
        self.timers.retain(|_, handle| !handle.is_finished());

        let timer = TimerId(self.next_id());
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(ControlEvent::PingTimeout { window, timestamp });
        });
        self.timers.insert(timer, handle);
        timer
    }

    fn cancel_timer(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer) {
            handle.abort();
        }
    }

    fn spawn_tracked(&mut self, window: WindowId, invocation: &Invocation) -> Result<ProcessId> {
        self.helpers.retain(|_, kill| !kill.is_closed());

        let mut child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .spawn()
            .with_context(|| format!("Failed to launch {}", invocation.program))?;

        let process = ProcessId(self.next_id());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    debug!("Helper {:?} exited: {:?}", process, status);
                }
                Ok(()) = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to stop helper {:?}: {}", process, e);
                    }
                }
            }
            let _ = events.send(ControlEvent::HelperExited { window, process });
        });
        self.helpers.insert(process, kill_tx);
        Ok(process)
    }

    fn terminate(&mut self, process: ProcessId) {
        if let Some(kill) = self.helpers.remove(&process) {
            let _ = kill.send(());
        }
    }

    fn spawn_detached(&mut self, invocation: &Invocation) -> Result<()> {
        let mut child = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .spawn()
            .with_context(|| format!("Failed to launch {}", invocation.program))?;
        // Reap it so it does not linger as a zombie
        tokio::spawn(async move {
            let _ = child.wait().await;
        });
        Ok(())
    }

    fn terminate_pid(&mut self, pid: u32) -> Result<()> {
        let pid = i32::try_from(pid).context("pid out of range")?;
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)
            .with_context(|| format!("Failed to signal pid {}", pid))?;
        Ok(())
    }
}
