//! X11 Async Event Stream
//!
//! Lets the tokio loop wait on the X11 socket. A blocking task polls the
//! connection's file descriptor with mio and wakes the loop through a
//! [`Notify`] whenever it becomes readable.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{oneshot, Notify};
use tracing::{info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

const X11_TOKEN: mio::Token = mio::Token(0);

/// Poll interval of the watcher; bounds how long shutdown takes
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct X11EventStream {
    conn: Arc<RustConnection>,
    notify: Arc<Notify>,
    /// Dropping this stops the watcher
    _watcher_guard: oneshot::Receiver<()>,
}

impl X11EventStream {
    /// Start watching the connection's socket
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let watcher_notify = Arc::clone(&notify);

        let (guard, watcher_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), X11_TOKEN, mio::Interest::READABLE)
            .context("Failed to register X11 FD with mio")?;

        tokio::task::spawn_blocking(move || {
            let mut events = mio::Events::with_capacity(1);
            loop {
                if guard.is_closed() {
                    info!("X11 socket watcher shutting down");
                    return;
                }
                if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                    warn!("X11 socket poll failed: {:?}", e);
                    continue;
                }
                if events.iter().any(|event| event.token() == X11_TOKEN) {
                    watcher_notify.notify_one();
                }
            }
        });

        Ok(Self {
            conn,
            notify,
            _watcher_guard: watcher_guard,
        })
    }

    /// Next queued event, without blocking
    pub fn poll_next_event(&self) -> Result<Option<Event>> {
        Ok(self.conn.poll_for_event()?)
    }

    /// Resolves once the socket has become readable
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }

    /// Send out everything queued since the last flush
    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}
