//! Area window client
//!
//! Takes over the X screen and runs the per-window control layer: every
//! managed window gets a frame, its state changes are mirrored to the
//! server and unresponsive clients are offered to the kill helper.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{ConfigureWindowAux, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use area_client::config::Config;
use area_client::wm::context::{Context, SystemClock};
use area_client::wm::events::{self, ConfigureRequest, Followup};
use area_client::wm::protocol::{Timestamp, WindowId};
use area_client::wm::scheduler::{ControlEvent, TokioScheduler};
use area_client::wm::screen::RootWorkspace;
use area_client::wm::workspace::Workspace;
use area_client::wm::x11::{self, X11Server};
use area_client::wm::{Atoms, Clients};
use area_client::x11_async::X11EventStream;

/// Everything the event loop owns
struct Area {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    root: WindowId,
    server: X11Server,
    workspace: RootWorkspace,
    scheduler: TokioScheduler,
    clock: SystemClock,
    config: Config,
    clients: Clients,
    /// Latest server timestamp seen
    timestamp: Timestamp,
}

impl Area {
    fn new(replace: bool, events: mpsc::UnboundedSender<ControlEvent>) -> Result<Self> {
        let config = Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        });

        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server")?;
        let conn = Arc::new(conn);
        info!("Connected to X11 display, screen {}", screen_num);

        let atoms = Atoms::new(conn.as_ref())?;
        let (owner, timestamp) = x11::become_window_manager(&conn, screen_num, &atoms, replace)?;

        let workspace = RootWorkspace::new(Arc::clone(&conn), screen_num, atoms.clone(), owner, &config);
        workspace.publish_desktops()?;
        let root = workspace.root_window();
        let server = X11Server::new(Arc::clone(&conn), atoms.clone(), root);

        Ok(Self {
            conn,
            atoms,
            root,
            server,
            workspace,
            scheduler: TokioScheduler::new(events),
            clock: SystemClock,
            config,
            clients: Clients::new(),
            timestamp,
        })
    }

    /// Borrow the window table next to a context over everything else
    fn split(&mut self) -> (&mut Clients, Context<'_>) {
        let ctx = Context {
            server: &mut self.server,
            workspace: &mut self.workspace,
            scheduler: &mut self.scheduler,
            clock: &self.clock,
            config: &self.config,
            timestamp: self.timestamp,
        };
        (&mut self.clients, ctx)
    }

    /// Manage the windows that were mapped before we took over
    fn adopt_existing(&mut self) -> Result<()> {
        let windows = x11::existing_windows(&self.conn, self.root)?;
        info!("Adopting {} existing windows", windows.len());
        let (clients, mut ctx) = self.split();
        for window in windows {
            if let Err(e) = clients.manage(&mut ctx, window) {
                warn!("Failed to manage existing window 0x{:x}: {:#}", window, e);
            }
        }
        Ok(())
    }

    fn handle_x11(&mut self, event: Event) {
        if let Event::Error(e) = &event {
            debug!("X11 error: {:?}", e);
            return;
        }
        if let Some(time) = events::timestamp_of(&event) {
            self.timestamp = time;
        }
        let Some(window_event) = events::translate(&self.atoms, self.root, &event) else {
            return;
        };
        if let Some(time) = window_event.timestamp() {
            self.timestamp = time;
        }

        let (clients, mut ctx) = self.split();
        match events::dispatch(clients, &mut ctx, window_event) {
            Ok(followup) => {
                if let Err(e) = self.follow_up(followup) {
                    warn!("Failed to finish handling {:?}: {:#}", followup, e);
                }
            }
            Err(e) => warn!("Failed to handle {:?}: {:#}", event, e),
        }
        self.hand_over_focus();
    }

    fn handle_control(&mut self, event: ControlEvent) {
        let (clients, mut ctx) = self.split();
        if let Err(e) = clients.handle_event(&mut ctx, event) {
            warn!("Failed to handle {:?}: {:#}", event, e);
        }
        self.hand_over_focus();
    }

    fn follow_up(&mut self, followup: Followup) -> Result<()> {
        match followup {
            Followup::Nothing => {}
            Followup::Focused(window) => self.workspace.focus.focused(window),
            Followup::SwitchDesktop(desktop) => {
                if self.workspace.set_current_desktop(desktop)? {
                    let (clients, mut ctx) = self.split();
                    clients.current_desktop_changed(&mut ctx)?;
                }
            }
            Followup::Configure(window, request) => self.pass_configure(window, request)?,
        }
        Ok(())
    }

    /// Unmanaged windows get exactly what they asked for
    fn pass_configure(&self, window: WindowId, request: ConfigureRequest) -> Result<()> {
        let mut aux = ConfigureWindowAux::new();
        if let Some(pos) = request.pos {
            aux = aux.x(pos.x).y(pos.y);
        }
        if let Some(size) = request.size {
            aux = aux.width(size.width).height(size.height);
        }
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    /// Focus the workspace decided to move elsewhere
    fn hand_over_focus(&mut self) {
        let Some(window) = self.workspace.focus.take_request() else {
            return;
        };
        let (clients, mut ctx) = self.split();
        match clients.get_mut(window) {
            Some(client) => {
                if let Err(e) = client.take_focus(&mut ctx) {
                    warn!("Failed to focus window 0x{:x}: {:#}", window, e);
                }
            }
            None => ctx.workspace.focus_to_null(),
        }
    }

    /// Re-read the configuration and rebuild every decoration from it
    fn reload(&mut self) {
        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Keeping current config, reload failed: {:#}", e);
                return;
            }
        };
        info!("Configuration reloaded");
        self.workspace.reconfigure(&config);
        self.config = config;
        let (clients, mut ctx) = self.split();
        clients.update_decorations(&mut ctx, true);
    }

    fn shutdown(&mut self) {
        info!("Releasing managed windows");
        let (clients, mut ctx) = self.split();
        clients.release_all(&mut ctx, true);
        if let Err(e) = self.conn.flush() {
            warn!("Failed to flush on shutdown: {}", e);
        }
    }
}

async fn run(mut area: Area, control: mpsc::UnboundedReceiver<ControlEvent>) -> Result<()> {
    let result = event_loop(&mut area, control).await;
    // Windows must be handed back even when the loop failed
    area.shutdown();
    result
}

async fn event_loop(area: &mut Area, mut control: mpsc::UnboundedReceiver<ControlEvent>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let stream = X11EventStream::new(Arc::clone(&area.conn))?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    area.adopt_existing()?;
    info!("Starting main event loop");

    loop {
        // Replies can pull events off the socket without waking the watcher
        while let Some(event) = stream.poll_next_event()? {
            area.handle_x11(event);
        }
        stream.flush()?;

        tokio::select! {
            () = stream.wait_readable() => {}
            Some(event) = control.recv() => area.handle_control(event),
            _ = sighup.recv() => area.reload(),
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                return Ok(());
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "area_client=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Area window client");

    let args: Vec<String> = std::env::args().collect();
    let replace = args.iter().any(|arg| arg == "--replace" || arg == "-r");
    if replace {
        info!("--replace flag detected: will attempt to replace existing WM");
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let area = Area::new(replace, tx)?;

    if let Err(e) = run(area, rx).await {
        error!("Application error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
