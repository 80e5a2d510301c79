//! Events Module
//!
//! Turns X11 events into [`WindowEvent`]s and routes them to the managed
//! window they concern.

use anyhow::Result;
use tracing::{debug, trace};
use x11rb::protocol::shape;
use x11rb::protocol::xproto::{AtomEnum, ConfigWindow, NotifyDetail, NotifyMode, UnmapNotifyEvent};
use x11rb::protocol::Event;

use crate::shared::{Point, Size};
use crate::wm::client_flags::NetState;
use crate::wm::clients::Clients;
use crate::wm::context::Context;
use crate::wm::ewmh::Atoms;
use crate::wm::geometry::{calculate_gravitation, size_for_client_size, SizeMode};
use crate::wm::protocol::{Desktop, Timestamp, WindowId, CURRENT_TIME};
use crate::wm::shade::ShadeMode;

// WM_CHANGE_STATE payload
const ICONIC_STATE: u32 = 3;

// _NET_WM_STATE actions
const STATE_REMOVE: u32 = 0;
const STATE_ADD: u32 = 1;
const STATE_TOGGLE: u32 = 2;

/// Property whose change the client layer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Name,
    IconName,
    Hints,
    Protocols,
}

/// How a _NET_WM_STATE request treats the flags it names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    fn from_wire(value: u32) -> Option<Self> {
        match value {
            STATE_REMOVE => Some(Self::Remove),
            STATE_ADD => Some(Self::Add),
            STATE_TOGGLE => Some(Self::Toggle),
            _ => None,
        }
    }

    /// Whether `flag` ends up set when the window currently has `current`
    fn wanted(self, current: NetState, flag: NetState) -> bool {
        match self {
            Self::Remove => false,
            Self::Add => true,
            Self::Toggle => !current.contains(flag),
        }
    }
}

/// Geometry a client asked for in a ConfigureRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureRequest {
    pub pos: Option<Point>,
    pub size: Option<Size>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    MapRequest { window: WindowId },
    /// The client unmapped itself, or withdrew with a synthetic unmap
    Withdrawn { window: WindowId },
    Destroyed { window: WindowId },
    PropertyChanged { window: WindowId, kind: PropertyKind },
    Configure { window: WindowId, request: ConfigureRequest },
    ShapeChanged { window: WindowId, shaped: bool },
    FocusIn { window: WindowId },
    PingReply { window: WindowId, timestamp: Timestamp },
    Iconify { window: WindowId },
    /// `timestamp` is the requester's, `CURRENT_TIME` when it sent none
    Close { window: WindowId, timestamp: Timestamp },
    StateRequest { window: WindowId, action: StateAction, mask: NetState },
    DesktopRequest { window: WindowId, desktop: Desktop },
    SwitchDesktop { desktop: u32 },
}

impl WindowEvent {
    /// Server time carried inside the request itself
    pub fn timestamp(&self) -> Option<Timestamp> {
        match *self {
            WindowEvent::Close { timestamp, .. } if timestamp != CURRENT_TIME => Some(timestamp),
            _ => None,
        }
    }
}

/// What the main loop still has to do after dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    Nothing,
    /// Focus landed on a managed window
    Focused(WindowId),
    SwitchDesktop(u32),
    /// Unmanaged window; pass its configure request through unchanged
    Configure(WindowId, ConfigureRequest),
}

fn configure_request(e: &x11rb::protocol::xproto::ConfigureRequestEvent) -> ConfigureRequest {
    let mask = e.value_mask;
    let pos = (mask.contains(ConfigWindow::X) || mask.contains(ConfigWindow::Y))
        .then(|| Point::new(e.x as i32, e.y as i32));
    let size = (mask.contains(ConfigWindow::WIDTH) || mask.contains(ConfigWindow::HEIGHT))
        .then(|| Size::new(e.width as u32, e.height as u32));
    ConfigureRequest { pos, size }
}

/// Real unmaps reach us through the wrapper, withdrawals as synthetic
/// events on the root
fn is_withdrawal(e: &UnmapNotifyEvent, root: WindowId) -> bool {
    let synthetic = e.response_type & 0x80 != 0;
    if e.event == root {
        synthetic
    } else {
        e.event != e.window
    }
}

/// The event's timestamp, if it carries one
pub fn timestamp_of(event: &Event) -> Option<Timestamp> {
    match event {
        Event::PropertyNotify(e) => Some(e.time),
        Event::ButtonPress(e) => Some(e.time),
        Event::ButtonRelease(e) => Some(e.time),
        Event::KeyPress(e) => Some(e.time),
        Event::KeyRelease(e) => Some(e.time),
        Event::EnterNotify(e) => Some(e.time),
        Event::ShapeNotify(e) => Some(e.server_time),
        _ => None,
    }
    .filter(|&t| t != CURRENT_TIME)
}

/// Map an X11 event onto the client layer's vocabulary
pub fn translate(atoms: &Atoms, root: WindowId, event: &Event) -> Option<WindowEvent> {
    match event {
        Event::MapRequest(e) => Some(WindowEvent::MapRequest { window: e.window }),
        Event::UnmapNotify(e) if is_withdrawal(e, root) => Some(WindowEvent::Withdrawn { window: e.window }),
        Event::DestroyNotify(e) => Some(WindowEvent::Destroyed { window: e.window }),
        Event::PropertyNotify(e) => {
            let kind = if e.atom == atoms.net_wm_name || e.atom == u32::from(AtomEnum::WM_NAME) {
                PropertyKind::Name
            } else if e.atom == atoms.net_wm_icon_name || e.atom == u32::from(AtomEnum::WM_ICON_NAME) {
                PropertyKind::IconName
            } else if e.atom == u32::from(AtomEnum::WM_HINTS) {
                PropertyKind::Hints
            } else if e.atom == atoms.wm_protocols {
                PropertyKind::Protocols
            } else {
                return None;
            };
            Some(WindowEvent::PropertyChanged { window: e.window, kind })
        }
        Event::ConfigureRequest(e) => Some(WindowEvent::Configure {
            window: e.window,
            request: configure_request(e),
        }),
        Event::ShapeNotify(e) if e.shape_kind == shape::SK::BOUNDING => Some(WindowEvent::ShapeChanged {
            window: e.affected_window,
            shaped: e.shaped,
        }),
        Event::FocusIn(e) if e.mode != NotifyMode::GRAB && e.detail != NotifyDetail::POINTER => {
            Some(WindowEvent::FocusIn { window: e.event })
        }
        Event::ClientMessage(e) if e.format == 32 => {
            let data = e.data.as_data32();
            let window = e.window;
            if e.type_ == atoms.wm_protocols && data[0] == atoms.net_wm_ping {
                // Replies go to the root with the pinged window in data[2]
                Some(WindowEvent::PingReply { window: data[2], timestamp: data[1] })
            } else if e.type_ == atoms.wm_change_state {
                (data[0] == ICONIC_STATE).then_some(WindowEvent::Iconify { window })
            } else if e.type_ == atoms.net_close_window {
                Some(WindowEvent::Close { window, timestamp: data[0] })
            } else if e.type_ == atoms.net_wm_state {
                let action = StateAction::from_wire(data[0])?;
                let mask = atoms.net_state_from(&[data[1], data[2]]);
                Some(WindowEvent::StateRequest { window, action, mask })
            } else if e.type_ == atoms.net_wm_desktop {
                Some(WindowEvent::DesktopRequest { window, desktop: Desktop::from_wire(data[0]) })
            } else if e.type_ == atoms.net_current_desktop {
                Some(WindowEvent::SwitchDesktop { desktop: data[0].saturating_add(1) })
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Apply one event to the window it concerns
pub fn dispatch(clients: &mut Clients, ctx: &mut Context<'_>, event: WindowEvent) -> Result<Followup> {
    trace!("Dispatching {:?}", event);
    match event {
        WindowEvent::MapRequest { window } => {
            if let Some(client) = clients.get(window) {
                if client.is_minimized() {
                    clients.unminimize(ctx, window)?;
                }
            } else {
                clients.manage(ctx, window)?;
            }
        }
        WindowEvent::Withdrawn { window } => {
            if clients.contains(window) {
                clients.release_window(ctx, window, false)?;
            }
        }
        WindowEvent::Destroyed { window } => {
            if clients.contains(window) {
                clients.destroy_client(ctx, window)?;
            }
        }
        WindowEvent::PropertyChanged { window, kind } => {
            if !clients.contains(window) {
                return Ok(Followup::Nothing);
            }
            match kind {
                PropertyKind::Name => clients.fetch_name(ctx, window)?,
                PropertyKind::IconName => clients.fetch_iconic_name(ctx, window)?,
                PropertyKind::Hints => {
                    clients.get_wm_hints(ctx, window)?;
                }
                PropertyKind::Protocols => clients.get_window_protocols(ctx, window)?,
            }
        }
        WindowEvent::Configure { window, request } => {
            let Some(client) = clients.get_mut(window) else {
                return Ok(Followup::Configure(window, request));
            };
            if let Some(size) = request.size {
                let frame = size_for_client_size(size, client.borders(), SizeMode::Normal);
                client.plain_resize(ctx, frame, false)?;
            }
            if let Some(pos) = request.pos {
                let frame = calculate_gravitation(pos, client.gravity(), client.borders(), false);
                client.move_to(ctx, frame, false)?;
            }
            // The client gets an answer even when nothing moved
            if let Ok(handles) = client.handles() {
                ctx.server.send_configure_notify(handles.client, client.client_geometry())?;
            }
        }
        WindowEvent::ShapeChanged { window, shaped } => {
            if clients.contains(window) {
                clients.update_shape(ctx, window, shaped)?;
            }
        }
        WindowEvent::FocusIn { window } => {
            let Some(owner) = clients.find_owner(window) else {
                return Ok(Followup::Nothing);
            };
            let ids: Vec<WindowId> = clients.windows().map(|c| c.window()).collect();
            for id in ids {
                if let Some(client) = clients.get_mut(id) {
                    client.set_active(id == owner);
                }
            }
            return Ok(Followup::Focused(owner));
        }
        WindowEvent::PingReply { window, timestamp } => {
            if !clients.got_ping(ctx, window, timestamp) {
                debug!("Unexpected ping reply from 0x{:x}", window);
            }
        }
        WindowEvent::Iconify { window } => {
            if clients.contains(window) {
                clients.minimize(ctx, window)?;
            }
        }
        WindowEvent::Close { window, timestamp } => {
            if timestamp != CURRENT_TIME {
                ctx.timestamp = timestamp;
            }
            if clients.contains(window) {
                clients.close_window(ctx, window)?;
            }
        }
        WindowEvent::StateRequest { window, action, mask } => {
            if clients.contains(window) {
                apply_state_request(clients, ctx, window, action, mask)?;
            }
        }
        WindowEvent::DesktopRequest { window, desktop } => {
            if clients.contains(window) {
                clients.set_desktop(ctx, window, desktop)?;
            }
        }
        WindowEvent::SwitchDesktop { desktop } => return Ok(Followup::SwitchDesktop(desktop)),
    }
    Ok(Followup::Nothing)
}

fn apply_state_request(
    clients: &mut Clients,
    ctx: &mut Context<'_>,
    window: WindowId,
    action: StateAction,
    mask: NetState,
) -> Result<()> {
    let Some(current) = clients.get(window).map(|c| c.net_state()) else {
        return Ok(());
    };
    let wanted = |flag: NetState| action.wanted(current, flag);

    if mask.contains(NetState::SHADED) {
        let mode = if wanted(NetState::SHADED) { ShadeMode::Normal } else { ShadeMode::None };
        clients.set_shade(ctx, window, mode)?;
    }
    if mask.contains(NetState::FULLSCREEN) {
        clients.set_full_screen(ctx, window, wanted(NetState::FULLSCREEN))?;
    }
    if mask.contains(NetState::STICKY) {
        clients.set_on_all_desktops(ctx, window, wanted(NetState::STICKY))?;
    }
    if let Some(client) = clients.get_mut(window) {
        if mask.contains(NetState::SKIP_TASKBAR) {
            client.set_skip_taskbar(ctx, wanted(NetState::SKIP_TASKBAR), true)?;
        }
        if mask.contains(NetState::SKIP_PAGER) {
            client.set_skip_pager(ctx, wanted(NetState::SKIP_PAGER))?;
        }
    }
    Ok(())
}
