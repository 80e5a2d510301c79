//! Screen Module
//!
//! The workspace of one X screen: desktops, the decoration theme and the
//! focus bookkeeping managed windows report into.

use std::sync::Arc;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConfigureWindowAux, ConnectionExt as _, InputFocus, PropMode, StackMode, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::config::Config;
use crate::shared::Geometry;
use crate::wm::client_flags::ActivityFlags;
use crate::wm::decorations::{DecorationFactory, FrameDecorationFactory};
use crate::wm::ewmh::Atoms;
use crate::wm::protocol::{ProtocolMessage, Timestamp, WindowId, CURRENT_TIME};
use crate::wm::workspace::Workspace;

/// Focus state the main loop acts on after an event was handled
#[derive(Debug, Default)]
pub struct FocusChain {
    /// Most recently focused first
    chain: Vec<WindowId>,
    active: Option<WindowId>,
    should_get_focus: Vec<WindowId>,
    requested: Option<WindowId>,
}

impl FocusChain {
    pub fn active(&self) -> Option<WindowId> {
        self.active
    }

    /// A FocusIn for `window` arrived
    pub fn focused(&mut self, window: WindowId) {
        self.should_get_focus.retain(|&w| w != window);
        self.active = Some(window);
        self.chain.retain(|&w| w != window);
        self.chain.insert(0, window);
    }

    pub fn expects_focus(&self, window: WindowId) -> bool {
        self.should_get_focus.contains(&window)
    }

    /// Window the main loop should hand focus to next
    pub fn take_request(&mut self) -> Option<WindowId> {
        self.requested.take()
    }

    fn forget(&mut self, window: WindowId) {
        self.chain.retain(|&w| w != window);
        self.should_get_focus.retain(|&w| w != window);
        if self.active == Some(window) {
            self.active = None;
        }
        if self.requested == Some(window) {
            self.requested = None;
        }
    }

    fn pass_on(&mut self, from: WindowId) {
        if self.active != Some(from) {
            return;
        }
        self.active = None;
        self.requested = self.chain.iter().copied().find(|&w| w != from);
    }
}

/// [`Workspace`] of the screen this process manages
pub struct RootWorkspace {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    root: Window,
    /// Focus target when no window should have focus
    null_focus: Window,
    screen_area: Geometry,
    desktops: u32,
    current_desktop: u32,
    factory: FrameDecorationFactory,
    pub focus: FocusChain,
}

impl RootWorkspace {
    pub fn new(conn: Arc<RustConnection>, screen_num: usize, atoms: Atoms, null_focus: Window, config: &Config) -> Self {
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_area = Geometry::new(0, 0, screen.width_in_pixels as u32, screen.height_in_pixels as u32);
        Self {
            root,
            null_focus,
            screen_area,
            desktops: config.behavior.desktops.max(1),
            current_desktop: 1,
            factory: FrameDecorationFactory::new(config.decorations.clone()),
            focus: FocusChain::default(),
            atoms,
            conn,
        }
    }

    /// Publish the desktop layout on the root window
    pub fn publish_desktops(&self) -> anyhow::Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms.net_number_of_desktops,
            AtomEnum::CARDINAL,
            &[self.desktops],
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            self.atoms.net_current_desktop,
            AtomEnum::CARDINAL,
            &[self.current_desktop - 1],
        )?;
        Ok(())
    }

    /// Pick up a reloaded configuration
    ///
    /// Frames keep their old decorations until they are rebuilt.
    pub fn reconfigure(&mut self, config: &Config) {
        self.factory = FrameDecorationFactory::new(config.decorations.clone());
    }

    /// Switch the visible desktop; returns whether it changed
    pub fn set_current_desktop(&mut self, desktop: u32) -> anyhow::Result<bool> {
        if desktop == 0 || desktop > self.desktops || desktop == self.current_desktop {
            return Ok(false);
        }
        debug!("Switching to desktop {}", desktop);
        self.current_desktop = desktop;
        self.publish_desktops()?;
        Ok(true)
    }
}

impl Workspace for RootWorkspace {
    fn decoration_factory(&self) -> Option<&dyn DecorationFactory> {
        Some(&self.factory)
    }

    fn root_window(&self) -> WindowId {
        self.root
    }

    fn current_desktop(&self) -> u32 {
        self.current_desktop
    }

    fn number_of_desktops(&self) -> u32 {
        self.desktops
    }

    fn full_area(&self) -> Geometry {
        self.screen_area
    }

    fn client_hidden(&mut self, window: WindowId) {
        self.focus.pass_on(window);
    }

    fn remove_client(&mut self, window: WindowId) {
        self.focus.forget(window);
    }

    fn set_should_get_focus(&mut self, window: WindowId) {
        if !self.focus.should_get_focus.contains(&window) {
            self.focus.should_get_focus.push(window);
        }
    }

    fn raise_client(&mut self, window: WindowId, frame: WindowId) {
        let raised = self
            .conn
            .configure_window(frame, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE));
        if let Err(e) = raised {
            warn!("Failed to raise window 0x{:x}: {}", window, e);
        }
    }

    fn send_take_activity(&mut self, window: WindowId, timestamp: Timestamp, flags: ActivityFlags) {
        let data = self.atoms.message_data(ProtocolMessage::TakeActivity(flags), timestamp, window);
        let event = x11rb::protocol::xproto::ClientMessageEvent::new(32, window, self.atoms.wm_protocols, data);
        let sent = self
            .conn
            .send_event(false, window, x11rb::protocol::xproto::EventMask::NO_EVENT, event);
        if let Err(e) = sent {
            warn!("Failed to send take-activity to 0x{:x}: {}", window, e);
        }
    }

    fn activate_next_client(&mut self, window: WindowId) {
        self.focus.pass_on(window);
        if self.focus.requested.is_none() && self.focus.active.is_none() {
            self.focus_to_null();
        }
    }

    fn focus_to_null(&mut self) {
        self.focus.active = None;
        if let Err(e) = self.conn.set_input_focus(InputFocus::POINTER_ROOT, self.null_focus, CURRENT_TIME) {
            warn!("Failed to reset focus: {}", e);
        }
        let _ = self.conn.flush();
    }

    fn request_focus(&mut self, window: WindowId) {
        self.focus.requested = Some(window);
    }
}
