//! X11 Module
//!
//! [`WindowServer`] on top of an x11rb connection, and taking over the
//! screen as its window manager.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureNotifyEvent, ConfigureWindowAux,
    ConnectionExt as _, CreateWindowAux, EventMask, InputFocus, PropMode, Rectangle, SetMode, Window, WindowClass,
    CONFIGURE_NOTIFY_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::shared::{BorderInsets, Geometry, Point, Size};
use crate::wm::client_flags::{AllowedActions, NetState, Protocols, WindowType};
use crate::wm::ewmh::Atoms;
use crate::wm::geometry::Gravity;
use crate::wm::hints::{decode_gravity, MotifHints, ResourceClass, WmHints};
use crate::wm::protocol::{Desktop, InputSelection, MappingState, ProtocolMessage, Timestamp, WindowId, WindowServer};

/// Longest property read, in 32-bit units
const MAX_PROPERTY_LENGTH: u32 = 1024;

fn event_mask(selection: InputSelection) -> EventMask {
    match selection {
        InputSelection::Nothing => EventMask::NO_EVENT,
        InputSelection::ClientWindow => {
            EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY | EventMask::FOCUS_CHANGE
        }
        InputSelection::WrapperQuiet => EventMask::SUBSTRUCTURE_REDIRECT,
        InputSelection::Wrapper => EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
    }
}

fn rectangle(g: &Geometry) -> Rectangle {
    Rectangle {
        x: g.x as i16,
        y: g.y as i16,
        width: g.width.min(u16::MAX as u32) as u16,
        height: g.height.min(u16::MAX as u32) as u16,
    }
}

pub struct X11Server {
    conn: Arc<RustConnection>,
    atoms: Atoms,
    root: Window,
}

impl X11Server {
    pub fn new(conn: Arc<RustConnection>, atoms: Atoms, root: Window) -> Self {
        Self { conn, atoms, root }
    }

    fn property32(&self, window: WindowId, property: Atom, type_: impl Into<Atom>) -> Vec<u32> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, MAX_PROPERTY_LENGTH)
            .ok()
            .and_then(|cookie| cookie.reply().ok());
        reply
            .and_then(|r| r.value32().map(|values| values.collect()))
            .unwrap_or_default()
    }

    fn property8(&self, window: WindowId, property: Atom, type_: impl Into<Atom>) -> Option<Vec<u8>> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, MAX_PROPERTY_LENGTH)
            .ok()?
            .reply()
            .ok()?;
        (reply.format == 8 && !reply.value.is_empty()).then_some(reply.value)
    }

    fn text_property(&self, window: WindowId, utf8: Atom, legacy: AtomEnum) -> String {
        if let Some(raw) = self.property8(window, utf8, self.atoms.utf8_string) {
            return String::from_utf8_lossy(&raw).into_owned();
        }
        self.property8(window, legacy.into(), AtomEnum::ANY)
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_default()
    }

    fn first_window(&self, window: WindowId, property: Atom) -> Option<WindowId> {
        self.property32(window, property, AtomEnum::WINDOW)
            .first()
            .copied()
            .filter(|&w| w != x11rb::NONE)
    }
}

impl WindowServer for X11Server {
    fn create_container(&mut self, parent: WindowId, geometry: Geometry, background: Option<u32>) -> Result<WindowId> {
        let id = self.conn.generate_id()?;
        let mut aux = CreateWindowAux::new()
            .override_redirect(1)
            .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY | EventMask::EXPOSURE);
        if let Some(pixel) = background {
            aux = aux.background_pixel(pixel);
        }
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            id,
            parent,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width.max(1) as u16,
            geometry.height.max(1) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;
        debug!("Created container 0x{:x} under 0x{:x}", id, parent);
        Ok(id)
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn reparent_window(&mut self, window: WindowId, parent: WindowId, pos: Point) -> Result<()> {
        self.conn.reparent_window(window, parent, pos.x as i16, pos.y as i16)?;
        Ok(())
    }

    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width.max(1))
                .height(geometry.height.max(1)),
        )?;
        Ok(())
    }

    fn resize_window(&mut self, window: WindowId, size: Size) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().width(size.width.max(1)).height(size.height.max(1)),
        )?;
        Ok(())
    }

    fn lower_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(x11rb::protocol::xproto::StackMode::BELOW),
        )?;
        Ok(())
    }

    fn select_input(&mut self, window: WindowId, selection: InputSelection) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(event_mask(selection)),
        )?;
        if selection == InputSelection::ClientWindow {
            self.conn.shape_select_input(window, true)?;
        }
        Ok(())
    }

    fn add_to_save_set(&mut self, window: WindowId) -> Result<()> {
        self.conn.change_save_set(SetMode::INSERT, window)?;
        Ok(())
    }

    fn remove_from_save_set(&mut self, window: WindowId) -> Result<()> {
        self.conn.change_save_set(SetMode::DELETE, window)?;
        Ok(())
    }

    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_mapping_state(&mut self, window: WindowId, state: MappingState) -> Result<()> {
        let wm_state = self.atoms.wm_state;
        if state == MappingState::Withdrawn {
            self.conn.delete_property(window, wm_state)?;
        } else {
            self.conn
                .change_property32(PropMode::REPLACE, window, wm_state, wm_state, &[state.wire_value(), x11rb::NONE])?;
        }
        Ok(())
    }

    fn set_net_state(&mut self, window: WindowId, state: NetState, mask: NetState) -> Result<()> {
        let current = self.property32(window, self.atoms.net_wm_state, AtomEnum::ATOM);
        let atoms = self.atoms.merge_net_state(&current, state, mask);
        self.conn
            .change_property32(PropMode::REPLACE, window, self.atoms.net_wm_state, AtomEnum::ATOM, &atoms)?;
        Ok(())
    }

    fn set_desktop(&mut self, window: WindowId, desktop: Option<Desktop>) -> Result<()> {
        match desktop {
            Some(desktop) => {
                self.conn.change_property32(
                    PropMode::REPLACE,
                    window,
                    self.atoms.net_wm_desktop,
                    AtomEnum::CARDINAL,
                    &[desktop.wire_value()],
                )?;
            }
            None => {
                self.conn.delete_property(window, self.atoms.net_wm_desktop)?;
            }
        }
        Ok(())
    }

    fn set_allowed_actions(&mut self, window: WindowId, actions: AllowedActions) -> Result<()> {
        let atoms = self.atoms.allowed_action_atoms(actions);
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_allowed_actions,
            AtomEnum::ATOM,
            &atoms,
        )?;
        Ok(())
    }

    fn set_frame_extents(&mut self, window: WindowId, insets: BorderInsets) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_frame_extents,
            AtomEnum::CARDINAL,
            &[insets.left, insets.right, insets.top, insets.bottom],
        )?;
        Ok(())
    }

    fn set_visible_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()> {
        let property = self.atoms.net_wm_visible_name;
        match name {
            Some(name) => {
                self.conn
                    .change_property8(PropMode::REPLACE, window, property, self.atoms.utf8_string, name.as_bytes())?;
            }
            None => {
                self.conn.delete_property(window, property)?;
            }
        }
        Ok(())
    }

    fn set_visible_icon_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()> {
        let property = self.atoms.net_wm_visible_icon_name;
        match name {
            Some(name) => {
                self.conn
                    .change_property8(PropMode::REPLACE, window, property, self.atoms.utf8_string, name.as_bytes())?;
            }
            None => {
                self.conn.delete_property(window, property)?;
            }
        }
        Ok(())
    }

    fn send_message(&mut self, window: WindowId, message: ProtocolMessage, timestamp: Timestamp) -> Result<()> {
        let data = self.atoms.message_data(message, timestamp, window);
        let event = ClientMessageEvent::new(32, window, self.atoms.wm_protocols, data);
        self.conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }

    fn set_input_focus(&mut self, window: WindowId, timestamp: Timestamp) -> Result<()> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, timestamp)?;
        Ok(())
    }

    fn kill_client(&mut self, window: WindowId) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn set_bounding_shape(&mut self, window: WindowId, rects: Option<&[Geometry]>) -> Result<()> {
        match rects {
            Some(rects) => {
                let rects: Vec<Rectangle> = rects.iter().map(rectangle).collect();
                self.conn.shape_rectangles(
                    shape::SO::SET,
                    shape::SK::BOUNDING,
                    x11rb::protocol::xproto::ClipOrdering::UNSORTED,
                    window,
                    0,
                    0,
                    &rects,
                )?;
            }
            None => {
                self.conn
                    .shape_mask(shape::SO::SET, shape::SK::BOUNDING, window, 0, 0, x11rb::NONE)?;
            }
        }
        Ok(())
    }

    fn copy_bounding_shape(&mut self, window: WindowId, source: WindowId, offset: Point) -> Result<()> {
        self.conn.shape_combine(
            shape::SO::SET,
            shape::SK::BOUNDING,
            shape::SK::BOUNDING,
            window,
            offset.x as i16,
            offset.y as i16,
            source,
        )?;
        Ok(())
    }

    fn grab_server(&mut self) -> Result<()> {
        self.conn.grab_server()?;
        Ok(())
    }

    fn ungrab_server(&mut self) -> Result<()> {
        self.conn.ungrab_server()?;
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }

    fn read_geometry(&self, window: WindowId) -> Option<Geometry> {
        let geometry = self.conn.get_geometry(window).ok()?.reply().ok()?;
        Some(Geometry::new(
            geometry.x as i32,
            geometry.y as i32,
            geometry.width as u32,
            geometry.height as u32,
        ))
    }

    fn read_protocols(&self, window: WindowId) -> Protocols {
        let atoms = self.property32(window, self.atoms.wm_protocols, AtomEnum::ATOM);
        self.atoms.protocols_from(&atoms)
    }

    fn read_wm_hints(&self, window: WindowId) -> WmHints {
        WmHints::decode(&self.property32(window, AtomEnum::WM_HINTS.into(), AtomEnum::WM_HINTS))
    }

    fn read_gravity(&self, window: WindowId) -> Gravity {
        decode_gravity(&self.property32(window, AtomEnum::WM_NORMAL_HINTS.into(), AtomEnum::WM_SIZE_HINTS))
    }

    fn read_motif_hints(&self, window: WindowId) -> MotifHints {
        let motif = self.atoms.motif_wm_hints;
        MotifHints::decode(&self.property32(window, motif, motif))
    }

    fn read_name(&self, window: WindowId) -> String {
        self.text_property(window, self.atoms.net_wm_name, AtomEnum::WM_NAME)
    }

    fn read_icon_name(&self, window: WindowId) -> String {
        self.text_property(window, self.atoms.net_wm_icon_name, AtomEnum::WM_ICON_NAME)
    }

    fn read_class(&self, window: WindowId) -> ResourceClass {
        self.property8(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)
            .map(|raw| ResourceClass::decode(&raw))
            .unwrap_or_default()
    }

    fn read_pid(&self, window: WindowId) -> Option<u32> {
        self.property32(window, self.atoms.net_wm_pid, AtomEnum::CARDINAL).first().copied()
    }

    fn read_client_machine(&self, window: WindowId) -> Option<String> {
        self.property8(window, AtomEnum::WM_CLIENT_MACHINE.into(), AtomEnum::STRING)
            .map(|raw| String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string())
    }

    fn read_client_leader(&self, window: WindowId) -> Option<WindowId> {
        self.first_window(window, self.atoms.wm_client_leader)
    }

    fn read_transient_for(&self, window: WindowId) -> Option<WindowId> {
        self.first_window(window, AtomEnum::WM_TRANSIENT_FOR.into())
            .filter(|&w| w != self.root)
    }

    fn read_window_type(&self, window: WindowId) -> WindowType {
        let atoms = self.property32(window, self.atoms.net_wm_window_type, AtomEnum::ATOM);
        self.atoms.window_type_from(&atoms)
    }

    fn read_desktop(&self, window: WindowId) -> Option<Desktop> {
        self.property32(window, self.atoms.net_wm_desktop, AtomEnum::CARDINAL)
            .first()
            .map(|&value| Desktop::from_wire(value))
    }

    fn read_net_state(&self, window: WindowId) -> NetState {
        let atoms = self.property32(window, self.atoms.net_wm_state, AtomEnum::ATOM);
        self.atoms.net_state_from(&atoms)
    }

    fn has_shape(&self, window: WindowId) -> bool {
        self.conn
            .shape_query_extents(window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .is_some_and(|extents| extents.bounding_shaped)
    }
}

/// Take over the screen: own WM_S<n>, select SubstructureRedirect on the
/// root and advertise the supported hints
///
/// Returns the window that holds the selection; it must stay alive while
/// the manager runs.
pub fn become_window_manager(
    conn: &RustConnection,
    screen_num: usize,
    atoms: &Atoms,
    replace: bool,
) -> Result<(Window, Timestamp)> {
    let screen = &conn.setup().roots[screen_num];
    let root = screen.root;

    let selection_name = format!("WM_S{}", screen_num);
    let selection = conn
        .intern_atom(false, selection_name.as_bytes())?
        .reply()
        .context("Failed to intern WM selection atom")?
        .atom;
    let previous = conn
        .get_selection_owner(selection)?
        .reply()
        .context("Failed to get current WM selection owner")?
        .owner;
    if previous != x11rb::NONE {
        if !replace {
            anyhow::bail!(
                "Another window manager is already running (window 0x{:x}). Use --replace to replace it.",
                previous
            );
        }
        info!("Existing WM detected (window 0x{:x}), attempting replace...", previous);
        let _ = conn.change_window_attributes(
            previous,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
        );
    }

    let owner = conn.generate_id()?;
    conn.create_window(
        screen.root_depth,
        owner,
        root,
        -1000,
        -1000,
        1,
        1,
        0,
        WindowClass::INPUT_OUTPUT,
        0,
        &CreateWindowAux::new()
            .override_redirect(1)
            .event_mask(EventMask::PROPERTY_CHANGE),
    )?;
    let timestamp = server_time(conn, owner)?;
    conn.set_selection_owner(owner, selection, timestamp)?
        .check()
        .context("Failed to set WM selection owner")?;

    if previous != x11rb::NONE {
        wait_for_previous(conn, previous);
    }

    conn.change_window_attributes(
        root,
        &ChangeWindowAttributesAux::new().event_mask(
            EventMask::SUBSTRUCTURE_REDIRECT
                | EventMask::SUBSTRUCTURE_NOTIFY
                | EventMask::PROPERTY_CHANGE
                | EventMask::FOCUS_CHANGE,
        ),
    )?
    .check()
    .context("Failed to select SubstructureRedirect on the root window; is another WM running?")?;

    atoms.setup_supported(conn, root)?;
    conn.change_property32(PropMode::REPLACE, root, atoms.net_supporting_wm_check, AtomEnum::WINDOW, &[owner])?;
    conn.change_property32(PropMode::REPLACE, owner, atoms.net_supporting_wm_check, AtomEnum::WINDOW, &[owner])?;
    conn.change_property8(PropMode::REPLACE, owner, atoms.net_wm_name, atoms.utf8_string, b"area")?;
    conn.flush()?;

    info!("Managing screen {} (root 0x{:x}) at time {}", screen_num, root, timestamp);
    Ok((owner, timestamp))
}

/// Current server time, from the PropertyNotify of an empty append
///
/// `window` must select PropertyChange. Must run before the event loop
/// starts, as unrelated events read on the way are dropped.
fn server_time(conn: &RustConnection, window: Window) -> Result<Timestamp> {
    conn.change_property8(PropMode::APPEND, window, AtomEnum::WM_NAME, AtomEnum::STRING, &[])?;
    conn.flush()?;
    loop {
        match conn.wait_for_event().context("Failed to read server time")? {
            x11rb::protocol::Event::PropertyNotify(e) if e.window == window => return Ok(e.time),
            other => debug!("Dropping {:?} while waiting for server time", other),
        }
    }
}

fn wait_for_previous(conn: &RustConnection, previous: Window) {
    let timeout = Duration::from_secs(15);
    let start = Instant::now();
    while start.elapsed() < timeout {
        let gone = conn
            .get_window_attributes(previous)
            .map(|cookie| cookie.reply().is_err())
            .unwrap_or(true);
        if gone {
            info!("Previous WM exited");
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    warn!("Timeout waiting for previous WM to exit, proceeding anyway");
}

/// Top-level windows that were already mapped when we started
pub fn existing_windows(conn: &RustConnection, root: Window) -> Result<Vec<Window>> {
    let tree = conn.query_tree(root)?.reply().context("Failed to query window tree")?;
    let mut windows = Vec::new();
    for window in tree.children {
        let Ok(attrs) = conn.get_window_attributes(window)?.reply() else {
            continue;
        };
        if !attrs.override_redirect && attrs.map_state == x11rb::protocol::xproto::MapState::VIEWABLE {
            windows.push(window);
        }
    }
    Ok(windows)
}
