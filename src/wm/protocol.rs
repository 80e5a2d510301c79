//! Protocol Module
//!
//! The capability surface the client layer drives the display through.
//! Every external mutation of a managed window goes through
//! [`WindowServer`]; the wire encoding lives behind it.

use anyhow::Result;

use crate::shared::{BorderInsets, Geometry, Point, Size};
use crate::wm::client_flags::{ActivityFlags, AllowedActions, NetState, Protocols, WindowType};
use crate::wm::geometry::Gravity;
use crate::wm::hints::{MotifHints, ResourceClass, WmHints};

/// Protocol window handle
pub type WindowId = u32;

/// Protocol timestamp (server milliseconds)
pub type Timestamp = u32;

/// "Current time" sentinel timestamp
pub const CURRENT_TIME: Timestamp = 0;

/// ICCCM WM_STATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingState {
    Withdrawn,
    Normal,
    Iconic,
}

impl MappingState {
    pub fn wire_value(self) -> u32 {
        match self {
            MappingState::Withdrawn => 0,
            MappingState::Normal => 1,
            MappingState::Iconic => 3,
        }
    }
}

/// Virtual desktop assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    /// 1-based desktop number
    Number(u32),
    All,
}

impl Desktop {
    /// _NET_WM_DESKTOP value (0-based, 0xFFFFFFFF for all desktops)
    pub fn wire_value(self) -> u32 {
        match self {
            Desktop::Number(n) => n.saturating_sub(1),
            Desktop::All => u32::MAX,
        }
    }

    pub fn from_wire(value: u32) -> Self {
        if value == u32::MAX {
            Desktop::All
        } else {
            Desktop::Number(value + 1)
        }
    }
}

/// Client messages the window manager sends to clients
///
/// Each one goes out with the current timestamp alongside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage {
    DeleteWindow,
    TakeFocus,
    TakeActivity(ActivityFlags),
    ContextHelp,
    Ping,
}

/// Event interest selected on a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSelection {
    /// Stop receiving events from the window
    Nothing,
    /// Property, structure and focus changes of the client window itself
    ClientWindow,
    /// Wrapper without substructure notification; hides unmaps we cause ourselves
    WrapperQuiet,
    /// Wrapper including substructure notification of the client
    Wrapper,
}

/// Display server capability surface
///
/// Writes return errors from the transport. Probes never fail: a missing
/// property, or a window that vanished mid-probe, reads as the default.
pub trait WindowServer {
    // Window tree
    fn create_container(&mut self, parent: WindowId, geometry: Geometry, background: Option<u32>) -> Result<WindowId>;
    fn destroy_window(&mut self, window: WindowId) -> Result<()>;
    fn map_window(&mut self, window: WindowId) -> Result<()>;
    fn unmap_window(&mut self, window: WindowId) -> Result<()>;
    fn reparent_window(&mut self, window: WindowId, parent: WindowId, pos: Point) -> Result<()>;
    fn move_resize_window(&mut self, window: WindowId, geometry: Geometry) -> Result<()>;
    fn resize_window(&mut self, window: WindowId, size: Size) -> Result<()>;
    fn lower_window(&mut self, window: WindowId) -> Result<()>;
    fn select_input(&mut self, window: WindowId, selection: InputSelection) -> Result<()>;
    fn add_to_save_set(&mut self, window: WindowId) -> Result<()>;
    fn remove_from_save_set(&mut self, window: WindowId) -> Result<()>;
    /// Synthetic ConfigureNotify telling the client where it really is
    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry) -> Result<()>;

    // Properties
    /// Writes WM_STATE; Withdrawn deletes the property
    fn set_mapping_state(&mut self, window: WindowId, state: MappingState) -> Result<()>;
    /// Sets the bits of `mask` in _NET_WM_STATE to the values in `state`
    fn set_net_state(&mut self, window: WindowId, state: NetState, mask: NetState) -> Result<()>;
    /// `None` removes the desktop assignment
    fn set_desktop(&mut self, window: WindowId, desktop: Option<Desktop>) -> Result<()>;
    fn set_allowed_actions(&mut self, window: WindowId, actions: AllowedActions) -> Result<()>;
    fn set_frame_extents(&mut self, window: WindowId, insets: BorderInsets) -> Result<()>;
    /// `None` removes the override
    fn set_visible_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()>;
    fn set_visible_icon_name(&mut self, window: WindowId, name: Option<&str>) -> Result<()>;

    // Messages and focus
    fn send_message(&mut self, window: WindowId, message: ProtocolMessage, timestamp: Timestamp) -> Result<()>;
    fn set_input_focus(&mut self, window: WindowId, timestamp: Timestamp) -> Result<()>;
    /// Sever the client's connection
    fn kill_client(&mut self, window: WindowId) -> Result<()>;

    // Shape
    /// `None` clears the bounding shape
    fn set_bounding_shape(&mut self, window: WindowId, rects: Option<&[Geometry]>) -> Result<()>;
    fn copy_bounding_shape(&mut self, window: WindowId, source: WindowId, offset: Point) -> Result<()>;

    // Serialization
    fn grab_server(&mut self) -> Result<()>;
    fn ungrab_server(&mut self) -> Result<()>;
    /// Round trip to the server; all earlier requests are processed on return
    fn sync(&mut self) -> Result<()>;

    // Probes
    fn read_geometry(&self, window: WindowId) -> Option<Geometry>;
    fn read_protocols(&self, window: WindowId) -> Protocols;
    fn read_wm_hints(&self, window: WindowId) -> WmHints;
    fn read_gravity(&self, window: WindowId) -> Gravity;
    fn read_motif_hints(&self, window: WindowId) -> MotifHints;
    /// _NET_WM_NAME, falling back to WM_NAME
    fn read_name(&self, window: WindowId) -> String;
    /// _NET_WM_ICON_NAME, falling back to WM_ICON_NAME
    fn read_icon_name(&self, window: WindowId) -> String;
    fn read_class(&self, window: WindowId) -> ResourceClass;
    fn read_pid(&self, window: WindowId) -> Option<u32>;
    fn read_client_machine(&self, window: WindowId) -> Option<String>;
    fn read_client_leader(&self, window: WindowId) -> Option<WindowId>;
    fn read_transient_for(&self, window: WindowId) -> Option<WindowId>;
    fn read_window_type(&self, window: WindowId) -> WindowType;
    fn read_desktop(&self, window: WindowId) -> Option<Desktop>;
    fn read_net_state(&self, window: WindowId) -> NetState;
    fn has_shape(&self, window: WindowId) -> bool;
}
