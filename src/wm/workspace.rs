//! Workspace Module
//!
//! The policy side a managed window consults: which decoration to build,
//! which desktops exist, and the focus/stacking bookkeeping. The client
//! layer never owns the workspace; it calls into it.

use crate::shared::Geometry;
use crate::wm::client_flags::ActivityFlags;
use crate::wm::decorations::DecorationFactory;
use crate::wm::protocol::{Timestamp, WindowId};

pub trait Workspace {
    /// Factory for the active decoration theme, if one is loaded
    fn decoration_factory(&self) -> Option<&dyn DecorationFactory>;

    fn root_window(&self) -> WindowId;

    /// 1-based number of the visible desktop
    fn current_desktop(&self) -> u32;

    fn number_of_desktops(&self) -> u32;

    /// Area of the whole screen
    fn full_area(&self) -> Geometry;

    /// A window stopped being visible
    fn client_hidden(&mut self, window: WindowId);

    /// A window is going away; drop it from focus chains and stacking
    fn remove_client(&mut self, window: WindowId);

    /// Focus was handed to `window`; the FocusIn that follows is expected
    fn set_should_get_focus(&mut self, window: WindowId);

    fn raise_client(&mut self, window: WindowId, frame: WindowId);

    /// Ask the client to activate itself (_NET_WM_TAKE_ACTIVITY)
    fn send_take_activity(&mut self, window: WindowId, timestamp: Timestamp, flags: ActivityFlags);

    /// `window` lost its claim to focus; pass it on
    fn activate_next_client(&mut self, window: WindowId);

    fn focus_to_null(&mut self);

    fn request_focus(&mut self, window: WindowId);
}
