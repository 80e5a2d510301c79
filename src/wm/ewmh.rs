//! EWMH and ICCCM atoms
//!
//! The interned atom table plus the translations between atom lists and
//! the client layer's flag types.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, PropMode, Window};
use x11rb::wrapper::ConnectionExt as _;

use crate::wm::client_flags::{AllowedActions, NetState, Protocols, WindowType};
use crate::wm::protocol::{ProtocolMessage, Timestamp, WindowId};

/// Holds all interned atoms
#[derive(Debug, Clone)]
pub struct Atoms {
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_client_leader: Atom,
    pub utf8_string: Atom,
    pub motif_wm_hints: Atom,

    // Root
    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_number_of_desktops: Atom,
    pub net_current_desktop: Atom,
    pub net_close_window: Atom,

    // Client properties
    pub net_wm_name: Atom,
    pub net_wm_icon_name: Atom,
    pub net_wm_visible_name: Atom,
    pub net_wm_visible_icon_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_pid: Atom,
    pub net_frame_extents: Atom,

    // Protocols
    pub net_wm_ping: Atom,
    pub net_wm_take_activity: Atom,
    pub net_wm_context_help: Atom,

    pub net_wm_window_type: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_toolbar: Atom,
    pub net_wm_window_type_menu: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_splash: Atom,
    pub kde_net_wm_window_type_override: Atom,
    pub kde_net_wm_window_type_topmenu: Atom,

    pub net_wm_state: Atom,
    pub net_wm_state_modal: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_state_shaded: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_below: Atom,
    pub net_wm_state_demands_attention: Atom,

    pub net_wm_allowed_actions: Atom,
    pub net_wm_action_move: Atom,
    pub net_wm_action_resize: Atom,
    pub net_wm_action_minimize: Atom,
    pub net_wm_action_shade: Atom,
    pub net_wm_action_stick: Atom,
    pub net_wm_action_maximize_vert: Atom,
    pub net_wm_action_maximize_horz: Atom,
    pub net_wm_action_fullscreen: Atom,
    pub net_wm_action_change_desktop: Atom,
    pub net_wm_action_close: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        Self::from_lookup(|name| Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom))
    }

    /// Build the table from any name to atom lookup
    pub fn from_lookup<F>(mut intern: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Atom>,
    {
        Ok(Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            wm_client_leader: intern("WM_CLIENT_LEADER")?,
            utf8_string: intern("UTF8_STRING")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,

            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,

            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_icon_name: intern("_NET_WM_ICON_NAME")?,
            net_wm_visible_name: intern("_NET_WM_VISIBLE_NAME")?,
            net_wm_visible_icon_name: intern("_NET_WM_VISIBLE_ICON_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_pid: intern("_NET_WM_PID")?,
            net_frame_extents: intern("_NET_FRAME_EXTENTS")?,

            net_wm_ping: intern("_NET_WM_PING")?,
            net_wm_take_activity: intern("_NET_WM_TAKE_ACTIVITY")?,
            net_wm_context_help: intern("_NET_WM_CONTEXT_HELP")?,

            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_toolbar: intern("_NET_WM_WINDOW_TYPE_TOOLBAR")?,
            net_wm_window_type_menu: intern("_NET_WM_WINDOW_TYPE_MENU")?,
            net_wm_window_type_dialog: intern("_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_wm_window_type_utility: intern("_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_splash: intern("_NET_WM_WINDOW_TYPE_SPLASH")?,
            kde_net_wm_window_type_override: intern("_KDE_NET_WM_WINDOW_TYPE_OVERRIDE")?,
            kde_net_wm_window_type_topmenu: intern("_KDE_NET_WM_WINDOW_TYPE_TOPMENU")?,

            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_modal: intern("_NET_WM_STATE_MODAL")?,
            net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_state_shaded: intern("_NET_WM_STATE_SHADED")?,
            net_wm_state_skip_taskbar: intern("_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern("_NET_WM_STATE_SKIP_PAGER")?,
            net_wm_state_hidden: intern("_NET_WM_STATE_HIDDEN")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_above: intern("_NET_WM_STATE_ABOVE")?,
            net_wm_state_below: intern("_NET_WM_STATE_BELOW")?,
            net_wm_state_demands_attention: intern("_NET_WM_STATE_DEMANDS_ATTENTION")?,

            net_wm_allowed_actions: intern("_NET_WM_ALLOWED_ACTIONS")?,
            net_wm_action_move: intern("_NET_WM_ACTION_MOVE")?,
            net_wm_action_resize: intern("_NET_WM_ACTION_RESIZE")?,
            net_wm_action_minimize: intern("_NET_WM_ACTION_MINIMIZE")?,
            net_wm_action_shade: intern("_NET_WM_ACTION_SHADE")?,
            net_wm_action_stick: intern("_NET_WM_ACTION_STICK")?,
            net_wm_action_maximize_vert: intern("_NET_WM_ACTION_MAXIMIZE_VERT")?,
            net_wm_action_maximize_horz: intern("_NET_WM_ACTION_MAXIMIZE_HORZ")?,
            net_wm_action_fullscreen: intern("_NET_WM_ACTION_FULLSCREEN")?,
            net_wm_action_change_desktop: intern("_NET_WM_ACTION_CHANGE_DESKTOP")?,
            net_wm_action_close: intern("_NET_WM_ACTION_CLOSE")?,
        })
    }

    /// Set up _NET_SUPPORTED on root window
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window) -> Result<()> {
        conn.change_property32(PropMode::REPLACE, root, self.net_supported, AtomEnum::ATOM, &self.supported())?;
        Ok(())
    }

    fn supported(&self) -> Vec<Atom> {
        let mut supported = vec![
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_close_window,
            self.net_wm_name,
            self.net_wm_icon_name,
            self.net_wm_visible_name,
            self.net_wm_visible_icon_name,
            self.net_wm_desktop,
            self.net_wm_pid,
            self.net_frame_extents,
            self.net_wm_ping,
            self.net_wm_take_activity,
            self.net_wm_window_type,
            self.net_wm_state,
            self.net_wm_allowed_actions,
        ];
        supported.extend(self.state_table().iter().map(|&(_, atom)| atom));
        supported.extend(self.action_table().iter().map(|&(_, atom)| atom));
        supported.extend(self.type_table().iter().map(|&(_, atom)| atom));
        supported
    }

    fn protocol_table(&self) -> [(Protocols, Atom); 5] {
        [
            (Protocols::DELETE_WINDOW, self.wm_delete_window),
            (Protocols::TAKE_FOCUS, self.wm_take_focus),
            (Protocols::TAKE_ACTIVITY, self.net_wm_take_activity),
            (Protocols::CONTEXT_HELP, self.net_wm_context_help),
            (Protocols::PING, self.net_wm_ping),
        ]
    }

    fn type_table(&self) -> [(WindowType, Atom); 10] {
        [
            (WindowType::Override, self.kde_net_wm_window_type_override),
            (WindowType::TopMenu, self.kde_net_wm_window_type_topmenu),
            (WindowType::Normal, self.net_wm_window_type_normal),
            (WindowType::Desktop, self.net_wm_window_type_desktop),
            (WindowType::Dock, self.net_wm_window_type_dock),
            (WindowType::Toolbar, self.net_wm_window_type_toolbar),
            (WindowType::Menu, self.net_wm_window_type_menu),
            (WindowType::Dialog, self.net_wm_window_type_dialog),
            (WindowType::Utility, self.net_wm_window_type_utility),
            (WindowType::Splash, self.net_wm_window_type_splash),
        ]
    }

    fn state_table(&self) -> [(NetState, Atom); 12] {
        [
            (NetState::MODAL, self.net_wm_state_modal),
            (NetState::STICKY, self.net_wm_state_sticky),
            (NetState::MAXIMIZED_VERT, self.net_wm_state_maximized_vert),
            (NetState::MAXIMIZED_HORZ, self.net_wm_state_maximized_horz),
            (NetState::SHADED, self.net_wm_state_shaded),
            (NetState::SKIP_TASKBAR, self.net_wm_state_skip_taskbar),
            (NetState::SKIP_PAGER, self.net_wm_state_skip_pager),
            (NetState::HIDDEN, self.net_wm_state_hidden),
            (NetState::FULLSCREEN, self.net_wm_state_fullscreen),
            (NetState::ABOVE, self.net_wm_state_above),
            (NetState::BELOW, self.net_wm_state_below),
            (NetState::DEMANDS_ATTENTION, self.net_wm_state_demands_attention),
        ]
    }

    fn action_table(&self) -> [(AllowedActions, Atom); 10] {
        [
            (AllowedActions::MOVE, self.net_wm_action_move),
            (AllowedActions::RESIZE, self.net_wm_action_resize),
            (AllowedActions::MINIMIZE, self.net_wm_action_minimize),
            (AllowedActions::SHADE, self.net_wm_action_shade),
            (AllowedActions::STICK, self.net_wm_action_stick),
            (AllowedActions::MAXIMIZE_VERT, self.net_wm_action_maximize_vert),
            (AllowedActions::MAXIMIZE_HORZ, self.net_wm_action_maximize_horz),
            (AllowedActions::FULLSCREEN, self.net_wm_action_fullscreen),
            (AllowedActions::CHANGE_DESKTOP, self.net_wm_action_change_desktop),
            (AllowedActions::CLOSE, self.net_wm_action_close),
        ]
    }

    /// WM_PROTOCOLS contents as flags; unknown entries are ignored
    pub fn protocols_from(&self, atoms: &[Atom]) -> Protocols {
        self.protocol_table()
            .iter()
            .filter(|(_, atom)| atoms.contains(atom))
            .fold(Protocols::empty(), |acc, &(flag, _)| acc | flag)
    }

    /// First window type in the list this manager understands
    pub fn window_type_from(&self, atoms: &[Atom]) -> WindowType {
        let table = self.type_table();
        atoms
            .iter()
            .find_map(|atom| table.iter().find(|(_, a)| a == atom).map(|&(wt, _)| wt))
            .unwrap_or_default()
    }

    pub fn net_state_from(&self, atoms: &[Atom]) -> NetState {
        self.state_table()
            .iter()
            .filter(|(_, atom)| atoms.contains(atom))
            .fold(NetState::empty(), |acc, &(flag, _)| acc | flag)
    }

    /// New _NET_WM_STATE list: the bits of `mask` set to `state`, the rest
    /// of `current` (including atoms we do not know) kept as is
    pub fn merge_net_state(&self, current: &[Atom], state: NetState, mask: NetState) -> Vec<Atom> {
        let table = self.state_table();
        let masked: Vec<Atom> = table.iter().filter(|(flag, _)| mask.contains(*flag)).map(|&(_, a)| a).collect();
        let mut atoms: Vec<Atom> = current.iter().copied().filter(|a| !masked.contains(a)).collect();
        atoms.extend(
            table
                .iter()
                .filter(|(flag, _)| mask.contains(*flag) && state.contains(*flag))
                .map(|&(_, atom)| atom),
        );
        atoms
    }

    pub fn allowed_action_atoms(&self, actions: AllowedActions) -> Vec<Atom> {
        self.action_table()
            .iter()
            .filter(|(flag, _)| actions.contains(*flag))
            .map(|&(_, atom)| atom)
            .collect()
    }

    /// WM_PROTOCOLS client message payload
    pub fn message_data(&self, message: ProtocolMessage, timestamp: Timestamp, window: WindowId) -> [u32; 5] {
        match message {
            ProtocolMessage::DeleteWindow => [self.wm_delete_window, timestamp, 0, 0, 0],
            ProtocolMessage::TakeFocus => [self.wm_take_focus, timestamp, 0, 0, 0],
            ProtocolMessage::TakeActivity(flags) => [self.net_wm_take_activity, timestamp, window, flags.bits(), 0],
            ProtocolMessage::ContextHelp => [self.net_wm_context_help, timestamp, 0, 0, 0],
            ProtocolMessage::Ping => [self.net_wm_ping, timestamp, window, 0, 0],
        }
    }
}

#[cfg(test)]
pub(crate) fn test_atoms() -> Atoms {
    let mut next = 100;
    let atoms = Atoms::from_lookup(|_| {
        next += 1;
        Ok(next)
    });
    atoms.unwrap()
}
