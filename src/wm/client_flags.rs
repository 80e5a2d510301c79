//! Client Flags
//!
//! Bitfield flags for protocol capabilities and published window state,
//! plus window type classification.

use bitflags::bitflags;

use crate::config::ClassificationConfig;
use crate::shared::Geometry;

bitflags! {
    /// WM_PROTOCOLS entries a client advertises
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u32 {
        const DELETE_WINDOW = 1 << 0;
        const TAKE_FOCUS    = 1 << 1;
        const TAKE_ACTIVITY = 1 << 2;
        const CONTEXT_HELP  = 1 << 3;
        const PING          = 1 << 4;
    }
}

bitflags! {
    /// _NET_WM_STATE bits the client layer publishes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetState: u32 {
        const MODAL             = 1 << 0;
        const STICKY            = 1 << 1;
        const MAXIMIZED_VERT    = 1 << 2;
        const MAXIMIZED_HORZ    = 1 << 3;
        const SHADED            = 1 << 4;
        const SKIP_TASKBAR      = 1 << 5;
        const SKIP_PAGER        = 1 << 6;
        const HIDDEN            = 1 << 7;
        const FULLSCREEN        = 1 << 8;
        const ABOVE             = 1 << 9;
        const BELOW             = 1 << 10;
        const DEMANDS_ATTENTION = 1 << 11;
    }
}

bitflags! {
    /// _NET_WM_ALLOWED_ACTIONS
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllowedActions: u32 {
        const MOVE           = 1 << 0;
        const RESIZE         = 1 << 1;
        const MINIMIZE       = 1 << 2;
        const SHADE          = 1 << 3;
        const STICK          = 1 << 4;
        const MAXIMIZE_VERT  = 1 << 5;
        const MAXIMIZE_HORZ  = 1 << 6;
        const FULLSCREEN     = 1 << 7;
        const CHANGE_DESKTOP = 1 << 8;
        const CLOSE          = 1 << 9;
    }
}

impl AllowedActions {
    pub fn maximize() -> Self {
        Self::MAXIMIZE_VERT | Self::MAXIMIZE_HORZ
    }
}

bitflags! {
    /// What an activation request asks the client to do
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActivityFlags: u32 {
        const FOCUS       = 1 << 0;
        const FOCUS_FORCE = 1 << 1;
        const RAISE       = 1 << 2;
    }
}

/// Window type (EWMH _NET_WM_WINDOW_TYPE plus the KDE extensions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Unknown,
    Normal,
    Desktop,
    Dock,
    Toolbar,
    Menu,
    Dialog,
    Override,
    TopMenu,
    Utility,
    Splash,
}

impl WindowType {
    /// Resolve the type a window is treated as
    ///
    /// `declared` is what the client put in _NET_WM_WINDOW_TYPE. The
    /// exceptions in `rules` work around specific legacy clients.
    pub fn classify(
        declared: WindowType,
        resource_class: &str,
        frame: Geometry,
        screen_width: u32,
        transient: bool,
        rules: &ClassificationConfig,
    ) -> WindowType {
        let mut wt = declared;
        if wt == WindowType::Menu && rules.detect_top_menu && looks_like_top_menu(frame, screen_width) {
            wt = WindowType::TopMenu;
        }
        if wt == WindowType::Dialog
            && rules
                .dialog_as_normal_classes
                .iter()
                .any(|prefix| resource_class.starts_with(prefix.as_str()))
        {
            wt = WindowType::Normal;
        }
        if wt == WindowType::Unknown {
            wt = if transient { WindowType::Dialog } else { WindowType::Normal };
        }
        wt
    }

    /// Types that never get a decoration
    pub fn is_borderless(self) -> bool {
        matches!(
            self,
            WindowType::Desktop
                | WindowType::Dock
                | WindowType::TopMenu
                | WindowType::Override
                | WindowType::Splash
        )
    }
}

/// Menus from the era before TopMenu existed: screen wide, short, and
/// starting a few pixels above the screen.
fn looks_like_top_menu(frame: Geometry, screen_width: u32) -> bool {
    frame.x == 0
        && frame.y < 0
        && frame.y > -10
        && frame.height < 100
        && frame.width.abs_diff(screen_width) < 10
}
