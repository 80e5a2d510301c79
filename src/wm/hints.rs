//! Hints Module
//!
//! Decoded ICCCM/Motif hints and the one-shot probe taken when a window
//! is managed. Missing or malformed properties decode to defaults; a
//! probe never fails.

use tracing::debug;

use crate::wm::client_flags::{NetState, Protocols, WindowType};
use crate::wm::geometry::Gravity;
use crate::wm::protocol::{Desktop, WindowId, WindowServer};

// WM_HINTS flags
const INPUT_HINT: u32 = 1 << 0;
const STATE_HINT: u32 = 1 << 1;
const WINDOW_GROUP_HINT: u32 = 1 << 6;
const URGENCY_HINT: u32 = 1 << 8;
const ICONIC_STATE: u32 = 3;

// WM_NORMAL_HINTS flags
const P_WIN_GRAVITY: u32 = 1 << 9;

// _MOTIF_WM_HINTS
const MWM_HINTS_FUNCTIONS: u32 = 1 << 0;
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_FUNC_ALL: u32 = 1 << 0;
const MWM_FUNC_RESIZE: u32 = 1 << 1;
const MWM_FUNC_MOVE: u32 = 1 << 2;
const MWM_FUNC_CLOSE: u32 = 1 << 5;

/// WM hints (XWMHints equivalent, only the parts the client layer uses)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    /// Client accepts input focus through SetInputFocus
    pub input: bool,
    pub window_group: Option<WindowId>,
    pub urgent: bool,
    pub initially_iconic: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            input: true,
            window_group: None,
            urgent: false,
            initially_iconic: false,
        }
    }
}

impl WmHints {
    /// Decode the 32-bit values of a WM_HINTS property
    pub fn decode(values: &[u32]) -> Self {
        let mut hints = Self::default();
        let Some(&flags) = values.first() else {
            return hints;
        };
        if flags & INPUT_HINT != 0 {
            if let Some(&input) = values.get(1) {
                hints.input = input != 0;
            }
        }
        if flags & STATE_HINT != 0 {
            hints.initially_iconic = values.get(2) == Some(&ICONIC_STATE);
        }
        if flags & WINDOW_GROUP_HINT != 0 {
            hints.window_group = values.get(8).copied().filter(|&w| w != 0);
        }
        hints.urgent = flags & URGENCY_HINT != 0;
        hints
    }
}

/// Decode the window gravity out of WM_NORMAL_HINTS
pub fn decode_gravity(values: &[u32]) -> Gravity {
    match (values.first(), values.get(17)) {
        (Some(&flags), Some(&gravity)) if flags & P_WIN_GRAVITY != 0 => Gravity::from_wire(gravity),
        _ => Gravity::NorthWest,
    }
}

/// Motif hints (decoration and function restrictions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotifHints {
    pub no_border: bool,
    pub may_move: bool,
    pub may_resize: bool,
    pub may_close: bool,
}

impl Default for MotifHints {
    fn default() -> Self {
        Self {
            no_border: false,
            may_move: true,
            may_resize: true,
            may_close: true,
        }
    }
}

impl MotifHints {
    pub fn decode(values: &[u32]) -> Self {
        let mut hints = Self::default();
        if values.len() < 3 {
            return hints;
        }
        let (flags, functions, decorations) = (values[0], values[1], values[2]);
        if flags & MWM_HINTS_FUNCTIONS != 0 {
            // With MWM_FUNC_ALL the listed functions are the ones turned off
            let set_value = functions & MWM_FUNC_ALL == 0;
            let pick = |bit: u32| if functions & bit != 0 { set_value } else { !set_value };
            hints.may_resize = pick(MWM_FUNC_RESIZE);
            hints.may_move = pick(MWM_FUNC_MOVE);
            hints.may_close = pick(MWM_FUNC_CLOSE);
        }
        if flags & MWM_HINTS_DECORATIONS != 0 && decorations == 0 {
            hints.no_border = true;
        }
        hints
    }
}

/// WM_CLASS, lowercased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceClass {
    pub name: String,
    pub class: String,
}

impl ResourceClass {
    /// Decode the two NUL separated strings of WM_CLASS
    pub fn decode(raw: &[u8]) -> Self {
        let mut parts = raw
            .split(|&b| b == 0)
            .map(|part| String::from_utf8_lossy(part).to_lowercase());
        Self {
            name: parts.next().unwrap_or_default(),
            class: parts.next().unwrap_or_default(),
        }
    }
}

/// Report the machine a client runs on, with the local host as "localhost"
pub fn normalize_client_machine(raw: Option<String>, local_hostname: &str) -> Option<String> {
    let machine = raw.filter(|m| !m.is_empty())?;
    if !local_hostname.is_empty() {
        let short = local_hostname.split('.').next().unwrap_or(local_hostname);
        if machine == local_hostname || machine == short {
            return Some("localhost".to_string());
        }
    }
    Some(machine)
}

/// Host name of the machine the window manager runs on
pub fn local_hostname() -> String {
    nix::unistd::gethostname()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Everything read from a window once, when it is managed
#[derive(Debug, Clone, Default)]
pub struct ClientProbe {
    pub protocols: Protocols,
    pub wm_hints: WmHints,
    pub motif: MotifHints,
    pub gravity: Gravity,
    pub class: ResourceClass,
    pub pid: Option<u32>,
    pub client_machine: Option<String>,
    pub client_leader: Option<WindowId>,
    pub transient_for: Option<WindowId>,
    pub window_type: WindowType,
    pub desktop: Option<Desktop>,
    pub net_state: NetState,
    pub has_shape: bool,
}

impl ClientProbe {
    pub fn read(server: &dyn WindowServer, window: WindowId) -> Self {
        let probe = Self {
            protocols: server.read_protocols(window),
            wm_hints: server.read_wm_hints(window),
            motif: server.read_motif_hints(window),
            gravity: server.read_gravity(window),
            class: server.read_class(window),
            pid: server.read_pid(window).filter(|&pid| pid > 0),
            client_machine: normalize_client_machine(
                server.read_client_machine(window),
                &local_hostname(),
            ),
            client_leader: server.read_client_leader(window).filter(|&w| w != window),
            transient_for: server.read_transient_for(window).filter(|&w| w != window),
            window_type: server.read_window_type(window),
            desktop: server.read_desktop(window),
            net_state: server.read_net_state(window),
            has_shape: server.has_shape(window),
        };
        debug!("Probed window 0x{:x}: {:?}", window, probe);
        probe
    }
}
