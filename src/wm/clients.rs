//! Clients Module
//!
//! The table of managed windows and their groups. Windows refer to each
//! other (transient-for, group leader) by id only; every operation that
//! follows such a reference goes through this table, and removing a
//! window sweeps the references others hold to it.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::wm::caption;
use crate::wm::client::ManagedWindow;
use crate::wm::client_flags::WindowType;
use crate::wm::context::Context;
use crate::wm::hints::WmHints;
use crate::wm::protocol::{Desktop, Timestamp, WindowId, CURRENT_TIME};
use crate::wm::scheduler::ControlEvent;
use crate::wm::shade::ShadeMode;

/// Windows sharing a group leader
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub members: Vec<WindowId>,
    /// Time of the last user interaction with any member
    pub user_time: Timestamp,
}

#[derive(Default)]
pub struct Clients {
    windows: BTreeMap<WindowId, ManagedWindow>,
    groups: HashMap<WindowId, Group>,
    /// Window to the leader of its group
    membership: HashMap<WindowId, WindowId>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.windows.contains_key(&window)
    }

    pub fn get(&self, window: WindowId) -> Option<&ManagedWindow> {
        self.windows.get(&window)
    }

    pub fn get_mut(&mut self, window: WindowId) -> Option<&mut ManagedWindow> {
        self.windows.get_mut(&window)
    }

    pub fn windows(&self) -> impl Iterator<Item = &ManagedWindow> {
        self.windows.values()
    }

    /// Managed window owning `id`, which may be its frame, wrapper or decoration
    pub fn find_owner(&self, id: WindowId) -> Option<WindowId> {
        if self.windows.contains_key(&id) {
            return Some(id);
        }
        self.windows.values().find(|c| c.owns(id)).map(ManagedWindow::window)
    }

    fn window_mut(&mut self, window: WindowId) -> Result<&mut ManagedWindow, ClientError> {
        self.windows.get_mut(&window).ok_or(ClientError::UnknownWindow(window))
    }

    fn window_ref(&self, window: WindowId) -> Result<&ManagedWindow, ClientError> {
        self.windows.get(&window).ok_or(ClientError::UnknownWindow(window))
    }

    // Management

    /// Take `window` under management and show it
    pub fn manage(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        if self.contains(window) {
            return Err(ClientError::AlreadyManaged(window).into());
        }
        let client = ManagedWindow::manage(ctx, window)?;
        self.join_group(window, client.group_leader());
        self.windows.insert(window, client);

        if let Err(e) = self.finish_manage(ctx, window) {
            warn!("Could not finish managing window 0x{:x}: {:#}", window, e);
            self.release_window(ctx, window, false)?;
            return Err(e);
        }
        Ok(())
    }

    fn finish_manage(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let hints = self.get_wm_hints(ctx, window)?;
        self.fetch_name(ctx, window)?;
        self.window_mut(window)?.fetch_iconic_name(ctx)?;

        let start_minimized = hints.initially_iconic && self.is_minimizable(window);
        self.window_mut(window)?.show_initially(ctx, start_minimized)?;
        self.update_allowed_actions(ctx, window, true)
    }

    // Groups

    fn join_group(&mut self, window: WindowId, leader: WindowId) {
        self.groups.entry(leader).or_default().members.push(window);
        self.membership.insert(window, leader);
    }

    fn leave_group(&mut self, window: WindowId) {
        let Some(leader) = self.membership.remove(&window) else {
            return;
        };
        if let Some(group) = self.groups.get_mut(&leader) {
            group.members.retain(|&w| w != window);
            if group.members.is_empty() {
                self.groups.remove(&leader);
            }
        }
    }

    /// Move `window` to the group its hints now name
    fn check_group(&mut self, window: WindowId) {
        let Some(leader) = self.get(window).map(ManagedWindow::group_leader) else {
            return;
        };
        if self.membership.get(&window) == Some(&leader) {
            return;
        }
        debug!("Window 0x{:x} joins group 0x{:x}", window, leader);
        self.leave_group(window);
        self.join_group(window, leader);
    }

    pub fn group_of(&self, window: WindowId) -> Option<&Group> {
        self.membership.get(&window).and_then(|leader| self.groups.get(leader))
    }

    pub fn group_user_time(&self, window: WindowId) -> Option<Timestamp> {
        self.group_of(window).map(|g| g.user_time)
    }

    fn update_group_user_time(&mut self, window: WindowId, time: Timestamp) {
        if time == CURRENT_TIME {
            return;
        }
        let Some(leader) = self.membership.get(&window) else {
            return;
        };
        if let Some(group) = self.groups.get_mut(leader) {
            group.user_time = time;
        }
    }

    // Transients

    /// Managed windows `window` is transient for
    pub fn main_clients(&self, window: WindowId) -> Vec<WindowId> {
        self.get(window)
            .and_then(ManagedWindow::transient_for)
            .filter(|main| self.contains(*main))
            .into_iter()
            .collect()
    }

    pub fn transients_of(&self, window: WindowId) -> Vec<WindowId> {
        self.windows
            .values()
            .filter(|c| c.window() != window && c.transient_for() == Some(window))
            .map(ManagedWindow::window)
            .collect()
    }

    // Captions

    /// Re-read WM_NAME and give the window a caption nobody else shows
    pub fn fetch_name(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let name = caption::sanitize(&ctx.server.read_name(window));
        let client = self.window_ref(window)?;
        if name == client.caption_normal() && !name.is_empty() {
            return Ok(());
        }

        let suffix = if client.has_visible_caption() {
            let taken: Vec<String> = self
                .windows
                .values()
                .filter(|c| c.window() != window && c.has_visible_caption())
                .map(ManagedWindow::caption)
                .collect();
            caption::unique_suffix(&name, taken.iter().map(String::as_str))
        } else {
            None
        };
        debug!("Window 0x{:x} caption {:?}{}", window, name, suffix.as_deref().unwrap_or(""));
        self.window_mut(window)?.apply_caption(ctx, name, suffix)
    }

    pub fn fetch_iconic_name(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        self.window_mut(window)?.fetch_iconic_name(ctx)
    }

    // Hints

    pub fn get_wm_hints(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<WmHints> {
        let hints = self.window_mut(window)?.get_wm_hints(ctx)?;
        self.check_group(window);
        self.update_allowed_actions(ctx, window, false)?;
        Ok(hints)
    }

    pub fn get_window_protocols(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        self.window_mut(window)?.get_window_protocols(ctx);
        Ok(())
    }

    // Capabilities that depend on other windows

    pub fn is_minimizable(&self, window: WindowId) -> bool {
        let Some(client) = self.get(window) else {
            return false;
        };
        if client.is_special_window() && client.window_type() != WindowType::Override {
            return false;
        }
        if client.is_transient() && !client.wants_tab_focus() {
            // Tool windows go along when their main window is minimized
            let shown_main = self
                .main_clients(window)
                .iter()
                .filter_map(|main| self.get(*main))
                .any(|main| main.is_shown(true));
            if !shown_main {
                return true;
            }
        }
        if client.is_transient() {
            return false;
        }
        client.wants_tab_focus()
    }

    pub fn update_allowed_actions(&mut self, ctx: &mut Context<'_>, window: WindowId, force: bool) -> Result<()> {
        let minimizable = self.is_minimizable(window);
        self.window_mut(window)?.update_allowed_actions(ctx, minimizable, force)
    }

    // Minimizing and shading

    pub fn minimize(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let minimizable = self.is_minimizable(window);
        if self.window_mut(window)?.minimize(ctx, minimizable)? {
            self.update_allowed_actions(ctx, window, false)?;
            self.update_minimized_of_transients(ctx, window)?;
        }
        Ok(())
    }

    pub fn unminimize(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        if self.window_mut(window)?.unminimize(ctx)? {
            self.update_allowed_actions(ctx, window, false)?;
            self.update_minimized_of_transients(ctx, window)?;
        }
        Ok(())
    }

    /// Transients follow their main window into and out of hiding
    fn update_minimized_of_transients(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let mut pending = vec![window];
        let mut visited = HashSet::new();
        while let Some(main) = pending.pop() {
            if !visited.insert(main) {
                continue;
            }
            let Some(hide) = self.get(main).map(|c| c.is_minimized() || c.is_shade()) else {
                continue;
            };
            for transient in self.transients_of(main) {
                let Some(client) = self.get(transient) else {
                    continue;
                };
                if client.window_type() == WindowType::TopMenu || client.is_minimized() == hide {
                    continue;
                }
                let changed = if hide {
                    let minimizable = self.is_minimizable(transient);
                    self.window_mut(transient)?.minimize(ctx, minimizable)?
                } else {
                    self.window_mut(transient)?.unminimize(ctx)?
                };
                if changed {
                    self.update_allowed_actions(ctx, transient, false)?;
                }
                pending.push(transient);
            }
        }
        Ok(())
    }

    pub fn set_shade(&mut self, ctx: &mut Context<'_>, window: WindowId, mode: ShadeMode) -> Result<()> {
        if self.window_mut(window)?.set_shade(ctx, mode)? {
            self.update_allowed_actions(ctx, window, false)?;
            self.update_minimized_of_transients(ctx, window)?;
        }
        Ok(())
    }

    /// Normal shade on and off; a hover or activation unshade also ends
    pub fn toggle_shade(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let mode = if self.window_ref(window)?.shade_mode() == ShadeMode::None {
            ShadeMode::Normal
        } else {
            ShadeMode::None
        };
        self.set_shade(ctx, window, mode)
    }

    pub fn shade_hover(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        self.set_shade(ctx, window, ShadeMode::Hover)
    }

    // Borders

    pub fn set_user_no_border(&mut self, ctx: &mut Context<'_>, window: WindowId, set: bool) -> Result<()> {
        if self.window_mut(window)?.set_user_no_border(ctx, set)? {
            self.update_allowed_actions(ctx, window, false)?;
        }
        Ok(())
    }

    pub fn set_full_screen(&mut self, ctx: &mut Context<'_>, window: WindowId, set: bool) -> Result<()> {
        if self.window_mut(window)?.set_full_screen(ctx, set)? {
            self.update_allowed_actions(ctx, window, false)?;
        }
        Ok(())
    }

    pub fn update_shape(&mut self, ctx: &mut Context<'_>, window: WindowId, has_shape: bool) -> Result<()> {
        self.window_mut(window)?.update_shape(ctx, has_shape)?;
        self.update_allowed_actions(ctx, window, false)
    }

    // Desktops

    pub fn set_desktop(&mut self, ctx: &mut Context<'_>, window: WindowId, desktop: Desktop) -> Result<()> {
        if self.window_mut(window)?.set_desktop(ctx, desktop)? {
            self.update_on_all_desktops_of_transients(ctx, window)?;
        }
        Ok(())
    }

    pub fn set_on_all_desktops(&mut self, ctx: &mut Context<'_>, window: WindowId, all: bool) -> Result<()> {
        if self.window_mut(window)?.set_on_all_desktops(ctx, all)? {
            self.update_on_all_desktops_of_transients(ctx, window)?;
        }
        Ok(())
    }

    pub fn toggle_on_all_desktops(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let all = self.window_ref(window)?.is_on_all_desktops();
        self.set_on_all_desktops(ctx, window, !all)
    }

    fn update_on_all_desktops_of_transients(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let mut pending = vec![window];
        let mut visited = HashSet::new();
        while let Some(main) = pending.pop() {
            if !visited.insert(main) {
                continue;
            }
            let Some(all) = self.get(main).map(ManagedWindow::is_on_all_desktops) else {
                continue;
            };
            for transient in self.transients_of(main) {
                if self.window_mut(transient)?.set_on_all_desktops(ctx, all)? {
                    pending.push(transient);
                }
            }
        }
        Ok(())
    }

    /// Show and hide everything after the current desktop changed
    pub fn current_desktop_changed(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        for client in self.windows.values_mut() {
            client.virtual_desktop_change(ctx)?;
        }
        Ok(())
    }

    // Closing and liveness

    /// Politely ask the window to close, or kill it if it cannot be asked
    pub fn close_window(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        if !self.window_ref(window)?.is_closeable() {
            return Ok(());
        }
        // Anything the close brings up belongs to the group's last interaction
        self.update_group_user_time(window, ctx.timestamp);
        if self.window_mut(window)?.request_delete(ctx)? {
            return Ok(());
        }
        self.kill_window(ctx, window)
    }

    pub fn kill_window(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let client = self.remove(window)?;
        client.kill_window(ctx);
        self.after_removal(ctx, window);
        Ok(())
    }

    pub fn got_ping(&mut self, ctx: &mut Context<'_>, window: WindowId, timestamp: Timestamp) -> bool {
        self.windows
            .get_mut(&window)
            .is_some_and(|c| c.got_ping(ctx, timestamp))
    }

    /// Deliver a timer or helper completion; stale ones are dropped
    pub fn handle_event(&mut self, ctx: &mut Context<'_>, event: ControlEvent) -> Result<()> {
        match event {
            ControlEvent::PingTimeout { window, timestamp } => match self.windows.get_mut(&window) {
                Some(client) => client.ping_timeout(ctx, timestamp),
                None => {
                    debug!("Ping timeout for gone window 0x{:x}", window);
                    Ok(())
                }
            },
            ControlEvent::HelperExited { window, process } => {
                let ours = self
                    .windows
                    .get_mut(&window)
                    .is_some_and(|c| c.helper_exited(process));
                if !ours {
                    debug!("Helper {:?} of window 0x{:x} exited after it stopped mattering", process, window);
                }
                Ok(())
            }
        }
    }

    // Terminal paths

    /// Take `window` out of the table and sweep references to it
    fn remove(&mut self, window: WindowId) -> Result<ManagedWindow, ClientError> {
        let client = self.windows.remove(&window).ok_or(ClientError::UnknownWindow(window))?;
        self.leave_group(window);
        for other in self.windows.values_mut() {
            if other.transient_for() == Some(window) {
                other.clear_transient_for();
            }
        }
        Ok(client)
    }

    /// Refresh windows whose abilities depended on the removed one
    fn after_removal(&mut self, ctx: &mut Context<'_>, window: WindowId) {
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.update_allowed_actions(ctx, id, false) {
                warn!("Updating window 0x{:x} after removing 0x{:x}: {:#}", id, window, e);
            }
        }
    }

    pub fn release_window(&mut self, ctx: &mut Context<'_>, window: WindowId, on_shutdown: bool) -> Result<()> {
        let client = self.remove(window)?;
        client.release_window(ctx, on_shutdown);
        if !on_shutdown {
            self.after_removal(ctx, window);
        }
        Ok(())
    }

    pub fn destroy_client(&mut self, ctx: &mut Context<'_>, window: WindowId) -> Result<()> {
        let client = self.remove(window)?;
        client.destroy_client(ctx);
        self.after_removal(ctx, window);
        Ok(())
    }

    /// Bring every frame in line with the current decorations
    ///
    /// `force` rebuilds each decoration from the workspace's factory;
    /// otherwise only border insets the decorations changed are picked up.
    pub fn update_decorations(&mut self, ctx: &mut Context<'_>, force: bool) {
        for (window, client) in self.windows.iter_mut() {
            let result = if force {
                client.update_decoration(ctx, true)
            } else {
                client.check_border_sizes(ctx)
            };
            if let Err(e) = result {
                warn!("Failed to update decoration of window 0x{:x}: {:#}", window, e);
            }
        }
    }

    /// Hand every window back, e.g. when the manager exits
    pub fn release_all(&mut self, ctx: &mut Context<'_>, on_shutdown: bool) {
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        info!("Releasing {} windows", ids.len());
        for window in ids {
            if let Ok(client) = self.remove(window) {
                client.release_window(ctx, on_shutdown);
            }
        }
    }
}
