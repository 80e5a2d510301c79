//! Client Module
//!
//! A managed window: the client window a process owns, the wrapper we
//! reparent it into, and the frame that also holds the decoration.
//!
//! Operations here touch only this one window. Anything that needs to
//! see other windows (captions, groups, transients) lives in
//! [`Clients`](crate::wm::clients::Clients).

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::shared::{BorderInsets, Geometry, Point, Size};
use crate::wm::client_flags::{ActivityFlags, AllowedActions, NetState, Protocols, WindowType};
use crate::wm::context::Context;
use crate::wm::decorations::Decoration;
use crate::wm::geometry::{calculate_gravitation, size_for_client_size, Gravity, SizeMode};
use crate::wm::hints::{ClientProbe, MotifHints, ResourceClass, WmHints};
use crate::wm::protocol::{Desktop, InputSelection, MappingState, ProtocolMessage, Timestamp, WindowId, CURRENT_TIME};
use crate::wm::scheduler::ProcessId;
use crate::wm::shade::{ShadeAnimation, ShadeMode};
use crate::wm::terminate::{KillTarget, LivenessMonitor};

/// The three windows that make up a managed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandles {
    pub client: WindowId,
    pub wrapper: WindowId,
    pub frame: WindowId,
}

enum Identity {
    Unmanaged,
    Managed {
        handles: FrameHandles,
        decoration: Option<Box<dyn Decoration>>,
    },
}

/// State bits mirrored from the client's own _NET_WM_STATE at manage time
const INITIAL_STATE: NetState = NetState::SKIP_TASKBAR
    .union(NetState::SKIP_PAGER)
    .union(NetState::MODAL)
    .union(NetState::FULLSCREEN);

fn best_effort(window: WindowId, what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Window 0x{:x}: {} failed: {:#}", window, what, e);
    }
}

pub struct ManagedWindow {
    window: WindowId,
    identity: Identity,

    frame_geometry: Geometry,
    client_size: Size,
    borders: BorderInsets,
    gravity: Gravity,
    /// While > 0, geometry changes are recorded but not sent
    block_geometry: u32,
    mask: Option<Vec<Geometry>>,
    has_shape: bool,
    fullscreen_restore: Option<Geometry>,

    mapping_state: MappingState,
    shade_mode: ShadeMode,
    desktop: Option<Desktop>,
    net_state: NetState,
    allowed_actions: AllowedActions,

    active: bool,
    minimized: bool,
    hidden: bool,
    modal: bool,
    urgent: bool,
    skip_taskbar: bool,
    original_skip_taskbar: bool,
    skip_pager: bool,
    fullscreen: bool,
    intrinsic_no_border: bool,
    user_no_border: bool,

    protocols: Protocols,
    input: bool,
    motif: MotifHints,
    window_type: WindowType,
    resource_class: ResourceClass,
    pid: Option<u32>,
    client_machine: Option<String>,
    client_leader: Option<WindowId>,
    transient_for: Option<WindowId>,
    window_group: Option<WindowId>,

    caption_normal: String,
    caption_suffix: Option<String>,
    caption_iconic: String,

    liveness: LivenessMonitor,
}

impl ManagedWindow {
    /// Take over `window`: frame it, probe it and attach a decoration
    ///
    /// The window comes back Withdrawn with geometry commits blocked;
    /// the first mapping state change sends the geometry out.
    pub(crate) fn manage(ctx: &mut Context<'_>, window: WindowId) -> Result<Self> {
        let geometry = ctx.server.read_geometry(window).ok_or(ClientError::Vanished(window))?;
        let probe = ClientProbe::read(&*ctx.server, window);

        let root = ctx.workspace.root_window();
        let frame = ctx.server.create_container(root, geometry, None)?;
        let wrapper = match ctx.server.create_container(frame, Geometry::from_parts(Point::default(), geometry.size()), None) {
            Ok(wrapper) => wrapper,
            Err(e) => {
                best_effort(window, "destroying frame", ctx.server.destroy_window(frame));
                return Err(e);
            }
        };

        let window_type = WindowType::classify(
            probe.window_type,
            &probe.class.class,
            geometry,
            ctx.workspace.full_area().width,
            probe.transient_for.is_some(),
            &ctx.config.classification,
        );
        let skip_taskbar = probe.net_state.contains(NetState::SKIP_TASKBAR);

        let mut client = Self {
            window,
            identity: Identity::Managed {
                handles: FrameHandles { client: window, wrapper, frame },
                decoration: None,
            },
            frame_geometry: geometry,
            client_size: geometry.size(),
            borders: BorderInsets::default(),
            gravity: probe.gravity,
            block_geometry: 1,
            mask: None,
            has_shape: probe.has_shape,
            fullscreen_restore: None,
            mapping_state: MappingState::Withdrawn,
            shade_mode: ShadeMode::None,
            desktop: None,
            net_state: NetState::empty(),
            allowed_actions: AllowedActions::empty(),
            active: false,
            minimized: false,
            hidden: false,
            modal: probe.net_state.contains(NetState::MODAL),
            urgent: false,
            skip_taskbar,
            original_skip_taskbar: skip_taskbar,
            skip_pager: probe.net_state.contains(NetState::SKIP_PAGER),
            fullscreen: probe.net_state.contains(NetState::FULLSCREEN),
            intrinsic_no_border: probe.has_shape || probe.motif.no_border || window_type.is_borderless(),
            user_no_border: false,
            protocols: probe.protocols,
            input: probe.wm_hints.input,
            motif: probe.motif,
            window_type,
            resource_class: probe.class.clone(),
            pid: probe.pid,
            client_machine: probe.client_machine.clone(),
            client_leader: probe.client_leader,
            transient_for: probe.transient_for,
            window_group: probe.wm_hints.window_group,
            caption_normal: String::new(),
            caption_suffix: None,
            caption_iconic: String::new(),
            liveness: LivenessMonitor::new(),
        };

        if let Err(e) = client.setup(ctx, &probe) {
            warn!("Managing window 0x{:x} failed, handing it back: {:#}", window, e);
            client.release_window(ctx, false);
            return Err(e);
        }

        info!("Managing window 0x{:x} as {:?} (frame 0x{:x})", window, window_type, frame);
        Ok(client)
    }

    fn setup(&mut self, ctx: &mut Context<'_>, probe: &ClientProbe) -> Result<()> {
        let handles = self.handles()?;
        ctx.server.select_input(handles.wrapper, InputSelection::Wrapper)?;
        ctx.server.select_input(handles.client, InputSelection::ClientWindow)?;
        ctx.server.add_to_save_set(handles.client)?;
        ctx.server.reparent_window(handles.client, handles.wrapper, Point::default())?;

        self.update_decoration(ctx, false)?;

        let desktop = match probe.desktop {
            Some(Desktop::All) => Desktop::All,
            Some(Desktop::Number(n)) if n <= ctx.workspace.number_of_desktops() => Desktop::Number(n),
            _ => Desktop::Number(ctx.workspace.current_desktop()),
        };
        self.desktop = Some(desktop);
        ctx.server.set_desktop(handles.client, Some(desktop))?;

        self.publish_state(ctx, probe.net_state & INITIAL_STATE, INITIAL_STATE)
    }

    /// Map the freshly managed window, or leave it iconic
    pub(crate) fn show_initially(&mut self, ctx: &mut Context<'_>, start_minimized: bool) -> Result<()> {
        if start_minimized {
            self.minimized = true;
            self.set_mapping_state(ctx, MappingState::Iconic)?;
            self.publish_state(ctx, NetState::HIDDEN, NetState::HIDDEN)
        } else if self.is_on_current_desktop(ctx) {
            self.set_mapping_state(ctx, MappingState::Normal)?;
            self.raw_show(ctx)
        } else {
            self.set_mapping_state(ctx, MappingState::Iconic)
        }
    }

    // Identity

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn handles(&self) -> Result<FrameHandles, ClientError> {
        match &self.identity {
            Identity::Managed { handles, .. } => Ok(*handles),
            Identity::Unmanaged => Err(ClientError::NotManaged(self.window)),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self.identity, Identity::Managed { .. })
    }

    /// Whether `id` is one of this window's own windows or its decoration
    pub fn owns(&self, id: WindowId) -> bool {
        match &self.identity {
            Identity::Managed { handles, decoration } => {
                id == handles.client
                    || id == handles.wrapper
                    || id == handles.frame
                    || decoration.as_ref().is_some_and(|d| d.surface() == id)
            }
            Identity::Unmanaged => false,
        }
    }

    fn decoration(&self) -> Option<&(dyn Decoration + 'static)> {
        match &self.identity {
            Identity::Managed { decoration, .. } => decoration.as_deref(),
            Identity::Unmanaged => None,
        }
    }

    fn decoration_mut(&mut self) -> Option<&mut (dyn Decoration + 'static)> {
        match &mut self.identity {
            Identity::Managed { decoration, .. } => decoration.as_deref_mut(),
            Identity::Unmanaged => None,
        }
    }

    pub fn has_decoration(&self) -> bool {
        self.decoration().is_some()
    }

    // Mapping state

    pub fn mapping_state(&self) -> MappingState {
        self.mapping_state
    }

    /// Publish WM_STATE
    ///
    /// Leaving Withdrawn releases the geometry block that management
    /// left in place and commits the geometry once.
    pub fn set_mapping_state(&mut self, ctx: &mut Context<'_>, state: MappingState) -> Result<()> {
        let handles = self.handles()?;
        if self.mapping_state == state {
            return Ok(());
        }
        let was_withdrawn = self.mapping_state == MappingState::Withdrawn;
        self.mapping_state = state;
        ctx.server.set_mapping_state(handles.client, state)?;

        if was_withdrawn && state != MappingState::Withdrawn {
            debug_assert_eq!(self.block_geometry, 1);
            self.block_geometry = self.block_geometry.saturating_sub(1);
            self.set_geometry(ctx, self.frame_geometry, true)?;
        }
        Ok(())
    }

    // Geometry

    pub fn geometry(&self) -> Geometry {
        self.frame_geometry
    }

    pub fn client_size(&self) -> Size {
        self.client_size
    }

    pub fn borders(&self) -> BorderInsets {
        self.borders
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    /// Client window position and size in root coordinates
    pub fn client_geometry(&self) -> Geometry {
        Geometry::from_parts(self.frame_geometry.pos() + self.borders.client_origin(), self.client_size)
    }

    pub fn is_geometry_blocked(&self) -> bool {
        self.block_geometry > 0
    }

    /// Set the frame geometry; sent out unless blocked
    pub fn set_geometry(&mut self, ctx: &mut Context<'_>, geometry: Geometry, force: bool) -> Result<()> {
        if !force && geometry == self.frame_geometry {
            return Ok(());
        }
        self.frame_geometry = geometry;
        if !self.is_shade() {
            self.client_size = Size::new(
                geometry.width.saturating_sub(self.borders.horizontal()),
                geometry.height.saturating_sub(self.borders.vertical()),
            );
        }
        if self.block_geometry > 0 {
            return Ok(());
        }
        self.commit_geometry(ctx)
    }

    pub fn move_to(&mut self, ctx: &mut Context<'_>, pos: Point, force: bool) -> Result<()> {
        if !force && pos == self.frame_geometry.pos() {
            return Ok(());
        }
        self.frame_geometry = self.frame_geometry.with_pos(pos);
        if self.block_geometry > 0 {
            return Ok(());
        }
        let handles = self.handles()?;
        ctx.server.move_resize_window(handles.frame, self.frame_geometry)?;
        ctx.server.send_configure_notify(handles.client, self.client_geometry())
    }

    /// Resize the frame in place
    ///
    /// A shaded window keeps its shaded height; the requested height only
    /// updates the client size it unrolls to.
    pub fn plain_resize(&mut self, ctx: &mut Context<'_>, size: Size, force: bool) -> Result<()> {
        let mut size = size;
        if self.is_shade() {
            let shaded_height = self.borders.vertical();
            if size.height != shaded_height {
                self.client_size = Size::new(
                    size.width.saturating_sub(self.borders.horizontal()),
                    size.height.saturating_sub(self.borders.vertical()),
                );
                size.height = shaded_height;
            }
        }
        self.set_geometry(ctx, self.frame_geometry.with_size(size), force)
    }

    fn commit_geometry(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        ctx.server.move_resize_window(handles.frame, self.frame_geometry)?;
        if !self.is_shade() {
            let inner = Geometry::from_parts(self.borders.client_origin(), self.client_size);
            ctx.server.move_resize_window(handles.wrapper, inner)?;
            ctx.server.resize_window(handles.client, self.client_size)?;
        }
        let size = self.frame_geometry.size();
        self.resize_decoration(ctx, size)?;
        if self.has_shape {
            ctx.server.copy_bounding_shape(handles.frame, handles.client, self.borders.client_origin())?;
        }
        ctx.server.send_configure_notify(handles.client, self.client_geometry())
    }

    fn resize_decoration(&mut self, ctx: &mut Context<'_>, size: Size) -> Result<()> {
        if let Some(deco) = self.decoration_mut() {
            deco.resize(ctx.server, size)?;
        }
        Ok(())
    }

    fn gravitated_position(&self, invert: bool) -> Point {
        calculate_gravitation(self.frame_geometry.pos(), self.gravity, self.borders, invert)
    }

    /// Run `f` with geometry commits blocked
    fn blocked<'c, T>(
        &mut self,
        ctx: &mut Context<'c>,
        f: impl FnOnce(&mut Self, &mut Context<'c>) -> Result<T>,
    ) -> Result<T> {
        self.block_geometry += 1;
        let result = f(self, ctx);
        self.block_geometry -= 1;
        result
    }

    // Decoration

    pub fn no_border(&self) -> bool {
        self.intrinsic_no_border || self.user_no_border || self.fullscreen
    }

    /// Attach or detach the decoration to match [`no_border`](Self::no_border)
    ///
    /// Does nothing when attachment already matches, unless `force`d, in
    /// which case any decoration is rebuilt from scratch.
    pub fn update_decoration(&mut self, ctx: &mut Context<'_>, force: bool) -> Result<()> {
        if !force && self.has_decoration() != self.no_border() {
            return Ok(());
        }
        let do_show = self.blocked(ctx, |this, ctx| {
            if force {
                this.destroy_decoration(ctx)?;
            }
            if this.no_border() {
                this.destroy_decoration(ctx)?;
                Ok(false)
            } else {
                this.attach_decoration(ctx)?;
                Ok(true)
            }
        })?;
        self.set_geometry(ctx, self.frame_geometry, true)?;
        if do_show {
            if let Some(deco) = self.decoration_mut() {
                deco.show(ctx.server)?;
            }
        }
        self.update_frame_strut(ctx)
    }

    fn attach_decoration(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        let root = ctx.workspace.root_window();
        let factory = ctx
            .workspace
            .decoration_factory()
            .ok_or(ClientError::MissingDecorationFactory)?;
        let decoration = factory.create(&mut *ctx.server, root)?;
        let surface = decoration.surface();
        let borders = decoration.borders(self.is_shade());
        if let Identity::Managed { decoration: slot, .. } = &mut self.identity {
            *slot = Some(decoration);
        }
        debug!("Attached decoration 0x{:x} to window 0x{:x}", surface, self.window);

        ctx.server.reparent_window(surface, handles.frame, Point::default())?;
        ctx.server.lower_window(surface)?;
        self.borders = borders;
        self.move_to(ctx, self.gravitated_position(false), false)?;
        let size = if self.is_shade() {
            size_for_client_size(Size::new(self.client_size.width, 0), self.borders, SizeMode::Shaded)
        } else {
            size_for_client_size(self.client_size, self.borders, SizeMode::Normal)
        };
        self.plain_resize(ctx, size, true)
    }

    /// Drop the decoration and fall back to borderless geometry
    pub fn destroy_decoration(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let decoration = match &mut self.identity {
            Identity::Managed { decoration, .. } => decoration.take(),
            Identity::Unmanaged => None,
        };
        let Some(decoration) = decoration else {
            return Ok(());
        };
        debug!("Detaching decoration from window 0x{:x}", self.window);
        let destroyed = decoration.destroy(ctx.server);

        let anchor = self.gravitated_position(true);
        self.borders = BorderInsets::default();
        self.set_mask(ctx, None)?;
        let size = if self.is_shade() {
            Size::new(self.client_size.width, 0)
        } else {
            self.client_size
        };
        self.plain_resize(ctx, size, true)?;
        self.move_to(ctx, anchor, false)?;
        destroyed
    }

    /// Pick up border insets the decoration changed on its own
    pub fn check_border_sizes(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let Some(deco) = self.decoration() else {
            return Ok(());
        };
        let borders = deco.borders(self.is_shade());
        if borders == self.borders {
            return Ok(());
        }
        debug!("Window 0x{:x} borders {:?} -> {:?}", self.window, self.borders, borders);
        self.blocked(ctx, |this, ctx| {
            this.move_to(ctx, this.gravitated_position(true), false)?;
            this.borders = borders;
            this.move_to(ctx, this.gravitated_position(false), false)?;
            let size = size_for_client_size(this.client_size, this.borders, SizeMode::Normal);
            this.plain_resize(ctx, size, true)
        })?;
        self.set_geometry(ctx, self.frame_geometry, true)
    }

    fn update_frame_strut(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        ctx.server.set_frame_extents(handles.client, self.borders)
    }

    pub fn is_user_no_border(&self) -> bool {
        self.user_no_border
    }

    pub fn user_can_set_no_border(&self) -> bool {
        !self.intrinsic_no_border && !self.fullscreen && !self.is_shade()
    }

    /// Returns whether anything changed
    pub fn set_user_no_border(&mut self, ctx: &mut Context<'_>, set: bool) -> Result<bool> {
        if !self.user_can_set_no_border() || self.user_no_border == set {
            return Ok(false);
        }
        self.user_no_border = set;
        self.update_decoration(ctx, false)?;
        Ok(true)
    }

    pub fn is_full_screen(&self) -> bool {
        self.fullscreen
    }

    pub fn user_can_set_full_screen(&self) -> bool {
        matches!(self.window_type, WindowType::Normal | WindowType::Dialog)
    }

    /// Returns whether anything changed
    pub fn set_full_screen(&mut self, ctx: &mut Context<'_>, set: bool) -> Result<bool> {
        if self.fullscreen == set {
            return Ok(false);
        }
        if set {
            // Borderless windows cannot be unshaded later
            self.set_shade(ctx, ShadeMode::None)?;
            self.fullscreen_restore = Some(self.frame_geometry);
        }
        self.fullscreen = set;
        let state = if set { NetState::FULLSCREEN } else { NetState::empty() };
        self.publish_state(ctx, state, NetState::FULLSCREEN)?;
        self.update_decoration(ctx, false)?;

        let target = if set {
            Some(ctx.workspace.full_area())
        } else {
            self.fullscreen_restore.take()
        };
        if let Some(target) = target {
            self.set_geometry(ctx, target, false)?;
        }
        Ok(true)
    }

    // Shape

    pub fn has_shape(&self) -> bool {
        self.has_shape
    }

    /// Follow a change of the client's bounding shape
    pub fn update_shape(&mut self, ctx: &mut Context<'_>, has_shape: bool) -> Result<()> {
        self.has_shape = has_shape;
        let handles = self.handles()?;
        if has_shape {
            ctx.server.copy_bounding_shape(handles.frame, handles.client, self.borders.client_origin())?;
        } else {
            ctx.server.set_bounding_shape(handles.frame, None)?;
        }
        // Shaped windows cannot carry a decoration
        if has_shape && !self.no_border() {
            self.intrinsic_no_border = true;
            self.update_decoration(ctx, false)?;
        }
        Ok(())
    }

    pub fn mask(&self) -> Option<&[Geometry]> {
        self.mask.as_deref()
    }

    /// Install a custom bounding shape on the frame; `None` clears it
    pub fn set_mask(&mut self, ctx: &mut Context<'_>, rects: Option<Vec<Geometry>>) -> Result<()> {
        self.mask = rects;
        let handles = self.handles()?;
        ctx.server.set_bounding_shape(handles.frame, self.mask.as_deref())
    }

    // Shading

    pub fn shade_mode(&self) -> ShadeMode {
        self.shade_mode
    }

    pub fn is_shade(&self) -> bool {
        self.shade_mode.is_shaded()
    }

    pub fn is_shadeable(&self) -> bool {
        !self.is_special_window() && !self.no_border()
    }

    /// Roll the window up or down
    ///
    /// Returns whether the shaded state really changed; moving between the
    /// shaded modes is bookkeeping only.
    pub fn set_shade(&mut self, ctx: &mut Context<'_>, mode: ShadeMode) -> Result<bool> {
        if !self.is_shadeable() || self.shade_mode == mode {
            return Ok(false);
        }
        let was_shade = self.is_shade();
        let was_mode = self.shade_mode;
        self.shade_mode = mode;
        if was_shade == self.is_shade() {
            return Ok(false);
        }
        let handles = self.handles()?;
        info!("{} window 0x{:x}", if self.is_shade() { "Shading" } else { "Unshading" }, self.window);

        self.blocked(ctx, |this, ctx| this.roll(ctx, handles, was_mode))?;
        self.set_geometry(ctx, self.frame_geometry, true)?;

        let shaded = if self.is_shade() { NetState::SHADED } else { NetState::empty() };
        self.publish_state(ctx, shaded, NetState::SHADED)?;
        let hidden = if self.is_shown(false) { NetState::empty() } else { NetState::HIDDEN };
        self.publish_state(ctx, hidden, NetState::HIDDEN)?;
        let state = if self.is_shown(false) && self.is_on_current_desktop(ctx) {
            MappingState::Normal
        } else {
            MappingState::Iconic
        };
        self.set_mapping_state(ctx, state)?;

        let shaded = self.is_shade();
        if let Some(deco) = self.decoration_mut() {
            deco.shade_change(shaded);
        }
        Ok(true)
    }

    fn roll(&mut self, ctx: &mut Context<'_>, handles: FrameHandles, was_mode: ShadeMode) -> Result<()> {
        // Decorations may drop some borders while shaded
        let shaded = self.is_shade();
        if let Some(borders) = self.decoration().map(|deco| deco.borders(shaded)) {
            self.borders = borders;
        }
        let from = self.frame_geometry.height;

        if self.is_shade() {
            let target = size_for_client_size(Size::new(self.client_size.width, 0), self.borders, SizeMode::Shaded);
            ctx.server.select_input(handles.wrapper, InputSelection::WrapperQuiet)?;
            ctx.server.unmap_window(handles.wrapper)?;
            ctx.server.unmap_window(handles.client)?;
            ctx.server.select_input(handles.wrapper, InputSelection::Wrapper)?;
            self.animate_shade(ctx, handles.frame, from, target)?;
            self.plain_resize(ctx, target, false)?;
            if self.active {
                if was_mode == ShadeMode::Hover {
                    ctx.workspace.activate_next_client(self.window);
                } else {
                    ctx.workspace.focus_to_null();
                }
            }
        } else {
            let target = size_for_client_size(self.client_size, self.borders, SizeMode::Shaded);
            self.animate_shade(ctx, handles.frame, from, target)?;
            self.plain_resize(ctx, target, false)?;
            ctx.server.map_window(handles.wrapper)?;
            ctx.server.map_window(handles.client)?;
            if self.active {
                ctx.workspace.request_focus(self.window);
            }
        }
        Ok(())
    }

    /// Step the frame height towards `target` with the server grabbed
    fn animate_shade(&mut self, ctx: &mut Context<'_>, frame: WindowId, from: u32, target: Size) -> Result<()> {
        if !ctx.config.behavior.animate_shade || from == target.height {
            return Ok(());
        }
        let mut animation = ShadeAnimation::new(from, target.height, ctx.config.behavior.shade_speed, ctx.clock.now());
        ctx.server.grab_server()?;
        let result = (|| -> Result<()> {
            while let Some(height) = animation.next_height(ctx.clock.now()) {
                if animation.is_done() {
                    break;
                }
                let size = Size::new(target.width, height);
                ctx.server.resize_window(frame, size)?;
                self.resize_decoration(ctx, size)?;
                ctx.server.sync()?;
            }
            Ok(())
        })();
        let ungrabbed = ctx.server.ungrab_server();
        result.and(ungrabbed)
    }

    // Visibility

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record focus gained or lost
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if let Some(deco) = self.decoration_mut() {
            deco.active_change(active);
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Visible to the user, with shaded windows counting as shown only if asked
    pub fn is_shown(&self, shaded_is_shown: bool) -> bool {
        !self.minimized && (!self.is_shade() || shaded_is_shown) && !self.hidden
    }

    /// Map the frame, and the client too unless shaded
    pub fn raw_show(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        if let Some(deco) = self.decoration_mut() {
            deco.show(ctx.server)?;
        }
        ctx.server.map_window(handles.frame)?;
        if !self.is_shade() {
            ctx.server.map_window(handles.wrapper)?;
            ctx.server.map_window(handles.client)?;
        }
        Ok(())
    }

    /// Unmap everything without the client seeing its own unmap reported
    pub fn raw_hide(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        ctx.server.select_input(handles.wrapper, InputSelection::WrapperQuiet)?;
        ctx.server.unmap_window(handles.frame)?;
        ctx.server.unmap_window(handles.wrapper)?;
        ctx.server.unmap_window(handles.client)?;
        ctx.server.select_input(handles.wrapper, InputSelection::Wrapper)?;
        if let Some(deco) = self.decoration_mut() {
            deco.hide(ctx.server)?;
        }
        ctx.workspace.client_hidden(self.window);
        Ok(())
    }

    /// Hide for reasons other than minimizing; also drops off the taskbar
    pub fn hide_client(&mut self, ctx: &mut Context<'_>, hide: bool) -> Result<()> {
        if self.hidden == hide {
            return Ok(());
        }
        self.hidden = hide;
        let state = if hide { NetState::HIDDEN } else { NetState::empty() };
        self.publish_state(ctx, state, NetState::HIDDEN)?;
        if hide {
            self.set_mapping_state(ctx, MappingState::Iconic)?;
            self.raw_hide(ctx)?;
            self.set_skip_taskbar(ctx, true, false)
        } else {
            self.set_skip_taskbar(ctx, self.original_skip_taskbar, false)?;
            if self.is_on_current_desktop(ctx) {
                if self.is_shown(false) {
                    self.set_mapping_state(ctx, MappingState::Normal)?;
                }
                self.raw_show(ctx)?;
            }
            Ok(())
        }
    }

    /// Returns whether the window got minimized
    pub(crate) fn minimize(&mut self, ctx: &mut Context<'_>, minimizable: bool) -> Result<bool> {
        if !minimizable || self.minimized {
            return Ok(false);
        }
        debug!("Minimizing window 0x{:x}", self.window);
        self.minimized = true;
        self.set_mapping_state(ctx, MappingState::Iconic)?;
        self.publish_state(ctx, NetState::HIDDEN, NetState::HIDDEN)?;
        self.raw_hide(ctx)?;
        Ok(true)
    }

    /// Returns whether the window got unminimized
    pub(crate) fn unminimize(&mut self, ctx: &mut Context<'_>) -> Result<bool> {
        if !self.minimized {
            return Ok(false);
        }
        debug!("Unminimizing window 0x{:x}", self.window);
        self.minimized = false;
        self.publish_state(ctx, NetState::empty(), NetState::HIDDEN)?;
        if self.is_on_current_desktop(ctx) {
            if self.is_shown(false) {
                self.set_mapping_state(ctx, MappingState::Normal)?;
            }
            self.raw_show(ctx)?;
        }
        Ok(true)
    }

    // Desktops

    pub fn desktop(&self) -> Option<Desktop> {
        self.desktop
    }

    pub fn is_on_all_desktops(&self) -> bool {
        self.desktop == Some(Desktop::All)
    }

    pub fn is_on_desktop(&self, desktop: u32) -> bool {
        match self.desktop {
            Some(Desktop::All) => true,
            Some(Desktop::Number(n)) => n == desktop,
            None => false,
        }
    }

    pub fn is_on_current_desktop(&self, ctx: &Context<'_>) -> bool {
        self.is_on_desktop(ctx.workspace.current_desktop())
    }

    /// Move to `desktop`, clamped to the existing desktops
    ///
    /// Returns whether all-desktops membership flipped, which transients
    /// have to follow.
    pub(crate) fn set_desktop(&mut self, ctx: &mut Context<'_>, desktop: Desktop) -> Result<bool> {
        let desktop = match desktop {
            Desktop::Number(n) => Desktop::Number(n.clamp(1, ctx.workspace.number_of_desktops().max(1))),
            Desktop::All => Desktop::All,
        };
        if self.desktop == Some(desktop) {
            return Ok(false);
        }
        let was_all = self.is_on_all_desktops();
        self.desktop = Some(desktop);
        let handles = self.handles()?;
        ctx.server.set_desktop(handles.client, Some(desktop))?;
        if let Some(deco) = self.decoration_mut() {
            deco.desktop_change(desktop);
        }
        self.virtual_desktop_change(ctx)?;
        Ok(was_all != self.is_on_all_desktops())
    }

    pub(crate) fn set_on_all_desktops(&mut self, ctx: &mut Context<'_>, all: bool) -> Result<bool> {
        if all == self.is_on_all_desktops() {
            return Ok(false);
        }
        let desktop = if all {
            Desktop::All
        } else {
            Desktop::Number(ctx.workspace.current_desktop())
        };
        self.set_desktop(ctx, desktop)
    }

    /// Show or hide after the current desktop changed
    pub fn virtual_desktop_change(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if self.hidden || self.minimized {
            return Ok(());
        }
        if self.is_on_current_desktop(ctx) {
            if !self.is_shade() {
                self.set_mapping_state(ctx, MappingState::Normal)?;
            }
            self.raw_show(ctx)
        } else {
            if !self.is_shade() {
                self.set_mapping_state(ctx, MappingState::Iconic)?;
            }
            self.raw_hide(ctx)
        }
    }

    // Published state

    pub fn net_state(&self) -> NetState {
        self.net_state
    }

    fn publish_state(&mut self, ctx: &mut Context<'_>, state: NetState, mask: NetState) -> Result<()> {
        let handles = self.handles()?;
        self.net_state = (self.net_state - mask) | (state & mask);
        ctx.server.set_net_state(handles.client, state, mask)
    }

    pub fn skip_taskbar(&self) -> bool {
        self.skip_taskbar
    }

    /// `from_outside` marks a request by the client or a pager, which is
    /// remembered and restored after hiding ends
    pub fn set_skip_taskbar(&mut self, ctx: &mut Context<'_>, skip: bool, from_outside: bool) -> Result<()> {
        if from_outside {
            self.original_skip_taskbar = skip;
        }
        if self.skip_taskbar == skip {
            return Ok(());
        }
        self.skip_taskbar = skip;
        let state = if skip { NetState::SKIP_TASKBAR } else { NetState::empty() };
        self.publish_state(ctx, state, NetState::SKIP_TASKBAR)
    }

    pub fn skip_pager(&self) -> bool {
        self.skip_pager
    }

    pub fn set_skip_pager(&mut self, ctx: &mut Context<'_>, skip: bool) -> Result<()> {
        if self.skip_pager == skip {
            return Ok(());
        }
        self.skip_pager = skip;
        let state = if skip { NetState::SKIP_PAGER } else { NetState::empty() };
        self.publish_state(ctx, state, NetState::SKIP_PAGER)
    }

    pub fn is_modal(&self) -> bool {
        self.modal
    }

    pub fn set_modal(&mut self, modal: bool) {
        self.modal = modal;
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    fn set_urgency(&mut self, ctx: &mut Context<'_>, urgent: bool) -> Result<()> {
        if self.urgent == urgent {
            return Ok(());
        }
        self.urgent = urgent;
        let state = if urgent { NetState::DEMANDS_ATTENTION } else { NetState::empty() };
        self.publish_state(ctx, state, NetState::DEMANDS_ATTENTION)
    }

    pub fn allowed_actions(&self) -> AllowedActions {
        self.allowed_actions
    }

    /// Recompute _NET_WM_ALLOWED_ACTIONS; written only when it changed
    pub(crate) fn update_allowed_actions(&mut self, ctx: &mut Context<'_>, minimizable: bool, force: bool) -> Result<()> {
        let mut actions = AllowedActions::CHANGE_DESKTOP;
        if self.is_movable() {
            actions |= AllowedActions::MOVE;
        }
        if self.is_resizable() {
            actions |= AllowedActions::RESIZE;
        }
        if minimizable {
            actions |= AllowedActions::MINIMIZE;
        }
        if self.is_shadeable() {
            actions |= AllowedActions::SHADE;
        }
        if self.is_maximizable() {
            actions |= AllowedActions::maximize();
        }
        if self.user_can_set_full_screen() {
            actions |= AllowedActions::FULLSCREEN;
        }
        if self.is_closeable() {
            actions |= AllowedActions::CLOSE;
        }
        if actions == self.allowed_actions && !force {
            return Ok(());
        }
        self.allowed_actions = actions;
        let handles = self.handles()?;
        ctx.server.set_allowed_actions(handles.client, actions)
    }

    // Hints

    pub fn protocols(&self) -> Protocols {
        self.protocols
    }

    pub fn get_window_protocols(&mut self, ctx: &mut Context<'_>) {
        self.protocols = ctx.server.read_protocols(self.window);
    }

    /// Re-read WM_HINTS; the caller regroups the window afterwards
    pub fn get_wm_hints(&mut self, ctx: &mut Context<'_>) -> Result<WmHints> {
        let hints = ctx.server.read_wm_hints(self.window);
        self.input = hints.input;
        self.window_group = hints.window_group;
        self.set_urgency(ctx, hints.urgent)?;
        Ok(hints)
    }

    pub fn wants_input(&self) -> bool {
        self.input || self.protocols.contains(Protocols::TAKE_FOCUS)
    }

    pub fn wants_tab_focus(&self) -> bool {
        matches!(self.window_type, WindowType::Normal | WindowType::Dialog | WindowType::Override)
            && self.wants_input()
            && !self.skip_taskbar
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn is_special_window(&self) -> bool {
        match self.window_type {
            WindowType::Desktop | WindowType::Dock | WindowType::Splash | WindowType::TopMenu | WindowType::Toolbar => true,
            WindowType::Override => !self.fullscreen,
            _ => false,
        }
    }

    pub fn is_closeable(&self) -> bool {
        self.motif.may_close && (!self.is_special_window() || self.window_type == WindowType::Override)
    }

    pub fn is_movable(&self) -> bool {
        self.motif.may_move
            && !self.fullscreen
            && (!self.is_special_window()
                || matches!(self.window_type, WindowType::Override | WindowType::Splash | WindowType::Toolbar))
    }

    pub fn is_resizable(&self) -> bool {
        self.motif.may_resize
            && !self.fullscreen
            && (!self.is_special_window() || self.window_type == WindowType::Override)
    }

    pub fn is_maximizable(&self) -> bool {
        self.is_resizable() && !self.is_special_window()
    }

    pub fn resource_class(&self) -> &ResourceClass {
        &self.resource_class
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Host the client runs on, "localhost" for this machine
    pub fn client_machine(&self) -> Option<&str> {
        self.client_machine.as_deref()
    }

    /// Client leader window, or the window itself without one
    pub fn client_leader(&self) -> WindowId {
        self.client_leader.unwrap_or(self.window)
    }

    pub fn transient_for(&self) -> Option<WindowId> {
        self.transient_for
    }

    pub fn is_transient(&self) -> bool {
        self.transient_for.is_some()
    }

    pub(crate) fn clear_transient_for(&mut self) {
        self.transient_for = None;
    }

    /// Key of the group this window belongs to
    pub fn group_leader(&self) -> WindowId {
        self.window_group.unwrap_or_else(|| self.client_leader())
    }

    // Captions

    /// Caption as shown: declared name plus any uniqueness suffix
    pub fn caption(&self) -> String {
        match &self.caption_suffix {
            Some(suffix) => format!("{}{}", self.caption_normal, suffix),
            None => self.caption_normal.clone(),
        }
    }

    pub fn caption_normal(&self) -> &str {
        &self.caption_normal
    }

    pub fn caption_iconic(&self) -> &str {
        &self.caption_iconic
    }

    /// Whether this window takes part in caption uniqueness
    pub fn has_visible_caption(&self) -> bool {
        !self.is_special_window() || self.window_type == WindowType::Toolbar
    }

    /// Store a new declared name and the suffix that keeps it unique
    pub(crate) fn apply_caption(&mut self, ctx: &mut Context<'_>, normal: String, suffix: Option<String>) -> Result<()> {
        let handles = self.handles()?;
        let first_name = self.caption_normal.is_empty();
        let had_suffix = self.caption_suffix.is_some();
        self.caption_normal = normal;
        self.caption_suffix = suffix;

        if self.caption_suffix.is_some() {
            ctx.server.set_visible_name(handles.client, Some(&self.caption()))?;
        }
        match &self.caption_suffix {
            None if had_suffix || first_name => {
                // A reused window may still carry a stale override
                ctx.server.set_visible_name(handles.client, None)?;
                ctx.server.set_visible_icon_name(handles.client, None)?;
            }
            Some(suffix) if !self.caption_iconic.is_empty() => {
                let iconic = format!("{}{}", self.caption_iconic, suffix);
                ctx.server.set_visible_icon_name(handles.client, Some(&iconic))?;
            }
            _ => {}
        }

        let caption = self.caption();
        if let Some(deco) = self.decoration_mut() {
            deco.caption_change(&caption);
        }
        Ok(())
    }

    /// Re-read the iconic name, keeping the uniqueness suffix on it
    pub fn fetch_iconic_name(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let name = crate::wm::caption::sanitize(&ctx.server.read_icon_name(self.window));
        if name == self.caption_iconic {
            return Ok(());
        }
        let was_set = !self.caption_iconic.is_empty();
        self.caption_iconic = name;
        let handles = self.handles()?;
        if let Some(suffix) = &self.caption_suffix {
            if !self.caption_iconic.is_empty() {
                let iconic = format!("{}{}", self.caption_iconic, suffix);
                ctx.server.set_visible_icon_name(handles.client, Some(&iconic))?;
            } else if was_set {
                ctx.server.set_visible_icon_name(handles.client, None)?;
            }
        }
        Ok(())
    }

    // Focus

    /// Hand input focus to the client
    pub fn take_focus(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        if self.input {
            ctx.server.set_input_focus(handles.client, ctx.timestamp)?;
        }
        if self.protocols.contains(Protocols::TAKE_FOCUS) {
            ctx.server.send_message(handles.client, ProtocolMessage::TakeFocus, ctx.timestamp)?;
        }
        ctx.workspace.set_should_get_focus(self.window);
        Ok(())
    }

    /// Activate and/or raise, letting the client take part if it can
    pub fn take_activity(&mut self, ctx: &mut Context<'_>, flags: ActivityFlags, handled: bool) -> Result<()> {
        let handles = self.handles()?;
        if !handled || !self.protocols.contains(Protocols::TAKE_ACTIVITY) {
            if flags.contains(ActivityFlags::FOCUS) {
                self.take_focus(ctx)?;
            }
            if flags.contains(ActivityFlags::RAISE) {
                ctx.workspace.raise_client(self.window, handles.frame);
            }
            return Ok(());
        }
        ctx.workspace.send_take_activity(self.window, ctx.timestamp, flags);
        Ok(())
    }

    pub fn provides_context_help(&self) -> bool {
        self.protocols.contains(Protocols::CONTEXT_HELP)
    }

    pub fn show_context_help(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if !self.provides_context_help() {
            return Ok(());
        }
        let handles = self.handles()?;
        ctx.server.send_message(handles.client, ProtocolMessage::ContextHelp, ctx.timestamp)
    }

    // Liveness

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn ping_window(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let handles = self.handles()?;
        let supported = self.protocols.contains(Protocols::PING);
        self.liveness.ping(ctx, handles.client, supported)
    }

    pub fn got_ping(&mut self, ctx: &mut Context<'_>, timestamp: Timestamp) -> bool {
        self.liveness.got_ping(ctx, self.window, timestamp)
    }

    pub fn ping_timeout(&mut self, ctx: &mut Context<'_>, timestamp: Timestamp) -> Result<()> {
        let caption = self.caption();
        let target = KillTarget {
            window: self.window,
            pid: self.pid,
            machine: self.client_machine.as_deref(),
            caption: &caption,
            resource_class: &self.resource_class.class,
        };
        self.liveness.ping_timeout(ctx, &target, timestamp)
    }

    pub fn kill_process(&mut self, ctx: &mut Context<'_>, ask: bool, timestamp: Timestamp) -> Result<()> {
        let caption = self.caption();
        let target = KillTarget {
            window: self.window,
            pid: self.pid,
            machine: self.client_machine.as_deref(),
            caption: &caption,
            resource_class: &self.resource_class.class,
        };
        self.liveness.kill_process(ctx, &target, ask, timestamp)
    }

    pub fn helper_exited(&mut self, process: ProcessId) -> bool {
        self.liveness.helper_exited(process)
    }

    /// Ask the client to close itself; `false` if it does not support that
    pub(crate) fn request_delete(&mut self, ctx: &mut Context<'_>) -> Result<bool> {
        if !self.protocols.contains(Protocols::DELETE_WINDOW) {
            return Ok(false);
        }
        let handles = self.handles()?;
        info!("Closing window 0x{:x}", self.window);
        ctx.server.send_message(handles.client, ProtocolMessage::DeleteWindow, ctx.timestamp)?;
        // Closing may hang the client
        self.ping_window(ctx)?;
        Ok(true)
    }

    // Terminal paths

    /// Give the still existing window back to the root
    ///
    /// On shutdown the window is left mapped with its published desktop
    /// and state, so the next window manager finds it as it was.
    pub fn release_window(mut self, ctx: &mut Context<'_>, on_shutdown: bool) {
        let window = self.window;
        let Ok(handles) = self.handles() else {
            self.identity = Identity::Unmanaged;
            return;
        };
        info!("Releasing window 0x{:x}{}", window, if on_shutdown { " on shutdown" } else { "" });

        self.liveness.cancel(ctx);
        self.set_modal(false);
        self.hidden = true;
        if !on_shutdown {
            ctx.workspace.client_hidden(window);
        }
        best_effort(window, "unmapping frame", ctx.server.unmap_window(handles.frame));
        let destroyed = self.destroy_decoration(ctx);
        best_effort(window, "destroying decoration", destroyed);
        if !on_shutdown {
            ctx.workspace.remove_client(window);
            self.desktop = None;
            best_effort(window, "clearing desktop", ctx.server.set_desktop(handles.client, None));
            let reset = self.publish_state(ctx, NetState::empty(), NetState::all());
            best_effort(window, "clearing state", reset);
        }
        let pos = self.frame_geometry.pos();
        best_effort(window, "reparenting", ctx.server.reparent_window(handles.client, ctx.workspace.root_window(), pos));
        best_effort(window, "leaving save-set", ctx.server.remove_from_save_set(handles.client));
        best_effort(window, "deselecting input", ctx.server.select_input(handles.client, InputSelection::Nothing));
        if on_shutdown {
            best_effort(window, "mapping", ctx.server.map_window(handles.client));
        } else {
            // The client may have unmapped it before we showed it
            best_effort(window, "unmapping", ctx.server.unmap_window(handles.client));
        }
        let withdrawn = self.set_mapping_state(ctx, MappingState::Withdrawn);
        best_effort(window, "withdrawing", withdrawn);
        self.mapping_state = MappingState::Withdrawn;

        self.identity = Identity::Unmanaged;
        best_effort(window, "destroying wrapper", ctx.server.destroy_window(handles.wrapper));
        best_effort(window, "destroying frame", ctx.server.destroy_window(handles.frame));
    }

    /// Forget a window whose client window no longer exists
    ///
    /// Nothing is sent to the client window itself.
    pub fn destroy_client(mut self, ctx: &mut Context<'_>) {
        let window = self.window;
        let Ok(handles) = self.handles() else {
            self.identity = Identity::Unmanaged;
            return;
        };
        info!("Window 0x{:x} destroyed", window);

        self.liveness.cancel(ctx);
        self.block_geometry += 1;
        self.set_modal(false);
        self.hidden = true;
        ctx.workspace.client_hidden(window);
        let destroyed = self.destroy_decoration(ctx);
        best_effort(window, "destroying decoration", destroyed);
        ctx.workspace.remove_client(window);
        self.mapping_state = MappingState::Withdrawn;

        self.identity = Identity::Unmanaged;
        best_effort(window, "destroying wrapper", ctx.server.destroy_window(handles.wrapper));
        best_effort(window, "destroying frame", ctx.server.destroy_window(handles.frame));
        self.block_geometry -= 1;
    }

    /// Kill the owner without asking, cut its connection and forget the window
    pub fn kill_window(mut self, ctx: &mut Context<'_>) {
        info!("Killing window 0x{:x} ({})", self.window, self.caption());
        let killed = self.kill_process(ctx, false, CURRENT_TIME);
        best_effort(self.window, "killing process", killed);
        if let Ok(handles) = self.handles() {
            best_effort(self.window, "killing client", ctx.server.kill_client(handles.client));
        }
        self.destroy_client(ctx);
    }
}

impl Drop for ManagedWindow {
    fn drop(&mut self) {
        if self.is_managed() && !std::thread::panicking() {
            panic!(
                "window 0x{:x} dropped while managed; use release_window or destroy_client",
                self.window
            );
        }
    }
}

impl std::fmt::Debug for ManagedWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedWindow")
            .field("window", &format_args!("0x{:x}", self.window))
            .field("caption", &self.caption())
            .field("geometry", &self.frame_geometry)
            .field("mapping_state", &self.mapping_state)
            .field("shade_mode", &self.shade_mode)
            .field("decorated", &self.has_decoration())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::geometry::gravity_anchor;
    use crate::wm::testing::{Call, DecoEvent, FakeWindow, TestEnv, WsCall, ROOT};

    const W: WindowId = 0x0040_0001;
    const FRAME: WindowId = 0x0100_0000;
    const WRAPPER: WindowId = 0x0100_0001;
    const SURFACE: WindowId = 0x0100_0002;

    fn plain() -> FakeWindow {
        FakeWindow::at(Geometry::new(100, 100, 640, 480))
    }

    fn managed(env: &mut TestEnv, fixture: FakeWindow) -> ManagedWindow {
        env.server.add_window(W, fixture);
        let mut window = ManagedWindow::manage(&mut env.ctx(), W).unwrap();
        window.show_initially(&mut env.ctx(), false).unwrap();
        env.server.clear();
        env.workspace.calls.clear();
        window
    }

    fn anchor(window: &ManagedWindow) -> Point {
        gravity_anchor(window.geometry().pos(), window.gravity(), window.borders())
    }

    #[test]
    fn test_manage_defers_geometry_until_mapped() {
        let mut env = TestEnv::new();
        env.server.add_window(W, plain());
        let mut window = ManagedWindow::manage(&mut env.ctx(), W).unwrap();

        assert_eq!(window.mapping_state(), MappingState::Withdrawn);
        assert!(window.is_geometry_blocked());
        assert_eq!(env.server.geometry_writes(), 0);
        assert!(window.has_decoration());
        assert_eq!(window.borders(), BorderInsets::new(4, 4, 20, 4));
        assert_eq!(window.geometry(), Geometry::new(100, 100, 648, 504));
        assert!(env.server.calls.contains(&Call::Create(FRAME, ROOT, Geometry::new(100, 100, 640, 480))));
        assert!(env.server.calls.contains(&Call::Reparent(W, WRAPPER, Point::default())));
        assert!(env.server.calls.contains(&Call::Reparent(SURFACE, FRAME, Point::default())));
        assert!(env.server.calls.contains(&Call::SaveSetAdd(W)));
        assert!(env.server.calls.contains(&Call::FrameExtents(W, BorderInsets::new(4, 4, 20, 4))));
        assert!(env.server.calls.contains(&Call::Desktop(W, Some(Desktop::Number(1)))));

        env.server.clear();
        window.show_initially(&mut env.ctx(), false).unwrap();
        assert!(!window.is_geometry_blocked());
        assert_eq!(env.server.count(|c| matches!(c, Call::MoveResize(f, _) if *f == FRAME)), 1);
        assert!(env.server.calls.contains(&Call::MoveResize(WRAPPER, Geometry::new(4, 20, 640, 480))));
        assert!(env.server.calls.contains(&Call::ConfigureNotify(W, Geometry::new(104, 120, 640, 480))));
        assert!(env.server.calls.contains(&Call::MappingState(W, MappingState::Normal)));
        assert!(env.server.calls.contains(&Call::Map(FRAME)));
        assert!(env.server.calls.contains(&Call::Map(W)));

        env.server.clear();
        window.set_mapping_state(&mut env.ctx(), MappingState::Normal).unwrap();
        assert!(env.server.calls.is_empty());

        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_vanished_window_is_not_managed() {
        let mut env = TestEnv::new();
        let err = ManagedWindow::manage(&mut env.ctx(), W).unwrap_err();
        assert!(matches!(err.downcast_ref::<ClientError>(), Some(ClientError::Vanished(W))));
        assert!(env.server.calls.is_empty());
    }

    #[test]
    fn test_missing_factory_is_fatal() {
        let mut env = TestEnv::new();
        env.workspace.factory = None;
        env.server.add_window(W, plain());

        let err = ManagedWindow::manage(&mut env.ctx(), W).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::MissingDecorationFactory)
        ));
        // Handed back instead of leaking the frame
        assert!(env.server.calls.contains(&Call::SaveSetRemove(W)));
        assert!(env.server.calls.contains(&Call::Destroy(FRAME)));
        assert!(env.server.calls.contains(&Call::Destroy(WRAPPER)));
    }

    #[test]
    fn test_borderless_types_get_no_decoration() {
        let mut env = TestEnv::new();
        let mut dock = plain();
        dock.window_type = WindowType::Dock;
        let window = managed(&mut env, dock);

        assert!(!window.has_decoration());
        assert!(window.no_border());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 640, 480));
        assert!(!window.is_shadeable());
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_user_no_border_round_trip_keeps_client_in_place() {
        let mut env = TestEnv::new();
        let mut fixture = plain();
        fixture.gravity = Gravity::Static;
        let mut window = managed(&mut env, fixture);
        assert_eq!(window.geometry(), Geometry::new(96, 80, 648, 504));
        let before = anchor(&window);

        assert!(window.set_user_no_border(&mut env.ctx(), true).unwrap());
        assert!(!window.has_decoration());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 640, 480));
        assert_eq!(anchor(&window), before);
        assert!(env.deco_events().contains(&DecoEvent::Destroyed(SURFACE)));
        assert!(env.server.calls.contains(&Call::BoundingShape(FRAME, None)));
        assert!(env.server.calls.contains(&Call::FrameExtents(W, BorderInsets::default())));

        // Same value again changes nothing
        assert!(!window.set_user_no_border(&mut env.ctx(), true).unwrap());

        assert!(window.set_user_no_border(&mut env.ctx(), false).unwrap());
        assert!(window.has_decoration());
        assert_eq!(window.geometry(), Geometry::new(96, 80, 648, 504));
        assert_eq!(window.client_geometry().pos(), Point::new(100, 100));
        assert_eq!(env.factory().created.get(), 2);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_unchanged_borders_commit_nothing() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        window.check_border_sizes(&mut env.ctx()).unwrap();
        assert_eq!(env.server.geometry_writes(), 0);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_border_change_keeps_anchor() {
        for gravity in [Gravity::NorthWest, Gravity::Static, Gravity::SouthEast, Gravity::Center, Gravity::South] {
            let mut env = TestEnv::new();
            let mut fixture = plain();
            fixture.gravity = gravity;
            let mut window = managed(&mut env, fixture);
            let before = anchor(&window);

            env.factory().set_insets(BorderInsets::new(6, 6, 30, 6));
            window.check_border_sizes(&mut env.ctx()).unwrap();

            assert_eq!(window.borders(), BorderInsets::new(6, 6, 30, 6), "{:?}", gravity);
            assert_eq!(anchor(&window), before, "{:?}", gravity);
            assert_eq!(window.client_size(), Size::new(640, 480));
            assert_eq!(window.geometry().size(), Size::new(652, 516));
            // One commit for the whole change
            assert_eq!(env.server.count(|c| matches!(c, Call::MoveResize(f, _) if *f == FRAME)), 1);
            window.release_window(&mut env.ctx(), false);
        }
    }

    #[test]
    fn test_shade_rolls_up_and_down() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        assert!(window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap());
        assert!(window.is_shade());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 648, 20));
        assert_eq!(window.client_size(), Size::new(640, 480));
        assert_eq!(window.mapping_state(), MappingState::Iconic);
        assert_eq!(window.net_state() & NetState::SHADED, NetState::SHADED);
        assert_eq!(window.net_state() & NetState::HIDDEN, NetState::HIDDEN);

        let calls = &env.server.calls;
        let quiet = calls
            .iter()
            .position(|c| *c == Call::SelectInput(WRAPPER, InputSelection::WrapperQuiet))
            .unwrap();
        let unmap = calls.iter().position(|c| *c == Call::Unmap(W)).unwrap();
        let grab = calls.iter().position(|c| *c == Call::Grab).unwrap();
        let ungrab = calls.iter().position(|c| *c == Call::Ungrab).unwrap();
        assert!(quiet < unmap && unmap < grab && grab < ungrab);
        let steps = env.server.count(|c| matches!(c, Call::Resize(f, _) if *f == FRAME));
        assert!(steps >= 1 && steps as u32 <= ShadeAnimation::new(504, 20, 5, std::time::Instant::now()).max_steps());
        assert_eq!(env.server.count(|c| *c == Call::Sync), steps);
        assert!(env.deco_events().contains(&DecoEvent::Shade(true)));

        env.server.clear();
        assert!(!window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap());
        assert!(env.server.calls.is_empty());

        assert!(window.set_shade(&mut env.ctx(), ShadeMode::None).unwrap());
        assert!(!window.is_shade());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 648, 504));
        assert_eq!(window.mapping_state(), MappingState::Normal);
        assert!(env.server.calls.contains(&Call::Map(WRAPPER)));
        assert!(env.server.calls.contains(&Call::Map(W)));
        assert!(env.server.calls.contains(&Call::NetState(W, NetState::empty(), NetState::SHADED)));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_switching_shaded_modes_is_bookkeeping() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap();
        let geometry = window.geometry();
        env.server.clear();

        assert!(!window.set_shade(&mut env.ctx(), ShadeMode::Hover).unwrap());
        assert_eq!(window.shade_mode(), ShadeMode::Hover);
        assert_eq!(window.geometry(), geometry);
        assert!(env.server.calls.is_empty());
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_shade_without_animation() {
        let mut env = TestEnv::new();
        env.config.behavior.animate_shade = false;
        let mut window = managed(&mut env, plain());

        window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap();
        assert_eq!(env.server.count(|c| *c == Call::Grab), 0);
        assert_eq!(window.geometry().height, 20);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_unshading_active_window_requests_focus() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.set_active(true);

        window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap();
        assert!(env.workspace.calls.contains(&WsCall::FocusToNull));
        window.set_shade(&mut env.ctx(), ShadeMode::None).unwrap();
        assert!(env.workspace.calls.contains(&WsCall::RequestFocus(W)));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_take_focus() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain().with_protocols(Protocols::TAKE_FOCUS));

        window.take_focus(&mut env.ctx()).unwrap();
        assert!(env.server.calls.contains(&Call::InputFocus(W, 1000)));
        assert_eq!(env.server.messages(), vec![(W, ProtocolMessage::TakeFocus, 1000)]);
        assert_eq!(env.workspace.calls, vec![WsCall::ShouldGetFocus(W)]);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_take_activity_falls_back_without_protocol() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        let flags = ActivityFlags::FOCUS | ActivityFlags::RAISE;
        window.take_activity(&mut env.ctx(), flags, true).unwrap();
        assert!(env.server.calls.contains(&Call::InputFocus(W, 1000)));
        assert!(env.workspace.calls.contains(&WsCall::Raise(W)));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_take_activity_delegates_when_supported() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain().with_protocols(Protocols::TAKE_ACTIVITY));

        window.take_activity(&mut env.ctx(), ActivityFlags::FOCUS, true).unwrap();
        assert_eq!(env.workspace.calls, vec![WsCall::TakeActivity(W, 1000, ActivityFlags::FOCUS)]);
        assert!(env.server.calls.is_empty());
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_context_help_only_when_advertised() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.show_context_help(&mut env.ctx()).unwrap();
        assert!(env.server.messages().is_empty());

        env.server.window_mut(W).protocols = Protocols::CONTEXT_HELP;
        window.get_window_protocols(&mut env.ctx());
        window.show_context_help(&mut env.ctx()).unwrap();
        assert_eq!(env.server.messages(), vec![(W, ProtocolMessage::ContextHelp, 1000)]);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_request_delete_pings() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        assert!(!window.request_delete(&mut env.ctx()).unwrap());
        assert!(env.server.messages().is_empty());
        window.release_window(&mut env.ctx(), false);

        let mut env = TestEnv::new();
        let protocols = Protocols::DELETE_WINDOW | Protocols::PING;
        let mut window = managed(&mut env, plain().with_protocols(protocols));
        assert!(window.request_delete(&mut env.ctx()).unwrap());
        assert_eq!(
            env.server.messages(),
            vec![(W, ProtocolMessage::DeleteWindow, 1000), (W, ProtocolMessage::Ping, 1000)]
        );
        assert!(window.liveness().is_pinging());
        window.release_window(&mut env.ctx(), false);
        // Releasing drops the timer
        assert!(env.scheduler.active_timers.is_empty());
    }

    #[test]
    fn test_release_hands_window_back() {
        let mut env = TestEnv::new();
        let window = managed(&mut env, plain());

        window.release_window(&mut env.ctx(), false);
        let calls = &env.server.calls;
        assert!(calls.contains(&Call::Reparent(W, ROOT, Point::new(100, 100))));
        assert!(calls.contains(&Call::SaveSetRemove(W)));
        assert!(calls.contains(&Call::SelectInput(W, InputSelection::Nothing)));
        assert!(calls.contains(&Call::Unmap(W)));
        assert!(calls.contains(&Call::Desktop(W, None)));
        assert!(calls.contains(&Call::MappingState(W, MappingState::Withdrawn)));
        assert!(calls.contains(&Call::Destroy(WRAPPER)));
        assert!(calls.contains(&Call::Destroy(FRAME)));
        assert!(env.deco_events().contains(&DecoEvent::Destroyed(SURFACE)));
        assert!(env.workspace.calls.contains(&WsCall::RemoveClient(W)));
    }

    #[test]
    fn test_release_on_shutdown_leaves_window_visible() {
        let mut env = TestEnv::new();
        let window = managed(&mut env, plain());

        window.release_window(&mut env.ctx(), true);
        assert!(env.server.calls.contains(&Call::Map(W)));
        assert!(!env.server.calls.contains(&Call::Desktop(W, None)));
        assert!(!env.workspace.calls.contains(&WsCall::RemoveClient(W)));
    }

    #[test]
    fn test_release_survives_broken_connection() {
        let mut env = TestEnv::new();
        let window = managed(&mut env, plain());
        env.server.fail_writes = true;

        window.release_window(&mut env.ctx(), false);
        assert!(env.server.calls.contains(&Call::Destroy(FRAME)));
        assert!(env.workspace.calls.contains(&WsCall::RemoveClient(W)));
    }

    #[test]
    fn test_destroyed_client_window_is_not_touched() {
        let mut env = TestEnv::new();
        let window = managed(&mut env, plain());

        window.destroy_client(&mut env.ctx());
        assert!(env.server.calls.iter().all(|c| c.window() != Some(W)));
        assert!(env.server.calls.contains(&Call::Destroy(FRAME)));
        assert_eq!(env.workspace.calls, vec![WsCall::ClientHidden(W), WsCall::RemoveClient(W)]);
    }

    #[test]
    #[should_panic(expected = "dropped while managed")]
    fn test_dropping_managed_window_panics() {
        let mut env = TestEnv::new();
        let window = managed(&mut env, plain());
        drop(window);
    }

    #[test]
    fn test_hide_client() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        window.hide_client(&mut env.ctx(), true).unwrap();
        assert!(window.is_hidden());
        assert!(window.skip_taskbar());
        assert_eq!(window.mapping_state(), MappingState::Iconic);
        assert!(env.server.calls.contains(&Call::Unmap(FRAME)));
        assert!(env.workspace.calls.contains(&WsCall::ClientHidden(W)));

        env.server.clear();
        window.hide_client(&mut env.ctx(), false).unwrap();
        assert!(!window.skip_taskbar());
        assert_eq!(window.mapping_state(), MappingState::Normal);
        assert!(env.server.calls.contains(&Call::Map(FRAME)));
        assert!(env.server.calls.contains(&Call::NetState(W, NetState::empty(), NetState::HIDDEN)));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_requested_skip_taskbar_survives_hiding() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.set_skip_taskbar(&mut env.ctx(), true, true).unwrap();

        window.hide_client(&mut env.ctx(), true).unwrap();
        window.hide_client(&mut env.ctx(), false).unwrap();
        assert!(window.skip_taskbar());
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_minimize_primitives() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        assert!(!window.minimize(&mut env.ctx(), false).unwrap());
        assert!(window.minimize(&mut env.ctx(), true).unwrap());
        assert!(!window.minimize(&mut env.ctx(), true).unwrap());
        assert!(window.is_minimized());
        assert!(!window.is_shown(true));
        assert_eq!(window.mapping_state(), MappingState::Iconic);

        assert!(window.unminimize(&mut env.ctx()).unwrap());
        assert_eq!(window.mapping_state(), MappingState::Normal);
        assert!(window.is_shown(false));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_desktop_changes() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        assert!(!window.set_desktop(&mut env.ctx(), Desktop::Number(9)).unwrap());
        assert_eq!(window.desktop(), Some(Desktop::Number(4)));
        assert!(env.server.calls.contains(&Call::Desktop(W, Some(Desktop::Number(4)))));
        assert_eq!(window.mapping_state(), MappingState::Iconic);
        assert!(env.server.calls.contains(&Call::Unmap(FRAME)));
        assert!(env.deco_events().contains(&DecoEvent::Desktop(Desktop::Number(4))));

        env.server.clear();
        assert!(window.set_on_all_desktops(&mut env.ctx(), true).unwrap());
        assert!(window.is_on_all_desktops());
        assert_eq!(window.mapping_state(), MappingState::Normal);
        assert!(env.server.calls.contains(&Call::Map(FRAME)));

        env.workspace.current_desktop = 3;
        window.virtual_desktop_change(&mut env.ctx()).unwrap();
        assert_eq!(window.mapping_state(), MappingState::Normal);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_allowed_actions_written_on_change() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        window.update_allowed_actions(&mut env.ctx(), true, false).unwrap();
        let expected = AllowedActions::MOVE
            | AllowedActions::RESIZE
            | AllowedActions::MINIMIZE
            | AllowedActions::SHADE
            | AllowedActions::maximize()
            | AllowedActions::FULLSCREEN
            | AllowedActions::CHANGE_DESKTOP
            | AllowedActions::CLOSE;
        assert_eq!(window.allowed_actions(), expected);
        assert_eq!(env.server.count(|c| matches!(c, Call::AllowedActions(..))), 1);

        window.update_allowed_actions(&mut env.ctx(), true, false).unwrap();
        assert_eq!(env.server.count(|c| matches!(c, Call::AllowedActions(..))), 1);
        window.update_allowed_actions(&mut env.ctx(), true, true).unwrap();
        assert_eq!(env.server.count(|c| matches!(c, Call::AllowedActions(..))), 2);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_caption_suffix_overrides_visible_name() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        window.apply_caption(&mut env.ctx(), "Term".into(), Some(" <2>".into())).unwrap();
        assert_eq!(window.caption(), "Term <2>");
        assert!(env.server.calls.contains(&Call::VisibleName(W, Some("Term <2>".into()))));
        assert!(env.deco_events().contains(&DecoEvent::Caption("Term <2>".into())));

        env.server.clear();
        window.apply_caption(&mut env.ctx(), "Term".into(), None).unwrap();
        assert_eq!(window.caption(), "Term");
        assert!(env.server.calls.contains(&Call::VisibleName(W, None)));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_iconic_name_carries_suffix() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.apply_caption(&mut env.ctx(), "Term".into(), Some(" <2>".into())).unwrap();

        env.server.window_mut(W).icon_name = "term".into();
        window.fetch_iconic_name(&mut env.ctx()).unwrap();
        assert!(env.server.calls.contains(&Call::VisibleIconName(W, Some("term <2>".into()))));

        env.server.clear();
        env.server.window_mut(W).icon_name = String::new();
        window.fetch_iconic_name(&mut env.ctx()).unwrap();
        assert_eq!(env.server.calls, vec![Call::VisibleIconName(W, None)]);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_urgency_published_once() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        env.server.window_mut(W).wm_hints.urgent = true;

        window.get_wm_hints(&mut env.ctx()).unwrap();
        window.get_wm_hints(&mut env.ctx()).unwrap();
        assert!(window.is_urgent());
        assert_eq!(
            env.server.calls,
            vec![Call::NetState(W, NetState::DEMANDS_ATTENTION, NetState::DEMANDS_ATTENTION)]
        );
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_full_screen_drops_and_restores_decoration() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        assert!(window.set_full_screen(&mut env.ctx(), true).unwrap());
        assert!(!window.has_decoration());
        assert_eq!(window.geometry(), Geometry::new(0, 0, 1920, 1080));
        assert!(!window.user_can_set_no_border());
        assert!(!window.is_movable());

        assert!(window.set_full_screen(&mut env.ctx(), false).unwrap());
        assert!(window.has_decoration());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 648, 504));
        assert_eq!(window.client_size(), Size::new(640, 480));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_full_screen_unshades_first() {
        let mut env = TestEnv::new();
        env.config.behavior.animate_shade = false;
        let mut window = managed(&mut env, plain());
        window.set_shade(&mut env.ctx(), ShadeMode::Normal).unwrap();
        env.server.clear();

        assert!(window.set_full_screen(&mut env.ctx(), true).unwrap());
        assert!(!window.is_shade());
        assert_eq!(window.geometry(), Geometry::new(0, 0, 1920, 1080));
        assert_eq!(window.client_size(), Size::new(1920, 1080));
        assert_eq!(window.mapping_state(), MappingState::Normal);
        assert!(env.server.calls.contains(&Call::Map(WRAPPER)));
        assert!(env.server.calls.contains(&Call::Map(W)));
        // The frame never collapses to zero height on the way
        let collapsed = env.server.count(|c| match c {
            Call::MoveResize(f, g) => *f == FRAME && g.height == 0,
            Call::Resize(f, s) => *f == FRAME && s.height == 0,
            _ => false,
        });
        assert_eq!(collapsed, 0);

        assert!(window.set_full_screen(&mut env.ctx(), false).unwrap());
        assert!(window.has_decoration());
        assert_eq!(window.geometry(), Geometry::new(100, 100, 648, 504));
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_forced_decoration_rebuild_keeps_anchor() {
        for gravity in [Gravity::NorthWest, Gravity::Static, Gravity::SouthEast] {
            let mut env = TestEnv::new();
            let mut fixture = plain();
            fixture.gravity = gravity;
            let mut window = managed(&mut env, fixture);
            let before = anchor(&window);

            window.update_decoration(&mut env.ctx(), true).unwrap();
            assert!(window.has_decoration(), "{:?}", gravity);
            assert!(env.deco_events().contains(&DecoEvent::Destroyed(SURFACE)), "{:?}", gravity);
            assert_eq!(env.factory().created.get(), 2);
            assert_eq!(anchor(&window), before, "{:?}", gravity);
            assert_eq!(window.client_size(), Size::new(640, 480));
            window.release_window(&mut env.ctx(), false);
        }
    }

    #[test]
    fn test_forced_rebuild_without_border_only_detaches() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());
        window.set_user_no_border(&mut env.ctx(), true).unwrap();
        let geometry = window.geometry();

        window.update_decoration(&mut env.ctx(), true).unwrap();
        assert!(!window.has_decoration());
        assert_eq!(env.factory().created.get(), 1);
        assert_eq!(window.geometry(), geometry);
        window.release_window(&mut env.ctx(), false);
    }

    #[test]
    fn test_shape_removes_decoration() {
        let mut env = TestEnv::new();
        let mut window = managed(&mut env, plain());

        window.update_shape(&mut env.ctx(), true).unwrap();
        assert!(!window.has_decoration());
        assert!(env.server.calls.contains(&Call::CopyShape(FRAME, W, Point::new(4, 20))));
        assert!(!window.user_can_set_no_border());
        window.release_window(&mut env.ctx(), false);
    }
}
