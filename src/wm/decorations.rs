//! Window decorations for Area WM
//!
//! A decoration is owned by exactly one managed window. It reports the
//! border insets it draws, follows the frame size, and hears about
//! caption, shade, activation and desktop changes.

use anyhow::Result;
use tracing::debug;

use crate::config::DecorationConfig;
use crate::shared::{BorderInsets, Geometry, Size};
use crate::wm::protocol::{Desktop, WindowId, WindowServer};

pub trait Decoration {
    /// Window the decoration renders into; reparented under the frame
    fn surface(&self) -> WindowId;

    /// Insets drawn around the client, which may depend on shading
    fn borders(&self, shaded: bool) -> BorderInsets;

    /// Follow the frame size; always re-lays out, even at an unchanged size
    fn resize(&mut self, server: &mut dyn WindowServer, size: Size) -> Result<()>;

    fn show(&mut self, server: &mut dyn WindowServer) -> Result<()>;

    fn hide(&mut self, server: &mut dyn WindowServer) -> Result<()>;

    fn caption_change(&mut self, caption: &str);

    fn shade_change(&mut self, shaded: bool);

    fn active_change(&mut self, active: bool);

    fn desktop_change(&mut self, desktop: Desktop);

    fn destroy(self: Box<Self>, server: &mut dyn WindowServer) -> Result<()>;
}

pub trait DecorationFactory {
    /// Build a decoration whose surface is a child of `root`
    fn create(&self, server: &mut dyn WindowServer, root: WindowId) -> Result<Box<dyn Decoration>>;
}

/// Stock decoration: a bordered surface with a titlebar strip
#[derive(Debug)]
pub struct FrameDecoration {
    surface: WindowId,
    titlebar: WindowId,
    config: DecorationConfig,
    caption: String,
    shaded: bool,
    active: bool,
}

impl FrameDecoration {
    pub fn new(server: &mut dyn WindowServer, root: WindowId, config: &DecorationConfig) -> Result<Self> {
        let surface = server.create_container(
            root,
            Geometry::new(0, 0, 1, 1),
            Some(config.border_color),
        )?;
        let titlebar = server.create_container(
            surface,
            Geometry::new(config.border_width as i32, 0, 1, config.titlebar_height.max(1)),
            Some(config.titlebar_color),
        )?;
        server.map_window(titlebar)?;

        debug!("Created frame decoration surface 0x{:x}", surface);

        Ok(Self {
            surface,
            titlebar,
            config: config.clone(),
            caption: String::new(),
            shaded: false,
            active: false,
        })
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Decoration for FrameDecoration {
    fn surface(&self) -> WindowId {
        self.surface
    }

    fn borders(&self, shaded: bool) -> BorderInsets {
        let border = self.config.border_width;
        let bottom = if shaded && !self.config.shaded_bottom_border { 0 } else { border };
        BorderInsets::new(border, border, self.config.titlebar_height, bottom)
    }

    fn resize(&mut self, server: &mut dyn WindowServer, size: Size) -> Result<()> {
        server.resize_window(self.surface, Size::new(size.width.max(1), size.height.max(1)))?;

        // Use saturating math to avoid underflow on tiny frames
        let title_width = size.width.saturating_sub(2 * self.config.border_width).max(1);
        server.resize_window(self.titlebar, Size::new(title_width, self.config.titlebar_height.max(1)))?;
        Ok(())
    }

    fn show(&mut self, server: &mut dyn WindowServer) -> Result<()> {
        server.map_window(self.surface)
    }

    fn hide(&mut self, server: &mut dyn WindowServer) -> Result<()> {
        server.unmap_window(self.surface)
    }

    fn caption_change(&mut self, caption: &str) {
        self.caption = caption.to_string();
    }

    fn shade_change(&mut self, shaded: bool) {
        self.shaded = shaded;
    }

    fn active_change(&mut self, active: bool) {
        self.active = active;
    }

    fn desktop_change(&mut self, desktop: Desktop) {
        debug!("Decoration 0x{:x} now on {:?}", self.surface, desktop);
    }

    fn destroy(self: Box<Self>, server: &mut dyn WindowServer) -> Result<()> {
        // Children go with the surface
        server.destroy_window(self.surface)
    }
}

/// Builds [`FrameDecoration`]s from the configured theme
#[derive(Debug, Clone, Default)]
pub struct FrameDecorationFactory {
    config: DecorationConfig,
}

impl FrameDecorationFactory {
    pub fn new(config: DecorationConfig) -> Self {
        Self { config }
    }
}

impl DecorationFactory for FrameDecorationFactory {
    fn create(&self, server: &mut dyn WindowServer, root: WindowId) -> Result<Box<dyn Decoration>> {
        Ok(Box::new(FrameDecoration::new(server, root, &self.config)?))
    }
}
