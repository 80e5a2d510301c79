//! Plain geometry types shared by the window-management modules.

use std::ops::{Add, Sub};

/// A position in root-window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

/// A width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_parts(pos: Point, size: Size) -> Self {
        Self::new(pos.x, pos.y, size.width, size.height)
    }

    pub fn pos(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn with_pos(self, pos: Point) -> Self {
        Self { x: pos.x, y: pos.y, ..self }
    }

    pub fn with_size(self, size: Size) -> Self {
        Self { width: size.width, height: size.height, ..self }
    }
}

/// Border insets a decoration draws around the client
///
/// Published to pagers as the frame extents, in left/right/top/bottom order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BorderInsets {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl BorderInsets {
    pub fn new(left: u32, right: u32, top: u32, bottom: u32) -> Self {
        Self { left, right, top, bottom }
    }

    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }

    /// Offset of the client area inside the frame
    pub fn client_origin(&self) -> Point {
        Point::new(self.left as i32, self.top as i32)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
