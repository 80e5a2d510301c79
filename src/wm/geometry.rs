//! Geometry Module
//!
//! Frame size from client size and border insets, and the gravitation
//! rule that decides which point of a window stays put when its borders
//! change.

use crate::shared::{BorderInsets, Point, Size};

/// ICCCM window gravity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Gravity {
    /// Decode the X11 gravity constant; unknown and Forget map to NorthWest
    pub fn from_wire(value: u32) -> Self {
        match value {
            2 => Gravity::North,
            3 => Gravity::NorthEast,
            4 => Gravity::West,
            5 => Gravity::Center,
            6 => Gravity::East,
            7 => Gravity::SouthWest,
            8 => Gravity::South,
            9 => Gravity::SouthEast,
            10 => Gravity::Static,
            _ => Gravity::NorthWest,
        }
    }
}

/// Whether a size may collapse to zero client height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeMode {
    Normal,
    Shaded,
}

/// Frame size needed to show a client of `client` size inside `borders`
///
/// A zero client height survives only in shaded mode; everything else is
/// clamped to at least one pixel.
pub fn size_for_client_size(client: Size, borders: BorderInsets, mode: SizeMode) -> Size {
    let width = client.width.max(1);
    let height = if mode == SizeMode::Shaded && client.height == 0 {
        0
    } else {
        client.height.max(1)
    };
    Size::new(width + borders.horizontal(), height + borders.vertical())
}

/// Frame movement that makes room for `borders` under `gravity`
pub fn gravitation_offset(gravity: Gravity, borders: BorderInsets) -> Point {
    let left = borders.left as i32;
    let right = borders.right as i32;
    let top = borders.top as i32;
    let bottom = borders.bottom as i32;

    if gravity == Gravity::Center {
        // Frame center lands where the bare client's center was
        return Point::new(-(left + right) / 2, -(top + bottom) / 2);
    }

    // How the client moves to make space for the frame
    let (dx, dy) = match gravity {
        Gravity::NorthWest => (left, top),
        Gravity::North => (0, top),
        Gravity::NorthEast => (-right, top),
        Gravity::West => (left, 0),
        Gravity::Static => (0, 0),
        Gravity::East => (-right, 0),
        Gravity::SouthWest => (left, -bottom),
        Gravity::South => (0, -bottom),
        Gravity::SouthEast => (-right, -bottom),
        Gravity::Center => unreachable!(),
    };

    // Client movement to frame movement
    Point::new(dx - left, dy - top)
}

/// Frame position after applying (or, with `invert`, removing) gravitation
pub fn calculate_gravitation(pos: Point, gravity: Gravity, borders: BorderInsets, invert: bool) -> Point {
    let offset = gravitation_offset(gravity, borders);
    if invert { pos - offset } else { pos + offset }
}

/// The point that border changes must leave untouched
///
/// Removing the gravitation of the current borders gives the position the
/// window would have without any frame; that position is invariant.
pub fn gravity_anchor(frame_pos: Point, gravity: Gravity, borders: BorderInsets) -> Point {
    calculate_gravitation(frame_pos, gravity, borders, true)
}
