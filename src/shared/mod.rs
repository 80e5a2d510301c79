//! Shared data types

pub mod geometry;

pub use geometry::{BorderInsets, Geometry, Point, Size};
